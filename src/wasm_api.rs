use std::cell::RefCell;
use std::rc::Rc;

use gloo::timers::callback::Timeout;
use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use kumiawase_core::PuzzleConfig;

use crate::app_core::{AppCore, AppSubscription};
use crate::clock::now_ms;
use crate::input::PointerKind;
use crate::local_snapshot::default_store;
use crate::svg_view::render_scene_svg;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Control handle handed to the host page.
#[wasm_bindgen]
pub struct JigsawHandle {
    core: Rc<AppCore>,
    save_timer: RefCell<Option<Timeout>>,
    subscription: Option<AppSubscription>,
}

#[wasm_bindgen]
impl JigsawHandle {
    /// `config_json` is a `PuzzleConfig` object. `on_complete` receives elapsed seconds
    /// and may return a numeric award or a promise of one.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str, on_complete: Option<Function>) -> Result<JigsawHandle, JsValue> {
        let config = PuzzleConfig::from_json(config_json)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let core = AppCore::new(config, default_store(), now_ms());
        if let Some(callback) = on_complete {
            let weak = Rc::downgrade(&core);
            core.set_on_complete(Rc::new(move |seconds| {
                let value = callback
                    .call1(&JsValue::NULL, &JsValue::from_f64(seconds))
                    .ok()?;
                if let Some(award) = value.as_f64() {
                    return Some(award);
                }
                let promise = value.dyn_into::<Promise>().ok()?;
                let weak = weak.clone();
                spawn_local(async move {
                    match JsFuture::from(promise).await {
                        Ok(value) => {
                            if let (Some(core), Some(award)) = (weak.upgrade(), value.as_f64()) {
                                core.set_award(award);
                            }
                        }
                        Err(_) => console_log!("completion: award promise rejected"),
                    }
                });
                None
            }));
        }
        Ok(Self {
            core,
            save_timer: RefCell::new(None),
            subscription: None,
        })
    }

    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&mut self, callback: Function) {
        let subscription = self.core.subscribe(Rc::new(move || {
            let _ = callback.call0(&JsValue::NULL);
        }));
        self.subscription = Some(subscription);
    }

    pub fn reset(&self) {
        self.core.reset(now_ms());
        self.save_timer.borrow_mut().take();
    }

    #[wasm_bindgen(js_name = sendLooseToTray)]
    pub fn send_loose_to_tray(&self) -> u32 {
        let moved = self.core.send_loose_to_tray(now_ms());
        self.arm_save_timer();
        moved as u32
    }

    #[wasm_bindgen(js_name = enterFullscreen)]
    pub fn enter_fullscreen(&self, width: f32, height: f32, origin_x: f32, origin_y: f32) {
        self.core
            .enter_fullscreen((width, height), (origin_x, origin_y), now_ms());
    }

    #[wasm_bindgen(js_name = exitFullscreen)]
    pub fn exit_fullscreen(&self, origin_x: f32, origin_y: f32) {
        self.core.exit_fullscreen((origin_x, origin_y), now_ms());
        self.save_timer.borrow_mut().take();
    }

    #[wasm_bindgen(getter, js_name = isFullscreen)]
    pub fn is_fullscreen(&self) -> bool {
        self.core.is_fullscreen()
    }

    pub fn resize(&self, width: f32, height: f32, origin_x: f32, origin_y: f32) {
        self.core
            .resize((width, height), (origin_x, origin_y), now_ms());
        self.arm_save_timer();
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&self) {
        self.core.reset_view();
    }

    /// `piece` is the index of the piece element under the pointer, or -1.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(
        &self,
        pointer_id: i32,
        client_x: f32,
        client_y: f32,
        pointer_type: &str,
        piece: i32,
    ) -> bool {
        let target = usize::try_from(piece).ok();
        self.core.pointer_down(
            pointer_id,
            (client_x, client_y),
            PointerKind::from_pointer_type(pointer_type),
            target,
        )
    }

    /// Returns true when the caller should schedule `animationFrame`.
    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&self, pointer_id: i32, client_x: f32, client_y: f32) -> bool {
        self.core.pointer_move(pointer_id, (client_x, client_y))
    }

    /// Returns true when another animation frame is needed for the magnet ease.
    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&self, pointer_id: i32, cancelled: bool) -> bool {
        let now = now_ms();
        self.core.pointer_up(pointer_id, cancelled, now);
        self.arm_save_timer();
        self.core.animation_frame(now)
    }

    #[wasm_bindgen(js_name = animationFrame)]
    pub fn animation_frame(&self) -> bool {
        self.core.animation_frame(now_ms())
    }

    pub fn wheel(&self, delta_y: f32, client_x: f32, client_y: f32) -> bool {
        self.core.wheel(delta_y, (client_x, client_y))
    }

    #[wasm_bindgen(js_name = hitTest)]
    pub fn hit_test(&self, client_x: f32, client_y: f32) -> i32 {
        self.core
            .hit_test((client_x, client_y))
            .and_then(|id| i32::try_from(id).ok())
            .unwrap_or(-1)
    }

    #[wasm_bindgen(js_name = setVisible)]
    pub fn set_visible(&self, visible: bool) {
        self.core.set_visible(visible, now_ms());
    }

    #[wasm_bindgen(js_name = imageLoaded)]
    pub fn image_loaded(&self, src: &str, ok: bool) {
        self.core.report_image(src, ok);
    }

    pub fn progress(&self) -> f32 {
        self.core.progress()
    }

    #[wasm_bindgen(js_name = elapsedSeconds)]
    pub fn elapsed_seconds(&self) -> f64 {
        self.core.elapsed_ms(now_ms()) / 1000.0
    }

    pub fn award(&self) -> Option<f64> {
        self.core.award()
    }

    #[wasm_bindgen(js_name = sceneJson)]
    pub fn scene_json(&self) -> String {
        serde_json::to_string(&self.core.scene(now_ms())).unwrap_or_default()
    }

    #[wasm_bindgen(js_name = svgMarkup)]
    pub fn svg_markup(&self) -> String {
        render_scene_svg(&self.core.scene(now_ms()))
    }
}

impl JigsawHandle {
    /// Re-arms one timeout for the pending debounced save. Replacing the old timeout
    /// cancels it.
    fn arm_save_timer(&self) {
        let Some(due) = self.core.save_due_at() else {
            return;
        };
        let delay = (due - now_ms()).max(0.0).ceil() as u32;
        let core = Rc::clone(&self.core);
        let timer = Timeout::new(delay, move || core.tick(now_ms()));
        *self.save_timer.borrow_mut() = Some(timer);
    }
}

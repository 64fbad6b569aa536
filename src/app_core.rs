use std::cell::RefCell;
use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use kumiawase_core::game::session_seed;
use kumiawase_core::{
    assign_edges, build_outline, capture_progress, compute_board_layout, is_complete, progress,
    restore_progress, DragMachine, FullscreenViewport, InlineViewport, PieceId, PuzzleConfig,
    ProgressRecord, PuzzleState, SnapTolerances, ViewMode, Viewports,
};

use crate::clock;
use crate::input::{GestureAction, GesturePolicy, PointerKind};
use crate::local_snapshot::{self, ProgressStore, SaveDebouncer};
use crate::puzzle_image::{ImageLoadState, ImageSlot};
use crate::svg_view::{self, SceneView};

pub type AppSubscriber = Rc<dyn Fn()>;
/// Called once with elapsed seconds when the puzzle is solved. May answer with an award.
pub type CompletionCallback = Rc<dyn Fn(f64) -> Option<f64>>;

pub struct AppCore {
    state: RefCell<SessionState>,
    store: Rc<dyn ProgressStore>,
    on_complete: RefCell<Option<CompletionCallback>>,
    subscribers: Rc<RefCell<Vec<AppSubscriber>>>,
}

/// Active play time. Paused while the page is hidden.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ElapsedClock {
    banked_ms: f64,
    running_since: Option<f64>,
}

impl ElapsedClock {
    fn resume(&mut self, now_ms: f64) {
        if self.running_since.is_none() {
            self.running_since = Some(now_ms);
        }
    }

    fn pause(&mut self, now_ms: f64) {
        if let Some(since) = self.running_since.take() {
            self.banked_ms += (now_ms - since).max(0.0);
        }
    }

    fn restart(&mut self, banked_ms: f64, now_ms: f64) {
        self.banked_ms = banked_ms;
        self.running_since = Some(now_ms);
    }

    fn total_ms(&self, now_ms: f64) -> f64 {
        let running = self
            .running_since
            .map(|since| (now_ms - since).max(0.0))
            .unwrap_or(0.0);
        self.banked_ms + running
    }
}

struct SessionState {
    config: PuzzleConfig,
    key: String,
    tolerances: SnapTolerances,
    puzzle: PuzzleState,
    outlines: Vec<String>,
    viewports: Viewports,
    origin: (f32, f32),
    inline_size: (f32, f32),
    drag: DragMachine,
    gestures: GesturePolicy,
    rng: ChaCha8Rng,
    saver: SaveDebouncer,
    elapsed: ElapsedClock,
    completed: bool,
    award: Option<f64>,
    image: ImageSlot,
    /// Saved record waiting for the first inline measurement, so offsets are applied
    /// to the final board position.
    pending_restore: Option<ProgressRecord>,
}

/// Stable per-puzzle seed so silhouettes survive a reload when no seed is configured.
fn key_seed(key: &str) -> u64 {
    key.bytes()
        .fold(0u64, |acc, byte| session_seed(u64::from(byte), acc))
}

impl SessionState {
    fn stage_size(&self) -> (f32, f32) {
        (
            self.puzzle.layout.stage_width,
            self.puzzle.layout.stage_height,
        )
    }

    fn local(&self, client: (f32, f32)) -> (f32, f32) {
        (client.0 - self.origin.0, client.1 - self.origin.1)
    }

    /// Refits the active mode to `viewport` and re-centers the board in the stage that
    /// the fit scale implies.
    fn relayout(&mut self, viewport: (f32, f32)) {
        let content = self.config.content_size();
        let stage = self.stage_size();
        match self.viewports.mode {
            ViewMode::Inline => self.viewports.inline.fit(viewport, content, stage),
            ViewMode::Fullscreen => self.viewports.fullscreen.fit(viewport, content, stage),
        }
        let fit = self.viewports.fit_scale();
        let viewport = self.viewports.active_viewport();
        let layout = compute_board_layout(
            self.config.board_width,
            self.config.board_height,
            self.config.scatter_margin,
            viewport.0 / fit,
            viewport.1 / fit,
        );
        if layout != self.puzzle.layout {
            self.puzzle.recenter(layout);
            self.puzzle.keep_loose_groups_in_stage();
        }
        let stage = self.stage_size();
        match self.viewports.mode {
            ViewMode::Inline => self.viewports.inline.fit(viewport, content, stage),
            ViewMode::Fullscreen => self.viewports.fullscreen.fit(viewport, content, stage),
        }
    }

    /// Commits the active drag, if any. Returns elapsed seconds when this release solved
    /// the puzzle.
    fn finish_drag(
        &mut self,
        store: &dyn ProgressStore,
        pointer_id: i32,
        cancelled: bool,
        now_ms: f64,
    ) -> Option<f64> {
        let visible = self.viewports.visible_rect();
        let scale = self.viewports.active_scale();
        let outcome = if cancelled {
            self.drag.cancel(
                &mut self.puzzle,
                pointer_id,
                &visible,
                scale,
                &self.tolerances,
                now_ms,
            )
        } else {
            self.drag.pointer_up(
                &mut self.puzzle,
                pointer_id,
                &visible,
                scale,
                &self.tolerances,
                now_ms,
            )
        }?;
        if outcome.merges > 0 || outcome.board_snapped {
            console_log!(
                "settle: group {} merges {} board {}",
                outcome.group,
                outcome.merges,
                outcome.board_snapped
            );
        }
        self.after_settle(store, now_ms)
    }

    fn end_active_drag(&mut self, store: &dyn ProgressStore, now_ms: f64) -> Option<f64> {
        let completion = self
            .drag
            .dragging_pointer()
            .and_then(|pointer_id| self.finish_drag(store, pointer_id, true, now_ms));
        self.gestures.clear();
        completion
    }

    fn drag_start_intact(&self) -> bool {
        let Some(session) = self.drag.session() else {
            return true;
        };
        session
            .members
            .iter()
            .zip(&session.start_positions)
            .all(|(id, start)| self.puzzle.piece(*id).map(|piece| piece.pos) == Some(*start))
    }

    fn after_settle(&mut self, store: &dyn ProgressStore, now_ms: f64) -> Option<f64> {
        if self.completed {
            return None;
        }
        if is_complete(&self.puzzle, self.tolerances.solved_epsilon) {
            self.completed = true;
            self.saver.cancel();
            self.elapsed.pause(now_ms);
            local_snapshot::clear_progress(store, &self.key);
            return Some(self.elapsed.total_ms(now_ms) / 1000.0);
        }
        self.saver.schedule(now_ms);
        None
    }

    fn apply_pending_restore(&mut self, now_ms: f64) {
        let Some(record) = self.pending_restore.take() else {
            return;
        };
        match restore_progress(&mut self.puzzle, &record, &self.key) {
            Ok(()) => {
                console_log!("local snapshot: restored {}", self.key);
                self.puzzle.keep_loose_groups_in_stage();
                self.elapsed.banked_ms += record.elapsed_ms as f64;
                if is_complete(&self.puzzle, self.tolerances.solved_epsilon) {
                    self.completed = true;
                    self.elapsed.pause(now_ms);
                }
            }
            Err(err) => console_log!("local snapshot: restore rejected ({err})"),
        }
    }

    fn persist(&mut self, store: &dyn ProgressStore, now_ms: f64) {
        self.saver.cancel();
        if self.completed || self.pending_restore.is_some() {
            return;
        }
        let record = capture_progress(
            &self.puzzle,
            &self.key,
            self.elapsed.total_ms(now_ms) as u64,
            clock::wall_ms(),
        );
        match local_snapshot::save_progress(store, &record) {
            Ok(()) => console_log!("local snapshot: saved {}", self.key),
            Err(err) => console_log!("local snapshot: save failed ({err})"),
        }
    }
}

impl AppCore {
    pub fn new(config: PuzzleConfig, store: Rc<dyn ProgressStore>, now_ms: f64) -> Rc<Self> {
        let config = config.clamped();
        let key = config.progress_key();
        let edge_seed = config.seed.unwrap_or_else(|| key_seed(&key));
        let mut edge_rng = ChaCha8Rng::seed_from_u64(edge_seed);
        let edges = assign_edges(config.rows, config.cols, &mut edge_rng);
        let scatter_seed = match config.seed {
            Some(seed) => session_seed(seed, seed),
            None => session_seed(clock::wall_ms(), edge_seed),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(scatter_seed);

        let layout = compute_board_layout(
            config.board_width,
            config.board_height,
            config.scatter_margin,
            0.0,
            0.0,
        );
        let mut puzzle = PuzzleState::new(config.rows, config.cols, layout, &edges);
        let outlines: Vec<String> = puzzle
            .pieces
            .iter()
            .map(|piece| {
                build_outline(
                    puzzle.piece_width,
                    puzzle.piece_height,
                    piece.edges,
                    &config.shape,
                )
                .to_svg_path()
            })
            .collect();

        let pending_restore = local_snapshot::load_progress(store.as_ref(), &key);
        puzzle.reset_layout(&mut rng);
        let mut elapsed = ElapsedClock::default();
        elapsed.resume(now_ms);

        let viewports = Viewports {
            mode: ViewMode::Inline,
            inline: InlineViewport::with_limits(config.zoom_min, config.zoom_max),
            fullscreen: FullscreenViewport::with_limits(
                config.fullscreen_scale_min,
                config.fullscreen_scale_max,
            ),
        };
        let content = config.content_size();
        let mut state = SessionState {
            image: ImageSlot::new(&config.image_src),
            saver: SaveDebouncer::new(config.save_debounce_ms),
            drag: DragMachine::new(config.magnet_duration_ms),
            tolerances: config.tolerances(),
            config,
            key,
            puzzle,
            outlines,
            viewports,
            origin: (0.0, 0.0),
            inline_size: content,
            gestures: GesturePolicy::new(),
            rng,
            elapsed,
            completed: false,
            award: None,
            pending_restore,
        };
        state.relayout(content);
        console_log!(
            "session: {} ({}x{}, {} pieces)",
            state.key,
            state.puzzle.rows,
            state.puzzle.cols,
            state.puzzle.total()
        );
        Rc::new(Self {
            state: RefCell::new(state),
            store,
            on_complete: RefCell::new(None),
            subscribers: Rc::new(RefCell::new(Vec::new())),
        })
    }

    pub fn set_on_complete(&self, callback: CompletionCallback) {
        *self.on_complete.borrow_mut() = Some(callback);
    }

    pub fn subscribe(&self, subscriber: AppSubscriber) -> AppSubscription {
        self.subscribers.borrow_mut().push(subscriber.clone());
        AppSubscription {
            subscriber,
            subscribers: Rc::clone(&self.subscribers),
        }
    }

    fn notify(&self) {
        let subscribers = self.subscribers.borrow().clone();
        for subscriber in subscribers {
            (subscriber)();
        }
    }

    /// Notifies, then fires the completion callback outside any borrow.
    fn finish(&self, completion: Option<f64>) {
        self.notify();
        let Some(seconds) = completion else {
            return;
        };
        console_log!("puzzle complete after {seconds:.1}s");
        let callback = self.on_complete.borrow().clone();
        let award = callback.and_then(|callback| callback(seconds));
        self.state.borrow_mut().award = award;
        if award.is_some() {
            self.notify();
        }
    }

    /// Wrapper measured: element-local size and its client-space origin.
    /// A drag in progress survives unless the relayout moved its pieces.
    pub fn resize(&self, viewport: (f32, f32), origin: (f32, f32), now_ms: f64) {
        let completion = {
            let mut state = self.state.borrow_mut();
            let inline = !state.viewports.is_fullscreen();
            let completion = if inline && state.pending_restore.is_some() {
                state.end_active_drag(self.store.as_ref(), now_ms)
            } else {
                None
            };
            state.origin = origin;
            state.relayout(viewport);
            if inline {
                state.inline_size = viewport;
                state.apply_pending_restore(now_ms);
            }
            if !state.drag_start_intact() {
                console_log!("session: drag dropped by relayout");
                state.drag.abort();
                state.gestures.clear();
            }
            completion
        };
        self.finish(completion);
    }

    /// Clears saved progress and scatters every piece again.
    pub fn reset(&self, now_ms: f64) {
        {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            state.drag.abort();
            state.gestures.clear();
            state.saver.cancel();
            state.pending_restore = None;
            local_snapshot::clear_progress(self.store.as_ref(), &state.key);
            state.puzzle.reset_layout(&mut state.rng);
            state.completed = false;
            state.award = None;
            state.elapsed.restart(0.0, now_ms);
            console_log!("session: reset {}", state.key);
        }
        self.notify();
    }

    /// Re-scatters every group not locked to the board. Returns how many groups moved.
    pub fn send_loose_to_tray(&self, now_ms: f64) -> usize {
        let (moved, completion) = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let completion = state.end_active_drag(self.store.as_ref(), now_ms);
            let moved = state.puzzle.scatter_loose(&mut state.rng);
            if moved > 0 && !state.completed {
                state.saver.schedule(now_ms);
            }
            (moved, completion)
        };
        self.finish(completion);
        moved
    }

    pub fn enter_fullscreen(&self, viewport: (f32, f32), origin: (f32, f32), now_ms: f64) {
        let completion = {
            let mut state = self.state.borrow_mut();
            if state.viewports.is_fullscreen() {
                return;
            }
            let completion = state.end_active_drag(self.store.as_ref(), now_ms);
            state.viewports.mode = ViewMode::Fullscreen;
            state.origin = origin;
            state.relayout(viewport);
            console_log!("view: fullscreen on");
            completion
        };
        self.finish(completion);
    }

    /// Back to the inline frame, then saves at once.
    pub fn exit_fullscreen(&self, origin: (f32, f32), now_ms: f64) {
        let completion = {
            let mut state = self.state.borrow_mut();
            if !state.viewports.is_fullscreen() {
                return;
            }
            let completion = state.end_active_drag(self.store.as_ref(), now_ms);
            state.viewports.mode = ViewMode::Inline;
            state.origin = origin;
            let inline_size = state.inline_size;
            state.relayout(inline_size);
            state.apply_pending_restore(now_ms);
            state.persist(self.store.as_ref(), now_ms);
            console_log!("view: fullscreen off");
            completion
        };
        self.finish(completion);
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.borrow().viewports.is_fullscreen()
    }

    /// Back to the fitted view of the active mode.
    pub fn reset_view(&self) {
        {
            let mut state = self.state.borrow_mut();
            let stage = state.stage_size();
            let content = state.config.content_size();
            match state.viewports.mode {
                ViewMode::Inline => state.viewports.inline.reset(stage),
                ViewMode::Fullscreen => {
                    let viewport = state.viewports.fullscreen.viewport;
                    state.viewports.fullscreen.fit(viewport, content, stage);
                }
            }
        }
        self.notify();
    }

    /// Returns true when the host should capture the pointer.
    pub fn pointer_down(
        &self,
        pointer_id: i32,
        client: (f32, f32),
        kind: PointerKind,
        target: Option<PieceId>,
    ) -> bool {
        let captured = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let local = state.local(client);
            match state.gestures.pointer_down(pointer_id, local, kind, target) {
                GestureAction::BeginDrag { piece, pointer_id } => {
                    let point = state.viewports.client_to_stage(client, state.origin);
                    let started =
                        state
                            .drag
                            .pointer_down(&mut state.puzzle, piece, pointer_id, point);
                    if started {
                        state.gestures.drag_started(pointer_id);
                    }
                    started
                }
                GestureAction::Track => true,
                _ => false,
            }
        };
        if captured {
            self.notify();
        }
        captured
    }

    /// Returns true when the host should request an animation frame.
    pub fn pointer_move(&self, pointer_id: i32, client: (f32, f32)) -> bool {
        let mut moved_view = false;
        let request_frame = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let local = state.local(client);
            let stage = state.stage_size();
            match state.gestures.pointer_move(pointer_id, local) {
                GestureAction::DragMove { pointer_id } => {
                    let point = state.viewports.client_to_stage(client, state.origin);
                    state.drag.pointer_move(pointer_id, point)
                }
                GestureAction::Pan { dx, dy } => {
                    state.viewports.pan_by_client(dx, dy, stage);
                    moved_view = true;
                    false
                }
                GestureAction::Pinch {
                    previous_distance,
                    distance,
                    midpoint,
                } => {
                    state
                        .viewports
                        .pinch(previous_distance, distance, midpoint, stage);
                    moved_view = true;
                    false
                }
                _ => false,
            }
        };
        if moved_view {
            self.notify();
        }
        request_frame
    }

    /// Applies the coalesced drag move and advances the magnet. Returns true while
    /// another frame is needed.
    pub fn animation_frame(&self, now_ms: f64) -> bool {
        let (changed, running) = {
            let mut state = self.state.borrow_mut();
            let visible = state.viewports.visible_rect();
            let changed = state.drag.animation_frame(&visible);
            let running = state.drag.tick(now_ms);
            (changed, running)
        };
        if changed || running {
            self.notify();
        }
        running
    }

    pub fn pointer_up(&self, pointer_id: i32, cancelled: bool, now_ms: f64) {
        let (handled, completion) = {
            let mut state = self.state.borrow_mut();
            match state.gestures.pointer_up(pointer_id, cancelled) {
                GestureAction::DragEnd {
                    pointer_id,
                    cancelled,
                } => (
                    true,
                    state.finish_drag(self.store.as_ref(), pointer_id, cancelled, now_ms),
                ),
                GestureAction::Track => (true, None),
                _ => (false, None),
            }
        };
        if handled {
            self.finish(completion);
        }
    }

    /// Wheel zoom at the cursor. Fullscreen only; returns false so the page can scroll
    /// inline.
    pub fn wheel(&self, delta_y: f32, client: (f32, f32)) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if !state.viewports.is_fullscreen() {
                return false;
            }
            let anchor = state.local(client);
            let stage = state.stage_size();
            state.viewports.fullscreen.wheel(delta_y, anchor, stage);
        }
        self.notify();
        true
    }

    /// Runs a due debounced save. Saves are held back while fullscreen.
    pub fn tick(&self, now_ms: f64) {
        let mut state = self.state.borrow_mut();
        if state.viewports.is_fullscreen() || !state.saver.take_due(now_ms) {
            return;
        }
        state.persist(self.store.as_ref(), now_ms);
    }

    pub fn save_due_at(&self) -> Option<f64> {
        self.state.borrow().saver.due_at()
    }

    /// Page visibility changed. Hiding pauses the clock and flushes a pending save.
    pub fn set_visible(&self, visible: bool, now_ms: f64) {
        let mut state = self.state.borrow_mut();
        if visible {
            if !state.completed {
                state.elapsed.resume(now_ms);
            }
            return;
        }
        state.elapsed.pause(now_ms);
        if state.saver.is_pending() && !state.viewports.is_fullscreen() {
            state.persist(self.store.as_ref(), now_ms);
        }
    }

    pub fn report_image(&self, src: &str, loaded: bool) {
        let changed = self.state.borrow_mut().image.report(src, loaded);
        if changed {
            console_log!("image: {src} loaded={loaded}");
            self.notify();
        }
    }

    pub fn image_state(&self) -> ImageLoadState {
        self.state.borrow().image.state()
    }

    /// Topmost piece under a client point.
    pub fn hit_test(&self, client: (f32, f32)) -> Option<PieceId> {
        let state = self.state.borrow();
        let point = state.viewports.client_to_stage(client, state.origin);
        state.puzzle.piece_at(point)
    }

    pub fn progress(&self) -> f32 {
        progress(&self.state.borrow().puzzle)
    }

    pub fn is_complete(&self) -> bool {
        self.state.borrow().completed
    }

    pub fn award(&self) -> Option<f64> {
        self.state.borrow().award
    }

    /// Records an award that resolved after the completion callback returned.
    /// Ignored unless the puzzle is solved and no award is set yet.
    pub fn set_award(&self, award: f64) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if !state.completed || state.award.is_some() || !award.is_finite() {
                return false;
            }
            state.award = Some(award);
        }
        self.notify();
        true
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f64 {
        self.state.borrow().elapsed.total_ms(now_ms)
    }

    pub fn progress_key(&self) -> String {
        self.state.borrow().key.clone()
    }

    pub fn viewports(&self) -> Viewports {
        self.state.borrow().viewports
    }

    pub fn puzzle(&self) -> PuzzleState {
        self.state.borrow().puzzle.clone()
    }

    pub fn scene(&self, now_ms: f64) -> SceneView {
        let state = self.state.borrow();
        let layout = state.puzzle.layout;
        SceneView {
            stage_width: layout.stage_width,
            stage_height: layout.stage_height,
            board_x: layout.board_x,
            board_y: layout.board_y,
            board_width: layout.board_width,
            board_height: layout.board_height,
            transform: svg_view::stage_transform(state.viewports.active()),
            fullscreen: state.viewports.is_fullscreen(),
            photo_fill: state.image.use_photo_fill(),
            image_src: state.image.src().to_string(),
            table_image: state.config.table_image.clone(),
            progress: progress(&state.puzzle),
            complete: state.completed,
            pieces: svg_view::piece_views(&state.puzzle, &state.outlines, &state.drag, now_ms),
        }
    }

    #[cfg(test)]
    fn with_puzzle_mut<F: FnOnce(&mut PuzzleState)>(&self, mutate: F) {
        mutate(&mut self.state.borrow_mut().puzzle);
    }
}

pub struct AppSubscription {
    subscriber: AppSubscriber,
    subscribers: Rc<RefCell<Vec<AppSubscriber>>>,
}

impl Drop for AppSubscription {
    fn drop(&mut self) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|item| !Rc::ptr_eq(item, &self.subscriber));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::local_snapshot::MemoryStore;

    const VIEWPORT: (f32, f32) = (1000.0, 600.0);

    fn config(rows: u32, cols: u32) -> PuzzleConfig {
        PuzzleConfig {
            image_src: "lighthouse.jpg".to_string(),
            puzzle_id: Some("lighthouse".to_string()),
            rows,
            cols,
            board_width: 200.0 * cols as f32,
            board_height: 200.0 * rows as f32,
            seed: Some(11),
            ..PuzzleConfig::default()
        }
    }

    fn session(rows: u32, cols: u32, store: &Rc<MemoryStore>) -> Rc<AppCore> {
        let store: Rc<dyn ProgressStore> = store.clone();
        let core = AppCore::new(config(rows, cols), store, 0.0);
        core.resize(VIEWPORT, (0.0, 0.0), 0.0);
        core
    }

    fn center_client(core: &AppCore, id: PieceId) -> (f32, f32) {
        let puzzle = core.puzzle();
        let piece = &puzzle.pieces[id];
        let center = (
            piece.pos.0 + puzzle.piece_width * 0.5,
            piece.pos.1 + puzzle.piece_height * 0.5,
        );
        core.viewports().active().stage_to_client(center, (0.0, 0.0))
    }

    /// Locks piece 0 and leaves piece 1 a few units off its target.
    fn one_step_from_solved(core: &AppCore) {
        core.with_puzzle_mut(|puzzle| {
            for piece in &mut puzzle.pieces {
                piece.group = piece.id;
                piece.snapped = false;
            }
            let first = &mut puzzle.pieces[0];
            first.pos = first.correct;
            first.snapped = true;
            let second = &mut puzzle.pieces[1];
            second.pos = (second.correct.0 + 5.0, second.correct.1 + 3.0);
        });
    }

    #[test]
    fn fresh_session_starts_scattered() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        let puzzle = core.puzzle();
        assert_eq!(puzzle.total(), 6);
        assert!(puzzle.pieces.iter().all(|piece| !piece.snapped));
        assert!(puzzle.pieces.iter().all(|piece| piece.group == piece.id));
        assert_eq!(core.progress(), 0.0);
        assert!(!core.is_complete());
        assert_eq!(core.progress_key(), "kumiawase:progress:lighthouse");
    }

    #[test]
    fn release_that_solves_fires_the_callback_once() {
        let store = Rc::new(MemoryStore::new());
        let core = session(1, 2, &store);
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        core.set_on_complete(Rc::new(move |seconds| {
            assert!(seconds >= 0.0);
            seen.set(seen.get() + 1);
            Some(50.0)
        }));
        one_step_from_solved(&core);

        let client = center_client(&core, 1);
        assert!(core.pointer_down(3, client, PointerKind::Mouse, Some(1)));
        core.pointer_up(3, false, 900.0);

        assert!(core.is_complete());
        assert_eq!(calls.get(), 1);
        assert_eq!(core.award(), Some(50.0));
        assert!(!store.contains(&core.progress_key()));

        // Everything is locked now, so a second press is ignored.
        let client = center_client(&core, 1);
        assert!(!core.pointer_down(4, client, PointerKind::Mouse, Some(1)));
        core.pointer_up(4, false, 1000.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn late_award_lands_after_completion() {
        let store = Rc::new(MemoryStore::new());
        let core = session(1, 2, &store);
        core.set_on_complete(Rc::new(|_| None));
        let changes = Rc::new(Cell::new(0));
        let seen = Rc::clone(&changes);
        let _subscription = core.subscribe(Rc::new(move || seen.set(seen.get() + 1)));
        assert!(!core.set_award(20.0));

        one_step_from_solved(&core);
        let client = center_client(&core, 1);
        assert!(core.pointer_down(3, client, PointerKind::Mouse, Some(1)));
        core.pointer_up(3, false, 900.0);
        assert!(core.is_complete());
        assert_eq!(core.award(), None);

        let before = changes.get();
        assert!(core.set_award(75.0));
        assert_eq!(core.award(), Some(75.0));
        assert_eq!(changes.get(), before + 1);
        assert!(!core.set_award(90.0));
        assert_eq!(core.award(), Some(75.0));
    }

    #[test]
    fn settle_schedules_a_debounced_save() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        let key = core.progress_key();
        let client = center_client(&core, 0);
        assert!(core.pointer_down(1, client, PointerKind::Mouse, Some(0)));
        core.pointer_up(1, false, 100.0);

        assert_eq!(core.save_due_at(), Some(700.0));
        core.tick(500.0);
        assert!(!store.contains(&key));
        core.tick(700.0);
        assert!(store.contains(&key));
    }

    #[test]
    fn fullscreen_holds_saves_until_exit() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        let key = core.progress_key();
        core.enter_fullscreen((1600.0, 900.0), (0.0, 0.0), 10.0);
        assert!(core.is_fullscreen());

        let client = center_client(&core, 2);
        assert!(core.pointer_down(1, client, PointerKind::Touch, Some(2)));
        core.pointer_up(1, false, 20.0);
        core.tick(5_000.0);
        assert!(!store.contains(&key));

        core.exit_fullscreen((0.0, 0.0), 5_100.0);
        assert!(!core.is_fullscreen());
        assert!(store.contains(&key));
    }

    #[test]
    fn saved_layout_survives_a_new_session() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        core.with_puzzle_mut(|puzzle| {
            let piece = &mut puzzle.pieces[4];
            piece.pos = (piece.correct.0 + 300.0, piece.correct.1 - 40.0);
        });
        core.set_visible(true, 0.0);
        let client = center_client(&core, 4);
        assert!(core.pointer_down(1, client, PointerKind::Mouse, Some(4)));
        core.pointer_up(1, false, 50.0);
        core.set_visible(false, 2_000.0);
        let saved = core.puzzle();

        let restored = session(2, 3, &store);
        let puzzle = restored.puzzle();
        for (before, after) in saved.pieces.iter().zip(&puzzle.pieces) {
            assert!((before.offset().0 - after.offset().0).abs() < 1.0e-3);
            assert!((before.offset().1 - after.offset().1).abs() < 1.0e-3);
            assert_eq!(before.snapped, after.snapped);
        }
        assert!(restored.elapsed_ms(0.0) >= 2_000.0);
    }

    #[test]
    fn corrupt_storage_falls_back_to_a_fresh_layout() {
        let store = Rc::new(MemoryStore::new());
        store.insert_raw("kumiawase:progress:lighthouse", "%%%");
        let core = session(2, 3, &store);
        assert_eq!(core.puzzle().total(), 6);
        assert!(!core.is_complete());
    }

    #[test]
    fn reset_clears_saved_progress_and_locks() {
        let store = Rc::new(MemoryStore::new());
        let core = session(1, 2, &store);
        one_step_from_solved(&core);
        core.set_visible(false, 10.0);
        store.insert_raw(&core.progress_key(), "stale");

        core.reset(20.0);
        assert!(!store.contains(&core.progress_key()));
        assert!(core.puzzle().pieces.iter().all(|piece| !piece.snapped));
        assert_eq!(core.elapsed_ms(520.0), 500.0);
    }

    #[test]
    fn tray_leaves_locked_pieces_alone() {
        let store = Rc::new(MemoryStore::new());
        let core = session(1, 2, &store);
        one_step_from_solved(&core);
        let locked = core.puzzle().pieces[0].pos;
        assert_eq!(core.send_loose_to_tray(0.0), 1);
        assert_eq!(core.puzzle().pieces[0].pos, locked);
    }

    #[test]
    fn drag_survives_a_toolbar_resize() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        assert!(core.pointer_down(5, center_client(&core, 0), PointerKind::Touch, Some(0)));

        core.resize((1000.0, 560.0), (0.0, 0.0), 100.0);
        let puzzle = core.puzzle();
        let origin = puzzle.layout.board_origin();
        let target = (origin.0 + 100.0, origin.1 + 100.0);
        let center = (
            target.0 + puzzle.piece_width * 0.5,
            target.1 + puzzle.piece_height * 0.5,
        );
        let client = core.viewports().active().stage_to_client(center, (0.0, 0.0));
        assert!(core.pointer_move(5, client));
        core.animation_frame(120.0);
        core.pointer_up(5, false, 140.0);

        let pos = core.puzzle().pieces[0].pos;
        assert!((pos.0 - target.0).abs() < 0.01, "x = {}", pos.0);
        assert!((pos.1 - target.1).abs() < 0.01, "y = {}", pos.1);
    }

    #[test]
    fn two_finger_pinch_zooms_around_the_midpoint() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        let scale = core.viewports().active_scale();
        let midpoint = (500.0, 200.0);
        let before = core.viewports().client_to_stage(midpoint, (0.0, 0.0));

        assert!(core.pointer_down(1, (300.0, 200.0), PointerKind::Touch, None));
        assert!(core.pointer_down(2, (500.0, 200.0), PointerKind::Touch, None));
        assert!(!core.pointer_move(2, (700.0, 200.0)));

        assert!((core.viewports().active_scale() - scale * 2.0).abs() < 1.0e-4);
        let after = core.viewports().client_to_stage(midpoint, (0.0, 0.0));
        assert!((before.0 - after.0).abs() < 1.0e-2);
        assert!((before.1 - after.1).abs() < 1.0e-2);
        assert!(core.puzzle().pieces.iter().all(|piece| !piece.snapped));
    }

    #[test]
    fn wheel_zooms_only_in_fullscreen() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        assert!(!core.wheel(-400.0, (500.0, 300.0)));
        core.enter_fullscreen((1600.0, 900.0), (0.0, 0.0), 0.0);
        let before = core.viewports().active_scale();
        assert!(core.wheel(-400.0, (800.0, 450.0)));
        assert!(core.viewports().active_scale() > before);
    }

    #[test]
    fn hidden_time_is_not_counted() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        core.set_visible(false, 1_000.0);
        core.set_visible(true, 9_000.0);
        assert_eq!(core.elapsed_ms(10_000.0), 2_000.0);
    }

    #[test]
    fn subscribers_hear_view_changes_until_dropped() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = core.subscribe(Rc::new(move || counter.set(counter.get() + 1)));
        core.reset_view();
        assert_eq!(hits.get(), 1);
        drop(subscription);
        core.reset_view();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn image_reports_drive_photo_fill() {
        let store = Rc::new(MemoryStore::new());
        let core = session(2, 3, &store);
        assert!(!core.scene(0.0).photo_fill);
        core.report_image("lighthouse.jpg", true);
        assert_eq!(core.image_state(), ImageLoadState::Loaded);
        assert!(core.scene(0.0).photo_fill);
    }
}

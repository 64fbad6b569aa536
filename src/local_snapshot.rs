use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kumiawase_core::{decode_text, encode_text, ProgressRecord};

/// Keyed string storage for saved progress. `localStorage` in the browser, a map elsewhere.
pub trait ProgressStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

#[cfg(target_arch = "wasm32")]
pub struct LocalStorageStore;

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|window| window.local_storage().ok().flatten())
    }
}

#[cfg(target_arch = "wasm32")]
impl ProgressStore for LocalStorageStore {
    fn load(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok()?
    }

    fn save(&self, key: &str, value: &str) -> Result<(), String> {
        let storage = Self::storage().ok_or_else(|| "storage unavailable".to_string())?;
        storage
            .set_item(key, value)
            .map_err(|_| "storage set failed".to_string())
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

pub fn default_store() -> Rc<dyn ProgressStore> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(LocalStorageStore)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(MemoryStore::new())
    }
}

/// Reads a record. Missing or undecodable entries read as `None`.
pub fn load_progress(store: &dyn ProgressStore, key: &str) -> Option<ProgressRecord> {
    let raw = store.load(key)?;
    match decode_text::<ProgressRecord>(&raw) {
        Ok(record) => Some(record),
        Err(err) => {
            console_log!("local snapshot: {err}");
            None
        }
    }
}

pub fn save_progress(store: &dyn ProgressStore, record: &ProgressRecord) -> Result<(), String> {
    let text = encode_text(record).map_err(|err| err.to_string())?;
    store.save(&record.key, &text)
}

pub fn clear_progress(store: &dyn ProgressStore, key: &str) {
    store.remove(key);
    console_log!("local snapshot: cleared {key}");
}

/// Trailing-edge debounce for saves. The host polls `take_due` from a timer or frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaveDebouncer {
    delay_ms: f64,
    due_at: Option<f64>,
}

impl SaveDebouncer {
    pub fn new(delay_ms: f32) -> Self {
        let delay_ms = if delay_ms.is_finite() {
            f64::from(delay_ms.max(0.0))
        } else {
            0.0
        };
        Self {
            delay_ms,
            due_at: None,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    /// Restarts the countdown from `now_ms`.
    pub fn schedule(&mut self, now_ms: f64) {
        self.due_at = Some(now_ms + self.delay_ms);
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    pub fn due_at(&self) -> Option<f64> {
        self.due_at
    }

    /// True once per scheduled save, when its deadline has passed.
    pub fn take_due(&mut self, now_ms: f64) -> bool {
        match self.due_at {
            Some(due) if now_ms >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }
}

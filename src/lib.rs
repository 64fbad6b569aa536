#[macro_use]
mod log;

pub mod app_core;
pub mod clock;
pub mod input;
pub mod local_snapshot;
pub mod puzzle_image;
pub mod svg_view;
#[cfg(target_arch = "wasm32")]
mod wasm_api;

pub use app_core::{AppCore, AppSubscription, CompletionCallback};
pub use input::{GestureAction, GesturePolicy, PointerKind};
pub use local_snapshot::{MemoryStore, ProgressStore, SaveDebouncer};
pub use puzzle_image::ImageLoadState;
pub use svg_view::{PieceView, SceneView};

pub mod codec;
pub mod config;
pub mod drag;
pub mod edges;
pub mod game;
pub mod model;
pub mod shape;
pub mod snap;
pub mod snapshot;
pub mod viewport;

pub use codec::{decode, decode_text, encode, encode_text, CodecError};
pub use config::{ConfigError, PuzzleConfig};
pub use drag::{DragMachine, DragPhase, DragSession, SnapAnimation};
pub use edges::{assign_edges, EdgeMap, EDGE_FLAT, EDGE_SLOT, EDGE_TAB};
pub use game::{piece_label, GRID_MAX};
pub use model::{compute_board_layout, BoardLayout, GroupId, Piece, PieceId, PuzzleState};
pub use shape::{build_outline, Outline, PathCommand, ShapeParams};
pub use snap::{
    is_complete, progress, settle_group, snap_and_merge_neighbors, snap_group_to_board_if_close,
    SettleOutcome, SnapTolerances,
};
pub use snapshot::{
    capture_progress, progress_key, restore_progress, PieceProgress, ProgressRecord,
    RestoreError, PROGRESS_VERSION,
};
pub use viewport::{
    FullscreenViewport, InlineViewport, ViewMode, ViewRect, Viewports, ViewportTransform,
};

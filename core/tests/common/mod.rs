#![allow(dead_code)]

use kumiawase_core::{
    assign_edges, compute_board_layout, BoardLayout, GroupId, PieceId, PuzzleState,
    SnapTolerances,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const BOARD_WIDTH: f32 = 1200.0;
pub const BOARD_HEIGHT: f32 = 800.0;
pub const MARGIN: f32 = 160.0;

pub fn layout() -> BoardLayout {
    compute_board_layout(BOARD_WIDTH, BOARD_HEIGHT, MARGIN, 0.0, 0.0)
}

/// Every piece on its target, each in its own group.
pub fn build_state(rows: u32, cols: u32) -> PuzzleState {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let edges = assign_edges(rows, cols, &mut rng);
    PuzzleState::new(rows, cols, layout(), &edges)
}

/// Pieces parked far off the board with 100-unit gaps, so nothing snaps by accident.
pub fn build_loose_state(rows: u32, cols: u32) -> PuzzleState {
    let mut state = build_state(rows, cols);
    for piece in &mut state.pieces {
        piece.pos = (
            piece.correct.0 + 3000.0 + 100.0 * piece.id as f32,
            piece.correct.1 + 3000.0,
        );
    }
    state
}

pub fn tolerances() -> SnapTolerances {
    SnapTolerances::default()
}

pub fn place(state: &mut PuzzleState, id: PieceId, offset: (f32, f32)) {
    let piece = &mut state.pieces[id];
    piece.pos = (piece.correct.0 + offset.0, piece.correct.1 + offset.1);
}

pub fn join(state: &mut PuzzleState, target: GroupId, ids: &[PieceId]) {
    for id in ids {
        let source = state.pieces[*id].group;
        state.merge_groups(target, source);
    }
}

pub fn assert_groups_rigid(state: &PuzzleState) {
    for group in state.group_ids() {
        let drift = state.group_drift(group);
        assert!(drift <= 1.0e-3, "group {group} drifted by {drift}");
    }
}

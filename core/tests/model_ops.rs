mod common;

use common::{assert_groups_rigid, build_state, join, layout, place};
use kumiawase_core::{assign_edges, compute_board_layout, PuzzleState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn layout_centers_board_in_stage() {
    let layout = layout();
    assert_eq!((layout.stage_width, layout.stage_height), (1520.0, 1120.0));
    assert_eq!(layout.board_origin(), (160.0, 160.0));

    let wide = compute_board_layout(1200.0, 800.0, 160.0, 2000.0, 0.0);
    assert_eq!(wide.stage_width, 2000.0);
    assert_eq!(wide.board_origin(), (400.0, 160.0));
}

#[test]
fn translate_ignores_non_finite_delta() {
    let mut state = build_state(2, 2);
    let before = state.pieces[0].pos;
    state.translate_group(0, f32::NAN, f32::INFINITY);
    assert_eq!(state.pieces[0].pos, before);
}

#[test]
fn merge_inherits_snapped_flag_from_target() {
    let mut state = build_state(2, 2);
    state.pieces[0].snapped = true;
    state.merge_groups(0, 1);
    assert!(state.pieces[1].snapped);
    state.merge_groups(2, 0);
    assert!(!state.pieces[2].snapped);
    assert_eq!(state.group_members(2), vec![0, 1, 2]);
}

#[test]
fn piece_at_prefers_the_topmost() {
    let mut state = build_state(4, 6);
    state.pieces[1].pos = state.pieces[0].pos;
    state.raise_group(1);
    assert_eq!(state.piece_at((170.0, 170.0)), Some(1));
    state.raise_group(0);
    assert_eq!(state.piece_at((170.0, 170.0)), Some(0));
    assert_eq!(state.piece_at((5.0, 5.0)), None);
}

#[test]
fn z_stays_compact_over_long_sessions() {
    let mut state = build_state(2, 2);
    for round in 0..500 {
        state.raise_group(round % 4);
    }
    assert!(state.max_z() <= 4 * 4 + 4);
    let order = state.z_order();
    assert_eq!(order.last(), Some(&3));
}

#[test]
fn recenter_moves_targets_and_locked_pieces_only() {
    let mut state = build_state(4, 6);
    state.pieces[0].snapped = true;
    place(&mut state, 1, (50.0, 60.0));
    let loose_before = state.pieces[1].pos;

    let moved = state.recenter(compute_board_layout(1200.0, 800.0, 160.0, 2000.0, 1120.0));
    assert_eq!(moved, (240.0, 0.0));
    assert_eq!(state.pieces[0].correct, (400.0, 160.0));
    assert_eq!(state.pieces[0].pos, (400.0, 160.0));
    assert_eq!(state.pieces[1].correct, (600.0, 160.0));
    assert_eq!(state.pieces[1].pos, loose_before);
}

#[test]
fn scatter_keeps_locked_groups_and_clears_the_board() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let edges = assign_edges(8, 12, &mut rng);
    let mut state = PuzzleState::new(8, 12, layout(), &edges);
    join(&mut state, 0, &[1, 12]);
    state.pieces[50].snapped = true;

    let moved = state.scatter_loose(&mut rng);
    assert_eq!(moved, 8 * 12 - 3);
    assert_eq!(state.pieces[50].pos, state.pieces[50].correct);
    let l = state.layout;
    for piece in state.pieces.iter().filter(|piece| !piece.snapped) {
        let (x, y) = piece.pos;
        let inside_board = x + state.piece_width > l.board_x
            && x < l.board_x + l.board_width
            && y + state.piece_height > l.board_y
            && y < l.board_y + l.board_height;
        assert!(!inside_board || piece.group == 0, "piece {} on board", piece.id);
        assert!(x >= -1.0e-3 && y >= -1.0e-3);
        assert!(x + state.piece_width <= l.stage_width + 1.0e-3);
        assert!(y + state.piece_height <= l.stage_height + 1.0e-3);
    }
    assert_groups_rigid(&state);
}

#[test]
fn reset_breaks_every_group() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut state = build_state(4, 6);
    join(&mut state, 0, &[1, 2, 3]);
    state.pieces[0].snapped = true;
    state.reset_layout(&mut rng);
    assert_eq!(state.group_ids().len(), 24);
    assert!(state.pieces.iter().all(|piece| !piece.snapped));
    let mut z: Vec<u32> = state.pieces.iter().map(|piece| piece.z).collect();
    z.sort_unstable();
    assert_eq!(z, (0..24).collect::<Vec<u32>>());
}

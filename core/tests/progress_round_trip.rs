mod common;

use common::{assert_groups_rigid, build_loose_state, join, place};
use kumiawase_core::{
    assign_edges, capture_progress, compute_board_layout, decode_text, encode_text,
    progress_key, restore_progress, CodecError, ProgressRecord, PuzzleState, RestoreError,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const KEY: &str = "kumiawase:progress:attic-door";

fn mid_game() -> PuzzleState {
    let mut state = build_loose_state(4, 6);
    join(&mut state, 0, &[1, 6]);
    for id in [0, 1, 6] {
        place(&mut state, id, (0.0, 0.0));
        state.pieces[id].snapped = true;
    }
    join(&mut state, 8, &[9]);
    place(&mut state, 8, (37.5, -12.25));
    place(&mut state, 9, (37.5, -12.25));
    place(&mut state, 20, (-140.0, 410.0));
    state.raise_group(8);
    state
}

fn same_group(state: &PuzzleState, a: usize, b: usize) -> bool {
    state.pieces[a].group == state.pieces[b].group
}

fn assert_matches_record(state: &PuzzleState, record: &ProgressRecord) {
    for (piece, saved) in state.pieces.iter().zip(&record.pieces) {
        assert_eq!(piece.label(), saved.id);
        let (rel_x, rel_y) = piece.offset();
        assert!((rel_x - saved.rel_x).abs() < 1.0e-3, "piece {} x", saved.id);
        assert!((rel_y - saved.rel_y).abs() < 1.0e-3, "piece {} y", saved.id);
        assert_eq!(piece.snapped, saved.snapped);
        assert_eq!(piece.z, saved.z);
    }
}

#[test]
fn offsets_survive_a_board_recenter() {
    let mut state = mid_game();
    let record = capture_progress(&state, KEY, 12_345, 99);
    assert_eq!(record.pieces.len(), 24);

    state.recenter(compute_board_layout(1200.0, 800.0, 160.0, 2000.0, 1400.0));
    restore_progress(&mut state, &record, KEY).expect("record applies");

    assert_matches_record(&state, &record);
    assert!(same_group(&state, 0, 6));
    assert!(same_group(&state, 8, 9));
    assert!(!same_group(&state, 8, 20));
    assert_eq!(state.pieces[0].pos, state.pieces[0].correct);
    assert_groups_rigid(&state);
}

#[test]
fn record_restores_onto_a_fresh_session() {
    let record = capture_progress(&mid_game(), KEY, 500, 1);
    let text = encode_text(&record).expect("record encodes");
    let decoded: ProgressRecord = decode_text(&text).expect("record decodes");
    assert_eq!(decoded, record);

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let edges = assign_edges(4, 6, &mut rng);
    let layout = compute_board_layout(1200.0, 800.0, 160.0, 1600.0, 1300.0);
    let mut fresh = PuzzleState::new(4, 6, layout, &edges);
    restore_progress(&mut fresh, &decoded, KEY).expect("record applies");
    assert_matches_record(&fresh, &decoded);
    assert_eq!(decoded.elapsed_ms, 500);
}

#[test]
fn rejected_record_leaves_state_untouched() {
    let mut state = mid_game();
    let record = capture_progress(&state, KEY, 0, 0);
    let before: Vec<(f32, f32)> = state.pieces.iter().map(|piece| piece.pos).collect();

    assert!(matches!(
        restore_progress(&mut state, &record, "kumiawase:progress:other"),
        Err(RestoreError::KeyMismatch { .. })
    ));

    let mut stale = record.clone();
    stale.version += 1;
    assert!(matches!(
        restore_progress(&mut state, &stale, KEY),
        Err(RestoreError::VersionMismatch { .. })
    ));

    let mut short = record.clone();
    short.pieces.pop();
    assert_eq!(
        restore_progress(&mut state, &short, KEY),
        Err(RestoreError::MissingPiece("3-5".to_string()))
    );

    let mut duplicated = record.clone();
    duplicated.pieces[1].id = "0-0".to_string();
    assert_eq!(
        restore_progress(&mut state, &duplicated, KEY),
        Err(RestoreError::DuplicatePiece("0-0".to_string()))
    );

    let mut unknown = record.clone();
    unknown.pieces[3].id = "9-9".to_string();
    assert_eq!(
        restore_progress(&mut state, &unknown, KEY),
        Err(RestoreError::UnknownPiece("9-9".to_string()))
    );

    let mut orphan = record.clone();
    orphan.pieces[3].group_id = "nope".to_string();
    assert!(matches!(
        restore_progress(&mut state, &orphan, KEY),
        Err(RestoreError::UnknownGroup(_))
    ));

    let mut broken = record;
    broken.pieces[5].rel_x = f32::NAN;
    assert!(matches!(
        restore_progress(&mut state, &broken, KEY),
        Err(RestoreError::NonFinite(_))
    ));

    let after: Vec<(f32, f32)> = state.pieces.iter().map(|piece| piece.pos).collect();
    assert_eq!(before, after);
}

#[test]
fn group_ids_always_name_a_member() {
    let mut state = mid_game();
    let mut record = capture_progress(&state, KEY, 0, 0);
    record.pieces[8].group_id = "3-5".to_string();
    record.pieces[9].group_id = "3-5".to_string();
    record.pieces[23].group_id = "3-4".to_string();
    restore_progress(&mut state, &record, KEY).expect("record applies");
    assert_eq!(state.pieces[8].group, 8);
    assert_eq!(state.pieces[9].group, 8);
    assert_eq!(state.pieces[23].group, 22);
    assert_eq!(state.pieces[22].group, 22);
}

#[test]
fn corrupt_text_is_an_error() {
    assert!(matches!(
        decode_text::<ProgressRecord>("%%% not base64 %%%"),
        Err(CodecError::Text(_))
    ));
    assert!(matches!(
        decode_text::<ProgressRecord>("AAECAwQFBgc="),
        Err(CodecError::Decode(_))
    ));
}

#[test]
fn keys_prefer_explicit_puzzle_id() {
    assert_eq!(
        progress_key(Some("attic-door"), "img/cat.jpg", 4, 6),
        "kumiawase:progress:attic-door"
    );
    assert_eq!(
        progress_key(Some("  "), "img/cat.jpg", 4, 6),
        "kumiawase:progress:img/cat.jpg:4x6"
    );
    assert_ne!(
        progress_key(None, "img/cat.jpg", 4, 6),
        progress_key(None, "img/cat.jpg", 6, 4)
    );
}

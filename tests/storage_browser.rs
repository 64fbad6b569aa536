#![cfg(target_arch = "wasm32")]

use kumiawase::local_snapshot::{clear_progress, default_store, load_progress, save_progress};
use kumiawase_core::{PieceProgress, ProgressRecord, PROGRESS_VERSION};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const KEY: &str = "kumiawase:progress:browser-smoke";

#[wasm_bindgen_test]
fn local_storage_round_trips_a_record() {
    let store = default_store();
    let record = ProgressRecord {
        version: PROGRESS_VERSION,
        key: KEY.to_string(),
        pieces: vec![PieceProgress {
            id: "0-0".to_string(),
            rel_x: -3.5,
            rel_y: 8.0,
            group_id: "0-0".to_string(),
            snapped: false,
            z: 0,
        }],
        elapsed_ms: 1_000,
        saved_at_ms: 2_000,
    };
    save_progress(store.as_ref(), &record).expect("storage available");
    assert_eq!(load_progress(store.as_ref(), KEY), Some(record));
    clear_progress(store.as_ref(), KEY);
    assert_eq!(load_progress(store.as_ref(), KEY), None);
}

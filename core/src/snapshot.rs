use std::collections::HashMap;
use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::model::{GroupId, PieceId, PuzzleState};

pub const PROGRESS_VERSION: u32 = 1;
pub const PROGRESS_KEY_PREFIX: &str = "kumiawase:progress";

/// One piece's saved placement, relative to its solved position.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceProgress {
    pub id: String,
    pub rel_x: f32,
    pub rel_y: f32,
    pub group_id: String,
    pub snapped: bool,
    pub z: u32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub version: u32,
    pub key: String,
    pub pieces: Vec<PieceProgress>,
    pub elapsed_ms: u64,
    pub saved_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    VersionMismatch { found: u32 },
    KeyMismatch { found: String },
    MissingPiece(String),
    UnknownPiece(String),
    UnknownGroup(String),
    NonFinite(String),
    DuplicatePiece(String),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreError::VersionMismatch { found } => {
                write!(f, "record version {found}, expected {PROGRESS_VERSION}")
            }
            RestoreError::KeyMismatch { found } => write!(f, "record belongs to {found}"),
            RestoreError::MissingPiece(id) => write!(f, "piece {id} missing from record"),
            RestoreError::UnknownPiece(id) => write!(f, "unknown piece {id}"),
            RestoreError::UnknownGroup(id) => write!(f, "unknown group {id}"),
            RestoreError::NonFinite(id) => write!(f, "non-finite offset for piece {id}"),
            RestoreError::DuplicatePiece(id) => write!(f, "piece {id} listed twice"),
        }
    }
}

impl std::error::Error for RestoreError {}

/// Storage key for a puzzle: the explicit id when given, otherwise derived from the image
/// and grid so a different cut of the same image gets its own record.
pub fn progress_key(puzzle_id: Option<&str>, image_src: &str, rows: u32, cols: u32) -> String {
    match puzzle_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("{PROGRESS_KEY_PREFIX}:{id}"),
        None => format!("{PROGRESS_KEY_PREFIX}:{}:{rows}x{cols}", image_src.trim()),
    }
}

pub fn capture_progress(
    state: &PuzzleState,
    key: &str,
    elapsed_ms: u64,
    saved_at_ms: u64,
) -> ProgressRecord {
    let pieces = state
        .pieces
        .iter()
        .map(|piece| {
            let (rel_x, rel_y) = piece.offset();
            let group_label = state
                .piece(piece.group)
                .map(|owner| owner.label())
                .unwrap_or_else(|| piece.label());
            PieceProgress {
                id: piece.label(),
                rel_x,
                rel_y,
                group_id: group_label,
                snapped: piece.snapped,
                z: piece.z,
            }
        })
        .collect();
    ProgressRecord {
        version: PROGRESS_VERSION,
        key: key.to_string(),
        pieces,
        elapsed_ms,
        saved_at_ms,
    }
}

struct Placement {
    rel: (f32, f32),
    group_label: PieceId,
    snapped: bool,
    z: u32,
}

/// Applies a saved record onto freshly computed targets. Validation happens before any
/// piece is touched, so a rejected record leaves `state` unchanged.
pub fn restore_progress(
    state: &mut PuzzleState,
    record: &ProgressRecord,
    expected_key: &str,
) -> Result<(), RestoreError> {
    if record.version != PROGRESS_VERSION {
        return Err(RestoreError::VersionMismatch {
            found: record.version,
        });
    }
    if record.key != expected_key {
        return Err(RestoreError::KeyMismatch {
            found: record.key.clone(),
        });
    }

    let total = state.total();
    let mut placements: Vec<Option<Placement>> = (0..total).map(|_| None).collect();
    for entry in &record.pieces {
        let id = state
            .piece_by_label(&entry.id)
            .ok_or_else(|| RestoreError::UnknownPiece(entry.id.clone()))?;
        let group_label = state
            .piece_by_label(&entry.group_id)
            .ok_or_else(|| RestoreError::UnknownGroup(entry.group_id.clone()))?;
        if !entry.rel_x.is_finite() || !entry.rel_y.is_finite() {
            return Err(RestoreError::NonFinite(entry.id.clone()));
        }
        let slot = &mut placements[id];
        if slot.is_some() {
            return Err(RestoreError::DuplicatePiece(entry.id.clone()));
        }
        *slot = Some(Placement {
            rel: (entry.rel_x, entry.rel_y),
            group_label,
            snapped: entry.snapped,
            z: entry.z,
        });
    }
    let mut resolved = Vec::with_capacity(total);
    for (id, placement) in placements.into_iter().enumerate() {
        match placement {
            Some(placement) => resolved.push(placement),
            None => {
                let label = state
                    .piece(id)
                    .map(|piece| piece.label())
                    .unwrap_or_else(|| id.to_string());
                return Err(RestoreError::MissingPiece(label));
            }
        }
    }

    // Name each group after its labelled piece when that piece is a member, else after
    // its smallest member, so a group id always names one of its own pieces.
    let mut smallest: HashMap<PieceId, PieceId> = HashMap::new();
    for (id, placement) in resolved.iter().enumerate() {
        smallest.entry(placement.group_label).or_insert(id);
    }
    let group_for = |label: PieceId| -> GroupId {
        let label_is_member = resolved
            .get(label)
            .map(|placement| placement.group_label == label)
            .unwrap_or(false);
        if label_is_member {
            label
        } else {
            smallest.get(&label).copied().unwrap_or(label)
        }
    };
    let groups: Vec<GroupId> = resolved
        .iter()
        .map(|placement| group_for(placement.group_label))
        .collect();

    for (piece, (placement, group)) in state.pieces.iter_mut().zip(resolved.iter().zip(groups)) {
        piece.pos = (
            piece.correct.0 + placement.rel.0,
            piece.correct.1 + placement.rel.1,
        );
        piece.group = group;
        piece.snapped = placement.snapped;
        piece.z = placement.z;
    }
    for group in state.group_ids() {
        state.normalize_group_to_correct_offsets(group);
    }
    Ok(())
}

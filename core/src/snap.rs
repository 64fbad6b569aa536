use crate::game::{
    distance, finite_or_zero, screen_to_stage_tolerance, BOARD_SNAP_TOLERANCE_PX_DEFAULT,
    DIR_DOWN, DIR_RIGHT, EPSILON_MAX, EPSILON_MIN, NEIGHBOR_SNAP_TOLERANCE_PX_DEFAULT,
    RIGID_EPSILON_DEFAULT, SNAP_TOLERANCE_PX_MAX, SNAP_TOLERANCE_PX_MIN, SOLVED_EPSILON_DEFAULT,
};
use crate::model::{GroupId, PuzzleState};

/// Snap thresholds. Pixel tolerances are in screen pixels and get divided by the active
/// scale at comparison time; epsilons are in stage units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapTolerances {
    pub board_px: f32,
    pub neighbor_px: f32,
    pub rigid_epsilon: f32,
    pub solved_epsilon: f32,
}

impl Default for SnapTolerances {
    fn default() -> Self {
        Self {
            board_px: BOARD_SNAP_TOLERANCE_PX_DEFAULT,
            neighbor_px: NEIGHBOR_SNAP_TOLERANCE_PX_DEFAULT,
            rigid_epsilon: RIGID_EPSILON_DEFAULT,
            solved_epsilon: SOLVED_EPSILON_DEFAULT,
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

impl SnapTolerances {
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            board_px: clamp_or(
                self.board_px,
                SNAP_TOLERANCE_PX_MIN,
                SNAP_TOLERANCE_PX_MAX,
                defaults.board_px,
            ),
            neighbor_px: clamp_or(
                self.neighbor_px,
                SNAP_TOLERANCE_PX_MIN,
                SNAP_TOLERANCE_PX_MAX,
                defaults.neighbor_px,
            ),
            rigid_epsilon: clamp_or(
                self.rigid_epsilon,
                EPSILON_MIN,
                EPSILON_MAX,
                defaults.rigid_epsilon,
            ),
            solved_epsilon: clamp_or(
                self.solved_epsilon,
                EPSILON_MIN,
                EPSILON_MAX,
                defaults.solved_epsilon,
            ),
        }
    }
}

/// What a settle pass did to the released group.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettleOutcome {
    /// Group id the released pieces ended up in.
    pub group: GroupId,
    pub board_snapped: bool,
    pub merges: usize,
    /// Anchor displacement caused by snapping, pre-snap minus post-snap.
    pub correction: (f32, f32),
}

impl SettleOutcome {
    pub fn snapped_anything(&self) -> bool {
        self.board_snapped || self.merges > 0
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Median `correct - pos` translation of a group and the worst member's distance from it.
pub fn board_delta(state: &PuzzleState, group: GroupId) -> Option<((f32, f32), f32)> {
    let deltas: Vec<(f32, f32)> = state
        .pieces
        .iter()
        .filter(|piece| piece.group == group)
        .map(|piece| {
            (
                piece.correct.0 - piece.pos.0,
                piece.correct.1 - piece.pos.1,
            )
        })
        .collect();
    if deltas.is_empty() {
        return None;
    }
    let mut xs: Vec<f32> = deltas.iter().map(|d| d.0).collect();
    let mut ys: Vec<f32> = deltas.iter().map(|d| d.1).collect();
    let median_delta = (median(&mut xs), median(&mut ys));
    let residual = deltas
        .iter()
        .map(|delta| distance(*delta, median_delta))
        .fold(0.0, f32::max);
    Some((median_delta, residual))
}

/// Locks the group onto the board when it is a rigid translation of its solved layout
/// and that translation is within tolerance at the current scale.
pub fn snap_group_to_board_if_close(
    state: &mut PuzzleState,
    group: GroupId,
    scale: f32,
    tolerances: &SnapTolerances,
) -> bool {
    if state.group_is_snapped(group) {
        return false;
    }
    let Some((delta, residual)) = board_delta(state, group) else {
        return false;
    };
    if !residual.is_finite() || residual > tolerances.rigid_epsilon {
        return false;
    }
    let reach = distance(delta, (0.0, 0.0));
    if !reach.is_finite() || reach > screen_to_stage_tolerance(tolerances.board_px, scale) {
        return false;
    }
    state.translate_group(group, delta.0, delta.1);
    for piece in state.pieces.iter_mut().filter(|piece| piece.group == group) {
        piece.pos = piece.correct;
        piece.snapped = true;
    }
    true
}

/// Folds every grid neighbor that sits within tolerance of its assembled position into
/// `group`, repeating until a full pass merges nothing. Returns the merge count.
pub fn snap_and_merge_neighbors(
    state: &mut PuzzleState,
    group: GroupId,
    scale: f32,
    tolerances: &SnapTolerances,
) -> usize {
    let tolerance = screen_to_stage_tolerance(tolerances.neighbor_px, scale);
    let mut merges = 0;
    loop {
        let mut merged_this_pass = false;
        for member in state.group_members(group) {
            for dir in 0..4 {
                let Some(neighbor) = state.pieces[member].neighbors[dir] else {
                    continue;
                };
                let piece = &state.pieces[member];
                let other = &state.pieces[neighbor];
                if other.group == group {
                    continue;
                }
                let expected = (
                    piece.pos.0 + (other.correct.0 - piece.correct.0),
                    piece.pos.1 + (other.correct.1 - piece.correct.1),
                );
                let gap = distance(other.pos, expected);
                if !gap.is_finite() || gap > tolerance {
                    continue;
                }
                // A locked cluster never moves to meet a loose one; the loose side comes to it.
                let other_group = other.group;
                let other_snapped = state.group_is_snapped(other_group);
                let active_snapped = state.group_is_snapped(group);
                if other_snapped && !active_snapped {
                    let dx = finite_or_zero(other.pos.0 - expected.0);
                    let dy = finite_or_zero(other.pos.1 - expected.1);
                    state.translate_group(group, dx, dy);
                } else {
                    let dx = finite_or_zero(expected.0 - other.pos.0);
                    let dy = finite_or_zero(expected.1 - other.pos.1);
                    state.translate_group(other_group, dx, dy);
                }
                state.merge_groups(group, other_group);
                if other_snapped {
                    for piece in state.pieces.iter_mut().filter(|piece| piece.group == group) {
                        piece.snapped = true;
                    }
                }
                state.normalize_group_to_correct_offsets(group);
                merges += 1;
                merged_this_pass = true;
            }
        }
        if !merged_this_pass {
            return merges;
        }
    }
}

/// Full post-release pass: renormalize, try the board, merge neighbors to a fixpoint,
/// then try the board again with the grown cluster.
pub fn settle_group(
    state: &mut PuzzleState,
    group: GroupId,
    scale: f32,
    tolerances: &SnapTolerances,
) -> SettleOutcome {
    let anchor = state.group_members(group).first().copied();
    let before = anchor.and_then(|id| state.piece(id)).map(|piece| piece.pos);

    state.normalize_group_to_correct_offsets(group);
    let mut board_snapped = snap_group_to_board_if_close(state, group, scale, tolerances);
    let merges = snap_and_merge_neighbors(state, group, scale, tolerances);
    if merges > 0 {
        board_snapped |= snap_group_to_board_if_close(state, group, scale, tolerances);
    }

    let after = anchor.and_then(|id| state.piece(id)).map(|piece| piece.pos);
    let correction = match (before, after) {
        (Some(before), Some(after)) if board_snapped || merges > 0 => (
            finite_or_zero(before.0 - after.0),
            finite_or_zero(before.1 - after.1),
        ),
        _ => (0.0, 0.0),
    };
    SettleOutcome {
        group,
        board_snapped,
        merges,
        correction,
    }
}

pub fn is_complete(state: &PuzzleState, solved_epsilon: f32) -> bool {
    let Some(first) = state.pieces.first() else {
        return false;
    };
    let group = first.group;
    state.pieces.iter().all(|piece| {
        piece.group == group && distance(piece.pos, piece.correct) <= solved_epsilon
    })
}

/// Fraction of interior grid edges whose two pieces share a group, in `0.0..=1.0`.
pub fn progress(state: &PuzzleState) -> f32 {
    let mut edges = 0usize;
    let mut joined = 0usize;
    for piece in &state.pieces {
        for neighbor in [piece.neighbors[DIR_RIGHT], piece.neighbors[DIR_DOWN]]
            .into_iter()
            .flatten()
        {
            edges += 1;
            if state.pieces.get(neighbor).map(|other| other.group) == Some(piece.group) {
                joined += 1;
            }
        }
    }
    if edges == 0 {
        return if state.pieces.is_empty() { 0.0 } else { 1.0 };
    }
    joined as f32 / edges as f32
}

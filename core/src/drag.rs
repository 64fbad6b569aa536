use crate::game::{ease_out_cubic, finite_or_zero, MAGNET_DURATION_MS_DEFAULT, MAGNET_MAX_OFFSET};
use crate::model::{GroupId, PieceId, PuzzleState};
use crate::snap::{settle_group, SettleOutcome, SnapTolerances};
use crate::viewport::ViewRect;

#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub pointer_id: i32,
    pub group: GroupId,
    pub anchor: PieceId,
    pub members: Vec<PieceId>,
    pub start_positions: Vec<(f32, f32)>,
    /// Pointer position minus the anchor's start position, in stage units.
    pub grab_offset: (f32, f32),
    /// Cell-rect bounds of the group at pickup: (min_x, min_y, max_x, max_y).
    pub start_bounds: (f32, f32, f32, f32),
    /// Render-only offset shared by every member until release.
    pub delta: (f32, f32),
    pending: Option<(f32, f32)>,
}

impl DragSession {
    pub fn has_pending_move(&self) -> bool {
        self.pending.is_some()
    }

    fn clamp_delta(&self, intended: (f32, f32), visible: &ViewRect) -> (f32, f32) {
        let (min_x, min_y, max_x, max_y) = self.start_bounds;
        let clamp_axis = |value: f32, lo: f32, hi: f32| {
            if lo > hi {
                (lo + hi) * 0.5
            } else {
                value.clamp(lo, hi)
            }
        };
        (
            clamp_axis(
                finite_or_zero(intended.0),
                visible.min_x - min_x,
                visible.max_x() - max_x,
            ),
            clamp_axis(
                finite_or_zero(intended.1),
                visible.min_y - min_y,
                visible.max_y() - max_y,
            ),
        )
    }

    fn apply_pending(&mut self, visible: &ViewRect) -> bool {
        let Some(point) = self.pending.take() else {
            return false;
        };
        let anchor_start = self.start_positions.first().copied().unwrap_or((0.0, 0.0));
        let intended = (
            point.0 - self.grab_offset.0 - anchor_start.0,
            point.1 - self.grab_offset.1 - anchor_start.1,
        );
        let delta = self.clamp_delta(intended, visible);
        let changed = delta != self.delta;
        self.delta = delta;
        changed
    }
}

/// Cosmetic ease of a freshly snapped group from a small offset back to zero.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapAnimation {
    pub members: Vec<PieceId>,
    pub offset: (f32, f32),
    pub started_ms: f64,
    pub duration_ms: f32,
}

impl SnapAnimation {
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        (((now_ms - self.started_ms) as f32) / self.duration_ms).clamp(0.0, 1.0)
    }

    pub fn offset_at(&self, now_ms: f64) -> (f32, f32) {
        let remaining = 1.0 - ease_out_cubic(self.progress(now_ms));
        (self.offset.0 * remaining, self.offset.1 * remaining)
    }

    pub fn is_finished(&self, now_ms: f64) -> bool {
        self.progress(now_ms) >= 1.0
    }
}

/// Caps a snap correction to the magnet's maximum visual offset, keeping its direction.
pub fn magnet_offset(correction: (f32, f32)) -> (f32, f32) {
    let x = finite_or_zero(correction.0);
    let y = finite_or_zero(correction.1);
    let len = (x * x + y * y).sqrt();
    if len <= MAGNET_MAX_OFFSET || len <= f32::EPSILON {
        return (x, y);
    }
    let k = MAGNET_MAX_OFFSET / len;
    (x * k, y * k)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(DragSession),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragMachine {
    phase: DragPhase,
    magnet: Option<SnapAnimation>,
    magnet_duration_ms: f32,
}

impl Default for DragMachine {
    fn default() -> Self {
        Self::new(MAGNET_DURATION_MS_DEFAULT)
    }
}

impl DragMachine {
    pub fn new(magnet_duration_ms: f32) -> Self {
        Self {
            phase: DragPhase::Idle,
            magnet: None,
            magnet_duration_ms: finite_or_zero(magnet_duration_ms).max(0.0),
        }
    }

    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.phase {
            DragPhase::Dragging(session) => Some(session),
            DragPhase::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.session().is_some()
    }

    pub fn dragging_pointer(&self) -> Option<i32> {
        self.session().map(|session| session.pointer_id)
    }

    pub fn magnet(&self) -> Option<&SnapAnimation> {
        self.magnet.as_ref()
    }

    /// Starts dragging the group under `piece`. Ignored while another drag is active or
    /// when the group is locked to the board.
    pub fn pointer_down(
        &mut self,
        state: &mut PuzzleState,
        piece: PieceId,
        pointer_id: i32,
        point: (f32, f32),
    ) -> bool {
        if self.is_dragging() {
            return false;
        }
        let Some(group) = state.group_of(piece) else {
            return false;
        };
        if state.group_is_snapped(group) {
            return false;
        }
        let mut members = state.group_members(group);
        members.sort_by_key(|id| *id != piece);
        let start_positions: Vec<(f32, f32)> = members
            .iter()
            .filter_map(|id| state.piece(*id).map(|piece| piece.pos))
            .collect();
        let Some(anchor_start) = start_positions.first().copied() else {
            return false;
        };
        let Some(start_bounds) = state.group_bounds(group) else {
            return false;
        };
        state.raise_group(group);
        self.magnet = None;
        self.phase = DragPhase::Dragging(DragSession {
            pointer_id,
            group,
            anchor: piece,
            members,
            start_positions,
            grab_offset: (
                finite_or_zero(point.0 - anchor_start.0),
                finite_or_zero(point.1 - anchor_start.1),
            ),
            start_bounds,
            delta: (0.0, 0.0),
            pending: None,
        });
        true
    }

    /// Records the latest pointer position. Returns true when a frame should be requested,
    /// i.e. no update is already pending.
    pub fn pointer_move(&mut self, pointer_id: i32, point: (f32, f32)) -> bool {
        let DragPhase::Dragging(session) = &mut self.phase else {
            return false;
        };
        if session.pointer_id != pointer_id || !point.0.is_finite() || !point.1.is_finite() {
            return false;
        }
        let request = session.pending.is_none();
        session.pending = Some(point);
        request
    }

    /// Applies the coalesced move, clamped to the visible stage rect. Returns true when
    /// the render offset changed.
    pub fn animation_frame(&mut self, visible: &ViewRect) -> bool {
        match &mut self.phase {
            DragPhase::Dragging(session) => session.apply_pending(visible),
            DragPhase::Idle => false,
        }
    }

    /// Commits the transient offset and settles the group. A cancel ends the gesture the
    /// same way.
    pub fn pointer_up(
        &mut self,
        state: &mut PuzzleState,
        pointer_id: i32,
        visible: &ViewRect,
        scale: f32,
        tolerances: &SnapTolerances,
        now_ms: f64,
    ) -> Option<SettleOutcome> {
        match &self.phase {
            DragPhase::Dragging(session) if session.pointer_id == pointer_id => {}
            _ => return None,
        }
        let DragPhase::Dragging(mut session) = std::mem::take(&mut self.phase) else {
            return None;
        };
        session.apply_pending(visible);
        let (dx, dy) = session.delta;
        for (id, start) in session.members.iter().zip(&session.start_positions) {
            if let Some(piece) = state.pieces.get_mut(*id) {
                if piece.group == session.group {
                    piece.pos = (start.0 + dx, start.1 + dy);
                }
            }
        }
        let released = state.piece(session.anchor).map(|piece| piece.pos);
        let outcome = settle_group(state, session.group, scale, tolerances);
        if outcome.snapped_anything() {
            // Measured on the held piece; clusters it joined did not move.
            let settled = state.piece(session.anchor).map(|piece| piece.pos);
            let correction = match (released, settled) {
                (Some(before), Some(after)) => (before.0 - after.0, before.1 - after.1),
                _ => (0.0, 0.0),
            };
            let offset = magnet_offset(correction);
            if offset != (0.0, 0.0) && self.magnet_duration_ms > 0.0 {
                self.magnet = Some(SnapAnimation {
                    members: session.members,
                    offset,
                    started_ms: now_ms,
                    duration_ms: self.magnet_duration_ms,
                });
            }
        }
        Some(outcome)
    }

    pub fn cancel(
        &mut self,
        state: &mut PuzzleState,
        pointer_id: i32,
        visible: &ViewRect,
        scale: f32,
        tolerances: &SnapTolerances,
        now_ms: f64,
    ) -> Option<SettleOutcome> {
        self.pointer_up(state, pointer_id, visible, scale, tolerances, now_ms)
    }

    /// Drops any active gesture without touching piece positions.
    pub fn abort(&mut self) {
        self.phase = DragPhase::Idle;
        self.magnet = None;
    }

    /// Rendering-only displacement for a piece at `now_ms`.
    pub fn render_offset(&self, piece: PieceId, now_ms: f64) -> (f32, f32) {
        if let DragPhase::Dragging(session) = &self.phase {
            if session.members.contains(&piece) {
                return session.delta;
            }
        }
        match &self.magnet {
            Some(magnet) if magnet.members.contains(&piece) => magnet.offset_at(now_ms),
            _ => (0.0, 0.0),
        }
    }

    /// Clears a finished magnet animation. Returns true while one is still running.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if let Some(magnet) = &self.magnet {
            if magnet.is_finished(now_ms) {
                self.magnet = None;
            }
        }
        self.magnet.is_some()
    }
}

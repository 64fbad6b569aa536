use std::collections::HashMap;

use kumiawase_core::game::distance;
use kumiawase_core::PieceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
    Unknown,
}

impl PointerKind {
    pub fn from_pointer_type(value: &str) -> Self {
        match value {
            "mouse" => PointerKind::Mouse,
            "touch" => PointerKind::Touch,
            "pen" => PointerKind::Pen,
            _ => PointerKind::Unknown,
        }
    }
}

/// A non-piece pointer, in element-local client pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
    pub kind: PointerKind,
}

/// What the session should do with a pointer event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureAction {
    Ignore,
    /// The pointer went down on a piece; start a drag.
    BeginDrag { piece: PieceId, pointer_id: i32 },
    DragMove { pointer_id: i32 },
    DragEnd { pointer_id: i32, cancelled: bool },
    /// One background pointer moved by a client-pixel delta.
    Pan { dx: f32, dy: f32 },
    /// Two background pointers moved; zoom by the distance ratio at the midpoint.
    Pinch {
        previous_distance: f32,
        distance: f32,
        midpoint: (f32, f32),
    },
    /// The pointer was tracked; nothing moves yet.
    Track,
}

/// Pointer bookkeeping for one interactive surface. A pointer that lands on a piece
/// drives the drag; other pointers pan (one) or pinch (two or more).
#[derive(Clone, Debug, Default)]
pub struct GesturePolicy {
    drag_pointer: Option<i32>,
    background: HashMap<i32, PointerSample>,
    pinch_distance: Option<f32>,
}

impl GesturePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_pointer(&self) -> Option<i32> {
        self.drag_pointer
    }

    pub fn background_count(&self) -> usize {
        self.background.len()
    }

    pub fn is_tracking(&self, id: i32) -> bool {
        self.drag_pointer == Some(id) || self.background.contains_key(&id)
    }

    /// `target` is the piece under the pointer, if any. A piece press while another
    /// gesture is running is treated as background.
    pub fn pointer_down(
        &mut self,
        id: i32,
        local: (f32, f32),
        kind: PointerKind,
        target: Option<PieceId>,
    ) -> GestureAction {
        if self.is_tracking(id) {
            return GestureAction::Ignore;
        }
        if let Some(piece) = target {
            if self.drag_pointer.is_none() && self.background.is_empty() {
                return GestureAction::BeginDrag {
                    piece,
                    pointer_id: id,
                };
            }
        }
        self.background.insert(
            id,
            PointerSample {
                x: local.0,
                y: local.1,
                kind,
            },
        );
        self.pinch_distance = self.pinch_pair().map(|(a, b)| distance(a, b));
        GestureAction::Track
    }

    /// Confirms a drag the session accepted for `id`.
    pub fn drag_started(&mut self, id: i32) {
        self.drag_pointer = Some(id);
    }

    pub fn pointer_move(&mut self, id: i32, local: (f32, f32)) -> GestureAction {
        if self.drag_pointer == Some(id) {
            return GestureAction::DragMove { pointer_id: id };
        }
        if !local.0.is_finite() || !local.1.is_finite() {
            return GestureAction::Ignore;
        }
        let Some(sample) = self.background.get_mut(&id) else {
            return GestureAction::Ignore;
        };
        let (dx, dy) = (local.0 - sample.x, local.1 - sample.y);
        sample.x = local.0;
        sample.y = local.1;
        if self.background.len() == 1 {
            return GestureAction::Pan { dx, dy };
        }
        let Some((a, b)) = self.pinch_pair() else {
            return GestureAction::Ignore;
        };
        let current = distance(a, b);
        let midpoint = ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
        match self.pinch_distance.replace(current) {
            Some(previous_distance) if previous_distance > 0.0 => GestureAction::Pinch {
                previous_distance,
                distance: current,
                midpoint,
            },
            _ => GestureAction::Track,
        }
    }

    pub fn pointer_up(&mut self, id: i32, cancelled: bool) -> GestureAction {
        if self.drag_pointer == Some(id) {
            self.drag_pointer = None;
            return GestureAction::DragEnd {
                pointer_id: id,
                cancelled,
            };
        }
        if self.background.remove(&id).is_none() {
            return GestureAction::Ignore;
        }
        self.pinch_distance = self.pinch_pair().map(|(a, b)| distance(a, b));
        GestureAction::Track
    }

    pub fn clear(&mut self) {
        self.drag_pointer = None;
        self.background.clear();
        self.pinch_distance = None;
    }

    /// The two lowest-id background pointers.
    fn pinch_pair(&self) -> Option<((f32, f32), (f32, f32))> {
        let mut ids: Vec<i32> = self.background.keys().copied().collect();
        if ids.len() < 2 {
            return None;
        }
        ids.sort_unstable();
        let a = self.background.get(&ids[0])?;
        let b = self.background.get(&ids[1])?;
        Some(((a.x, a.y), (b.x, b.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_press_begins_a_drag() {
        let mut policy = GesturePolicy::new();
        let action = policy.pointer_down(7, (10.0, 10.0), PointerKind::Mouse, Some(3));
        assert_eq!(
            action,
            GestureAction::BeginDrag {
                piece: 3,
                pointer_id: 7
            }
        );
        policy.drag_started(7);
        assert_eq!(
            policy.pointer_move(7, (20.0, 10.0)),
            GestureAction::DragMove { pointer_id: 7 }
        );
        assert_eq!(
            policy.pointer_up(7, true),
            GestureAction::DragEnd {
                pointer_id: 7,
                cancelled: true
            }
        );
        assert_eq!(policy.drag_pointer(), None);
    }

    #[test]
    fn single_background_pointer_pans() {
        let mut policy = GesturePolicy::new();
        policy.pointer_down(1, (100.0, 100.0), PointerKind::Touch, None);
        assert_eq!(
            policy.pointer_move(1, (130.0, 90.0)),
            GestureAction::Pan { dx: 30.0, dy: -10.0 }
        );
        assert_eq!(policy.pointer_move(9, (0.0, 0.0)), GestureAction::Ignore);
    }

    #[test]
    fn two_background_pointers_pinch_at_the_midpoint() {
        let mut policy = GesturePolicy::new();
        policy.pointer_down(1, (100.0, 100.0), PointerKind::Touch, None);
        policy.pointer_down(2, (200.0, 100.0), PointerKind::Touch, None);
        let action = policy.pointer_move(2, (300.0, 100.0));
        assert_eq!(
            action,
            GestureAction::Pinch {
                previous_distance: 100.0,
                distance: 200.0,
                midpoint: (200.0, 100.0)
            }
        );
        policy.pointer_up(2, false);
        assert_eq!(
            policy.pointer_move(1, (110.0, 100.0)),
            GestureAction::Pan { dx: 10.0, dy: 0.0 }
        );
    }

    #[test]
    fn piece_press_during_a_pan_joins_the_pinch() {
        let mut policy = GesturePolicy::new();
        policy.pointer_down(1, (0.0, 0.0), PointerKind::Touch, None);
        let action = policy.pointer_down(2, (50.0, 0.0), PointerKind::Touch, Some(4));
        assert_eq!(action, GestureAction::Track);
        assert_eq!(policy.background_count(), 2);
        assert_eq!(policy.drag_pointer(), None);
    }

    #[test]
    fn pointer_kind_parses_dom_names() {
        assert_eq!(PointerKind::from_pointer_type("pen"), PointerKind::Pen);
        assert_eq!(PointerKind::from_pointer_type("?"), PointerKind::Unknown);
    }
}

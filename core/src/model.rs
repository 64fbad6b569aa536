use rand::Rng;

use crate::edges::EdgeMap;
use crate::game::{
    finite_or_zero, neighbor_index, piece_label, DIRS, SCATTER_MARGIN_MAX, SCATTER_MARGIN_MIN,
};

pub type PieceId = usize;
/// A group is named after one of its members; merges only ever fold a source group into
/// a target, so the naming piece never leaves its group.
pub type GroupId = usize;

/// Board rectangle centered in the stage, all in stage units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardLayout {
    pub board_x: f32,
    pub board_y: f32,
    pub board_width: f32,
    pub board_height: f32,
    pub stage_width: f32,
    pub stage_height: f32,
    pub scatter_margin: f32,
}

impl BoardLayout {
    pub fn board_origin(&self) -> (f32, f32) {
        (self.board_x, self.board_y)
    }
}

/// Sizes the stage to hold the board plus its scatter ring, grown on either axis to cover
/// the visible viewport (given in stage units).
pub fn compute_board_layout(
    board_width: f32,
    board_height: f32,
    scatter_margin: f32,
    viewport_width: f32,
    viewport_height: f32,
) -> BoardLayout {
    let board_width = finite_or_zero(board_width).max(1.0);
    let board_height = finite_or_zero(board_height).max(1.0);
    let margin = finite_or_zero(scatter_margin).clamp(SCATTER_MARGIN_MIN, SCATTER_MARGIN_MAX);
    let stage_width = (board_width + margin * 2.0).max(finite_or_zero(viewport_width));
    let stage_height = (board_height + margin * 2.0).max(finite_or_zero(viewport_height));
    BoardLayout {
        board_x: (stage_width - board_width) * 0.5,
        board_y: (stage_height - board_height) * 0.5,
        board_width,
        board_height,
        stage_width,
        stage_height,
        scatter_margin: margin,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Piece {
    pub id: PieceId,
    pub row: u32,
    pub col: u32,
    pub edges: EdgeMap,
    pub correct: (f32, f32),
    pub neighbors: [Option<PieceId>; 4],
    pub pos: (f32, f32),
    pub group: GroupId,
    pub z: u32,
    pub snapped: bool,
}

impl Piece {
    pub fn label(&self) -> String {
        piece_label(self.row, self.col)
    }

    /// Displacement from the solved position (`pos - correct`).
    pub fn offset(&self) -> (f32, f32) {
        (self.pos.0 - self.correct.0, self.pos.1 - self.correct.1)
    }
}

#[derive(Clone, Debug)]
pub struct PuzzleState {
    pub rows: u32,
    pub cols: u32,
    pub piece_width: f32,
    pub piece_height: f32,
    pub layout: BoardLayout,
    pub pieces: Vec<Piece>,
}

fn correct_position(layout: &BoardLayout, row: u32, col: u32, pw: f32, ph: f32) -> (f32, f32) {
    (
        layout.board_x + col as f32 * pw,
        layout.board_y + row as f32 * ph,
    )
}

impl PuzzleState {
    /// Pieces start solved-in-place, each in its own group; callers scatter afterwards.
    pub fn new(rows: u32, cols: u32, layout: BoardLayout, edges: &[EdgeMap]) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let piece_width = layout.board_width / cols as f32;
        let piece_height = layout.board_height / rows as f32;
        let total = (rows * cols) as usize;
        let mut pieces = Vec::with_capacity(total);
        for row in 0..rows {
            for col in 0..cols {
                let id = (row * cols + col) as usize;
                let mut neighbors = [None; 4];
                for dir in DIRS {
                    neighbors[dir] = neighbor_index(id, cols as usize, rows as usize, dir);
                }
                let correct = correct_position(&layout, row, col, piece_width, piece_height);
                pieces.push(Piece {
                    id,
                    row,
                    col,
                    edges: edges.get(id).copied().unwrap_or(EdgeMap::FLAT),
                    correct,
                    neighbors,
                    pos: correct,
                    group: id,
                    z: id as u32,
                    snapped: false,
                });
            }
        }
        Self {
            rows,
            cols,
            piece_width,
            piece_height,
            layout,
            pieces,
        }
    }

    pub fn total(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id)
    }

    pub fn piece_by_label(&self, label: &str) -> Option<PieceId> {
        let (row, col) = crate::game::parse_piece_label(label)?;
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row * self.cols + col) as usize)
    }

    pub fn group_of(&self, id: PieceId) -> Option<GroupId> {
        self.pieces.get(id).map(|piece| piece.group)
    }

    pub fn group_members(&self, group: GroupId) -> Vec<PieceId> {
        self.pieces
            .iter()
            .filter(|piece| piece.group == group)
            .map(|piece| piece.id)
            .collect()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.pieces.iter().map(|piece| piece.group).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn group_is_snapped(&self, group: GroupId) -> bool {
        self.pieces
            .iter()
            .any(|piece| piece.group == group && piece.snapped)
    }

    pub fn translate_group(&mut self, group: GroupId, dx: f32, dy: f32) {
        let dx = finite_or_zero(dx);
        let dy = finite_or_zero(dy);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        for piece in self.pieces.iter_mut().filter(|piece| piece.group == group) {
            piece.pos = (piece.pos.0 + dx, piece.pos.1 + dy);
        }
    }

    /// Re-derives every member position from a single anchor so the group is an exact
    /// rigid translation of its solved layout. Snapped groups collapse onto `correct`.
    pub fn normalize_group_to_correct_offsets(&mut self, group: GroupId) {
        if self.group_is_snapped(group) {
            for piece in self.pieces.iter_mut().filter(|piece| piece.group == group) {
                piece.pos = piece.correct;
                piece.snapped = true;
            }
            return;
        }
        let Some(anchor) = self
            .pieces
            .iter()
            .filter(|piece| piece.group == group)
            .min_by(|a, b| {
                a.pos
                    .1
                    .total_cmp(&b.pos.1)
                    .then(a.pos.0.total_cmp(&b.pos.0))
                    .then(a.id.cmp(&b.id))
            })
        else {
            return;
        };
        let (off_x, off_y) = anchor.offset();
        let (off_x, off_y) = (finite_or_zero(off_x), finite_or_zero(off_y));
        for piece in self.pieces.iter_mut().filter(|piece| piece.group == group) {
            piece.pos = (piece.correct.0 + off_x, piece.correct.1 + off_y);
        }
    }

    pub fn merge_groups(&mut self, target: GroupId, source: GroupId) {
        if target == source {
            return;
        }
        let target_snapped = self.group_is_snapped(target);
        for piece in self.pieces.iter_mut().filter(|piece| piece.group == source) {
            piece.group = target;
            if target_snapped {
                piece.snapped = true;
            }
        }
    }

    /// Largest deviation of any member's offset from the group's first member. Zero for a
    /// perfectly rigid group.
    pub fn group_drift(&self, group: GroupId) -> f32 {
        let mut members = self.pieces.iter().filter(|piece| piece.group == group);
        let Some(first) = members.next() else {
            return 0.0;
        };
        let base = first.offset();
        members
            .map(|piece| {
                let offset = piece.offset();
                ((offset.0 - base.0).powi(2) + (offset.1 - base.1).powi(2)).sqrt()
            })
            .fold(0.0, f32::max)
    }

    /// Axis-aligned bounds of the members' cell rectangles: (min_x, min_y, max_x, max_y).
    pub fn group_bounds(&self, group: GroupId) -> Option<(f32, f32, f32, f32)> {
        self.bounds_of(self.pieces.iter().filter(|piece| piece.group == group).map(|p| p.pos))
    }

    pub fn bounds_of<I>(&self, positions: I) -> Option<(f32, f32, f32, f32)>
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let mut bounds: Option<(f32, f32, f32, f32)> = None;
        for (x, y) in positions {
            let (min_x, min_y, max_x, max_y) = bounds.unwrap_or((x, y, x, y));
            bounds = Some((
                min_x.min(x),
                min_y.min(y),
                max_x.max(x + self.piece_width),
                max_y.max(y + self.piece_height),
            ));
        }
        bounds
    }

    pub fn max_z(&self) -> u32 {
        self.pieces.iter().map(|piece| piece.z).max().unwrap_or(0)
    }

    /// Lifts the group above everything else, preserving its internal paint order.
    pub fn raise_group(&mut self, group: GroupId) {
        let total = self.pieces.len() as u32;
        if self.max_z() > total.saturating_mul(4) {
            self.compact_z();
        }
        let mut members: Vec<(u32, PieceId)> = self
            .pieces
            .iter()
            .filter(|piece| piece.group == group)
            .map(|piece| (piece.z, piece.id))
            .collect();
        members.sort_unstable();
        let base = self.max_z() + 1;
        for (rank, (_, id)) in members.into_iter().enumerate() {
            if let Some(piece) = self.pieces.get_mut(id) {
                piece.z = base + rank as u32;
            }
        }
    }

    pub fn compact_z(&mut self) {
        let order = self.z_order();
        for (rank, id) in order.into_iter().enumerate() {
            if let Some(piece) = self.pieces.get_mut(id) {
                piece.z = rank as u32;
            }
        }
    }

    /// Piece ids back to front.
    pub fn z_order(&self) -> Vec<PieceId> {
        let mut order: Vec<(u32, PieceId)> =
            self.pieces.iter().map(|piece| (piece.z, piece.id)).collect();
        order.sort_unstable();
        order.into_iter().map(|(_, id)| id).collect()
    }

    /// Topmost piece whose cell rectangle contains the stage point.
    pub fn piece_at(&self, point: (f32, f32)) -> Option<PieceId> {
        self.pieces
            .iter()
            .filter(|piece| {
                point.0 >= piece.pos.0
                    && point.0 <= piece.pos.0 + self.piece_width
                    && point.1 >= piece.pos.1
                    && point.1 <= piece.pos.1 + self.piece_height
            })
            .max_by(|a, b| a.z.cmp(&b.z).then(a.id.cmp(&b.id)))
            .map(|piece| piece.id)
    }

    /// Moves the board to a new layout. Targets follow the board; snapped pieces follow
    /// their targets so they stay exactly on it. Loose pieces keep their stage position.
    pub fn recenter(&mut self, layout: BoardLayout) -> (f32, f32) {
        let dx = finite_or_zero(layout.board_x - self.layout.board_x);
        let dy = finite_or_zero(layout.board_y - self.layout.board_y);
        let size_changed = (layout.board_width - self.layout.board_width).abs() > f32::EPSILON
            || (layout.board_height - self.layout.board_height).abs() > f32::EPSILON;
        self.layout = layout;
        if size_changed {
            self.piece_width = layout.board_width / self.cols as f32;
            self.piece_height = layout.board_height / self.rows as f32;
        }
        for piece in &mut self.pieces {
            piece.correct = correct_position(
                &self.layout,
                piece.row,
                piece.col,
                self.piece_width,
                self.piece_height,
            );
            if piece.snapped {
                piece.pos = piece.correct;
            }
        }
        (dx, dy)
    }

    /// Pulls loose groups back inside the stage rectangle after the stage shrank.
    pub fn keep_loose_groups_in_stage(&mut self) {
        for group in self.group_ids() {
            if self.group_is_snapped(group) {
                continue;
            }
            let Some((min_x, min_y, max_x, max_y)) = self.group_bounds(group) else {
                continue;
            };
            let dx = shift_into(min_x, max_x, 0.0, self.layout.stage_width);
            let dy = shift_into(min_y, max_y, 0.0, self.layout.stage_height);
            self.translate_group(group, dx, dy);
        }
    }

    /// Scatters every group that is not locked to the board into the ring around it.
    /// Clusters move as a unit.
    pub fn scatter_loose<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut moved = 0;
        for group in self.group_ids() {
            if self.group_is_snapped(group) {
                continue;
            }
            let Some((min_x, min_y, max_x, max_y)) = self.group_bounds(group) else {
                continue;
            };
            let target = scatter_target(rng, &self.layout, max_x - min_x, max_y - min_y);
            self.translate_group(group, target.0 - min_x, target.1 - min_y);
            self.normalize_group_to_correct_offsets(group);
            moved += 1;
        }
        moved
    }

    /// Breaks every group, unlocks every piece, and scatters them all.
    pub fn reset_layout<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for piece in &mut self.pieces {
            piece.group = piece.id;
            piece.snapped = false;
            piece.pos = piece.correct;
            piece.z = piece.id as u32;
        }
        let mut order: Vec<PieceId> = (0..self.pieces.len()).collect();
        for i in (1..order.len()).rev() {
            let j = rng.random_range(0..=i);
            order.swap(i, j);
        }
        for (rank, id) in order.into_iter().enumerate() {
            if let Some(piece) = self.pieces.get_mut(id) {
                piece.z = rank as u32;
            }
        }
        self.scatter_loose(rng);
    }
}

fn shift_into(min: f32, max: f32, lo: f32, hi: f32) -> f32 {
    if max - min > hi - lo {
        return lo - min;
    }
    if min < lo {
        lo - min
    } else if max > hi {
        hi - max
    } else {
        0.0
    }
}

/// Top-left corner for a `width x height` box placed uniformly in one of the four bands
/// around the board, weighted by band area. Falls back to anywhere on the stage when no
/// band is large enough.
pub fn scatter_target<R: Rng + ?Sized>(
    rng: &mut R,
    layout: &BoardLayout,
    width: f32,
    height: f32,
) -> (f32, f32) {
    let board_right = layout.board_x + layout.board_width;
    let board_bottom = layout.board_y + layout.board_height;
    let bands = [
        (0.0, 0.0, layout.stage_width, layout.board_y),
        (0.0, board_bottom, layout.stage_width, layout.stage_height - board_bottom),
        (0.0, layout.board_y, layout.board_x, layout.board_height),
        (board_right, layout.board_y, layout.stage_width - board_right, layout.board_height),
    ];
    let fitting: Vec<(f32, f32, f32, f32)> = bands
        .into_iter()
        .filter(|band| band.2 >= width && band.3 >= height)
        .collect();
    if fitting.is_empty() {
        let x = pick(rng, 0.0, (layout.stage_width - width).max(0.0));
        let y = pick(rng, 0.0, (layout.stage_height - height).max(0.0));
        return (x, y);
    }
    let total: f32 = fitting.iter().map(|band| band.2 * band.3).sum();
    let mut roll = rng.random::<f32>() * total;
    let mut chosen = fitting[fitting.len() - 1];
    for band in &fitting {
        let area = band.2 * band.3;
        if roll < area {
            chosen = *band;
            break;
        }
        roll -= area;
    }
    let x = pick(rng, chosen.0, chosen.2 - width);
    let y = pick(rng, chosen.1, chosen.3 - height);
    (x, y)
}

fn pick<R: Rng + ?Sized>(rng: &mut R, lo: f32, span: f32) -> f32 {
    if span > 0.0 {
        lo + rng.random::<f32>() * span
    } else {
        lo
    }
}

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::{DIR_DOWN, DIR_LEFT, DIR_RIGHT, DIR_UP};

pub const EDGE_FLAT: i8 = 0;
pub const EDGE_TAB: i8 = 1;
pub const EDGE_SLOT: i8 = -1;

/// Per-cell edge descriptor: 0 = flat, +1 = protruding tab, -1 = receiving slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMap {
    pub top: i8,
    pub right: i8,
    pub bottom: i8,
    pub left: i8,
}

impl EdgeMap {
    pub const FLAT: EdgeMap = EdgeMap {
        top: EDGE_FLAT,
        right: EDGE_FLAT,
        bottom: EDGE_FLAT,
        left: EDGE_FLAT,
    };

    pub fn side(&self, dir: usize) -> i8 {
        match dir {
            DIR_UP => self.top,
            DIR_RIGHT => self.right,
            DIR_DOWN => self.bottom,
            DIR_LEFT => self.left,
            _ => EDGE_FLAT,
        }
    }

    pub fn sides(&self) -> [i8; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    pub fn is_flat(&self, dir: usize) -> bool {
        self.side(dir) == EDGE_FLAT
    }
}

fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> i8 {
    if rng.random_bool(0.5) {
        EDGE_TAB
    } else {
        EDGE_SLOT
    }
}

/// Builds the row-major edge grid. Shared sides are negated between neighbors and the
/// outer boundary is flat, both by construction.
pub fn assign_edges<R: Rng + ?Sized>(rows: u32, cols: u32, rng: &mut R) -> Vec<EdgeMap> {
    let rows = rows as usize;
    let cols = cols as usize;
    let mut edges: Vec<EdgeMap> = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let top = if row == 0 {
                EDGE_FLAT
            } else {
                -edges[(row - 1) * cols + col].bottom
            };
            let left = if col == 0 {
                EDGE_FLAT
            } else {
                -edges[row * cols + col - 1].right
            };
            let right = if col + 1 == cols {
                EDGE_FLAT
            } else {
                random_sign(rng)
            };
            let bottom = if row + 1 == rows {
                EDGE_FLAT
            } else {
                random_sign(rng)
            };
            edges.push(EdgeMap {
                top,
                right,
                bottom,
                left,
            });
        }
    }
    edges
}

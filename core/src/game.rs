pub const DIR_UP: usize = 0;
pub const DIR_RIGHT: usize = 1;
pub const DIR_DOWN: usize = 2;
pub const DIR_LEFT: usize = 3;
pub const DIRS: [usize; 4] = [DIR_UP, DIR_RIGHT, DIR_DOWN, DIR_LEFT];

pub const GRID_MAX: u32 = 64;

pub const SCATTER_MARGIN_DEFAULT: f32 = 160.0;
pub const SCATTER_MARGIN_MIN: f32 = 0.0;
pub const SCATTER_MARGIN_MAX: f32 = 2000.0;

pub const BOARD_SNAP_TOLERANCE_PX_DEFAULT: f32 = 24.0;
pub const NEIGHBOR_SNAP_TOLERANCE_PX_DEFAULT: f32 = 20.0;
pub const SNAP_TOLERANCE_PX_MIN: f32 = 1.0;
pub const SNAP_TOLERANCE_PX_MAX: f32 = 200.0;
pub const RIGID_EPSILON_DEFAULT: f32 = 1.5;
pub const SOLVED_EPSILON_DEFAULT: f32 = 0.8;
pub const EPSILON_MIN: f32 = 0.01;
pub const EPSILON_MAX: f32 = 10.0;

pub const SCALE_FLOOR: f32 = 1.0e-4;

pub const MAGNET_MAX_OFFSET: f32 = 12.0;
pub const MAGNET_DURATION_MS_DEFAULT: f32 = 160.0;
pub const SAVE_DEBOUNCE_MS_DEFAULT: f32 = 600.0;

pub fn splitmix32(mut value: u32) -> u32 {
    value = value.wrapping_add(0x9E37_79B9);
    let mut z = value;
    z = (z ^ (z >> 16)).wrapping_mul(0x85EB_CA6B);
    z = (z ^ (z >> 13)).wrapping_mul(0xC2B2_AE35);
    z ^ (z >> 16)
}

/// Folds a clock reading and the previous seed into a fresh 64-bit session seed.
pub fn session_seed(now_ms: u64, previous: u64) -> u64 {
    let lo = splitmix32((now_ms as u32) ^ (previous as u32).wrapping_add(0x9E37_79B9));
    let hi = splitmix32(((now_ms >> 32) as u32) ^ ((previous >> 32) as u32) ^ lo);
    ((hi as u64) << 32) | lo as u64
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

/// Replaces NaN and infinities with zero so a malformed gesture degrades to a no-op.
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn safe_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.max(SCALE_FLOOR)
    } else {
        1.0
    }
}

/// Converts a tolerance in screen pixels into stage units at the given scale.
pub fn screen_to_stage_tolerance(px: f32, scale: f32) -> f32 {
    px.max(0.0) / safe_scale(scale)
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

pub fn neighbor_index(id: usize, cols: usize, rows: usize, dir: usize) -> Option<usize> {
    if cols == 0 {
        return None;
    }
    let col = id % cols;
    let row = id / cols;
    match dir {
        DIR_UP if row > 0 => Some(id - cols),
        DIR_RIGHT if col + 1 < cols => Some(id + 1),
        DIR_DOWN if row + 1 < rows => Some(id + cols),
        DIR_LEFT if col > 0 => Some(id - 1),
        _ => None,
    }
}

pub fn opposite_dir(dir: usize) -> usize {
    match dir {
        DIR_UP => DIR_DOWN,
        DIR_RIGHT => DIR_LEFT,
        DIR_DOWN => DIR_UP,
        DIR_LEFT => DIR_RIGHT,
        _ => DIR_UP,
    }
}

pub fn piece_label(row: u32, col: u32) -> String {
    format!("{row}-{col}")
}

pub fn parse_piece_label(label: &str) -> Option<(u32, u32)> {
    let (row, col) = label.split_once('-')?;
    Some((row.trim().parse().ok()?, col.trim().parse().ok()?))
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::{
    finite_or_zero, BOARD_SNAP_TOLERANCE_PX_DEFAULT, GRID_MAX, MAGNET_DURATION_MS_DEFAULT,
    NEIGHBOR_SNAP_TOLERANCE_PX_DEFAULT, RIGID_EPSILON_DEFAULT, SAVE_DEBOUNCE_MS_DEFAULT,
    SCATTER_MARGIN_DEFAULT, SCATTER_MARGIN_MAX, SCATTER_MARGIN_MIN, SOLVED_EPSILON_DEFAULT,
};
use crate::shape::ShapeParams;
use crate::snap::SnapTolerances;
use crate::viewport::{
    FULLSCREEN_SCALE_MAX_DEFAULT, FULLSCREEN_SCALE_MIN_DEFAULT, INLINE_ZOOM_MAX_DEFAULT,
    INLINE_ZOOM_MIN_DEFAULT,
};

pub const ROWS_DEFAULT: u32 = 4;
pub const COLS_DEFAULT: u32 = 6;
pub const BOARD_WIDTH_DEFAULT: f32 = 1200.0;
pub const BOARD_HEIGHT_DEFAULT: f32 = 800.0;
pub const BOARD_DIMENSION_MAX: f32 = 16384.0;
const DURATION_MS_MAX: f32 = 10_000.0;

#[derive(Debug)]
pub struct ConfigError(serde_json::Error);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid puzzle config: {}", self.0)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Construction inputs supplied by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PuzzleConfig {
    pub image_src: String,
    pub puzzle_id: Option<String>,
    pub table_image: Option<String>,
    pub rows: u32,
    pub cols: u32,
    pub board_width: f32,
    pub board_height: f32,
    pub scatter_margin: f32,
    pub board_snap_tolerance_px: f32,
    pub neighbor_snap_tolerance_px: f32,
    pub rigid_epsilon: f32,
    pub solved_epsilon: f32,
    pub shape: ShapeParams,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub fullscreen_scale_min: f32,
    pub fullscreen_scale_max: f32,
    pub save_debounce_ms: f32,
    pub magnet_duration_ms: f32,
    pub seed: Option<u64>,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            image_src: String::new(),
            puzzle_id: None,
            table_image: None,
            rows: ROWS_DEFAULT,
            cols: COLS_DEFAULT,
            board_width: BOARD_WIDTH_DEFAULT,
            board_height: BOARD_HEIGHT_DEFAULT,
            scatter_margin: SCATTER_MARGIN_DEFAULT,
            board_snap_tolerance_px: BOARD_SNAP_TOLERANCE_PX_DEFAULT,
            neighbor_snap_tolerance_px: NEIGHBOR_SNAP_TOLERANCE_PX_DEFAULT,
            rigid_epsilon: RIGID_EPSILON_DEFAULT,
            solved_epsilon: SOLVED_EPSILON_DEFAULT,
            shape: ShapeParams::default(),
            zoom_min: INLINE_ZOOM_MIN_DEFAULT,
            zoom_max: INLINE_ZOOM_MAX_DEFAULT,
            fullscreen_scale_min: FULLSCREEN_SCALE_MIN_DEFAULT,
            fullscreen_scale_max: FULLSCREEN_SCALE_MAX_DEFAULT,
            save_debounce_ms: SAVE_DEBOUNCE_MS_DEFAULT,
            magnet_duration_ms: MAGNET_DURATION_MS_DEFAULT,
            seed: None,
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

impl PuzzleConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<PuzzleConfig>(text)
            .map(PuzzleConfig::clamped)
            .map_err(ConfigError)
    }

    /// Pulls every numeric field into its safe range. Nothing is rejected.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let tolerances = SnapTolerances {
            board_px: self.board_snap_tolerance_px,
            neighbor_px: self.neighbor_snap_tolerance_px,
            rigid_epsilon: self.rigid_epsilon,
            solved_epsilon: self.solved_epsilon,
        }
        .clamped();
        Self {
            rows: self.rows.clamp(1, GRID_MAX),
            cols: self.cols.clamp(1, GRID_MAX),
            board_width: clamp_or(self.board_width, 1.0, BOARD_DIMENSION_MAX, defaults.board_width),
            board_height: clamp_or(
                self.board_height,
                1.0,
                BOARD_DIMENSION_MAX,
                defaults.board_height,
            ),
            scatter_margin: clamp_or(
                self.scatter_margin,
                SCATTER_MARGIN_MIN,
                SCATTER_MARGIN_MAX,
                defaults.scatter_margin,
            ),
            board_snap_tolerance_px: tolerances.board_px,
            neighbor_snap_tolerance_px: tolerances.neighbor_px,
            rigid_epsilon: tolerances.rigid_epsilon,
            solved_epsilon: tolerances.solved_epsilon,
            shape: self.shape.clamped(),
            zoom_min: clamp_or(self.zoom_min, 0.05, 1.0, defaults.zoom_min),
            zoom_max: clamp_or(self.zoom_max, 1.0, 20.0, defaults.zoom_max),
            fullscreen_scale_min: clamp_or(
                self.fullscreen_scale_min,
                0.01,
                1.0,
                defaults.fullscreen_scale_min,
            ),
            fullscreen_scale_max: clamp_or(
                self.fullscreen_scale_max,
                1.0,
                40.0,
                defaults.fullscreen_scale_max,
            ),
            save_debounce_ms: clamp_or(
                self.save_debounce_ms,
                0.0,
                DURATION_MS_MAX,
                defaults.save_debounce_ms,
            ),
            magnet_duration_ms: clamp_or(
                self.magnet_duration_ms,
                0.0,
                DURATION_MS_MAX,
                defaults.magnet_duration_ms,
            ),
            ..self
        }
    }

    pub fn tolerances(&self) -> SnapTolerances {
        SnapTolerances {
            board_px: self.board_snap_tolerance_px,
            neighbor_px: self.neighbor_snap_tolerance_px,
            rigid_epsilon: self.rigid_epsilon,
            solved_epsilon: self.solved_epsilon,
        }
    }

    /// Board plus scatter ring, the area the auto-fit scale targets.
    pub fn content_size(&self) -> (f32, f32) {
        let margin = finite_or_zero(self.scatter_margin) * 2.0;
        (self.board_width + margin, self.board_height + margin)
    }

    pub fn progress_key(&self) -> String {
        crate::snapshot::progress_key(
            self.puzzle_id.as_deref(),
            &self.image_src,
            self.rows,
            self.cols,
        )
    }
}

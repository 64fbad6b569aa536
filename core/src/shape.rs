use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::edges::EdgeMap;
use crate::game::{DIR_DOWN, DIR_LEFT, DIR_RIGHT, DIR_UP};

pub const FEATURE_SPAN_MIN: f32 = 0.3;
pub const FEATURE_SPAN_MAX: f32 = 0.9;
pub const FEATURE_SPAN_DEFAULT: f32 = 0.62;
pub const NECK_SPAN_MIN: f32 = 0.05;
pub const NECK_SPAN_MAX: f32 = 0.4;
pub const NECK_SPAN_DEFAULT: f32 = 0.16;
pub const HEAD_SPAN_MIN: f32 = 0.1;
pub const HEAD_SPAN_MAX: f32 = 0.6;
pub const HEAD_SPAN_DEFAULT: f32 = 0.3;
pub const TAB_DEPTH_MIN: f32 = 0.08;
pub const TAB_DEPTH_MAX: f32 = 0.4;
pub const TAB_DEPTH_DEFAULT: f32 = 0.24;
pub const NECK_PINCH_MIN: f32 = 0.1;
pub const NECK_PINCH_MAX: f32 = 0.8;
pub const NECK_PINCH_DEFAULT: f32 = 0.35;
pub const SHOULDER_SPAN_MIN: f32 = 0.0;
pub const SHOULDER_SPAN_MAX: f32 = 0.3;
pub const SHOULDER_SPAN_DEFAULT: f32 = 0.12;
pub const SHOULDER_DEPTH_MIN: f32 = 0.0;
pub const SHOULDER_DEPTH_MAX: f32 = 0.1;
pub const SHOULDER_DEPTH_DEFAULT: f32 = 0.03;
pub const CORNER_INSET_MIN: f32 = 0.0;
pub const CORNER_INSET_MAX: f32 = 0.45;
pub const CORNER_INSET_DEFAULT: f32 = 0.06;
pub const SMOOTHING_MIN: f32 = 0.1;
pub const SMOOTHING_MAX: f32 = 1.0;
pub const SMOOTHING_DEFAULT: f32 = 0.55;

const ARC_KAPPA: f32 = 0.552_284_8;
const FLATTEN_STEPS_DEFAULT: usize = 16;

/// Knob geometry. Spans are fractions of the edge length; depths and the corner inset are
/// fractions of the shorter piece side so both pieces sharing an edge agree on the curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShapeParams {
    pub feature_span: f32,
    pub neck_span: f32,
    pub head_span: f32,
    pub tab_depth: f32,
    pub neck_pinch: f32,
    pub shoulder_span: f32,
    pub shoulder_depth: f32,
    pub corner_inset: f32,
    pub smoothing: f32,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            feature_span: FEATURE_SPAN_DEFAULT,
            neck_span: NECK_SPAN_DEFAULT,
            head_span: HEAD_SPAN_DEFAULT,
            tab_depth: TAB_DEPTH_DEFAULT,
            neck_pinch: NECK_PINCH_DEFAULT,
            shoulder_span: SHOULDER_SPAN_DEFAULT,
            shoulder_depth: SHOULDER_DEPTH_DEFAULT,
            corner_inset: CORNER_INSET_DEFAULT,
            smoothing: SMOOTHING_DEFAULT,
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

impl ShapeParams {
    /// Pulls every field into its safe range and keeps the spans mutually ordered
    /// (shoulder, neck, head all fit inside the feature span).
    pub fn clamped(&self) -> Self {
        let feature_span = clamp_or(
            self.feature_span,
            FEATURE_SPAN_MIN,
            FEATURE_SPAN_MAX,
            FEATURE_SPAN_DEFAULT,
        );
        let neck_span = clamp_or(self.neck_span, NECK_SPAN_MIN, NECK_SPAN_MAX, NECK_SPAN_DEFAULT)
            .min(feature_span * 0.6);
        let head_span = clamp_or(self.head_span, HEAD_SPAN_MIN, HEAD_SPAN_MAX, HEAD_SPAN_DEFAULT)
            .min(feature_span * 0.9)
            .max(neck_span);
        let shoulder_span = clamp_or(
            self.shoulder_span,
            SHOULDER_SPAN_MIN,
            SHOULDER_SPAN_MAX,
            SHOULDER_SPAN_DEFAULT,
        )
        .min((feature_span - neck_span) * 0.45);
        Self {
            feature_span,
            neck_span,
            head_span,
            tab_depth: clamp_or(self.tab_depth, TAB_DEPTH_MIN, TAB_DEPTH_MAX, TAB_DEPTH_DEFAULT),
            neck_pinch: clamp_or(
                self.neck_pinch,
                NECK_PINCH_MIN,
                NECK_PINCH_MAX,
                NECK_PINCH_DEFAULT,
            ),
            shoulder_span,
            shoulder_depth: clamp_or(
                self.shoulder_depth,
                SHOULDER_DEPTH_MIN,
                SHOULDER_DEPTH_MAX,
                SHOULDER_DEPTH_DEFAULT,
            ),
            corner_inset: clamp_or(
                self.corner_inset,
                CORNER_INSET_MIN,
                CORNER_INSET_MAX,
                CORNER_INSET_DEFAULT,
            ),
            smoothing: clamp_or(self.smoothing, SMOOTHING_MIN, SMOOTHING_MAX, SMOOTHING_DEFAULT),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo((f32, f32)),
    LineTo((f32, f32)),
    CubicTo {
        c1: (f32, f32),
        c2: (f32, f32),
        to: (f32, f32),
    },
    Close,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    commands: Vec<PathCommand>,
}

pub fn fmt_f32(value: f32) -> String {
    format!("{:.3}", value)
}

pub fn cubic_point(
    p0: (f32, f32),
    p1: (f32, f32),
    p2: (f32, f32),
    p3: (f32, f32),
    t: f32,
) -> (f32, f32) {
    let u = 1.0 - t;
    let tt = t * t;
    let uu = u * u;
    let uuu = uu * u;
    let ttt = tt * t;
    (
        uuu * p0.0 + 3.0 * uu * t * p1.0 + 3.0 * u * tt * p2.0 + ttt * p3.0,
        uuu * p0.1 + 3.0 * uu * t * p1.1 + 3.0 * u * tt * p2.1 + ttt * p3.1,
    )
}

impl Outline {
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn to_svg_path(&self) -> String {
        commands_to_svg(&self.commands)
    }

    /// Samples the path into a polyline; cubic segments contribute `steps` points each.
    pub fn flatten(&self, steps: usize) -> Vec<(f32, f32)> {
        flatten_commands(&self.commands, steps)
    }

    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for (x, y) in self.flatten(FLATTEN_STEPS_DEFAULT) {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if !min_x.is_finite() {
            return (0.0, 0.0, 0.0, 0.0);
        }
        (min_x, min_y, max_x, max_y)
    }
}

pub fn commands_to_svg(commands: &[PathCommand]) -> String {
    let mut path = String::new();
    for command in commands {
        if !path.is_empty() {
            path.push(' ');
        }
        let _ = match *command {
            PathCommand::MoveTo((x, y)) => write!(path, "M {} {}", fmt_f32(x), fmt_f32(y)),
            PathCommand::LineTo((x, y)) => write!(path, "L {} {}", fmt_f32(x), fmt_f32(y)),
            PathCommand::CubicTo { c1, c2, to } => write!(
                path,
                "C {} {} {} {} {} {}",
                fmt_f32(c1.0),
                fmt_f32(c1.1),
                fmt_f32(c2.0),
                fmt_f32(c2.1),
                fmt_f32(to.0),
                fmt_f32(to.1)
            ),
            PathCommand::Close => write!(path, "Z"),
        };
    }
    path
}

pub fn flatten_commands(commands: &[PathCommand], steps: usize) -> Vec<(f32, f32)> {
    let steps = steps.max(1);
    let mut points = Vec::new();
    let mut current = (0.0, 0.0);
    for command in commands {
        match *command {
            PathCommand::MoveTo(to) | PathCommand::LineTo(to) => {
                points.push(to);
                current = to;
            }
            PathCommand::CubicTo { c1, c2, to } => {
                for step in 1..=steps {
                    let t = step as f32 / steps as f32;
                    points.push(cubic_point(current, c1, c2, to, t));
                }
                current = to;
            }
            PathCommand::Close => {}
        }
    }
    points
}

#[derive(Clone, Copy)]
struct SideFrame {
    start: (f32, f32),
    dir: (f32, f32),
    outward: (f32, f32),
    len: f32,
}

impl SideFrame {
    fn map(&self, local: (f32, f32)) -> (f32, f32) {
        (
            self.start.0 + self.dir.0 * local.0 + self.outward.0 * local.1,
            self.start.1 + self.dir.1 * local.0 + self.outward.1 * local.1,
        )
    }
}

// Clockwise traversal starting at the top-left corner.
fn side_frame(width: f32, height: f32, side: usize) -> SideFrame {
    match side {
        DIR_RIGHT => SideFrame {
            start: (width, 0.0),
            dir: (0.0, 1.0),
            outward: (1.0, 0.0),
            len: height,
        },
        DIR_DOWN => SideFrame {
            start: (width, height),
            dir: (-1.0, 0.0),
            outward: (0.0, 1.0),
            len: width,
        },
        DIR_LEFT => SideFrame {
            start: (0.0, height),
            dir: (0.0, -1.0),
            outward: (-1.0, 0.0),
            len: height,
        },
        _ => SideFrame {
            start: (0.0, 0.0),
            dir: (1.0, 0.0),
            outward: (0.0, -1.0),
            len: width,
        },
    }
}

/// Canonical left-to-right knob profile from (0, 0) to (len, 0); positive y points away
/// from the piece body. The curve is mirror-symmetric about `len / 2`, so the neighbor
/// traversing the same edge in the opposite direction reproduces it exactly.
fn knob_profile(len: f32, unit: f32, sign: i8, params: &ShapeParams) -> Vec<PathCommand> {
    if sign == 0 || len <= 0.0 {
        return vec![PathCommand::LineTo((len.max(0.0), 0.0))];
    }
    let s = sign.signum() as f32;
    let k = params.smoothing;
    let c = len * 0.5;
    let x0 = c - params.feature_span * len * 0.5;
    let sl = params.shoulder_span * len;
    let neck_x = c - params.neck_span * len * 0.5;
    let head_x = c - params.head_span * len * 0.5;
    let depth = params.tab_depth * unit;
    let y_shoulder = -s * params.shoulder_depth * unit;
    let y_neck = s * depth * params.neck_pinch;
    let y_head = s * depth;

    let shoulder_end = (x0 + sl, y_shoulder);
    let neck = (neck_x, y_neck);
    let apex = (c, y_head);

    // (start, c1, c2, end) for the left half.
    let left: [((f32, f32), (f32, f32), (f32, f32), (f32, f32)); 3] = [
        (
            (x0, 0.0),
            (x0 + sl * k * 0.5, 0.0),
            (x0 + sl - sl * k * 0.5, y_shoulder),
            shoulder_end,
        ),
        (
            shoulder_end,
            (shoulder_end.0 + (neck_x - shoulder_end.0) * k, y_shoulder),
            (neck_x, y_neck - s * depth * params.neck_pinch * k),
            neck,
        ),
        (
            neck,
            (head_x, y_neck + s * depth * (1.0 - params.neck_pinch) * k),
            (c - (c - head_x) * k, y_head),
            apex,
        ),
    ];
    let mirror = |p: (f32, f32)| (len - p.0, p.1);

    let mut commands = Vec::with_capacity(8);
    commands.push(PathCommand::LineTo((x0, 0.0)));
    for &(_, c1, c2, to) in &left {
        commands.push(PathCommand::CubicTo { c1, c2, to });
    }
    for &(from, c1, c2, _) in left.iter().rev() {
        commands.push(PathCommand::CubicTo {
            c1: mirror(c2),
            c2: mirror(c1),
            to: mirror(from),
        });
    }
    commands.push(PathCommand::LineTo((len, 0.0)));
    commands
}

fn map_commands(frame: &SideFrame, commands: &[PathCommand]) -> Vec<PathCommand> {
    commands
        .iter()
        .map(|command| match *command {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(frame.map(p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(frame.map(p)),
            PathCommand::CubicTo { c1, c2, to } => PathCommand::CubicTo {
                c1: frame.map(c1),
                c2: frame.map(c2),
                to: frame.map(to),
            },
            PathCommand::Close => PathCommand::Close,
        })
        .collect()
}

fn safe_dims(width: f32, height: f32) -> (f32, f32) {
    let width = if width.is_finite() { width.max(1.0) } else { 1.0 };
    let height = if height.is_finite() { height.max(1.0) } else { 1.0 };
    (width, height)
}

/// One side of a piece in piece-local coordinates, starting with a `MoveTo` at the side's
/// clockwise start corner. Corner rounding is not applied here.
pub fn side_path(
    width: f32,
    height: f32,
    side: usize,
    value: i8,
    params: &ShapeParams,
) -> Vec<PathCommand> {
    let (width, height) = safe_dims(width, height);
    let params = params.clamped();
    let unit = width.min(height);
    let frame = side_frame(width, height, side);
    let mut commands = vec![PathCommand::MoveTo(frame.start)];
    commands.extend(map_commands(
        &frame,
        &knob_profile(frame.len, unit, value, &params),
    ));
    commands
}

fn corner_arc(corner: usize, width: f32, height: f32, r: f32) -> PathCommand {
    let kr = r * ARC_KAPPA;
    match corner {
        // top-right, entered from the top side
        DIR_RIGHT => PathCommand::CubicTo {
            c1: (width - r + kr, 0.0),
            c2: (width, r - kr),
            to: (width, r),
        },
        // bottom-right
        DIR_DOWN => PathCommand::CubicTo {
            c1: (width, height - r + kr),
            c2: (width - r + kr, height),
            to: (width - r, height),
        },
        // bottom-left
        DIR_LEFT => PathCommand::CubicTo {
            c1: (r - kr, height),
            c2: (0.0, height - r + kr),
            to: (0.0, height - r),
        },
        // top-left
        _ => PathCommand::CubicTo {
            c1: (0.0, r - kr),
            c2: (r - kr, 0.0),
            to: (r, 0.0),
        },
    }
}

/// Builds the closed silhouette of a `width x height` cell with the given edges.
/// A corner is rounded only when both sides meeting there are flat.
pub fn build_outline(width: f32, height: f32, edges: EdgeMap, params: &ShapeParams) -> Outline {
    let (width, height) = safe_dims(width, height);
    let params = params.clamped();
    let unit = width.min(height);
    let radius = params.corner_inset * unit;
    // Corner i sits at the end of side i (clockwise): 0 = top-right, ..., 3 = top-left.
    let corner_radius = |side: usize| {
        let next = (side + 1) % 4;
        if radius > 0.0 && edges.is_flat(side) && edges.is_flat(next) {
            radius
        } else {
            0.0
        }
    };
    let r_tr = corner_radius(DIR_UP);
    let r_br = corner_radius(DIR_RIGHT);
    let r_bl = corner_radius(DIR_DOWN);
    let r_tl = corner_radius(DIR_LEFT);

    let mut commands = Vec::with_capacity(40);
    commands.push(PathCommand::MoveTo((r_tl, 0.0)));
    for side in [DIR_UP, DIR_RIGHT, DIR_DOWN, DIR_LEFT] {
        let frame = side_frame(width, height, side);
        let value = edges.side(side);
        if edges.is_flat(side) {
            let end_trim = match side {
                DIR_UP => r_tr,
                DIR_RIGHT => r_br,
                DIR_DOWN => r_bl,
                _ => r_tl,
            };
            commands.push(PathCommand::LineTo(frame.map((frame.len - end_trim, 0.0))));
        } else {
            commands.extend(map_commands(
                &frame,
                &knob_profile(frame.len, unit, value, &params),
            ));
        }
        let corner_r = match side {
            DIR_UP => r_tr,
            DIR_RIGHT => r_br,
            DIR_DOWN => r_bl,
            _ => r_tl,
        };
        if corner_r > 0.0 {
            let corner = match side {
                DIR_UP => DIR_RIGHT,
                DIR_RIGHT => DIR_DOWN,
                DIR_DOWN => DIR_LEFT,
                _ => DIR_UP,
            };
            commands.push(corner_arc(corner, width, height, corner_r));
        }
    }
    commands.push(PathCommand::Close);
    Outline { commands }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_params_are_clamped() {
        let params = ShapeParams {
            feature_span: 5.0,
            neck_span: -1.0,
            head_span: f32::NAN,
            tab_depth: 99.0,
            neck_pinch: 0.0,
            shoulder_span: 1.0,
            shoulder_depth: -3.0,
            corner_inset: 2.0,
            smoothing: 0.0,
        }
        .clamped();
        assert_eq!(params.feature_span, FEATURE_SPAN_MAX);
        assert_eq!(params.neck_span, NECK_SPAN_MIN);
        assert!(params.head_span >= params.neck_span);
        assert!(params.head_span <= params.feature_span);
        assert_eq!(params.tab_depth, TAB_DEPTH_MAX);
        assert!(params.shoulder_span <= (params.feature_span - params.neck_span) * 0.5);
        assert_eq!(params.corner_inset, CORNER_INSET_MAX);
        assert_eq!(params.smoothing, SMOOTHING_MIN);
    }

    #[test]
    fn knob_profile_is_mirror_symmetric() {
        let params = ShapeParams::default().clamped();
        let mut points = vec![(0.0, 0.0)];
        points.extend(flatten_commands(&knob_profile(100.0, 80.0, 1, &params), 12));
        let mirrored: Vec<(f32, f32)> = points.iter().map(|p| (100.0 - p.0, p.1)).collect();
        for point in &points {
            let closest = mirrored
                .iter()
                .map(|m| ((m.0 - point.0).powi(2) + (m.1 - point.1).powi(2)).sqrt())
                .fold(f32::INFINITY, f32::min);
            assert!(closest < 1.0e-3, "no mirror partner for {point:?}");
        }
    }

    #[test]
    fn flat_profile_is_a_single_line() {
        let params = ShapeParams::default();
        assert_eq!(
            knob_profile(50.0, 50.0, 0, &params),
            vec![PathCommand::LineTo((50.0, 0.0))]
        );
    }
}

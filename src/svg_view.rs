use std::fmt::Write as _;

use serde::Serialize;

use kumiawase_core::shape::fmt_f32;
use kumiawase_core::{DragMachine, PieceId, PuzzleState, ViewportTransform};

/// Render data for one piece. `x`/`y` already include any drag or magnet offset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceView {
    pub id: PieceId,
    pub label: String,
    pub path: String,
    pub x: f32,
    pub y: f32,
    pub z: u32,
    pub snapped: bool,
    pub dragging: bool,
    /// Where the source image sits relative to the piece's top-left corner.
    pub image_x: f32,
    pub image_y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneView {
    pub stage_width: f32,
    pub stage_height: f32,
    pub board_x: f32,
    pub board_y: f32,
    pub board_width: f32,
    pub board_height: f32,
    pub transform: String,
    pub fullscreen: bool,
    pub photo_fill: bool,
    pub image_src: String,
    pub table_image: Option<String>,
    pub progress: f32,
    pub complete: bool,
    /// Paint order, bottom first.
    pub pieces: Vec<PieceView>,
}

/// CSS transform taking stage space to element space: `(stage + pan) * scale`.
pub fn stage_transform(transform: ViewportTransform) -> String {
    format!(
        "scale({}) translate({}px, {}px)",
        fmt_f32(transform.safe_scale()),
        fmt_f32(transform.pan.0),
        fmt_f32(transform.pan.1)
    )
}

pub fn piece_views(
    puzzle: &PuzzleState,
    outlines: &[String],
    drag: &DragMachine,
    now_ms: f64,
) -> Vec<PieceView> {
    let dragging: &[PieceId] = drag
        .session()
        .map(|session| session.members.as_slice())
        .unwrap_or(&[]);
    let origin = puzzle.layout.board_origin();
    puzzle
        .z_order()
        .into_iter()
        .filter_map(|id| {
            let piece = puzzle.piece(id)?;
            let (ox, oy) = drag.render_offset(id, now_ms);
            Some(PieceView {
                id,
                label: piece.label(),
                path: outlines.get(id).cloned().unwrap_or_default(),
                x: piece.pos.0 + ox,
                y: piece.pos.1 + oy,
                z: piece.z,
                snapped: piece.snapped,
                dragging: dragging.contains(&id),
                image_x: origin.0 - piece.correct.0,
                image_y: origin.1 - piece.correct.1,
            })
        })
        .collect()
}

/// Standalone SVG document of the scene, stage units, no viewport transform.
pub fn render_scene_svg(scene: &SceneView) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        fmt_f32(scene.stage_width),
        fmt_f32(scene.stage_height)
    );
    let _ = write!(
        out,
        r##"<rect x="{}" y="{}" width="{}" height="{}" fill="none" stroke="#8a8a8a"/>"##,
        fmt_f32(scene.board_x),
        fmt_f32(scene.board_y),
        fmt_f32(scene.board_width),
        fmt_f32(scene.board_height)
    );
    for piece in &scene.pieces {
        let fill = if scene.photo_fill {
            format!("url(#img-{})", piece.id)
        } else if piece.snapped {
            "#d9d2c3".to_string()
        } else {
            "#efe9dc".to_string()
        };
        let _ = write!(
            out,
            r##"<path data-piece="{}" transform="translate({} {})" d="{}" fill="{}" stroke="#5b5346" stroke-width="1"/>"##,
            piece.label,
            fmt_f32(piece.x),
            fmt_f32(piece.y),
            piece.path,
            fill
        );
    }
    out.push_str("</svg>");
    out
}

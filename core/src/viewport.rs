use crate::game::{finite_or_zero, safe_scale};

pub const INLINE_ZOOM_MIN_DEFAULT: f32 = 0.5;
pub const INLINE_ZOOM_MAX_DEFAULT: f32 = 3.0;
pub const FULLSCREEN_SCALE_MIN_DEFAULT: f32 = 0.1;
pub const FULLSCREEN_SCALE_MAX_DEFAULT: f32 = 8.0;
pub const WHEEL_ZOOM_SPEED: f32 = 0.0015;

/// Axis-aligned rectangle in stage units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewRect {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    pub fn max_x(&self) -> f32 {
        self.min_x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.min_y + self.height
    }

    pub fn contains(&self, point: (f32, f32)) -> bool {
        point.0 >= self.min_x
            && point.0 <= self.max_x()
            && point.1 >= self.min_y
            && point.1 <= self.max_y()
    }
}

/// Scale plus pan. A stage point `p` lands on screen at `origin + (p + pan) * scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportTransform {
    pub scale: f32,
    pub pan: (f32, f32),
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: (0.0, 0.0),
        }
    }
}

impl ViewportTransform {
    pub fn safe_scale(&self) -> f32 {
        safe_scale(self.scale)
    }

    pub fn client_to_stage(&self, client: (f32, f32), origin: (f32, f32)) -> (f32, f32) {
        let scale = self.safe_scale();
        (
            finite_or_zero((client.0 - origin.0) / scale - self.pan.0),
            finite_or_zero((client.1 - origin.1) / scale - self.pan.1),
        )
    }

    pub fn stage_to_client(&self, stage: (f32, f32), origin: (f32, f32)) -> (f32, f32) {
        let scale = self.safe_scale();
        (
            origin.0 + (stage.0 + self.pan.0) * scale,
            origin.1 + (stage.1 + self.pan.1) * scale,
        )
    }

    /// Stage region currently on screen for a viewport of the given client size.
    pub fn visible_rect(&self, viewport: (f32, f32)) -> ViewRect {
        let scale = self.safe_scale();
        ViewRect {
            min_x: -self.pan.0,
            min_y: -self.pan.1,
            width: (viewport.0 / scale).max(1.0e-3),
            height: (viewport.1 / scale).max(1.0e-3),
        }
    }

    /// Changes scale while keeping the stage point under `anchor` (element-local client
    /// coordinates) fixed on screen.
    pub fn zoom_at(&mut self, new_scale: f32, anchor: (f32, f32)) {
        if !new_scale.is_finite() || new_scale <= 0.0 {
            return;
        }
        let old = self.safe_scale();
        let stage_x = anchor.0 / old - self.pan.0;
        let stage_y = anchor.1 / old - self.pan.1;
        let new_scale = safe_scale(new_scale);
        self.scale = new_scale;
        self.pan = (
            finite_or_zero(anchor.0 / new_scale - stage_x),
            finite_or_zero(anchor.1 / new_scale - stage_y),
        );
    }

    pub fn pan_by_client(&mut self, dx: f32, dy: f32) {
        let scale = self.safe_scale();
        self.pan.0 += finite_or_zero(dx / scale);
        self.pan.1 += finite_or_zero(dy / scale);
    }
}

fn fit_scale(viewport: (f32, f32), content: (f32, f32)) -> f32 {
    let width = content.0.max(1.0);
    let height = content.1.max(1.0);
    let scale = (viewport.0.max(1.0) / width).min(viewport.1.max(1.0) / height);
    safe_scale(scale)
}

/// Keeps a stage of `stage_size` within the viewport if it fits, or covering it if it does not.
pub fn clamp_inline_pan(
    transform: &mut ViewportTransform,
    viewport: (f32, f32),
    stage_size: (f32, f32),
) {
    let scale = transform.safe_scale();
    let clamp_axis = |pan: f32, view: f32, stage: f32| {
        let slack = view - stage * scale;
        let lo = slack.min(0.0) / scale;
        let hi = slack.max(0.0) / scale;
        finite_or_zero(pan).clamp(lo, hi)
    };
    transform.pan = (
        clamp_axis(transform.pan.0, viewport.0, stage_size.0),
        clamp_axis(transform.pan.1, viewport.1, stage_size.1),
    );
}

/// Centers an axis whose content fits; otherwise keeps the viewport inside the content.
pub fn clamp_fullscreen_pan(
    transform: &mut ViewportTransform,
    viewport: (f32, f32),
    stage_size: (f32, f32),
) {
    let scale = transform.safe_scale();
    let clamp_axis = |pan: f32, view: f32, stage: f32| {
        let slack = view - stage * scale;
        if slack >= 0.0 {
            slack * 0.5 / scale
        } else {
            finite_or_zero(pan).clamp(slack / scale, 0.0)
        }
    };
    transform.pan = (
        clamp_axis(transform.pan.0, viewport.0, stage_size.0),
        clamp_axis(transform.pan.1, viewport.1, stage_size.1),
    );
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InlineViewport {
    pub auto_fit_scale: f32,
    pub user_zoom: f32,
    pub pan: (f32, f32),
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub viewport: (f32, f32),
}

impl Default for InlineViewport {
    fn default() -> Self {
        Self {
            auto_fit_scale: 1.0,
            user_zoom: 1.0,
            pan: (0.0, 0.0),
            zoom_min: INLINE_ZOOM_MIN_DEFAULT,
            zoom_max: INLINE_ZOOM_MAX_DEFAULT,
            viewport: (1.0, 1.0),
        }
    }
}

impl InlineViewport {
    pub fn with_limits(zoom_min: f32, zoom_max: f32) -> Self {
        let (zoom_min, zoom_max) = ordered_limits(
            zoom_min,
            zoom_max,
            INLINE_ZOOM_MIN_DEFAULT,
            INLINE_ZOOM_MAX_DEFAULT,
        );
        Self {
            zoom_min,
            zoom_max,
            ..Self::default()
        }
    }

    pub fn effective_scale(&self) -> f32 {
        safe_scale(self.auto_fit_scale * self.user_zoom)
    }

    pub fn transform(&self) -> ViewportTransform {
        ViewportTransform {
            scale: self.effective_scale(),
            pan: self.pan,
        }
    }

    fn store(&mut self, transform: ViewportTransform, stage_size: (f32, f32)) {
        let mut transform = transform;
        clamp_inline_pan(&mut transform, self.viewport, stage_size);
        self.pan = transform.pan;
    }

    /// Recomputes the auto-fit scale from the wrapper size so `content` (board plus
    /// scatter margin) fits.
    pub fn fit(&mut self, viewport: (f32, f32), content: (f32, f32), stage_size: (f32, f32)) {
        self.viewport = (viewport.0.max(1.0), viewport.1.max(1.0));
        self.auto_fit_scale = fit_scale(self.viewport, content);
        self.store(self.transform(), stage_size);
    }

    pub fn set_zoom_at(&mut self, zoom: f32, anchor: (f32, f32), stage_size: (f32, f32)) {
        if !zoom.is_finite() {
            return;
        }
        let zoom = zoom.clamp(self.zoom_min, self.zoom_max);
        let mut transform = self.transform();
        transform.zoom_at(safe_scale(self.auto_fit_scale * zoom), anchor);
        self.user_zoom = zoom;
        self.store(transform, stage_size);
    }

    pub fn pan_by_client(&mut self, dx: f32, dy: f32, stage_size: (f32, f32)) {
        let mut transform = self.transform();
        transform.pan_by_client(dx, dy);
        self.store(transform, stage_size);
    }

    pub fn reset(&mut self, stage_size: (f32, f32)) {
        self.user_zoom = 1.0;
        let mut transform = self.transform();
        let scale = transform.safe_scale();
        transform.pan = (
            (self.viewport.0 - stage_size.0 * scale) * 0.5 / scale,
            (self.viewport.1 - stage_size.1 * scale) * 0.5 / scale,
        );
        self.store(transform, stage_size);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FullscreenViewport {
    pub scale: f32,
    pub pan: (f32, f32),
    pub scale_min: f32,
    pub scale_max: f32,
    pub viewport: (f32, f32),
}

impl Default for FullscreenViewport {
    fn default() -> Self {
        Self {
            scale: 1.0,
            pan: (0.0, 0.0),
            scale_min: FULLSCREEN_SCALE_MIN_DEFAULT,
            scale_max: FULLSCREEN_SCALE_MAX_DEFAULT,
            viewport: (1.0, 1.0),
        }
    }
}

impl FullscreenViewport {
    pub fn with_limits(scale_min: f32, scale_max: f32) -> Self {
        let (scale_min, scale_max) = ordered_limits(
            scale_min,
            scale_max,
            FULLSCREEN_SCALE_MIN_DEFAULT,
            FULLSCREEN_SCALE_MAX_DEFAULT,
        );
        Self {
            scale_min,
            scale_max,
            ..Self::default()
        }
    }

    pub fn transform(&self) -> ViewportTransform {
        ViewportTransform {
            scale: safe_scale(self.scale),
            pan: self.pan,
        }
    }

    fn store(&mut self, transform: ViewportTransform, stage_size: (f32, f32)) {
        let mut transform = transform;
        clamp_fullscreen_pan(&mut transform, self.viewport, stage_size);
        self.scale = transform.scale;
        self.pan = transform.pan;
    }

    /// Fits `content` into the screen and centers the stage. Used on enter and on resize.
    pub fn fit(&mut self, viewport: (f32, f32), content: (f32, f32), stage_size: (f32, f32)) {
        self.viewport = (viewport.0.max(1.0), viewport.1.max(1.0));
        let scale = fit_scale(self.viewport, content).clamp(self.scale_min, self.scale_max);
        let transform = ViewportTransform {
            scale,
            pan: (
                (self.viewport.0 / scale - stage_size.0) * 0.5,
                (self.viewport.1 / scale - stage_size.1) * 0.5,
            ),
        };
        self.store(transform, stage_size);
    }

    pub fn zoom_at(&mut self, scale: f32, anchor: (f32, f32), stage_size: (f32, f32)) {
        if !scale.is_finite() {
            return;
        }
        let mut transform = self.transform();
        transform.zoom_at(scale.clamp(self.scale_min, self.scale_max), anchor);
        self.store(transform, stage_size);
    }

    pub fn wheel(&mut self, delta_y: f32, anchor: (f32, f32), stage_size: (f32, f32)) {
        let factor = (-finite_or_zero(delta_y) * WHEEL_ZOOM_SPEED).exp();
        self.zoom_at(self.scale * factor, anchor, stage_size);
    }

    /// Zooms by the ratio of finger distances, anchored at the pinch midpoint.
    pub fn pinch(
        &mut self,
        previous_distance: f32,
        distance: f32,
        midpoint: (f32, f32),
        stage_size: (f32, f32),
    ) {
        if !(previous_distance > 0.0) || !distance.is_finite() {
            return;
        }
        self.zoom_at(self.scale * distance / previous_distance, midpoint, stage_size);
    }

    pub fn pan_by_client(&mut self, dx: f32, dy: f32, stage_size: (f32, f32)) {
        let mut transform = self.transform();
        transform.pan_by_client(dx, dy);
        self.store(transform, stage_size);
    }
}

fn ordered_limits(min: f32, max: f32, default_min: f32, default_max: f32) -> (f32, f32) {
    let min = if min.is_finite() && min > 0.0 { min } else { default_min };
    let max = if max.is_finite() && max > 0.0 { max } else { default_max };
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Inline,
    Fullscreen,
}

/// The two independent transform contexts, selected by mode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewports {
    pub mode: ViewMode,
    pub inline: InlineViewport,
    pub fullscreen: FullscreenViewport,
}

impl Viewports {
    pub fn is_fullscreen(&self) -> bool {
        self.mode == ViewMode::Fullscreen
    }

    pub fn active(&self) -> ViewportTransform {
        match self.mode {
            ViewMode::Inline => self.inline.transform(),
            ViewMode::Fullscreen => self.fullscreen.transform(),
        }
    }

    pub fn active_viewport(&self) -> (f32, f32) {
        match self.mode {
            ViewMode::Inline => self.inline.viewport,
            ViewMode::Fullscreen => self.fullscreen.viewport,
        }
    }

    pub fn active_scale(&self) -> f32 {
        self.active().safe_scale()
    }

    pub fn visible_rect(&self) -> ViewRect {
        self.active().visible_rect(self.active_viewport())
    }

    pub fn client_to_stage(&self, client: (f32, f32), origin: (f32, f32)) -> (f32, f32) {
        self.active().client_to_stage(client, origin)
    }

    /// Fit scale of the active mode, ignoring user zoom. Stage sizing is derived from it.
    pub fn fit_scale(&self) -> f32 {
        match self.mode {
            ViewMode::Inline => safe_scale(self.inline.auto_fit_scale),
            ViewMode::Fullscreen => safe_scale(self.fullscreen.scale),
        }
    }

    pub fn pan_by_client(&mut self, dx: f32, dy: f32, stage_size: (f32, f32)) {
        match self.mode {
            ViewMode::Inline => self.inline.pan_by_client(dx, dy, stage_size),
            ViewMode::Fullscreen => self.fullscreen.pan_by_client(dx, dy, stage_size),
        }
    }

    /// Two-finger zoom by the ratio of finger distances, anchored at the midpoint.
    pub fn pinch(
        &mut self,
        previous_distance: f32,
        distance: f32,
        midpoint: (f32, f32),
        stage_size: (f32, f32),
    ) {
        match self.mode {
            ViewMode::Inline => {
                if previous_distance > 0.0 {
                    self.zoom_by_at(distance / previous_distance, midpoint, stage_size);
                }
            }
            ViewMode::Fullscreen => {
                self.fullscreen
                    .pinch(previous_distance, distance, midpoint, stage_size)
            }
        }
    }

    /// Multiplies the active zoom by `factor` around an element-local anchor.
    pub fn zoom_by_at(&mut self, factor: f32, anchor: (f32, f32), stage_size: (f32, f32)) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        match self.mode {
            ViewMode::Inline => {
                let zoom = self.inline.user_zoom * factor;
                self.inline.set_zoom_at(zoom, anchor, stage_size);
            }
            ViewMode::Fullscreen => {
                let scale = self.fullscreen.scale * factor;
                self.fullscreen.zoom_at(scale, anchor, stage_size);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_stage_round_trip() {
        let transform = ViewportTransform {
            scale: 2.0,
            pan: (10.0, -4.0),
        };
        let origin = (100.0, 50.0);
        let stage = transform.client_to_stage((140.0, 70.0), origin);
        assert_eq!(stage, (10.0, 14.0));
        assert_eq!(transform.stage_to_client(stage, origin), (140.0, 70.0));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut transform = ViewportTransform {
            scale: 1.0,
            pan: (-20.0, 5.0),
        };
        let anchor = (300.0, 200.0);
        let before = transform.client_to_stage(anchor, (0.0, 0.0));
        transform.zoom_at(2.5, anchor);
        let after = transform.client_to_stage(anchor, (0.0, 0.0));
        assert!((before.0 - after.0).abs() < 1.0e-3);
        assert!((before.1 - after.1).abs() < 1.0e-3);
    }

    #[test]
    fn zero_scale_is_floored() {
        let transform = ViewportTransform {
            scale: 0.0,
            pan: (0.0, 0.0),
        };
        let stage = transform.client_to_stage((10.0, 10.0), (0.0, 0.0));
        assert!(stage.0.is_finite() && stage.1.is_finite());
    }

    #[test]
    fn fullscreen_centers_small_content() {
        let mut view = FullscreenViewport::default();
        view.fit((1000.0, 500.0), (400.0, 400.0), (400.0, 400.0));
        assert!((view.scale - 1.25).abs() < 1.0e-4);
        let rect = view.transform().visible_rect(view.viewport);
        assert!((rect.min_x + rect.width * 0.5 - 200.0).abs() < 1.0e-2);
        assert!((rect.min_y + rect.height * 0.5 - 200.0).abs() < 1.0e-2);
    }

    #[test]
    fn fullscreen_pan_is_bounded_on_large_content() {
        let mut transform = ViewportTransform {
            scale: 2.0,
            pan: (50.0, -900.0),
        };
        clamp_fullscreen_pan(&mut transform, (800.0, 600.0), (1000.0, 500.0));
        assert_eq!(transform.pan, (0.0, -200.0));

        transform.pan = (-5_000.0, -20.0);
        clamp_fullscreen_pan(&mut transform, (800.0, 600.0), (1000.0, 500.0));
        assert_eq!(transform.pan, (-600.0, -20.0));
    }

    #[test]
    fn fullscreen_pinch_keeps_midpoint_fixed() {
        let mut view = FullscreenViewport::default();
        let stage = (2000.0, 1200.0);
        view.fit((1000.0, 600.0), stage, stage);
        let midpoint = (420.0, 260.0);
        let before = view.transform().client_to_stage(midpoint, (0.0, 0.0));
        view.pinch(100.0, 160.0, midpoint, stage);
        assert!((view.scale - 0.8).abs() < 1.0e-4);
        let after = view.transform().client_to_stage(midpoint, (0.0, 0.0));
        assert!((before.0 - after.0).abs() < 1.0e-2);
        assert!((before.1 - after.1).abs() < 1.0e-2);
    }

    #[test]
    fn inline_pan_stays_on_content() {
        let mut view = InlineViewport::default();
        view.fit((800.0, 600.0), (800.0, 600.0), (800.0, 600.0));
        view.set_zoom_at(2.0, (0.0, 0.0), (800.0, 600.0));
        view.pan_by_client(10_000.0, 10_000.0, (800.0, 600.0));
        assert_eq!(view.pan, (0.0, 0.0));
        view.pan_by_client(-10_000.0, -10_000.0, (800.0, 600.0));
        assert_eq!(view.pan, (-400.0, -300.0));
    }
}

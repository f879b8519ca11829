use crate::config::EngineConfig;
use crate::error::ViewError;
use crate::geo::{wrap_lon, Point};
use crate::map::extent::Extent;
use crate::map::projection::ScreenTransform;

/// Complete view state. `view_extent` is what the user asked for,
/// `draw_extent` is the aspect-corrected region actually rendered.
/// Both are produced together by [`fit`] and never edited separately.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub view_extent: Extent,
    pub draw_extent: Extent,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Display is longitude/latitude (enables wraparound and anisotropy)
    pub geographic: bool,
    /// Effective anisotropy factor after bounds checking
    pub xy_scale_factor: f64,
    /// Canvas pixel width
    pub width: f64,
    /// Canvas pixel height
    pub height: f64,
}

impl ViewState {
    pub fn transform(&self) -> ScreenTransform {
        ScreenTransform {
            draw_extent: self.draw_extent,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Screen rectangle covered by the canvas
    pub fn screen_extent(&self) -> Extent {
        Extent::new(0.0, self.width, 0.0, self.height)
    }
}

/// Fit a requested view extent into a `width` x `height` pixel viewport.
///
/// The more constrained axis keeps its scale and the other axis inherits it
/// (divided or multiplied by the anisotropy factor), then the draw extent is
/// re-centered on the requested center.
pub fn fit(
    view_extent: Extent,
    width: f64,
    height: f64,
    geographic: bool,
    xy_scale_factor: f64,
    config: &EngineConfig,
) -> Result<ViewState, ViewError> {
    let min = config.min_viewport_px;
    if !(width >= min && height >= min) {
        return Err(ViewError::ViewportTooSmall { width, height, min });
    }
    if !view_extent.is_finite() {
        return Err(ViewError::NonFiniteExtent);
    }
    if view_extent.width() <= 0.0 || view_extent.height() <= 0.0 {
        return Err(ViewError::DegenerateExtent);
    }

    let factor = if geographic {
        config.checked_xy_scale_factor(xy_scale_factor)
    } else {
        1.0
    };

    let mut scale_x = width / view_extent.width();
    let mut scale_y = height / view_extent.height();
    let mut draw_extent = view_extent;
    let center = view_extent.center();

    if scale_x > scale_y {
        // y binds: widen x to fill the canvas
        scale_x = scale_y / factor;
        let half = width / scale_x * 0.5;
        draw_extent.min_x = center.x - half;
        draw_extent.max_x = center.x + half;
    } else {
        scale_y = scale_x * factor;
        let half = height / scale_y * 0.5;
        draw_extent.min_y = center.y - half;
        draw_extent.max_y = center.y + half;
    }

    Ok(ViewState {
        view_extent,
        draw_extent,
        scale_x,
        scale_y,
        geographic,
        xy_scale_factor: factor,
        width,
        height,
    })
}

/// Owns the view state and funnels every zoom/pan/resize through [`fit`].
/// A failed request leaves the previous state in place.
#[derive(Clone, Debug)]
pub struct ViewController {
    state: ViewState,
    requested_factor: f64,
    config: EngineConfig,
    epoch: u64,
}

impl ViewController {
    pub fn new(
        view_extent: Extent,
        width: f64,
        height: f64,
        geographic: bool,
        config: EngineConfig,
    ) -> Result<Self, ViewError> {
        let requested_factor = config.xy_scale_factor;
        let state = fit(view_extent, width, height, geographic, requested_factor, &config)?;
        Ok(Self {
            state,
            requested_factor,
            config,
            epoch: 0,
        })
    }

    /// Whole-world lon/lat view
    pub fn world(width: f64, height: f64, config: EngineConfig) -> Result<Self, ViewError> {
        Self::new(Extent::new(-180.0, 180.0, -90.0, 90.0), width, height, true, config)
    }

    #[inline(always)]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn transform(&self) -> ScreenTransform {
        self.state.transform()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bumped on every successful refit; screen-space caches compare against it
    #[inline(always)]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn refit(
        &mut self,
        view_extent: Extent,
        width: f64,
        height: f64,
        geographic: bool,
    ) -> Result<(), ViewError> {
        match fit(view_extent, width, height, geographic, self.requested_factor, &self.config) {
            Ok(state) => {
                self.state = state;
                self.epoch += 1;
                Ok(())
            }
            Err(e) => {
                log::debug!("view fit rejected: {e}");
                Err(e)
            }
        }
    }

    /// Update canvas size when the host surface resizes
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), ViewError> {
        let s = self.state;
        self.refit(s.view_extent, width, height, s.geographic)
    }

    pub fn zoom_to_extent(&mut self, extent: Extent) -> Result<(), ViewError> {
        let s = self.state;
        self.refit(extent, s.width, s.height, s.geographic)
    }

    /// Move the view center, keeping the requested extent size
    pub fn set_view_center(&mut self, center: Point) -> Result<(), ViewError> {
        let s = self.state;
        let half_w = s.view_extent.width() * 0.5;
        let half_h = s.view_extent.height() * 0.5;
        self.refit(Extent::around(center, half_w, half_h), s.width, s.height, s.geographic)
    }

    /// Switch between lon/lat and projected display. The view extent is
    /// kept as-is; callers changing CRS follow up with `zoom_to_extent`.
    pub fn set_geographic_mode(&mut self, geographic: bool) -> Result<(), ViewError> {
        let s = self.state;
        self.refit(s.view_extent, s.width, s.height, geographic)
    }

    pub fn set_xy_scale_factor(&mut self, factor: f64) -> Result<(), ViewError> {
        let previous = self.requested_factor;
        self.requested_factor = factor;
        let s = self.state;
        let result = self.refit(s.view_extent, s.width, s.height, s.geographic);
        if result.is_err() {
            self.requested_factor = previous;
        }
        result
    }

    /// Pan the view by a pixel delta
    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<(), ViewError> {
        let s = self.state;
        let mut center = s.view_extent.center();
        center.x += dx / s.scale_x;
        center.y -= dy / s.scale_y;

        if s.geographic {
            // Keep the center on the primary world copy; wraparound covers the rest
            if center.x.abs() > 180.0 {
                center.x = wrap_lon(center.x);
            }
            center.y = center.y.clamp(-90.0, 90.0);
        }

        self.set_view_center(center)
    }

    pub fn zoom_in(&mut self) -> Result<(), ViewError> {
        self.zoom_about(self.state.view_extent.center(), self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> Result<(), ViewError> {
        self.zoom_about(self.state.view_extent.center(), 1.0 / self.config.zoom_step)
    }

    /// Zoom in towards a pixel location
    pub fn zoom_in_at(&mut self, px: f64, py: f64) -> Result<(), ViewError> {
        self.zoom_at(px, py, self.config.zoom_step)
    }

    /// Zoom out from a pixel location
    pub fn zoom_out_at(&mut self, px: f64, py: f64) -> Result<(), ViewError> {
        self.zoom_at(px, py, 1.0 / self.config.zoom_step)
    }

    /// Zoom by `factor`, keeping the map point under the pixel fixed
    pub fn zoom_at(&mut self, px: f64, py: f64, factor: f64) -> Result<(), ViewError> {
        let (x, y) = self.transform().unproject(px, py);
        self.zoom_about(Point::new(x, y), factor)
    }

    fn zoom_about(&mut self, anchor: Point, factor: f64) -> Result<(), ViewError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ViewError::InvalidScale {
                scale_x: factor,
                scale_y: factor,
            });
        }
        let v = self.state.view_extent;
        let zoomed = Extent::new(
            anchor.x - (anchor.x - v.min_x) / factor,
            anchor.x + (v.max_x - anchor.x) / factor,
            anchor.y - (anchor.y - v.min_y) / factor,
            anchor.y + (v.max_y - anchor.y) / factor,
        );
        self.zoom_to_extent(zoomed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_fit_world_identity() {
        let config = EngineConfig::default();
        let s = fit(Extent::new(-180.0, 180.0, -90.0, 90.0), 360.0, 180.0, true, 1.0, &config)
            .unwrap();
        assert_eq!(s.scale_x, 1.0);
        assert_eq!(s.scale_y, 1.0);
        assert_eq!(s.draw_extent, Extent::new(-180.0, 180.0, -90.0, 90.0));
        assert_eq!(s.transform().project(0.0, 0.0), (180.0, 90.0));
    }

    #[test]
    fn test_fit_wide_viewport_widens_x() {
        let config = EngineConfig::default();
        let view = Extent::new(0.0, 10.0, 0.0, 10.0);
        let s = fit(view, 200.0, 100.0, false, 1.0, &config).unwrap();
        assert_eq!(s.scale_x, 10.0);
        assert_eq!(s.scale_y, 10.0);
        assert_eq!(s.draw_extent, Extent::new(-5.0, 15.0, 0.0, 10.0));
        // requested extent is preserved as intent
        assert_eq!(s.view_extent, view);
    }

    #[test]
    fn test_fit_tall_viewport_widens_y() {
        let config = EngineConfig::default();
        let s = fit(Extent::new(0.0, 10.0, 0.0, 10.0), 100.0, 300.0, false, 1.0, &config).unwrap();
        assert_eq!(s.scale_x, 10.0);
        assert_eq!(s.scale_y, 10.0);
        assert_eq!(s.draw_extent, Extent::new(0.0, 10.0, -10.0, 20.0));
    }

    #[test]
    fn test_fit_anisotropy_geographic_only() {
        let config = EngineConfig::default();
        let view = Extent::new(0.0, 10.0, 0.0, 10.0);
        let geo = fit(view, 100.0, 300.0, true, 2.0, &config).unwrap();
        assert_eq!(geo.scale_y, 20.0);
        assert_eq!(geo.xy_scale_factor, 2.0);
        assert!(close(geo.draw_extent.height(), 15.0));
        assert!(close(geo.draw_extent.center().y, 5.0));

        let projected = fit(view, 100.0, 300.0, false, 2.0, &config).unwrap();
        assert_eq!(projected.scale_y, 10.0);
        assert_eq!(projected.xy_scale_factor, 1.0);

        let reset = fit(view, 100.0, 300.0, true, 4.0, &config).unwrap();
        assert_eq!(reset.xy_scale_factor, 1.0);
    }

    #[test]
    fn test_fit_anisotropy_wide_viewport() {
        let config = EngineConfig::default();
        let view = Extent::new(0.0, 10.0, 0.0, 10.0);
        let s = fit(view, 300.0, 100.0, true, 2.0, &config).unwrap();
        assert_eq!(s.scale_y, 10.0);
        assert_eq!(s.scale_x, 5.0);
        assert!(close(s.draw_extent.width(), 60.0));
        assert!(close(s.draw_extent.center().x, 5.0));
        assert_eq!((s.draw_extent.min_y, s.draw_extent.max_y), (0.0, 10.0));
    }

    #[test]
    fn test_fit_rejections() {
        let config = EngineConfig::default();
        let view = Extent::new(0.0, 10.0, 0.0, 10.0);
        assert!(matches!(
            fit(view, 4.0, 100.0, false, 1.0, &config),
            Err(ViewError::ViewportTooSmall { .. })
        ));
        assert_eq!(
            fit(Extent::new(0.0, 0.0, 0.0, 10.0), 100.0, 100.0, false, 1.0, &config),
            Err(ViewError::DegenerateExtent)
        );
    }

    #[test]
    fn test_failed_request_keeps_state() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        let before = *vc.state();
        let epoch = vc.epoch();
        assert!(vc.resize(2.0, 2.0).is_err());
        assert!(vc.zoom_to_extent(Extent::new(1.0, 1.0, 0.0, 5.0)).is_err());
        assert_eq!(*vc.state(), before);
        assert_eq!(vc.epoch(), epoch);
    }

    #[test]
    fn test_epoch_advances() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        vc.zoom_in().unwrap();
        vc.pan(10.0, 0.0).unwrap();
        vc.resize(400.0, 200.0).unwrap();
        assert_eq!(vc.epoch(), 3);
    }

    #[test]
    fn test_set_view_center() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        vc.set_view_center(Point::new(100.0, 10.0)).unwrap();
        let s = vc.state();
        assert_eq!(s.view_extent, Extent::new(-80.0, 280.0, -80.0, 100.0));
        assert_eq!(s.transform().project(100.0, 10.0), (180.0, 90.0));
    }

    #[test]
    fn test_pan_moves_center_and_wraps() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        vc.pan(10.0, 0.0).unwrap();
        assert!(vc.state().view_extent.center().x > 0.0);

        vc.set_view_center(Point::new(175.0, 0.0)).unwrap();
        vc.pan(10.0, 0.0).unwrap();
        assert!(close(vc.state().view_extent.center().x, -175.0));
    }

    #[test]
    fn test_zoom_at_keeps_point_fixed() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        let (px, py) = (90.0, 45.0);
        let before = vc.transform().unproject(px, py);
        vc.zoom_in_at(px, py).unwrap();
        let after = vc.transform().unproject(px, py);
        assert!(close(before.0, after.0));
        assert!(close(before.1, after.1));
        assert!(close(vc.state().scale_x, 1.5));
    }

    #[test]
    fn test_zoom_in_out_restores() {
        let mut vc = ViewController::world(360.0, 180.0, EngineConfig::default()).unwrap();
        vc.zoom_in().unwrap();
        vc.zoom_out().unwrap();
        let e = vc.state().view_extent;
        assert!(close(e.min_x, -180.0) && close(e.max_x, 180.0));
    }
}

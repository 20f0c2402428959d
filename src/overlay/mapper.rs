//! Coordinate mapper: client pixels <-> canvas pixels <-> world.
//!
//! Stateless per call except for one deliberate cache: the client rect
//! (canvas origin within the window plus the logical-to-backing scale
//! factor) used to map pointer events into canvas space. That cache MUST be
//! invalidated on every camera change and resize; a stale rect produces
//! coordinate drift that compounds over a session, which is a correctness
//! bug, not a performance one.
//!
//! Every operation fails soft to `None`. The overlay must keep running
//! through viewer startup, teardown, and degenerate camera states.

use bevy::prelude::*;

use crate::viewer::Viewport;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ClientRect {
    origin: Vec2,
    scale_factor: f32,
}

#[derive(Resource, Default)]
pub struct CoordinateMapper {
    cached_rect: Option<ClientRect>,
}

impl CoordinateMapper {
    /// Drops the cached client rect; called on camera change and resize.
    pub fn invalidate_client_rect(&mut self) {
        self.cached_rect = None;
    }

    /// Maps a pointer position in window logical coordinates into canvas
    /// pixel space. None when the canvas has no extent.
    pub fn client_to_canvas(&mut self, viewport: &Viewport, client: Vec2) -> Option<Vec2> {
        if viewport.canvas_size.x == 0 || viewport.canvas_size.y == 0 {
            return None;
        }
        let rect = *self.cached_rect.get_or_insert(ClientRect {
            origin: viewport.canvas_origin,
            scale_factor: viewport.scale_factor,
        });
        let canvas = (client - rect.origin) * rect.scale_factor;
        canvas.is_finite().then_some(canvas)
    }

    /// Delegates to the viewer's projection; None while it is unavailable.
    pub fn canvas_to_world(&self, viewport: &Viewport, canvas: Vec2) -> Option<Vec3> {
        viewport.canvas_to_world(canvas)
    }

    /// None on non-finite results, guarding degenerate camera states.
    pub fn world_to_canvas(&self, viewport: &Viewport, world: Vec3) -> Option<Vec2> {
        viewport.world_to_canvas(world)
    }

    /// Converts a screen-space brush radius into world units. Recomputed
    /// from the current camera on every call so the brush tracks zoom.
    pub fn world_radius(&self, viewport: &Viewport, screen_radius: f32) -> Option<f32> {
        let wupp = viewport.world_units_per_pixel()?;
        let radius = screen_radius * wupp;
        (radius.is_finite() && radius > 0.0).then_some(radius)
    }

    /// Inverse of [`world_radius`](Self::world_radius).
    pub fn canvas_radius(&self, viewport: &Viewport, world_radius: f32) -> Option<f32> {
        let wupp = viewport.world_units_per_pixel()?;
        let radius = world_radius / wupp;
        (radius.is_finite() && radius > 0.0).then_some(radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::CameraSnapshot;

    fn viewport(scale: f32) -> Viewport {
        Viewport {
            canvas_size: UVec2::new(800, 600),
            canvas_origin: Vec2::new(40.0, 10.0),
            scale_factor: 2.0,
            camera: Some(CameraSnapshot {
                scale,
                focal_point: Vec3::ZERO,
                position: Vec3::new(0.0, 0.0, 1000.0),
                view_up: Vec3::Y,
            }),
        }
    }

    #[test]
    fn test_client_to_canvas_applies_origin_and_scale() {
        let mut mapper = CoordinateMapper::default();
        let vp = viewport(300.0);
        let canvas = mapper.client_to_canvas(&vp, Vec2::new(140.0, 60.0)).unwrap();
        assert_eq!(canvas, Vec2::new(200.0, 100.0));
    }

    #[test]
    fn test_client_to_canvas_zero_extent_fails_soft() {
        let mut mapper = CoordinateMapper::default();
        let mut vp = viewport(300.0);
        vp.canvas_size = UVec2::ZERO;
        assert!(mapper.client_to_canvas(&vp, Vec2::ZERO).is_none());
    }

    #[test]
    fn test_stale_client_rect_until_invalidated() {
        let mut mapper = CoordinateMapper::default();
        let mut vp = viewport(300.0);
        let before = mapper.client_to_canvas(&vp, Vec2::new(140.0, 60.0)).unwrap();

        // The canvas moved but the cache is still warm
        vp.canvas_origin = Vec2::new(0.0, 0.0);
        let stale = mapper.client_to_canvas(&vp, Vec2::new(140.0, 60.0)).unwrap();
        assert_eq!(stale, before);

        // Invalidation picks up the new rect
        mapper.invalidate_client_rect();
        let fresh = mapper.client_to_canvas(&vp, Vec2::new(140.0, 60.0)).unwrap();
        assert_eq!(fresh, Vec2::new(280.0, 120.0));
    }

    #[test]
    fn test_world_radius_round_trip() {
        let mapper = CoordinateMapper::default();
        let vp = viewport(300.0);
        // 1 world unit per canvas pixel
        let world = mapper.world_radius(&vp, 14.0).unwrap();
        assert!((world - 14.0).abs() < 1e-5);
        let back = mapper.canvas_radius(&vp, world).unwrap();
        assert!((back - 14.0).abs() < 1e-5);
    }

    #[test]
    fn test_radius_follows_current_camera() {
        let mapper = CoordinateMapper::default();
        let near = mapper.world_radius(&viewport(300.0), 10.0).unwrap();
        // Zoomed out by 2x: the same screen radius covers twice the world
        let far = mapper.world_radius(&viewport(600.0), 10.0).unwrap();
        assert!((far - near * 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_radius_without_camera_fails_soft() {
        let mapper = CoordinateMapper::default();
        let mut vp = viewport(300.0);
        vp.camera = None;
        assert!(mapper.world_radius(&vp, 10.0).is_none());
        assert!(mapper.canvas_radius(&vp, 10.0).is_none());
    }

    #[test]
    fn test_projection_delegates_with_guards() {
        let mapper = CoordinateMapper::default();
        let vp = viewport(300.0);
        let world = mapper.canvas_to_world(&vp, Vec2::new(400.0, 300.0)).unwrap();
        assert!((world - Vec3::ZERO).length() < 1e-4);
        let canvas = mapper.world_to_canvas(&vp, world).unwrap();
        assert!((canvas - Vec2::new(400.0, 300.0)).length() < 1e-3);
    }
}

//! The viewport contract consumed by the annotation overlay.
//!
//! [`Viewport`] is a value snapshot of everything the overlay is allowed to
//! know about the viewer: backing-canvas geometry, the current camera, and
//! the canvas<->world projection derived from them. The overlay treats it as
//! read-only and samples it at paint time; it must never cache projection
//! results across a camera change.
//!
//! Projection conventions: canvas space has its origin at the top-left with
//! Y growing downward (backing-store pixels); world space is the patient
//! coordinate frame with Y growing upward and Z advancing along the slice
//! stack.

use bevy::prelude::*;

use crate::constants::SLICE_SPACING;

use super::camera::{CameraZoom, SliceCamera};
use super::slices::SliceStack;

/// Fired by the viewer whenever the camera moves, zooms, or resets.
/// High-frequency during gestures.
#[derive(Message)]
pub struct CameraModified {
    /// True for the camera-reset variant (Home key)
    pub reset: bool,
}

/// Fired after the viewer has composited a frame whose geometry or camera
/// differs from the previous one.
#[derive(Message)]
pub struct ImageRendered;

/// Fired when the displayed slice changes.
#[derive(Message)]
pub struct SliceChanged {
    pub slice: u32,
}

/// Read-only camera state sampled from the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSnapshot {
    /// World units spanned by half the canvas height (parallel scale).
    /// Larger means more zoomed out.
    pub scale: f32,
    /// World coordinate centered in the viewport
    pub focal_point: Vec3,
    pub position: Vec3,
    pub view_up: Vec3,
}

/// The viewer-owned contract surface the overlay reads each frame.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Backing-store pixel dimensions, authoritative for overlay sizing
    pub canvas_size: UVec2,
    /// Top-left of the canvas in window logical coordinates
    pub canvas_origin: Vec2,
    /// Logical-to-backing-store pixel ratio
    pub scale_factor: f32,
    /// None until the camera has been sampled at least once
    pub camera: Option<CameraSnapshot>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            canvas_size: UVec2::ZERO,
            canvas_origin: Vec2::ZERO,
            scale_factor: 1.0,
            camera: None,
        }
    }
}

impl Viewport {
    /// World units covered by one canvas pixel, derived from the current
    /// camera. None while the camera is unavailable or degenerate.
    pub fn world_units_per_pixel(&self) -> Option<f32> {
        let camera = self.camera.as_ref()?;
        let height = self.canvas_size.y as f32;
        if height <= 0.0 {
            return None;
        }
        let wupp = 2.0 * camera.scale / height;
        (wupp.is_finite() && wupp > 0.0).then_some(wupp)
    }

    pub fn canvas_to_world(&self, canvas: Vec2) -> Option<Vec3> {
        let camera = self.camera.as_ref()?;
        let wupp = self.world_units_per_pixel()?;
        let center = self.canvas_size.as_vec2() * 0.5;
        let world = Vec3::new(
            camera.focal_point.x + (canvas.x - center.x) * wupp,
            camera.focal_point.y + (center.y - canvas.y) * wupp,
            camera.focal_point.z,
        );
        world.is_finite().then_some(world)
    }

    pub fn world_to_canvas(&self, world: Vec3) -> Option<Vec2> {
        let camera = self.camera.as_ref()?;
        let wupp = self.world_units_per_pixel()?;
        let center = self.canvas_size.as_vec2() * 0.5;
        let canvas = Vec2::new(
            center.x + (world.x - camera.focal_point.x) / wupp,
            center.y - (world.y - camera.focal_point.y) / wupp,
        );
        canvas.is_finite().then_some(canvas)
    }
}

/// Samples the Bevy camera into the [`Viewport`] resource and announces a
/// composited frame whenever the sampled state changed.
pub fn sample_viewport(
    mut viewport: ResMut<Viewport>,
    window_query: Query<&Window>,
    camera_query: Query<(&Transform, &CameraZoom), With<SliceCamera>>,
    stack: Res<SliceStack>,
    mut rendered: MessageWriter<ImageRendered>,
) {
    let Ok(window) = window_query.single() else {
        return;
    };

    let Ok((transform, zoom)) = camera_query.single() else {
        return;
    };

    let slice_z = stack.current as f32 * SLICE_SPACING;
    let sampled = Viewport {
        canvas_size: UVec2::new(window.physical_width(), window.physical_height()),
        canvas_origin: Vec2::ZERO,
        scale_factor: window.scale_factor(),
        camera: Some(CameraSnapshot {
            scale: zoom.scale * window.height() * 0.5,
            focal_point: Vec3::new(transform.translation.x, transform.translation.y, slice_z),
            position: Vec3::new(
                transform.translation.x,
                transform.translation.y,
                slice_z + transform.translation.z,
            ),
            view_up: Vec3::Y,
        }),
    };

    if *viewport != sampled {
        *viewport = sampled;
        rendered.write(ImageRendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_viewport() -> Viewport {
        Viewport {
            canvas_size: UVec2::new(800, 600),
            canvas_origin: Vec2::ZERO,
            scale_factor: 1.0,
            camera: Some(CameraSnapshot {
                scale: 300.0,
                focal_point: Vec3::new(10.0, -20.0, 3.0),
                position: Vec3::new(10.0, -20.0, 1003.0),
                view_up: Vec3::Y,
            }),
        }
    }

    #[test]
    fn test_world_units_per_pixel() {
        let vp = test_viewport();
        // 2 * 300 / 600 = 1 world unit per pixel
        assert_eq!(vp.world_units_per_pixel(), Some(1.0));
    }

    #[test]
    fn test_focal_point_maps_to_canvas_center() {
        let vp = test_viewport();
        let canvas = vp.world_to_canvas(Vec3::new(10.0, -20.0, 3.0)).unwrap();
        assert_eq!(canvas, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_canvas_y_is_flipped() {
        let vp = test_viewport();
        // A world point above the focal point lands above canvas center,
        // which is a smaller canvas Y
        let canvas = vp.world_to_canvas(Vec3::new(10.0, -10.0, 3.0)).unwrap();
        assert!(canvas.y < 300.0);
    }

    #[test]
    fn test_projection_round_trip() {
        let vp = test_viewport();
        let canvas = Vec2::new(123.0, 456.0);
        let world = vp.canvas_to_world(canvas).unwrap();
        let back = vp.world_to_canvas(world).unwrap();
        assert!((back - canvas).length() < 1e-3);
    }

    #[test]
    fn test_canvas_to_world_preserves_slice_z() {
        let vp = test_viewport();
        let world = vp.canvas_to_world(Vec2::new(0.0, 0.0)).unwrap();
        assert_eq!(world.z, 3.0);
    }

    #[test]
    fn test_no_camera_fails_soft() {
        let vp = Viewport::default();
        assert!(vp.world_units_per_pixel().is_none());
        assert!(vp.canvas_to_world(Vec2::ZERO).is_none());
        assert!(vp.world_to_canvas(Vec3::ZERO).is_none());
    }

    #[test]
    fn test_zero_extent_canvas_fails_soft() {
        let mut vp = test_viewport();
        vp.canvas_size = UVec2::ZERO;
        assert!(vp.world_units_per_pixel().is_none());
        assert!(vp.world_to_canvas(Vec3::ZERO).is_none());
    }

    #[test]
    fn test_degenerate_camera_fails_soft() {
        let mut vp = test_viewport();
        vp.camera.as_mut().unwrap().scale = f32::NAN;
        assert!(vp.world_units_per_pixel().is_none());
        assert!(vp.world_to_canvas(Vec3::new(1.0, 2.0, 3.0)).is_none());
    }
}

//! Slice-stack image viewer: the rendering side of the application.
//!
//! The viewer owns the camera, the displayed slice sprite, and the
//! [`Viewport`] contract the annotation overlay consumes. The overlay never
//! reaches into the viewer's internals; it reads the sampled camera
//! snapshot and listens for [`ImageRendered`] / [`CameraModified`] /
//! [`SliceChanged`] messages, exactly as it would against a remote
//! rendering engine.

mod camera;
mod slices;
mod viewport;

pub use camera::SliceCamera;
pub use slices::SliceStack;
pub use viewport::{CameraModified, CameraSnapshot, ImageRendered, SliceChanged, Viewport};

use bevy::prelude::*;

/// Set containing every viewer system; the overlay schedules after it so
/// each frame's overlay pass sees the viewport state the viewer just drew.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerSet;

pub struct ViewerPlugin;

impl Plugin for ViewerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Viewport>()
            .init_resource::<SliceStack>()
            .add_message::<CameraModified>()
            .add_message::<ImageRendered>()
            .add_message::<SliceChanged>()
            .add_systems(Startup, (camera::spawn_camera, slices::setup_slices))
            .add_systems(
                Update,
                (
                    camera::camera_pan,
                    camera::camera_zoom,
                    camera::camera_reset,
                    camera::apply_camera_zoom,
                    slices::handle_slice_navigation,
                    viewport::sample_viewport,
                )
                    .chain()
                    .in_set(ViewerSet),
            );
    }
}

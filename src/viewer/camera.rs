//! Viewer camera: pan, zoom, and reset over the slice sprite.
//!
//! Every mutation announces itself with a [`CameraModified`] message. During
//! a drag or a scroll burst these fire once per input event, which can be
//! several times per frame; the overlay scheduler is responsible for
//! coalescing them.

use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

use super::viewport::CameraModified;

#[derive(Component)]
pub struct SliceCamera;

#[derive(Component)]
pub struct CameraZoom {
    pub scale: f32,
}

impl Default for CameraZoom {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

pub fn spawn_camera(mut commands: Commands) {
    commands.spawn((
        Camera2d,
        SliceCamera,
        CameraZoom::default(),
        Transform::from_translation(Vec3::new(0.0, 0.0, 1000.0)),
    ));
}

pub fn camera_pan(
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<bevy::input::mouse::MouseMotion>,
    mut camera_query: Query<(&mut Transform, &CameraZoom), With<SliceCamera>>,
    mut modified: MessageWriter<CameraModified>,
) {
    if !mouse_button.pressed(MouseButton::Middle) {
        mouse_motion.clear();
        return;
    }

    let Ok((mut transform, zoom)) = camera_query.single_mut() else {
        return;
    };

    let mut moved = false;
    for event in mouse_motion.read() {
        let delta = event.delta * zoom.scale;
        transform.translation.x -= delta.x;
        transform.translation.y += delta.y;
        moved = true;
    }

    if moved {
        modified.write(CameraModified { reset: false });
    }
}

pub fn camera_zoom(
    mut scroll_events: MessageReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut camera_query: Query<&mut CameraZoom, With<SliceCamera>>,
    mut modified: MessageWriter<CameraModified>,
    mut contexts: EguiContexts,
) {
    // Plain scroll is reserved for slice navigation; Ctrl+scroll zooms
    if !keyboard.pressed(KeyCode::ControlLeft) && !keyboard.pressed(KeyCode::ControlRight) {
        return;
    }

    if let Ok(ctx) = contexts.ctx_mut()
        && ctx.is_pointer_over_area()
    {
        return;
    }

    let Ok(mut zoom) = camera_query.single_mut() else {
        return;
    };

    let mut changed = false;
    for event in scroll_events.read() {
        let scroll_amount = match event.unit {
            MouseScrollUnit::Line => event.y * 0.1,
            MouseScrollUnit::Pixel => event.y * 0.001,
        };

        zoom.scale = (zoom.scale - scroll_amount).clamp(0.1, 10.0);
        changed = true;
    }

    if changed {
        modified.write(CameraModified { reset: false });
    }
}

/// Home recenters the camera and restores the default zoom.
pub fn camera_reset(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut camera_query: Query<(&mut Transform, &mut CameraZoom), With<SliceCamera>>,
    mut modified: MessageWriter<CameraModified>,
) {
    if !keyboard.just_pressed(KeyCode::Home) {
        return;
    }

    let Ok((mut transform, mut zoom)) = camera_query.single_mut() else {
        return;
    };

    transform.translation.x = 0.0;
    transform.translation.y = 0.0;
    zoom.scale = 1.0;
    modified.write(CameraModified { reset: true });
}

pub fn apply_camera_zoom(
    mut camera_query: Query<(&CameraZoom, &mut Projection), (With<SliceCamera>, Changed<CameraZoom>)>,
) {
    for (zoom, mut projection) in camera_query.iter_mut() {
        if let Projection::Orthographic(ref mut ortho) = *projection {
            ortho.scale = zoom.scale;
        }
    }
}

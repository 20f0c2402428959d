//! Synthetic slice stack and slice navigation.
//!
//! Stands in for a real volumetric loader: generates a procedural phantom
//! (concentric ellipses that shrink toward the ends of the stack) so the
//! overlay has something meaningful to track while panning, zooming, and
//! scrolling through slices.

use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy_egui::EguiContexts;

use bevy::input::mouse::MouseWheel;

use crate::constants::{SLICE_COUNT, SLICE_EXTENT};

use super::viewport::SliceChanged;

/// Resource holding the generated slice images and the active slice index.
#[derive(Resource, Default)]
pub struct SliceStack {
    pub handles: Vec<Handle<Image>>,
    pub current: u32,
}

impl SliceStack {
    pub fn count(&self) -> u32 {
        self.handles.len() as u32
    }
}

/// Marker for the sprite displaying the active slice
#[derive(Component)]
pub struct SliceSprite;

pub fn setup_slices(
    mut commands: Commands,
    mut images: ResMut<Assets<Image>>,
    mut stack: ResMut<SliceStack>,
) {
    for index in 0..SLICE_COUNT {
        stack.handles.push(images.add(create_slice_image(index)));
    }
    stack.current = SLICE_COUNT / 2;

    let handle = stack.handles[stack.current as usize].clone();
    commands.spawn((
        Sprite::from_image(handle),
        Transform::from_translation(Vec3::ZERO),
        SliceSprite,
    ));
}

/// Grayscale phantom: nested ellipses whose radii taper with distance from
/// the stack center, plus a faint grid so drift is visible at a glance.
fn create_slice_image(index: u32) -> Image {
    let size = SLICE_EXTENT as usize;
    let mut data = vec![0u8; size * size * 4];

    let center = size as f32 / 2.0;
    let depth = (index as f32 + 0.5) / SLICE_COUNT as f32;
    // 0 at the stack ends, 1 in the middle
    let taper = (1.0 - (2.0 * depth - 1.0).powi(2)).max(0.05);

    for y in 0..size {
        for x in 0..size {
            let dx = (x as f32 - center) / center;
            let dy = (y as f32 - center) / center;
            let r = (dx * dx + 1.4 * dy * dy).sqrt();

            let body = 0.85 * taper;
            let organ = 0.45 * taper;
            let core = 0.18 * taper;

            let mut value: u8 = if r < core {
                200
            } else if r < organ {
                130
            } else if r < body {
                70
            } else {
                12
            };

            // Faint grid lines every 64 pixels
            if x % 64 == 0 || y % 64 == 0 {
                value = value.saturating_add(18);
            }

            let idx = (y * size + x) * 4;
            data[idx] = value;
            data[idx + 1] = value;
            data[idx + 2] = value;
            data[idx + 3] = 255;
        }
    }

    Image::new(
        Extent3d {
            width: SLICE_EXTENT,
            height: SLICE_EXTENT,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        default(),
    )
}

/// Scroll wheel (without Ctrl) and PageUp/PageDown step through the stack.
pub fn handle_slice_navigation(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut scroll_events: MessageReader<MouseWheel>,
    mut stack: ResMut<SliceStack>,
    mut sprite_query: Query<&mut Sprite, With<SliceSprite>>,
    mut changed: MessageWriter<SliceChanged>,
    mut contexts: EguiContexts,
) {
    let ctrl = keyboard.pressed(KeyCode::ControlLeft) || keyboard.pressed(KeyCode::ControlRight);
    let over_ui = contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false);

    let mut step: i32 = 0;
    if !ctrl && !over_ui {
        for event in scroll_events.read() {
            if event.y > 0.0 {
                step += 1;
            } else if event.y < 0.0 {
                step -= 1;
            }
        }
    } else {
        scroll_events.clear();
    }

    if keyboard.just_pressed(KeyCode::PageUp) {
        step += 1;
    }
    if keyboard.just_pressed(KeyCode::PageDown) {
        step -= 1;
    }

    if step == 0 || stack.count() == 0 {
        return;
    }

    let max = stack.count() as i32 - 1;
    let next = (stack.current as i32 + step).clamp(0, max) as u32;
    if next == stack.current {
        return;
    }
    stack.current = next;

    let Ok(mut sprite) = sprite_query.single_mut() else {
        return;
    };
    sprite.image = stack.handles[next as usize].clone();

    changed.write(SliceChanged { slice: next });
}

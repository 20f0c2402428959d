//! Annotation overlay: two CPU-painted surfaces composited above the
//! slice viewer.
//!
//! The finalized surface holds every committed annotation for the current
//! slice; the active surface holds the live stroke preview and cursor
//! adornments. Both are presented as full-window UI images so they track
//! the viewer's canvas exactly. All repainting is planned by the
//! [`scheduler::SyncScheduler`] once per frame; no signal handler paints
//! directly.

mod annotation;
mod mapper;
mod painter;
mod save;
mod scheduler;
mod store;
mod surface;
mod tools;

pub use annotation::{Annotation, AnnotationKind, CombineMode};
pub use save::{AnnotationDocument, SaveState};
pub use scheduler::SyncScheduler;
pub use store::AnnotationStore;
pub use tools::{OverlayTool, PointerState, ToolSettings};

use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use std::time::Instant;

use crate::viewer::{CameraModified, ImageRendered, SliceChanged, SliceStack, ViewerSet, Viewport};

use mapper::CoordinateMapper;
use scheduler::FramePlan;
use surface::Surface;

/// The two paint surfaces and the GPU image handles presenting them.
#[derive(Resource)]
pub struct OverlaySurfaces {
    static_surface: Surface,
    active_surface: Surface,
    static_handle: Handle<Image>,
    active_handle: Handle<Image>,
}

/// This frame's repaint decisions, produced by `plan_frame` and consumed
/// by the paint and upload systems later in the chain.
#[derive(Resource, Default)]
struct CurrentFrame(FramePlan);

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoordinateMapper>()
            .init_resource::<AnnotationStore>()
            .init_resource::<SyncScheduler>()
            .init_resource::<ToolSettings>()
            .init_resource::<PointerState>()
            .init_resource::<SaveState>()
            .init_resource::<CurrentFrame>()
            .add_systems(Startup, (setup_overlay, restore_autosave))
            .add_systems(
                Update,
                (
                    collect_signals,
                    tools::handle_tool_shortcuts,
                    tools::handle_pointer,
                    plan_frame,
                    paint_static,
                    paint_active,
                    upload_surfaces,
                    save::autosave_system,
                    save::poll_save_tasks,
                )
                    .chain()
                    .after(ViewerSet),
            );
    }
}

fn surface_image(surface: &Surface) -> Image {
    let size = surface.size();
    Image::new(
        Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        surface.data().to_vec(),
        TextureFormat::Rgba8UnormSrgb,
        default(),
    )
}

/// Spawns the two full-window overlay image nodes, finalized below active.
fn setup_overlay(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    let static_surface = Surface::new(UVec2::ONE);
    let active_surface = Surface::new(UVec2::ONE);
    let static_handle = images.add(surface_image(&static_surface));
    let active_handle = images.add(surface_image(&active_surface));

    let node = Node {
        position_type: PositionType::Absolute,
        left: Val::Px(0.0),
        top: Val::Px(0.0),
        width: Val::Percent(100.0),
        height: Val::Percent(100.0),
        ..default()
    };
    commands.spawn((
        ImageNode::new(static_handle.clone()),
        node.clone(),
        GlobalZIndex(10),
    ));
    commands.spawn((
        ImageNode::new(active_handle.clone()),
        node,
        GlobalZIndex(11),
    ));

    commands.insert_resource(OverlaySurfaces {
        static_surface,
        active_surface,
        static_handle,
        active_handle,
    });
}

fn restore_autosave(mut store: ResMut<AnnotationStore>, mut scheduler: ResMut<SyncScheduler>) {
    if save::load_autosave(&mut store) {
        scheduler.mark_all_dirty();
    }
}

/// Folds the viewer's notifications into scheduler flags. Handlers never
/// paint; they only record what happened.
fn collect_signals(
    mut camera_events: MessageReader<CameraModified>,
    mut rendered_events: MessageReader<ImageRendered>,
    mut slice_events: MessageReader<SliceChanged>,
    viewport: Res<Viewport>,
    mut mapper: ResMut<CoordinateMapper>,
    mut scheduler: ResMut<SyncScheduler>,
    mut store: ResMut<AnnotationStore>,
) {
    for _ in camera_events.read() {
        scheduler.on_camera_modified(Instant::now());
        mapper.invalidate_client_rect();
    }

    for _ in rendered_events.read() {
        scheduler.on_image_rendered(viewport.canvas_size);
        mapper.invalidate_client_rect();
    }

    for event in slice_events.read() {
        // An in-progress stroke never migrates across slices
        store.discard_stroke_not_on(event.slice);
        scheduler.set_stroke_active(store.in_progress().is_some());
        scheduler.mark_all_dirty();
    }
}

/// Once-per-frame reconciliation: applies any due resize and records the
/// repaint decisions for the rest of the chain.
fn plan_frame(
    mut frame: ResMut<CurrentFrame>,
    mut scheduler: ResMut<SyncScheduler>,
    mut surfaces: ResMut<OverlaySurfaces>,
) {
    let plan = scheduler.plan(Instant::now(), surfaces.static_surface.size());
    if let Some(size) = plan.resize {
        surfaces.static_surface.resize(size);
        surfaces.active_surface.resize(size);
    }
    frame.0 = plan;
}

fn paint_static(
    frame: Res<CurrentFrame>,
    mut surfaces: ResMut<OverlaySurfaces>,
    store: Res<AnnotationStore>,
    mapper: Res<CoordinateMapper>,
    viewport: Res<Viewport>,
    stack: Res<SliceStack>,
) {
    if !frame.0.repaint_static {
        return;
    }
    painter::paint_finalized(
        &mut surfaces.static_surface,
        &store,
        &mapper,
        &viewport,
        stack.current,
    );
}

fn paint_active(
    frame: Res<CurrentFrame>,
    mut surfaces: ResMut<OverlaySurfaces>,
    store: Res<AnnotationStore>,
    mapper: Res<CoordinateMapper>,
    viewport: Res<Viewport>,
    stack: Res<SliceStack>,
    pointer: Res<PointerState>,
    settings: Res<ToolSettings>,
) {
    if !frame.0.repaint_active {
        return;
    }
    painter::paint_active(
        &mut surfaces.active_surface,
        &store,
        &mapper,
        &viewport,
        &pointer,
        &settings,
        stack.current,
    );
}

/// Pushes repainted surfaces to their GPU images.
fn upload_surfaces(
    frame: Res<CurrentFrame>,
    surfaces: Res<OverlaySurfaces>,
    mut images: ResMut<Assets<Image>>,
) {
    let resized = frame.0.resize.is_some();
    if resized || frame.0.repaint_static {
        images.insert(
            surfaces.static_handle.id(),
            surface_image(&surfaces.static_surface),
        );
    }
    if resized || frame.0.repaint_active {
        images.insert(
            surfaces.active_handle.id(),
            surface_image(&surfaces.active_surface),
        );
    }
}

//! Repaints the two overlay surfaces from the annotation store.
//!
//! Both painters are full redraws: clear, then replay. Finalized
//! annotations replay strictly in creation order because erase kinds cut
//! holes in whatever was painted before them. Every world point is
//! re-projected through the current camera on every repaint; nothing
//! canvas-space is ever cached between frames.
//!
//! Points that fail to project (camera mid-teardown, non-finite transform)
//! are skipped individually. A shape with enough surviving points still
//! paints; one bad point must not blank the overlay.

use bevy::prelude::*;
use image::Rgba;

use crate::constants::CLOSE_HINT_RADIUS;
use crate::viewer::Viewport;

use super::annotation::{Annotation, CompositeOp};
use super::mapper::CoordinateMapper;
use super::store::AnnotationStore;
use super::surface::{Mask, Surface};
use super::tools::{InteractionState, OverlayTool, PointerState, ToolSettings};

/// Translucent fill for finalized mask content
pub const MASK_COLOR: Rgba<u8> = Rgba([236, 84, 84, 110]);
/// Erase cuts remove full alpha wherever they cover
const ERASE_CUT: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// In-progress fill strokes and open-path previews
const PREVIEW_COLOR: Rgba<u8> = Rgba([250, 160, 90, 150]);
/// In-progress erase strokes; destination-out is invisible over an empty
/// surface, so previews use a distinct color instead
const ERASE_PREVIEW_COLOR: Rgba<u8> = Rgba([120, 170, 250, 130]);
const VERTEX_COLOR: Rgba<u8> = Rgba([255, 230, 120, 220]);
const CURSOR_COLOR: Rgba<u8> = Rgba([240, 240, 240, 200]);
const CLOSE_HINT_COLOR: Rgba<u8> = Rgba([120, 250, 140, 220]);

/// Projects an annotation's world points into canvas space, dropping the
/// ones the current camera cannot map.
fn project_points(
    annotation: &Annotation,
    mapper: &CoordinateMapper,
    viewport: &Viewport,
) -> Vec<Vec2> {
    annotation
        .points
        .iter()
        .filter_map(|point| mapper.world_to_canvas(viewport, *point))
        .collect()
}

fn rasterize(
    annotation: &Annotation,
    canvas_points: &[Vec2],
    mapper: &CoordinateMapper,
    viewport: &Viewport,
    size: UVec2,
) -> Option<Mask> {
    let mut mask = Mask::new(size);
    if annotation.kind.is_stroke() {
        let radius = annotation
            .radius
            .and_then(|world| mapper.canvas_radius(viewport, world))?;
        mask.add_polyline(canvas_points, radius);
    } else {
        if canvas_points.len() < 3 {
            return None;
        }
        mask.add_polygon(canvas_points);
    }
    Some(mask)
}

/// Full redraw of the finalized surface for one slice.
pub fn paint_finalized(
    surface: &mut Surface,
    store: &AnnotationStore,
    mapper: &CoordinateMapper,
    viewport: &Viewport,
    slice: u32,
) {
    surface.clear();
    let size = surface.size();

    for annotation in store.slice_annotations(slice) {
        if !annotation.is_paintable() || !annotation.completed {
            continue;
        }
        let canvas_points = project_points(annotation, mapper, viewport);
        if canvas_points.is_empty() {
            continue;
        }
        let Some(mask) = rasterize(annotation, &canvas_points, mapper, viewport, size) else {
            continue;
        };
        let color = match annotation.kind.composite_op() {
            CompositeOp::SourceOver => MASK_COLOR,
            CompositeOp::DestinationOut => ERASE_CUT,
        };
        surface.composite(&mask, color, annotation.kind.composite_op());
    }
}

/// Full redraw of the active surface: in-progress stroke preview plus the
/// cursor adornment for the selected tool.
pub fn paint_active(
    surface: &mut Surface,
    store: &AnnotationStore,
    mapper: &CoordinateMapper,
    viewport: &Viewport,
    pointer: &PointerState,
    settings: &ToolSettings,
    slice: u32,
) {
    surface.clear();
    let size = surface.size();

    if let Some(in_progress) = store.in_progress().filter(|p| p.slice == slice) {
        let annotation = &in_progress.annotation;
        let canvas_points = project_points(annotation, mapper, viewport);

        if annotation.kind.is_stroke() {
            // Live strokes preview at full thickness so what you see is
            // what commits
            if let Some(mask) = rasterize(annotation, &canvas_points, mapper, viewport, size) {
                let color = if annotation.kind.is_erase() {
                    ERASE_PREVIEW_COLOR
                } else {
                    PREVIEW_COLOR
                };
                surface.composite(&mask, color, CompositeOp::SourceOver);
            }
        } else {
            // Closed shapes preview as an open path with vertex markers
            surface.draw_path(&canvas_points, PREVIEW_COLOR);
            for vertex in &canvas_points {
                surface.fill_disc(*vertex, 2.5, VERTEX_COLOR);
            }
            if let (Some(cursor), Some(start)) = (pointer.canvas_pos, canvas_points.first()) {
                let hint_radius = CLOSE_HINT_RADIUS * viewport.scale_factor;
                if annotation.points.len() >= 3 && cursor.distance(*start) <= hint_radius {
                    surface.draw_circle(*start, hint_radius, CLOSE_HINT_COLOR, false);
                } else if settings.tool.is_vertex_tool() {
                    // Rubber-band segment to the cursor
                    surface.draw_line(*canvas_points.last().unwrap_or(start), cursor, PREVIEW_COLOR);
                }
            }
        }
    }

    if let Some(cursor) = pointer.canvas_pos {
        paint_cursor(surface, mapper, viewport, pointer, settings, cursor);
    }
}

fn paint_cursor(
    surface: &mut Surface,
    mapper: &CoordinateMapper,
    viewport: &Viewport,
    pointer: &PointerState,
    settings: &ToolSettings,
    cursor: Vec2,
) {
    let brush_canvas_radius = || {
        mapper
            .world_radius(viewport, settings.brush_radius)
            .and_then(|world| mapper.canvas_radius(viewport, world))
            .unwrap_or(settings.brush_radius)
    };
    match settings.tool {
        OverlayTool::None => {}
        OverlayTool::Brush => {
            let dashed = pointer.state != InteractionState::Erasing;
            surface.draw_circle(cursor, brush_canvas_radius(), CURSOR_COLOR, dashed);
        }
        OverlayTool::Eraser => {
            surface.draw_circle(cursor, brush_canvas_radius(), CURSOR_COLOR, false);
        }
        OverlayTool::Freehand | OverlayTool::Polygon => {
            surface.draw_crosshair(cursor, 6.0, CURSOR_COLOR);
        }
    }
}

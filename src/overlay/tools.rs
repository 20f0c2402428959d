//! Drawing tools and the pointer interaction state machine.
//!
//! The machine is an explicit transition table over
//! `(state, pointer input, tool)` rather than nested conditionals, so the
//! two global invariants stay auditable: Escape always lands in Idle
//! discarding uncommitted points, and the secondary button on Brush/Eraser
//! always enters the erase sub-mode.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use std::time::Instant;

use crate::constants::{CLOSE_HINT_RADIUS, DEFAULT_BRUSH_RADIUS, MIN_POINT_SPACING};
use crate::viewer::{SliceStack, Viewport};

use super::annotation::{AnnotationKind, CombineMode};
use super::mapper::CoordinateMapper;
use super::save::SaveState;
use super::scheduler::SyncScheduler;
use super::store::AnnotationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayTool {
    #[default]
    None,
    Brush,
    Eraser,
    Freehand,
    Polygon,
}

impl OverlayTool {
    pub fn display_name(&self) -> &'static str {
        match self {
            OverlayTool::None => "Navigate (N)",
            OverlayTool::Brush => "Brush (B)",
            OverlayTool::Eraser => "Eraser (E)",
            OverlayTool::Freehand => "Freehand (F)",
            OverlayTool::Polygon => "Polygon (P)",
        }
    }

    pub fn all() -> &'static [OverlayTool] {
        &[
            OverlayTool::None,
            OverlayTool::Brush,
            OverlayTool::Eraser,
            OverlayTool::Freehand,
            OverlayTool::Polygon,
        ]
    }

    /// Annotation kind this tool produces. `erase` selects the
    /// destination-out twin (secondary-button sub-mode).
    pub fn stroke_kind(&self, erase: bool) -> Option<AnnotationKind> {
        match self {
            OverlayTool::None => None,
            OverlayTool::Brush => Some(if erase {
                AnnotationKind::EraserStroke
            } else {
                AnnotationKind::BrushStroke
            }),
            OverlayTool::Eraser => Some(AnnotationKind::EraserStroke),
            OverlayTool::Freehand => Some(if erase {
                AnnotationKind::FreehandErase
            } else {
                AnnotationKind::FreehandFill
            }),
            OverlayTool::Polygon => Some(if erase {
                AnnotationKind::PolygonErase
            } else {
                AnnotationKind::PolygonFill
            }),
        }
    }

    /// Click-per-vertex tools, as opposed to drag tools
    pub fn is_vertex_tool(&self) -> bool {
        matches!(self, OverlayTool::Polygon)
    }
}

/// Tool configuration; cold state, mutated only by UI and shortcuts.
#[derive(Resource)]
pub struct ToolSettings {
    pub tool: OverlayTool,
    /// Brush radius in screen pixels; converted to world units when a
    /// stroke begins
    pub brush_radius: f32,
    pub combine_mode: CombineMode,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: OverlayTool::Brush,
            brush_radius: DEFAULT_BRUSH_RADIUS,
            combine_mode: CombineMode::Add,
        }
    }
}

/// Hot interaction state, touched on every pointer event and read by the
/// active-surface painter. Deliberately not displayed anywhere directly.
#[derive(Resource, Default)]
pub struct PointerState {
    pub state: InteractionState,
    /// Cursor position in canvas pixels; None when the cursor is outside
    /// the window or over UI while idle
    pub canvas_pos: Option<Vec2>,
    /// Canvas position of the last point appended to the stroke, for
    /// point-spacing decimation
    pub last_appended: Option<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Drawing,
    Erasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerInput {
    PrimaryDown,
    PrimaryUp,
    SecondaryDown,
    SecondaryUp,
    Moved,
    Escape,
}

/// What the handler should do to the annotation store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeAction {
    Begin { erase: bool },
    Extend,
    /// Polygon click: resolved by the handler to begin / add-vertex /
    /// close depending on proximity to the start vertex
    VertexClick,
    Commit,
    Discard,
}

/// The transition table. Every `(state, input, tool)` triple maps to the
/// next state and at most one store action.
pub fn transition(
    state: InteractionState,
    input: PointerInput,
    tool: OverlayTool,
) -> (InteractionState, Option<StrokeAction>) {
    use InteractionState::*;
    use PointerInput::*;

    match (state, input, tool) {
        // Escape cancels everything, from any state
        (_, Escape, _) => (Idle, Some(StrokeAction::Discard)),

        // No active tool: pointer input never leaves Idle
        (_, _, OverlayTool::None) => (Idle, None),

        // Primary button starts / feeds a drawing gesture
        (Idle, PrimaryDown, OverlayTool::Polygon) => (Drawing, Some(StrokeAction::VertexClick)),
        (Idle, PrimaryDown, _) => (Drawing, Some(StrokeAction::Begin { erase: false })),
        (Drawing, PrimaryDown, OverlayTool::Polygon) => (Drawing, Some(StrokeAction::VertexClick)),
        (Drawing, Moved, OverlayTool::Polygon) => (Drawing, None),
        (Drawing, Moved, _) => (Drawing, Some(StrokeAction::Extend)),
        (Drawing, PrimaryUp, OverlayTool::Polygon) => (Drawing, None),
        (Drawing, PrimaryUp, _) => (Idle, Some(StrokeAction::Commit)),

        // Secondary button on the stroke tools is the erase shortcut
        (Idle, SecondaryDown, OverlayTool::Brush | OverlayTool::Eraser) => {
            (Erasing, Some(StrokeAction::Begin { erase: true }))
        }
        (Erasing, Moved, _) => (Erasing, Some(StrokeAction::Extend)),
        (Erasing, SecondaryUp, _) => (Idle, Some(StrokeAction::Commit)),

        // Everything else leaves the machine untouched
        (state, _, _) => (state, None),
    }
}

/// Keyboard tool selection and undo/redo shortcuts.
pub fn handle_tool_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut settings: ResMut<ToolSettings>,
    mut store: ResMut<AnnotationStore>,
    mut scheduler: ResMut<SyncScheduler>,
    mut save: ResMut<SaveState>,
    mut contexts: EguiContexts,
) {
    if let Ok(ctx) = contexts.ctx_mut()
        && ctx.wants_keyboard_input()
    {
        return;
    }

    let new_tool = if keyboard.just_pressed(KeyCode::KeyN) {
        Some(OverlayTool::None)
    } else if keyboard.just_pressed(KeyCode::KeyB) {
        Some(OverlayTool::Brush)
    } else if keyboard.just_pressed(KeyCode::KeyE) {
        Some(OverlayTool::Eraser)
    } else if keyboard.just_pressed(KeyCode::KeyF) {
        Some(OverlayTool::Freehand)
    } else if keyboard.just_pressed(KeyCode::KeyP) {
        Some(OverlayTool::Polygon)
    } else {
        None
    };

    if let Some(tool) = new_tool
        && tool != settings.tool
    {
        // Switching tools abandons any partial stroke
        store.discard_stroke();
        scheduler.set_stroke_active(false);
        scheduler.on_pointer_activity();
        settings.tool = tool;
    }

    let ctrl = keyboard.pressed(KeyCode::ControlLeft) || keyboard.pressed(KeyCode::ControlRight);
    if ctrl && keyboard.just_pressed(KeyCode::KeyZ) && store.undo() {
        scheduler.mark_all_dirty();
        save.note_edit(Instant::now());
    }
    if ctrl && keyboard.just_pressed(KeyCode::KeyY) && store.redo() {
        scheduler.mark_all_dirty();
        save.note_edit(Instant::now());
    }
}

/// Translates raw pointer input through the transition table into store
/// mutations and repaint scheduling.
#[allow(clippy::too_many_arguments)]
pub fn handle_pointer(
    window_query: Query<&Window, With<PrimaryWindow>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    viewport: Res<Viewport>,
    stack: Res<SliceStack>,
    settings: Res<ToolSettings>,
    mut mapper: ResMut<CoordinateMapper>,
    mut store: ResMut<AnnotationStore>,
    mut scheduler: ResMut<SyncScheduler>,
    mut pointer: ResMut<PointerState>,
    mut save: ResMut<SaveState>,
    mut contexts: EguiContexts,
) {
    let over_ui = contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false);

    let Ok(window) = window_query.single() else {
        return;
    };

    let canvas_pos = window
        .cursor_position()
        .and_then(|client| mapper.client_to_canvas(&viewport, client));

    // Hide the cursor adornment over UI unless a gesture is in flight
    let effective_pos = if over_ui && pointer.state == InteractionState::Idle {
        None
    } else {
        canvas_pos
    };

    let moved = effective_pos != pointer.canvas_pos;
    pointer.canvas_pos = effective_pos;
    if moved {
        scheduler.on_pointer_activity();
    }

    // Gather this frame's inputs in a deterministic order
    let mut inputs: Vec<PointerInput> = Vec::new();
    if keyboard.just_pressed(KeyCode::Escape) {
        inputs.push(PointerInput::Escape);
    }
    if mouse_button.just_pressed(MouseButton::Left) && !(over_ui && pointer.state == InteractionState::Idle)
    {
        inputs.push(PointerInput::PrimaryDown);
    }
    if mouse_button.just_pressed(MouseButton::Right)
        && !(over_ui && pointer.state == InteractionState::Idle)
    {
        inputs.push(PointerInput::SecondaryDown);
    }
    if moved {
        inputs.push(PointerInput::Moved);
    }
    if mouse_button.just_released(MouseButton::Left) {
        inputs.push(PointerInput::PrimaryUp);
    }
    if mouse_button.just_released(MouseButton::Right) {
        inputs.push(PointerInput::SecondaryUp);
    }

    for input in inputs {
        let (next_state, action) = transition(pointer.state, input, settings.tool);
        pointer.state = next_state;
        if let Some(action) = action {
            execute_action(
                action,
                &mut store,
                &mut scheduler,
                &mut pointer,
                &mut save,
                &mapper,
                &viewport,
                &settings,
                &stack,
            );
        }
        scheduler.set_stroke_active(store.in_progress().is_some());
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_action(
    action: StrokeAction,
    store: &mut AnnotationStore,
    scheduler: &mut SyncScheduler,
    pointer: &mut PointerState,
    save: &mut SaveState,
    mapper: &CoordinateMapper,
    viewport: &Viewport,
    settings: &ToolSettings,
    stack: &SliceStack,
) {
    let world_at_cursor = pointer
        .canvas_pos
        .and_then(|canvas| mapper.canvas_to_world(viewport, canvas));

    match action {
        StrokeAction::Begin { erase } => {
            let (Some(canvas), Some(world)) = (pointer.canvas_pos, world_at_cursor) else {
                return;
            };
            let Some(kind) = settings.tool.stroke_kind(erase) else {
                return;
            };
            let radius = kind
                .is_stroke()
                .then(|| mapper.world_radius(viewport, settings.brush_radius))
                .flatten();
            if kind.is_stroke() && radius.is_none() {
                // Camera not ready; skip the gesture entirely
                return;
            }
            store.begin_stroke(stack.current, kind, world, radius);
            pointer.last_appended = Some(canvas);
            scheduler.on_pointer_activity();
        }
        StrokeAction::Extend => {
            let (Some(canvas), Some(world)) = (pointer.canvas_pos, world_at_cursor) else {
                return;
            };
            if store.in_progress().is_none() {
                return;
            }
            // Decimate: skip points closer than the spacing threshold
            if pointer
                .last_appended
                .is_some_and(|last| canvas.distance(last) <= MIN_POINT_SPACING)
            {
                return;
            }
            store.extend_stroke(world);
            pointer.last_appended = Some(canvas);
            scheduler.on_pointer_activity();
        }
        StrokeAction::VertexClick => {
            let (Some(canvas), Some(world)) = (pointer.canvas_pos, world_at_cursor) else {
                return;
            };
            match store.in_progress() {
                None => {
                    let Some(kind) = settings.tool.stroke_kind(false) else {
                        return;
                    };
                    store.begin_stroke(stack.current, kind, world, None);
                    pointer.last_appended = Some(canvas);
                }
                Some(in_progress) => {
                    let near_start = in_progress.annotation.points.len() >= 3
                        && in_progress
                            .annotation
                            .points
                            .first()
                            .and_then(|start| mapper.world_to_canvas(viewport, *start))
                            .is_some_and(|start| {
                                canvas.distance(start)
                                    <= CLOSE_HINT_RADIUS * viewport.scale_factor
                            });
                    if near_start {
                        if store.commit_stroke(settings.combine_mode) {
                            scheduler.mark_all_dirty();
                            save.note_commit(Instant::now());
                        }
                        pointer.state = InteractionState::Idle;
                        pointer.last_appended = None;
                    } else {
                        store.extend_stroke(world);
                        pointer.last_appended = Some(canvas);
                    }
                }
            }
            scheduler.on_pointer_activity();
        }
        StrokeAction::Commit => {
            if store.commit_stroke(settings.combine_mode) {
                scheduler.mark_all_dirty();
                save.note_commit(Instant::now());
            }
            pointer.last_appended = None;
            scheduler.on_pointer_activity();
        }
        StrokeAction::Discard => {
            store.discard_stroke();
            pointer.last_appended = None;
            scheduler.on_pointer_activity();
        }
    }
}

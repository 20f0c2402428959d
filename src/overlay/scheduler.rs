//! Synchronization scheduler: decides when each overlay surface repaints.
//!
//! Three signal sources feed it: the viewer's image-rendered notification
//! (authoritative for geometry reconciliation), its camera-modified
//! notification (high-frequency during gestures), and raw pointer input
//! (which never triggers a viewer redraw on its own, so the cursor path
//! must be scheduled independently).
//!
//! Painting never happens inside a notification handler. Handlers only set
//! dirty flags; once per frame [`SyncScheduler::plan`] turns the
//! accumulated flags into a [`FramePlan`]. During a camera burst the
//! finalized surface is throttled to [`STATIC_REPAINT_INTERVAL`]; the
//! active surface (cursor, live stroke) is never throttled. When the camera
//! has been quiet for [`CAMERA_QUIET_PERIOD`] one final un-throttled
//! repaint of both surfaces runs, so annotations are pixel-exact at rest
//! even if they lagged during the drag.
//!
//! Dirty flags are cleared inside `plan`, before the caller does any paint
//! work: a flag set while painting is picked up by the next frame's plan
//! instead of being lost.

use bevy::prelude::*;
use std::time::Instant;

use crate::constants::{CAMERA_QUIET_PERIOD, STATIC_REPAINT_INTERVAL};

/// What the current frame should do, in order: resize (destroys pixel
/// content), repaint the finalized surface, repaint the active surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramePlan {
    pub resize: Option<UVec2>,
    pub repaint_static: bool,
    pub repaint_active: bool,
}

#[derive(Resource)]
pub struct SyncScheduler {
    static_dirty: bool,
    active_dirty: bool,
    pending_resize: Option<UVec2>,
    stroke_active: bool,
    last_static_paint: Option<Instant>,
    /// Deadline for the settle repaint; Some while a camera gesture is in
    /// flight. Every camera event pushes it out (debounce), it never queues.
    settle_due: Option<Instant>,
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self {
            static_dirty: true,
            active_dirty: true,
            pending_resize: None,
            stroke_active: false,
            last_static_paint: None,
            settle_due: None,
        }
    }
}

impl SyncScheduler {
    /// Camera changed: mark both surfaces dirty and reschedule the settle
    /// deadline. Never paints synchronously; projection cost scales with
    /// annotation point count and can exceed the inter-event interval.
    pub fn on_camera_modified(&mut self, now: Instant) {
        self.static_dirty = true;
        self.active_dirty = true;
        self.settle_due = Some(now + CAMERA_QUIET_PERIOD);
    }

    /// Viewer composited a frame: reconcile overlay geometry to its
    /// backing canvas on the next plan.
    pub fn on_image_rendered(&mut self, canvas_size: UVec2) {
        self.pending_resize = Some(canvas_size);
    }

    /// Pointer moved/pressed/released: the active surface repaints next
    /// frame regardless of any pending viewer notification.
    pub fn on_pointer_activity(&mut self) {
        self.active_dirty = true;
    }

    /// Force both surfaces to repaint (host-initiated redraw, slice
    /// change, undo, import).
    pub fn mark_all_dirty(&mut self) {
        self.static_dirty = true;
        self.active_dirty = true;
    }

    /// Backing-store resizes clear pixel content, so they are deferred
    /// while a stroke is being drawn and applied at pointer-up.
    pub fn set_stroke_active(&mut self, active: bool) {
        self.stroke_active = active;
    }

    pub fn stroke_active(&self) -> bool {
        self.stroke_active
    }

    /// Once-per-frame reconciliation. Clears the flags it consumes.
    pub fn plan(&mut self, now: Instant, current_size: UVec2) -> FramePlan {
        // Geometry reconcile, deferred mid-stroke
        let mut resize = None;
        if !self.stroke_active
            && let Some(size) = self.pending_resize.take()
            && size != current_size
            && size.x > 0
            && size.y > 0
        {
            resize = Some(size);
            // The resize wiped both surfaces
            self.static_dirty = true;
            self.active_dirty = true;
        }

        // Quiet period elapsed: one forced, un-throttled exact repaint
        let settled = self.settle_due.is_some_and(|due| now >= due);
        if settled {
            self.settle_due = None;
            self.static_dirty = true;
            self.active_dirty = true;
        }

        // Throttle the finalized surface only while a gesture is in flight
        let in_burst = self.settle_due.is_some();
        let throttle_elapsed = self
            .last_static_paint
            .is_none_or(|last| now.duration_since(last) >= STATIC_REPAINT_INTERVAL);

        let repaint_static = self.static_dirty && (!in_burst || throttle_elapsed);
        if repaint_static {
            self.static_dirty = false;
            self.last_static_paint = Some(now);
        }

        let repaint_active = self.active_dirty;
        if repaint_active {
            self.active_dirty = false;
        }

        FramePlan {
            resize,
            repaint_static,
            repaint_active,
        }
    }
}

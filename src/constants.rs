//! Centralized constants used across the application.
//!
//! This module contains magic numbers and configuration values that are used
//! in multiple places or would benefit from being named constants.

use std::time::Duration;

/// Default window width in pixels
pub const DEFAULT_WINDOW_WIDTH: f32 = 1400.0;

/// Default window height in pixels
pub const DEFAULT_WINDOW_HEIGHT: f32 = 900.0;

/// Minimum interval between finalized-surface repaints while a camera
/// gesture is in flight (~30 repaints per second).
pub const STATIC_REPAINT_INTERVAL: Duration = Duration::from_millis(33);

/// How long the camera has to stay quiet before one final exact repaint
/// of both surfaces is forced.
pub const CAMERA_QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Maximum number of commit snapshots kept for undo
pub const MAX_HISTORY_SIZE: usize = 64;

/// Minimum cursor travel (canvas pixels) before a new point is appended
/// to an in-progress stroke. Keeps point counts manageable.
pub const MIN_POINT_SPACING: f32 = 2.0;

/// Screen-pixel proximity to the start vertex that closes a
/// freehand/polygon shape. Pointer-precision affordance, deliberately
/// not world-space.
pub const CLOSE_HINT_RADIUS: f32 = 12.0;

/// Default brush radius in screen pixels
pub const DEFAULT_BRUSH_RADIUS: f32 = 14.0;

/// Autosave after this long with no edits
pub const AUTOSAVE_IDLE: Duration = Duration::from_secs(2);

/// Periodic autosave backstop
pub const AUTOSAVE_PERIOD: Duration = Duration::from_secs(30);

/// Number of synthetic slices generated for the demo stack
pub const SLICE_COUNT: u32 = 16;

/// Edge length (pixels) of each synthetic slice image
pub const SLICE_EXTENT: u32 = 512;

/// World-space distance between adjacent slices
pub const SLICE_SPACING: f32 = 1.0;

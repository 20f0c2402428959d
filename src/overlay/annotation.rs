//! Annotation data model.
//!
//! Annotations live exclusively in world (patient) coordinates so they stay
//! valid across every camera transform; canvas positions are re-derived at
//! paint time and never cached. Fill kinds paint with source-over
//! compositing, erase kinds cut holes with destination-out, which makes the
//! replay order load-bearing: a slice's annotations must always be painted
//! in creation order.

use bevy::prelude::*;

/// Compositing operation an annotation paints with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    DestinationOut,
}

/// Closed set of annotation shapes. Adding a variant must force every
/// paint/combine match in the crate to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AnnotationKind {
    FreehandFill,
    PolygonFill,
    BrushStroke,
    EraserStroke,
    FreehandErase,
    PolygonErase,
}

impl AnnotationKind {
    pub fn is_erase(&self) -> bool {
        matches!(
            self,
            AnnotationKind::EraserStroke
                | AnnotationKind::FreehandErase
                | AnnotationKind::PolygonErase
        )
    }

    /// Stroke kinds are painted as stamped discs along the path and carry a
    /// world-space radius; closed kinds are filled outlines.
    pub fn is_stroke(&self) -> bool {
        matches!(self, AnnotationKind::BrushStroke | AnnotationKind::EraserStroke)
    }

    pub fn composite_op(&self) -> CompositeOp {
        if self.is_erase() {
            CompositeOp::DestinationOut
        } else {
            CompositeOp::SourceOver
        }
    }

    /// The erase-kind twin of a fill kind, used by subtract mode. Erase
    /// kinds map to themselves.
    pub fn erase_counterpart(&self) -> AnnotationKind {
        match self {
            AnnotationKind::FreehandFill => AnnotationKind::FreehandErase,
            AnnotationKind::PolygonFill => AnnotationKind::PolygonErase,
            AnnotationKind::BrushStroke => AnnotationKind::EraserStroke,
            AnnotationKind::EraserStroke => AnnotationKind::EraserStroke,
            AnnotationKind::FreehandErase => AnnotationKind::FreehandErase,
            AnnotationKind::PolygonErase => AnnotationKind::PolygonErase,
        }
    }

    /// Fewest points that make the kind paintable
    pub fn min_points(&self) -> usize {
        if self.is_stroke() { 1 } else { 3 }
    }
}

/// A finalized or in-progress vector shape in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: u64,
    pub kind: AnnotationKind,
    /// Ordered patient-space points
    pub points: Vec<Vec3>,
    /// World-space stroke radius; stroke kinds only
    pub radius: Option<f32>,
    /// Closed shapes are only filled once completed; in-progress shapes
    /// are previewed as open paths
    pub completed: bool,
}

impl Annotation {
    /// True when the shape has enough points to paint
    pub fn is_paintable(&self) -> bool {
        self.points.len() >= self.kind.min_points()
    }
}

/// How a freshly drawn shape combines with existing slice content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    Replace,
    #[default]
    Add,
    Subtract,
    Union,
    Intersect,
    Xor,
}

impl CombineMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            CombineMode::Replace => "Replace",
            CombineMode::Add => "Add",
            CombineMode::Subtract => "Subtract",
            CombineMode::Union => "Union",
            CombineMode::Intersect => "Intersect",
            CombineMode::Xor => "Xor",
        }
    }

    pub fn all() -> &'static [CombineMode] {
        &[
            CombineMode::Replace,
            CombineMode::Add,
            CombineMode::Subtract,
            CombineMode::Union,
            CombineMode::Intersect,
            CombineMode::Xor,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_kinds_use_destination_out() {
        assert_eq!(
            AnnotationKind::EraserStroke.composite_op(),
            CompositeOp::DestinationOut
        );
        assert_eq!(
            AnnotationKind::FreehandErase.composite_op(),
            CompositeOp::DestinationOut
        );
        assert_eq!(
            AnnotationKind::PolygonErase.composite_op(),
            CompositeOp::DestinationOut
        );
    }

    #[test]
    fn test_fill_kinds_use_source_over() {
        assert_eq!(
            AnnotationKind::FreehandFill.composite_op(),
            CompositeOp::SourceOver
        );
        assert_eq!(
            AnnotationKind::PolygonFill.composite_op(),
            CompositeOp::SourceOver
        );
        assert_eq!(
            AnnotationKind::BrushStroke.composite_op(),
            CompositeOp::SourceOver
        );
    }

    #[test]
    fn test_erase_counterpart_is_idempotent() {
        for kind in [
            AnnotationKind::FreehandFill,
            AnnotationKind::PolygonFill,
            AnnotationKind::BrushStroke,
            AnnotationKind::EraserStroke,
            AnnotationKind::FreehandErase,
            AnnotationKind::PolygonErase,
        ] {
            let erased = kind.erase_counterpart();
            assert!(erased.is_erase());
            assert_eq!(erased.erase_counterpart(), erased);
        }
    }

    #[test]
    fn test_min_points() {
        assert_eq!(AnnotationKind::BrushStroke.min_points(), 1);
        assert_eq!(AnnotationKind::EraserStroke.min_points(), 1);
        assert_eq!(AnnotationKind::FreehandFill.min_points(), 3);
        assert_eq!(AnnotationKind::PolygonErase.min_points(), 3);
    }
}

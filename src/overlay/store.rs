//! Annotation store: slice-keyed committed annotations, the single
//! in-progress stroke, and the undo history.
//!
//! Committed annotations are immutable and partitioned by slice index;
//! switching slices swaps the visible set atomically. The in-progress slot
//! is tagged with the slice it was started on and is discarded, never
//! migrated, if the active slice changes underneath it.
//!
//! History is one global bounded stack of commit points. Each snapshot is
//! the complete pre-commit annotation list of the slice that was active at
//! commit time; undo restores that list and pushes the displaced state onto
//! a redo stack, which any new commit truncates.

use bevy::prelude::*;
use std::collections::BTreeMap;

use crate::constants::MAX_HISTORY_SIZE;

use super::annotation::{Annotation, AnnotationKind, CombineMode};

/// One commit point: the full annotation list a slice held before the edit
#[derive(Debug, Clone)]
pub struct SliceSnapshot {
    pub slice: u32,
    pub annotations: Vec<Annotation>,
}

/// The stroke currently under construction
#[derive(Debug, Clone)]
pub struct InProgress {
    pub slice: u32,
    pub annotation: Annotation,
}

#[derive(Resource, Default)]
pub struct AnnotationStore {
    slices: BTreeMap<u32, Vec<Annotation>>,
    in_progress: Option<InProgress>,
    undo_stack: Vec<SliceSnapshot>,
    redo_stack: Vec<SliceSnapshot>,
    next_id: u64,
    intersect_warned: bool,
}

impl AnnotationStore {
    /// Committed annotations for a slice, in creation order
    pub fn slice_annotations(&self, slice: u32) -> &[Annotation] {
        self.slices.get(&slice).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_progress(&self) -> Option<&InProgress> {
        self.in_progress.as_ref()
    }

    /// Slice indices that currently hold at least one committed
    /// annotation, ascending.
    pub fn occupied_slices(&self) -> impl Iterator<Item = u32> + '_ {
        self.slices
            .iter()
            .filter(|(_, annotations)| !annotations.is_empty())
            .map(|(slice, _)| *slice)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Records a commit point for `slice` and truncates the redo stack.
    fn snapshot(&mut self, slice: u32) {
        self.redo_stack.clear();
        self.undo_stack.push(SliceSnapshot {
            slice,
            annotations: self.slice_annotations(slice).to_vec(),
        });
        while self.undo_stack.len() > MAX_HISTORY_SIZE {
            self.undo_stack.remove(0);
        }
    }

    /// Pushes a committed annotation onto a slice as a new commit point.
    pub fn append_annotation(&mut self, slice: u32, mut annotation: Annotation) {
        if !annotation.is_paintable() {
            return;
        }
        if annotation.id == 0 {
            annotation.id = self.allocate_id();
        }
        self.snapshot(slice);
        self.slices.entry(slice).or_default().push(annotation);
    }

    /// Combines a freshly drawn shape with the slice's existing content.
    ///
    /// Replace clears the slice first. Subtract reinterprets the shape as
    /// its erase-kind counterpart rather than performing raster boolean
    /// subtraction. Intersect/Xor degrade to Add; true raster boolean
    /// combination is not implemented.
    pub fn apply_with_mode(&mut self, slice: u32, mut annotation: Annotation, mode: CombineMode) {
        if !annotation.is_paintable() {
            return;
        }
        if annotation.id == 0 {
            annotation.id = self.allocate_id();
        }
        self.snapshot(slice);
        match mode {
            CombineMode::Replace => {
                let entries = self.slices.entry(slice).or_default();
                entries.clear();
                entries.push(annotation);
            }
            CombineMode::Add | CombineMode::Union => {
                self.slices.entry(slice).or_default().push(annotation);
            }
            CombineMode::Subtract => {
                annotation.kind = annotation.kind.erase_counterpart();
                self.slices.entry(slice).or_default().push(annotation);
            }
            CombineMode::Intersect | CombineMode::Xor => {
                if !self.intersect_warned {
                    warn!("intersect/xor combine modes degrade to add");
                    self.intersect_warned = true;
                }
                self.slices.entry(slice).or_default().push(annotation);
            }
        }
    }

    /// Starts the in-progress stroke, replacing any previous one.
    pub fn begin_stroke(&mut self, slice: u32, kind: AnnotationKind, first: Vec3, radius: Option<f32>) {
        let id = self.allocate_id();
        self.in_progress = Some(InProgress {
            slice,
            annotation: Annotation {
                id,
                kind,
                points: vec![first],
                radius,
                completed: false,
            },
        });
    }

    /// Appends a point to the in-progress stroke; no-op when nothing is in
    /// progress.
    pub fn extend_stroke(&mut self, point: Vec3) {
        if let Some(in_progress) = self.in_progress.as_mut() {
            in_progress.annotation.points.push(point);
        }
    }

    /// Commits the in-progress stroke under `mode`. Idempotent-safe: a
    /// commit with nothing in progress (or with too few points to paint)
    /// is a no-op. Returns true when an annotation was actually stored.
    pub fn commit_stroke(&mut self, mode: CombineMode) -> bool {
        let Some(in_progress) = self.in_progress.take() else {
            return false;
        };
        let mut annotation = in_progress.annotation;
        if !annotation.is_paintable() {
            return false;
        }
        annotation.completed = true;
        self.apply_with_mode(in_progress.slice, annotation, mode);
        true
    }

    pub fn discard_stroke(&mut self) {
        self.in_progress = None;
    }

    /// Drops the in-progress stroke if it was started on a different
    /// slice. Called on every slice change: a partial stroke must never be
    /// silently committed to (or previewed on) the wrong slice.
    pub fn discard_stroke_not_on(&mut self, slice: u32) {
        if self.in_progress.as_ref().is_some_and(|p| p.slice != slice) {
            self.in_progress = None;
        }
    }

    /// Steps back one commit point. No-op at the bottom of history.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        self.redo_stack.push(SliceSnapshot {
            slice: snapshot.slice,
            annotations: self.slice_annotations(snapshot.slice).to_vec(),
        });
        self.slices.insert(snapshot.slice, snapshot.annotations);
        true
    }

    /// Re-applies the most recently undone commit point.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push(SliceSnapshot {
            slice: snapshot.slice,
            annotations: self.slice_annotations(snapshot.slice).to_vec(),
        });
        self.slices.insert(snapshot.slice, snapshot.annotations);
        true
    }

    /// Wipes every slice's annotations and the entire history.
    pub fn clear_all(&mut self) {
        self.slices.clear();
        self.in_progress = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Replaces a slice's annotation list wholesale (import path).
    /// Recorded as a single commit point.
    pub fn set_annotations(&mut self, slice: u32, annotations: Vec<Annotation>) {
        self.snapshot(slice);
        let mut stored: Vec<Annotation> = annotations
            .into_iter()
            .filter(Annotation::is_paintable)
            .collect();
        for annotation in &mut stored {
            if annotation.id == 0 {
                self.next_id += 1;
                annotation.id = self.next_id;
            } else {
                self.next_id = self.next_id.max(annotation.id);
            }
        }
        self.slices.insert(slice, stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush(points: &[(f32, f32, f32)], radius: f32) -> Annotation {
        Annotation {
            id: 0,
            kind: AnnotationKind::BrushStroke,
            points: points.iter().map(|&(x, y, z)| Vec3::new(x, y, z)).collect(),
            radius: Some(radius),
            completed: true,
        }
    }

    fn freehand(points: &[(f32, f32, f32)]) -> Annotation {
        Annotation {
            id: 0,
            kind: AnnotationKind::FreehandFill,
            points: points.iter().map(|&(x, y, z)| Vec3::new(x, y, z)).collect(),
            radius: None,
            completed: true,
        }
    }

    #[test]
    fn test_simple_stroke_round_trip() {
        let mut store = AnnotationStore::default();
        store.begin_stroke(
            0,
            AnnotationKind::BrushStroke,
            Vec3::new(0.0, 0.0, 0.0),
            Some(5.0),
        );
        store.extend_stroke(Vec3::new(10.0, 0.0, 0.0));
        assert!(store.commit_stroke(CombineMode::Add));

        let annotations = store.slice_annotations(0);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].kind, AnnotationKind::BrushStroke);
        assert_eq!(
            annotations[0].points,
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)]
        );
        assert_eq!(annotations[0].radius, Some(5.0));
        assert!(annotations[0].completed);
    }

    #[test]
    fn test_commit_with_nothing_in_progress_is_noop() {
        let mut store = AnnotationStore::default();
        assert!(!store.commit_stroke(CombineMode::Add));
        assert!(store.slice_annotations(0).is_empty());
        assert!(!store.can_undo());
    }

    #[test]
    fn test_closed_shape_below_min_points_is_dropped() {
        let mut store = AnnotationStore::default();
        store.begin_stroke(0, AnnotationKind::FreehandFill, Vec3::ZERO, None);
        store.extend_stroke(Vec3::new(1.0, 0.0, 0.0));
        assert!(!store.commit_stroke(CombineMode::Add));
        assert!(store.slice_annotations(0).is_empty());
    }

    #[test]
    fn test_slice_isolation() {
        let mut store = AnnotationStore::default();
        store.append_annotation(3, brush(&[(0.0, 0.0, 3.0)], 2.0));
        store.append_annotation(7, brush(&[(1.0, 1.0, 7.0)], 2.0));

        assert_eq!(store.slice_annotations(3).len(), 1);
        assert_eq!(store.slice_annotations(7).len(), 1);
        assert!(store.slice_annotations(4).is_empty());
        assert_eq!(store.slice_annotations(3)[0].points[0].z, 3.0);
    }

    #[test]
    fn test_in_progress_discarded_on_slice_change() {
        let mut store = AnnotationStore::default();
        store.begin_stroke(2, AnnotationKind::BrushStroke, Vec3::ZERO, Some(1.0));
        store.extend_stroke(Vec3::new(1.0, 0.0, 0.0));

        store.discard_stroke_not_on(5);
        assert!(store.in_progress().is_none());
        // The partial stroke must not have been committed anywhere
        assert!(store.slice_annotations(2).is_empty());
        assert!(store.slice_annotations(5).is_empty());
    }

    #[test]
    fn test_in_progress_kept_on_same_slice() {
        let mut store = AnnotationStore::default();
        store.begin_stroke(2, AnnotationKind::BrushStroke, Vec3::ZERO, Some(1.0));
        store.discard_stroke_not_on(2);
        assert!(store.in_progress().is_some());
    }

    #[test]
    fn test_replace_mode() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(0.0, 0.0, 0.0)], 1.0));
        store.append_annotation(0, brush(&[(1.0, 0.0, 0.0)], 1.0));
        assert_eq!(store.slice_annotations(0).len(), 2);

        let replacement = brush(&[(5.0, 5.0, 0.0)], 1.0);
        store.apply_with_mode(0, replacement.clone(), CombineMode::Replace);

        let annotations = store.slice_annotations(0);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].points, replacement.points);
    }

    #[test]
    fn test_subtract_mode_reinterprets_kind() {
        let mut store = AnnotationStore::default();
        let shape = freehand(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (10.0, 10.0, 0.0)]);
        let points = shape.points.clone();
        store.apply_with_mode(0, shape, CombineMode::Subtract);

        let annotations = store.slice_annotations(0);
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].kind, AnnotationKind::FreehandErase);
        assert_eq!(annotations[0].points, points);
    }

    #[test]
    fn test_intersect_and_xor_degrade_to_add() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(0.0, 0.0, 0.0)], 1.0));
        store.apply_with_mode(0, brush(&[(1.0, 0.0, 0.0)], 1.0), CombineMode::Intersect);
        store.apply_with_mode(0, brush(&[(2.0, 0.0, 0.0)], 1.0), CombineMode::Xor);

        let annotations = store.slice_annotations(0);
        assert_eq!(annotations.len(), 3);
        assert!(annotations.iter().all(|a| a.kind == AnnotationKind::BrushStroke));
    }

    #[test]
    fn test_creation_order_preserved() {
        let mut store = AnnotationStore::default();
        for i in 0..5 {
            store.append_annotation(0, brush(&[(i as f32, 0.0, 0.0)], 1.0));
        }
        let xs: Vec<f32> = store
            .slice_annotations(0)
            .iter()
            .map(|a| a.points[0].x)
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_undo_monotonicity() {
        let mut store = AnnotationStore::default();
        let initial = store.slice_annotations(0).to_vec();

        for i in 0..4 {
            store.append_annotation(0, brush(&[(i as f32, 0.0, 0.0)], 1.0));
        }
        assert_eq!(store.slice_annotations(0).len(), 4);

        for _ in 0..4 {
            assert!(store.undo());
        }
        assert_eq!(store.slice_annotations(0).to_vec(), initial);
        // Bottom of history is a no-op
        assert!(!store.undo());
    }

    #[test]
    fn test_redo_restores_undone_commit() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(1.0, 0.0, 0.0)], 1.0));
        store.undo();
        assert!(store.slice_annotations(0).is_empty());

        assert!(store.redo());
        assert_eq!(store.slice_annotations(0).len(), 1);
    }

    #[test]
    fn test_commit_after_undo_truncates_redo() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(1.0, 0.0, 0.0)], 1.0));
        store.append_annotation(0, brush(&[(2.0, 0.0, 0.0)], 1.0));
        store.undo();
        assert!(store.can_redo());

        store.append_annotation(0, brush(&[(3.0, 0.0, 0.0)], 1.0));
        assert!(!store.can_redo());

        let xs: Vec<f32> = store
            .slice_annotations(0)
            .iter()
            .map(|a| a.points[0].x)
            .collect();
        assert_eq!(xs, vec![1.0, 3.0]);
    }

    #[test]
    fn test_history_spans_slices() {
        let mut store = AnnotationStore::default();
        store.append_annotation(1, brush(&[(1.0, 0.0, 1.0)], 1.0));
        store.append_annotation(2, brush(&[(2.0, 0.0, 2.0)], 1.0));

        // Undo affects the slice of the most recent commit, not the
        // current one
        store.undo();
        assert_eq!(store.slice_annotations(1).len(), 1);
        assert!(store.slice_annotations(2).is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = AnnotationStore::default();
        for i in 0..(MAX_HISTORY_SIZE + 20) {
            store.append_annotation(0, brush(&[(i as f32, 0.0, 0.0)], 1.0));
        }
        let mut undone = 0;
        while store.undo() {
            undone += 1;
        }
        assert_eq!(undone, MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_clear_all() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(0.0, 0.0, 0.0)], 1.0));
        store.append_annotation(5, brush(&[(1.0, 0.0, 5.0)], 1.0));
        store.begin_stroke(0, AnnotationKind::BrushStroke, Vec3::ZERO, Some(1.0));

        store.clear_all();
        assert!(store.slice_annotations(0).is_empty());
        assert!(store.slice_annotations(5).is_empty());
        assert!(store.in_progress().is_none());
        assert!(!store.can_undo());
        assert!(!store.can_redo());
    }

    #[test]
    fn test_set_annotations_round_trip() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)], 5.0));
        store.apply_with_mode(
            0,
            freehand(&[(0.0, 0.0, 0.0), (4.0, 0.0, 0.0), (4.0, 4.0, 0.0)]),
            CombineMode::Subtract,
        );

        let exported = store.slice_annotations(0).to_vec();
        let mut imported = AnnotationStore::default();
        imported.set_annotations(0, exported.clone());

        // Order, kinds (hence compositing modes), geometry all preserved
        assert_eq!(imported.slice_annotations(0), exported.as_slice());
    }

    #[test]
    fn test_set_annotations_is_undoable() {
        let mut store = AnnotationStore::default();
        store.append_annotation(0, brush(&[(1.0, 0.0, 0.0)], 1.0));
        store.set_annotations(0, vec![brush(&[(9.0, 0.0, 0.0)], 1.0)]);
        assert_eq!(store.slice_annotations(0)[0].points[0].x, 9.0);

        store.undo();
        assert_eq!(store.slice_annotations(0)[0].points[0].x, 1.0);
    }

    #[test]
    fn test_occupied_slices_skip_emptied_entries() {
        let mut store = AnnotationStore::default();
        store.append_annotation(2, brush(&[(0.0, 0.0, 2.0)], 1.0));
        store.append_annotation(9, brush(&[(0.0, 0.0, 9.0)], 1.0));
        assert_eq!(store.occupied_slices().collect::<Vec<_>>(), vec![2, 9]);

        // Undoing the slice-9 commit leaves its map entry empty
        store.undo();
        assert_eq!(store.occupied_slices().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = AnnotationStore::default();
        for i in 0..10 {
            store.append_annotation(0, brush(&[(i as f32, 0.0, 0.0)], 1.0));
        }
        let mut ids: Vec<u64> = store.slice_annotations(0).iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}

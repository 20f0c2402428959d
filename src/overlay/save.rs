//! Autosave pipeline and the serialized annotation document.
//!
//! Saves are serialized off the main thread through the IO task pool. The
//! flag protocol guarantees at-most-one save in flight and that edits
//! arriving mid-save are not lost: a dirty mark while `in_flight` queues
//! exactly one follow-up save. Saves never start while a stroke is being
//! drawn; the in-progress annotation is not part of the document.

use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task};
use futures_lite::future;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::constants::{AUTOSAVE_IDLE, AUTOSAVE_PERIOD};

use super::annotation::{Annotation, AnnotationKind};
use super::scheduler::SyncScheduler;
use super::store::AnnotationStore;

/// Serialized form of one annotation. Points are plain arrays so the
/// document format is independent of the math types.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct SavedAnnotation {
    pub id: u64,
    pub kind: AnnotationKind,
    pub points: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl From<&Annotation> for SavedAnnotation {
    fn from(annotation: &Annotation) -> Self {
        Self {
            id: annotation.id,
            kind: annotation.kind,
            points: annotation.points.iter().map(|p| [p.x, p.y, p.z]).collect(),
            radius: annotation.radius,
        }
    }
}

impl From<SavedAnnotation> for Annotation {
    fn from(saved: SavedAnnotation) -> Self {
        Self {
            id: saved.id,
            kind: saved.kind,
            points: saved
                .points
                .into_iter()
                .map(|[x, y, z]| Vec3::new(x, y, z))
                .collect(),
            radius: saved.radius,
            completed: true,
        }
    }
}

/// On-disk document: every slice's finalized annotations.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Default)]
pub struct AnnotationDocument {
    pub version: u32,
    pub saved_at: String,
    pub slices: Vec<SliceAnnotations>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct SliceAnnotations {
    pub slice_index: u32,
    pub annotations: Vec<SavedAnnotation>,
}

pub const DOCUMENT_VERSION: u32 = 1;

impl AnnotationDocument {
    pub fn from_store(store: &AnnotationStore) -> Self {
        // Walk the store's own keys; the document must carry every slice
        // that holds annotations, not just the ones the viewer displays
        let slices = store
            .occupied_slices()
            .map(|slice| SliceAnnotations {
                slice_index: slice,
                annotations: store
                    .slice_annotations(slice)
                    .iter()
                    .map(SavedAnnotation::from)
                    .collect(),
            })
            .collect();
        Self {
            version: DOCUMENT_VERSION,
            saved_at: chrono::Local::now().to_rfc3339(),
            slices,
        }
    }

    /// Loads the document into the store as one undoable step per slice.
    pub fn apply_to_store(self, store: &mut AnnotationStore) {
        for slice in self.slices {
            let annotations = slice
                .annotations
                .into_iter()
                .map(Annotation::from)
                .collect();
            store.set_annotations(slice.slice_index, annotations);
        }
    }
}

/// Save trigger state. Pure flag logic so the protocol is testable without
/// a running app or filesystem.
#[derive(Resource)]
pub struct SaveState {
    dirty: bool,
    request_now: bool,
    in_flight: bool,
    queued: bool,
    last_edit: Option<Instant>,
    last_save: Option<Instant>,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            dirty: false,
            request_now: false,
            in_flight: false,
            queued: false,
            last_edit: None,
            last_save: None,
        }
    }
}

impl SaveState {
    /// An edit happened (undo, redo, import); schedules an idle-triggered
    /// save.
    pub fn note_edit(&mut self, now: Instant) {
        self.dirty = true;
        self.last_edit = Some(now);
        if self.in_flight {
            self.queued = true;
        }
    }

    /// A stroke committed. Commits request an immediate save rather than
    /// waiting out the idle period; the stroke-active and in-flight
    /// guards in [`begin_save`](Self::begin_save) still apply.
    pub fn note_commit(&mut self, now: Instant) {
        self.note_edit(now);
        self.request_now = true;
    }

    /// Host-initiated immediate save, still subject to the stroke guard.
    pub fn request_save(&mut self) {
        self.dirty = true;
        self.request_now = true;
        if self.in_flight {
            self.queued = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Decides whether a save should start this frame. When it returns
    /// true the caller must spawn the save task and later report
    /// [`finish_save`](Self::finish_save).
    pub fn begin_save(&mut self, now: Instant, stroke_active: bool) -> bool {
        if !self.dirty || self.in_flight || stroke_active {
            return false;
        }

        let due = self.request_now
            || self
                .last_edit
                .is_some_and(|edit| now.duration_since(edit) >= AUTOSAVE_IDLE)
            || self
                .last_save
                .is_some_and(|save| now.duration_since(save) >= AUTOSAVE_PERIOD);

        if !due {
            return false;
        }

        self.dirty = false;
        self.request_now = false;
        self.in_flight = true;
        self.last_save = Some(now);
        true
    }

    /// Save task finished. A failed save re-marks dirty so the content is
    /// retried; a queued follow-up runs exactly once.
    pub fn finish_save(&mut self, success: bool) {
        self.in_flight = false;
        if !success {
            self.dirty = true;
        }
        if self.queued {
            self.queued = false;
            self.dirty = true;
            self.request_now = true;
        }
    }
}

/// In-flight save task; the entity is despawned when it resolves.
#[derive(Component)]
pub struct SaveTask(pub Task<Result<PathBuf, String>>);

pub fn autosave_path() -> Option<PathBuf> {
    Some(dirs::data_dir()?.join("slicemark").join("autosave.json"))
}

fn write_document(document: &AnnotationDocument, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let json = serde_json::to_string_pretty(document).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| e.to_string())
}

/// Spawns a background save when the trigger state says one is due.
pub fn autosave_system(
    mut commands: Commands,
    mut save: ResMut<SaveState>,
    scheduler: Res<SyncScheduler>,
    store: Res<AnnotationStore>,
) {
    if !save.begin_save(Instant::now(), scheduler.stroke_active()) {
        return;
    }
    let Some(path) = autosave_path() else {
        warn!("no data directory available, autosave disabled");
        save.finish_save(false);
        return;
    };

    let document = AnnotationDocument::from_store(&store);
    let task = IoTaskPool::get().spawn(async move {
        write_document(&document, &path)?;
        Ok(path)
    });
    commands.spawn(SaveTask(task));
}

/// Polls in-flight save tasks and reports their outcome back to the
/// trigger state.
pub fn poll_save_tasks(
    mut commands: Commands,
    mut save: ResMut<SaveState>,
    mut tasks: Query<(Entity, &mut SaveTask)>,
) {
    for (entity, mut task) in &mut tasks {
        let Some(result) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        match result {
            Ok(path) => {
                debug!("autosaved annotations to {}", path.display());
                save.finish_save(true);
            }
            Err(err) => {
                error!("autosave failed: {err}");
                save.finish_save(false);
            }
        }
        commands.entity(entity).despawn();
    }
}

/// Restores a previous session's autosave document if one exists.
pub fn load_autosave(store: &mut AnnotationStore) -> bool {
    let Some(path) = autosave_path() else {
        return false;
    };
    let Ok(json) = fs::read_to_string(&path) else {
        return false;
    };
    match serde_json::from_str::<AnnotationDocument>(&json) {
        Ok(document) => {
            let slices = document.slices.len();
            document.apply_to_store(store);
            info!("restored autosave: {slices} slices from {}", path.display());
            true
        }
        Err(err) => {
            warn!("ignoring unreadable autosave at {}: {err}", path.display());
            false
        }
    }
}

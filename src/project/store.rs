//! Per-project state slots and their files.
//!
//! Every project has one slot holding its most recently completed state. A
//! build takes the slot's write lock for its own project and read locks on
//! the slots of its dependencies; a finished build publishes a whole new
//! `Arc<ProjectState>`, so readers never see a half-built state.
//!
//! With a state directory configured, each published state is written to
//! `<dir>/<project>.state` through a temp file in the same directory that is
//! renamed over the old file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};
use rustc_hash::FxHashMap;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::state::ProjectState;
use super::state_io::{StateError, read_state, write_state};
use crate::base::ProjectId;
use crate::base::constants::STATE_FILE_EXTENSION;

/// Contents of one project slot.
#[derive(Debug, Default)]
pub struct Slot {
    loaded: bool,
    state: Option<Arc<ProjectState>>,
}

impl Slot {
    pub fn state(&self) -> Option<&Arc<ProjectState>> {
        self.state.as_ref()
    }
}

type SharedSlot = Arc<RwLock<Slot>>;

/// Exclusive access to one project's state for the duration of its build.
pub struct ProjectLock {
    project: ProjectId,
    guard: ArcRwLockWriteGuard<RawRwLock, Slot>,
}

impl ProjectLock {
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// The last completed state, if any.
    pub fn current(&self) -> Option<&Arc<ProjectState>> {
        self.guard.state.as_ref()
    }

    /// Replace the slot's state. Readers that already hold the old `Arc`
    /// keep seeing it.
    pub fn publish(&mut self, state: Arc<ProjectState>) {
        self.guard.state = Some(state);
    }

    /// Drop the in-memory state.
    pub fn clear(&mut self) {
        self.guard.state = None;
    }
}

/// Shared access to a dependency's state while a dependent builds.
pub struct DependencyLock {
    project: ProjectId,
    guard: ArcRwLockReadGuard<RawRwLock, Slot>,
}

impl DependencyLock {
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn state(&self) -> Option<&Arc<ProjectState>> {
        self.guard.state.as_ref()
    }
}

/// Owner of every project's state slot.
#[derive(Debug, Default)]
pub struct StateStore {
    state_dir: Option<PathBuf>,
    slots: Mutex<FxHashMap<ProjectId, SharedSlot>>,
}

impl StateStore {
    /// Store that keeps states in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisting one file per project under `state_dir`.
    pub fn new(state_dir: Option<PathBuf>) -> Self {
        Self {
            state_dir,
            slots: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_deref()
    }

    /// Path of a project's state file.
    pub fn state_file(&self, project: &ProjectId) -> Option<PathBuf> {
        self.state_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", project.as_str(), STATE_FILE_EXTENSION)))
    }

    fn slot(&self, project: &ProjectId) -> SharedSlot {
        self.slots.lock().entry(project.clone()).or_default().clone()
    }

    /// Lock a project's slot for writing, loading its persisted state on
    /// first use.
    pub fn acquire_project_lock(&self, project: &ProjectId) -> ProjectLock {
        let mut guard = self.slot(project).write_arc();
        self.load_into(project, &mut guard);
        ProjectLock {
            project: project.clone(),
            guard,
        }
    }

    /// Lock a dependency's slot for reading.
    pub fn acquire_dependency_lock(&self, project: &ProjectId) -> DependencyLock {
        let slot = self.slot(project);
        if !slot.read().loaded {
            let mut guard = slot.write();
            self.load_into(project, &mut guard);
        }
        DependencyLock {
            project: project.clone(),
            guard: slot.read_arc(),
        }
    }

    /// Snapshot of a project's last completed state.
    pub fn get(&self, project: &ProjectId) -> Option<Arc<ProjectState>> {
        self.acquire_dependency_lock(project).state().cloned()
    }

    fn load_into(&self, project: &ProjectId, slot: &mut Slot) {
        if slot.loaded {
            return;
        }
        slot.loaded = true;
        slot.state = self.load(project).map(Arc::new);
    }

    /// Read a project's state file. Missing, unreadable, corrupt, foreign
    /// or outdated files all yield `None`.
    pub fn load(&self, project: &ProjectId) -> Option<ProjectState> {
        match self.read_from_disk(project) {
            Ok(state) => state,
            Err(err) => {
                warn!("[STATE] discarding saved state of {}: {}", project, err);
                None
            }
        }
    }

    /// Read a project's state file, reporting why it could not be used.
    pub fn read_from_disk(&self, project: &ProjectId) -> Result<Option<ProjectState>, StateError> {
        let Some(path) = self.state_file(project) else {
            return Ok(None);
        };
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StateError::io(path, err)),
        };
        let state = read_state(&bytes, Some(project))?;
        debug!(
            "[STATE] loaded {} (build {}, {} types)",
            project,
            state.build_number,
            state.reference_table.len()
        );
        Ok(Some(state))
    }

    /// Write a state to its file, replacing the old one atomically.
    pub fn persist(&self, state: &ProjectState) -> Result<(), StateError> {
        let Some(path) = self.state_file(&state.project_name) else {
            return Ok(());
        };
        let bytes = write_state(state)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|err| StateError::io(dir, err))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|err| StateError::io(dir, err))?;
        file.write_all(&bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|err| StateError::io(file.path(), err))?;
        file.persist(&path)
            .map_err(|err| StateError::io(&path, err.error))?;
        debug!("[STATE] saved {} ({} bytes)", state.project_name, bytes.len());
        Ok(())
    }

    /// Forget a deleted project: its slot and its file.
    pub fn discard(&self, project: &ProjectId) -> Result<(), StateError> {
        let mut lock = self.acquire_project_lock(project);
        lock.clear();
        if let Some(path) = self.state_file(project) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("[STATE] removed {}", path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StateError::io(path, err)),
            }
        }
        Ok(())
    }
}

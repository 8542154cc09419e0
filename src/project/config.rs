//! Build configuration

use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::base::constants::{DEFAULT_MAX_COMPILE_LOOPS, DEFAULT_MAX_STRUCTURALLY_CHANGED_TYPES};

/// Tunables for a [`BuildWorkspace`](super::BuildWorkspace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Project builds allowed to run at once (0 = available parallelism)
    pub max_parallel_builds: usize,
    /// Incremental compile loops before falling back to a full build
    pub max_compile_loops: usize,
    /// Structurally changed types remembered per build before the state
    /// reports "everything may have changed"
    pub max_structurally_changed_types: usize,
    /// Directory holding one `<project>.state` file per project; `None` keeps
    /// state in memory only
    pub state_dir: Option<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_parallel_builds: 0,
            max_compile_loops: DEFAULT_MAX_COMPILE_LOOPS,
            max_structurally_changed_types: DEFAULT_MAX_STRUCTURALLY_CHANGED_TYPES,
            state_dir: None,
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_parallel_builds(mut self, builds: usize) -> Self {
        self.max_parallel_builds = builds;
        self
    }

    pub fn with_max_compile_loops(mut self, loops: usize) -> Self {
        self.max_compile_loops = loops;
        self
    }

    pub fn with_max_structurally_changed_types(mut self, max: usize) -> Self {
        self.max_structurally_changed_types = max;
        self
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Worker count actually used by the scheduler.
    pub fn effective_parallel_builds(&self) -> usize {
        if self.max_parallel_builds == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            self.max_parallel_builds
        }
    }
}

//! # Project Builds
//!
//! Per-project build state, its on-disk format, and the machinery that
//! rebuilds projects in dependency order.
//!
//! ## Module Structure
//!
//! ```text
//! project/
//! ├── config      # BuildConfig
//! ├── location    # Source folders and classpath entries
//! ├── state       # ProjectState: the result of one build
//! ├── state_io    # Binary state format
//! ├── store       # Per-project slots, locks and state files
//! ├── job         # ProjectDescriptor, BuildJob, FileChange
//! ├── builder     # Full and incremental builds of one project
//! ├── graph       # Project dependency DAG
//! ├── scheduler   # BuildPlan and parallel workers
//! └── workspace   # BuildWorkspace: everything above, wired together
//! ```

pub mod builder;
pub mod config;
pub mod graph;
pub mod job;
pub mod location;
pub mod scheduler;
pub mod state;
pub mod state_io;
pub mod store;
pub mod workspace;

pub use builder::{
    BuildError, BuildOutcome, BuildResult, CompileError, CompileRequest, CompiledUnit, Compiler,
    DependencyState, ProjectBuilder, SourceUnit,
};
pub use config::BuildConfig;
pub use graph::ProjectGraph;
pub use job::{BuildJob, BuildKind, ChangeKind, FileChange, ProjectDescriptor};
pub use location::{ClasspathLocation, SourceLocation};
pub use scheduler::{BuildPlan, BuildScheduler, JobOutcome, SchedulerError};
pub use state::ProjectState;
pub use state_io::{StateError, read_state, write_state};
pub use store::{DependencyLock, ProjectLock, StateStore};
pub use workspace::BuildWorkspace;

//! # buildstate
//!
//! Dependency tracking and state persistence for incremental builds.
//!
//! Each build of a project records, per compiled type, which names it
//! references and where it is defined. The next build uses those facts to
//! recompile only the types a change can affect, and dependent projects use
//! the recorded structural build times to decide whether they need to look
//! at a dependency's changes at all.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project   → ProjectState, state files, builder, scheduler, workspace
//!   ↓
//! semantic  → Reference facts, type locators, affected-set resolver, problems
//!   ↓
//! core      → String table and binary codec for state files
//!   ↓
//! base      → Names (TypeName, Locator, ProjectId), constants
//! ```

// ============================================================================
// MODULES (dependency order: base → core → semantic → project)
// ============================================================================

/// Foundation types: names, releases, constants
pub mod base;

/// String interning and the binary state codec
pub mod core;

/// Reference facts and affected-set resolution
pub mod semantic;

/// Project states, builds and scheduling
pub mod project;

// Re-export foundation types
pub use base::{Locator, ProjectId, QualifiedName, Release, TypeName};

// Re-export the main entry points
pub use project::{
    BuildConfig, BuildError, BuildJob, BuildKind, BuildResult, BuildWorkspace, Compiler, FileChange,
    ProjectDescriptor, ProjectState, SchedulerError, StateError, StateStore,
};
pub use semantic::{AffectedSetResolver, Problem, ReferenceCollection, ResolverError, Severity};

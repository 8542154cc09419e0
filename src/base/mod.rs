//! Foundation types for the build-state engine.
//!
//! This module provides the fundamental types used throughout the crate:
//! - [`TypeName`] - Slash-normalized qualified type names (`p1/p2/A`)
//! - [`Identifier`], [`QualifiedName`] - Name segments and dotted sequences
//! - [`Locator`] - Project-relative path of the unit that defines a type
//! - [`Release`] - Release number for multi-release layouts
//! - [`ProjectId`] - Name of a project in the workspace
//! - Tunable constants (format version, loop limits)
//! - [`FxIndexMap`], [`FxIndexSet`] - Ordered collections for persisted tables
//!
//! This module has NO dependencies on other buildstate modules.

pub mod constants;
mod names;

pub use names::{Identifier, Locator, ProjectId, QualifiedName, Release, TypeName};

// Re-export text-size types for convenience
pub use text_size::{TextRange, TextSize};

/// Insertion-ordered map with the Fx hasher, used for persisted tables whose
/// on-disk order must survive a round trip.
pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;

/// Insertion-ordered set with the Fx hasher.
pub type FxIndexSet<T> = indexmap::IndexSet<T, rustc_hash::FxBuildHasher>;

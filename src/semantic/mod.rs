//! # Dependency Analysis
//!
//! Reference facts, type locators and the affected-set resolver that turns
//! a set of changed types into the next batch of types to recompile.
//!
//! ## Module Structure
//!
//! ```text
//! semantic/
//! ├── references      # ReferenceCollection, per-release TypeReferences, ChangedNames
//! ├── type_locators   # TypeName → Locator maps, package index
//! ├── problems        # Problem diagnostics, categories, collector
//! └── resolver        # AffectedSetResolver (seed / propagate / closure)
//! ```

pub mod problems;
pub mod references;
pub mod resolver;
pub mod type_locators;

pub use problems::{Problem, ProblemCollector, Severity, categories};
pub use references::{ChangedNames, ReferenceCollection, ReferenceTable, TypeReferences};
pub use resolver::{AffectedSetResolver, ResolverError};
pub use type_locators::TypeLocators;

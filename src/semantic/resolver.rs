//! Affected-set resolver.
//!
//! Given the names that changed in a build, finds every compiled type whose
//! reference facts mention one of them. The resolver is a small state
//! machine:
//!
//! ```text
//! Seed ──propagate──► Propagate ──(empty batch)──► Terminal
//!                      ▲     │
//!                      └─────┘ report_structural_change
//! ```
//!
//! Each [`AffectedSetResolver::propagate`] call scans the reference table
//! once, in parallel, and returns the types that match the frontier. Types
//! compiled or handed out since the last [`AffectedSetResolver::begin_loop`]
//! are skipped; a type compiled in an earlier loop is handed back when
//! something it references changes shape later.
//!
//! The affected set only grows, and every step that grows it adds at least
//! one table entry, so at most `|reference_table|` growing steps exist; a
//! step that would exceed the bound fails with
//! [`ResolverError::FixpointNotReached`].

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::problems::{Problem, ProblemCollector};
use super::references::{ChangedNames, ReferenceTable};
use super::type_locators::TypeLocators;
use crate::base::{FxIndexSet, Locator, QualifiedName, Release, TypeName};

/// Errors that abort an affected-set computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("affected set did not converge after {steps} steps over {table_len} types")]
    FixpointNotReached { steps: usize, table_len: usize },

    #[error("affected set computation was cancelled")]
    Cancelled,
}

/// Computes the set of types affected by a change.
#[derive(Debug, Default)]
pub struct AffectedSetResolver {
    frontier: ChangedNames,
    affected: FxIndexSet<TypeName>,
    /// Compiled or handed out since the current compile loop began
    handled: FxHashSet<TypeName>,
    /// Propagation steps that grew the affected set
    steps: usize,
    largest_table: usize,
    problems: ProblemCollector,
}

impl AffectedSetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a type whose public shape changed.
    pub fn seed_changed(&mut self, name: &TypeName) {
        self.frontier.add_dependents_of(name, true);
    }

    /// Seed a type that no longer exists. Its dependents are always
    /// reconsidered.
    pub fn seed_deleted(&mut self, name: &TypeName) {
        trace!("[RESOLVER] deleted type {}", name);
        self.frontier.add_dependents_of(name, true);
    }

    /// Seed a newly added type.
    ///
    /// Units that referenced the name before it existed resolved it to
    /// something else (or failed), so they are found through root and
    /// simple names. An added type whose name is also a known package
    /// shadows that package and blames it too.
    pub fn seed_added(&mut self, locators: &TypeLocators, name: &TypeName) {
        self.frontier.add_dependents_of(name, true);
        if locators.is_known_package(name.as_str()) {
            debug!("[RESOLVER] added type {} collides with a known package", name);
            self.frontier.add_package(&name.to_qualified());
        }
    }

    /// Seed every type of a package, used when a whole package changes
    /// shape at once.
    pub fn seed_package(&mut self, package: &QualifiedName) {
        self.frontier.add_package(package);
    }

    /// Report the outcome of recompiling `name`. A structural change grows
    /// the frontier for the next step.
    pub fn report_structural_change(&mut self, name: &TypeName, is_structural: bool) {
        if is_structural {
            self.frontier.add_dependents_of(name, true);
        }
    }

    /// Mark a type as compiled in the current loop, so propagation will
    /// not hand it back before the next loop begins.
    pub fn mark_compiled(&mut self, name: TypeName) {
        self.handled.insert(name.clone());
        self.affected.insert(name);
    }

    /// Start a new compile loop. Types compiled in earlier loops become
    /// eligible again.
    pub fn begin_loop(&mut self) {
        self.handled.clear();
    }

    /// Check a new definition of `name` against the recorded locators.
    ///
    /// A duplicate raises an error problem against `locator` and the
    /// dependents of `name` join the frontier. Returns true for a duplicate.
    pub fn check_duplicate(
        &mut self,
        locators: &TypeLocators,
        name: &TypeName,
        locator: &Locator,
        release: Option<Release>,
    ) -> bool {
        if !locators.is_duplicate_locator(name, locator, release) {
            return false;
        }
        if let Some(existing) = locators.locator_for(name, release) {
            debug!(
                "[RESOLVER] duplicate type {} in {} (already in {})",
                name, locator, existing
            );
            self.problems.duplicate_type(name, locator, existing, release);
        }
        self.frontier.add_dependents_of(name, true);
        true
    }

    /// Run one propagation step.
    ///
    /// Returns the types that match the current frontier and were not
    /// handled in the current loop, in reference-table order. An empty
    /// batch means the fixpoint is reached.
    pub fn propagate(
        &mut self,
        table: &ReferenceTable,
        cancel: &CancellationToken,
    ) -> Result<Vec<TypeName>, ResolverError> {
        if cancel.is_cancelled() {
            return Err(ResolverError::Cancelled);
        }
        if self.frontier.is_empty() {
            return Ok(Vec::new());
        }
        self.largest_table = self.largest_table.max(table.len());

        let frontier = &self.frontier;
        let handled = &self.handled;
        let batch: Vec<TypeName> = table
            .par_iter()
            .filter(|(name, references)| !handled.contains(*name) && references.matches(frontier))
            .map(|(name, _)| name.clone())
            .collect();
        self.frontier.clear();
        if batch.is_empty() {
            return Ok(batch);
        }

        if batch.iter().any(|name| !self.affected.contains(name)) {
            self.steps += 1;
            if self.steps > self.largest_table {
                return Err(ResolverError::FixpointNotReached {
                    steps: self.steps,
                    table_len: self.largest_table,
                });
            }
        }
        self.handled.extend(batch.iter().cloned());
        self.affected.extend(batch.iter().cloned());
        trace!(
            "[RESOLVER] step {}: {} newly affected, {} total",
            self.steps,
            batch.len(),
            self.affected.len()
        );
        Ok(batch)
    }

    /// The conservative closure of `seed`: every type reachable through
    /// reference facts, treating every matched type as structurally changed.
    ///
    /// The result lists the seed first, then each propagation batch in
    /// table order. Running the closure on its own result returns the same
    /// set.
    pub fn closure(
        table: &ReferenceTable,
        seed: &[TypeName],
        cancel: &CancellationToken,
    ) -> Result<Vec<TypeName>, ResolverError> {
        let mut resolver = Self::new();
        for name in seed {
            resolver.seed_changed(name);
            resolver.mark_compiled(name.clone());
        }
        loop {
            let batch = resolver.propagate(table, cancel)?;
            if batch.is_empty() {
                break;
            }
            for name in &batch {
                resolver.report_structural_change(name, true);
            }
        }
        debug!(
            "[RESOLVER] closure of {} seed(s): {} type(s) in {} step(s)",
            seed.len(),
            resolver.affected.len(),
            resolver.steps
        );
        Ok(resolver.affected.into_iter().collect())
    }

    /// Types handed out so far, plus those marked compiled.
    pub fn affected(&self) -> &FxIndexSet<TypeName> {
        &self.affected
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.frontier.is_empty()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Problems raised so far, leaving the resolver's list empty.
    pub fn take_problems(&mut self) -> Vec<Problem> {
        self.problems.take_sorted()
    }
}

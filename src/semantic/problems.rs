//! Diagnostics produced while building a project.
//!
//! A [`Problem`] is immutable once built. Ordering and equality compare an
//! explicit tuple of fields so sorted problem lists are identical on every
//! machine.

use std::cmp::Ordering;
use std::fmt;

use smol_str::SmolStr;
use text_size::TextRange;

use crate::base::{Locator, Release, TypeName};

// ============================================================================
// PROBLEM TYPES
// ============================================================================

/// Severity level of a problem. Errors sort first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A diagnostic with location.
#[derive(Clone, Debug)]
pub struct Problem {
    path: SmolStr,
    message: SmolStr,
    source_range: TextRange,
    category_id: &'static str,
    severity: Severity,
    source_marker_id: Option<SmolStr>,
}

impl Problem {
    /// Create a new error.
    pub fn error(
        path: impl Into<SmolStr>,
        category_id: &'static str,
        message: impl Into<SmolStr>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            source_range: TextRange::default(),
            category_id,
            severity: Severity::Error,
            source_marker_id: None,
        }
    }

    /// Create a new warning.
    pub fn warning(
        path: impl Into<SmolStr>,
        category_id: &'static str,
        message: impl Into<SmolStr>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(path, category_id, message)
        }
    }

    /// Set the source range.
    pub fn with_range(mut self, range: TextRange) -> Self {
        self.source_range = range;
        self
    }

    /// Set the id of the marker type this problem is reported under.
    pub fn with_marker(mut self, marker: impl Into<SmolStr>) -> Self {
        self.source_marker_id = Some(marker.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_range(&self) -> TextRange {
        self.source_range
    }

    pub fn category_id(&self) -> &'static str {
        self.category_id
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn source_marker_id(&self) -> Option<&str> {
        self.source_marker_id.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    #[allow(clippy::type_complexity)]
    fn sort_key(&self) -> (&str, u32, u32, Severity, &str, &str, Option<&str>) {
        (
            &self.path,
            self.source_range.start().into(),
            self.source_range.end().into(),
            self.severity,
            self.category_id,
            &self.message,
            self.source_marker_id.as_deref(),
        )
    }
}

impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Problem {}

impl PartialOrd for Problem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Problem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}..{}] {} {}: {}",
            self.path,
            u32::from(self.source_range.start()),
            u32::from(self.source_range.end()),
            self.severity.as_str(),
            self.category_id,
            self.message,
        )?;
        if let Some(marker) = &self.source_marker_id {
            write!(f, " ({marker})")?;
        }
        Ok(())
    }
}

// ============================================================================
// PROBLEM CATEGORIES
// ============================================================================

/// Category ids for problems raised by the build engine itself.
///
/// Compiler problems carry whatever category the compiler assigns.
pub mod categories {
    /// Two locators define the same type at the same release.
    pub const DUPLICATE_TYPE: &str = "duplicate type";
    /// A dependency project has no readable state.
    pub const STALE_DEPENDENCY: &str = "stale dependency";
}

// ============================================================================
// PROBLEM COLLECTOR
// ============================================================================

/// Collects problems during a build.
#[derive(Clone, Debug, Default)]
pub struct ProblemCollector {
    problems: Vec<Problem>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn extend(&mut self, problems: impl IntoIterator<Item = Problem>) {
        self.problems.extend(problems);
    }

    /// Add a duplicate type error against the locator that lost.
    pub fn duplicate_type(
        &mut self,
        name: &TypeName,
        locator: &Locator,
        existing: &Locator,
        release: Option<Release>,
    ) {
        let message = match release {
            Some(release) => format!(
                "the type {name} is already defined by {existing} for release {release}"
            ),
            None => format!("the type {name} is already defined by {existing}"),
        };
        self.add(Problem::error(locator.as_str(), categories::DUPLICATE_TYPE, message));
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn error_count(&self) -> usize {
        self.problems.iter().filter(|p| p.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(Problem::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Sorted, deduplicated problems, leaving the collector empty.
    pub fn take_sorted(&mut self) -> Vec<Problem> {
        let mut problems = std::mem::take(&mut self.problems);
        problems.sort();
        problems.dedup();
        problems
    }
}

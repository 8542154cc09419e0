//! Build requests and project descriptors.

use std::fmt;

use super::location::{ClasspathLocation, SourceLocation};
use crate::base::{Locator, ProjectId};

/// A project as declared in the workspace: where its sources live, what
/// it is built against, and which projects it references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub id: ProjectId,
    pub source_locations: Vec<SourceLocation>,
    pub binary_locations: Vec<ClasspathLocation>,
    pub dependencies: Vec<ProjectId>,
}

impl ProjectDescriptor {
    pub fn new(id: impl Into<ProjectId>) -> Self {
        Self {
            id: id.into(),
            source_locations: Vec::new(),
            binary_locations: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_source(mut self, location: SourceLocation) -> Self {
        self.source_locations.push(location);
        self
    }

    pub fn with_binary(mut self, location: ClasspathLocation) -> Self {
        self.binary_locations.push(location);
        self
    }

    pub fn with_dependency(mut self, project: impl Into<ProjectId>) -> Self {
        self.dependencies.push(project.into());
        self
    }
}

/// How a project is rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuildKind {
    /// Discard the previous state and compile everything
    Full,
    /// Start from the previous state and compile only what changed
    Incremental,
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildKind::Full => f.write_str("full"),
            BuildKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// What happened to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// A change notification for one project-relative path. The path is either
/// a source unit or a folder (a removed package or source folder).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub path: Locator,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn added(path: impl Into<Locator>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Added,
        }
    }

    pub fn changed(path: impl Into<Locator>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Changed,
        }
    }

    pub fn removed(path: impl Into<Locator>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Removed,
        }
    }
}

/// Request to (re)build one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildJob {
    pub project: ProjectId,
    pub kind: BuildKind,
    /// Changed paths; `None` means unknown, which forces a full build
    pub changes: Option<Vec<FileChange>>,
    /// Projects this one is built against
    pub dependencies: Vec<ProjectId>,
}

impl BuildJob {
    pub fn full(project: impl Into<ProjectId>) -> Self {
        Self {
            project: project.into(),
            kind: BuildKind::Full,
            changes: None,
            dependencies: Vec::new(),
        }
    }

    pub fn incremental(project: impl Into<ProjectId>, changes: Vec<FileChange>) -> Self {
        Self {
            project: project.into(),
            kind: BuildKind::Incremental,
            changes: Some(changes),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = ProjectId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}

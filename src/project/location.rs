//! Source folders and classpath entries recorded in a project state.

use smol_str::SmolStr;

use crate::base::{Locator, Release};

/// A source folder and the output folder its units compile into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Project-relative source folder (`src`, `src/main/java9`)
    pub source_folder: SmolStr,
    /// Project-relative output folder (`bin`)
    pub output_folder: SmolStr,
    /// Release this folder targets in a multi-release layout
    pub release: Option<Release>,
    /// External annotations overlaid on this folder's types
    pub annotation_path: Option<SmolStr>,
}

impl SourceLocation {
    pub fn new(source_folder: impl Into<SmolStr>, output_folder: impl Into<SmolStr>) -> Self {
        Self {
            source_folder: source_folder.into(),
            output_folder: output_folder.into(),
            release: None,
            annotation_path: None,
        }
    }

    pub fn with_release(mut self, release: Release) -> Self {
        self.release = Some(release);
        self
    }

    pub fn with_annotation_path(mut self, path: impl Into<SmolStr>) -> Self {
        self.annotation_path = Some(path.into());
        self
    }

    /// True if `locator` names a unit inside this folder.
    pub fn contains(&self, locator: &Locator) -> bool {
        locator.is_under(&self.source_folder)
    }
}

/// One entry of a project's binary classpath. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClasspathLocation {
    /// Platform image (`lib/jrt-fs.jar`)
    Jrt {
        path: SmolStr,
        release: Option<Release>,
        annotation_path: Option<SmolStr>,
    },
    /// A jar outside or inside the workspace
    Jar {
        path: SmolStr,
        last_modified: i64,
        release: Option<Release>,
        annotation_path: Option<SmolStr>,
        on_module_path: bool,
    },
    /// A folder of compiled classes
    Directory {
        path: SmolStr,
        is_output_folder: bool,
        annotation_path: Option<SmolStr>,
        on_module_path: bool,
    },
    /// The output of one of this project's own source locations, by index
    SourceFolder(u32),
}

impl ClasspathLocation {
    pub const TAG_JRT: u8 = 1;
    pub const TAG_JAR: u8 = 2;
    pub const TAG_DIRECTORY: u8 = 3;
    pub const TAG_SOURCE_FOLDER: u8 = 4;

    /// Tag byte used in the persisted form.
    pub fn tag(&self) -> u8 {
        match self {
            ClasspathLocation::Jrt { .. } => Self::TAG_JRT,
            ClasspathLocation::Jar { .. } => Self::TAG_JAR,
            ClasspathLocation::Directory { .. } => Self::TAG_DIRECTORY,
            ClasspathLocation::SourceFolder(_) => Self::TAG_SOURCE_FOLDER,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            ClasspathLocation::Jrt { path, .. }
            | ClasspathLocation::Jar { path, .. }
            | ClasspathLocation::Directory { path, .. } => Some(path),
            ClasspathLocation::SourceFolder(_) => None,
        }
    }

    pub fn annotation_path(&self) -> Option<&str> {
        match self {
            ClasspathLocation::Jrt { annotation_path, .. }
            | ClasspathLocation::Jar { annotation_path, .. }
            | ClasspathLocation::Directory { annotation_path, .. } => annotation_path.as_deref(),
            ClasspathLocation::SourceFolder(_) => None,
        }
    }

    pub fn release(&self) -> Option<Release> {
        match self {
            ClasspathLocation::Jrt { release, .. } | ClasspathLocation::Jar { release, .. } => {
                *release
            }
            _ => None,
        }
    }
}

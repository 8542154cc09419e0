//! Constants shared across the engine.

/// Version tag written as the first byte of every persisted state file.
///
/// Bump whenever the layout in `project::state_io` changes; readers reject
/// any other value and the project falls back to a full build.
pub const STATE_FORMAT_VERSION: u8 = 0x04;

/// File extension for persisted project state.
pub const STATE_FILE_EXTENSION: &str = "state";

/// Number of structurally changed types a state remembers before it gives
/// up and treats every type as changed.
pub const DEFAULT_MAX_STRUCTURALLY_CHANGED_TYPES: usize = 100;

/// Incremental compile loops before an incremental build is abandoned in
/// favour of a full build.
pub const DEFAULT_MAX_COMPILE_LOOPS: usize = 5;

/// Build number of a state produced by a full build.
pub const FULL_BUILD_NUMBER: i32 = 0;

/// Build number tagging a project that has nothing to build.
pub const NOOP_BUILD_NUMBER: i32 = -1;

/// Simple name of the per-package descriptor unit. A structural change to it
/// blames the whole package.
pub const PACKAGE_INFO_NAME: &str = "package-info";

/// Separator used in normalized type names and locators.
pub const SEPARATOR: char = '/';

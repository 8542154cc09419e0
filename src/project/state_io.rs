//! Binary persistence of [`ProjectState`].
//!
//! Layout (big-endian, string references are indices into the string table
//! written with the width [`StateWriter::write_index`] picks):
//!
//! ```text
//! u8        format version
//! strings   string table (prefix compressed)
//! header    project name, last structural build time, structural build times
//! sources   source locations
//! binaries  classpath locations, one tag byte each
//! refs      reference table, one entry per type and release variant
//! default   default locator map
//! release   per-release locator maps
//! i32       build number
//! ```
//!
//! Set-valued fields are written sorted so equal states produce equal bytes.

use std::path::PathBuf;

use smol_str::SmolStr;
use thiserror::Error;
use tracing::trace;

use super::location::{ClasspathLocation, SourceLocation};
use super::state::ProjectState;
use crate::base::constants::STATE_FORMAT_VERSION;
use crate::base::{FxIndexMap, Identifier, Locator, ProjectId, QualifiedName, Release, TypeName};
use crate::core::{CodecError, StateReader, StateWriter, StringTable};
use crate::semantic::{ReferenceCollection, ReferenceTable, TypeReferences};

/// Errors reading or writing a persisted state. All of them are recovered
/// by discarding the state and building in full.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("unsupported state format version {found:#04x} (expected {expected:#04x})")]
    VersionMismatch { found: u8, expected: u8 },

    #[error("state was written for project '{found}', not '{expected}'")]
    ForeignProject { expected: ProjectId, found: ProjectId },

    #[error("unknown classpath location tag {0}")]
    UnknownLocationTag(u8),

    #[error("source folder index {index} out of range ({count} source locations)")]
    InvalidSourceFolder { index: u32, count: usize },

    #[error("{0} unexpected byte(s) after the end of the state")]
    TrailingBytes(usize),

    #[error("string '{0}' missing from the string table")]
    UnknownString(SmolStr),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error on state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StateError {
    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a foreign project error.
    pub fn foreign(expected: &ProjectId, found: &str) -> Self {
        Self::ForeignProject {
            expected: expected.clone(),
            found: ProjectId::new(found),
        }
    }
}

// ============================================================================
// WRITE
// ============================================================================

/// Serialize a state.
pub fn write_state(state: &ProjectState) -> Result<Vec<u8>, StateError> {
    let table = collect_strings(state);
    let mut encoder = StateEncoder {
        writer: StateWriter::new(),
        table: &table,
    };

    encoder.writer.write_u8(STATE_FORMAT_VERSION);
    encoder.writer.write_string_table(&table)?;

    encoder.string(state.project_name.as_str())?;
    encoder.writer.write_i64(state.last_structural_build_time);
    encoder
        .writer
        .write_count("structural build times", state.structural_build_times.len())?;
    for (project, time) in &state.structural_build_times {
        encoder.string(project.as_str())?;
        encoder.writer.write_i64(*time);
    }

    encoder
        .writer
        .write_count("source locations", state.source_locations.len())?;
    for location in &state.source_locations {
        encoder.source_location(location)?;
    }

    encoder
        .writer
        .write_count("binary locations", state.binary_locations.len())?;
    for location in &state.binary_locations {
        encoder.binary_location(location)?;
    }

    encoder
        .writer
        .write_count("reference table", state.reference_table.len())?;
    for (name, facts) in &state.reference_table {
        encoder.string(name.as_str())?;
        encoder.writer.write_count("reference variants", facts.len())?;
        for (release, references) in facts.variants() {
            encoder.optional_release(release);
            encoder.references(references)?;
        }
    }

    let locators = &state.type_locators;
    encoder
        .writer
        .write_count("default locators", locators.default_map().len())?;
    for (name, locator) in locators.default_map() {
        encoder.string(name.as_str())?;
        encoder.string(locator.as_str())?;
    }
    encoder
        .writer
        .write_count("release locators", locators.release_map().len())?;
    for (name, per_release) in locators.release_map() {
        encoder.string(name.as_str())?;
        encoder.writer.write_count("releases", per_release.len())?;
        for (release, locator) in per_release {
            encoder.writer.write_u32(release.0);
            encoder.string(locator.as_str())?;
        }
    }

    encoder.writer.write_i32(state.build_number);

    let bytes = encoder.writer.into_bytes();
    trace!(
        "[STATE] wrote {} ({} bytes, {} strings, {} types)",
        state.project_name,
        bytes.len(),
        table.len(),
        state.reference_table.len()
    );
    Ok(bytes)
}

struct StateEncoder<'a> {
    writer: StateWriter,
    table: &'a StringTable,
}

impl StateEncoder<'_> {
    fn string(&mut self, s: &str) -> Result<(), StateError> {
        let symbol = self
            .table
            .get(s)
            .ok_or_else(|| StateError::UnknownString(SmolStr::new(s)))?;
        self.writer.write_index(symbol.index(), self.table.len())?;
        Ok(())
    }

    fn optional_string(&mut self, s: Option<&str>) -> Result<(), StateError> {
        self.writer.write_bool(s.is_some());
        if let Some(s) = s {
            self.string(s)?;
        }
        Ok(())
    }

    fn optional_release(&mut self, release: Option<Release>) {
        self.writer.write_bool(release.is_some());
        if let Some(release) = release {
            self.writer.write_u32(release.0);
        }
    }

    fn strings<'s>(
        &mut self,
        what: &'static str,
        strings: impl ExactSizeIterator<Item = &'s str>,
    ) -> Result<(), StateError> {
        self.writer.write_count(what, strings.len())?;
        for s in strings {
            self.string(s)?;
        }
        Ok(())
    }

    fn source_location(&mut self, location: &SourceLocation) -> Result<(), StateError> {
        self.string(&location.source_folder)?;
        self.string(&location.output_folder)?;
        self.optional_release(location.release);
        self.optional_string(location.annotation_path.as_deref())
    }

    fn binary_location(&mut self, location: &ClasspathLocation) -> Result<(), StateError> {
        self.writer.write_u8(location.tag());
        match location {
            ClasspathLocation::Jrt {
                path,
                release,
                annotation_path,
            } => {
                self.string(path)?;
                self.optional_release(*release);
                self.optional_string(annotation_path.as_deref())?;
            }
            ClasspathLocation::Jar {
                path,
                last_modified,
                release,
                annotation_path,
                on_module_path,
            } => {
                self.string(path)?;
                self.writer.write_i64(*last_modified);
                self.optional_release(*release);
                self.optional_string(annotation_path.as_deref())?;
                self.writer.write_bool(*on_module_path);
            }
            ClasspathLocation::Directory {
                path,
                is_output_folder,
                annotation_path,
                on_module_path,
            } => {
                self.string(path)?;
                self.writer.write_bool(*is_output_folder);
                self.optional_string(annotation_path.as_deref())?;
                self.writer.write_bool(*on_module_path);
            }
            ClasspathLocation::SourceFolder(index) => {
                self.writer.write_u32(*index);
            }
        }
        Ok(())
    }

    fn references(&mut self, references: &ReferenceCollection) -> Result<(), StateError> {
        self.strings(
            "defined type names",
            references.defined_type_names().iter().map(SmolStr::as_str),
        )?;

        let qualified = sorted(references.qualified_name_references().iter());
        self.writer.write_count("qualified names", qualified.len())?;
        for name in qualified {
            self.strings("name segments", name.segments().iter().map(SmolStr::as_str))?;
        }

        let simple = sorted(references.simple_name_references().iter());
        self.strings("simple names", simple.into_iter().map(SmolStr::as_str))?;
        let roots = sorted(references.root_references().iter());
        self.strings("root names", roots.into_iter().map(SmolStr::as_str))
    }
}

fn sorted<'a, T: Ord + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<&'a T> {
    let mut items: Vec<&T> = items.collect();
    items.sort_unstable();
    items
}

/// Intern every string the encoder will reference, in write order.
fn collect_strings(state: &ProjectState) -> StringTable {
    let mut table = StringTable::new();
    table.intern(state.project_name.as_str());
    for project in state.structural_build_times.keys() {
        table.intern(project.as_str());
    }
    for location in &state.source_locations {
        table.intern(&location.source_folder);
        table.intern(&location.output_folder);
        if let Some(path) = &location.annotation_path {
            table.intern(path);
        }
    }
    for location in &state.binary_locations {
        if let Some(path) = location.path() {
            table.intern(path);
        }
        if let Some(path) = location.annotation_path() {
            table.intern(path);
        }
    }
    for (name, facts) in &state.reference_table {
        table.intern(name.as_str());
        for (_, references) in facts.variants() {
            for defined in references.defined_type_names() {
                table.intern(defined);
            }
            for qualified in sorted(references.qualified_name_references().iter()) {
                for segment in qualified.segments() {
                    table.intern(segment);
                }
            }
            for simple in sorted(references.simple_name_references().iter()) {
                table.intern(simple);
            }
            for root in sorted(references.root_references().iter()) {
                table.intern(root);
            }
        }
    }
    for (name, locator) in state.type_locators.default_map() {
        table.intern(name.as_str());
        table.intern(locator.as_str());
    }
    for (name, per_release) in state.type_locators.release_map() {
        table.intern(name.as_str());
        for locator in per_release.values() {
            table.intern(locator.as_str());
        }
    }
    table
}

// ============================================================================
// READ
// ============================================================================

/// Deserialize a state.
///
/// With `expected_project` set, a state written for any other project is
/// rejected with [`StateError::ForeignProject`].
pub fn read_state(
    bytes: &[u8],
    expected_project: Option<&ProjectId>,
) -> Result<ProjectState, StateError> {
    let mut reader = StateReader::new(bytes);
    let version = reader.read_u8()?;
    if version != STATE_FORMAT_VERSION {
        return Err(StateError::VersionMismatch {
            found: version,
            expected: STATE_FORMAT_VERSION,
        });
    }
    let strings = reader.read_string_table()?;
    let mut decoder = StateDecoder {
        reader,
        strings: &strings,
    };

    let project_name = decoder.string()?;
    if let Some(expected) = expected_project {
        if expected.as_str() != project_name.as_str() {
            return Err(StateError::foreign(expected, &project_name));
        }
    }
    let last_structural_build_time = decoder.reader.read_i64()?;
    let mut structural_build_times = FxIndexMap::default();
    for _ in 0..decoder.reader.read_count()? {
        let project = ProjectId::new(decoder.string()?);
        structural_build_times.insert(project, decoder.reader.read_i64()?);
    }

    let source_count = decoder.reader.read_count()?;
    let mut source_locations = Vec::with_capacity(source_count.min(bytes.len()));
    for _ in 0..source_count {
        source_locations.push(decoder.source_location()?);
    }

    let binary_count = decoder.reader.read_count()?;
    let mut binary_locations = Vec::with_capacity(binary_count.min(bytes.len()));
    for _ in 0..binary_count {
        binary_locations.push(decoder.binary_location(source_locations.len())?);
    }

    let mut state = ProjectState::new(
        ProjectId::new(&project_name),
        source_locations,
        binary_locations,
    );
    state.last_structural_build_time = last_structural_build_time;
    state.structural_build_times = structural_build_times;

    let mut reference_table = ReferenceTable::default();
    for _ in 0..decoder.reader.read_count()? {
        let name = TypeName::new(decoder.string()?);
        let mut facts = TypeReferences::new();
        for _ in 0..decoder.reader.read_count()? {
            let release = decoder.optional_release()?;
            facts.insert(release, decoder.references()?);
        }
        reference_table.insert(name, facts);
    }
    state.reference_table = reference_table;

    for _ in 0..decoder.reader.read_count()? {
        let name = TypeName::new(decoder.string()?);
        let locator = Locator::new(decoder.string()?);
        state.type_locators.record_locator_for_type(name, locator, None);
    }
    for _ in 0..decoder.reader.read_count()? {
        let name = TypeName::new(decoder.string()?);
        for _ in 0..decoder.reader.read_count()? {
            let release = Release(decoder.reader.read_u32()?);
            let locator = Locator::new(decoder.string()?);
            state
                .type_locators
                .record_locator_for_type(name.clone(), locator, Some(release));
        }
    }

    state.build_number = decoder.reader.read_i32()?;

    let trailing = bytes.len() - decoder.reader.position();
    if trailing > 0 {
        return Err(StateError::TrailingBytes(trailing));
    }
    trace!(
        "[STATE] read {} (build {}, {} types)",
        state.project_name,
        state.build_number,
        state.reference_table.len()
    );
    Ok(state)
}

struct StateDecoder<'a> {
    reader: StateReader<'a>,
    strings: &'a [SmolStr],
}

impl StateDecoder<'_> {
    fn string(&mut self) -> Result<SmolStr, StateError> {
        let index = self.reader.read_index(self.strings.len())?;
        Ok(self.strings[index].clone())
    }

    fn optional_string(&mut self) -> Result<Option<SmolStr>, StateError> {
        if self.reader.read_bool()? {
            Ok(Some(self.string()?))
        } else {
            Ok(None)
        }
    }

    fn optional_release(&mut self) -> Result<Option<Release>, StateError> {
        if self.reader.read_bool()? {
            Ok(Some(Release(self.reader.read_u32()?)))
        } else {
            Ok(None)
        }
    }

    fn identifiers(&mut self) -> Result<Vec<Identifier>, StateError> {
        let count = self.reader.read_count()?;
        let mut names = Vec::with_capacity(count.min(self.strings.len()));
        for _ in 0..count {
            names.push(self.string()?);
        }
        Ok(names)
    }

    fn source_location(&mut self) -> Result<SourceLocation, StateError> {
        Ok(SourceLocation {
            source_folder: self.string()?,
            output_folder: self.string()?,
            release: self.optional_release()?,
            annotation_path: self.optional_string()?,
        })
    }

    fn binary_location(&mut self, source_count: usize) -> Result<ClasspathLocation, StateError> {
        let location = match self.reader.read_u8()? {
            ClasspathLocation::TAG_JRT => ClasspathLocation::Jrt {
                path: self.string()?,
                release: self.optional_release()?,
                annotation_path: self.optional_string()?,
            },
            ClasspathLocation::TAG_JAR => ClasspathLocation::Jar {
                path: self.string()?,
                last_modified: self.reader.read_i64()?,
                release: self.optional_release()?,
                annotation_path: self.optional_string()?,
                on_module_path: self.reader.read_bool()?,
            },
            ClasspathLocation::TAG_DIRECTORY => ClasspathLocation::Directory {
                path: self.string()?,
                is_output_folder: self.reader.read_bool()?,
                annotation_path: self.optional_string()?,
                on_module_path: self.reader.read_bool()?,
            },
            ClasspathLocation::TAG_SOURCE_FOLDER => {
                let index = self.reader.read_u32()?;
                if index as usize >= source_count {
                    return Err(StateError::InvalidSourceFolder {
                        index,
                        count: source_count,
                    });
                }
                ClasspathLocation::SourceFolder(index)
            }
            other => return Err(StateError::UnknownLocationTag(other)),
        };
        Ok(location)
    }

    fn references(&mut self) -> Result<ReferenceCollection, StateError> {
        let defined = self.identifiers()?;
        let qualified_count = self.reader.read_count()?;
        let mut qualified = Vec::with_capacity(qualified_count.min(self.strings.len()));
        for _ in 0..qualified_count {
            qualified.push(QualifiedName::from_segments(self.identifiers()?));
        }
        let simple = self.identifiers()?;
        let roots = self.identifiers()?;
        Ok(ReferenceCollection::new(simple, qualified, roots).with_defined_type_names(defined))
    }
}

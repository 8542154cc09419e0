//! Per-project build state.
//!
//! A [`ProjectState`] is what one build leaves behind for the next: the
//! reference facts of every compiled type, where each type is defined, the
//! classpath it was built against, and the structural build times used to
//! decide whether dependent projects must look for affected types.
//!
//! States are never mutated in place once published. A build starts from
//! [`ProjectState::copy_for_next_build`] (or a fresh state for a full
//! build) and the finished value replaces the old one as a whole.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use super::location::{ClasspathLocation, SourceLocation};
use crate::base::constants::{FULL_BUILD_NUMBER, NOOP_BUILD_NUMBER, SEPARATOR};
use crate::base::{FxIndexMap, FxIndexSet, Locator, ProjectId, Release, TypeName};
use crate::semantic::{ReferenceCollection, ReferenceTable, TypeLocators, TypeReferences};

/// Build state of one project.
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub project_name: ProjectId,
    pub source_locations: Vec<SourceLocation>,
    pub binary_locations: Vec<ClasspathLocation>,
    pub reference_table: ReferenceTable,
    pub type_locators: TypeLocators,
    pub build_number: i32,
    /// Stamped whenever a build structurally changes at least one type
    pub last_structural_build_time: i64,
    /// Last structural build time observed for each dependency project
    pub structural_build_times: FxIndexMap<ProjectId, i64>,

    previous_structural_build_time: i64,
    structurally_changed_types: Option<FxIndexSet<TypeName>>,
}

impl PartialEq for ProjectState {
    fn eq(&self, other: &Self) -> bool {
        self.project_name == other.project_name
            && self.source_locations == other.source_locations
            && self.binary_locations == other.binary_locations
            && self.reference_table == other.reference_table
            && self.type_locators == other.type_locators
            && self.build_number == other.build_number
            && self.last_structural_build_time == other.last_structural_build_time
            && self.structural_build_times == other.structural_build_times
    }
}

impl Eq for ProjectState {}

impl ProjectState {
    /// Fresh state for a full build.
    pub fn new(
        project_name: ProjectId,
        source_locations: Vec<SourceLocation>,
        binary_locations: Vec<ClasspathLocation>,
    ) -> Self {
        Self {
            project_name,
            source_locations,
            binary_locations,
            reference_table: ReferenceTable::default(),
            type_locators: TypeLocators::new(),
            build_number: FULL_BUILD_NUMBER,
            last_structural_build_time: 0,
            structural_build_times: FxIndexMap::default(),
            previous_structural_build_time: 0,
            structurally_changed_types: None,
        }
    }

    /// State of a project with nothing to build.
    pub fn noop(project_name: ProjectId) -> Self {
        Self {
            build_number: NOOP_BUILD_NUMBER,
            ..Self::new(project_name, Vec::new(), Vec::new())
        }
    }

    pub fn is_noop(&self) -> bool {
        self.build_number == NOOP_BUILD_NUMBER
    }

    /// Starting point for an incremental build: same contents, next build
    /// number, no structural changes recorded yet.
    pub fn copy_for_next_build(&self) -> Self {
        Self {
            build_number: self.build_number.saturating_add(1),
            previous_structural_build_time: 0,
            structurally_changed_types: None,
            ..self.clone()
        }
    }

    /// Start recording structural changes for this build.
    ///
    /// The new structural build time is strictly greater than the previous
    /// one even if the clock did not move.
    pub fn tag_as_structurally_changed(&mut self) {
        self.previous_structural_build_time = self.last_structural_build_time;
        self.structurally_changed_types = Some(FxIndexSet::default());
        self.last_structural_build_time =
            next_structural_build_time(self.previous_structural_build_time);
        debug!(
            "[STATE] {} structural build time {} -> {}",
            self.project_name, self.previous_structural_build_time, self.last_structural_build_time
        );
    }

    /// Stamp a full build. Every type counts as changed, so no list of
    /// changed types is kept.
    pub fn stamp_full_build(&mut self, previous: Option<&ProjectState>) {
        let previous_time = previous.map_or(0, |state| state.last_structural_build_time);
        self.previous_structural_build_time = 0;
        self.structurally_changed_types = None;
        self.last_structural_build_time = next_structural_build_time(previous_time);
    }

    /// Remember that `name` changed shape in this build. Past `cap` types
    /// the list is dropped and readers must assume every type changed.
    pub fn record_structural_change(&mut self, name: &TypeName, cap: usize) {
        if let Some(changed) = &mut self.structurally_changed_types {
            if changed.len() >= cap {
                trace!("[STATE] more than {} structural changes, dropping list", cap);
                self.structurally_changed_types = None;
            } else {
                changed.insert(name.clone());
            }
        }
    }

    /// Did `dependency` change structurally since this project last looked?
    ///
    /// A missing dependency state always counts as changed.
    pub fn was_structurally_changed(
        &self,
        dependency: &ProjectId,
        state: Option<&ProjectState>,
    ) -> bool {
        let Some(state) = state else {
            return true;
        };
        let seen = self.structural_build_times.get(dependency).copied().unwrap_or(0);
        seen != state.last_structural_build_time
    }

    /// Types `dependency` changed since this project last looked, if known.
    ///
    /// Known only when this project saw the build right before the
    /// dependency's latest structural build; otherwise `None` means any
    /// type may have changed.
    pub fn structurally_changed_types_of<'a>(
        &self,
        dependency: &'a ProjectState,
    ) -> Option<&'a FxIndexSet<TypeName>> {
        if dependency.previous_structural_build_time <= 0 {
            return None;
        }
        let seen = self
            .structural_build_times
            .get(&dependency.project_name)
            .copied()
            .unwrap_or(0);
        if seen == dependency.previous_structural_build_time {
            dependency.structurally_changed_types.as_ref()
        } else {
            None
        }
    }

    /// Record the structural build time of a dependency this build was
    /// made against. A missing state clears the entry so the next build
    /// checks the dependency again.
    pub fn observe_dependency(&mut self, dependency: &ProjectId, state: Option<&ProjectState>) {
        match state {
            Some(state) => {
                self.structural_build_times
                    .insert(dependency.clone(), state.last_structural_build_time);
            }
            None => {
                self.structural_build_times.shift_remove(dependency);
            }
        }
    }

    /// Record a compiled type: its reference facts and where it is defined.
    /// Only the variant for `release` is replaced.
    pub fn record(
        &mut self,
        name: TypeName,
        locator: Locator,
        release: Option<Release>,
        references: ReferenceCollection,
    ) {
        self.type_locators
            .record_locator_for_type(name.clone(), locator, release);
        self.reference_table
            .entry(name)
            .or_default()
            .insert(release, references);
    }

    /// Forget the definitions of `name` made by `locator`, along with any
    /// secondary types they declared. Definitions of `name` in other
    /// releases stay. Returns every name that lost a definition.
    pub fn remove_type_from(&mut self, name: &TypeName, locator: &Locator) -> Vec<TypeName> {
        let secondaries: Vec<TypeName> = self
            .reference_table
            .get(name)
            .into_iter()
            .flat_map(TypeReferences::variants)
            .filter(|(release, _)| self.type_locators.locator_for(name, *release) == Some(locator))
            .flat_map(|(_, references)| references.defined_type_names())
            .map(|secondary| match name.package() {
                Some(package) => TypeName::new(format!("{package}{SEPARATOR}{secondary}")),
                None => TypeName::new(secondary),
            })
            .collect();

        let mut removed = Vec::new();
        if self.type_locators.remove_type_locator(name, locator) {
            removed.push(name.clone());
        }
        self.prune_references(name);
        for secondary in secondaries {
            let had_locator = self.type_locators.remove_type_locator(&secondary, locator);
            if had_locator && !removed.contains(&secondary) {
                removed.push(secondary.clone());
            }
            self.prune_references(&secondary);
        }
        removed
    }

    /// Forget every type defined by `locator`.
    pub fn remove_locator(&mut self, locator: &Locator) -> Vec<TypeName> {
        let removed = self.type_locators.remove_locator_value(locator, None);
        for name in &removed {
            self.prune_references(name);
        }
        removed
    }

    /// Forget every type defined under `folder` (a package or source
    /// folder that was deleted wholesale).
    pub fn remove_folder(&mut self, folder: &str) -> Vec<TypeName> {
        let removed = self.type_locators.remove_locators_under(folder);
        for name in &removed {
            self.prune_references(name);
        }
        if !removed.is_empty() {
            debug!("[STATE] removed {} type(s) under {}", removed.len(), folder);
        }
        removed
    }

    /// Drop the reference facts of every variant of `name` that no longer
    /// has a locator.
    fn prune_references(&mut self, name: &TypeName) {
        let locators = &self.type_locators;
        let Some(facts) = self.reference_table.get_mut(name) else {
            return;
        };
        facts.retain(|release| locators.locator_for(name, release).is_some());
        if facts.is_empty() {
            self.reference_table.shift_remove(name);
        }
    }

    /// The source location a locator belongs to, if any.
    pub fn source_location_of(&self, locator: &Locator) -> Option<&SourceLocation> {
        self.source_locations
            .iter()
            .filter(|location| location.contains(locator))
            .max_by_key(|location| location.source_folder.len())
    }

    pub fn is_known_type(&self, name: &TypeName) -> bool {
        self.type_locators.is_known_type(name)
    }

    pub fn is_known_package(&self, package: &str) -> bool {
        self.type_locators.is_known_package(package)
    }

    pub fn is_source_folder_empty(&self, folder: &str) -> bool {
        self.type_locators.is_source_folder_empty(folder)
    }
}

/// `max(now, previous + 1)` in milliseconds since the epoch.
fn next_structural_build_time(previous: i64) -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    now.max(previous.saturating_add(1))
}

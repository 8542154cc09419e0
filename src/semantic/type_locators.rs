//! Where each known type of a project is defined.
//!
//! A type normally has one locator in the default map. In a multi-release
//! layout the same type name may additionally be defined per release, and
//! those entries live in the release map. The two maps are independent: a
//! type defined in the default map and again for release 9 is not a
//! duplicate.

use std::sync::OnceLock;

use smol_str::SmolStr;
use tracing::trace;

use crate::base::constants::SEPARATOR;
use crate::base::{FxIndexMap, Locator, Release, TypeName};

/// Type name to locator maps for one project.
#[derive(Debug, Clone, Default)]
pub struct TypeLocators {
    default_map: FxIndexMap<TypeName, Locator>,
    release_map: FxIndexMap<TypeName, FxIndexMap<Release, Locator>>,
    /// Sorted package names and all their prefixes; rebuilt on first query
    /// after a mutation
    known_packages: OnceLock<Vec<SmolStr>>,
}

impl PartialEq for TypeLocators {
    fn eq(&self, other: &Self) -> bool {
        self.default_map == other.default_map && self.release_map == other.release_map
    }
}

impl Eq for TypeLocators {}

impl TypeLocators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` is defined by `locator`, in the default map when
    /// `release` is `None` and in the per-release map otherwise.
    pub fn record_locator_for_type(
        &mut self,
        name: TypeName,
        locator: Locator,
        release: Option<Release>,
    ) {
        self.invalidate_packages();
        match release {
            None => {
                self.default_map.insert(name, locator);
            }
            Some(release) => {
                self.release_map
                    .entry(name)
                    .or_default()
                    .insert(release, locator);
            }
        }
    }

    /// Forget every locator recorded for `name`, in both maps. Returns true
    /// if any was recorded.
    pub fn remove_locator(&mut self, name: &TypeName) -> bool {
        let in_default = self.default_map.shift_remove(name).is_some();
        let in_release = self.release_map.shift_remove(name).is_some();
        if in_default || in_release {
            self.invalidate_packages();
        }
        in_default || in_release
    }

    /// Forget the definitions of `name` made by `locator`, in any map.
    /// Definitions of `name` by other locators stay. Returns true if any
    /// entry was removed.
    pub fn remove_type_locator(&mut self, name: &TypeName, locator: &Locator) -> bool {
        let mut hit = false;
        if self.default_map.get(name) == Some(locator) {
            self.default_map.shift_remove(name);
            hit = true;
        }
        if let Some(per_release) = self.release_map.get_mut(name) {
            let before = per_release.len();
            per_release.retain(|_, candidate| candidate != locator);
            hit |= per_release.len() != before;
            if per_release.is_empty() {
                self.release_map.shift_remove(name);
            }
        }
        if hit {
            self.invalidate_packages();
        }
        hit
    }

    /// Forget every type defined by `locator`.
    ///
    /// With `release = None` every map is scanned; otherwise only entries for
    /// that release are removed. Per-type release maps left empty are
    /// dropped. Returns the names that lost a locator, in map order.
    pub fn remove_locator_value(
        &mut self,
        locator: &Locator,
        release: Option<Release>,
    ) -> Vec<TypeName> {
        self.remove_matching(release, |candidate| candidate == locator)
    }

    /// Forget every type whose locator lives under `folder`.
    pub fn remove_locators_under(&mut self, folder: &str) -> Vec<TypeName> {
        self.remove_matching(None, |candidate| candidate.is_under(folder))
    }

    fn remove_matching(
        &mut self,
        release: Option<Release>,
        mut matches: impl FnMut(&Locator) -> bool,
    ) -> Vec<TypeName> {
        let mut removed = Vec::new();

        if release.is_none() {
            self.default_map.retain(|name, locator| {
                let hit = matches(locator);
                if hit {
                    removed.push(name.clone());
                }
                !hit
            });
        }

        self.release_map.retain(|name, per_release| {
            let before = per_release.len();
            per_release.retain(|candidate_release, locator| {
                let in_scope = release.is_none_or(|r| r == *candidate_release);
                !(in_scope && matches(locator))
            });
            if per_release.len() != before && !removed.contains(name) {
                removed.push(name.clone());
            }
            !per_release.is_empty()
        });

        if !removed.is_empty() {
            trace!("[STATE] removed locators for {} type(s)", removed.len());
            self.invalidate_packages();
        }
        removed
    }

    /// True iff a *different* locator is already recorded for `name` at
    /// `release` (the default map when `release` is `None`).
    pub fn is_duplicate_locator(
        &self,
        name: &TypeName,
        locator: &Locator,
        release: Option<Release>,
    ) -> bool {
        self.locator_for(name, release)
            .is_some_and(|existing| existing != locator)
    }

    /// The locator recorded for `name` at `release`, if any.
    pub fn locator_for(&self, name: &TypeName, release: Option<Release>) -> Option<&Locator> {
        match release {
            None => self.default_map.get(name),
            Some(release) => self.release_map.get(name)?.get(&release),
        }
    }

    /// True if `name` is recorded in either map.
    pub fn is_known_type(&self, name: &TypeName) -> bool {
        self.default_map.contains_key(name) || self.release_map.contains_key(name)
    }

    /// True if some recorded type lives in `package` or one of its
    /// subpackages. Accepts dotted or slashed names.
    pub fn is_known_package(&self, package: &str) -> bool {
        let normalized;
        let package = if package.contains('.') {
            normalized = package.replace('.', "/");
            normalized.as_str()
        } else {
            package
        };
        self.known_packages()
            .binary_search_by(|known| known.as_str().cmp(package))
            .is_ok()
    }

    /// True if no recorded locator in either map lives under `folder`.
    pub fn is_source_folder_empty(&self, folder: &str) -> bool {
        !self.all_locators().any(|locator| locator.is_under(folder))
    }

    /// Every type name defined by `locator`, in any map.
    pub fn types_defined_by(&self, locator: &Locator) -> Vec<TypeName> {
        let mut names: Vec<TypeName> = self
            .default_map
            .iter()
            .filter(|(_, candidate)| *candidate == locator)
            .map(|(name, _)| name.clone())
            .collect();
        for (name, per_release) in &self.release_map {
            if per_release.values().any(|candidate| candidate == locator) && !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn default_map(&self) -> &FxIndexMap<TypeName, Locator> {
        &self.default_map
    }

    pub fn release_map(&self) -> &FxIndexMap<TypeName, FxIndexMap<Release, Locator>> {
        &self.release_map
    }

    /// Every known type name, default map first.
    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.default_map
            .keys()
            .chain(self.release_map.keys().filter(|name| !self.default_map.contains_key(*name)))
    }

    pub fn is_empty(&self) -> bool {
        self.default_map.is_empty() && self.release_map.is_empty()
    }

    fn all_locators(&self) -> impl Iterator<Item = &Locator> {
        self.default_map
            .values()
            .chain(self.release_map.values().flat_map(|per_release| per_release.values()))
    }

    fn invalidate_packages(&mut self) {
        self.known_packages.take();
    }

    fn known_packages(&self) -> &[SmolStr] {
        self.known_packages.get_or_init(|| {
            let mut packages: Vec<SmolStr> = Vec::new();
            for name in self.default_map.keys().chain(self.release_map.keys()) {
                let mut package = name.package();
                while let Some(current) = package {
                    packages.push(SmolStr::new(current));
                    package = current.rfind(SEPARATOR).map(|idx| &current[..idx]);
                }
            }
            packages.sort_unstable();
            packages.dedup();
            trace!("[STATE] rebuilt package index: {} package(s)", packages.len());
            packages
        })
    }
}

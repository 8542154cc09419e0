//! Per-type reference facts and the changed-name frontier they are matched
//! against.
//!
//! A [`ReferenceCollection`] records every name a compiled type *may* depend
//! on. It is produced by the compiler and only stored and queried here. The
//! sets are a conservative over-approximation: if a name is absent from all
//! three sets, the type cannot be affected by a change to a declaration with
//! that name.

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::base::constants::PACKAGE_INFO_NAME;
use crate::base::{FxIndexMap, Identifier, QualifiedName, Release, TypeName};

/// Reference facts of every compiled type of a project, in the order the
/// types were first recorded.
pub type ReferenceTable = FxIndexMap<TypeName, TypeReferences>;

/// Reference facts of every compiled variant of one type.
///
/// A type usually has a single default variant. In a multi-release layout
/// each release that defines the type again keeps its own facts, so
/// recompiling one release never loses what another release references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeReferences {
    default: Option<ReferenceCollection>,
    releases: FxIndexMap<Release, ReferenceCollection>,
}

impl TypeReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts of the variant compiled for `release` (the default variant
    /// when `None`).
    pub fn get(&self, release: Option<Release>) -> Option<&ReferenceCollection> {
        match release {
            None => self.default.as_ref(),
            Some(release) => self.releases.get(&release),
        }
    }

    /// Replace the facts of one variant.
    pub fn insert(&mut self, release: Option<Release>, references: ReferenceCollection) {
        match release {
            None => self.default = Some(references),
            Some(release) => {
                self.releases.insert(release, references);
            }
        }
    }

    pub fn remove(&mut self, release: Option<Release>) -> Option<ReferenceCollection> {
        match release {
            None => self.default.take(),
            Some(release) => self.releases.shift_remove(&release),
        }
    }

    /// Keep only the variants for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(Option<Release>) -> bool) {
        if self.default.is_some() && !keep(None) {
            self.default = None;
        }
        self.releases.retain(|release, _| keep(Some(*release)));
    }

    /// Every variant, default first.
    pub fn variants(&self) -> impl Iterator<Item = (Option<Release>, &ReferenceCollection)> {
        self.default
            .iter()
            .map(|references| (None, references))
            .chain(
                self.releases
                    .iter()
                    .map(|(release, references)| (Some(*release), references)),
            )
    }

    /// Does any variant reference one of the changed names?
    pub fn matches(&self, changed: &ChangedNames) -> bool {
        self.variants().any(|(_, references)| references.matches(changed))
    }

    /// Number of variants with facts.
    pub fn len(&self) -> usize {
        usize::from(self.default.is_some()) + self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.releases.is_empty()
    }
}

impl From<ReferenceCollection> for TypeReferences {
    fn from(references: ReferenceCollection) -> Self {
        Self {
            default: Some(references),
            releases: FxIndexMap::default(),
        }
    }
}

/// Names a compiled type may depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceCollection {
    /// Unqualified identifiers in reference position (method, field, type names)
    simple_name_references: FxHashSet<Identifier>,
    /// Dotted names (`java.util.List`, static import targets, package names)
    qualified_name_references: FxHashSet<QualifiedName>,
    /// First segment of every qualified reference and on-demand import
    root_references: FxHashSet<Identifier>,
    /// Additional top-level types defined by the same unit, beyond the one
    /// the unit is named after. Empty in the common case.
    defined_type_names: Vec<Identifier>,
}

impl ReferenceCollection {
    pub fn new<S, Q, R>(simple: S, qualified: Q, roots: R) -> Self
    where
        S: IntoIterator<Item = Identifier>,
        Q: IntoIterator<Item = QualifiedName>,
        R: IntoIterator<Item = Identifier>,
    {
        Self {
            simple_name_references: simple.into_iter().collect(),
            qualified_name_references: qualified.into_iter().collect(),
            root_references: roots.into_iter().collect(),
            defined_type_names: Vec::new(),
        }
    }

    /// Attach the names of secondary types defined by the same unit.
    pub fn with_defined_type_names(mut self, names: impl IntoIterator<Item = Identifier>) -> Self {
        self.defined_type_names = names.into_iter().collect();
        self
    }

    /// Build a collection from dotted names, deriving simple and root names
    /// the way the compiler does: every segment of a qualified reference is
    /// also a simple reference, and its first segment is a root reference.
    pub fn from_names<'a>(
        simple: impl IntoIterator<Item = &'a str>,
        qualified: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut collection = Self::new(simple.into_iter().map(Identifier::new), [], []);
        for dotted in qualified {
            let name = QualifiedName::parse(dotted);
            if let Some(root) = name.first() {
                collection.root_references.insert(root.clone());
            }
            collection
                .simple_name_references
                .extend(name.segments().iter().cloned());
            collection.qualified_name_references.insert(name);
        }
        collection
    }

    /// Does this collection reference any of the changed names?
    ///
    /// True iff a simple name intersects `changed.simple`, or a qualified
    /// reference is a whole-segment prefix of (or equal to) a changed
    /// qualified name, or a root intersects `changed.roots`.
    pub fn matches(&self, changed: &ChangedNames) -> bool {
        if changed.simple.iter().any(|name| self.simple_name_references.contains(name)) {
            return true;
        }
        let qualified_hit = self.qualified_name_references.iter().any(|reference| {
            changed
                .qualified
                .iter()
                .any(|name| reference.is_prefix_of(name))
        });
        if qualified_hit {
            return true;
        }
        changed.roots.iter().any(|root| self.root_references.contains(root))
    }

    pub fn simple_name_references(&self) -> &FxHashSet<Identifier> {
        &self.simple_name_references
    }

    pub fn qualified_name_references(&self) -> &FxHashSet<QualifiedName> {
        &self.qualified_name_references
    }

    pub fn root_references(&self) -> &FxHashSet<Identifier> {
        &self.root_references
    }

    pub fn defined_type_names(&self) -> &[Identifier] {
        &self.defined_type_names
    }

    pub fn is_empty(&self) -> bool {
        self.simple_name_references.is_empty()
            && self.qualified_name_references.is_empty()
            && self.root_references.is_empty()
    }
}

/// The frontier of changed names an affected-set pass looks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedNames {
    pub simple: FxHashSet<Identifier>,
    pub qualified: FxHashSet<QualifiedName>,
    pub roots: FxHashSet<Identifier>,
}

impl ChangedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.simple.is_empty() && self.qualified.is_empty() && self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.simple.clear();
        self.qualified.clear();
        self.roots.clear();
    }

    /// Record that dependents of `type_name` must be found.
    ///
    /// Adds the type's package and full name as qualified names, its
    /// top-level simple name and its root segment. A structural change to a
    /// `package-info` unit blames the package itself. Returns true if any
    /// name was new.
    pub fn add_dependents_of(&mut self, type_name: &TypeName, is_structural: bool) -> bool {
        if is_structural && type_name.simple_name() == PACKAGE_INFO_NAME {
            // Default package has no descriptor that can influence others
            let Some(package) = type_name.package_qualified() else {
                return false;
            };
            return self.add_package(&package);
        }

        let mut was_new = self.roots.insert(Identifier::new(type_name.root()));
        if let Some(package) = type_name.package_qualified() {
            was_new |= self.qualified.insert(package);
        }
        was_new |= self.qualified.insert(type_name.to_qualified());
        was_new |= self
            .simple
            .insert(Identifier::new(type_name.top_level_simple_name()));
        if was_new {
            trace!(
                "[RESOLVER] will look for dependents of {} in {:?}",
                type_name.top_level_simple_name(),
                type_name.package()
            );
        }
        was_new
    }

    /// Record that dependents of a whole package must be found.
    pub fn add_package(&mut self, package: &QualifiedName) -> bool {
        let mut was_new = false;
        if let Some(root) = package.first() {
            was_new |= self.roots.insert(root.clone());
        }
        if let Some(last) = package.segments().last() {
            was_new |= self.simple.insert(last.clone());
        }
        was_new |= self.qualified.insert(package.clone());
        was_new
    }

    /// Merge another frontier into this one.
    pub fn extend(&mut self, other: &ChangedNames) {
        self.simple.extend(other.simple.iter().cloned());
        self.qualified.extend(other.qualified.iter().cloned());
        self.roots.extend(other.roots.iter().cloned());
    }
}

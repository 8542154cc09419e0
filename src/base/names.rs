//! Name types used as map keys throughout the engine.
//!
//! All names are immutable and cheap to clone (`SmolStr` inlines short
//! strings and reference-counts long ones).

use smol_str::SmolStr;
use std::fmt;

use super::constants::SEPARATOR;

/// A single name segment (`List`, `java`, `foo`).
pub type Identifier = SmolStr;

/// A qualified type name, normalized to slash separators (`p1/p2/A`).
///
/// Dot-separated input (`p1.p2.A`) is accepted and normalized on
/// construction, so `TypeName::new("a.b.C") == TypeName::new("a/b/C")`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(SmolStr);

impl TypeName {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.contains('.') {
            Self(SmolStr::new(name.replace('.', "/")))
        } else {
            Self(SmolStr::new(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the slash-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Package portion (`p1/p2` for `p1/p2/A`), `None` for the default package.
    pub fn package(&self) -> Option<&str> {
        self.0.rfind(SEPARATOR).map(|idx| &self.0[..idx])
    }

    /// Last segment, including any `$Member` suffix.
    pub fn simple_name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Simple name of the outermost enclosing type (`Outer` for `p/Outer$Inner`).
    ///
    /// Dependents reference member types through their enclosing type, so
    /// this is the name used when seeding affected-set lookups.
    pub fn top_level_simple_name(&self) -> &str {
        let simple = self.simple_name();
        match simple.find('$') {
            Some(idx) if idx > 0 => &simple[..idx],
            _ => simple,
        }
    }

    /// First segment (`p1` for `p1/p2/A`, `A` for a default-package type).
    pub fn root(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// The name as a segment sequence.
    pub fn to_qualified(&self) -> QualifiedName {
        QualifiedName::from_segments(self.segments())
    }

    /// The package portion as a segment sequence.
    pub fn package_qualified(&self) -> Option<QualifiedName> {
        self.package()
            .map(|pkg| QualifiedName::from_segments(pkg.split(SEPARATOR)))
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.0)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// An ordered dotted name (`java.util.List`) kept as whole segments.
///
/// Prefix tests compare whole segments, so `a.b` is a prefix of `a.b.C` but
/// not of `a.bC`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName(Box<[Identifier]>);

impl QualifiedName {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            segments
                .into_iter()
                .map(|s| SmolStr::new(s.as_ref()))
                .collect(),
        )
    }

    /// Parse a dotted or slashed name. Empty segments are dropped.
    pub fn parse(name: &str) -> Self {
        Self::from_segments(name.split(['.', SEPARATOR]).filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[Identifier] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Identifier> {
        self.0.first()
    }

    /// True if `self` equals `other` or is a whole-segment prefix of it.
    pub fn is_prefix_of(&self, other: &QualifiedName) -> bool {
        self.0.len() <= other.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedName({self})")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Project-relative path of the source unit defining a type
/// (`src/p1/A.java`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(SmolStr);

impl Locator {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(SmolStr::new(path.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this locator lives inside `folder` (matched on separator
    /// boundaries, so `src2/A.java` is not under `src`). An empty folder is
    /// the project root and contains everything.
    pub fn is_under(&self, folder: &str) -> bool {
        let folder = folder.trim_end_matches(SEPARATOR);
        if folder.is_empty() {
            return true;
        }
        self.0
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A release number in a multi-release layout (`8`, `11`, `17`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Release(pub u32);

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a project in the workspace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(SmolStr);

impl ProjectId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(SmolStr::new(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

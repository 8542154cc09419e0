//! String table for persisted state.
//!
//! Every string written to a state file is stored once and referred to by
//! its position in the table. Interning returns a [`Symbol`], a handle whose
//! equality and hash are those of the table slot rather than of the string
//! contents: two symbols are equal iff they name the same entry of the same
//! table. Symbols from different tables must not be mixed.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use smol_str::SmolStr;

/// Handle to an interned string. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Position of the entry in its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Insertion-ordered string interner.
///
/// Interning the same string twice returns the same [`Symbol`]. Entries keep
/// the order in which they were first interned, which is the order they are
/// written to disk.
#[derive(Debug, Default, Clone)]
pub struct StringTable {
    strings: IndexSet<SmolStr, FxBuildHasher>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its handle.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(index) = self.strings.get_index_of(s) {
            return Symbol(index as u32);
        }
        let (index, _) = self.strings.insert_full(SmolStr::new(s));
        Symbol(index as u32)
    }

    /// Get the handle of an already interned string, without creating it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.strings.get_index_of(s).map(|index| Symbol(index as u32))
    }

    /// Look up the string behind a handle.
    pub fn resolve(&self, symbol: Symbol) -> Option<&SmolStr> {
        self.strings.get_index(symbol.index())
    }

    /// Number of unique strings interned.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if no strings have been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &SmolStr> {
        self.strings.iter()
    }
}

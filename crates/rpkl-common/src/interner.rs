//! String interning for identifier deduplication.
//!
//! Member names, class names, and string-literal types are compared and
//! hashed constantly; interning reduces them to copyable `Atom` handles.
//! `Interner` is the single-threaded variant used inside one evaluation;
//! `ShardedInterner` is the shareable variant used for the class registry
//! and type store, which are read concurrently by parallel evaluations.

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::RwLock;

/// An interned string handle.
///
/// Atoms are cheap to copy, compare, and hash. Two atoms from the same
/// interner are equal iff their strings are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom(pub u32);

impl Atom {
    pub const NONE: Atom = Atom(u32::MAX);

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// A member-name identifier.
///
/// Property names come in two flavors: regular names visible through the
/// amendment chain, and module-local names that never escape their declaring
/// module. The flavor participates in equality, so a local `x` and a regular
/// `x` are distinct member keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Identifier {
    pub atom: Atom,
    pub local: bool,
}

impl Identifier {
    pub fn regular(atom: Atom) -> Self {
        Identifier { atom, local: false }
    }

    pub fn local(atom: Atom) -> Self {
        Identifier { atom, local: true }
    }
}

/// Single-threaded string interner.
#[derive(Debug, Default)]
pub struct Interner {
    map: FxHashMap<Box<str>, Atom>,
    strings: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Interner::default()
    }

    pub fn intern(&mut self, text: &str) -> Atom {
        if let Some(&atom) = self.map.get(text) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, atom);
        atom
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Thread-safe interner shared between the registry, the type store, and
/// any number of concurrent evaluations.
///
/// Lookups take the sharded read path; only the first interning of a new
/// string takes the append lock.
#[derive(Debug, Default)]
pub struct ShardedInterner {
    map: DashMap<Box<str>, Atom, rustc_hash::FxBuildHasher>,
    strings: RwLock<Vec<Box<str>>>,
}

impl ShardedInterner {
    pub fn new() -> Self {
        ShardedInterner::default()
    }

    pub fn intern(&self, text: &str) -> Atom {
        if let Some(atom) = self.map.get(text) {
            return *atom;
        }
        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        // Double-check under the write lock: another thread may have won.
        if let Some(atom) = self.map.get(text) {
            return *atom;
        }
        let atom = Atom(strings.len() as u32);
        let boxed: Box<str> = text.into();
        strings.push(boxed.clone());
        self.map.insert(boxed, atom);
        atom
    }

    /// Resolve an atom to an owned string.
    ///
    /// The sharded interner hands out owned strings rather than references
    /// so callers never hold the shard lock across evaluation steps.
    pub fn resolve(&self, atom: Atom) -> String {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings[atom.0 as usize].to_string()
    }

    /// Run `f` over the resolved text without allocating.
    pub fn with_resolved<R>(&self, atom: Atom, f: impl FnOnce(&str) -> R) -> R {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        f(&strings[atom.0 as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_dedupes() {
        let mut interner = Interner::new();
        let a = interner.intern("name");
        let b = interner.intern("name");
        let c = interner.intern("age");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "name");
        assert_eq!(interner.resolve(c), "age");
    }

    #[test]
    fn sharded_intern_dedupes() {
        let interner = ShardedInterner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn local_and_regular_identifiers_are_distinct() {
        let mut interner = Interner::new();
        let atom = interner.intern("x");
        assert_ne!(Identifier::regular(atom), Identifier::local(atom));
    }
}

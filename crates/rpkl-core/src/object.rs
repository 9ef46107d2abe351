//! Heap objects and the per-evaluation object arena.
//!
//! Objects form parent chains (the amendment chain) terminating at a class
//! prototype or a base dynamic. Chains and the class-to-prototype links are
//! cyclic in the large, so objects live in an append-only arena and refer to
//! each other by `ObjectId`.
//!
//! Per-object state:
//! - an insertion-ordered member table (`IndexMap`) from key to descriptor,
//! - a cache table holding each member's at-most-once evaluation result,
//! - the set of keys currently being evaluated, for cycle detection.

use crate::classes::ClassId;
use crate::member::{MemberDescriptor, MemberKey};
use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

/// Index of an object in the per-evaluation arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ObjectId(pub u32);

/// The four object variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// An instance of a named class.
    Typed(ClassId),
    /// Schema-free; may contain properties, elements, and entries.
    Dynamic,
    /// Ordered, integer-indexed elements.
    Listing,
    /// Key-value entries.
    Mapping,
}

#[derive(Debug)]
pub struct ObjectData {
    pub kind: ObjectKind,
    /// The value being amended; `None` only for prototype roots and base
    /// dynamics.
    pub parent: Option<ObjectId>,
    pub members: IndexMap<MemberKey, Rc<MemberDescriptor>>,
    /// Total element count, including elements inherited from the parent.
    pub element_count: u32,
    /// One-shot memoization of member evaluation results.
    pub cache: FxHashMap<MemberKey, Value>,
    /// Keys whose bodies are currently executing on this object.
    pub in_progress: FxHashSet<MemberKey>,
}

/// The per-evaluation object arena.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<ObjectData>,
    /// Lazily instantiated class prototypes.
    pub(crate) prototypes: FxHashMap<ClassId, ObjectId>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn alloc(
        &mut self,
        kind: ObjectKind,
        parent: Option<ObjectId>,
        members: IndexMap<MemberKey, Rc<MemberDescriptor>>,
        element_count: u32,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(ObjectData {
            kind,
            parent,
            members,
            element_count,
            cache: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> &ObjectData {
        &self.objects[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectData {
        &mut self.objects[id.0 as usize]
    }

    /// Walk the parent chain from `id` (inclusive) to the root.
    pub fn chain(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        std::iter::successors(Some(id), move |&cur| self.get(cur).parent)
    }

    /// Find `key` in `id` or its ancestors; returns the owning object and
    /// the descriptor.
    pub fn find_member(
        &self,
        id: ObjectId,
        key: &MemberKey,
    ) -> Option<(ObjectId, Rc<MemberDescriptor>)> {
        for obj in self.chain(id) {
            if let Some(desc) = self.get(obj).members.get(key) {
                return Some((obj, Rc::clone(desc)));
            }
        }
        None
    }

    /// Find `key` strictly above `below` in the chain of `id`. Used by
    /// nested amendment bodies that refine the inherited value.
    pub fn find_member_above(
        &self,
        id: ObjectId,
        below: ObjectId,
        key: &MemberKey,
    ) -> Option<(ObjectId, Rc<MemberDescriptor>)> {
        let mut past = false;
        for obj in self.chain(id) {
            if past {
                if let Some(desc) = self.get(obj).members.get(key) {
                    return Some((obj, Rc::clone(desc)));
                }
            } else if obj == below {
                past = true;
            }
        }
        None
    }

    /// All member keys visible on `id`, innermost definition first,
    /// deduplicated across the chain. Insertion order is preserved within
    /// each chain level.
    pub fn visible_keys(&self, id: ObjectId) -> Vec<MemberKey> {
        let mut seen = FxHashSet::default();
        let mut keys = Vec::new();
        for obj in self.chain(id) {
            for key in self.get(obj).members.keys() {
                if seen.insert(key.clone()) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

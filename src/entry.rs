// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use fnv::FnvHashSet as HashSet;

use crate::node::{EntryId, GcKind, Node};
use crate::quality::Quality;

///
/// The per-node runtime record stored as the weight of the node's slot in the
/// graph arena. It pairs the boxed domain node with the state the calculation
/// protocol needs: the invalidation counter, the calc flags, GC bookkeeping,
/// data quality, and the parent-tracking sets.
///
/// The `node` box is checked out (`Option::take`) while one of its hooks runs, so
/// that the hook can borrow the rest of the graph through a `Context` without
/// aliasing itself.
///
pub(crate) struct Entry<E: 'static> {
    pub(crate) id: String,
    pub(crate) kind: &'static str,
    pub(crate) node: Option<Box<dyn Node<E>>>,
    pub(crate) quality: Quality,

    /// The number of invalidation signals this entry has received this cycle and
    /// not yet matched with a validate signal. Zero between cycles. The counter is
    /// what makes diamond-shaped graphs calculate each node exactly once: the
    /// calculate body runs only on the transition back to zero, after every
    /// ancestor chain has delivered its validate.
    pub(crate) invalid_count: u32,

    /// True if the calculate body must run in the next (or current) cycle. An
    /// entry reached by invalidation with this flag false still passes the
    /// invalidate/validate protocol, but skips its calculate body.
    pub(crate) needs_calc: bool,

    /// True iff the calculate body ran in the most recent cycle. Cleared by the
    /// manager at the start of the following cycle.
    pub(crate) has_calculated: bool,

    pub(crate) gc_kind: GcKind,
    pub(crate) gc_refcount: u32,

    /// The parents that triggered this entry in the current cycle. Cleared at
    /// cycle end, except for late parents installed for the next cycle.
    pub(crate) updated_parents: HashSet<EntryId>,

    /// Parents which, when they update, force this entry to reset its
    /// dependencies before its own calculation.
    pub(crate) auto_rebuild_parents: HashSet<EntryId>,

    /// The children captured when this entry's counter transitioned 0 → 1. The
    /// live child set may change mid-cycle (shape changes during calculation);
    /// the protocol invalidates and validates exactly this snapshot.
    pub(crate) cycle_children: Vec<EntryId>,
}

impl<E: 'static> Entry<E> {
    pub(crate) fn new(id: String, kind: &'static str, node: Box<dyn Node<E>>) -> Entry<E> {
        Entry {
            id,
            kind,
            node: Some(node),
            quality: Quality::new(),
            invalid_count: 0,
            needs_calc: true,
            has_calculated: false,
            gc_kind: GcKind::Collectable,
            gc_refcount: 0,
            updated_parents: HashSet::default(),
            auto_rebuild_parents: HashSet::default(),
            cycle_children: Vec::new(),
        }
    }

    ///
    /// True if any parent that updated this cycle is registered for auto-rebuild.
    ///
    pub(crate) fn auto_rebuild_due(&self) -> bool {
        self.updated_parents
            .iter()
            .any(|parent| self.auto_rebuild_parents.contains(parent))
    }
}

impl<E: 'static> fmt::Debug for Entry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("quality", &self.quality)
            .field("invalid_count", &self.invalid_count)
            .field("needs_calc", &self.needs_calc)
            .field("has_calculated", &self.has_calculated)
            .field("gc_kind", &self.gc_kind)
            .field("gc_refcount", &self.gc_refcount)
            .finish()
    }
}

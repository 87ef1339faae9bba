// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::any::Any;

use fnv::FnvHashSet as HashSet;

use crate::node::{EntryId, Node, NodeKind, ParentOptions};
use crate::quality::Quality;
use crate::{GraphError, GraphManager};

///
/// The handle passed to node hooks, scoped to the one entry whose hook is running.
///
/// While a hook runs, the node's box is checked out of the arena, so the context
/// may borrow the whole manager without aliasing the node itself. Everything a
/// node may legitimately do mid-cycle goes through here: declaring and removing
/// parents, resetting dependencies, reading other nodes' state, observing which
/// parents triggered it, and reading or writing quality.
///
pub struct Context<'a, E: 'static> {
    graph: &'a mut GraphManager<E>,
    entry_id: EntryId,
}

impl<'a, E: 'static> Context<'a, E> {
    pub(crate) fn new(graph: &'a mut GraphManager<E>, entry_id: EntryId) -> Context<'a, E> {
        Context { graph, entry_id }
    }

    ///
    /// The id of the entry this context is scoped to.
    ///
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    ///
    /// The application-defined environment shared by every node in the graph.
    ///
    pub fn environment(&self) -> &E {
        &self.graph.environment
    }

    ///
    /// Resolves (or creates) the node for the given kind and seed, and links it as
    /// a parent of this node.
    ///
    pub fn add_parent_node<K: NodeKind<E>>(
        &mut self,
        seed: K::Seed,
    ) -> Result<EntryId, GraphError> {
        self.add_parent_node_with::<K>(seed, ParentOptions::default())
    }

    ///
    /// As `add_parent_node`, but with options. Requesting `auto_rebuild` registers
    /// the parent such that this node resets its dependencies whenever the parent
    /// updates.
    ///
    pub fn add_parent_node_with<K: NodeKind<E>>(
        &mut self,
        seed: K::Seed,
        options: ParentOptions,
    ) -> Result<EntryId, GraphError> {
        let parent = self
            .graph
            .get_or_create::<K>(crate::node::GcKind::Collectable, seed)?;
        self.add_parent(parent);
        if options.auto_rebuild {
            self.graph
                .unsafe_entry_for_id_mut(self.entry_id)
                .auto_rebuild_parents
                .insert(parent);
        }
        Ok(parent)
    }

    ///
    /// Links an existing entry as a parent of this node. Idempotent: at most one
    /// edge exists between any pair.
    ///
    pub fn add_parent(&mut self, parent: EntryId) {
        self.graph.add_link(self.entry_id, parent);
    }

    ///
    /// Unlinks a parent. A no-op if the entry is not currently a parent. Breaking
    /// a link latches the manager's GC flag.
    ///
    pub fn remove_parent(&mut self, parent: EntryId) {
        self.graph.remove_link(self.entry_id, parent);
    }

    ///
    /// Unlinks every parent of this node.
    ///
    pub fn remove_parents(&mut self) {
        self.graph.remove_all_parents(self.entry_id);
    }

    ///
    /// Rebuilds this node's dependencies from scratch: clears the auto-rebuild
    /// registrations, removes all parents, and re-runs the node's
    /// `set_dependencies`. Parents that are new relative to the previous set are
    /// reported to the manager, which uses them to detect late parents when the
    /// graph changes shape mid-cycle.
    ///
    pub fn reset_dependencies<N>(&mut self, node: &mut N) -> Result<(), GraphError>
    where
        N: Node<E> + ?Sized,
    {
        let entry_id = self.entry_id;
        self.graph
            .unsafe_entry_for_id_mut(entry_id)
            .auto_rebuild_parents
            .clear();

        let parents_before: HashSet<EntryId> = self.graph.parents(entry_id).collect();
        self.graph.remove_all_parents(entry_id);
        node.set_dependencies(self)?;

        let new_parents: Vec<EntryId> = self
            .graph
            .parents(entry_id)
            .filter(|parent| !parents_before.contains(parent))
            .collect();
        self.graph.parents_updated(entry_id, &new_parents);
        Ok(())
    }

    ///
    /// True if any parent that updated this cycle is registered for auto-rebuild.
    /// The default `pre_calculate` resets dependencies when this holds.
    ///
    pub fn auto_rebuild_due(&self) -> bool {
        self.graph.unsafe_entry_for_id(self.entry_id).auto_rebuild_due()
    }

    ///
    /// True if the given entry is one of the parents that triggered this node in
    /// the current cycle (including a late parent carried over from the previous
    /// cycle).
    ///
    pub fn parent_updated(&self, parent: EntryId) -> bool {
        self.graph
            .unsafe_entry_for_id(self.entry_id)
            .updated_parents
            .contains(&parent)
    }

    ///
    /// A typed view of another node's state. Returns `None` if the entry is gone
    /// or holds a different node type. Calculate bodies use this to read the
    /// parent data their output derives from.
    ///
    pub fn node<T: Node<E>>(&self, entry_id: EntryId) -> Option<&T> {
        self.graph.node::<T>(entry_id)
    }

    ///
    /// This node's current quality. During `calculate` this is the value produced
    /// by `calculate_quality` earlier in the same cycle.
    ///
    pub fn quality(&self) -> &Quality {
        &self.graph.unsafe_entry_for_id(self.entry_id).quality
    }

    pub fn quality_of(&self, entry_id: EntryId) -> Option<&Quality> {
        self.graph.quality(entry_id)
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.graph.unsafe_entry_for_id_mut(self.entry_id).quality = quality;
    }

    pub fn set_quality_bad(&mut self, description: &str) {
        self.graph
            .unsafe_entry_for_id_mut(self.entry_id)
            .quality
            .set_to_bad(description);
    }

    ///
    /// Merges the given entry's quality into this node's.
    ///
    pub fn merge_quality_of(&mut self, parent: EntryId) {
        let Some(parent_quality) = self.graph.quality(parent).cloned() else {
            return;
        };
        self.graph
            .unsafe_entry_for_id_mut(self.entry_id)
            .quality
            .merge(&parent_quality);
    }

    ///
    /// The default quality computation: clear to Good, then merge every parent's
    /// quality.
    ///
    pub fn merge_parent_quality(&mut self) {
        let parents: Vec<EntryId> = self.graph.parents(self.entry_id).collect();
        let mut quality = Quality::good();
        for parent in parents {
            if let Some(parent_quality) = self.graph.quality(parent) {
                quality.merge(parent_quality);
            }
        }
        self.graph.unsafe_entry_for_id_mut(self.entry_id).quality = quality;
    }
}

///
/// Downcast helper shared by the typed accessors on `Context` and `GraphManager`.
///
pub(crate) fn downcast_node<E: 'static, T: Node<E>>(node: &dyn Node<E>) -> Option<&T> {
    let node: &dyn Any = node;
    node.downcast_ref::<T>()
}

pub(crate) fn downcast_node_mut<E: 'static, T: Node<E>>(
    node: &mut dyn Node<E>,
) -> Option<&mut T> {
    let node: &mut dyn Any = node;
    node.downcast_mut::<T>()
}

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

mod context;
mod entry;
pub mod factory;
mod info;
mod node;
mod quality;

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::path::Path;

use fixedbitset::FixedBitSet;
use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use indexmap::IndexSet;
use log::debug;
use petgraph::dot;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, VisitMap, Visitable};
use petgraph::Direction;

use crate::entry::Entry;

pub use crate::context::Context;
pub use crate::info::NodeInfo;
pub use crate::node::{CalculateChildren, EntryId, GcKind, Node, NodeKind, ParentOptions};
pub use crate::quality::{Quality, QualityLevel};

// Edges point from a child to the parents its value is derived from, so walking
// `Direction::Outgoing` visits parents and `Direction::Incoming` visits children.
type PGraph<E> = StableDiGraph<Entry<E>, (), u32>;

///
/// Failures surfaced by the engine.
///
/// The first three are user-contract violations and are returned before any state
/// is mutated. `InvariantBroken` indicates a bug in the engine itself: a graph
/// that produced one should not be reused. `Domain` carries errors raised by node
/// hooks; the engine never catches them, so they propagate out of `calculate`
/// leaving the cycle partially processed.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GraphError {
    DuplicateId(String),
    MissingNode(String),
    RefCountUnderflow(String),
    InvariantBroken(String),
    Domain(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicateId(id) => write!(f, "GraphNode {id} already exists"),
            GraphError::MissingNode(id) => write!(f, "No such graph node {id}"),
            GraphError::RefCountUnderflow(id) => {
                write!(f, "GraphNode {id} released with a zero GC refcount")
            }
            GraphError::InvariantBroken(msg) => write!(f, "Graph invariant broken: {msg}"),
            GraphError::Domain(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GraphError {}

///
/// A DAG of calculation nodes, recalculated incrementally one cycle at a time.
///
/// The manager owns every node: nodes live as entries in an arena, keyed
/// externally by string id and internally by `EntryId`. Marking a node via
/// `needs_calculation` schedules it for the next `calculate` cycle, which reruns
/// exactly the affected descendants, each at most once, parents before children.
/// After each cycle, nodes no longer reachable from a pinned node are reaped.
///
/// The manager is single-threaded: one graph is owned by one logical executor,
/// and hooks run to completion synchronously inside `calculate`. Re-entrant
/// calculation is impossible by construction (`calculate` takes `&mut self` and
/// the hook-facing `Context` does not expose it).
///
pub struct GraphManager<E: 'static> {
    environment: E,
    nodes: HashMap<String, EntryId>,
    pg: PGraph<E>,

    /// GC roots: ids of every entry whose `gc_kind` is `Pinned`.
    pinned: IndexSet<EntryId>,
    /// Entries marked for (re)calculation since the previous cycle, in marking
    /// order. The invalidate and validate root loops iterate this order.
    changed: IndexSet<EntryId>,
    /// Ids added since the previous cycle whose `set_dependencies` has not run.
    new_ids: IndexSet<String>,
    /// parent -> children that added it as a new parent during the current cycle.
    new_parents_this_cycle: HashMap<EntryId, HashSet<EntryId>>,
    /// The subset of `new_parents_this_cycle` that calculated after being added:
    /// their children saw stale data and are re-marked for the next cycle.
    late_parents: HashMap<EntryId, HashSet<EntryId>>,
    /// Entries holding a non-empty `updated_parents` set, cleared at cycle end.
    dirty_updated_parents: HashSet<EntryId>,
    /// Entries whose `has_calculated` flag was set by the most recent cycle.
    recently_calculated: Vec<EntryId>,
    gc_required: bool,
    calculating: bool,
}

impl<E: 'static> GraphManager<E> {
    pub fn new(environment: E) -> GraphManager<E> {
        GraphManager {
            environment,
            nodes: HashMap::default(),
            pg: PGraph::default(),
            pinned: IndexSet::new(),
            changed: IndexSet::new(),
            new_ids: IndexSet::new(),
            new_parents_this_cycle: HashMap::default(),
            late_parents: HashMap::default(),
            dirty_updated_parents: HashSet::default(),
            recently_calculated: Vec::new(),
            gc_required: false,
            calculating: false,
        }
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    ///
    /// Registers a fresh node under the given id. The node is marked for
    /// calculation, and its `set_dependencies` will run at the start of the next
    /// cycle. Prefer `factory::get_node`, which derives the id from the node kind
    /// and de-duplicates.
    ///
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: &'static str,
        node: Box<dyn Node<E>>,
    ) -> Result<EntryId, GraphError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        test_trace_log!("Adding node {}", id);
        let entry_id = self.pg.add_node(Entry::new(id.clone(), kind, node));
        self.nodes.insert(id.clone(), entry_id);
        self.needs_calculation(entry_id);
        self.new_ids.insert(id);
        Ok(entry_id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn find_node(&self, id: &str) -> Option<EntryId> {
        self.nodes.get(id).copied()
    }

    pub fn get_node(&self, id: &str) -> Result<EntryId, GraphError> {
        self.find_node(id)
            .ok_or_else(|| GraphError::MissingNode(id.to_owned()))
    }

    ///
    /// Marks the entry for (re)calculation in the next cycle.
    ///
    pub fn needs_calculation(&mut self, entry_id: EntryId) {
        let Some(entry) = self.entry_for_id_mut(entry_id) else {
            test_trace_log!("Ignoring needs_calculation for reaped entry {:?}", entry_id);
            return;
        };
        entry.needs_calc = true;
        self.changed.insert(entry_id);
    }

    ///
    /// Drops one external reference to a pinned node. When the last reference is
    /// released the node becomes collectable and a GC sweep is scheduled for the
    /// end of the next cycle. Releasing an entry that is no longer in the graph is
    /// a no-op.
    ///
    pub fn release_node(&mut self, entry_id: EntryId) -> Result<(), GraphError> {
        let became_collectable = {
            let Some(entry) = self.entry_for_id_mut(entry_id) else {
                return Ok(());
            };
            if entry.gc_refcount == 0 {
                return Err(GraphError::RefCountUnderflow(entry.id.clone()));
            }
            entry.gc_refcount -= 1;
            if entry.gc_refcount == 0 {
                entry.gc_kind = GcKind::Collectable;
                true
            } else {
                false
            }
        };
        if became_collectable {
            self.update_gc_info(entry_id);
            self.gc_required = true;
        }
        Ok(())
    }

    ///
    /// Runs one calculation cycle:
    ///
    /// 1. Clear the previous cycle's `has_calculated` flags.
    /// 2. Run `set_dependencies` on nodes added since the last cycle, to a fixed
    ///    point (setting dependencies may create further new nodes).
    /// 3. Invalidate from every dirty root, counting signals per entry.
    /// 4. Validate from the same roots; an entry calculates when its counter
    ///    returns to zero, i.e. after every ancestor chain has delivered.
    /// 5. Clear the updated-parent sets.
    /// 6. Install late parents: children that added a parent which calculated
    ///    after them this cycle are re-marked for the next cycle.
    /// 7. Sweep unreachable nodes if any link was broken.
    ///
    pub fn calculate(&mut self) -> Result<(), GraphError> {
        self.calculating = true;
        let result = self.run_cycle();
        self.calculating = false;
        result
    }

    fn run_cycle(&mut self) -> Result<(), GraphError> {
        for entry_id in mem::take(&mut self.recently_calculated) {
            if let Some(entry) = self.entry_for_id_mut(entry_id) {
                entry.has_calculated = false;
            }
        }

        self.set_dependencies_on_new_nodes()?;

        if !self.changed.is_empty() {
            // Snapshot the dirty roots: calculation may mark further nodes, which
            // belong to the next cycle.
            let changed: Vec<EntryId> = self.changed.drain(..).collect();
            for &entry_id in &changed {
                self.invalidate_entry(entry_id, None);
            }
            for &entry_id in &changed {
                self.validate_entry(entry_id)?;
            }
        }

        self.clear_updated_parents();
        self.new_parents_this_cycle.clear();
        self.mark_nodes_with_late_parents();
        self.perform_gc()?;
        Ok(())
    }

    ///
    /// Calls `set_dependencies` on every node added since the last cycle. The new
    /// id collection is treated as a worklist: setting dependencies may add nodes
    /// re-entrantly, so we drain until stable.
    ///
    fn set_dependencies_on_new_nodes(&mut self) -> Result<(), GraphError> {
        while !self.new_ids.is_empty() {
            let ids: Vec<String> = self.new_ids.drain(..).collect();
            for id in ids {
                // The node may have been added and reaped before this cycle ran.
                let Some(&entry_id) = self.nodes.get(&id) else {
                    continue;
                };
                let mut node = self.checkout_node(entry_id)?;
                let result = {
                    let mut context = Context::new(self, entry_id);
                    node.set_dependencies(&mut context)
                };
                self.unsafe_entry_for_id_mut(entry_id).node = Some(node);
                result?;
            }
        }
        Ok(())
    }

    ///
    /// Delivers one invalidation signal to the entry. On the 0 → 1 transition the
    /// entry's current children are snapshotted for this cycle and each receives
    /// its own signal recursively; on later signals the counter alone is bumped,
    /// which is what makes diamonds converge to exactly one calculation.
    ///
    fn invalidate_entry(&mut self, entry_id: EntryId, parent: Option<EntryId>) {
        let went_invalid = {
            let Some(entry) = self.entry_for_id_mut(entry_id) else {
                return;
            };
            if let Some(parent) = parent {
                entry.updated_parents.insert(parent);
            }
            entry.invalid_count += 1;
            entry.invalid_count == 1
        };
        if parent.is_some() {
            self.dirty_updated_parents.insert(entry_id);
        }
        if went_invalid {
            let children: Vec<EntryId> = self
                .pg
                .neighbors_directed(entry_id, Direction::Incoming)
                .collect();
            self.unsafe_entry_for_id_mut(entry_id).cycle_children = children.clone();
            for child in children {
                self.invalidate_entry(child, Some(entry_id));
            }
        }
    }

    ///
    /// Delivers one validate signal. When the counter returns to zero every
    /// ancestor chain has calculated, so the entry runs its own calculation (if it
    /// needs one) and then validates the children captured at invalidate time,
    /// forcing their calculation first if this entry's output changed.
    ///
    fn validate_entry(&mut self, entry_id: EntryId) -> Result<(), GraphError> {
        let entry = self.unsafe_entry_for_id_mut(entry_id);
        if entry.invalid_count == 0 {
            return Err(GraphError::InvariantBroken(format!(
                "{}: validated with a non-positive invalidation count",
                entry.id
            )));
        }
        entry.invalid_count -= 1;
        if entry.invalid_count > 0 {
            return Ok(());
        }

        let mut calculate_children = CalculateChildren::DoNotCalculate;
        if entry.needs_calc {
            test_trace_log!("Calculating {}", entry.id);
            let mut node = self.checkout_node(entry_id)?;
            let result = self.run_calculation(entry_id, node.as_mut());
            self.unsafe_entry_for_id_mut(entry_id).node = Some(node);
            calculate_children = result?;

            let entry = self.unsafe_entry_for_id_mut(entry_id);
            entry.needs_calc = false;
            entry.has_calculated = true;
            self.recently_calculated.push(entry_id);
            self.node_calculated(entry_id);
        }

        let children = self.unsafe_entry_for_id(entry_id).cycle_children.clone();
        for child in children {
            if calculate_children == CalculateChildren::Calculate {
                if let Some(child_entry) = self.entry_for_id_mut(child) {
                    child_entry.needs_calc = true;
                }
            }
            self.validate_entry(child)?;
        }
        Ok(())
    }

    fn run_calculation(
        &mut self,
        entry_id: EntryId,
        node: &mut dyn Node<E>,
    ) -> Result<CalculateChildren, GraphError> {
        let mut context = Context::new(self, entry_id);
        node.pre_calculate(&mut context)?;
        node.calculate_quality(&mut context)?;
        node.calculate(&mut context)
    }

    fn checkout_node(&mut self, entry_id: EntryId) -> Result<Box<dyn Node<E>>, GraphError> {
        let entry = self.unsafe_entry_for_id_mut(entry_id);
        entry.node.take().ok_or_else(|| {
            GraphError::InvariantBroken(format!("{}: node is already checked out", entry.id))
        })
    }

    ///
    /// Called by `Context::reset_dependencies` with the parents that are new
    /// relative to the pre-reset set. Recorded only mid-cycle: shape changes made
    /// outside `calculate` need no reconciliation because nothing has calculated
    /// against them yet.
    ///
    pub(crate) fn parents_updated(&mut self, child: EntryId, new_parents: &[EntryId]) {
        if !self.calculating {
            return;
        }
        for &parent in new_parents {
            self.new_parents_this_cycle
                .entry(parent)
                .or_default()
                .insert(child);
        }
    }

    ///
    /// Called when an entry finishes calculating. If the entry was added as a new
    /// parent earlier this same cycle, the children that added it were validated
    /// against its stale value: record them for reconsideration next cycle.
    ///
    fn node_calculated(&mut self, entry_id: EntryId) {
        if let Some(children) = self.new_parents_this_cycle.get(&entry_id) {
            self.late_parents.insert(entry_id, children.clone());
        }
    }

    fn clear_updated_parents(&mut self) {
        for entry_id in mem::take(&mut self.dirty_updated_parents) {
            if let Some(entry) = self.entry_for_id_mut(entry_id) {
                entry.updated_parents.clear();
            }
        }
    }

    ///
    /// Marks every child recorded under a late parent for calculation in the next
    /// cycle, with the late parent visible in the child's updated-parent set so
    /// that `parent_updated` observes which parent triggered it.
    ///
    fn mark_nodes_with_late_parents(&mut self) {
        for (parent, children) in mem::take(&mut self.late_parents) {
            for child in children {
                test_trace_log!(
                    "Re-marking {:?} for its late parent {:?}",
                    child,
                    parent
                );
                self.needs_calculation(child);
                let marked = match self.entry_for_id_mut(child) {
                    Some(entry) => {
                        entry.updated_parents.insert(parent);
                        true
                    }
                    None => false,
                };
                if marked {
                    self.dirty_updated_parents.insert(child);
                }
            }
        }
    }

    ///
    /// Reaps every node that is not an ancestor of (or itself) a pinned node.
    ///
    /// The latch is cleared before sweeping so that edges severed by node cleanup
    /// correctly schedule a sweep for the next cycle. An error from a dispose hook
    /// aborts the sweep and propagates out of `calculate`, leaving the graph in
    /// the partially-swept state; callers must not reuse it.
    ///
    fn perform_gc(&mut self) -> Result<(), GraphError> {
        if !self.gc_required {
            return Ok(());
        }
        self.gc_required = false;

        let roots: VecDeque<EntryId> = self.pinned.iter().cloned().collect();
        let live: HashSet<EntryId> = self.walk(roots, Direction::Outgoing).collect();
        let doomed: Vec<EntryId> = self
            .pg
            .node_indices()
            .filter(|entry_id| !live.contains(entry_id))
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        debug!("Reaping {} unreachable nodes", doomed.len());
        for entry_id in doomed {
            self.dispose_and_remove_node(entry_id)?;
        }
        Ok(())
    }

    fn dispose_and_remove_node(&mut self, entry_id: EntryId) -> Result<(), GraphError> {
        let Some(entry) = self.entry_for_id(entry_id) else {
            return Ok(());
        };
        let id = entry.id.clone();
        test_trace_log!("Reaping {}", id);
        self.cleanup_node(entry_id)?;
        self.nodes.remove(&id);
        self.changed.shift_remove(&entry_id);
        self.pinned.shift_remove(&entry_id);
        self.dirty_updated_parents.remove(&entry_id);
        self.pg.remove_node(entry_id);
        Ok(())
    }

    ///
    /// Severs the entry's links on both sides and runs its dispose hook.
    ///
    fn cleanup_node(&mut self, entry_id: EntryId) -> Result<(), GraphError> {
        self.remove_all_parents(entry_id);
        self.remove_all_children(entry_id);
        if let Some(mut node) = self.unsafe_entry_for_id_mut(entry_id).node.take() {
            node.dispose(&self.environment)?;
        }
        Ok(())
    }

    ///
    /// Cleans up every node and empties all graph state. The first dispose-hook
    /// error aborts the teardown; a graph that returned one is compromised and
    /// must not be reused.
    ///
    pub fn dispose(&mut self) -> Result<(), GraphError> {
        let ids: Vec<EntryId> = self.pg.node_indices().collect();
        for entry_id in ids {
            self.cleanup_node(entry_id)?;
        }
        self.nodes.clear();
        self.pinned.clear();
        self.changed.clear();
        self.new_ids.clear();
        self.new_parents_this_cycle.clear();
        self.late_parents.clear();
        self.dirty_updated_parents.clear();
        self.recently_calculated.clear();
        self.pg.clear();
        self.gc_required = false;
        Ok(())
    }

    ///
    /// A read-only snapshot of every node, for logging or rendering the graph.
    ///
    pub fn dump(&self) -> Vec<NodeInfo> {
        self.pg
            .node_indices()
            .map(|entry_id| {
                let entry = self.unsafe_entry_for_id(entry_id);
                NodeInfo {
                    id: entry.id.clone(),
                    kind: entry.kind.to_owned(),
                    quality: entry.quality.clone(),
                    message: entry
                        .node
                        .as_deref()
                        .map(|node| node.info_message())
                        .unwrap_or_default(),
                    parent_ids: self
                        .parents(entry_id)
                        .filter_map(|parent| self.entry_for_id(parent))
                        .map(|parent| parent.id.clone())
                        .collect::<BTreeSet<String>>(),
                }
            })
            .collect()
    }

    ///
    /// Writes the graph in GraphViz DOT format.
    ///
    pub fn visualize(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut f = BufWriter::new(file);

        let graph = self.pg.filter_map(
            |_, entry| Some(format!("{} [{}]", entry.id, entry.quality)),
            |_, _| Some("".to_owned()),
        );

        f.write_all(
            format!(
                "{}",
                dot::Dot::with_config(&graph, &[dot::Config::EdgeNoLabel])
            )
            .as_bytes(),
        )?;

        Ok(())
    }

    ///
    /// A typed view of a node's domain state. Returns `None` if the entry is gone
    /// or holds a different node type.
    ///
    pub fn node<T: Node<E>>(&self, entry_id: EntryId) -> Option<&T> {
        let entry = self.entry_for_id(entry_id)?;
        context::downcast_node::<E, T>(entry.node.as_deref()?)
    }

    pub fn node_mut<T: Node<E>>(&mut self, entry_id: EntryId) -> Option<&mut T> {
        let entry = self.entry_for_id_mut(entry_id)?;
        context::downcast_node_mut::<E, T>(entry.node.as_deref_mut()?)
    }

    ///
    /// Mutates a node's domain state and marks it for recalculation: the idiom for
    /// feeding external data changes into the graph.
    ///
    pub fn update<T: Node<E>, F: FnOnce(&mut T)>(
        &mut self,
        entry_id: EntryId,
        f: F,
    ) -> Result<(), GraphError> {
        let node = self
            .node_mut::<T>(entry_id)
            .ok_or_else(|| GraphError::MissingNode(format!("{entry_id:?}")))?;
        f(node);
        self.needs_calculation(entry_id);
        Ok(())
    }

    pub fn quality(&self, entry_id: EntryId) -> Option<&Quality> {
        self.entry_for_id(entry_id).map(|entry| &entry.quality)
    }

    ///
    /// True iff the entry's calculate body ran in the most recent cycle.
    ///
    pub fn has_calculated(&self, entry_id: EntryId) -> bool {
        self.entry_for_id(entry_id)
            .map(|entry| entry.has_calculated)
            .unwrap_or(false)
    }

    pub(crate) fn get_or_create<K: NodeKind<E>>(
        &mut self,
        gc_kind: GcKind,
        seed: K::Seed,
    ) -> Result<EntryId, GraphError> {
        let id = format!("{}.{}", K::type_tag(), K::make_id(&seed));
        let entry_id = match self.nodes.get(&id) {
            Some(&entry_id) => entry_id,
            None => self.add_node(id, K::type_tag(), Box::new(K::build(seed)))?,
        };
        if gc_kind == GcKind::Pinned {
            let entry = self.unsafe_entry_for_id_mut(entry_id);
            entry.gc_refcount += 1;
            entry.gc_kind = GcKind::Pinned;
            self.update_gc_info(entry_id);
        }
        Ok(entry_id)
    }

    ///
    /// Keeps the pinned root set in sync with the entry's GC class.
    ///
    fn update_gc_info(&mut self, entry_id: EntryId) {
        if self.unsafe_entry_for_id(entry_id).gc_kind == GcKind::Pinned {
            self.pinned.insert(entry_id);
        } else {
            self.pinned.shift_remove(&entry_id);
        }
    }

    pub(crate) fn parents(&self, entry_id: EntryId) -> impl Iterator<Item = EntryId> + '_ {
        self.pg.neighbors_directed(entry_id, Direction::Outgoing)
    }

    ///
    /// Links `child` to `parent`, idempotently.
    ///
    pub(crate) fn add_link(&mut self, child: EntryId, parent: EntryId) {
        if self.pg.contains_node(child) && self.pg.contains_node(parent) {
            self.pg.update_edge(child, parent, ());
        }
    }

    pub(crate) fn remove_link(&mut self, child: EntryId, parent: EntryId) {
        if let Some(edge) = self.pg.find_edge(child, parent) {
            self.pg.remove_edge(edge);
            // Removing a link may leave unreferenced ancestors.
            self.gc_required = true;
        }
    }

    pub(crate) fn remove_all_parents(&mut self, child: EntryId) {
        let edges: Vec<_> = self
            .pg
            .edges_directed(child, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.pg.remove_edge(edge);
        }
        self.gc_required = true;
    }

    fn remove_all_children(&mut self, parent: EntryId) {
        let edges: Vec<_> = self
            .pg
            .edges_directed(parent, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();
        for edge in edges {
            self.pg.remove_edge(edge);
        }
    }

    pub(crate) fn entry_for_id(&self, entry_id: EntryId) -> Option<&Entry<E>> {
        self.pg.node_weight(entry_id)
    }

    pub(crate) fn entry_for_id_mut(&mut self, entry_id: EntryId) -> Option<&mut Entry<E>> {
        self.pg.node_weight_mut(entry_id)
    }

    pub(crate) fn unsafe_entry_for_id(&self, entry_id: EntryId) -> &Entry<E> {
        self.pg
            .node_weight(entry_id)
            .expect("entry ids held by the engine mid-cycle are always live")
    }

    pub(crate) fn unsafe_entry_for_id_mut(&mut self, entry_id: EntryId) -> &mut Entry<E> {
        self.pg
            .node_weight_mut(entry_id)
            .expect("entry ids held by the engine mid-cycle are always live")
    }

    fn walk(&self, roots: VecDeque<EntryId>, direction: Direction) -> Walk<'_, E> {
        Walk {
            graph: self,
            direction: direction,
            deque: roots,
            walked: self.pg.visit_map(),
        }
    }
}

///
/// Represents the state of a particular walk through a Graph. Implements Iterator
/// and has the same lifetime as the Graph itself. The walk visits all nodes
/// reachable from the roots in the direction of traversal, but not necessarily in
/// topological order.
///
struct Walk<'a, E: 'static> {
    graph: &'a GraphManager<E>,
    direction: Direction,
    deque: VecDeque<EntryId>,
    walked: FixedBitSet,
}

impl<'a, E: 'static> Iterator for Walk<'a, E> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.deque.pop_front() {
            // Visit this node and its neighbors only on first encounter: the
            // visit-map test is what makes the ancestor walk terminate on shared
            // (diamond) ancestry.
            if !self.walked.visit(id) {
                continue;
            }

            self.deque
                .extend(self.graph.pg.neighbors_directed(id, self.direction));
            return Some(id);
        }

        None
    }
}

///
/// Logs at trace level, but only in `cfg(test)`.
///
#[macro_export]
macro_rules! test_trace_log {
    ($($arg:tt)+) => {
      #[cfg(test)]
      {
        log::trace!($($arg)+)
      }
    };
}

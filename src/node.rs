// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::any::{self, Any};

use petgraph::stable_graph;

use crate::context::Context;
use crate::GraphError;

// 2^32 Nodes ought to be more than enough for anyone!
pub type EntryId = stable_graph::NodeIndex<u32>;

///
/// Returned by `Node::calculate` to indicate whether the node's output changed:
/// `Calculate` forces every child to run its own calculate body this cycle, while
/// `DoNotCalculate` lets children that are otherwise clean skip theirs (they still
/// participate in the invalidate/validate protocol so that ordering is preserved
/// for their descendants).
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CalculateChildren {
    Calculate,
    DoNotCalculate,
}

///
/// The garbage-collection class of a node. `Pinned` nodes are GC roots: they and
/// their transitive parents survive collection. `Collectable` nodes are reaped as
/// soon as no pinned node depends on them.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GcKind {
    Collectable,
    Pinned,
}

///
/// Options for a parent declared via `Context::add_parent_node_with`.
///
/// `auto_rebuild` marks the parent such that whenever it updates, the declaring
/// node resets its dependencies before its own calculation. This is how a node
/// switches which upstream calculation it consumes based on data values.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ParentOptions {
    pub auto_rebuild: bool,
}

///
/// The behavior of one node in the graph, dispatched dynamically by the manager.
///
/// Implementations hold their own domain state (the node's output value lives in
/// the implementing struct); the engine-owned state (invalidation counter, flags,
/// quality, edges) lives in the entry that wraps the node. Hooks receive a
/// `Context` scoped to the node's entry through which they declare parents, read
/// other nodes, and touch quality.
///
/// A node's `calculate` must be idempotent relative to its inputs and must not
/// observe child state.
///
/// `E` is the application-defined environment type: opaque to the engine, shared
/// by every node in a graph.
///
pub trait Node<E: 'static>: Any {
    ///
    /// Declares parents via `Context::add_parent_node`. The default is a leaf with
    /// no dependencies.
    ///
    /// Called once for every node added since the previous cycle, before the
    /// invalidate phase; also re-run by `reset_dependencies`. May create further
    /// new nodes; the manager drains the resulting worklist to a fixed point.
    ///
    fn set_dependencies(&mut self, _context: &mut Context<'_, E>) -> Result<(), GraphError> {
        Ok(())
    }

    ///
    /// Called just before calculation. The default checks whether any parent that
    /// updated this cycle is flagged auto-rebuild, and if so resets dependencies.
    /// Override for custom pre-calculation work, and call back into
    /// `Context::reset_dependencies` if the auto-rebuild behavior is still wanted.
    ///
    fn pre_calculate(&mut self, context: &mut Context<'_, E>) -> Result<(), GraphError> {
        if context.auto_rebuild_due() {
            context.reset_dependencies(self)?;
        }
        Ok(())
    }

    ///
    /// Called after `pre_calculate` and before `calculate`. The default clears the
    /// node's quality to Good and merges in every parent's quality. Override to
    /// merge manually (e.g. a chooser that reflects only its selected parent).
    ///
    fn calculate_quality(&mut self, context: &mut Context<'_, E>) -> Result<(), GraphError> {
        context.merge_parent_quality();
        Ok(())
    }

    ///
    /// Produces the node's value. Runs at most once per cycle, and only after every
    /// parent the node had at invalidate time has itself calculated.
    ///
    fn calculate(
        &mut self,
        _context: &mut Context<'_, E>,
    ) -> Result<CalculateChildren, GraphError> {
        Ok(CalculateChildren::Calculate)
    }

    ///
    /// Releases non-graph resources. Runs when the node is reaped by the collector
    /// or when the graph is disposed. An error propagates out of the reaping
    /// `calculate` (or out of `GraphManager::dispose`) like any other hook error.
    ///
    fn dispose(&mut self, _environment: &E) -> Result<(), GraphError> {
        Ok(())
    }

    ///
    /// A human-readable note included in `GraphManager::dump` output.
    ///
    fn info_message(&self) -> String {
        String::new()
    }
}

///
/// The identity half of a node type: how the factory names and constructs it.
///
/// Two `get_node` requests with the same `(type_tag, make_id(seed))` resolve to the
/// same node. The seed is a strongly-typed value rather than a stringly-typed
/// argument list; the id string it maps to is an implementation detail of
/// de-duplication and need not be human-readable.
///
pub trait NodeKind<E: 'static>: Node<E> + Sized {
    ///
    /// The identity parameters of this node kind.
    ///
    type Seed;

    ///
    /// The stable type tag used as the id prefix. Defaults to the short type name;
    /// override in the rare cases where that is unsuitable (e.g. mocking one node
    /// kind with another).
    ///
    fn type_tag() -> &'static str {
        let name = any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }

    ///
    /// Builds the identity suffix of the node id from the seed.
    ///
    fn make_id(seed: &Self::Seed) -> String;

    ///
    /// Constructs the node for the given seed. Dependencies are not declared here:
    /// the manager calls `set_dependencies` before the node's first calculation.
    ///
    fn build(seed: Self::Seed) -> Self;
}

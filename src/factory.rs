// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Identity-based de-duplication of nodes.
//!
//! Nodes are requested by `(kind, seed)`. The first request constructs the node
//! and registers it with the manager; subsequent requests with the same identity
//! return the existing node. Requesting with `GcKind::Pinned` additionally takes a
//! GC reference on the node: pinned nodes are collection roots until every
//! reference is dropped via `GraphManager::release_node`.

use crate::node::{EntryId, GcKind, NodeKind};
use crate::{GraphError, GraphManager};

///
/// Finds or creates the node identified by `K::type_tag()` plus `K::make_id(&seed)`.
///
/// Each `Pinned` request increments the node's GC refcount, so pin requests stack:
/// a node pinned twice survives one `release_node`.
///
pub fn get_node<K, E>(
    graph: &mut GraphManager<E>,
    gc_kind: GcKind,
    seed: K::Seed,
) -> Result<EntryId, GraphError>
where
    K: NodeKind<E>,
    E: 'static,
{
    graph.get_or_create::<K>(gc_kind, seed)
}

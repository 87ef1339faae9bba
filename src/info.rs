// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeSet;

use crate::quality::Quality;

///
/// A read-only snapshot of one node, as produced by `GraphManager::dump`. The set
/// of records reflects the graph state immediately after the most recently
/// completed calculation cycle.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeInfo {
    pub id: String,
    pub kind: String,
    pub quality: Quality,
    pub message: String,
    pub parent_ids: BTreeSet<String>,
}

// Copyright 2024 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeSet;
use std::fmt;

///
/// The health of the data held by one node.
///
/// `Bad` is absorbing under `merge`: once any contributing node is `Bad`, the merged
/// result is `Bad`. `Good` with no descriptions is the merge identity.
///
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QualityLevel {
    Good,
    Bad,
}

///
/// A propagatable data-quality value: a level plus a set of human-readable
/// descriptions explaining it.
///
/// Quality flows along graph edges with the data: the default `calculate_quality`
/// hook clears a node's quality to `Good` and merges in every parent's. It is a
/// downstream signal, not error handling; a `Bad` quality never aborts a
/// calculation cycle.
///
/// Descriptions are kept as a set so that merging is idempotent and diamond-shaped
/// graphs do not duplicate messages. A description may accompany a `Good` level
/// (an informational note about otherwise-usable data).
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Quality {
    level: QualityLevel,
    descriptions: BTreeSet<String>,
}

impl Quality {
    ///
    /// A quality for a node that has not yet calculated: `Bad` with no explanation.
    ///
    pub fn new() -> Quality {
        Quality {
            level: QualityLevel::Bad,
            descriptions: BTreeSet::new(),
        }
    }

    pub fn good() -> Quality {
        Quality {
            level: QualityLevel::Good,
            descriptions: BTreeSet::new(),
        }
    }

    pub fn bad<S: Into<String>>(description: S) -> Quality {
        let mut quality = Quality::new();
        quality.set_to_bad(description);
        quality
    }

    pub fn is_good(&self) -> bool {
        self.level == QualityLevel::Good
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    ///
    /// Resets to `(Good, ∅)`.
    ///
    pub fn clear_to_good(&mut self) {
        self.level = QualityLevel::Good;
        self.descriptions.clear();
    }

    ///
    /// Resets to `Bad` with exactly the given description.
    ///
    pub fn set_to_bad<S: Into<String>>(&mut self, description: S) {
        self.level = QualityLevel::Bad;
        self.descriptions.clear();
        self.descriptions.insert(description.into());
    }

    ///
    /// Merges another quality into this one: the level degrades to `Bad` if either
    /// side is `Bad`, and the description sets are unioned.
    ///
    pub fn merge(&mut self, other: &Quality) {
        if other.level == QualityLevel::Bad {
            self.level = QualityLevel::Bad;
        }
        self.descriptions
            .extend(other.descriptions.iter().cloned());
    }

    ///
    /// Merges a raw level and a single description. Empty descriptions are not
    /// recorded, so merging `(Good, "")` is a no-op.
    ///
    pub fn merge_with(&mut self, level: QualityLevel, description: &str) {
        if level == QualityLevel::Bad {
            self.level = QualityLevel::Bad;
        }
        if !description.is_empty() {
            self.descriptions.insert(description.to_owned());
        }
    }

    pub fn descriptions(&self) -> &BTreeSet<String> {
        &self.descriptions
    }

    ///
    /// All descriptions joined into one display string.
    ///
    pub fn description(&self) -> String {
        self.descriptions
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for Quality {
    fn default() -> Quality {
        Quality::new()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            QualityLevel::Good if self.descriptions.is_empty() => write!(f, "Good"),
            QualityLevel::Good => write!(f, "Good ({})", self.description()),
            QualityLevel::Bad if self.descriptions.is_empty() => write!(f, "Bad"),
            QualityLevel::Bad => write!(f, "Bad ({})", self.description()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Quality, QualityLevel};

    #[test]
    fn good_is_identity() {
        let mut q = Quality::bad("broken feed");
        q.merge(&Quality::good());
        assert_eq!(q, Quality::bad("broken feed"));

        let mut q = Quality::good();
        q.merge(&Quality::good());
        assert!(q.is_good());
        assert_eq!(q.description(), "");
    }

    #[test]
    fn bad_is_absorbing() {
        let mut q = Quality::good();
        q.merge(&Quality::bad("broken feed"));
        assert!(!q.is_good());
        assert_eq!(q.description(), "broken feed");
    }

    #[test]
    fn merge_is_commutative_and_idempotent() {
        let a = Quality::bad("a is down");
        let b = Quality::bad("b is down");

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);
        assert_eq!(ab, ba);

        let mut twice = ab.clone();
        twice.merge(&b);
        assert_eq!(twice, ab);
    }

    #[test]
    fn set_to_bad_replaces_descriptions() {
        let mut q = Quality::bad("first");
        q.merge(&Quality::bad("second"));
        q.set_to_bad("only");
        assert_eq!(q.description(), "only");
    }

    #[test]
    fn good_level_description_survives_merge() {
        let mut q = Quality::good();
        q.merge_with(QualityLevel::Good, "Info: data stale");
        assert!(q.is_good());
        assert_eq!(q.description(), "Info: data stale");

        // An empty description is not recorded.
        q.clear_to_good();
        q.merge_with(QualityLevel::Good, "");
        assert_eq!(q.description(), "");
    }
}

//! Configurations: the distinct feature realizations observed at a position.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::SpanRef;

use super::position::Position;

/// One specific feature-value realization of a position, together with the
/// annotators who contributed an instance equal to it.
///
/// Equality between instances is decided by the diff engine under the
/// layer's comparison mode; a configuration only records the outcome. An
/// annotator appears in at most one configuration per position, except when
/// that annotator itself stacked several instances at identical offsets —
/// those stay distinct configurations and are never collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// The position this configuration realizes.
    pub position: Position,

    /// Annotators holding an instance equal to this realization.
    pub annotators: BTreeSet<String>,

    /// One contributing instance, used as the source when features are
    /// copied into the consensus document: `(annotator_id, instance ref)`.
    pub representative: (String, SpanRef),

    /// Canonical rendering of the compared feature values; two instances are
    /// equal under the comparison mode iff their fingerprints match.
    #[serde(skip)]
    pub(crate) fingerprint: String,
}

impl Configuration {
    pub(crate) fn new(
        position: Position,
        annotator: impl Into<String>,
        instance: SpanRef,
        fingerprint: String,
    ) -> Self {
        let annotator = annotator.into();
        Self {
            position,
            annotators: BTreeSet::from([annotator.clone()]),
            representative: (annotator, instance),
            fingerprint,
        }
    }

    /// Number of annotators backing this configuration.
    pub fn support(&self) -> usize {
        self.annotators.len()
    }
}

/// Everything observed at one position: the distinct configurations plus the
/// annotators with no instance there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSet {
    /// The position all configurations share.
    pub position: Position,

    /// Distinct realizations, in first-seen order over the sorted annotator
    /// walk.
    pub configurations: Vec<Configuration>,

    /// Annotators with no instance at this position.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub absent: BTreeSet<String>,
}

impl ConfigurationSet {
    pub(crate) fn new(position: Position) -> Self {
        Self {
            position,
            configurations: Vec::new(),
            absent: BTreeSet::new(),
        }
    }

    /// Exactly one configuration, held by every tracked annotator.
    pub fn is_agreeing(&self) -> bool {
        self.configurations.len() == 1 && self.absent.is_empty()
    }

    /// Two or more distinct configurations.
    pub fn is_disagreeing(&self) -> bool {
        self.configurations.len() >= 2
    }

    /// At least one tracked annotator contributed no instance here.
    pub fn is_incomplete(&self) -> bool {
        !self.absent.is_empty()
    }

    /// Indices of the configurations with the largest annotator support.
    pub fn best_supported(&self) -> Vec<usize> {
        let max = self
            .configurations
            .iter()
            .map(Configuration::support)
            .max()
            .unwrap_or(0);
        self.configurations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.support() == max)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with_supports(supports: &[&[&str]]) -> ConfigurationSet {
        let mut set = ConfigurationSet::new(Position::span("ne", 0, 5));
        for (i, annotators) in supports.iter().enumerate() {
            let mut config = Configuration::new(
                Position::span("ne", 0, 5),
                annotators[0],
                SpanRef(i),
                format!("fp{i}"),
            );
            for a in &annotators[1..] {
                config.annotators.insert((*a).to_string());
            }
            set.configurations.push(config);
        }
        set
    }

    #[test]
    fn single_full_configuration_agrees() {
        let set = set_with_supports(&[&["anna", "ben", "cora"]]);
        assert!(set.is_agreeing());
        assert!(!set.is_disagreeing());
        assert!(!set.is_incomplete());
    }

    #[test]
    fn absent_annotator_blocks_agreement() {
        let mut set = set_with_supports(&[&["anna", "ben"]]);
        set.absent.insert("cora".into());
        assert!(!set.is_agreeing());
        assert!(set.is_incomplete());
    }

    #[test]
    fn best_supported_reports_all_tied_configurations() {
        let set = set_with_supports(&[&["anna"], &["ben", "cora"], &["dan", "eve"]]);
        assert_eq!(set.best_supported(), vec![1, 2]);
    }
}

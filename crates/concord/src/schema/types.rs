//! Core type definitions for schema representation.

use serde::{Deserialize, Serialize};

use crate::model::FeatureValue;

/// What kind of instances a layer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Instances anchored to a text range.
    Span,
    /// Instances connecting two span instances.
    Relation,
}

/// Declared type of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Text values.
    String,
    /// Whole numbers.
    Integer,
    /// Floating-point numbers.
    Float,
    /// Boolean values.
    Boolean,
    /// Any JSON value; no validation applied.
    Any,
}

impl FeatureKind {
    /// Check whether a feature value matches this declared type.
    ///
    /// `null` is accepted everywhere: an unset feature is not a violation.
    pub fn accepts(&self, value: &FeatureValue) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            FeatureKind::String => value.is_string(),
            FeatureKind::Integer => value.is_i64() || value.is_u64(),
            FeatureKind::Float => value.is_number(),
            FeatureKind::Boolean => value.is_boolean(),
            FeatureKind::Any => true,
        }
    }
}

impl Default for FeatureKind {
    fn default() -> Self {
        FeatureKind::Any
    }
}

/// How slot-valued features take part in configuration identity.
///
/// This is a per-layer parameter, never a hardcoded rule: the same relation
/// layer can be diffed with targets as part of identity in one project and
/// as mere labels in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureComparisonMode {
    /// A link feature is `(role, target)`: two instances agree only when
    /// their links point at the same target positions.
    IncludeLinkTargets,
    /// A link feature is just its role label; the target is ignored for
    /// identity.
    LinkRolesOnly,
}

impl Default for FeatureComparisonMode {
    fn default() -> Self {
        FeatureComparisonMode::IncludeLinkTargets
    }
}

/// How the merge engine resolves an exact-position clash in the consensus
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingPolicy {
    /// Stacked instances at the same position are permitted.
    Allow,
    /// A newly accepted instance replaces the existing one.
    Replace,
    /// The existing instance wins; the accepted one is skipped with a
    /// diagnostic.
    KeepFirst,
}

impl Default for StackingPolicy {
    fn default() -> Self {
        StackingPolicy::KeepFirst
    }
}

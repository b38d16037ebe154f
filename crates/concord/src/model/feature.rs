//! Feature values attached to annotation instances.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::instance::SpanRef;

/// A single feature value.
///
/// Feature values are schemaless JSON values; the layer schema decides which
/// shapes are acceptable when a value is copied into the consensus document.
pub type FeatureValue = serde_json::Value;

/// Named features of an instance, in declaration order.
pub type FeatureMap = IndexMap<String, FeatureValue>;

/// A slot-valued feature: a role label pointing at another instance.
///
/// Whether the target takes part in configuration identity is controlled by
/// the layer's [`FeatureComparisonMode`](crate::schema::FeatureComparisonMode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFeature {
    /// Role label (e.g. "agent", "patient").
    pub role: String,

    /// The instance filling the slot, by arena index within the same
    /// document.
    pub target: SpanRef,
}

impl LinkFeature {
    /// Create a new link feature.
    pub fn new(role: impl Into<String>, target: SpanRef) -> Self {
        Self {
            role: role.into(),
            target,
        }
    }
}

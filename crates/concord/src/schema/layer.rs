//! Layer and project schema definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::{FeatureComparisonMode, FeatureKind, LayerKind, StackingPolicy};

/// Declared shape and merge settings of one annotation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSchema {
    /// Layer name (e.g. "NamedEntity", "Dependency").
    pub name: String,

    /// Span or relation layer.
    pub kind: LayerKind,

    /// Declared features and their types, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub features: IndexMap<String, FeatureKind>,

    /// How slot-valued features take part in identity.
    #[serde(default)]
    pub comparison: FeatureComparisonMode,

    /// How exact-position clashes are resolved in the consensus document.
    #[serde(default)]
    pub stacking: StackingPolicy,

    /// Name of a feature whose value disambiguates deliberately stacked
    /// instances at identical offsets. When set, the feature's value becomes
    /// part of the position key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguator: Option<String>,
}

impl LayerSchema {
    /// Create a span layer with default settings and no declared features.
    pub fn span(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Span,
            features: IndexMap::new(),
            comparison: FeatureComparisonMode::default(),
            stacking: StackingPolicy::default(),
            disambiguator: None,
        }
    }

    /// Create a relation layer with default settings and no declared
    /// features.
    pub fn relation(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Relation,
            features: IndexMap::new(),
            comparison: FeatureComparisonMode::default(),
            stacking: StackingPolicy::default(),
            disambiguator: None,
        }
    }

    /// Declare a feature (builder style).
    pub fn with_feature(mut self, name: impl Into<String>, kind: FeatureKind) -> Self {
        self.features.insert(name.into(), kind);
        self
    }

    /// Set the comparison mode (builder style).
    pub fn with_comparison(mut self, mode: FeatureComparisonMode) -> Self {
        self.comparison = mode;
        self
    }

    /// Set the stacking policy (builder style).
    pub fn with_stacking(mut self, policy: StackingPolicy) -> Self {
        self.stacking = policy;
        self
    }

    /// Set the disambiguating feature (builder style).
    pub fn with_disambiguator(mut self, feature: impl Into<String>) -> Self {
        self.disambiguator = Some(feature.into());
        self
    }

    /// The declared kind of a feature, if the feature is declared.
    pub fn feature_kind(&self, name: &str) -> Option<FeatureKind> {
        self.features.get(name).copied()
    }
}

/// All tracked layers of a project, as supplied by the schema service.
///
/// Pure lookup: the engines read it, never extend it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSchema {
    layers: IndexMap<String, LayerSchema>,
}

impl ProjectSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tracked layer (builder style).
    pub fn with_layer(mut self, layer: LayerSchema) -> Self {
        self.layers.insert(layer.name.clone(), layer);
        self
    }

    /// Look up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&LayerSchema> {
        self.layers.get(name)
    }

    /// True if the layer is tracked.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// All tracked layers in declaration order.
    pub fn tracked_layers(&self) -> impl Iterator<Item = &LayerSchema> {
        self.layers.values()
    }

    /// Number of tracked layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True if no layers are tracked.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

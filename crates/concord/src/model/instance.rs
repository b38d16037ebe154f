//! Annotation instances: spans and relations.

use serde::{Deserialize, Serialize};

use super::feature::{FeatureMap, LinkFeature};

/// Stable index of an instance within its owning document's arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SpanRef(pub usize);

impl std::fmt::Display for SpanRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The anchoring of an instance: a text span or a relation between spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationBody {
    /// Anchored to the byte offset range `[begin, end)`.
    Span { begin: usize, end: usize },
    /// Connects two span instances within the same document.
    Relation { source: SpanRef, target: SpanRef },
}

/// One annotation produced by one annotator.
///
/// Instances are immutable once captured for a diff run; the engines only
/// ever read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationInstance {
    /// Name of the layer (annotation type) this instance belongs to.
    pub layer: String,

    /// Span or relation anchoring.
    pub body: AnnotationBody,

    /// Plain named features.
    #[serde(default, skip_serializing_if = "FeatureMap::is_empty")]
    pub features: FeatureMap,

    /// Slot-valued features pointing at other instances.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkFeature>,
}

impl AnnotationInstance {
    /// Create a span instance with no features.
    pub fn span(layer: impl Into<String>, begin: usize, end: usize) -> Self {
        Self {
            layer: layer.into(),
            body: AnnotationBody::Span { begin, end },
            features: FeatureMap::new(),
            links: Vec::new(),
        }
    }

    /// Create a relation instance with no features.
    pub fn relation(layer: impl Into<String>, source: SpanRef, target: SpanRef) -> Self {
        Self {
            layer: layer.into(),
            body: AnnotationBody::Relation { source, target },
            features: FeatureMap::new(),
            links: Vec::new(),
        }
    }

    /// Add a feature value (builder style).
    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }

    /// Add a slot-valued feature (builder style).
    pub fn with_link(mut self, role: impl Into<String>, target: SpanRef) -> Self {
        self.links.push(LinkFeature::new(role, target));
        self
    }

    /// True if this instance is a span.
    pub fn is_span(&self) -> bool {
        matches!(self.body, AnnotationBody::Span { .. })
    }

    /// True if this instance is a relation.
    pub fn is_relation(&self) -> bool {
        matches!(self.body, AnnotationBody::Relation { .. })
    }

    /// The `(begin, end)` offsets for a span instance.
    pub fn span_range(&self) -> Option<(usize, usize)> {
        match self.body {
            AnnotationBody::Span { begin, end } => Some((begin, end)),
            AnnotationBody::Relation { .. } => None,
        }
    }

    /// Check whether two span instances overlap.
    ///
    /// Ranges are half-open; spans that merely share a boundary do not
    /// overlap. Relations never overlap anything.
    pub fn overlaps(&self, other: &AnnotationInstance) -> bool {
        match (self.span_range(), other.span_range()) {
            (Some((ab, ae)), Some((bb, be))) => ab < be && bb < ae,
            _ => false,
        }
    }
}

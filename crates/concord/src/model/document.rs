//! Per-annotator document snapshots.

use serde::{Deserialize, Serialize};

use super::feature::FeatureMap;
use super::instance::{AnnotationBody, AnnotationInstance, SpanRef};

/// All annotations one annotator produced for one document.
///
/// Instances live in an arena of slots; a [`SpanRef`] stays valid for the
/// lifetime of the document even when other instances are removed, so
/// relations and links never dangle because of index shifts. Removal leaves
/// an empty slot behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorDocument {
    /// Identifier of the annotator who produced this snapshot.
    pub annotator_id: String,

    /// Instance arena. Empty slots are removed instances.
    slots: Vec<Option<AnnotationInstance>>,
}

impl AnnotatorDocument {
    /// Create an empty document for an annotator.
    pub fn new(annotator_id: impl Into<String>) -> Self {
        Self {
            annotator_id: annotator_id.into(),
            slots: Vec::new(),
        }
    }

    /// Add an instance, returning its stable reference.
    pub fn push(&mut self, instance: AnnotationInstance) -> SpanRef {
        self.slots.push(Some(instance));
        SpanRef(self.slots.len() - 1)
    }

    /// Add a span instance with features.
    pub fn push_span(
        &mut self,
        layer: impl Into<String>,
        begin: usize,
        end: usize,
        features: FeatureMap,
    ) -> SpanRef {
        let mut instance = AnnotationInstance::span(layer, begin, end);
        instance.features = features;
        self.push(instance)
    }

    /// Add a relation instance with features.
    pub fn push_relation(
        &mut self,
        layer: impl Into<String>,
        source: SpanRef,
        target: SpanRef,
        features: FeatureMap,
    ) -> SpanRef {
        let mut instance = AnnotationInstance::relation(layer, source, target);
        instance.features = features;
        self.push(instance)
    }

    /// Look up an instance by reference.
    pub fn get(&self, r: SpanRef) -> Option<&AnnotationInstance> {
        self.slots.get(r.0).and_then(|slot| slot.as_ref())
    }

    /// Mutable access to an instance by reference.
    pub fn get_mut(&mut self, r: SpanRef) -> Option<&mut AnnotationInstance> {
        self.slots.get_mut(r.0).and_then(|slot| slot.as_mut())
    }

    /// Remove the instance at a reference, leaving its slot empty.
    ///
    /// Returns the removed instance, or `None` if the slot was already empty.
    pub fn remove(&mut self, r: SpanRef) -> Option<AnnotationInstance> {
        self.slots.get_mut(r.0).and_then(|slot| slot.take())
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if the document holds no live instances.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Iterate over live instances with their references.
    pub fn iter(&self) -> impl Iterator<Item = (SpanRef, &AnnotationInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|inst| (SpanRef(i), inst)))
    }

    /// References of all span instances of a layer, sorted by `(begin, end)`.
    pub fn sorted_spans(&self, layer: &str) -> Vec<(SpanRef, usize, usize)> {
        let mut spans: Vec<_> = self
            .iter()
            .filter(|(_, inst)| inst.layer == layer)
            .filter_map(|(r, inst)| inst.span_range().map(|(b, e)| (r, b, e)))
            .collect();
        spans.sort_by_key(|&(_, b, e)| (b, e));
        spans
    }

    /// Find a span instance of a layer at exact offsets.
    pub fn find_span(&self, layer: &str, begin: usize, end: usize) -> Option<SpanRef> {
        self.iter().find_map(|(r, inst)| {
            (inst.layer == layer
                && inst.body == AnnotationBody::Span { begin, end })
                .then_some(r)
        })
    }

    /// True if the document holds at least one instance of the layer.
    pub fn has_layer(&self, layer: &str) -> bool {
        self.iter().any(|(_, inst)| inst.layer == layer)
    }
}

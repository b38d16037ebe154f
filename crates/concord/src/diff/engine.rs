//! N-way diff over per-annotator documents.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::align::DualListAligner;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::model::{AnnotationBody, AnnotationInstance, AnnotatorDocument, SpanRef};
use crate::schema::{FeatureComparisonMode, LayerKind, LayerSchema, ProjectSchema};

use super::configuration::{Configuration, ConfigurationSet};
use super::position::Position;

/// Configuration for a diff run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Restrict the analysis to instances fully inside `[begin, end)`.
    /// `None` analyzes the whole document.
    pub range: Option<(usize, usize)>,

    /// Also walk every annotator pair with the dual-list aligner and report
    /// spans that overlap without sharing exact offsets.
    pub detect_boundary_clashes: bool,
}

impl DiffConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the analyzed range (builder style).
    pub fn with_range(mut self, begin: usize, end: usize) -> Self {
        self.range = Some((begin, end));
        self
    }

    /// Enable boundary-clash detection (builder style).
    pub fn with_boundary_clashes(mut self) -> Self {
        self.detect_boundary_clashes = true;
        self
    }
}

/// Two spans from different annotators that overlap without agreeing on
/// offsets. Near-miss material for a curation front-end, next to the exact
/// disagreements in the configuration sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryClash {
    pub layer: String,
    pub annotator_a: String,
    pub annotator_b: String,
    pub a: (usize, usize),
    pub b: (usize, usize),
}

/// Summary counts over the analyzed positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Positions where one configuration covers all annotators.
    pub agreeing: usize,
    /// Positions with two or more configurations.
    pub disagreeing: usize,
    /// Positions missing at least one annotator.
    pub incomplete: usize,
    /// Total instances that received a position.
    pub instances_seen: usize,
}

/// Result of one diff run: every analyzed position with its configuration
/// set, in ascending position order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    /// Configuration sets, sorted by position (spans before relations).
    pub sets: Vec<ConfigurationSet>,

    /// Summary counts.
    pub summary: DiffSummary,

    /// Non-fatal problems encountered while positioning instances.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,

    /// Overlapping-but-not-identical span pairs, when detection was enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundary_clashes: Vec<BoundaryClash>,
}

impl DiffResult {
    /// Look up the configuration set at a position.
    pub fn set(&self, position: &Position) -> Option<&ConfigurationSet> {
        self.sets
            .binary_search_by(|s| s.position.cmp(position))
            .ok()
            .map(|i| &self.sets[i])
    }

    /// True when every position agrees and nothing is missing.
    pub fn is_complete_agreement(&self) -> bool {
        self.summary.disagreeing == 0 && self.summary.incomplete == 0
    }
}

/// The N-way diff engine.
///
/// Pure function of its inputs: documents are frozen snapshots, output order
/// is fully determined by position sorting, and no state survives a call.
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(DiffConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Diff the documents of all annotators against each other.
    ///
    /// Spans are positioned in a first pass, relations in a second pass over
    /// the span position table, so a relation's identity is always derived
    /// from already-computed endpoint positions. A relation whose endpoint
    /// never received a position is skipped with a diagnostic; the rest of
    /// the run proceeds.
    pub fn diff(
        &self,
        schema: &ProjectSchema,
        docs: &BTreeMap<String, AnnotatorDocument>,
    ) -> Result<DiffResult> {
        let mut diagnostics = Vec::new();

        // Pass 1: span positions per annotator. Every tracked span gets a
        // position, range aside; the range filter applies when bucketing,
        // so a relation endpoint outside the range still resolves instead
        // of looking like a dangling reference.
        let mut span_positions: BTreeMap<&str, HashMap<SpanRef, Position>> = BTreeMap::new();
        for (annotator, doc) in docs {
            let mut positions = HashMap::new();
            for (r, inst) in doc.iter() {
                let Some(layer) = schema.layer(&inst.layer) else {
                    continue;
                };
                if layer.kind != LayerKind::Span {
                    continue;
                }
                if let Some(position) = Position::of_span(inst, layer) {
                    positions.insert(r, position);
                }
            }
            span_positions.insert(annotator, positions);
        }

        // Pass 2: bucket spans and relations by position.
        let mut buckets: BTreeMap<Position, Vec<(String, SpanRef, String)>> = BTreeMap::new();
        let mut instances_seen = 0;

        for (annotator, doc) in docs {
            let positions = &span_positions[annotator.as_str()];
            for (r, inst) in doc.iter() {
                let Some(layer) = schema.layer(&inst.layer) else {
                    continue;
                };
                let position = match (&inst.body, layer.kind) {
                    (AnnotationBody::Span { begin, end }, LayerKind::Span) => {
                        if !self.in_range(*begin, *end) {
                            continue;
                        }
                        match positions.get(&r) {
                            Some(p) => p.clone(),
                            None => continue,
                        }
                    }
                    (AnnotationBody::Relation { source, target }, LayerKind::Relation) => {
                        let (Some(sp), Some(tp)) =
                            (positions.get(source), positions.get(target))
                        else {
                            diagnostics.push(Diagnostic::new(
                                DiagnosticKind::DanglingReference,
                                format!(
                                    "relation {r} of layer '{}' by '{annotator}' references an \
                                     endpoint without a position",
                                    inst.layer
                                ),
                            ));
                            continue;
                        };
                        // An endpoint outside the analyzed range takes the
                        // relation out of range with it; the document is
                        // consistent, so nothing is diagnosed.
                        let in_range = [sp, tp]
                            .iter()
                            .all(|p| p.offsets().is_some_and(|(b, e)| self.in_range(b, e)));
                        if !in_range {
                            continue;
                        }
                        Position::relation(inst.layer.clone(), sp.clone(), tp.clone())
                    }
                    // Body does not match the declared layer kind.
                    _ => continue,
                };

                let Some(fingerprint) =
                    fingerprint(inst, layer, positions, &mut diagnostics, annotator, r)
                else {
                    continue;
                };

                instances_seen += 1;
                buckets
                    .entry(position)
                    .or_default()
                    .push((annotator.clone(), r, fingerprint));
            }
        }

        // Pass 3: partition buckets into configurations and classify.
        let all_annotators: BTreeSet<String> = docs.keys().cloned().collect();
        let mut sets = Vec::with_capacity(buckets.len());
        let mut summary = DiffSummary {
            instances_seen,
            ..DiffSummary::default()
        };

        for (position, members) in buckets {
            let mut set = ConfigurationSet::new(position.clone());
            for (annotator, r, fp) in members {
                match set
                    .configurations
                    .iter_mut()
                    .find(|c| c.fingerprint == fp && !c.annotators.contains(&annotator))
                {
                    Some(config) => {
                        config.annotators.insert(annotator);
                    }
                    // New realization, or the same annotator stacking a
                    // second identical instance: kept separate, never
                    // collapsed.
                    None => set.configurations.push(Configuration::new(
                        position.clone(),
                        annotator,
                        r,
                        fp,
                    )),
                }
            }

            let present: BTreeSet<&String> = set
                .configurations
                .iter()
                .flat_map(|c| c.annotators.iter())
                .collect();
            set.absent = all_annotators
                .iter()
                .filter(|a| !present.contains(a))
                .cloned()
                .collect();

            if set.is_agreeing() {
                summary.agreeing += 1;
            }
            if set.is_disagreeing() {
                summary.disagreeing += 1;
            }
            if set.is_incomplete() {
                summary.incomplete += 1;
            }
            sets.push(set);
        }

        self.report_missing_layers(schema, docs, &mut diagnostics);

        let boundary_clashes = if self.config.detect_boundary_clashes {
            self.detect_boundary_clashes(schema, docs)?
        } else {
            Vec::new()
        };

        Ok(DiffResult {
            sets,
            summary,
            diagnostics,
            boundary_clashes,
        })
    }

    fn in_range(&self, begin: usize, end: usize) -> bool {
        match self.config.range {
            Some((rb, re)) => begin >= rb && end <= re,
            None => true,
        }
    }

    /// A tracked layer some annotators populated and others did not is not
    /// fatal; the absent annotators are already incomplete at every position
    /// of the layer, but the gap is worth a diagnostic of its own.
    fn report_missing_layers(
        &self,
        schema: &ProjectSchema,
        docs: &BTreeMap<String, AnnotatorDocument>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for layer in schema.tracked_layers() {
            let contributors: BTreeSet<&str> = docs
                .iter()
                .filter(|(_, doc)| doc.has_layer(&layer.name))
                .map(|(a, _)| a.as_str())
                .collect();
            if contributors.is_empty() {
                continue;
            }
            for annotator in docs.keys() {
                if !contributors.contains(annotator.as_str()) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MissingLayer,
                        format!(
                            "annotator '{annotator}' has no instances of layer '{}'",
                            layer.name
                        ),
                    ));
                }
            }
        }
    }

    fn detect_boundary_clashes(
        &self,
        schema: &ProjectSchema,
        docs: &BTreeMap<String, AnnotatorDocument>,
    ) -> Result<Vec<BoundaryClash>> {
        let mut clashes = Vec::new();
        let annotators: Vec<&String> = docs.keys().collect();

        for layer in schema.tracked_layers() {
            if layer.kind != LayerKind::Span {
                continue;
            }
            for (i, a) in annotators.iter().enumerate() {
                for b in &annotators[i + 1..] {
                    let list_a: Vec<(usize, usize)> = docs[*a]
                        .sorted_spans(&layer.name)
                        .iter()
                        .map(|&(_, begin, end)| (begin, end))
                        .filter(|&(begin, end)| self.in_range(begin, end))
                        .collect();
                    let list_b: Vec<(usize, usize)> = docs[*b]
                        .sorted_spans(&layer.name)
                        .iter()
                        .map(|&(_, begin, end)| (begin, end))
                        .filter(|&(begin, end)| self.in_range(begin, end))
                        .collect();
                    if list_a.is_empty() || list_b.is_empty() {
                        continue;
                    }

                    let mut aligner = DualListAligner::new(&list_a, &list_b)?;
                    while aligner.has_next() {
                        let (sa, sb) = aligner.current();
                        if sa != sb && sa.0 < sb.1 && sb.0 < sa.1 {
                            clashes.push(BoundaryClash {
                                layer: layer.name.clone(),
                                annotator_a: (*a).clone(),
                                annotator_b: (*b).clone(),
                                a: sa,
                                b: sb,
                            });
                        }
                        if aligner.step().is_err() {
                            break;
                        }
                    }
                }
            }
        }
        Ok(clashes)
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical rendering of the feature values an instance is compared by.
///
/// Plain features sort by name; link features compare as `(role, target
/// position)` pairs or as bare roles depending on the layer's comparison
/// mode. Returns `None` (with a diagnostic) when a link target cannot be
/// positioned.
fn fingerprint(
    inst: &AnnotationInstance,
    layer: &LayerSchema,
    positions: &HashMap<SpanRef, Position>,
    diagnostics: &mut Vec<Diagnostic>,
    annotator: &str,
    r: SpanRef,
) -> Option<String> {
    let features: BTreeMap<&String, &serde_json::Value> = inst.features.iter().collect();
    let feature_part: Vec<serde_json::Value> = features
        .into_iter()
        .map(|(name, value)| serde_json::json!([name, value]))
        .collect();

    let mut link_reprs: Vec<(String, Option<String>)> = Vec::with_capacity(inst.links.len());
    for link in &inst.links {
        match layer.comparison {
            FeatureComparisonMode::LinkRolesOnly => link_reprs.push((link.role.clone(), None)),
            FeatureComparisonMode::IncludeLinkTargets => match positions.get(&link.target) {
                Some(target) => link_reprs.push((link.role.clone(), Some(target.to_string()))),
                None => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::DanglingReference,
                        format!(
                            "instance {r} of layer '{}' by '{annotator}' links role '{}' to an \
                             instance without a position",
                            inst.layer, link.role
                        ),
                    ));
                    return None;
                }
            },
        }
    }
    link_reprs.sort();
    let link_part: Vec<serde_json::Value> = link_reprs
        .into_iter()
        .map(|(role, target)| serde_json::json!([role, target]))
        .collect();

    // JSON keeps every name and value quoted and escaped, so a crafted
    // feature name cannot collide with another instance's pair boundaries.
    Some(serde_json::json!([feature_part, link_part]).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LayerSchema;
    use serde_json::json;

    fn schema() -> ProjectSchema {
        ProjectSchema::new().with_layer(LayerSchema::span("ne"))
    }

    fn doc_with_span(annotator: &str, begin: usize, end: usize, value: &str) -> AnnotatorDocument {
        let mut doc = AnnotatorDocument::new(annotator);
        doc.push(
            AnnotationInstance::span("ne", begin, end).with_feature("value", json!(value)),
        );
        doc
    }

    #[test]
    fn identical_spans_form_one_agreeing_set() {
        let docs: BTreeMap<String, AnnotatorDocument> = [
            ("anna".to_string(), doc_with_span("anna", 10, 15, "PER")),
            ("ben".to_string(), doc_with_span("ben", 10, 15, "PER")),
        ]
        .into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        assert_eq!(result.sets.len(), 1);
        assert!(result.sets[0].is_agreeing());
        assert_eq!(result.summary.agreeing, 1);
        assert_eq!(result.summary.disagreeing, 0);
    }

    #[test]
    fn differing_features_form_two_configurations() {
        let docs: BTreeMap<String, AnnotatorDocument> = [
            ("anna".to_string(), doc_with_span("anna", 10, 15, "PER")),
            ("ben".to_string(), doc_with_span("ben", 10, 15, "ORG")),
        ]
        .into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        assert_eq!(result.sets.len(), 1);
        let set = &result.sets[0];
        assert!(set.is_disagreeing());
        assert_eq!(set.configurations.len(), 2);
        assert!(set.configurations.iter().all(|c| c.support() == 1));
    }

    #[test]
    fn range_filter_excludes_outside_spans() {
        let mut doc = AnnotatorDocument::new("anna");
        doc.push(AnnotationInstance::span("ne", 5, 9));
        doc.push(AnnotationInstance::span("ne", 30, 40));
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        let engine = DiffEngine::with_config(DiffConfig::new().with_range(0, 20));
        let result = engine.diff(&schema(), &docs).unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(result.sets[0].position.offsets(), Some((5, 9)));
    }

    #[test]
    fn range_excluded_relation_endpoint_is_not_diagnosed() {
        let schema = ProjectSchema::new()
            .with_layer(LayerSchema::span("ne"))
            .with_layer(LayerSchema::relation("dep"));
        let mut doc = AnnotatorDocument::new("anna");
        let source = doc.push(AnnotationInstance::span("ne", 0, 5));
        let target = doc.push(AnnotationInstance::span("ne", 10, 15));
        doc.push(AnnotationInstance::relation("dep", source, target));
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        // The target span and with it the relation fall outside the range;
        // the document is consistent, so no diagnostic is warranted.
        let engine = DiffEngine::with_config(DiffConfig::new().with_range(0, 6));
        let result = engine.diff(&schema, &docs).unwrap();

        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert_eq!(result.sets.len(), 1);
        assert_eq!(result.sets[0].position.offsets(), Some((0, 5)));
    }

    #[test]
    fn removed_relation_endpoint_is_diagnosed() {
        let schema = ProjectSchema::new()
            .with_layer(LayerSchema::span("ne"))
            .with_layer(LayerSchema::relation("dep"));
        let mut doc = AnnotatorDocument::new("anna");
        let source = doc.push(AnnotationInstance::span("ne", 0, 5));
        let target = doc.push(AnnotationInstance::span("ne", 10, 15));
        doc.push(AnnotationInstance::relation("dep", source, target));
        doc.remove(target);
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        let result = DiffEngine::new().diff(&schema, &docs).unwrap();

        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DanglingReference));
        assert_eq!(result.sets.len(), 1, "only the surviving span is positioned");
    }

    #[test]
    fn link_roles_only_ignores_target_positions() {
        let host_position = Position::span("frame", 0, 5);
        let docs_with_targets = |targets: [(usize, usize); 2]| {
            ["anna", "ben"]
                .iter()
                .zip(targets)
                .map(|(annotator, (begin, end))| {
                    let mut doc = AnnotatorDocument::new(*annotator);
                    let filler = doc.push(AnnotationInstance::span("frame", begin, end));
                    doc.push(AnnotationInstance::span("frame", 0, 5).with_link("agent", filler));
                    (annotator.to_string(), doc)
                })
                .collect::<BTreeMap<String, AnnotatorDocument>>()
        };
        let docs = docs_with_targets([(10, 15), (20, 25)]);

        // Same role, different targets: two configurations when targets
        // take part in identity, one when only roles do.
        let strict = ProjectSchema::new().with_layer(LayerSchema::span("frame"));
        let result = DiffEngine::new().diff(&strict, &docs).unwrap();
        assert_eq!(result.set(&host_position).unwrap().configurations.len(), 2);

        let lax = ProjectSchema::new().with_layer(
            LayerSchema::span("frame").with_comparison(FeatureComparisonMode::LinkRolesOnly),
        );
        let result = DiffEngine::new().diff(&lax, &docs).unwrap();
        assert_eq!(result.set(&host_position).unwrap().configurations.len(), 1);
    }

    #[test]
    fn crafted_feature_names_do_not_collide() {
        let mut anna = AnnotatorDocument::new("anna");
        anna.push(AnnotationInstance::span("ne", 0, 5).with_feature("x=1;y", 2));
        let mut ben = AnnotatorDocument::new("ben");
        ben.push(
            AnnotationInstance::span("ne", 0, 5)
                .with_feature("x", 1)
                .with_feature("y", 2),
        );
        let docs: BTreeMap<String, AnnotatorDocument> =
            [("anna".to_string(), anna), ("ben".to_string(), ben)].into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        let set = &result.sets[0];
        assert_eq!(
            set.configurations.len(),
            2,
            "separator characters in a feature name must not merge distinct feature maps"
        );
    }

    #[test]
    fn untracked_layers_are_ignored() {
        let mut doc = doc_with_span("anna", 0, 4, "PER");
        doc.push(AnnotationInstance::span("token", 0, 4));
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(result.summary.instances_seen, 1);
    }

    #[test]
    fn stacked_identical_instances_stay_distinct() {
        let mut doc = AnnotatorDocument::new("anna");
        doc.push(AnnotationInstance::span("ne", 0, 5).with_feature("value", json!("PER")));
        doc.push(AnnotationInstance::span("ne", 0, 5).with_feature("value", json!("PER")));
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        let set = &result.sets[0];
        assert_eq!(
            set.configurations.len(),
            2,
            "one annotator's stacked duplicates must not collapse"
        );
    }

    #[test]
    fn disambiguator_splits_stacked_positions() {
        let schema = ProjectSchema::new()
            .with_layer(LayerSchema::span("ne").with_disambiguator("value"));
        let mut doc = AnnotatorDocument::new("anna");
        doc.push(AnnotationInstance::span("ne", 0, 5).with_feature("value", json!("PER")));
        doc.push(AnnotationInstance::span("ne", 0, 5).with_feature("value", json!("ORG")));
        let docs: BTreeMap<String, AnnotatorDocument> = [("anna".to_string(), doc)].into();

        let result = DiffEngine::new().diff(&schema, &docs).unwrap();
        assert_eq!(result.sets.len(), 2, "disambiguated stacks are distinct positions");
    }

    #[test]
    fn missing_layer_is_diagnosed_not_fatal() {
        let docs: BTreeMap<String, AnnotatorDocument> = [
            ("anna".to_string(), doc_with_span("anna", 10, 15, "PER")),
            ("ben".to_string(), AnnotatorDocument::new("ben")),
        ]
        .into();

        let result = DiffEngine::new().diff(&schema(), &docs).unwrap();
        assert_eq!(result.sets.len(), 1);
        assert_eq!(result.sets[0].absent.len(), 1);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingLayer));
    }

    #[test]
    fn boundary_clashes_report_near_misses() {
        let docs: BTreeMap<String, AnnotatorDocument> = [
            ("anna".to_string(), doc_with_span("anna", 10, 15, "PER")),
            ("ben".to_string(), doc_with_span("ben", 10, 17, "PER")),
        ]
        .into();

        let engine = DiffEngine::with_config(DiffConfig::new().with_boundary_clashes());
        let result = engine.diff(&schema(), &docs).unwrap();
        assert_eq!(result.boundary_clashes.len(), 1);
        let clash = &result.boundary_clashes[0];
        assert_eq!((clash.a, clash.b), ((10, 15), (10, 17)));
    }
}

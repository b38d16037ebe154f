//! Merge engine: materializes strategy decisions into a consensus document.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::diff::{ConfigurationSet, DiffResult, Position};
use crate::error::Result;
use crate::model::{
    AnnotationBody, AnnotationInstance, AnnotatorDocument, FeatureMap, LinkFeature, SpanRef,
};
use crate::schema::{LayerKind, LayerSchema, ProjectSchema, StackingPolicy};

use super::strategy::{MergeContext, MergeDecision, MergeStrategy};

/// Outcome of one merge run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    /// Positions written into (or already present in) the consensus.
    pub merged: usize,
    /// Accepted positions skipped because an existing instance was kept.
    pub skipped: usize,
    /// Positions left for a later decision.
    pub deferred: usize,
    /// Positions whose stale consensus instance was removed.
    pub rejected: usize,
    /// Ordered diagnostics accumulated over the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    /// First abandoned position, when a strategy failed. Everything after
    /// it in position order was not processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<Position>,
}

impl MergeReport {
    /// True when the run was abandoned partway through.
    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }
}

/// Engine that walks a diff result in position order and applies a
/// strategy's decisions to the consensus document.
///
/// Span positions are always processed before relation positions, so a
/// relation's endpoints have either been placed into the consensus by the
/// time the relation is decided, or the relation is deferred with a
/// diagnostic.
pub struct MergeEngine;

impl MergeEngine {
    /// Create a new merge engine.
    pub fn new() -> Self {
        Self
    }

    /// Apply the strategy's decisions to the consensus document.
    ///
    /// The consensus may be empty or pre-populated from an earlier run;
    /// pre-existing instances take part in stacking resolution and endpoint
    /// lookup. A strategy failure keeps everything merged so far, abandons
    /// the failing position and all later ones, and surfaces in
    /// [`MergeReport::aborted_at`].
    pub fn merge(
        &self,
        schema: &ProjectSchema,
        diff: &DiffResult,
        docs: &BTreeMap<String, AnnotatorDocument>,
        strategy: &dyn MergeStrategy,
        consensus: &mut AnnotatorDocument,
    ) -> Result<MergeReport> {
        let mut report = MergeReport::default();
        let mut merged = index_consensus(schema, consensus);
        let mut ctx = MergeContext::new(schema, docs.len());
        // Slot links are resolved after all positions are processed; a link
        // may point forward at a span the walk has not reached yet.
        let mut pending_links: Vec<(SpanRef, String, Position)> = Vec::new();

        for set in &diff.sets {
            let decision = match strategy.decide(set, &mut ctx) {
                Ok(decision) => decision,
                Err(e) => {
                    report.diagnostics.extend(ctx.take_notes());
                    self.abort(strategy, set, e.to_string(), &mut report);
                    break;
                }
            };
            report.diagnostics.extend(ctx.take_notes());

            match decision {
                MergeDecision::Accept(idx) => {
                    if set.configurations.get(idx).is_none() {
                        self.abort(
                            strategy,
                            set,
                            format!("accepted configuration index {idx} is out of bounds"),
                            &mut report,
                        );
                        break;
                    }
                    self.apply_accept(
                        schema,
                        set,
                        idx,
                        docs,
                        consensus,
                        &mut merged,
                        &mut pending_links,
                        &mut report,
                    );
                }
                MergeDecision::Defer => report.deferred += 1,
                MergeDecision::Reject => {
                    if let Some(stale) = merged.remove(&set.position) {
                        consensus.remove(stale);
                        self.remove_dependents(stale, consensus, &mut merged, &mut report);
                    }
                    report.rejected += 1;
                }
            }
        }

        for (host, role, target_position) in pending_links {
            match merged.get(&target_position).copied() {
                Some(target) => {
                    if let Some(inst) = consensus.get_mut(host) {
                        inst.links.push(LinkFeature::new(role, target));
                    }
                }
                None => report.diagnostics.push(Diagnostic::at(
                    DiagnosticKind::EndpointUnresolved,
                    format!("slot '{role}' target not present in consensus; link dropped"),
                    target_position,
                )),
            }
        }

        Ok(report)
    }

    fn abort(
        &self,
        strategy: &dyn MergeStrategy,
        set: &ConfigurationSet,
        message: String,
        report: &mut MergeReport,
    ) {
        report.diagnostics.push(Diagnostic::at(
            DiagnosticKind::StrategyFailed,
            format!(
                "strategy '{}' failed: {message}; this and all later positions were abandoned",
                strategy.name()
            ),
            set.position.clone(),
        ));
        report.aborted_at = Some(set.position.clone());
    }

    /// Remove consensus relations that referenced a rejected instance, and
    /// strip slot links pointing at it. A relation without its endpoint is
    /// no longer a valid instance and must not survive pointing at an empty
    /// slot.
    fn remove_dependents(
        &self,
        removed: SpanRef,
        consensus: &mut AnnotatorDocument,
        merged: &mut BTreeMap<Position, SpanRef>,
        report: &mut MergeReport,
    ) {
        let dependents: Vec<SpanRef> = consensus
            .iter()
            .filter(|(_, inst)| {
                matches!(
                    inst.body,
                    AnnotationBody::Relation { source, target }
                        if source == removed || target == removed
                )
            })
            .map(|(r, _)| r)
            .collect();
        for r in dependents {
            let position = merged
                .iter()
                .find(|(_, v)| **v == r)
                .map(|(p, _)| p.clone());
            merged.retain(|_, v| *v != r);
            consensus.remove(r);
            let message = "consensus relation removed; its endpoint was rejected".to_string();
            report.diagnostics.push(match position {
                Some(p) => Diagnostic::at(DiagnosticKind::EndpointUnresolved, message, p),
                None => Diagnostic::new(DiagnosticKind::EndpointUnresolved, message),
            });
        }

        let hosts: Vec<SpanRef> = consensus
            .iter()
            .filter(|(_, inst)| inst.links.iter().any(|l| l.target == removed))
            .map(|(r, _)| r)
            .collect();
        for host in hosts {
            if let Some(inst) = consensus.get_mut(host) {
                inst.links.retain(|l| l.target != removed);
            }
            report.diagnostics.push(Diagnostic::new(
                DiagnosticKind::EndpointUnresolved,
                "slot link dropped; its target was rejected",
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_accept(
        &self,
        schema: &ProjectSchema,
        set: &ConfigurationSet,
        idx: usize,
        docs: &BTreeMap<String, AnnotatorDocument>,
        consensus: &mut AnnotatorDocument,
        merged: &mut BTreeMap<Position, SpanRef>,
        pending_links: &mut Vec<(SpanRef, String, Position)>,
        report: &mut MergeReport,
    ) {
        let config = &set.configurations[idx];
        let (annotator, r) = &config.representative;

        let Some(doc) = docs.get(annotator) else {
            report.diagnostics.push(Diagnostic::at(
                DiagnosticKind::DanglingReference,
                format!("no document for annotator '{annotator}'; position deferred"),
                set.position.clone(),
            ));
            report.deferred += 1;
            return;
        };
        let Some(rep) = doc.get(*r) else {
            report.diagnostics.push(Diagnostic::at(
                DiagnosticKind::DanglingReference,
                format!("representative instance {r} of '{annotator}' not found; position deferred"),
                set.position.clone(),
            ));
            report.deferred += 1;
            return;
        };
        let Some(layer) = schema.layer(&rep.layer) else {
            report.diagnostics.push(Diagnostic::at(
                DiagnosticKind::DanglingReference,
                format!("layer '{}' is not tracked; position deferred", rep.layer),
                set.position.clone(),
            ));
            report.deferred += 1;
            return;
        };

        // A relation is only mergeable once both endpoints made it into the
        // consensus; a deferred or rejected endpoint defers the relation.
        let body = match &set.position {
            Position::Span { begin, end, .. } => AnnotationBody::Span {
                begin: *begin,
                end: *end,
            },
            Position::Relation { source, target, .. } => {
                match (merged.get(source.as_ref()), merged.get(target.as_ref())) {
                    (Some(&s), Some(&t)) => AnnotationBody::Relation {
                        source: s,
                        target: t,
                    },
                    _ => {
                        report.diagnostics.push(Diagnostic::at(
                            DiagnosticKind::EndpointUnresolved,
                            "relation endpoint not present in consensus; position deferred"
                                .to_string(),
                            set.position.clone(),
                        ));
                        report.deferred += 1;
                        return;
                    }
                }
            }
        };

        let features = copy_features(rep, layer, &set.position, &mut report.diagnostics);

        if let Some(&existing) = merged.get(&set.position) {
            if let Some(existing_inst) = consensus.get(existing) {
                if existing_inst.features == features {
                    // Re-merge of an identical instance is a no-op.
                    report.merged += 1;
                    return;
                }
                match layer.stacking {
                    StackingPolicy::Allow => {}
                    StackingPolicy::Replace => {
                        consensus.remove(existing);
                        report.diagnostics.push(Diagnostic::at(
                            DiagnosticKind::Replaced,
                            "existing consensus instance replaced".to_string(),
                            set.position.clone(),
                        ));
                    }
                    StackingPolicy::KeepFirst => {
                        report.diagnostics.push(Diagnostic::at(
                            DiagnosticKind::StackingSkipped,
                            "existing consensus instance kept; accepted configuration skipped"
                                .to_string(),
                            set.position.clone(),
                        ));
                        report.skipped += 1;
                        return;
                    }
                }
            }
        }

        let new_ref = consensus.push(AnnotationInstance {
            layer: rep.layer.clone(),
            body,
            features,
            links: Vec::new(),
        });
        for (role, target_position) in
            link_targets(rep, doc, schema, &set.position, &mut report.diagnostics)
        {
            pending_links.push((new_ref, role, target_position));
        }
        merged.insert(set.position.clone(), new_ref);
        report.merged += 1;
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Positions of everything already present in the consensus document.
fn index_consensus(
    schema: &ProjectSchema,
    consensus: &AnnotatorDocument,
) -> BTreeMap<Position, SpanRef> {
    let mut by_ref: HashMap<SpanRef, Position> = HashMap::new();
    let mut merged = BTreeMap::new();

    for (r, inst) in consensus.iter() {
        let Some(layer) = schema.layer(&inst.layer) else {
            continue;
        };
        if layer.kind == LayerKind::Span {
            if let Some(position) = Position::of_span(inst, layer) {
                by_ref.insert(r, position.clone());
                merged.insert(position, r);
            }
        }
    }
    for (r, inst) in consensus.iter() {
        let Some(layer) = schema.layer(&inst.layer) else {
            continue;
        };
        if layer.kind != LayerKind::Relation {
            continue;
        }
        if let AnnotationBody::Relation { source, target } = &inst.body {
            if let (Some(sp), Some(tp)) = (by_ref.get(source), by_ref.get(target)) {
                merged.insert(
                    Position::relation(inst.layer.clone(), sp.clone(), tp.clone()),
                    r,
                );
            }
        }
    }
    merged
}

/// Copy the representative's features, dropping values that fail validation
/// against the layer schema. A dropped feature degrades to a diagnostic; the
/// instance still merges.
fn copy_features(
    rep: &AnnotationInstance,
    layer: &LayerSchema,
    position: &Position,
    diagnostics: &mut Vec<Diagnostic>,
) -> FeatureMap {
    let mut features = FeatureMap::new();
    for (name, value) in &rep.features {
        if let Some(kind) = layer.feature_kind(name) {
            if !kind.accepts(value) {
                diagnostics.push(Diagnostic::at(
                    DiagnosticKind::InvalidFeature,
                    format!("feature '{name}' value {value} does not match its declared type; not copied"),
                    position.clone(),
                ));
                continue;
            }
        }
        features.insert(name.clone(), value.clone());
    }
    features
}

/// Positions of the representative's slot targets. A target that cannot be
/// positioned at all is dropped here with a diagnostic; targets that simply
/// have not merged yet are resolved after the position walk.
fn link_targets(
    rep: &AnnotationInstance,
    doc: &AnnotatorDocument,
    schema: &ProjectSchema,
    position: &Position,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(String, Position)> {
    let mut targets = Vec::with_capacity(rep.links.len());
    for link in &rep.links {
        let target_position = doc.get(link.target).and_then(|target| {
            schema
                .layer(&target.layer)
                .and_then(|layer| Position::of_span(target, layer))
        });
        match target_position {
            Some(p) => targets.push((link.role.clone(), p)),
            None => diagnostics.push(Diagnostic::at(
                DiagnosticKind::DanglingReference,
                format!("slot '{}' target has no position; link dropped", link.role),
                position.clone(),
            )),
        }
    }
    targets
}

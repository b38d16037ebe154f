//! Pluggable decision policies for the merge engine.

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::diff::ConfigurationSet;
use crate::error::Result;
use crate::schema::ProjectSchema;

/// What a strategy decided for one configuration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    /// Write the configuration at this index into the consensus document.
    Accept(usize),
    /// Leave the position untouched for a later (manual) decision.
    Defer,
    /// Remove any stale consensus instance at this position.
    Reject,
}

/// Call context handed to a strategy for each decision.
///
/// Strategies attach explanatory diagnostics (e.g. a tie-break note) here;
/// the merge engine drains them into the report after every decision.
pub struct MergeContext<'a> {
    /// The project schema the run uses.
    pub schema: &'a ProjectSchema,

    /// Number of tracked annotators in the run.
    pub annotator_count: usize,

    notes: Vec<Diagnostic>,
}

impl<'a> MergeContext<'a> {
    /// Create a context for a merge run.
    pub fn new(schema: &'a ProjectSchema, annotator_count: usize) -> Self {
        Self {
            schema,
            annotator_count,
            notes: Vec::new(),
        }
    }

    /// Attach a diagnostic to the current decision.
    pub fn note(&mut self, diagnostic: Diagnostic) {
        self.notes.push(diagnostic);
    }

    pub(crate) fn take_notes(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.notes)
    }
}

/// A pluggable decision policy.
///
/// The merge engine never special-cases a concrete strategy; new policies
/// are added by implementing this trait. A strategy failure aborts the
/// failing position and everything after it, but keeps what was already
/// merged.
pub trait MergeStrategy {
    /// Name used in diagnostics and error messages.
    fn name(&self) -> &str;

    /// Decide how one configuration set is resolved.
    fn decide(&self, set: &ConfigurationSet, ctx: &mut MergeContext<'_>) -> Result<MergeDecision>;
}

/// Accept only unanimous positions; defer everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementStrategy;

impl MergeStrategy for AgreementStrategy {
    fn name(&self) -> &str {
        "agreement"
    }

    fn decide(&self, set: &ConfigurationSet, _ctx: &mut MergeContext<'_>) -> Result<MergeDecision> {
        if set.is_agreeing() {
            Ok(MergeDecision::Accept(0))
        } else {
            Ok(MergeDecision::Defer)
        }
    }
}

/// Accept the best-supported configuration when it reaches a minimum
/// annotator count; defer otherwise.
///
/// Ties between equally supported configurations are broken
/// deterministically: the configuration whose sorted annotator-id set is
/// lexicographically smallest wins, and a tie-break diagnostic is noted.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdStrategy {
    /// Minimum number of annotators the winning configuration must have.
    pub min_annotators: usize,
}

impl ThresholdStrategy {
    /// Create a threshold strategy.
    pub fn new(min_annotators: usize) -> Self {
        Self { min_annotators }
    }
}

impl MergeStrategy for ThresholdStrategy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn decide(&self, set: &ConfigurationSet, ctx: &mut MergeContext<'_>) -> Result<MergeDecision> {
        let candidates = set.best_supported();
        let Some(&first) = candidates.first() else {
            return Ok(MergeDecision::Defer);
        };
        if set.configurations[first].support() < self.min_annotators {
            return Ok(MergeDecision::Defer);
        }

        let winner = candidates
            .iter()
            .copied()
            .min_by(|&x, &y| {
                set.configurations[x]
                    .annotators
                    .cmp(&set.configurations[y].annotators)
            })
            .unwrap_or(first);

        if candidates.len() > 1 {
            ctx.note(Diagnostic::at(
                DiagnosticKind::TieBreak,
                format!(
                    "{} configurations tied at support {}; accepted the one held by {:?}",
                    candidates.len(),
                    set.configurations[winner].support(),
                    set.configurations[winner].annotators
                ),
                set.position.clone(),
            ));
        }

        Ok(MergeDecision::Accept(winner))
    }
}

/// Defer every position; a human resolves everything outside this core.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualStrategy;

impl MergeStrategy for ManualStrategy {
    fn name(&self) -> &str {
        "manual"
    }

    fn decide(&self, _set: &ConfigurationSet, _ctx: &mut MergeContext<'_>) -> Result<MergeDecision> {
        Ok(MergeDecision::Defer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Configuration, Position};
    use crate::model::SpanRef;
    use std::collections::BTreeSet;

    fn set(position: Position, groups: &[&[&str]]) -> ConfigurationSet {
        let mut configurations = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            configurations.push(Configuration {
                position: position.clone(),
                annotators: group.iter().map(|a| a.to_string()).collect::<BTreeSet<_>>(),
                representative: (group[0].to_string(), SpanRef(i)),
                fingerprint: format!("fp{i}"),
            });
        }
        ConfigurationSet {
            position,
            configurations,
            absent: BTreeSet::new(),
        }
    }

    fn ctx_schema() -> ProjectSchema {
        ProjectSchema::new()
    }

    #[test]
    fn agreement_accepts_unanimity_only() {
        let schema = ctx_schema();
        let mut ctx = MergeContext::new(&schema, 3);
        let unanimous = set(Position::span("ne", 0, 5), &[&["anna", "ben", "cora"]]);
        let split = set(Position::span("ne", 0, 5), &[&["anna"], &["ben", "cora"]]);

        assert_eq!(
            AgreementStrategy.decide(&unanimous, &mut ctx).unwrap(),
            MergeDecision::Accept(0)
        );
        assert_eq!(
            AgreementStrategy.decide(&split, &mut ctx).unwrap(),
            MergeDecision::Defer
        );
    }

    #[test]
    fn threshold_accepts_majority() {
        let schema = ctx_schema();
        let mut ctx = MergeContext::new(&schema, 3);
        let split = set(Position::span("ne", 0, 5), &[&["anna"], &["ben", "cora"]]);

        let decision = ThresholdStrategy::new(2).decide(&split, &mut ctx).unwrap();
        assert_eq!(decision, MergeDecision::Accept(1));
        assert!(ctx.take_notes().is_empty());
    }

    #[test]
    fn threshold_defers_below_minimum() {
        let schema = ctx_schema();
        let mut ctx = MergeContext::new(&schema, 3);
        let split = set(Position::span("ne", 0, 5), &[&["anna"], &["ben"]]);

        let decision = ThresholdStrategy::new(2).decide(&split, &mut ctx).unwrap();
        assert_eq!(decision, MergeDecision::Defer);
    }

    #[test]
    fn threshold_tie_break_is_deterministic_and_noted() {
        let schema = ctx_schema();
        let mut ctx = MergeContext::new(&schema, 2);
        // "ben" < "cora" lexicographically, but "anna" < "ben": the set
        // containing "anna" wins regardless of configuration order.
        let tied = set(Position::span("ne", 0, 5), &[&["cora"], &["anna"]]);

        let decision = ThresholdStrategy::new(1).decide(&tied, &mut ctx).unwrap();
        assert_eq!(decision, MergeDecision::Accept(1));
        let notes = ctx.take_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, DiagnosticKind::TieBreak);
    }

    #[test]
    fn manual_always_defers() {
        let schema = ctx_schema();
        let mut ctx = MergeContext::new(&schema, 3);
        let unanimous = set(Position::span("ne", 0, 5), &[&["anna", "ben", "cora"]]);
        assert_eq!(
            ManualStrategy.decide(&unanimous, &mut ctx).unwrap(),
            MergeDecision::Defer
        );
    }
}

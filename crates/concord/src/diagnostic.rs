//! Diagnostics emitted by the diff and merge engines.

use serde::{Deserialize, Serialize};

use crate::diff::Position;

/// Kind of diagnostic raised during a diff or merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A relation references an endpoint that never received a position.
    DanglingReference,
    /// A relation endpoint was deferred or rejected, so the relation was
    /// deferred as well.
    EndpointUnresolved,
    /// A consensus instance already existed at the position and the layer's
    /// stacking policy kept the first one.
    StackingSkipped,
    /// A consensus instance already existed at the position and was replaced.
    Replaced,
    /// A feature value failed validation against the layer schema and was
    /// not copied.
    InvalidFeature,
    /// An annotator contributed no instance of a tracked layer.
    MissingLayer,
    /// A threshold strategy broke a tie between equally supported
    /// configurations.
    TieBreak,
    /// A strategy failed; this position and all later ones were abandoned.
    StrategyFailed,
}

impl DiagnosticKind {
    /// Get a human-readable label for the diagnostic kind.
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::DanglingReference => "Dangling Reference",
            DiagnosticKind::EndpointUnresolved => "Endpoint Unresolved",
            DiagnosticKind::StackingSkipped => "Stacking Skipped",
            DiagnosticKind::Replaced => "Replaced",
            DiagnosticKind::InvalidFeature => "Invalid Feature",
            DiagnosticKind::MissingLayer => "Missing Layer",
            DiagnosticKind::TieBreak => "Tie Break",
            DiagnosticKind::StrategyFailed => "Strategy Failed",
        }
    }
}

/// A single diagnostic message with an optional position reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// What happened.
    pub kind: DiagnosticKind,

    /// Human-readable description.
    pub message: String,

    /// The position this diagnostic refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl Diagnostic {
    /// Create a diagnostic without a position reference.
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    /// Create a diagnostic referring to a position.
    pub fn at(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position: Some(position),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "[{}] {} ({})", self.kind.label(), self.message, pos),
            None => write!(f, "[{}] {}", self.kind.label(), self.message),
        }
    }
}

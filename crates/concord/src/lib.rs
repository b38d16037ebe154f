//! Concord: reconciliation engine for multi-annotator annotation projects.
//!
//! Many annotators independently label the same document with spans and
//! relations; Concord diffs their documents into agreement/disagreement
//! groups and merges them into one consensus document under a pluggable
//! decision strategy.
//!
//! # Core Principles
//!
//! - **Pure**: one invocation is a pure function from frozen snapshots and
//!   a strategy to a consensus document plus diagnostics
//! - **Deterministic**: identical inputs always produce an identical
//!   consensus and diagnostics sequence, regardless of input ordering
//! - **Partial-failure tolerant**: per-position problems degrade to
//!   diagnostics; the run continues
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use concord::{
//!     AgreementStrategy, AnnotationInstance, AnnotatorDocument, Curator, LayerSchema,
//!     ProjectSchema,
//! };
//!
//! let schema = ProjectSchema::new().with_layer(LayerSchema::span("NamedEntity"));
//!
//! let mut docs = BTreeMap::new();
//! for name in ["anna", "ben", "cora"] {
//!     let mut doc = AnnotatorDocument::new(name);
//!     doc.push(AnnotationInstance::span("NamedEntity", 10, 15).with_feature("value", "PER"));
//!     docs.insert(name.to_string(), doc);
//! }
//!
//! let outcome = Curator::new(schema).curate(&docs, &AgreementStrategy).unwrap();
//! assert_eq!(outcome.consensus.len(), 1);
//! assert_eq!(outcome.diff.summary.agreeing, 1);
//! ```

pub mod align;
pub mod diagnostic;
pub mod diff;
pub mod error;
pub mod merge;
pub mod model;
pub mod schema;
pub mod store;

mod curator;

pub use crate::curator::{CONSENSUS_ANNOTATOR, CurationOutcome, Curator, CuratorConfig};
pub use align::DualListAligner;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use diff::{
    BoundaryClash, Configuration, ConfigurationSet, DiffConfig, DiffEngine, DiffResult,
    DiffSummary, Position,
};
pub use error::{ConcordError, Result};
pub use merge::{
    AgreementStrategy, ManualStrategy, MergeContext, MergeDecision, MergeEngine, MergeReport,
    MergeStrategy, ThresholdStrategy,
};
pub use model::{
    AnnotationBody, AnnotationInstance, AnnotatorDocument, FeatureMap, FeatureValue, LinkFeature,
    SpanRef,
};
pub use schema::{
    FeatureComparisonMode, FeatureKind, LayerKind, LayerSchema, ProjectSchema, StackingPolicy,
};
pub use store::{DocumentStore, JsonDirectoryStore, MemoryStore};

//! Main Curator struct and public API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::{DiffConfig, DiffEngine, DiffResult};
use crate::error::Result;
use crate::merge::{MergeEngine, MergeReport, MergeStrategy};
use crate::model::AnnotatorDocument;
use crate::schema::ProjectSchema;

/// Annotator id the consensus document is created under.
pub const CONSENSUS_ANNOTATOR: &str = "consensus";

/// Configuration for a curation run.
#[derive(Debug, Clone, Default)]
pub struct CuratorConfig {
    /// Diff engine configuration.
    pub diff: DiffConfig,
}

impl CuratorConfig {
    /// Create a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the diff configuration (builder style).
    pub fn with_diff(mut self, diff: DiffConfig) -> Self {
        self.diff = diff;
        self
    }
}

/// Result of one curation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationOutcome {
    /// The consensus document.
    pub consensus: AnnotatorDocument,
    /// The full diff the merge was driven by.
    pub diff: DiffResult,
    /// Merge counts and ordered diagnostics.
    pub report: MergeReport,
}

/// The curation facade: diff all annotators, then merge with a strategy.
///
/// A `Curator` is a pure function from `(snapshots, strategy)` to
/// `(consensus, diagnostics)`: it holds only the schema and configuration,
/// performs no I/O, and keeps no state between calls. Separate invocations
/// may run on separate threads with no coordination, provided each gets its
/// own snapshots.
pub struct Curator {
    schema: ProjectSchema,
    config: CuratorConfig,
}

impl Curator {
    /// Create a curator for a project schema with default configuration.
    pub fn new(schema: ProjectSchema) -> Self {
        Self {
            schema,
            config: CuratorConfig::default(),
        }
    }

    /// Set the configuration (builder style).
    pub fn with_config(mut self, config: CuratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The schema this curator runs under.
    pub fn schema(&self) -> &ProjectSchema {
        &self.schema
    }

    /// Diff the annotator documents and merge into a fresh consensus
    /// document.
    pub fn curate(
        &self,
        docs: &BTreeMap<String, AnnotatorDocument>,
        strategy: &dyn MergeStrategy,
    ) -> Result<CurationOutcome> {
        let mut consensus = AnnotatorDocument::new(CONSENSUS_ANNOTATOR);
        let (diff, report) = self.curate_into(docs, strategy, &mut consensus)?;
        Ok(CurationOutcome {
            consensus,
            diff,
            report,
        })
    }

    /// Diff and merge into an existing (possibly pre-populated) consensus
    /// document, e.g. to resume after manual decisions.
    pub fn curate_into(
        &self,
        docs: &BTreeMap<String, AnnotatorDocument>,
        strategy: &dyn MergeStrategy,
        consensus: &mut AnnotatorDocument,
    ) -> Result<(DiffResult, MergeReport)> {
        let diff = DiffEngine::with_config(self.config.diff.clone()).diff(&self.schema, docs)?;
        let report = MergeEngine::new().merge(&self.schema, &diff, docs, strategy, consensus)?;
        Ok((diff, report))
    }

    /// Diff only, without merging.
    pub fn diff(&self, docs: &BTreeMap<String, AnnotatorDocument>) -> Result<DiffResult> {
        DiffEngine::with_config(self.config.diff.clone()).diff(&self.schema, docs)
    }
}

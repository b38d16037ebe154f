//! Project schema: the tracked layers and their comparison/merge settings.
//!
//! The schema is fetched once per call from the surrounding project
//! configuration and carried explicitly through diff and merge. The engines
//! never discover types at runtime.

mod layer;
mod types;

pub use layer::{LayerSchema, ProjectSchema};
pub use types::{FeatureComparisonMode, FeatureKind, LayerKind, StackingPolicy};

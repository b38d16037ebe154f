//! N-way diff: positions, configurations, and the diff engine.
//!
//! The diff engine buckets every tracked instance from every annotator by
//! its [`Position`], partitions each bucket into [`Configuration`]s by
//! feature equality under the layer's comparison mode, and classifies each
//! resulting [`ConfigurationSet`] as agreeing, disagreeing, and/or
//! incomplete.

mod configuration;
mod engine;
mod position;

pub use configuration::{Configuration, ConfigurationSet};
pub use engine::{BoundaryClash, DiffConfig, DiffEngine, DiffResult, DiffSummary};
pub use position::Position;

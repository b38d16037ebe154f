//! Merge engine and decision strategies.

mod engine;
mod strategy;

pub use engine::{MergeEngine, MergeReport};
pub use strategy::{
    AgreementStrategy, ManualStrategy, MergeContext, MergeDecision, MergeStrategy,
    ThresholdStrategy,
};

//! Data model: annotation instances, per-annotator documents, and features.
//!
//! An [`AnnotatorDocument`] is a frozen snapshot of everything one annotator
//! produced for one document. Instances live in an arena inside the document
//! and reference each other by stable [`SpanRef`] index, never by pointer, so
//! snapshots from different annotators and the consensus document never
//! alias.

mod document;
mod feature;
mod instance;

pub use document::AnnotatorDocument;
pub use feature::{FeatureMap, FeatureValue, LinkFeature};
pub use instance::{AnnotationBody, AnnotationInstance, SpanRef};

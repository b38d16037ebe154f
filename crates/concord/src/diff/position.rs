//! Canonical identity keys for comparing annotations across annotators.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::AnnotationInstance;
use crate::schema::LayerSchema;

/// The canonical grouping key of an annotation instance.
///
/// Two instances from different annotators land at the same position exactly
/// when they annotate the same thing: same layer and offsets for spans, same
/// layer and endpoint positions for relations. Position computation is pure;
/// it never depends on annotator ordering or arena indices.
///
/// The total order ranks every span position before every relation position,
/// then sorts spans by `(begin, end, layer, disambiguator)`. The merge
/// engine walks positions in this order, so a relation is never processed
/// before the spans it references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// A span at `[begin, end)` on a layer.
    Span {
        layer: String,
        begin: usize,
        end: usize,
        /// Disambiguating feature value for deliberately stacked instances,
        /// when the layer schema names one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        disambiguator: Option<String>,
    },
    /// A relation identified by the positions of its endpoints.
    Relation {
        layer: String,
        source: Box<Position>,
        target: Box<Position>,
    },
}

impl Position {
    /// Create a span position without a disambiguator.
    pub fn span(layer: impl Into<String>, begin: usize, end: usize) -> Self {
        Position::Span {
            layer: layer.into(),
            begin,
            end,
            disambiguator: None,
        }
    }

    /// Position of a span instance under its layer schema.
    ///
    /// Folds the layer's disambiguating feature value into the key when one
    /// is declared. Returns `None` for relation instances.
    pub fn of_span(instance: &AnnotationInstance, layer: &LayerSchema) -> Option<Self> {
        let (begin, end) = instance.span_range()?;
        let disambiguator = layer
            .disambiguator
            .as_ref()
            .and_then(|f| instance.features.get(f))
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        Some(Position::Span {
            layer: instance.layer.clone(),
            begin,
            end,
            disambiguator,
        })
    }

    /// Create a relation position from its endpoint positions.
    pub fn relation(layer: impl Into<String>, source: Position, target: Position) -> Self {
        Position::Relation {
            layer: layer.into(),
            source: Box::new(source),
            target: Box::new(target),
        }
    }

    /// The layer this position belongs to.
    pub fn layer(&self) -> &str {
        match self {
            Position::Span { layer, .. } | Position::Relation { layer, .. } => layer,
        }
    }

    /// True for span positions.
    pub fn is_span(&self) -> bool {
        matches!(self, Position::Span { .. })
    }

    /// The `(begin, end)` offsets of a span position.
    pub fn offsets(&self) -> Option<(usize, usize)> {
        match self {
            Position::Span { begin, end, .. } => Some((*begin, *end)),
            Position::Relation { .. } => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Position::Span { .. } => 0,
            Position::Relation { .. } => 1,
        }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Position::Span {
                    layer: la,
                    begin: ba,
                    end: ea,
                    disambiguator: da,
                },
                Position::Span {
                    layer: lb,
                    begin: bb,
                    end: eb,
                    disambiguator: db,
                },
            ) => (ba, ea, la, da).cmp(&(bb, eb, lb, db)),
            (
                Position::Relation {
                    layer: la,
                    source: sa,
                    target: ta,
                },
                Position::Relation {
                    layer: lb,
                    source: sb,
                    target: tb,
                },
            ) => sa
                .cmp(sb)
                .then_with(|| ta.cmp(tb))
                .then_with(|| la.cmp(lb)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Span {
                layer,
                begin,
                end,
                disambiguator,
            } => match disambiguator {
                Some(d) => write!(f, "{layer}[{begin},{end})@{d}"),
                None => write!(f, "{layer}[{begin},{end})"),
            },
            Position::Relation {
                layer,
                source,
                target,
            } => write!(f, "{layer}({source} -> {target})"),
        }
    }
}

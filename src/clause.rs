//! Abstract query clauses.
//!
//! A [`Clause`] is an immutable node of a query tree as produced by a query
//! parser. Besides its structure it exposes the properties the optimizer and
//! the pattern compiler rely on: estimated hit counts, whether it can be
//! compiled to an NFA, whether it matches the empty sequence and the bounds
//! on its hit lengths.

mod anchored;
mod cost;
mod display;

use serde::{Deserialize, Serialize};

pub use anchored::AnchoredNfa;
pub use cost::{SegmentStatistics, TERM_FORWARD_COST, UNBOUNDED_COST_STEPS};

use crate::forward_index::Sensitivity;

/// Which side of a clause an expansion adds tokens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpansionSide {
    Left,
    Right,
}

/// Relation tested by a position filter between producer and filter hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperation {
    /// Keep producer hits whose window contains a filter hit.
    Containing,
    /// Keep producer hits lying inside a filter hit.
    Within,
    /// Keep producer hits whose window contains no filter hit.
    NotContaining,
    /// Keep producer hits not inside any filter hit.
    NotWithin,
}

impl FilterOperation {
    pub fn name(self) -> &'static str {
        match self {
            FilterOperation::Containing => "CONTAINING",
            FilterOperation::Within => "WITHIN",
            FilterOperation::NotContaining => "NOTCONTAINING",
            FilterOperation::NotWithin => "NOTWITHIN",
        }
    }
}

/// Query clause. `max: None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// One token whose annotation value equals `value`.
    Term {
        annotation: String,
        value: String,
        sensitivity: Sensitivity,
    },
    /// One token whose annotation value matches a regular expression.
    Regex {
        annotation: String,
        pattern: String,
        sensitivity: Sensitivity,
    },
    /// A run of `min..=max` arbitrary tokens.
    AnyToken { min: u32, max: Option<u32> },
    Sequence(Vec<Clause>),
    Alternation(Vec<Clause>),
    Repetition {
        clause: Box<Clause>,
        min: u32,
        max: Option<u32>,
    },
    /// One token not matched by the (single-token) inner clause.
    Negation(Box<Clause>),
    /// The inner clause with `min..=max` arbitrary tokens added on one side.
    Expansion {
        clause: Box<Clause>,
        side: ExpansionSide,
        min: u32,
        max: Option<u32>,
    },
    /// Producer hits filtered by their relation to filter hits. The window
    /// tested is the producer hit with its start moved by `adjust_left`
    /// and its end by `adjust_right`.
    PositionFilter {
        producer: Box<Clause>,
        filter: Box<Clause>,
        operation: FilterOperation,
        adjust_left: i32,
        adjust_right: i32,
    },
    /// Anchor evaluated normally, neighbour matched through the forward index.
    AnchoredNfa(AnchoredNfa),
}

/// Largest repetition bound the pattern compiler unrolls. Bounded
/// repetitions become one automaton copy per allowed occurrence, so larger
/// bounds are left to the inverted index.
pub const MAX_UNROLLED_COPIES: u32 = 10_000;

/// Bounds the pattern compiler accepts: not inverted and within
/// [`MAX_UNROLLED_COPIES`].
pub(crate) fn compilable_bounds(min: u32, max: Option<u32>) -> bool {
    max.is_none_or(|max| max >= min) && max.unwrap_or(min) <= MAX_UNROLLED_COPIES
}

fn add_max(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    Some(a?.saturating_add(b?))
}

impl Clause {
    pub fn term(annotation: &str, value: &str, sensitivity: Sensitivity) -> Self {
        Clause::Term {
            annotation: annotation.to_string(),
            value: value.to_string(),
            sensitivity,
        }
    }

    pub fn regex(annotation: &str, pattern: &str, sensitivity: Sensitivity) -> Self {
        Clause::Regex {
            annotation: annotation.to_string(),
            pattern: pattern.to_string(),
            sensitivity,
        }
    }

    pub fn any_token(min: u32, max: Option<u32>) -> Self {
        Clause::AnyToken { min, max }
    }

    pub fn sequence(clauses: Vec<Clause>) -> Self {
        Clause::Sequence(clauses)
    }

    pub fn alternation(clauses: Vec<Clause>) -> Self {
        Clause::Alternation(clauses)
    }

    pub fn repetition(clause: Clause, min: u32, max: Option<u32>) -> Self {
        Clause::Repetition {
            clause: Box::new(clause),
            min,
            max,
        }
    }

    pub fn negation(clause: Clause) -> Self {
        Clause::Negation(Box::new(clause))
    }

    pub fn expansion(clause: Clause, side: ExpansionSide, min: u32, max: Option<u32>) -> Self {
        Clause::Expansion {
            clause: Box::new(clause),
            side,
            min,
            max,
        }
    }

    pub fn position_filter(
        producer: Clause,
        filter: Clause,
        operation: FilterOperation,
        adjust_left: i32,
        adjust_right: i32,
    ) -> Self {
        Clause::PositionFilter {
            producer: Box::new(producer),
            filter: Box::new(filter),
            operation,
            adjust_left,
            adjust_right,
        }
    }

    /// Whether the empty token sequence is a hit.
    pub fn matches_empty_sequence(&self) -> bool {
        match self {
            Clause::Term { .. } | Clause::Regex { .. } | Clause::Negation(_) => false,
            Clause::AnyToken { min, .. } => *min == 0,
            Clause::Sequence(clauses) => clauses.iter().all(Clause::matches_empty_sequence),
            Clause::Alternation(clauses) => clauses.iter().any(Clause::matches_empty_sequence),
            Clause::Repetition { clause, min, .. } => *min == 0 || clause.matches_empty_sequence(),
            Clause::Expansion { clause, min, .. } => *min == 0 && clause.matches_empty_sequence(),
            Clause::PositionFilter { producer, .. } => producer.matches_empty_sequence(),
            Clause::AnchoredNfa(a) => a.anchor().matches_empty_sequence() && a.nfa_clause().matches_empty_sequence(),
        }
    }

    /// Shortest possible hit.
    pub fn hits_length_min(&self) -> u32 {
        match self {
            Clause::Term { .. } | Clause::Regex { .. } | Clause::Negation(_) => 1,
            Clause::AnyToken { min, .. } => *min,
            Clause::Sequence(clauses) => clauses
                .iter()
                .fold(0u32, |acc, c| acc.saturating_add(c.hits_length_min())),
            Clause::Alternation(clauses) => clauses.iter().map(Clause::hits_length_min).min().unwrap_or(0),
            Clause::Repetition { clause, min, .. } => clause.hits_length_min().saturating_mul(*min),
            Clause::Expansion { clause, min, .. } => clause.hits_length_min().saturating_add(*min),
            Clause::PositionFilter { producer, .. } => producer.hits_length_min(),
            Clause::AnchoredNfa(a) => a
                .anchor()
                .hits_length_min()
                .saturating_add(a.nfa_clause().hits_length_min()),
        }
    }

    /// Longest possible hit, `None` if unbounded.
    pub fn hits_length_max(&self) -> Option<u32> {
        match self {
            Clause::Term { .. } | Clause::Regex { .. } | Clause::Negation(_) => Some(1),
            Clause::AnyToken { max, .. } => *max,
            Clause::Sequence(clauses) => clauses
                .iter()
                .try_fold(0u32, |acc, c| Some(acc.saturating_add(c.hits_length_max()?))),
            Clause::Alternation(clauses) => clauses
                .iter()
                .try_fold(0u32, |acc, c| Some(acc.max(c.hits_length_max()?))),
            Clause::Repetition { clause, max, .. } => match (clause.hits_length_max(), max) {
                (Some(0), _) => Some(0),
                (Some(len), Some(max)) => Some(len.saturating_mul(*max)),
                _ => None,
            },
            Clause::Expansion { clause, max, .. } => add_max(clause.hits_length_max(), *max),
            Clause::PositionFilter { producer, .. } => producer.hits_length_max(),
            Clause::AnchoredNfa(a) => add_max(a.anchor().hits_length_max(), a.nfa_clause().hits_length_max()),
        }
    }

    pub fn hits_all_same_length(&self) -> bool {
        self.hits_length_max() == Some(self.hits_length_min())
    }

    /// Whether every hit is exactly one token long and the clause reduces
    /// to a single token test.
    pub fn is_single_token(&self) -> bool {
        match self {
            Clause::Term { .. } | Clause::Regex { .. } => true,
            Clause::AnyToken { min, max } => *min == 1 && *max == Some(1),
            Clause::Negation(inner) => inner.is_single_token(),
            Clause::Alternation(clauses) => !clauses.is_empty() && clauses.iter().all(Clause::is_single_token),
            Clause::Sequence(clauses) => clauses.len() == 1 && clauses[0].is_single_token(),
            Clause::Repetition { clause, min, max } => *min == 1 && *max == Some(1) && clause.is_single_token(),
            Clause::Expansion { clause, min, max, .. } => *min == 0 && *max == Some(0) && clause.is_single_token(),
            Clause::PositionFilter { .. } | Clause::AnchoredNfa(_) => false,
        }
    }

    /// Whether the pattern compiler accepts this clause.
    pub fn can_make_nfa(&self) -> bool {
        match self {
            Clause::Term { .. } | Clause::Regex { .. } => true,
            Clause::AnyToken { min, max } => compilable_bounds(*min, *max),
            Clause::Sequence(clauses) | Clause::Alternation(clauses) => clauses.iter().all(Clause::can_make_nfa),
            Clause::Repetition { clause, min, max } | Clause::Expansion { clause, min, max, .. } => {
                compilable_bounds(*min, *max) && clause.can_make_nfa()
            }
            Clause::Negation(inner) => inner.is_single_token(),
            Clause::PositionFilter { .. } => false,
            Clause::AnchoredNfa(a) => a.anchor().can_make_nfa(),
        }
    }

    /// Annotation the clause looks at first, if any.
    pub fn primary_annotation(&self) -> Option<&str> {
        match self {
            Clause::Term { annotation, .. } | Clause::Regex { annotation, .. } => Some(annotation),
            Clause::AnyToken { .. } => None,
            Clause::Sequence(clauses) | Clause::Alternation(clauses) => {
                clauses.iter().find_map(Clause::primary_annotation)
            }
            Clause::Repetition { clause, .. } | Clause::Negation(clause) | Clause::Expansion { clause, .. } => {
                clause.primary_annotation()
            }
            Clause::PositionFilter { producer, .. } => producer.primary_annotation(),
            Clause::AnchoredNfa(a) => a
                .nfa_clause()
                .primary_annotation()
                .or_else(|| a.anchor().primary_annotation()),
        }
    }

    /// Splice nested sequences into one flat list.
    pub fn flatten_into(self, out: &mut Vec<Clause>) {
        match self {
            Clause::Sequence(clauses) => {
                for clause in clauses {
                    clause.flatten_into(out);
                }
            }
            other => out.push(other),
        }
    }

    /// Build a sequence from parts, flattening nested sequences and
    /// unwrapping a single element.
    pub fn flat_sequence(parts: impl IntoIterator<Item = Clause>) -> Clause {
        let mut out = Vec::new();
        for part in parts {
            part.flatten_into(&mut out);
        }
        if out.len() == 1 {
            out.pop().unwrap_or(Clause::Sequence(Vec::new()))
        } else {
            Clause::Sequence(out)
        }
    }
}

use std::fmt;

use crate::clause::{Clause, ExpansionSide};
use crate::forward_index::Sensitivity;
use crate::nfa::Direction;

impl ExpansionSide {
    pub fn name(self) -> &'static str {
        match self {
            ExpansionSide::Left => "L",
            ExpansionSide::Right => "R",
        }
    }
}

fn bound(max: Option<u32>) -> i64 {
    max.map_or(-1, i64::from)
}

fn annotation_label(annotation: &str, sensitivity: Sensitivity) -> String {
    match sensitivity {
        Sensitivity::Sensitive => annotation.to_string(),
        Sensitivity::Insensitive => format!("{annotation}@i"),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, clauses: &[Clause]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{clause}")?;
    }
    f.write_str(")")
}

/// Compact textual form, e.g. `REP(TERM(word:a), 1, -1)`. `-1` stands for
/// an unbounded maximum.
impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Term {
                annotation,
                value,
                sensitivity,
            } => write!(f, "TERM({}:{value})", annotation_label(annotation, *sensitivity)),
            Clause::Regex {
                annotation,
                pattern,
                sensitivity,
            } => write!(f, "REGEX({}:{pattern})", annotation_label(annotation, *sensitivity)),
            Clause::AnyToken { min, max } => write!(f, "ANYTOKEN({min}, {})", bound(*max)),
            Clause::Sequence(clauses) => write_list(f, "SEQ", clauses),
            Clause::Alternation(clauses) => write_list(f, "OR", clauses),
            Clause::Repetition { clause, min, max } => write!(f, "REP({clause}, {min}, {})", bound(*max)),
            Clause::Negation(inner) => write!(f, "NOT({inner})"),
            Clause::Expansion {
                clause,
                side,
                min,
                max,
            } => write!(f, "EXPAND({clause}, {}, {min}, {})", side.name(), bound(*max)),
            Clause::PositionFilter {
                producer,
                filter,
                operation,
                adjust_left,
                adjust_right,
            } => write!(
                f,
                "POSFILTER({producer}, {filter}, {}, {adjust_left}, {adjust_right})",
                operation.name()
            ),
            Clause::AnchoredNfa(a) => {
                let direction = match a.direction() {
                    Direction::Forward => "FORWARD",
                    Direction::Backward => "BACKWARD",
                };
                write!(f, "FISEQ({}, {}, {direction})", a.anchor(), a.nfa_clause())
            }
        }
    }
}

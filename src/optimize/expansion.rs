use crate::clause::{Clause, ExpansionSide};
use crate::error::Result;
use crate::optimize::{CombineRule, OptimizeContext, Priority};

/// An any-token run next to a clause.
const ABSORB_ANY_TOKEN: Priority = 200;
/// A clause next to the open side of an expansion.
const ABSORB_NEIGHBOUR: Priority = 250;

/// Turns any-token runs into expansions of their neighbour and pulls
/// neighbours into an expansion on the side it expands, so the expanded
/// positions are only evaluated once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpansionInternalization;

enum Merge<'a> {
    /// `min..=max` arbitrary tokens added on `side` of `clause`.
    AnyToken {
        clause: &'a Clause,
        side: ExpansionSide,
        min: u32,
        max: Option<u32>,
    },
    /// `neighbour` joined to the closed side of `expansion`.
    Neighbour { expansion: &'a Clause, neighbour: &'a Clause },
}

fn is_any_token(clause: &Clause) -> bool {
    matches!(clause, Clause::AnyToken { .. })
}

fn is_expansion(clause: &Clause, wanted: ExpansionSide) -> bool {
    matches!(clause, Clause::Expansion { side, .. } if *side == wanted)
}

fn classify<'a>(left: &'a Clause, right: &'a Clause) -> Option<(Priority, Merge<'a>)> {
    match (left, right) {
        (Clause::AnyToken { min, max }, clause) if !is_any_token(clause) => Some((
            ABSORB_ANY_TOKEN,
            Merge::AnyToken {
                clause,
                side: ExpansionSide::Left,
                min: *min,
                max: *max,
            },
        )),
        (clause, Clause::AnyToken { min, max }) if !is_any_token(clause) => Some((
            ABSORB_ANY_TOKEN,
            Merge::AnyToken {
                clause,
                side: ExpansionSide::Right,
                min: *min,
                max: *max,
            },
        )),
        (neighbour, expansion) if is_expansion(expansion, ExpansionSide::Right) => {
            Some((ABSORB_NEIGHBOUR, Merge::Neighbour { expansion, neighbour }))
        }
        (expansion, neighbour) if is_expansion(expansion, ExpansionSide::Left) => {
            Some((ABSORB_NEIGHBOUR, Merge::Neighbour { expansion, neighbour }))
        }
        _ => None,
    }
}

impl CombineRule for ExpansionInternalization {
    fn name(&self) -> &'static str {
        "expansion internalization"
    }

    fn priority(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Option<Priority> {
        classify(left, right).map(|(priority, _)| priority)
    }

    fn combine(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let Some((_, merge)) = classify(left, right) else {
            panic!("cannot internalize {left} and {right}: no expansion or any-token run");
        };
        Ok(match merge {
            Merge::AnyToken { clause, side, min, max } => match clause {
                Clause::Expansion {
                    clause: inner,
                    side: existing,
                    min: inner_min,
                    max: inner_max,
                } if *existing == side => Clause::expansion(
                    (**inner).clone(),
                    side,
                    inner_min.saturating_add(min),
                    inner_max.zip(max).map(|(a, b)| a.saturating_add(b)),
                ),
                other => Clause::expansion(other.clone(), side, min, max),
            },
            Merge::Neighbour { expansion, neighbour } => {
                let Clause::Expansion {
                    clause: inner,
                    side,
                    min,
                    max,
                } = expansion
                else {
                    unreachable!("classified as expansion")
                };
                let joined = match side {
                    ExpansionSide::Right => Clause::flat_sequence([neighbour.clone(), (**inner).clone()]),
                    ExpansionSide::Left => Clause::flat_sequence([(**inner).clone(), neighbour.clone()]),
                };
                Clause::expansion(joined, *side, *min, *max)
            }
        })
    }
}

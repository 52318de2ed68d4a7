use crate::clause::Clause;
use crate::error::Result;
use crate::optimize::{CombineRule, OptimizeContext, Priority};

const PRIORITY: Priority = 100;

static SINGLE_ANY_TOKEN: Clause = Clause::AnyToken { min: 1, max: Some(1) };

/// Merges adjacent repetitions of the same clause, summing their bounds.
/// A plain clause counts as one repetition of itself and an any-token run
/// as a repetition of a single any-token.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepetitionFolding;

/// The repeated clause and its bounds, if the bounds are well formed.
fn unit(clause: &Clause) -> Option<(&Clause, u32, Option<u32>)> {
    let (unit, min, max) = match clause {
        Clause::Repetition { clause, min, max } if **clause == SINGLE_ANY_TOKEN => (&SINGLE_ANY_TOKEN, *min, *max),
        Clause::Repetition { clause, min, max } => (clause.as_ref(), *min, *max),
        Clause::AnyToken { min, max } => (&SINGLE_ANY_TOKEN, *min, *max),
        other => (other, 1, Some(1)),
    };
    max.is_none_or(|max| max >= min).then_some((unit, min, max))
}

impl CombineRule for RepetitionFolding {
    fn name(&self) -> &'static str {
        "repetition folding"
    }

    fn priority(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Option<Priority> {
        let (left_unit, _, _) = unit(left)?;
        let (right_unit, _, _) = unit(right)?;
        (left_unit == right_unit).then_some(PRIORITY)
    }

    fn combine(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let folded = unit(left).zip(unit(right)).filter(|(l, r)| l.0 == r.0);
        let Some(((unit, left_min, left_max), (_, right_min, right_max))) = folded else {
            panic!("cannot fold {left} and {right}: not repetitions of one clause");
        };
        let min = left_min.saturating_add(right_min);
        let max = left_max.zip(right_max).map(|(l, r)| l.saturating_add(r));
        Ok(if *unit == SINGLE_ANY_TOKEN {
            Clause::any_token(min, max)
        } else {
            Clause::repetition(unit.clone(), min, max)
        })
    }
}

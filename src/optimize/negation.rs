use crate::clause::{Clause, ExpansionSide, FilterOperation};
use crate::error::Result;
use crate::optimize::{CombineRule, OptimizeContext, Priority};

const PRIORITY: Priority = 300;

/// Rewrites a run of negated single tokens next to a fixed-length clause
/// into a `NOTCONTAINING` position filter: the neighbour is expanded over
/// the run and the window is narrowed back to the run by the neighbour's
/// length.
///
/// `"b" [!a]{1,2}` becomes
/// `POSFILTER(EXPAND(TERM(word:b), R, 1, 2), TERM(word:a), NOTCONTAINING, 1, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegationRewriting;

/// The negated token and the run bounds.
fn negation_run(clause: &Clause) -> Option<(&Clause, u32, Option<u32>)> {
    let (inner, min, max) = match clause {
        Clause::Negation(inner) => (inner.as_ref(), 1, Some(1)),
        Clause::Repetition { clause, min, max } => match clause.as_ref() {
            Clause::Negation(inner) => (inner.as_ref(), *min, *max),
            _ => return None,
        },
        _ => return None,
    };
    (inner.is_single_token() && max.is_none_or(|max| max >= min)).then_some((inner, min, max))
}

/// Length of a neighbour whose hits are all the same non-zero length.
fn fixed_length(clause: &Clause) -> Option<i32> {
    if !clause.hits_all_same_length() {
        return None;
    }
    match i32::try_from(clause.hits_length_min()) {
        Ok(0) | Err(_) => None,
        Ok(length) => Some(length),
    }
}

enum Rewrite<'a> {
    /// Negation run before `neighbour`.
    Before { run: (&'a Clause, u32, Option<u32>), neighbour: &'a Clause, length: i32 },
    /// Negation run after `neighbour`.
    After { run: (&'a Clause, u32, Option<u32>), neighbour: &'a Clause, length: i32 },
}

fn classify<'a>(left: &'a Clause, right: &'a Clause) -> Option<Rewrite<'a>> {
    if let (Some(run), Some(length)) = (negation_run(left), fixed_length(right)) {
        return Some(Rewrite::Before {
            run,
            neighbour: right,
            length,
        });
    }
    if let (Some(length), Some(run)) = (fixed_length(left), negation_run(right)) {
        return Some(Rewrite::After {
            run,
            neighbour: left,
            length,
        });
    }
    None
}

impl CombineRule for NegationRewriting {
    fn name(&self) -> &'static str {
        "negation rewriting"
    }

    fn priority(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Option<Priority> {
        classify(left, right).map(|_| PRIORITY)
    }

    fn combine(&self, left: &Clause, right: &Clause, _ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let Some(rewrite) = classify(left, right) else {
            panic!("cannot rewrite {left} and {right}: no single-token negation next to a fixed-length clause");
        };
        let (side, (negated, min, max), neighbour, adjust_left, adjust_right) = match rewrite {
            Rewrite::Before { run, neighbour, length } => (ExpansionSide::Left, run, neighbour, 0, -length),
            Rewrite::After { run, neighbour, length } => (ExpansionSide::Right, run, neighbour, length, 0),
        };
        Ok(Clause::position_filter(
            Clause::expansion(neighbour.clone(), side, min, max),
            negated.clone(),
            FilterOperation::NotContaining,
            adjust_left,
            adjust_right,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward_index::Sensitivity;
    use crate::optimize::testing::FixedStats;

    fn t(value: &str) -> Clause {
        Clause::term("word", value, Sensitivity::Sensitive)
    }

    #[test]
    fn test_negation_after_clause() {
        let stats = FixedStats::default();
        let ctx = OptimizeContext::new(&stats);
        let rewritten = NegationRewriting
            .combine(&t("b"), &Clause::negation(t("a")), &ctx)
            .unwrap();
        assert_eq!(
            rewritten.to_string(),
            "POSFILTER(EXPAND(TERM(word:b), R, 1, 1), TERM(word:a), NOTCONTAINING, 1, 0)"
        );
    }

    #[test]
    fn test_negation_run_before_sequence() {
        let stats = FixedStats::default();
        let ctx = OptimizeContext::new(&stats);
        let run = Clause::repetition(Clause::negation(t("a")), 0, Some(3));
        let neighbour = Clause::sequence(vec![t("b"), t("c")]);
        assert_eq!(NegationRewriting.priority(&run, &neighbour, &ctx), Some(300));
        assert_eq!(
            NegationRewriting.combine(&run, &neighbour, &ctx).unwrap(),
            Clause::position_filter(
                Clause::expansion(neighbour, ExpansionSide::Left, 0, Some(3)),
                t("a"),
                FilterOperation::NotContaining,
                0,
                -2,
            )
        );
    }

    #[test]
    fn test_requires_fixed_length_neighbour() {
        let stats = FixedStats::default();
        let ctx = OptimizeContext::new(&stats);
        let negation = Clause::negation(t("a"));
        assert_eq!(
            NegationRewriting.priority(&negation, &Clause::repetition(t("b"), 1, Some(2)), &ctx),
            None
        );
        assert_eq!(
            NegationRewriting.priority(&Clause::any_token(0, Some(0)), &negation, &ctx),
            None
        );
        let multi = Clause::negation(Clause::sequence(vec![t("a"), t("b")]));
        assert_eq!(NegationRewriting.priority(&multi, &t("c"), &ctx), None);
    }
}

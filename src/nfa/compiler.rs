//! Pattern compiler: clause tree to NFA for one scan direction.

use crate::clause::{Clause, ExpansionSide, MAX_UNROLLED_COPIES, compilable_bounds};
use crate::error::{LexisError, Result};
use crate::forward_index::ForwardIndexAccessor;
use crate::nfa::state::{Fragment, Nfa, NfaBuilder, TokenTest};
use crate::nfa::Direction;

/// Compile `clause` into an automaton that consumes tokens in `direction`.
///
/// Term values are resolved to term ids through `accessor`, so the result
/// is only valid for that accessor's segment. Compiling the same clause
/// twice yields identical automata.
///
/// # Errors
///
/// - [`LexisError::UnsupportedClause`] for a negation over more than one
///   token, a position filter, or repetition bounds that are inverted or
///   above [`MAX_UNROLLED_COPIES`](crate::clause::MAX_UNROLLED_COPIES)
/// - [`LexisError::NotFound`] for an unknown annotation
/// - [`LexisError::InvalidArgument`] for a malformed regular expression
pub fn compile(clause: &Clause, direction: Direction, accessor: &dyn ForwardIndexAccessor) -> Result<Nfa> {
    let mut builder = NfaBuilder::new();
    let fragment = Compiler {
        builder: &mut builder,
        accessor,
        direction,
    }
    .fragment(clause)?;
    Ok(builder.finish(fragment, direction))
}

struct Compiler<'a> {
    builder: &'a mut NfaBuilder,
    accessor: &'a dyn ForwardIndexAccessor,
    direction: Direction,
}

impl Compiler<'_> {
    fn fragment(&mut self, clause: &Clause) -> Result<Fragment> {
        match clause {
            Clause::Term { .. } | Clause::Regex { .. } | Clause::Negation(_) => {
                let test = self.token_test(clause)?;
                Ok(self.builder.token(test))
            }
            Clause::AnyToken { min: 1, max: Some(1) } => Ok(self.builder.token(TokenTest::Any)),
            Clause::AnyToken { min, max } => {
                check_bounds(clause, *min, *max)?;
                let any = Clause::any_token(1, Some(1));
                self.repeat(&any, *min, *max)
            }
            Clause::Sequence(clauses) => self.sequence(clauses.iter()),
            Clause::Alternation(clauses) => {
                if clauses.is_empty() {
                    return Ok(self.builder.fail());
                }
                let branches = clauses
                    .iter()
                    .map(|c| self.fragment(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.builder.alternate(branches))
            }
            Clause::Repetition { clause: inner, min, max } => {
                check_bounds(clause, *min, *max)?;
                self.repeat(inner, *min, *max)
            }
            Clause::Expansion {
                clause: inner,
                side,
                min,
                max,
            } => {
                check_bounds(clause, *min, *max)?;
                let any = Clause::any_token(*min, *max);
                match side {
                    ExpansionSide::Left => self.sequence([&any, inner.as_ref()].into_iter()),
                    ExpansionSide::Right => self.sequence([inner.as_ref(), &any].into_iter()),
                }
            }
            Clause::PositionFilter { .. } => Err(LexisError::unsupported_clause(format!(
                "position filter {clause} cannot be matched with an NFA"
            ))),
            Clause::AnchoredNfa(anchored) => self.fragment(&anchored.text_order()),
        }
    }

    /// Concatenate parts given in text order, reversed for backward scans.
    fn sequence<'c>(&mut self, parts: impl DoubleEndedIterator<Item = &'c Clause>) -> Result<Fragment> {
        let parts: Vec<&Clause> = match self.direction {
            Direction::Forward => parts.collect(),
            Direction::Backward => parts.rev().collect(),
        };
        let mut result: Option<Fragment> = None;
        for part in parts {
            let next = self.fragment(part)?;
            result = Some(match result {
                Some(prev) => self.builder.concat(prev, next),
                None => next,
            });
        }
        Ok(result.unwrap_or_else(|| self.builder.epsilon()))
    }

    /// `min` mandatory copies, then nested optional copies up to `max`, or
    /// a loop when unbounded.
    fn repeat(&mut self, clause: &Clause, min: u32, max: Option<u32>) -> Result<Fragment> {
        let mut result: Option<Fragment> = None;
        for _ in 0..min {
            let copy = self.fragment(clause)?;
            result = Some(match result {
                Some(prev) => self.builder.concat(prev, copy),
                None => copy,
            });
        }

        let tail = match max {
            None => {
                let body = self.fragment(clause)?;
                Some(self.builder.star(body))
            }
            Some(max) => {
                let mut tail: Option<Fragment> = None;
                for _ in min..max {
                    let copy = self.fragment(clause)?;
                    let body = match tail {
                        Some(rest) => self.builder.concat(copy, rest),
                        None => copy,
                    };
                    tail = Some(self.builder.optional(body));
                }
                tail
            }
        };

        Ok(match (result, tail) {
            (Some(head), Some(tail)) => self.builder.concat(head, tail),
            (Some(head), None) => head,
            (None, Some(tail)) => tail,
            (None, None) => self.builder.epsilon(),
        })
    }

    /// Reduce a single-token clause to one token test.
    fn token_test(&mut self, clause: &Clause) -> Result<TokenTest> {
        match clause {
            Clause::Term {
                annotation,
                value,
                sensitivity,
            } => {
                let number = self.accessor.annotation_number(annotation)?;
                let ids = self.accessor.resolve_term_ids(number, value, *sensitivity);
                Ok(TokenTest::terms(number, ids))
            }
            Clause::Regex {
                annotation,
                pattern,
                sensitivity,
            } => {
                let number = self.accessor.annotation_number(annotation)?;
                let ids = self.accessor.matching_term_ids(number, pattern, *sensitivity)?;
                Ok(TokenTest::terms(number, ids))
            }
            Clause::AnyToken { min: 1, max: Some(1) } => Ok(TokenTest::Any),
            Clause::Negation(inner) => {
                if !inner.is_single_token() {
                    return Err(LexisError::unsupported_clause(format!(
                        "negation of multi-token clause {inner}; rewrite it as a position filter first"
                    )));
                }
                Ok(TokenTest::Not(Box::new(self.token_test(inner)?)))
            }
            Clause::Alternation(clauses) if clause.is_single_token() => Ok(TokenTest::AnyOf(
                clauses
                    .iter()
                    .map(|c| self.token_test(c))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Clause::Sequence(clauses) if clause.is_single_token() => self.token_test(&clauses[0]),
            Clause::Repetition { clause: inner, .. } | Clause::Expansion { clause: inner, .. }
                if clause.is_single_token() =>
            {
                self.token_test(inner)
            }
            other => Err(LexisError::unsupported_clause(format!(
                "{other} is not a single-token clause"
            ))),
        }
    }
}

fn check_bounds(clause: &Clause, min: u32, max: Option<u32>) -> Result<()> {
    match max {
        Some(max) if max < min => Err(LexisError::unsupported_clause(format!(
            "{clause} has maximum {max} below minimum {min}"
        ))),
        _ if !compilable_bounds(min, max) => Err(LexisError::unsupported_clause(format!(
            "{clause} repeats more than {MAX_UNROLLED_COPIES} times"
        ))),
        _ => Ok(()),
    }
}

//! Clause-combining optimizer.
//!
//! A flat sequence of clauses is rewritten by repeatedly merging the adjacent
//! pair with the lowest priority over all registered [`CombineRule`]s until no
//! rule applies. Structural rewrites (folding repetitions, absorbing
//! expansions, turning negation runs into position filters) carry small
//! priorities and always run before any pair is promoted to forward-index
//! NFA matching.

mod expansion;
mod negation;
mod nfa_promotion;
mod repetition;

use std::fmt;

use log::{debug, trace};

pub use expansion::ExpansionInternalization;
pub use negation::NegationRewriting;
pub use nfa_promotion::NfaPromotion;
pub use repetition::RepetitionFolding;

use crate::clause::{Clause, SegmentStatistics};
use crate::config::NfaMatchingConfig;
use crate::error::Result;
use crate::forward_index::ForwardIndexAccessor;

/// Lower values are merged first.
pub type Priority = u32;

/// What a rule may look at besides the two clauses.
#[derive(Clone, Copy)]
pub struct OptimizeContext<'a> {
    pub stats: &'a dyn SegmentStatistics,
    /// Needed to compile NFAs; without it no pair is promoted.
    pub accessor: Option<&'a dyn ForwardIndexAccessor>,
}

impl<'a> OptimizeContext<'a> {
    pub fn new(stats: &'a dyn SegmentStatistics) -> Self {
        OptimizeContext { stats, accessor: None }
    }

    pub fn with_accessor(mut self, accessor: &'a dyn ForwardIndexAccessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Statistics and accessor from the same segment.
    pub fn for_segment<S>(segment: &'a S) -> Self
    where
        S: SegmentStatistics + ForwardIndexAccessor + 'a,
    {
        OptimizeContext {
            stats: segment,
            accessor: Some(segment),
        }
    }
}

impl fmt::Debug for OptimizeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizeContext")
            .field("total_tokens", &self.stats.total_tokens())
            .field("has_accessor", &self.accessor.is_some())
            .finish()
    }
}

/// A stateless strategy for merging two adjacent clauses.
pub trait CombineRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// `None` when the rule does not apply to this pair.
    fn priority(&self, left: &Clause, right: &Clause, ctx: &OptimizeContext<'_>) -> Option<Priority>;

    /// Merge a pair this rule gave a priority to.
    ///
    /// # Panics
    ///
    /// May panic when called on a pair [`CombineRule::priority`] rejected.
    fn combine(&self, left: &Clause, right: &Clause, ctx: &OptimizeContext<'_>) -> Result<Clause>;
}

/// An immutable, ordered set of rules. Earlier rules win priority ties.
#[derive(Debug)]
pub struct CombineRegistry {
    rules: Vec<Box<dyn CombineRule>>,
}

impl CombineRegistry {
    pub fn empty() -> Self {
        CombineRegistry { rules: Vec::new() }
    }

    /// Repetition folding, expansion internalization, negation rewriting
    /// and NFA promotion configured by `config`.
    pub fn standard(config: &NfaMatchingConfig) -> Self {
        CombineRegistry::empty()
            .with_rule(RepetitionFolding)
            .with_rule(ExpansionInternalization)
            .with_rule(NegationRewriting)
            .with_rule(NfaPromotion::new(config))
    }

    pub fn with_rule(mut self, rule: impl CombineRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rules(&self) -> &[Box<dyn CombineRule>] {
        &self.rules
    }
}

impl Default for CombineRegistry {
    fn default() -> Self {
        CombineRegistry::standard(&NfaMatchingConfig::default())
    }
}

#[derive(Debug, Default)]
pub struct ClauseOptimizer {
    registry: CombineRegistry,
}

impl ClauseOptimizer {
    pub fn new(registry: CombineRegistry) -> Self {
        ClauseOptimizer { registry }
    }

    pub fn registry(&self) -> &CombineRegistry {
        &self.registry
    }

    /// Rewrite a left-to-right clause sequence.
    ///
    /// Nested sequences are flattened first. Among all adjacent pairs and
    /// all rules the lowest priority is merged, the leftmost pair winning
    /// ties, and the scan restarts on the shortened sequence. Every merged
    /// clause is itself passed through [`ClauseOptimizer::optimize_tree`].
    /// Returns the single remaining clause or a sequence of what could not
    /// be merged.
    ///
    /// # Errors
    ///
    /// Propagates compile errors from rules that build NFAs, such as an
    /// unknown annotation.
    pub fn optimize(&self, clauses: Vec<Clause>, ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let mut parts = Vec::with_capacity(clauses.len());
        for clause in clauses {
            clause.flatten_into(&mut parts);
        }

        while let Some((priority, index, rule)) = self.best_merge(&parts, ctx) {
            let combined = rule.combine(&parts[index], &parts[index + 1], ctx)?;
            // Rules may nest new sequences (an expansion absorbing its
            // neighbour); those get the same treatment as the input.
            let merged = self.optimize_tree(&combined, ctx)?;
            debug!(
                "{} merged {} and {} at {index} (priority {priority}) into {merged}",
                rule.name(),
                parts[index],
                parts[index + 1]
            );
            parts.splice(index..index + 2, std::iter::once(merged));
        }

        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Clause::Sequence(parts)
        })
    }

    fn best_merge(
        &self,
        parts: &[Clause],
        ctx: &OptimizeContext<'_>,
    ) -> Option<(Priority, usize, &dyn CombineRule)> {
        let mut best: Option<(Priority, usize, &dyn CombineRule)> = None;
        for (index, pair) in parts.windows(2).enumerate() {
            for rule in &self.registry.rules {
                match rule.priority(&pair[0], &pair[1], ctx) {
                    Some(priority) if best.is_none_or(|(current, _, _)| priority < current) => {
                        best = Some((priority, index, rule.as_ref()));
                    }
                    Some(_) => {}
                    None => trace!("{} cannot combine {} and {}", rule.name(), pair[0], pair[1]),
                }
            }
        }
        best
    }

    /// Apply [`ClauseOptimizer::optimize`] to every sequence in a clause
    /// tree, innermost first.
    pub fn optimize_tree(&self, clause: &Clause, ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let all = |clauses: &[Clause]| -> Result<Vec<Clause>> {
            clauses.iter().map(|c| self.optimize_tree(c, ctx)).collect()
        };
        Ok(match clause {
            Clause::Sequence(clauses) => self.optimize(all(clauses)?, ctx)?,
            Clause::Alternation(clauses) => Clause::Alternation(all(clauses)?),
            Clause::Repetition { clause: inner, min, max } => {
                Clause::repetition(self.optimize_tree(inner, ctx)?, *min, *max)
            }
            Clause::Negation(inner) => Clause::negation(self.optimize_tree(inner, ctx)?),
            Clause::Expansion {
                clause: inner,
                side,
                min,
                max,
            } => Clause::expansion(self.optimize_tree(inner, ctx)?, *side, *min, *max),
            Clause::PositionFilter {
                producer,
                filter,
                operation,
                adjust_left,
                adjust_right,
            } => Clause::position_filter(
                self.optimize_tree(producer, ctx)?,
                self.optimize_tree(filter, ctx)?,
                *operation,
                *adjust_left,
                *adjust_right,
            ),
            Clause::Term { .. } | Clause::Regex { .. } | Clause::AnyToken { .. } | Clause::AnchoredNfa(_) => {
                clause.clone()
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use ahash::AHashMap;

    use crate::clause::SegmentStatistics;
    use crate::forward_index::Sensitivity;

    /// Hand-set segment numbers. Unlisted terms occur zero times.
    #[derive(Debug, Default)]
    pub struct FixedStats {
        pub total_tokens: u64,
        pub unique_terms: u64,
        pub frequencies: AHashMap<String, u64>,
    }

    impl FixedStats {
        pub fn with_frequency(mut self, value: &str, frequency: u64) -> Self {
            self.frequencies.insert(value.to_string(), frequency);
            self
        }
    }

    impl SegmentStatistics for FixedStats {
        fn total_tokens(&self) -> u64 {
            self.total_tokens
        }

        fn term_frequency(&self, _annotation: &str, value: &str, _sensitivity: Sensitivity) -> u64 {
            self.frequencies.get(value).copied().unwrap_or(0)
        }

        fn regex_frequency(&self, _annotation: &str, pattern: &str, _sensitivity: Sensitivity) -> u64 {
            self.frequencies.get(pattern).copied().unwrap_or(0)
        }

        fn unique_terms(&self, _annotation: &str) -> u64 {
            self.unique_terms
        }
    }
}

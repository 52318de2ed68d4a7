//! Cost estimates used to decide between inverted-index and forward-index
//! evaluation.

use crate::clause::Clause;
use crate::forward_index::Sensitivity;

/// Forward-matching cost of a single term test.
pub const TERM_FORWARD_COST: u64 = 200;

/// Stand-in for an unbounded repetition or expansion when estimating.
pub const UNBOUNDED_COST_STEPS: u64 = 50;

const REGEX_FORWARD_COST: u64 = TERM_FORWARD_COST * 3 / 2;

/// Per-clause overhead of evaluating a sequence through the inverted index.
const SEQUENCE_CLAUSE_OVERHEAD: f64 = 1.2;

/// Segment-level numbers the estimators need. Unknown annotations count as
/// empty.
pub trait SegmentStatistics {
    /// Tokens in the segment's live documents.
    fn total_tokens(&self) -> u64;

    /// Occurrences of every term equal to `value` under `sensitivity`.
    fn term_frequency(&self, annotation: &str, value: &str, sensitivity: Sensitivity) -> u64;

    /// Occurrences of every term matching `pattern`.
    fn regex_frequency(&self, annotation: &str, pattern: &str, sensitivity: Sensitivity) -> u64;

    /// Distinct terms of an annotation.
    fn unique_terms(&self, annotation: &str) -> u64;
}

fn steps(min: u32, max: Option<u32>) -> u64 {
    match max {
        Some(max) => (max.saturating_sub(min) as u64) + 1,
        None => UNBOUNDED_COST_STEPS,
    }
}

fn bounded_max(max: Option<u32>) -> u64 {
    max.map_or(UNBOUNDED_COST_STEPS, u64::from)
}

impl Clause {
    /// Rough number of hits the inverted index would produce for this
    /// clause; the cost of reverse (conventional) matching.
    pub fn estimated_hits(&self, stats: &dyn SegmentStatistics) -> u64 {
        match self {
            Clause::Term {
                annotation,
                value,
                sensitivity,
            } => stats.term_frequency(annotation, value, *sensitivity),
            Clause::Regex {
                annotation,
                pattern,
                sensitivity,
            } => stats.regex_frequency(annotation, pattern, *sensitivity),
            Clause::AnyToken { min, max } => stats.total_tokens().saturating_mul(steps(*min, *max)),
            Clause::Sequence(clauses) => {
                if clauses.is_empty() {
                    return 0;
                }
                let cheapest = clauses
                    .iter()
                    .map(|c| c.estimated_hits(stats))
                    .min()
                    .unwrap_or(0);
                let factor = SEQUENCE_CLAUSE_OVERHEAD.powi(clauses.len() as i32);
                (cheapest as f64 * factor) as u64
            }
            Clause::Alternation(clauses) => clauses
                .iter()
                .fold(0u64, |acc, c| acc.saturating_add(c.estimated_hits(stats))),
            Clause::Repetition { clause, .. } => clause.estimated_hits(stats),
            Clause::Negation(inner) => stats
                .total_tokens()
                .saturating_sub(inner.estimated_hits(stats)),
            Clause::Expansion { clause, min, max, .. } => clause
                .estimated_hits(stats)
                .saturating_mul(steps(*min, *max)),
            Clause::PositionFilter { producer, .. } => producer.estimated_hits(stats),
            Clause::AnchoredNfa(a) => a.anchor().estimated_hits(stats),
        }
    }

    /// Relative cost of matching this clause with an NFA at one position.
    /// Only meaningful in comparison with other forward-matching costs.
    pub fn forward_matching_cost(&self) -> u64 {
        match self {
            Clause::Term { .. } => TERM_FORWARD_COST,
            Clause::Regex { .. } => REGEX_FORWARD_COST,
            Clause::AnyToken { max, .. } => bounded_max(*max),
            Clause::Sequence(clauses) | Clause::Alternation(clauses) => clauses
                .iter()
                .fold(0u64, |acc, c| acc.saturating_add(c.forward_matching_cost())),
            // Clause cost times max, not summed over every path length.
            Clause::Repetition { clause, max, .. } => clause
                .forward_matching_cost()
                .saturating_mul(bounded_max(*max)),
            Clause::Negation(inner) => inner.forward_matching_cost(),
            Clause::Expansion { clause, min, max, .. } => {
                let n_max = bounded_max(*max);
                let min = u64::from(*min);
                let extra = if n_max < min { 0 } else { (min + n_max) * (n_max - min + 1) / 2 };
                clause.forward_matching_cost().saturating_add(extra)
            }
            Clause::PositionFilter { producer, .. } => producer.forward_matching_cost(),
            Clause::AnchoredNfa(a) => a
                .anchor()
                .forward_matching_cost()
                .saturating_add(a.nfa_clause().forward_matching_cost()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;
    use crate::clause::ExpansionSide;

    struct Stats(AHashMap<&'static str, u64>);

    impl SegmentStatistics for Stats {
        fn total_tokens(&self) -> u64 {
            1000
        }
        fn term_frequency(&self, _: &str, value: &str, _: Sensitivity) -> u64 {
            self.0.get(value).copied().unwrap_or(0)
        }
        fn regex_frequency(&self, _: &str, _: &str, _: Sensitivity) -> u64 {
            300
        }
        fn unique_terms(&self, _: &str) -> u64 {
            50
        }
    }

    fn t(value: &str) -> Clause {
        Clause::term("word", value, Sensitivity::Sensitive)
    }

    #[test]
    fn test_estimated_hits() {
        let stats = Stats(AHashMap::from_iter([("a", 10), ("b", 100)]));
        assert_eq!(t("a").estimated_hits(&stats), 10);
        assert_eq!(Clause::alternation(vec![t("a"), t("b")]).estimated_hits(&stats), 110);
        assert_eq!(Clause::sequence(vec![t("a"), t("b")]).estimated_hits(&stats), 14);
        assert_eq!(Clause::negation(t("b")).estimated_hits(&stats), 900);
        assert_eq!(
            Clause::expansion(t("a"), ExpansionSide::Right, 1, Some(3)).estimated_hits(&stats),
            30
        );
        assert_eq!(Clause::any_token(1, None).estimated_hits(&stats), 50_000);
    }

    #[test]
    fn test_forward_cost() {
        assert_eq!(t("a").forward_matching_cost(), 200);
        assert_eq!(Clause::regex("word", "a.*", Sensitivity::Sensitive).forward_matching_cost(), 300);
        assert_eq!(Clause::repetition(t("a"), 1, Some(3)).forward_matching_cost(), 600);
        // 200 + (1 + 2 + 3)
        assert_eq!(
            Clause::expansion(t("a"), ExpansionSide::Left, 1, Some(3)).forward_matching_cost(),
            206
        );
        assert_eq!(Clause::sequence(vec![t("a"), t("b")]).forward_matching_cost(), 400);
    }
}

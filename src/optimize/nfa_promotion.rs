use crate::clause::{AnchoredNfa, Clause, SegmentStatistics};
use crate::config::NfaMatchingConfig;
use crate::error::Result;
use crate::forward_index::ForwardIndexAccessor;
use crate::nfa::Direction;
use crate::optimize::{CombineRule, OptimizeContext, Priority};

const FORWARD: Priority = 10_000_000;
const BACKWARD: Priority = 10_000_001;
const EXTEND_FORWARD: Priority = 9_000_000;
const EXTEND_BACKWARD: Priority = 9_000_001;

/// Scales the factor into the priority offset.
const FACTOR_SCALE: u64 = 10_000;

/// Promotes a pair to an [`AnchoredNfa`] when one side is rare enough that
/// walking an NFA over the other side from each of its hits beats evaluating
/// both through the inverted index.
///
/// The cost factor compares, for each direction, the anchor's hit count
/// times the NFA side's forward cost with the cost of the plain sequence.
/// Pairs whose factor exceeds the configured threshold are left alone.
#[derive(Debug, Clone)]
pub struct NfaPromotion {
    threshold: u64,
    min_unique_terms: u64,
}

/// Chosen direction and cost factor, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub direction: Direction,
    pub factor: u64,
}

impl NfaPromotion {
    pub fn new(config: &NfaMatchingConfig) -> Self {
        NfaPromotion {
            threshold: config.nfa_threshold,
            min_unique_terms: config.min_unique_terms,
        }
    }

    /// Cheapest feasible direction for matching `left right` with one side
    /// as anchor, or `None` if neither side can be matched by an NFA.
    ///
    /// Forward keeps `left` as the anchor and needs `right` compilable and
    /// `left` never empty; backward is the mirror. When both are feasible,
    /// forward wins unless backward is strictly cheaper.
    pub fn promotion(left: &Clause, right: &Clause, stats: &dyn SegmentStatistics) -> Option<Promotion> {
        let hits_left = u128::from(left.estimated_hits(stats).max(1));
        let hits_right = u128::from(right.estimated_hits(stats).max(1));
        let sequence_cost = hits_left.min(hits_right) + (hits_left + hits_right) / 500;
        let cost = |anchor_hits: u128, nfa_side: &Clause| {
            let raw = 1000 * anchor_hits * u128::from(nfa_side.forward_matching_cost()) / sequence_cost;
            u64::try_from(raw).unwrap_or(u64::MAX - 1)
        };

        let forward = (right.can_make_nfa() && !left.matches_empty_sequence()).then(|| cost(hits_left, right));
        let backward = (left.can_make_nfa() && !right.matches_empty_sequence()).then(|| cost(hits_right, left));
        let (direction, cost) = match (forward, backward) {
            (Some(f), Some(b)) if b < f => (Direction::Backward, b),
            (Some(f), _) => (Direction::Forward, f),
            (None, Some(b)) => (Direction::Backward, b),
            (None, None) => return None,
        };
        Some(Promotion {
            direction,
            factor: cost.saturating_add(1),
        })
    }

    fn enough_terms(&self, nfa_side: &Clause, stats: &dyn SegmentStatistics) -> bool {
        nfa_side
            .primary_annotation()
            .is_none_or(|annotation| stats.unique_terms(annotation) >= self.min_unique_terms)
    }

    fn extends(clause: &Clause, direction: Direction) -> Option<&AnchoredNfa> {
        match clause {
            Clause::AnchoredNfa(anchored) if anchored.direction() == direction => Some(anchored),
            _ => None,
        }
    }
}

impl CombineRule for NfaPromotion {
    fn name(&self) -> &'static str {
        "NFA promotion"
    }

    fn priority(&self, left: &Clause, right: &Clause, ctx: &OptimizeContext<'_>) -> Option<Priority> {
        if self.threshold == 0 || ctx.accessor.is_none() {
            return None;
        }
        let Promotion { direction, factor } = Self::promotion(left, right, ctx.stats)?;
        if factor > self.threshold {
            return None;
        }
        let (nfa_side, base) = match direction {
            Direction::Forward if Self::extends(left, direction).is_some() => (right, EXTEND_FORWARD),
            Direction::Forward => (right, FORWARD),
            Direction::Backward if Self::extends(right, direction).is_some() => (left, EXTEND_BACKWARD),
            Direction::Backward => (left, BACKWARD),
        };
        if !self.enough_terms(nfa_side, ctx.stats) {
            return None;
        }
        let offset = Priority::try_from(FACTOR_SCALE / factor).unwrap_or(0);
        Some(base - offset)
    }

    fn combine(&self, left: &Clause, right: &Clause, ctx: &OptimizeContext<'_>) -> Result<Clause> {
        let Some(Promotion { direction, .. }) = Self::promotion(left, right, ctx.stats) else {
            panic!("cannot promote {left} and {right}: neither side can be matched with an NFA");
        };
        let Some(accessor) = ctx.accessor else {
            panic!("cannot promote {left} and {right}: no forward index accessor");
        };
        promote(left, right, direction, accessor).map(Clause::AnchoredNfa)
    }
}

fn promote(
    left: &Clause,
    right: &Clause,
    direction: Direction,
    accessor: &dyn ForwardIndexAccessor,
) -> Result<AnchoredNfa> {
    match direction {
        Direction::Forward => match NfaPromotion::extends(left, direction) {
            Some(anchored) => anchored.extend(right.clone(), accessor),
            None => AnchoredNfa::new(left.clone(), right.clone(), direction, accessor),
        },
        Direction::Backward => match NfaPromotion::extends(right, direction) {
            Some(anchored) => anchored.extend(left.clone(), accessor),
            None => AnchoredNfa::new(right.clone(), left.clone(), direction, accessor),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForwardIndexConfig;
    use crate::forward_index::Sensitivity;
    use crate::optimize::testing::FixedStats;
    use crate::segment::{AnnotatedDocument, Segment, SegmentWriter};

    fn t(value: &str) -> Clause {
        Clause::term("word", value, Sensitivity::Sensitive)
    }

    fn stats() -> FixedStats {
        FixedStats {
            total_tokens: 10_000_000,
            unique_terms: 50_000,
            ..Default::default()
        }
        .with_frequency("rare", 1)
        .with_frequency("common", 1_000_000)
    }

    fn segment() -> Segment {
        let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default()).unwrap();
        writer
            .add_document(&AnnotatedDocument::new().annotation("word", ["rare", "common", "common"]))
            .unwrap();
        writer.seal().unwrap()
    }

    #[test]
    fn test_forward_factor_and_priority() {
        let stats = stats();
        let segment = segment();
        let ctx = OptimizeContext::new(&stats).with_accessor(&segment);
        let promotion = NfaPromotion::promotion(&t("rare"), &t("common"), &stats).unwrap();
        assert_eq!(promotion.direction, Direction::Forward);
        assert_eq!(promotion.factor, 100);

        let rule = NfaPromotion::new(&NfaMatchingConfig::default());
        assert_eq!(rule.priority(&t("rare"), &t("common"), &ctx), Some(9_999_900));
        let combined = rule.combine(&t("rare"), &t("common"), &ctx).unwrap();
        assert_eq!(combined.to_string(), "FISEQ(TERM(word:rare), TERM(word:common), FORWARD)");
    }

    #[test]
    fn test_backward_mirror() {
        let stats = stats();
        let segment = segment();
        let ctx = OptimizeContext::new(&stats).with_accessor(&segment);
        let rule = NfaPromotion::new(&NfaMatchingConfig::default());
        assert_eq!(rule.priority(&t("common"), &t("rare"), &ctx), Some(9_999_901));
        let combined = rule.combine(&t("common"), &t("rare"), &ctx).unwrap();
        assert_eq!(combined.to_string(), "FISEQ(TERM(word:rare), TERM(word:common), BACKWARD)");
    }

    #[test]
    fn test_gates() {
        let stats = stats();
        let segment = segment();
        let with_accessor = OptimizeContext::new(&stats).with_accessor(&segment);

        let disabled = NfaPromotion::new(&NfaMatchingConfig::disabled());
        assert_eq!(disabled.priority(&t("rare"), &t("common"), &with_accessor), None);

        let enabled = NfaPromotion::new(&NfaMatchingConfig::default());
        let without_accessor = OptimizeContext::new(&stats);
        assert_eq!(enabled.priority(&t("rare"), &t("common"), &without_accessor), None);

        // Two equally common sides cost far more than the threshold.
        assert_eq!(enabled.priority(&t("common"), &t("common"), &with_accessor), None);

        let picky = NfaPromotion::new(&NfaMatchingConfig {
            min_unique_terms: 100_000,
            ..Default::default()
        });
        assert_eq!(picky.priority(&t("rare"), &t("common"), &with_accessor), None);
    }

    #[test]
    fn test_extension_is_preferred() {
        let stats = stats();
        let segment = segment();
        let ctx = OptimizeContext::new(&stats).with_accessor(&segment);
        let rule = NfaPromotion::new(&NfaMatchingConfig::default());
        let anchored = rule.combine(&t("rare"), &t("common"), &ctx).unwrap();

        let priority = rule.priority(&anchored, &t("common"), &ctx).unwrap();
        assert!(priority < FORWARD - 10_000);
        let Clause::AnchoredNfa(extended) = rule.combine(&anchored, &t("common"), &ctx).unwrap() else {
            panic!("expected an anchored NFA");
        };
        assert_eq!(extended.anchor(), &t("rare"));
        assert_eq!(extended.nfa_clause(), &Clause::sequence(vec![t("common"), t("common")]));
        assert_eq!(extended.hits_from_anchor(&segment, 0, 0, 1), vec![(0, 3)]);
    }
}

//! Shared helpers: segment construction and a direct clause evaluator used
//! as the reference for NFA matching.

#![allow(dead_code)]

use std::collections::BTreeSet;

use lexis::forward_index::fold;
use lexis::{
    AnnotatedDocument, Clause, ExpansionSide, FilterOperation, ForwardIndexConfig, Segment, SegmentWriter,
    Sensitivity,
};
use regex::Regex;

pub const WORD: &str = "word";

/// A sealed segment with a single `word` annotation.
pub fn segment(docs: &[&[&str]]) -> Segment {
    let mut writer = SegmentWriter::new(&[WORD], ForwardIndexConfig::default()).unwrap();
    for words in docs {
        writer
            .add_document(&AnnotatedDocument::new().annotation(WORD, words.iter().copied()))
            .unwrap();
    }
    writer.seal().unwrap()
}

/// Case-insensitive word term.
pub fn t(value: &str) -> Clause {
    Clause::term(WORD, value, Sensitivity::Insensitive)
}

/// Case-sensitive word term.
pub fn ts(value: &str) -> Clause {
    Clause::term(WORD, value, Sensitivity::Sensitive)
}

fn value_matches(word: &str, expected: &str, sensitivity: Sensitivity) -> bool {
    match sensitivity {
        Sensitivity::Sensitive => word == expected,
        Sensitivity::Insensitive => fold(word) == fold(expected),
    }
}

fn single(words: &[&str], start: usize, test: impl Fn(&str) -> bool) -> BTreeSet<usize> {
    match words.get(start) {
        Some(word) if test(word) => BTreeSet::from([start + 1]),
        _ => BTreeSet::new(),
    }
}

fn any_tokens(len: usize, start: usize, min: u32, max: Option<u32>) -> BTreeSet<usize> {
    let max = max.map_or(len, |m| m as usize);
    (min as usize..=max)
        .map(|k| start + k)
        .filter(|&end| end <= len)
        .collect()
}

fn sequence_ends<'a>(parts: impl IntoIterator<Item = &'a Clause>, words: &[&str], start: usize) -> BTreeSet<usize> {
    parts.into_iter().fold(BTreeSet::from([start]), |starts, part| {
        starts.iter().flat_map(|&s| ends(part, words, s)).collect()
    })
}

/// Every end position of a hit of `clause` starting at `start`.
pub fn ends(clause: &Clause, words: &[&str], start: usize) -> BTreeSet<usize> {
    let len = words.len();
    match clause {
        Clause::Term { value, sensitivity, .. } => single(words, start, |w| value_matches(w, value, *sensitivity)),
        Clause::Regex { pattern, sensitivity, .. } => {
            let regex = Regex::new(&format!("^(?:{pattern})$")).unwrap();
            single(words, start, |w| match sensitivity {
                Sensitivity::Sensitive => regex.is_match(w),
                Sensitivity::Insensitive => regex.is_match(&fold(w)),
            })
        }
        Clause::AnyToken { min, max } => any_tokens(len, start, *min, *max),
        Clause::Sequence(parts) => sequence_ends(parts, words, start),
        Clause::Alternation(parts) => parts.iter().flat_map(|p| ends(p, words, start)).collect(),
        Clause::Repetition { clause, min, max } => {
            let limit = max.map_or(*min as usize + len + 1, |m| m as usize);
            let mut result = BTreeSet::new();
            let mut frontier = BTreeSet::from([start]);
            for copies in 0..=limit {
                if copies >= *min as usize {
                    result.extend(frontier.iter().copied());
                }
                if copies == limit || frontier.is_empty() {
                    break;
                }
                frontier = frontier.iter().flat_map(|&s| ends(clause, words, s)).collect();
            }
            result
        }
        Clause::Negation(inner) => {
            if start < len && !ends(inner, words, start).contains(&(start + 1)) {
                BTreeSet::from([start + 1])
            } else {
                BTreeSet::new()
            }
        }
        Clause::Expansion { clause, side, min, max } => {
            let any = Clause::any_token(*min, *max);
            match side {
                ExpansionSide::Left => sequence_ends([&any, clause.as_ref()], words, start),
                ExpansionSide::Right => sequence_ends([clause.as_ref(), &any], words, start),
            }
        }
        Clause::PositionFilter {
            producer,
            filter,
            operation,
            adjust_left,
            adjust_right,
        } => {
            let filter_hits = spans(filter, words);
            ends(producer, words, start)
                .into_iter()
                .filter(|&end| {
                    let window_start = start as i64 + i64::from(*adjust_left);
                    let window_end = end as i64 + i64::from(*adjust_right);
                    let contains = filter_hits
                        .iter()
                        .any(|&(s, e)| window_start <= s as i64 && e as i64 <= window_end);
                    let within = filter_hits
                        .iter()
                        .any(|&(s, e)| s as i64 <= window_start && window_end <= e as i64);
                    match operation {
                        FilterOperation::Containing => contains,
                        FilterOperation::NotContaining => !contains,
                        FilterOperation::Within => within,
                        FilterOperation::NotWithin => !within,
                    }
                })
                .collect()
        }
        Clause::AnchoredNfa(anchored) => ends(&anchored.text_order(), words, start),
    }
}

/// Every hit of `clause` as a half-open span.
pub fn spans(clause: &Clause, words: &[&str]) -> BTreeSet<(usize, usize)> {
    (0..=words.len())
        .flat_map(|start| ends(clause, words, start).into_iter().map(move |end| (start, end)))
        .collect()
}

//! Thompson-style NFA simulation against the forward index.
//!
//! All live states advance together one token at a time, so a match costs
//! at most (states x consumed tokens) steps and nothing is kept between
//! calls.

use crate::forward_index::{DocId, ForwardIndexAccessor};
use crate::nfa::state::{Direction, Nfa, NfaState, StateId};

struct Simulation<'a> {
    nfa: &'a Nfa,
    marks: Vec<u32>,
    generation: u32,
    stack: Vec<StateId>,
}

impl<'a> Simulation<'a> {
    fn new(nfa: &'a Nfa) -> Self {
        Simulation {
            nfa,
            marks: vec![0; nfa.states.len()],
            generation: 0,
            stack: Vec::new(),
        }
    }

    /// Replace `out` with every non-split state reachable from `seeds`
    /// without consuming input.
    fn closure(&mut self, seeds: &[StateId], out: &mut Vec<StateId>) {
        self.generation += 1;
        out.clear();
        self.stack.extend_from_slice(seeds);
        while let Some(state) = self.stack.pop() {
            if self.marks[state] == self.generation {
                continue;
            }
            self.marks[state] = self.generation;
            match &self.nfa.states[state] {
                NfaState::Split { targets } => self.stack.extend(targets.iter().rev()),
                _ => out.push(state),
            }
        }
    }

    fn accepting(&self, states: &[StateId]) -> bool {
        states
            .iter()
            .any(|&s| matches!(self.nfa.states[s], NfaState::Accept))
    }

    fn run(
        &mut self,
        accessor: &dyn ForwardIndexAccessor,
        doc: DocId,
        start: isize,
        direction: Direction,
        first_only: bool,
    ) -> Vec<isize> {
        let length = accessor.doc_length(doc) as isize;
        let mut ends = Vec::new();
        if start < 0 || start >= length {
            return ends;
        }
        let step = direction.step();
        let mut current = Vec::new();
        let mut seeds = Vec::new();
        self.closure(&[self.nfa.start], &mut current);

        let mut pos = start;
        loop {
            if self.accepting(&current) {
                ends.push(pos);
                if first_only {
                    break;
                }
            }
            if pos < 0 || pos >= length {
                break;
            }
            seeds.clear();
            for &state in &current {
                if let NfaState::Token { test, next } = &self.nfa.states[state] {
                    if test.accepts(accessor, doc, pos as usize) {
                        seeds.push(*next);
                    }
                }
            }
            if seeds.is_empty() {
                break;
            }
            self.closure(&seeds, &mut current);
            pos += step;
        }
        ends
    }
}

/// Whether `nfa` matches starting at `pos`, consuming tokens in
/// `direction`. A position outside the document never matches.
pub fn matches(
    nfa: &Nfa,
    accessor: &dyn ForwardIndexAccessor,
    doc: DocId,
    pos: isize,
    direction: Direction,
) -> bool {
    !Simulation::new(nfa)
        .run(accessor, doc, pos, direction, true)
        .is_empty()
}

/// Every position a match starting at `pos` can end at, nearest first.
///
/// The end is the position the next token would be read from: one past the
/// last consumed token going forward, one before it going backward. An
/// empty match ends at `pos` itself.
pub fn match_ends(
    nfa: &Nfa,
    accessor: &dyn ForwardIndexAccessor,
    doc: DocId,
    pos: isize,
    direction: Direction,
) -> Vec<isize> {
    Simulation::new(nfa).run(accessor, doc, pos, direction, false)
}

/// Matches from `pos` as half-open `(start, end)` spans in text order,
/// sorted.
pub fn match_spans(
    nfa: &Nfa,
    accessor: &dyn ForwardIndexAccessor,
    doc: DocId,
    pos: usize,
    direction: Direction,
) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = match_ends(nfa, accessor, doc, pos as isize, direction)
        .into_iter()
        .map(|end| match direction {
            Direction::Forward => (pos, end as usize),
            Direction::Backward => ((end + 1) as usize, pos + 1),
        })
        .collect();
    spans.sort_unstable();
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use crate::config::ForwardIndexConfig;
    use crate::forward_index::Sensitivity;
    use crate::nfa::compile;
    use crate::segment::{AnnotatedDocument, Segment, SegmentWriter};

    fn segment(words: &[&str]) -> Segment {
        let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default()).unwrap();
        writer
            .add_document(&AnnotatedDocument::new().annotation("word", words.iter().copied()))
            .unwrap();
        writer.seal().unwrap()
    }

    fn t(value: &str) -> Clause {
        Clause::term("word", value, Sensitivity::Insensitive)
    }

    #[test]
    fn test_match_ends_forward_and_backward() {
        let segment = segment(&["This", "is", "very", "very", "very", "fun"]);
        let clause = Clause::repetition(t("very"), 1, None);

        let forward = compile(&clause, Direction::Forward, &segment).unwrap();
        assert_eq!(match_ends(&forward, &segment, 0, 2, Direction::Forward), vec![3, 4, 5]);
        assert_eq!(match_spans(&forward, &segment, 0, 3, Direction::Forward), vec![(3, 4), (3, 5)]);

        let backward = compile(&clause, Direction::Backward, &segment).unwrap();
        assert_eq!(match_ends(&backward, &segment, 0, 4, Direction::Backward), vec![3, 2, 1]);
        assert_eq!(
            match_spans(&backward, &segment, 0, 3, Direction::Backward),
            vec![(2, 4), (3, 4)]
        );
    }

    #[test]
    fn test_out_of_range_is_no_match() {
        let segment = segment(&["a", "b"]);
        let nfa = compile(&Clause::any_token(0, None), Direction::Forward, &segment).unwrap();
        assert!(matches(&nfa, &segment, 0, 0, Direction::Forward));
        assert!(!matches(&nfa, &segment, 0, 2, Direction::Forward));
        assert!(!matches(&nfa, &segment, 0, -1, Direction::Backward));
        assert!(!matches(&nfa, &segment, 7, 0, Direction::Forward));
    }

    #[test]
    fn test_empty_loop_terminates() {
        let segment = segment(&["a", "a", "b"]);
        let clause = Clause::repetition(Clause::repetition(t("a"), 0, Some(1)), 0, None);
        let nfa = compile(&clause, Direction::Forward, &segment).unwrap();
        assert_eq!(match_ends(&nfa, &segment, 0, 0, Direction::Forward), vec![0, 1, 2]);
    }
}

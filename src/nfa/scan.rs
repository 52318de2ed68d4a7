use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::forward_index::{DocId, ForwardIndexAccessor};
use crate::nfa::matcher::match_spans;
use crate::nfa::state::Nfa;

/// One match of a full-document scan, `[start, end)` in token positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hit {
    pub doc: DocId,
    pub start: usize,
    pub end: usize,
}

/// Try `nfa` at every position of every document in `docs`, in parallel.
///
/// This bypasses any anchor and is meant for small segments, verification,
/// and benchmarking. Hits come back sorted by document then span. Empty
/// matches are not hits, so a clause and its mirrored automaton report the
/// same spans.
pub fn scan_documents(nfa: &Nfa, accessor: &dyn ForwardIndexAccessor, docs: &[DocId]) -> Vec<Hit> {
    let mut hits: Vec<Hit> = docs
        .par_iter()
        .flat_map_iter(|&doc| {
            (0..accessor.doc_length(doc)).flat_map(move |pos| {
                match_spans(nfa, accessor, doc, pos, nfa.direction())
                    .into_iter()
                    .filter(|(start, end)| start < end)
                    .map(move |(start, end)| Hit { doc, start, end })
            })
        })
        .collect();
    hits.sort_unstable();
    hits.dedup();
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Clause;
    use crate::config::ForwardIndexConfig;
    use crate::forward_index::Sensitivity;
    use crate::nfa::{Direction, compile};
    use crate::segment::{AnnotatedDocument, SegmentWriter};

    #[test]
    fn test_scan_both_directions_agree() {
        let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default()).unwrap();
        for words in [["a", "b", "a", "b"], ["b", "b", "a", "c"]] {
            writer
                .add_document(&AnnotatedDocument::new().annotation("word", words))
                .unwrap();
        }
        let segment = writer.seal().unwrap();
        let clause = Clause::sequence(vec![
            Clause::term("word", "a", Sensitivity::Sensitive),
            Clause::term("word", "b", Sensitivity::Sensitive),
        ]);

        let forward = compile(&clause, Direction::Forward, &segment).unwrap();
        let backward = compile(&clause, Direction::Backward, &segment).unwrap();
        let hits = scan_documents(&forward, &segment, &[0, 1]);
        assert_eq!(
            hits,
            vec![
                Hit { doc: 0, start: 0, end: 2 },
                Hit { doc: 0, start: 2, end: 4 },
            ]
        );
        assert_eq!(scan_documents(&backward, &segment, &[0, 1]), hits);
    }

    #[test]
    fn test_empty_matches_are_dropped_in_both_directions() {
        let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default()).unwrap();
        writer
            .add_document(&AnnotatedDocument::new().annotation("word", ["a", "b", "a"]))
            .unwrap();
        let segment = writer.seal().unwrap();
        let clause = Clause::repetition(Clause::term("word", "a", Sensitivity::Sensitive), 0, Some(1));

        let forward = compile(&clause, Direction::Forward, &segment).unwrap();
        let backward = compile(&clause, Direction::Backward, &segment).unwrap();
        let hits = scan_documents(&forward, &segment, &[0]);
        assert_eq!(
            hits,
            vec![
                Hit { doc: 0, start: 0, end: 1 },
                Hit { doc: 0, start: 2, end: 3 },
            ]
        );
        assert_eq!(scan_documents(&backward, &segment, &[0]), hits);
    }
}

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::clause::Clause;
use crate::error::Result;
use crate::forward_index::{DocId, ForwardIndexAccessor};
use crate::nfa::{Direction, Nfa, compile, match_ends};

/// A pair rewritten for forward-index matching.
///
/// The anchor is evaluated by the host's inverted-index engine. At every
/// anchor hit the NFA compiled from `nfa_clause` is walked away from the
/// anchor: to the right for [`Direction::Forward`], to the left for
/// [`Direction::Backward`].
///
/// Equality and hashing ignore the compiled NFA, which follows from the
/// clause and direction.
#[derive(Debug, Clone)]
pub struct AnchoredNfa {
    anchor: Box<Clause>,
    nfa_clause: Box<Clause>,
    direction: Direction,
    nfa: Arc<Nfa>,
}

impl AnchoredNfa {
    pub fn new(
        anchor: Clause,
        nfa_clause: Clause,
        direction: Direction,
        accessor: &dyn ForwardIndexAccessor,
    ) -> Result<Self> {
        let nfa = compile(&nfa_clause, direction, accessor)?;
        Ok(AnchoredNfa {
            anchor: Box::new(anchor),
            nfa_clause: Box::new(nfa_clause),
            direction,
            nfa: Arc::new(nfa),
        })
    }

    /// Grow the NFA side by a clause on its far side.
    pub fn extend(&self, clause: Clause, accessor: &dyn ForwardIndexAccessor) -> Result<Self> {
        let nfa_clause = match self.direction {
            Direction::Forward => Clause::flat_sequence([(*self.nfa_clause).clone(), clause]),
            Direction::Backward => Clause::flat_sequence([clause, (*self.nfa_clause).clone()]),
        };
        AnchoredNfa::new((*self.anchor).clone(), nfa_clause, self.direction, accessor)
    }

    pub fn anchor(&self) -> &Clause {
        &self.anchor
    }

    pub fn nfa_clause(&self) -> &Clause {
        &self.nfa_clause
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn nfa(&self) -> &Arc<Nfa> {
        &self.nfa
    }

    /// The equivalent plain sequence, in text order.
    pub fn text_order(&self) -> Clause {
        let anchor = (*self.anchor).clone();
        let nfa_clause = (*self.nfa_clause).clone();
        match self.direction {
            Direction::Forward => Clause::flat_sequence([anchor, nfa_clause]),
            Direction::Backward => Clause::flat_sequence([nfa_clause, anchor]),
        }
    }

    /// Hits `(start, end)` (end exclusive) of the whole pair, given one hit
    /// `[anchor_start, anchor_end)` of the anchor in `doc`.
    pub fn hits_from_anchor(
        &self,
        accessor: &dyn ForwardIndexAccessor,
        doc: DocId,
        anchor_start: usize,
        anchor_end: usize,
    ) -> Vec<(usize, usize)> {
        let length = accessor.doc_length(doc);
        let empty_ok = self.nfa_clause.matches_empty_sequence();
        match self.direction {
            Direction::Forward => {
                if anchor_end >= length {
                    return if empty_ok { vec![(anchor_start, anchor_end)] } else { Vec::new() };
                }
                match_ends(&self.nfa, accessor, doc, anchor_end as isize, Direction::Forward)
                    .into_iter()
                    .map(|end| (anchor_start, end as usize))
                    .collect()
            }
            Direction::Backward => {
                if anchor_start == 0 {
                    return if empty_ok { vec![(anchor_start, anchor_end)] } else { Vec::new() };
                }
                let mut hits: Vec<(usize, usize)> =
                    match_ends(&self.nfa, accessor, doc, anchor_start as isize - 1, Direction::Backward)
                        .into_iter()
                        .map(|end| ((end + 1) as usize, anchor_end))
                        .collect();
                hits.sort_unstable();
                hits
            }
        }
    }
}

impl PartialEq for AnchoredNfa {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction && self.anchor == other.anchor && self.nfa_clause == other.nfa_clause
    }
}

impl Eq for AnchoredNfa {}

impl Hash for AnchoredNfa {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.anchor.hash(state);
        self.nfa_clause.hash(state);
        self.direction.hash(state);
    }
}

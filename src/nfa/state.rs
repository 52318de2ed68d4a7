//! NFA states kept in an arena and addressed by index.

use serde::{Deserialize, Serialize};

use crate::forward_index::{DocId, ForwardIndexAccessor, TermId};

/// Index of a state inside its [`Nfa`].
pub type StateId = usize;

/// Placeholder for a transition that has not been patched yet.
pub(crate) const HOLE: StateId = StateId::MAX;

/// Scan direction over a document's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Position delta per consumed token.
    pub fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Predicate over the token at one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTest {
    Any,
    /// Token id of `annotation` is one of `ids` (sorted, deduplicated).
    Terms { annotation: usize, ids: Box<[TermId]> },
    Not(Box<TokenTest>),
    AnyOf(Vec<TokenTest>),
}

impl TokenTest {
    pub fn terms(annotation: usize, mut ids: Vec<TermId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        TokenTest::Terms {
            annotation,
            ids: ids.into_boxed_slice(),
        }
    }

    /// Evaluate at `pos`, which the caller has checked to be inside the
    /// document.
    pub fn accepts(&self, accessor: &dyn ForwardIndexAccessor, doc: DocId, pos: usize) -> bool {
        match self {
            TokenTest::Any => true,
            TokenTest::Terms { annotation, ids } => accessor
                .token(*annotation, doc, pos)
                .is_some_and(|id| ids.binary_search(&id).is_ok()),
            TokenTest::Not(inner) => !inner.accepts(accessor, doc, pos),
            TokenTest::AnyOf(tests) => tests.iter().any(|t| t.accepts(accessor, doc, pos)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfaState {
    /// Consume one token satisfying `test`, then continue at `next`.
    Token { test: TokenTest, next: StateId },
    /// Continue at every target without consuming input.
    Split { targets: Vec<StateId> },
    Accept,
}

/// A compiled automaton. Holds no per-match state, so one instance can be
/// shared by any number of concurrent matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nfa {
    pub(crate) states: Vec<NfaState>,
    pub(crate) start: StateId,
    pub(crate) direction: Direction,
}

impl Nfa {
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    /// Direction the automaton was compiled for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A partially built automaton: an entry state plus the transitions still
/// waiting to be connected to whatever comes next.
#[derive(Debug)]
pub(crate) struct Fragment {
    pub start: StateId,
    /// (state, slot) pairs; slot 0 is a token's `next`, slot i a split's
    /// i-th target.
    pub outs: Vec<(StateId, usize)>,
}

/// Thompson-style construction over a growing state arena.
#[derive(Debug, Default)]
pub(crate) struct NfaBuilder {
    states: Vec<NfaState>,
}

impl NfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, state: NfaState) -> StateId {
        self.states.push(state);
        self.states.len() - 1
    }

    fn patch(&mut self, outs: &[(StateId, usize)], target: StateId) {
        for &(state, slot) in outs {
            match &mut self.states[state] {
                NfaState::Token { next, .. } => *next = target,
                NfaState::Split { targets } => targets[slot] = target,
                NfaState::Accept => {}
            }
        }
    }

    pub fn token(&mut self, test: TokenTest) -> Fragment {
        let id = self.push(NfaState::Token { test, next: HOLE });
        Fragment {
            start: id,
            outs: vec![(id, 0)],
        }
    }

    /// Matches the empty sequence.
    pub fn epsilon(&mut self) -> Fragment {
        let id = self.push(NfaState::Split { targets: vec![HOLE] });
        Fragment {
            start: id,
            outs: vec![(id, 0)],
        }
    }

    /// Matches nothing at all.
    pub fn fail(&mut self) -> Fragment {
        let id = self.push(NfaState::Split { targets: Vec::new() });
        Fragment {
            start: id,
            outs: Vec::new(),
        }
    }

    pub fn concat(&mut self, first: Fragment, second: Fragment) -> Fragment {
        self.patch(&first.outs, second.start);
        Fragment {
            start: first.start,
            outs: second.outs,
        }
    }

    pub fn alternate(&mut self, branches: Vec<Fragment>) -> Fragment {
        let targets = branches.iter().map(|b| b.start).collect();
        let id = self.push(NfaState::Split { targets });
        Fragment {
            start: id,
            outs: branches.into_iter().flat_map(|b| b.outs).collect(),
        }
    }

    /// Zero or one occurrence.
    pub fn optional(&mut self, body: Fragment) -> Fragment {
        let id = self.push(NfaState::Split {
            targets: vec![body.start, HOLE],
        });
        let mut outs = body.outs;
        outs.push((id, 1));
        Fragment { start: id, outs }
    }

    /// Zero or more occurrences, through a cyclic split.
    pub fn star(&mut self, body: Fragment) -> Fragment {
        let id = self.push(NfaState::Split {
            targets: vec![body.start, HOLE],
        });
        self.patch(&body.outs, id);
        Fragment {
            start: id,
            outs: vec![(id, 1)],
        }
    }

    /// Terminate the fragment with an accept state.
    pub fn finish(mut self, fragment: Fragment, direction: Direction) -> Nfa {
        let accept = self.push(NfaState::Accept);
        self.patch(&fragment.outs, accept);
        Nfa {
            states: self.states,
            start: fragment.start,
            direction,
        }
    }
}

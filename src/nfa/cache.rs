use std::sync::Arc;

use ahash::AHashMap;
use log::debug;
use parking_lot::RwLock;

use crate::clause::Clause;
use crate::error::Result;
use crate::forward_index::ForwardIndexAccessor;
use crate::nfa::compiler::compile;
use crate::nfa::state::{Direction, Nfa};

/// Compiled automata keyed by clause and direction.
///
/// Term ids are segment specific, so a cache must only ever be used with
/// the accessor of a single segment.
#[derive(Debug, Default)]
pub struct NfaCache {
    entries: RwLock<AHashMap<(Clause, Direction), Arc<Nfa>>>,
}

impl NfaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached automaton for `clause`, compiling it on a miss.
    pub fn get_or_compile(
        &self,
        clause: &Clause,
        direction: Direction,
        accessor: &dyn ForwardIndexAccessor,
    ) -> Result<Arc<Nfa>> {
        let key = (clause.clone(), direction);
        if let Some(nfa) = self.entries.read().get(&key) {
            return Ok(Arc::clone(nfa));
        }

        let nfa = Arc::new(compile(clause, direction, accessor)?);
        let mut entries = self.entries.write();
        let entry = entries.entry(key).or_insert_with(|| {
            debug!("Compiled {direction:?} NFA with {} states for {clause}", nfa.len());
            Arc::clone(&nfa)
        });
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

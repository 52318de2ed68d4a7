//! Token-level NFA: construction from clauses, simulation against a
//! forward index, and per-segment caching.

mod cache;
mod compiler;
mod matcher;
mod scan;
mod state;

pub use cache::NfaCache;
pub use compiler::compile;
pub use matcher::{match_ends, match_spans, matches};
pub use scan::{Hit, scan_documents};
pub use state::{Direction, Nfa, NfaState, StateId, TokenTest};

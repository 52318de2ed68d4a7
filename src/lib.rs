//! # Lexis
//!
//! Forward-index storage and NFA token matching for annotated corpus search.
//!
//! ## Features
//!
//! - Per-annotation forward index with free-space reuse
//! - Term dictionaries with case and accent insensitive lookup
//! - Clause trees compiled to NFAs for either scan direction
//! - Cost-based clause optimizer that anchors NFA matching on rare clauses
//! - Segments persisted to plain directories
//!
//! ## Example
//!
//! ```
//! use lexis::{
//!     AnnotatedDocument, Clause, ClauseOptimizer, Direction, ForwardIndexConfig, OptimizeContext,
//!     Sensitivity, SegmentWriter, compile, match_spans,
//! };
//!
//! let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default())?;
//! writer.add_document(&AnnotatedDocument::new().annotation("word", ["This", "is", "very", "fun"]))?;
//! let segment = writer.seal()?;
//!
//! let query = Clause::sequence(vec![
//!     Clause::term("word", "very", Sensitivity::Insensitive),
//!     Clause::term("word", "very", Sensitivity::Insensitive),
//! ]);
//! let optimized = ClauseOptimizer::default().optimize_tree(&query, &OptimizeContext::for_segment(&segment))?;
//! assert_eq!(optimized.to_string(), "REP(TERM(word@i:very), 2, 2)");
//!
//! let single = Clause::term("word", "VERY", Sensitivity::Insensitive);
//! let nfa = compile(&single, Direction::Forward, &segment)?;
//! assert_eq!(match_spans(&nfa, &segment, 0, 2, Direction::Forward), vec![(2, 3)]);
//! # Ok::<(), lexis::LexisError>(())
//! ```

pub mod clause;
pub mod config;
mod error;
pub mod forward_index;
pub mod nfa;
pub mod optimize;
pub mod segment;

pub use clause::{AnchoredNfa, Clause, ExpansionSide, FilterOperation, SegmentStatistics};
pub use config::{ForwardIndexConfig, IndexConfig, NfaMatchingConfig};
pub use error::{LexisError, Result};
pub use forward_index::{
    DocId, Fiid, ForwardIndexAccessor, ForwardIndexStore, Sensitivity, TermId, Terms, TermsWriter,
};
pub use nfa::{Direction, Hit, Nfa, NfaCache, compile, match_ends, match_spans, matches, scan_documents};
pub use optimize::{ClauseOptimizer, CombineRegistry, CombineRule, OptimizeContext};
pub use segment::{AnnotatedDocument, Segment, SegmentWriter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

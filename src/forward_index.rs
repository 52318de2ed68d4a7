//! Forward index: (document, position) to term id.
//!
//! - [`terms`]: interned annotation values and their sort orders
//! - [`gaps`] / [`store`]: token storage with free-space reuse
//! - [`annotation`]: one annotation stream, dictionary plus store
//! - [`accessor`]: the read-only view the matcher works against

pub mod accessor;
pub mod annotation;
pub mod gaps;
pub mod store;
pub mod terms;

pub use accessor::{DocId, ForwardIndexAccessor};
pub use annotation::{AnnotationForwardIndex, AnnotationForwardIndexWriter};
pub use gaps::FreeGapList;
pub use store::{Fiid, ForwardIndexStore, TocEntry};
pub use terms::{Sensitivity, TermId, Terms, TermsWriter, fold};

//! Read-only, segment-scoped view of the forward index used by the pattern
//! compiler and the NFA matcher.

use crate::error::Result;
use crate::forward_index::terms::{Sensitivity, TermId};

/// Segment-level document id.
pub type DocId = u32;

/// Everything the matching engine needs from stored data.
///
/// Implementations never expose writes and must be callable from many
/// query threads at once.
pub trait ForwardIndexAccessor: Send + Sync {
    /// Number of an annotation, or `NotFound` for an unknown name.
    fn annotation_number(&self, name: &str) -> Result<usize>;

    fn annotation_name(&self, annotation: usize) -> Option<&str>;

    /// Token at `pos` of a document, `None` when the position, document or
    /// annotation does not exist.
    fn token(&self, annotation: usize, doc: DocId, pos: usize) -> Option<TermId>;

    /// Tokens `[start, end)` of a document, clamped to its length.
    fn chunk(&self, annotation: usize, doc: DocId, start: usize, end: usize) -> Result<&[TermId]>;

    /// Length of a document in tokens; 0 for unknown or deleted documents.
    fn doc_length(&self, doc: DocId) -> usize;

    /// Ids whose value equals `value` under `sensitivity`; empty if unknown.
    fn resolve_term_ids(&self, annotation: usize, value: &str, sensitivity: Sensitivity) -> Vec<TermId>;

    /// Ids whose whole value matches the regular expression `pattern`.
    fn matching_term_ids(&self, annotation: usize, pattern: &str, sensitivity: Sensitivity) -> Result<Vec<TermId>>;

    fn term_string(&self, annotation: usize, id: TermId) -> Option<&str>;

    /// Whether all ids denote the same value under `sensitivity`.
    fn terms_equal(&self, annotation: usize, ids: &[TermId], sensitivity: Sensitivity) -> bool;

    /// Number of distinct terms of an annotation.
    fn term_count(&self, annotation: usize) -> u64;
}

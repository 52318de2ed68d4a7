//! Annotated segments.
//!
//! A [`SegmentWriter`] owns one forward index per annotation and is the
//! single writer while indexing. Sealing it yields an immutable [`Segment`]
//! that implements [`ForwardIndexAccessor`] and [`SegmentStatistics`] and
//! can be shared across query threads behind an `Arc`.

use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::clause::SegmentStatistics;
use crate::config::ForwardIndexConfig;
use crate::error::{LexisError, Result};
use crate::forward_index::{
    AnnotationForwardIndex, AnnotationForwardIndexWriter, DocId, Fiid, ForwardIndexAccessor, Sensitivity, TermId,
};

const META_FILE: &str = "segment.json";
const META_VERSION: u32 = 1;

/// One document: a value list per annotation, all of the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedDocument {
    annotations: Vec<(String, Vec<String>)>,
}

impl AnnotatedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the values of one annotation.
    pub fn annotation<S: Into<String>>(mut self, name: &str, values: impl IntoIterator<Item = S>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        match self.annotations.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = values,
            None => self.annotations.push((name.to_string(), values)),
        }
        self
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.annotations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentMeta {
    version: u32,
    annotations: Vec<String>,
    /// Per document the fiid in each annotation, `None` once deleted.
    docs: Vec<Option<Vec<Fiid>>>,
}

fn name_index(names: &[String]) -> Result<AHashMap<String, usize>> {
    if names.is_empty() {
        return Err(LexisError::invalid_argument("a segment needs at least one annotation"));
    }
    let mut index = AHashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if index.insert(name.clone(), i).is_some() {
            return Err(LexisError::invalid_argument(format!("duplicate annotation '{name}'")));
        }
    }
    Ok(index)
}

/// Single-writer builder for a [`Segment`].
#[derive(Debug)]
pub struct SegmentWriter {
    config: ForwardIndexConfig,
    names: AHashMap<String, usize>,
    annotations: Vec<AnnotationForwardIndexWriter>,
    docs: Vec<Option<Vec<Fiid>>>,
}

impl SegmentWriter {
    pub fn new<S: AsRef<str>>(annotations: &[S], config: ForwardIndexConfig) -> Result<Self> {
        let list: Vec<String> = annotations.iter().map(|s| s.as_ref().to_string()).collect();
        let names = name_index(&list)?;
        Ok(SegmentWriter {
            annotations: list
                .iter()
                .map(|n| AnnotationForwardIndexWriter::new(n.clone(), config.clone()))
                .collect(),
            config,
            names,
            docs: Vec::new(),
        })
    }

    /// Add a document. Every annotation must be present and all value lists
    /// must have the same length.
    pub fn add_document(&mut self, doc: &AnnotatedDocument) -> Result<DocId> {
        let mut length = None;
        for (name, values) in &doc.annotations {
            if !self.names.contains_key(name) {
                return Err(LexisError::not_found(format!("annotation '{name}'")));
            }
            match length {
                None => length = Some(values.len()),
                Some(len) if len != values.len() => {
                    return Err(LexisError::invalid_argument(format!(
                        "annotation '{name}' has {} values, expected {len}",
                        values.len()
                    )));
                }
                Some(_) => {}
            }
        }
        for writer in &self.annotations {
            if doc.values(writer.name()).is_none() {
                return Err(LexisError::invalid_argument(format!(
                    "document lacks annotation '{}'",
                    writer.name()
                )));
            }
        }

        let fiids = self
            .annotations
            .iter_mut()
            .map(|writer| {
                let values = doc.values(writer.name()).unwrap_or_default();
                writer.add_document(values)
            })
            .collect();
        let doc_id = self.docs.len() as DocId;
        self.docs.push(Some(fiids));
        Ok(doc_id)
    }

    /// Remove a document from every annotation store.
    pub fn delete_document(&mut self, doc: DocId) -> Result<()> {
        let fiids = self
            .docs
            .get_mut(doc as usize)
            .and_then(Option::take)
            .ok_or_else(|| LexisError::not_found(format!("document {doc}")))?;
        for (writer, fiid) in self.annotations.iter_mut().zip(fiids) {
            writer.delete_document(fiid);
        }
        Ok(())
    }

    pub fn num_docs(&self) -> usize {
        self.docs.iter().filter(|d| d.is_some()).count()
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationForwardIndexWriter> {
        self.names.get(name).map(|&i| &self.annotations[i])
    }

    pub fn seal(self) -> Result<Segment> {
        let annotations = self
            .annotations
            .into_iter()
            .map(AnnotationForwardIndexWriter::seal)
            .collect::<Result<Vec<_>>>()?;
        Ok(Segment {
            config: self.config,
            names: self.names,
            annotations,
            docs: self.docs,
        })
    }
}

/// Immutable, queryable segment.
#[derive(Debug)]
pub struct Segment {
    config: ForwardIndexConfig,
    names: AHashMap<String, usize>,
    annotations: Vec<AnnotationForwardIndex>,
    docs: Vec<Option<Vec<Fiid>>>,
}

impl Segment {
    /// Number of document ids handed out, deleted ones included.
    pub fn max_doc(&self) -> usize {
        self.docs.len()
    }

    pub fn num_docs(&self) -> usize {
        self.docs.iter().filter(|d| d.is_some()).count()
    }

    pub fn live_docs(&self) -> impl Iterator<Item = DocId> + '_ {
        self.docs
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_some())
            .map(|(i, _)| i as DocId)
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationForwardIndex> {
        self.names.get(name).map(|&i| &self.annotations[i])
    }

    pub fn config(&self) -> &ForwardIndexConfig {
        &self.config
    }

    fn fiid(&self, annotation: usize, doc: DocId) -> Option<Fiid> {
        self.docs
            .get(doc as usize)?
            .as_ref()
            .and_then(|fiids| fiids.get(annotation).copied())
    }

    /// Write the segment into `dir`, which is created if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for annotation in &self.annotations {
            annotation.save(dir)?;
        }
        let meta = SegmentMeta {
            version: META_VERSION,
            annotations: self.annotations.iter().map(|a| a.name().to_string()).collect(),
            docs: self.docs.clone(),
        };
        fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?)?;
        Ok(())
    }

    pub fn open(dir: &Path, config: ForwardIndexConfig) -> Result<Self> {
        let meta: SegmentMeta = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)?;
        if meta.version != META_VERSION {
            return Err(LexisError::index(format!(
                "unsupported segment version {}",
                meta.version
            )));
        }
        let names = name_index(&meta.annotations)?;
        let annotations = meta
            .annotations
            .iter()
            .map(|name| AnnotationForwardIndex::open(dir, name, config.clone()))
            .collect::<Result<Vec<_>>>()?;

        for (doc, fiids) in meta.docs.iter().enumerate() {
            let Some(fiids) = fiids else { continue };
            if fiids.len() != annotations.len() {
                return Err(LexisError::index(format!(
                    "document {doc} lists {} fiids for {} annotations",
                    fiids.len(),
                    annotations.len()
                )));
            }
            for (annotation, &fiid) in annotations.iter().zip(fiids) {
                let store = annotation.store();
                if fiid as usize >= store.num_fiids() || store.is_deleted(fiid) {
                    return Err(LexisError::index(format!(
                        "document {doc} refers to missing fiid {fiid} in '{}'",
                        annotation.name()
                    )));
                }
            }
        }
        let deleted = meta.docs.iter().filter(|d| d.is_none()).count();
        if deleted > 0 {
            log::warn!("opened segment {} with {deleted} deleted documents", dir.display());
        }

        Ok(Segment {
            config,
            names,
            annotations,
            docs: meta.docs,
        })
    }
}

impl ForwardIndexAccessor for Segment {
    fn annotation_number(&self, name: &str) -> Result<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| LexisError::not_found(format!("annotation '{name}'")))
    }

    fn annotation_name(&self, annotation: usize) -> Option<&str> {
        self.annotations.get(annotation).map(|a| a.name())
    }

    fn token(&self, annotation: usize, doc: DocId, pos: usize) -> Option<TermId> {
        let fiid = self.fiid(annotation, doc)?;
        self.annotations[annotation]
            .store()
            .retrieve(fiid, None, None)
            .ok()?
            .get(pos)
            .copied()
    }

    fn chunk(&self, annotation: usize, doc: DocId, start: usize, end: usize) -> Result<&[TermId]> {
        let fiid = self
            .fiid(annotation, doc)
            .ok_or_else(|| LexisError::not_found(format!("document {doc} in annotation {annotation}")))?;
        self.annotations[annotation]
            .store()
            .retrieve(fiid, Some(start), Some(end))
    }

    fn doc_length(&self, doc: DocId) -> usize {
        self.fiid(0, doc)
            .map(|fiid| self.annotations[0].store().doc_length(fiid))
            .unwrap_or(0)
    }

    fn resolve_term_ids(&self, annotation: usize, value: &str, sensitivity: Sensitivity) -> Vec<TermId> {
        self.annotations
            .get(annotation)
            .map(|a| a.terms().index_of(value, sensitivity))
            .unwrap_or_default()
    }

    fn matching_term_ids(&self, annotation: usize, pattern: &str, sensitivity: Sensitivity) -> Result<Vec<TermId>> {
        match self.annotations.get(annotation) {
            Some(a) => a.terms().matching(pattern, sensitivity),
            None => Err(LexisError::not_found(format!("annotation {annotation}"))),
        }
    }

    fn term_string(&self, annotation: usize, id: TermId) -> Option<&str> {
        let terms = self.annotations.get(annotation)?.terms();
        ((id as usize) < terms.len()).then(|| terms.get(id))
    }

    fn terms_equal(&self, annotation: usize, ids: &[TermId], sensitivity: Sensitivity) -> bool {
        self.annotations
            .get(annotation)
            .is_some_and(|a| a.terms().terms_equal(ids, sensitivity))
    }

    fn term_count(&self, annotation: usize) -> u64 {
        self.annotations
            .get(annotation)
            .map_or(0, |a| a.terms().len() as u64)
    }
}

impl SegmentStatistics for Segment {
    fn total_tokens(&self) -> u64 {
        self.annotations.first().map_or(0, |a| a.total_tokens())
    }

    fn term_frequency(&self, annotation: &str, value: &str, sensitivity: Sensitivity) -> u64 {
        self.annotation(annotation)
            .map_or(0, |a| a.value_frequency(value, sensitivity))
    }

    fn regex_frequency(&self, annotation: &str, pattern: &str, sensitivity: Sensitivity) -> u64 {
        self.annotation(annotation)
            .and_then(|a| a.regex_frequency(pattern, sensitivity).ok())
            .unwrap_or(0)
    }

    fn unique_terms(&self, annotation: &str) -> u64 {
        self.annotation(annotation)
            .map_or(0, |a| a.terms().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &[&str], pos: &[&str]) -> AnnotatedDocument {
        AnnotatedDocument::new()
            .annotation("word", words.iter().copied())
            .annotation("pos", pos.iter().copied())
    }

    #[test]
    fn test_add_and_access() {
        let mut writer = SegmentWriter::new(&["word", "pos"], ForwardIndexConfig::default()).unwrap();
        let d0 = writer
            .add_document(&doc(&["The", "cat", "sat"], &["DET", "NOUN", "VERB"]))
            .unwrap();
        let segment = writer.seal().unwrap();

        let word = segment.annotation_number("word").unwrap();
        let pos = segment.annotation_number("pos").unwrap();
        assert_eq!(segment.doc_length(d0), 3);
        let cat = segment.resolve_term_ids(word, "cat", Sensitivity::Sensitive);
        assert_eq!(segment.token(word, d0, 1), cat.first().copied());
        assert_eq!(segment.term_string(pos, segment.token(pos, d0, 2).unwrap()), Some("VERB"));
        assert_eq!(segment.token(word, d0, 3), None);
        assert_eq!(segment.chunk(word, d0, 1, 10).unwrap().len(), 2);
        assert_eq!(segment.doc_length(42), 0);
        assert!(matches!(segment.annotation_number("lemma"), Err(LexisError::NotFound(_))));
        assert_eq!(segment.term_frequency("word", "the", Sensitivity::Insensitive), 1);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let mut writer = SegmentWriter::new(&["word", "pos"], ForwardIndexConfig::default()).unwrap();
        assert!(writer.add_document(&doc(&["a", "b"], &["X"])).is_err());
        let missing = AnnotatedDocument::new().annotation("word", ["a"]);
        assert!(writer.add_document(&missing).is_err());
        assert!(SegmentWriter::new(&["word", "word"], ForwardIndexConfig::default()).is_err());
    }

    #[test]
    fn test_delete_document() {
        let mut writer = SegmentWriter::new(&["word"], ForwardIndexConfig::default()).unwrap();
        let d0 = writer.add_document(&AnnotatedDocument::new().annotation("word", ["a", "b"])).unwrap();
        let d1 = writer.add_document(&AnnotatedDocument::new().annotation("word", ["c"])).unwrap();
        writer.delete_document(d0).unwrap();
        assert!(writer.delete_document(d0).is_err());
        assert_eq!(writer.num_docs(), 1);

        let segment = writer.seal().unwrap();
        assert_eq!(segment.doc_length(d0), 0);
        assert_eq!(segment.token(0, d0, 0), None);
        assert_eq!(segment.live_docs().collect::<Vec<_>>(), vec![d1]);
    }
}

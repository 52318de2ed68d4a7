//! One annotation's forward index: term dictionary, token store and term
//! frequencies.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::ForwardIndexConfig;
use crate::error::{LexisError, Result};
use crate::forward_index::store::{Fiid, ForwardIndexStore};
use crate::forward_index::terms::{Sensitivity, TermId, Terms, TermsWriter};

/// Write-mode forward index for a single annotation.
#[derive(Debug)]
pub struct AnnotationForwardIndexWriter {
    name: String,
    terms: TermsWriter,
    store: ForwardIndexStore,
    term_freqs: Vec<u64>,
}

impl AnnotationForwardIndexWriter {
    pub fn new(name: impl Into<String>, config: ForwardIndexConfig) -> Self {
        AnnotationForwardIndexWriter {
            name: name.into(),
            terms: TermsWriter::new(),
            store: ForwardIndexStore::with_config(config),
            term_freqs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Intern every value and store the resulting token ids.
    pub fn add_document<S: AsRef<str>>(&mut self, values: &[S]) -> Fiid {
        let ids: Vec<TermId> = values
            .iter()
            .map(|v| {
                let id = self.terms.intern(v.as_ref());
                if id as usize == self.term_freqs.len() {
                    self.term_freqs.push(0);
                }
                self.term_freqs[id as usize] += 1;
                id
            })
            .collect();
        self.store.add_document(&ids)
    }

    /// # Panics
    ///
    /// Panics if `fiid` is unknown or already deleted.
    pub fn delete_document(&mut self, fiid: Fiid) {
        // A whole-document retrieve never fails; a deleted fiid panics here.
        if let Ok(tokens) = self.store.retrieve(fiid, None, None) {
            for &id in tokens {
                self.term_freqs[id as usize] -= 1;
            }
        }
        self.store.delete_document(fiid);
    }

    pub fn store(&self) -> &ForwardIndexStore {
        &self.store
    }

    pub fn terms(&self) -> &TermsWriter {
        &self.terms
    }

    pub fn seal(self) -> Result<AnnotationForwardIndex> {
        let total_tokens = self.term_freqs.iter().sum();
        Ok(AnnotationForwardIndex {
            name: self.name,
            terms: self.terms.seal()?,
            store: self.store,
            term_freqs: self.term_freqs,
            total_tokens,
        })
    }
}

/// Sealed, read-only forward index for a single annotation.
#[derive(Debug)]
pub struct AnnotationForwardIndex {
    name: String,
    terms: Terms,
    store: ForwardIndexStore,
    term_freqs: Vec<u64>,
    total_tokens: u64,
}

impl AnnotationForwardIndex {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    pub fn store(&self) -> &ForwardIndexStore {
        &self.store
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Occurrences of a term in live documents.
    pub fn term_frequency(&self, id: TermId) -> u64 {
        self.term_freqs.get(id as usize).copied().unwrap_or(0)
    }

    /// Summed frequency of every term matching `value`.
    pub fn value_frequency(&self, value: &str, sensitivity: Sensitivity) -> u64 {
        self.terms
            .index_of(value, sensitivity)
            .into_iter()
            .map(|id| self.term_frequency(id))
            .sum()
    }

    /// Summed frequency of every term matching `pattern`.
    pub fn regex_frequency(&self, pattern: &str, sensitivity: Sensitivity) -> Result<u64> {
        Ok(self
            .terms
            .matching(pattern, sensitivity)?
            .into_iter()
            .map(|id| self.term_frequency(id))
            .sum())
    }

    /// Write `<name>.terms` and `<name>.fi` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(dir.join(format!("{}.terms", self.name)))?);
        self.terms.write_to(&mut out)?;
        out.flush()?;

        let mut out = BufWriter::new(File::create(dir.join(format!("{}.fi", self.name)))?);
        self.store.write_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Load the files written by [`save`](Self::save). Term frequencies are
    /// recounted from the live documents.
    pub fn open(dir: &Path, name: &str, config: ForwardIndexConfig) -> Result<Self> {
        let mut input = BufReader::new(File::open(dir.join(format!("{name}.terms")))?);
        let terms = Terms::read_from(&mut input)?;

        let mut input = BufReader::new(File::open(dir.join(format!("{name}.fi")))?);
        let store = ForwardIndexStore::read_from(&mut input, config)?;

        let mut term_freqs = vec![0u64; terms.len()];
        for fiid in store.live_fiids() {
            for &id in store.retrieve(fiid, None, None)? {
                match term_freqs.get_mut(id as usize) {
                    Some(freq) => *freq += 1,
                    None => {
                        return Err(LexisError::index(format!(
                            "document {fiid} of '{name}' holds term id {id}, dictionary has {}",
                            terms.len()
                        )));
                    }
                }
            }
        }
        let total_tokens = term_freqs.iter().sum();
        Ok(AnnotationForwardIndex {
            name: name.to_string(),
            terms,
            store,
            term_freqs,
            total_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequencies() {
        let mut writer = AnnotationForwardIndexWriter::new("word", ForwardIndexConfig::default());
        let a = writer.add_document(&["the", "cat", "The", "end"]);
        writer.add_document(&["the", "dog"]);
        writer.delete_document(a);
        writer.add_document(&["cat"]);

        let index = writer.seal().unwrap();
        assert_eq!(index.value_frequency("the", Sensitivity::Sensitive), 1);
        assert_eq!(index.value_frequency("THE", Sensitivity::Insensitive), 1);
        assert_eq!(index.value_frequency("cat", Sensitivity::Sensitive), 1);
        assert_eq!(index.regex_frequency("(cat|dog)", Sensitivity::Sensitive).unwrap(), 2);
        assert_eq!(index.total_tokens(), 3);
    }
}

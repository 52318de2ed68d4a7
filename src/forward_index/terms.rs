//! Term dictionary: interned annotation values addressed by small integer ids.
//!
//! A dictionary is built by a single [`TermsWriter`] during indexing and then
//! sealed into an immutable [`Terms`], which answers lookups through two fst
//! maps: the exact value to its id, and the folded (case and accent
//! insensitive) key to a group of ids sharing that key.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use ahash::AHashMap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fst::{Map, MapBuilder, Streamer};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{LexisError, Result};

/// Term id within one annotation of one segment.
pub type TermId = u32;

/// Whether comparison and lookup are exact or fold case and accents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensitivity {
    Sensitive,
    Insensitive,
}

impl Sensitivity {
    pub fn is_sensitive(self) -> bool {
        matches!(self, Sensitivity::Sensitive)
    }
}

/// Fold a value to its insensitive key: decompose, strip combining marks,
/// lower-case.
pub fn fold(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Write-mode dictionary. Interning the same value always yields the same id.
#[derive(Debug, Default)]
pub struct TermsWriter {
    terms: Vec<String>,
    ids: AHashMap<String, TermId>,
}

impl TermsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `value`, assigning the next free id if it is new.
    pub fn intern(&mut self, value: &str) -> TermId {
        if let Some(&id) = self.ids.get(value) {
            return id;
        }
        let id = self.terms.len() as TermId;
        self.terms.push(value.to_string());
        self.ids.insert(value.to_string(), id);
        id
    }

    pub fn index_of(&self, value: &str) -> Option<TermId> {
        self.ids.get(value).copied()
    }

    /// Value of an interned id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never handed out by this writer.
    pub fn get(&self, id: TermId) -> &str {
        match self.terms.get(id as usize) {
            Some(term) => term,
            None => panic!(
                "term id {} out of range [0, {})",
                id,
                self.terms.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Freeze the dictionary for querying.
    pub fn seal(self) -> Result<Terms> {
        Terms::build(self.terms)
    }
}

/// Sealed, read-only term dictionary.
pub struct Terms {
    terms: Vec<String>,
    /// Exact value to term id.
    sensitive: Map<Vec<u8>>,
    /// Folded key to index into `groups`.
    insensitive: Map<Vec<u8>>,
    /// Ids sharing one folded key, in ascending id order. Group index equals
    /// the insensitive sort rank of the key.
    groups: Vec<Vec<TermId>>,
    sensitive_rank: Vec<u32>,
    insensitive_rank: Vec<u32>,
}

impl std::fmt::Debug for Terms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terms")
            .field("len", &self.terms.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Terms {
    fn build(terms: Vec<String>) -> Result<Self> {
        let folded: Vec<String> = terms.iter().map(|t| fold(t)).collect();

        let mut by_value: Vec<(&str, TermId)> = terms
            .iter()
            .enumerate()
            .map(|(id, t)| (t.as_str(), id as TermId))
            .collect();
        by_value.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        let mut builder = MapBuilder::memory();
        for (value, id) in &by_value {
            builder.insert(value.as_bytes(), *id as u64)?;
        }
        let sensitive = Map::new(builder.into_inner()?)?;

        let mut grouped: BTreeMap<&[u8], Vec<TermId>> = BTreeMap::new();
        for (id, key) in folded.iter().enumerate() {
            grouped.entry(key.as_bytes()).or_default().push(id as TermId);
        }
        let mut builder = MapBuilder::memory();
        let mut groups = Vec::with_capacity(grouped.len());
        let mut insensitive_rank = vec![0u32; terms.len()];
        for (rank, (key, ids)) in grouped.into_iter().enumerate() {
            builder.insert(key, rank as u64)?;
            for &id in &ids {
                insensitive_rank[id as usize] = rank as u32;
            }
            groups.push(ids);
        }
        let insensitive = Map::new(builder.into_inner()?)?;

        // Sensitive order: folded key first so that case variants sort
        // next to each other, raw value as the tie breaker.
        let mut order: Vec<TermId> = (0..terms.len() as TermId).collect();
        order.sort_unstable_by(|&a, &b| {
            folded[a as usize]
                .cmp(&folded[b as usize])
                .then_with(|| terms[a as usize].cmp(&terms[b as usize]))
        });
        let mut sensitive_rank = vec![0u32; terms.len()];
        for (rank, id) in order.into_iter().enumerate() {
            sensitive_rank[id as usize] = rank as u32;
        }

        Ok(Terms {
            terms,
            sensitive,
            insensitive,
            groups,
            sensitive_rank,
            insensitive_rank,
        })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn check_id(&self, id: TermId) {
        if id as usize >= self.terms.len() {
            panic!("term id {} out of range [0, {})", id, self.terms.len());
        }
    }

    /// Value of a term id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in `[0, len())`.
    pub fn get(&self, id: TermId) -> &str {
        self.check_id(id);
        &self.terms[id as usize]
    }

    /// Ids matching `value`. Sensitive lookup yields at most one id;
    /// insensitive lookup yields every id whose value folds to the same key.
    /// Unknown values yield an empty vector.
    pub fn index_of(&self, value: &str, sensitivity: Sensitivity) -> Vec<TermId> {
        match sensitivity {
            Sensitivity::Sensitive => self
                .sensitive
                .get(value.as_bytes())
                .map(|id| vec![id as TermId])
                .unwrap_or_default(),
            Sensitivity::Insensitive => self
                .insensitive
                .get(fold(value).as_bytes())
                .map(|group| self.groups[group as usize].clone())
                .unwrap_or_default(),
        }
    }

    /// Sort rank of a term under the given sensitivity. Insensitive ranks
    /// are shared by all ids in one folding group.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn sort_position(&self, id: TermId, sensitivity: Sensitivity) -> u32 {
        self.check_id(id);
        match sensitivity {
            Sensitivity::Sensitive => self.sensitive_rank[id as usize],
            Sensitivity::Insensitive => self.insensitive_rank[id as usize],
        }
    }

    pub fn compare(&self, a: TermId, b: TermId, sensitivity: Sensitivity) -> Ordering {
        self.sort_position(a, sensitivity)
            .cmp(&self.sort_position(b, sensitivity))
    }

    /// True if all ids are equal under `sensitivity`.
    pub fn terms_equal(&self, ids: &[TermId], sensitivity: Sensitivity) -> bool {
        match ids.split_first() {
            None => true,
            Some((&first, rest)) => {
                let pos = self.sort_position(first, sensitivity);
                rest.iter()
                    .all(|&id| self.sort_position(id, sensitivity) == pos)
            }
        }
    }

    /// Ids whose whole value matches `pattern`. Insensitive matching runs a
    /// case-insensitive regex against the folded value.
    pub fn matching(&self, pattern: &str, sensitivity: Sensitivity) -> Result<Vec<TermId>> {
        let regex = anchored_regex(pattern, sensitivity)?;
        let ids = match sensitivity {
            Sensitivity::Sensitive => self
                .terms
                .iter()
                .enumerate()
                .filter(|(_, t)| regex.is_match(t))
                .map(|(id, _)| id as TermId)
                .collect(),
            Sensitivity::Insensitive => {
                let mut ids = Vec::new();
                let mut stream = self.insensitive.stream();
                while let Some((key, group)) = stream.next() {
                    let key = std::str::from_utf8(key)
                        .map_err(|e| LexisError::index(format!("non UTF-8 term key: {e}")))?;
                    if regex.is_match(key) {
                        ids.extend_from_slice(&self.groups[group as usize]);
                    }
                }
                ids.sort_unstable();
                ids
            }
        };
        Ok(ids)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermId, &str)> {
        self.terms
            .iter()
            .enumerate()
            .map(|(id, t)| (id as TermId, t.as_str()))
    }

    /// Serialize as a count followed by length-prefixed UTF-8 values in id
    /// order. The fst maps are rebuilt on load.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.terms.len() as u32)?;
        for term in &self.terms {
            writer.write_u32::<LittleEndian>(term.len() as u32)?;
            writer.write_all(term.as_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_u32::<LittleEndian>()? as usize;
        let mut writer = TermsWriter::new();
        for expected in 0..count {
            let len = reader.read_u32::<LittleEndian>()? as usize;
            let mut buf = Vec::new();
            reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
            if buf.len() != len {
                return Err(LexisError::index(format!(
                    "term {expected} truncated: expected {len} bytes, found {}",
                    buf.len()
                )));
            }
            let value = String::from_utf8(buf)
                .map_err(|e| LexisError::index(format!("term {expected} is not UTF-8: {e}")))?;
            if writer.intern(&value) as usize != expected {
                return Err(LexisError::index(format!(
                    "duplicate term '{value}' in term file"
                )));
            }
        }
        writer.seal()
    }
}

fn anchored_regex(pattern: &str, sensitivity: Sensitivity) -> Result<Regex> {
    Ok(RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(!sensitivity.is_sensitive())
        .build()?)
}

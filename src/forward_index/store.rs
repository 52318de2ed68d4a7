//! Forward index store: per-document token-id arrays for one annotation.
//!
//! Documents live in one contiguous token buffer and are addressed through a
//! table of contents indexed by fiid. Deleting a document returns its region
//! to a [`FreeGapList`]; later additions reuse that space before the buffer
//! grows.
//!
//! # Example
//!
//! ```
//! use lexis::forward_index::ForwardIndexStore;
//!
//! let mut store = ForwardIndexStore::new();
//! let a = store.add_document(&[1, 2, 3]);
//! let b = store.add_document(&[4, 5]);
//! store.delete_document(a);
//! let c = store.add_document(&[6, 7, 8]);
//! assert_eq!(store.retrieve(c, None, None).unwrap(), &[6, 7, 8]);
//! assert_eq!(store.retrieve(b, Some(1), None).unwrap(), &[5]);
//! assert_eq!(store.total_size(), 5);
//! ```

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::config::ForwardIndexConfig;
use crate::error::{LexisError, Result};
use crate::forward_index::gaps::FreeGapList;
use crate::forward_index::terms::TermId;

/// Forward-index document id.
pub type Fiid = u32;

const MAGIC: &[u8; 4] = b"LXFI";
const FORMAT_VERSION: u32 = 1;

/// Upper bound on capacity reserved from counts read out of a file.
const PREALLOCATE_LIMIT: usize = 1 << 16;

/// Table-of-contents entry for one fiid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub offset: usize,
    pub length: usize,
    pub deleted: bool,
}

/// Token storage for one annotation stream.
///
/// Single writer while indexing; once no longer mutated it can be shared
/// between any number of reader threads.
#[derive(Debug, Clone, Default)]
pub struct ForwardIndexStore {
    config: ForwardIndexConfig,
    toc: Vec<TocEntry>,
    tokens: Vec<TermId>,
    gaps: FreeGapList,
}

impl ForwardIndexStore {
    pub fn new() -> Self {
        Self::with_config(ForwardIndexConfig::default())
    }

    pub fn with_config(config: ForwardIndexConfig) -> Self {
        ForwardIndexStore {
            config,
            toc: Vec::new(),
            tokens: Vec::new(),
            gaps: FreeGapList::new(),
        }
    }

    /// Store a document and return its fiid.
    ///
    /// Fiids are handed out in increasing order and never reused until
    /// [`clear`](Self::clear). Space is taken from an exact-size gap, else
    /// from the first larger gap, else appended at the end.
    pub fn add_document(&mut self, token_ids: &[TermId]) -> Fiid {
        let length = token_ids.len();
        let offset = match self.gaps.allocate(length) {
            // Empty documents own no storage.
            None if length == 0 => 0,
            Some(offset) => {
                self.tokens[offset..offset + length].copy_from_slice(token_ids);
                offset
            }
            None => {
                let offset = self.tokens.len();
                if self.tokens.capacity() - offset < length {
                    self.tokens.reserve(length + self.config.growth_reserve);
                }
                self.tokens.extend_from_slice(token_ids);
                offset
            }
        };
        let fiid = self.toc.len() as Fiid;
        self.toc.push(TocEntry {
            offset,
            length,
            deleted: false,
        });
        fiid
    }

    fn entry(&self, fiid: Fiid) -> &TocEntry {
        match self.toc.get(fiid as usize) {
            Some(entry) if !entry.deleted => entry,
            Some(_) => panic!("forward index document {fiid} has been deleted"),
            None => panic!(
                "forward index document {fiid} does not exist ({} allocated)",
                self.toc.len()
            ),
        }
    }

    /// Free a document's region, merging it with adjacent free space and
    /// truncating storage if the free region reaches the end.
    ///
    /// # Panics
    ///
    /// Panics if `fiid` is unknown or already deleted.
    pub fn delete_document(&mut self, fiid: Fiid) {
        let TocEntry { offset, length, .. } = *self.entry(fiid);
        let new_end = self.gaps.release(offset, length, self.tokens.len());
        self.tokens.truncate(new_end);
        self.toc[fiid as usize].deleted = true;
    }

    /// Tokens `[start, end)` of a document. `None` stands for the document
    /// start or end; an end past the document is clamped to its length.
    ///
    /// # Panics
    ///
    /// Panics if `fiid` is unknown or deleted.
    pub fn retrieve(&self, fiid: Fiid, start: Option<usize>, end: Option<usize>) -> Result<&[TermId]> {
        let entry = self.entry(fiid);
        let doc = &self.tokens[entry.offset..entry.offset + entry.length];
        if start.is_none() && end.is_none() {
            return Ok(doc);
        }
        let start = start.unwrap_or(0);
        let end = end.map_or(entry.length, |e| e.min(entry.length));
        if end <= start {
            return Err(LexisError::invalid_argument(format!(
                "empty or inverted range [{start}, {end}) for document {fiid} of length {}",
                entry.length
            )));
        }
        Ok(&doc[start..end])
    }

    /// # Panics
    ///
    /// Panics if `fiid` is unknown or deleted.
    pub fn doc_length(&self, fiid: Fiid) -> usize {
        self.entry(fiid).length
    }

    /// # Panics
    ///
    /// Panics if `fiid` was never allocated.
    pub fn is_deleted(&self, fiid: Fiid) -> bool {
        match self.toc.get(fiid as usize) {
            Some(entry) => entry.deleted,
            None => panic!("forward index document {fiid} does not exist"),
        }
    }

    /// Drop every document and gap. The next addition starts at offset 0
    /// and receives fiid 0.
    pub fn clear(&mut self) {
        self.toc.clear();
        self.tokens.clear();
        self.gaps.clear();
    }

    /// Number of fiids handed out, deleted ones included.
    pub fn num_fiids(&self) -> usize {
        self.toc.len()
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> usize {
        self.toc.iter().filter(|e| !e.deleted).count()
    }

    pub fn live_fiids(&self) -> impl Iterator<Item = Fiid> + '_ {
        self.toc
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.deleted)
            .map(|(fiid, _)| fiid as Fiid)
    }

    /// Free tokens inside storage.
    pub fn free_space(&self) -> usize {
        self.gaps.free_space()
    }

    pub fn free_blocks(&self) -> usize {
        self.gaps.len()
    }

    /// Size of the token storage, free gaps included.
    pub fn total_size(&self) -> usize {
        self.tokens.len()
    }

    pub fn gaps(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.gaps.iter()
    }

    /// Location of a fiid in storage, deleted entries included.
    pub fn toc_entry(&self, fiid: Fiid) -> Option<TocEntry> {
        self.toc.get(fiid as usize).copied()
    }

    /// Verify that live documents and gaps tile storage exactly and that the
    /// gap list is well formed.
    pub fn check_consistency(&self) -> Result<()> {
        self.gaps
            .check(self.tokens.len())
            .map_err(LexisError::index)?;

        if let Some(entry) = self
            .toc
            .iter()
            .find(|e| !e.deleted && e.offset + e.length > self.tokens.len())
        {
            return Err(LexisError::index(format!(
                "document at {} of length {} lies outside storage of {} tokens",
                entry.offset,
                entry.length,
                self.tokens.len()
            )));
        }

        let mut regions: Vec<(usize, usize)> = self
            .toc
            .iter()
            .filter(|e| !e.deleted && e.length > 0)
            .map(|e| (e.offset, e.length))
            .chain(self.gaps.iter())
            .collect();
        regions.sort_unstable();
        let mut pos = 0;
        for (offset, length) in regions {
            if offset != pos {
                return Err(LexisError::index(format!(
                    "storage region at {offset} does not follow previous region ending at {pos}"
                )));
            }
            pos = offset + length;
        }
        if pos != self.tokens.len() {
            return Err(LexisError::index(format!(
                "documents and gaps cover {pos} tokens, storage holds {}",
                self.tokens.len()
            )));
        }
        Ok(())
    }

    /// Serialize the store. Layout (little endian): magic, version, TOC
    /// count, TOC entries (offset u64, length u32, deleted u8), gap count,
    /// gaps (offset u64, length u64), token count u64, tokens u32.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(self.toc.len() as u32)?;
        for entry in &self.toc {
            writer.write_u64::<LittleEndian>(entry.offset as u64)?;
            writer.write_u32::<LittleEndian>(entry.length as u32)?;
            writer.write_u8(entry.deleted as u8)?;
        }
        writer.write_u32::<LittleEndian>(self.gaps.len() as u32)?;
        for (offset, length) in self.gaps.iter() {
            writer.write_u64::<LittleEndian>(offset as u64)?;
            writer.write_u64::<LittleEndian>(length as u64)?;
        }
        writer.write_u64::<LittleEndian>(self.tokens.len() as u64)?;
        for &token in &self.tokens {
            writer.write_u32::<LittleEndian>(token)?;
        }
        Ok(())
    }

    /// Load a store written by [`write_to`](Self::write_to). Structural
    /// damage is reported as [`LexisError::Index`].
    pub fn read_from<R: Read>(reader: &mut R, config: ForwardIndexConfig) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(LexisError::index("not a forward index file"));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(LexisError::index(format!(
                "unsupported forward index version {version}"
            )));
        }

        let toc_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut toc = Vec::with_capacity(toc_len.min(PREALLOCATE_LIMIT));
        for _ in 0..toc_len {
            let offset = reader.read_u64::<LittleEndian>()? as usize;
            let length = reader.read_u32::<LittleEndian>()? as usize;
            let deleted = match reader.read_u8()? {
                0 => false,
                1 => true,
                other => {
                    return Err(LexisError::index(format!("bad deleted flag {other}")));
                }
            };
            toc.push(TocEntry {
                offset,
                length,
                deleted,
            });
        }

        let gap_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut gaps = Vec::with_capacity(gap_len.min(PREALLOCATE_LIMIT));
        for _ in 0..gap_len {
            let offset = reader.read_u64::<LittleEndian>()? as usize;
            let length = reader.read_u64::<LittleEndian>()? as usize;
            gaps.push((offset, length));
        }

        // Live documents and gaps tile storage exactly, so their total
        // must equal the token count announced next.
        let covered = toc
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| e.length)
            .chain(gaps.iter().map(|&(_, length)| length))
            .try_fold(0usize, usize::checked_add)
            .ok_or_else(|| LexisError::index("document and gap lengths overflow"))?;
        let token_len = reader.read_u64::<LittleEndian>()?;
        if token_len != covered as u64 {
            return Err(LexisError::index(format!(
                "header announces {token_len} tokens, documents and gaps cover {covered}"
            )));
        }
        let tokens = read_tokens(reader, covered)?;

        let store = ForwardIndexStore {
            config,
            toc,
            tokens,
            gaps: FreeGapList::from_gaps(gaps),
        };
        store.check_consistency()?;
        Ok(store)
    }
}

/// Read exactly `count` little-endian token ids. The buffer grows with the
/// bytes actually present, so a bogus count fails instead of allocating.
fn read_tokens<R: Read>(reader: &mut R, count: usize) -> Result<Vec<TermId>> {
    let bytes = count
        .checked_mul(size_of::<TermId>())
        .ok_or_else(|| LexisError::index(format!("token count {count} is out of range")))?;
    let mut buf = Vec::new();
    reader.take(bytes as u64).read_to_end(&mut buf)?;
    if buf.len() != bytes {
        return Err(LexisError::index(format!(
            "token data truncated: expected {bytes} bytes, found {}",
            buf.len()
        )));
    }
    let mut tokens = vec![0; count];
    LittleEndian::read_u32_into(&buf, &mut tokens);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(len: usize, fill: u32) -> Vec<u32> {
        vec![fill; len]
    }

    #[test]
    fn test_add_and_retrieve() {
        let mut store = ForwardIndexStore::new();
        let a = store.add_document(&[1, 2, 3, 4]);
        let b = store.add_document(&[]);
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.retrieve(a, None, None).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(store.retrieve(a, Some(1), Some(3)).unwrap(), &[2, 3]);
        assert_eq!(store.retrieve(a, Some(2), Some(100)).unwrap(), &[3, 4]);
        assert!(store.retrieve(b, None, None).unwrap().is_empty());
        assert!(store.retrieve(a, Some(3), Some(3)).is_err());
        assert!(store.retrieve(a, Some(5), None).is_err());
        assert_eq!(store.doc_length(a), 4);
        assert_eq!(store.doc_length(b), 0);
    }

    #[test]
    fn test_exact_gap_reused() {
        let mut store = ForwardIndexStore::new();
        let a = store.add_document(&doc(5, 1));
        store.add_document(&doc(3, 2));
        store.delete_document(a);
        assert_eq!(store.free_space(), 5);
        let c = store.add_document(&doc(5, 3));
        assert_eq!(store.toc_entry(c).unwrap().offset, 0);
        assert_eq!(store.free_blocks(), 0);
        assert_eq!(store.total_size(), 8);
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_zero_length_document_delete() {
        let mut store = ForwardIndexStore::new();
        store.add_document(&doc(4, 1));
        let empty = store.add_document(&[]);
        store.delete_document(empty);
        assert!(store.is_deleted(empty));
        assert_eq!(store.total_size(), 4);
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_clear_restarts_at_zero() {
        let mut store = ForwardIndexStore::new();
        store.add_document(&doc(4, 1));
        store.add_document(&doc(4, 2));
        store.clear();
        let fiid = store.add_document(&doc(2, 3));
        assert_eq!(fiid, 0);
        assert_eq!(store.toc_entry(fiid).unwrap().offset, 0);
        assert_eq!(store.total_size(), 2);
    }

    #[test]
    #[should_panic(expected = "has been deleted")]
    fn test_delete_twice_panics() {
        let mut store = ForwardIndexStore::new();
        let a = store.add_document(&doc(2, 1));
        store.add_document(&doc(2, 1));
        store.delete_document(a);
        store.delete_document(a);
    }

    #[test]
    #[should_panic(expected = "has been deleted")]
    fn test_retrieve_deleted_panics() {
        let mut store = ForwardIndexStore::new();
        let a = store.add_document(&doc(2, 1));
        store.delete_document(a);
        let _ = store.retrieve(a, None, None);
    }

    #[test]
    fn test_write_read() {
        let mut store = ForwardIndexStore::new();
        for len in [3, 4, 5, 6] {
            store.add_document(&doc(len, len as u32));
        }
        store.delete_document(1);
        let mut buf = Vec::new();
        store.write_to(&mut buf).unwrap();

        let loaded = ForwardIndexStore::read_from(&mut buf.as_slice(), ForwardIndexConfig::default()).unwrap();
        assert!(loaded.is_deleted(1));
        assert_eq!(loaded.retrieve(3, None, None).unwrap(), &[6; 6]);
        assert_eq!(loaded.gaps().collect::<Vec<_>>(), vec![(3, 4)]);
    }

    #[test]
    fn test_read_rejects_corruption() {
        let mut store = ForwardIndexStore::new();
        store.add_document(&doc(3, 1));
        let mut buf = Vec::new();
        store.write_to(&mut buf).unwrap();

        let mut bad_magic = buf.clone();
        bad_magic[0] = b'X';
        assert!(ForwardIndexStore::read_from(&mut bad_magic.as_slice(), ForwardIndexConfig::default()).is_err());

        // Shift the only document's offset so it no longer starts at 0.
        let mut bad_offset = buf.clone();
        bad_offset[12] = 1;
        let err = ForwardIndexStore::read_from(&mut bad_offset.as_slice(), ForwardIndexConfig::default())
            .unwrap_err();
        assert!(matches!(err, LexisError::Index(_)));

        let truncated = &buf[..buf.len() - 2];
        assert!(ForwardIndexStore::read_from(&mut &truncated[..], ForwardIndexConfig::default()).is_err());
    }

    fn header(toc: &[(u64, u32, u8)], token_len: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<LittleEndian>(FORMAT_VERSION).unwrap();
        buf.write_u32::<LittleEndian>(toc.len() as u32).unwrap();
        for &(offset, length, deleted) in toc {
            buf.write_u64::<LittleEndian>(offset).unwrap();
            buf.write_u32::<LittleEndian>(length).unwrap();
            buf.write_u8(deleted).unwrap();
        }
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_u64::<LittleEndian>(token_len).unwrap();
        buf
    }

    #[test]
    fn test_read_rejects_huge_token_count() {
        let buf = header(&[], 1 << 62);
        let err = ForwardIndexStore::read_from(&mut buf.as_slice(), ForwardIndexConfig::default()).unwrap_err();
        assert!(matches!(err, LexisError::Index(_)));
    }

    #[test]
    fn test_read_rejects_missing_token_data() {
        // One live document claims u32::MAX tokens, but none follow.
        let buf = header(&[(0, u32::MAX, 0)], u32::MAX as u64);
        let err = ForwardIndexStore::read_from(&mut buf.as_slice(), ForwardIndexConfig::default()).unwrap_err();
        assert!(matches!(err, LexisError::Index(_)));
    }

    #[test]
    fn test_read_rejects_huge_toc_count() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.write_u32::<LittleEndian>(FORMAT_VERSION).unwrap();
        buf.write_u32::<LittleEndian>(u32::MAX).unwrap();
        assert!(ForwardIndexStore::read_from(&mut buf.as_slice(), ForwardIndexConfig::default()).is_err());
    }
}

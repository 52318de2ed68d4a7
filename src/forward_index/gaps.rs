//! Free-space bookkeeping for the forward index store.

use std::collections::{BTreeMap, BTreeSet};

/// Free regions of token storage, kept in offset order.
///
/// No two gaps are ever adjacent: releasing a region merges it with free
/// neighbours on both sides. A region that ends at the storage end is never
/// recorded; the caller truncates storage instead.
///
/// Allocation picks, in order:
/// 1. the exact-size gap with the lowest offset,
/// 2. the first gap (by offset) larger than the request, split in two,
/// 3. nothing, in which case the caller appends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeGapList {
    by_offset: BTreeMap<usize, usize>,
    /// (length, offset), for exact-fit lookups.
    by_length: BTreeSet<(usize, usize)>,
}

impl FreeGapList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }

    /// Total number of free tokens.
    pub fn free_space(&self) -> usize {
        self.by_offset.values().sum()
    }

    /// Gaps as (offset, length) in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.by_offset.iter().map(|(&o, &l)| (o, l))
    }

    pub fn clear(&mut self) {
        self.by_offset.clear();
        self.by_length.clear();
    }

    fn insert(&mut self, offset: usize, length: usize) {
        self.by_offset.insert(offset, length);
        self.by_length.insert((length, offset));
    }

    fn remove(&mut self, offset: usize, length: usize) {
        self.by_offset.remove(&offset);
        self.by_length.remove(&(length, offset));
    }

    /// Take `length` tokens out of a free gap and return their offset.
    pub fn allocate(&mut self, length: usize) -> Option<usize> {
        if length == 0 {
            return None;
        }
        if let Some(&(_, offset)) = self.by_length.range((length, 0)..=(length, usize::MAX)).next() {
            self.remove(offset, length);
            log::debug!("reusing exact gap of {length} tokens at {offset}");
            return Some(offset);
        }
        let (offset, gap_len) = self
            .by_offset
            .iter()
            .map(|(&o, &l)| (o, l))
            .find(|&(_, l)| l > length)?;
        self.remove(offset, gap_len);
        self.insert(offset + length, gap_len - length);
        log::debug!(
            "splitting gap of {gap_len} tokens at {offset}, {} tokens left free",
            gap_len - length
        );
        Some(offset)
    }

    /// Return `[offset, offset + length)` to the free list and give back the
    /// new storage end, which is lower than `storage_end` when the merged
    /// region reached it.
    ///
    /// # Panics
    ///
    /// Panics if the region overlaps a gap already on the list or extends
    /// past `storage_end`.
    pub fn release(&mut self, offset: usize, length: usize, storage_end: usize) -> usize {
        if length == 0 {
            return storage_end;
        }
        let end = offset + length;
        assert!(
            end <= storage_end,
            "freed region [{offset}, {end}) extends past storage end {storage_end}"
        );

        let mut start = offset;
        let mut stop = end;

        if let Some((&prev_off, &prev_len)) = self.by_offset.range(..offset).next_back() {
            let prev_end = prev_off + prev_len;
            assert!(
                prev_end <= offset,
                "freed region [{offset}, {end}) overlaps gap [{prev_off}, {prev_end})"
            );
            if prev_end == offset {
                self.remove(prev_off, prev_len);
                start = prev_off;
            }
        }
        if let Some((&next_off, &next_len)) = self.by_offset.range(offset..).next() {
            assert!(
                next_off >= end,
                "freed region [{offset}, {end}) overlaps gap [{next_off}, {})",
                next_off + next_len
            );
            if next_off == end {
                self.remove(next_off, next_len);
                stop = next_off + next_len;
            }
        }

        if stop == storage_end {
            log::debug!("truncating storage from {storage_end} to {start}");
            return start;
        }
        self.insert(start, stop - start);
        storage_end
    }

    /// Check the no-adjacent-gaps and no-trailing-gap invariants against a
    /// storage of `storage_end` tokens.
    pub fn check(&self, storage_end: usize) -> Result<(), String> {
        let mut last_end: Option<usize> = None;
        for (offset, length) in self.iter() {
            if length == 0 {
                return Err(format!("empty gap at {offset}"));
            }
            if let Some(prev) = last_end {
                if prev >= offset {
                    return Err(format!("gap at {offset} touches or overlaps previous gap"));
                }
            }
            last_end = Some(offset + length);
        }
        match last_end {
            Some(end) if end > storage_end => Err(format!("gap ends at {end}, past storage end {storage_end}")),
            Some(end) if end == storage_end => Err(format!("trailing gap ending at {end} was not truncated")),
            _ => Ok(()),
        }
    }

    /// Rebuild from gaps already known to be valid, in any order.
    pub(crate) fn from_gaps(gaps: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut list = FreeGapList::new();
        for (offset, length) in gaps {
            list.insert(offset, length);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fit_prefers_lowest_offset() {
        let mut gaps = FreeGapList::from_gaps([(0, 4), (10, 8), (30, 4)]);
        assert_eq!(gaps.allocate(4), Some(0));
        assert_eq!(gaps.allocate(4), Some(30));
        assert_eq!(gaps.allocate(4), Some(10));
        assert_eq!(gaps.iter().collect::<Vec<_>>(), vec![(14, 4)]);
    }

    #[test]
    fn test_first_fit_splits() {
        let mut gaps = FreeGapList::from_gaps([(0, 3), (10, 8), (30, 20)]);
        assert_eq!(gaps.allocate(5), Some(10));
        assert_eq!(gaps.iter().collect::<Vec<_>>(), vec![(0, 3), (15, 3), (30, 20)]);
        assert_eq!(gaps.allocate(50), None);
        assert_eq!(gaps.allocate(0), None);
    }

    #[test]
    fn test_release_merges_both_sides() {
        let mut gaps = FreeGapList::new();
        assert_eq!(gaps.release(0, 10, 100), 100);
        assert_eq!(gaps.release(20, 10, 100), 100);
        assert_eq!(gaps.release(10, 10, 100), 100);
        assert_eq!(gaps.iter().collect::<Vec<_>>(), vec![(0, 30)]);
        assert_eq!(gaps.free_space(), 30);
        gaps.check(100).unwrap();
    }

    #[test]
    fn test_release_truncates_at_end() {
        let mut gaps = FreeGapList::new();
        assert_eq!(gaps.release(40, 10, 100), 100);
        assert_eq!(gaps.release(50, 50, 100), 40);
        assert!(gaps.is_empty());
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn test_double_free_panics() {
        let mut gaps = FreeGapList::new();
        gaps.release(10, 5, 100);
        gaps.release(10, 5, 100);
    }

    #[test]
    fn test_check_detects_adjacent_gaps() {
        let gaps = FreeGapList::from_gaps([(0, 5), (5, 5)]);
        assert!(gaps.check(100).is_err());
        let gaps = FreeGapList::from_gaps([(90, 10)]);
        assert!(gaps.check(100).is_err());
    }
}

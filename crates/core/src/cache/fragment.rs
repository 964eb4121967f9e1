//! Fragment store: the byte ranges held by one cache entry.
//!
//! Fragments are kept sorted by offset and never overlap once an insertion
//! returns. Gaps between fragments are ranges the transport has not delivered
//! yet. Every buffer is reserved with `try_reserve_exact` before the list is
//! touched, so an allocation failure leaves the previous state intact.

use crate::Error;

/// One contiguous byte range `[offset, offset + len)` of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    offset: u64,
    data: Vec<u8>,
}

impl Fragment {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// First offset past this fragment.
    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// What an insertion did to the entry's coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentWrite {
    /// The set of covered bytes grew.
    Enlarged,
    /// Only bytes that were already present got rewritten.
    Overwritten,
}

/// Sorted, non-overlapping fragment sequence.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    list: Vec<Fragment>,
}

impl Fragments {
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Sum of fragment lengths.
    pub fn total_len(&self) -> u64 {
        self.list.iter().map(Fragment::len).sum()
    }

    /// Insert `data` at `offset`, merging every fragment it overlaps or touches.
    ///
    /// On overlap the new bytes win. A zero-length write changes nothing.
    pub fn insert(&mut self, offset: u64, data: &[u8]) -> Result<FragmentWrite, Error> {
        if data.is_empty() {
            return Ok(FragmentWrite::Overwritten);
        }

        let length = data.len() as u64;
        let end = offset.checked_add(length).ok_or(Error::RangeOverflow { offset, length })?;

        // Fragments are sorted and disjoint, so both offsets and ends ascend.
        let first = self.list.partition_point(|f| f.end() < offset);
        let last = first + self.list[first..].partition_point(|f| f.offset <= end);

        if first == last {
            let mut buf = Vec::new();
            buf.try_reserve_exact(data.len())?;
            buf.extend_from_slice(data);
            self.list.try_reserve(1)?;
            self.list.insert(first, Fragment { offset, data: buf });
            return Ok(FragmentWrite::Enlarged);
        }

        let start = offset.min(self.list[first].offset);
        let merged_end = end.max(self.list[last - 1].end());
        let span = usize::try_from(merged_end - start)
            .map_err(|_| Error::RangeOverflow { offset: start, length: merged_end - start })?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(span)?;
        buf.resize(span, 0);

        let mut previous = 0u64;
        for f in &self.list[first..last] {
            let at = (f.offset - start) as usize;
            buf[at..at + f.data.len()].copy_from_slice(&f.data);
            previous += f.len();
        }
        let at = (offset - start) as usize;
        buf[at..at + data.len()].copy_from_slice(data);

        self.list.splice(first..last, std::iter::once(Fragment { offset: start, data: buf }));

        if span as u64 > previous { Ok(FragmentWrite::Enlarged) } else { Ok(FragmentWrite::Overwritten) }
    }

    /// Return the whole resource as one fragment if it is contiguous from offset 0.
    ///
    /// Several contiguous fragments are coalesced in place so later calls are O(1).
    /// Returns `None` on a gap, a missing prefix, an empty list, or if the
    /// coalesced buffer cannot be allocated.
    pub fn defragment(&mut self) -> Option<&Fragment> {
        let first = self.list.first()?;
        if first.offset != 0 {
            return None;
        }
        if self.list.len() == 1 {
            return self.list.first();
        }

        let mut covered = 0u64;
        for f in &self.list {
            if f.offset != covered {
                return None;
            }
            covered = f.end();
        }

        let total = usize::try_from(covered).ok()?;
        let mut buf = Vec::new();
        if buf.try_reserve_exact(total).is_err() {
            tracing::debug!(total, "defragmentation skipped: allocation failed");
            return None;
        }
        for f in &self.list {
            buf.extend_from_slice(&f.data);
        }

        tracing::debug!(fragments = self.list.len(), total, "coalesced fragments");
        self.list.clear();
        self.list.push(Fragment { offset: 0, data: buf });
        self.list.first()
    }

    /// Drop every byte at or beyond `length`. Returns whether anything was removed.
    pub fn truncate(&mut self, length: u64) -> bool {
        let before = self.list.len();
        self.list.retain(|f| f.offset < length);
        let mut changed = self.list.len() != before;

        if let Some(last) = self.list.last_mut()
            && last.end() > length
        {
            last.data.truncate((length - last.offset) as usize);
            changed = true;
        }
        changed
    }

    /// Drop every byte before `offset`. Returns whether anything was removed.
    pub fn free_to(&mut self, offset: u64) -> bool {
        let before = self.list.len();
        self.list.retain(|f| f.end() > offset);
        let mut changed = self.list.len() != before;

        if let Some(first) = self.list.first_mut()
            && first.offset < offset
        {
            first.data.drain(..(offset - first.offset) as usize);
            first.offset = offset;
            changed = true;
        }
        changed
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    #[cfg(test)]
    pub(crate) fn push_unmerged(&mut self, offset: u64, data: &[u8]) {
        self.list.push(Fragment { offset, data: data.to_vec() });
        self.list.sort_by_key(|f| f.offset);
    }
}

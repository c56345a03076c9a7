//! Physically promoted struct locals.
//!
//! An [`AggregateInfo`] describes one struct local that an earlier phase
//! split into independent scalar replacements. Bytes of the struct that no
//! replacement covers form the *remainder*, described by a [`SegmentList`].
//! This module only reads the promotion plan; it never changes it.

use rustc_hash::FxHashMap;

use crate::ir::{LocalId, ScalarType};

/// One scalar field carved out of a promoted struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Replacement {
    /// Byte offset within the struct.
    pub offset: u32,
    pub ty: ScalarType,
    /// The new local holding the field's value.
    pub local: LocalId,
}

impl Replacement {
    pub fn new(offset: u32, ty: ScalarType, local: LocalId) -> Self {
        Self { offset, ty, local }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.ty.size()
    }

    /// First byte past the field.
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.size()
    }

    /// Does `[offset, offset + size)` share at least one byte with this field?
    pub fn overlaps(&self, offset: u32, size: u32) -> bool {
        if self.offset < offset {
            self.end() > offset
        } else {
            offset + size > self.offset
        }
    }

    /// Does `[offset, offset + size)` contain the whole field?
    #[inline]
    pub fn is_covered_by(&self, offset: u32, size: u32) -> bool {
        offset <= self.offset && offset + size >= self.end()
    }
}

/// Half-open byte range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub start: u32,
    pub end: u32,
}

impl Segment {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "segment [{start}, {end}) is inverted");
        Self { start, end }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// Sorted, coalesced list of disjoint byte segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentList {
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a segment, merging it with any segments it touches.
    pub fn add(&mut self, segment: Segment) {
        if segment.is_empty() {
            return;
        }

        // First segment that ends at or after the new one starts; everything
        // before it is strictly to the left.
        let first = self.segments.partition_point(|s| s.end < segment.start);
        let mut merged = segment;
        let mut last = first;
        while last < self.segments.len() && self.segments[last].start <= merged.end {
            merged.start = merged.start.min(self.segments[last].start);
            merged.end = merged.end.max(self.segments[last].end);
            last += 1;
        }
        self.segments.splice(first..last, std::iter::once(merged));
    }

    /// Does `segment` share at least one byte with the list?
    pub fn intersects(&self, segment: Segment) -> bool {
        if segment.is_empty() {
            return false;
        }
        let idx = self.segments.partition_point(|s| s.end <= segment.start);
        self.segments.get(idx).is_some_and(|s| s.start < segment.end)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Lowest covered byte, if any.
    pub fn min(&self) -> Option<u32> {
        self.segments.first().map(|s| s.start)
    }

    /// One past the highest covered byte, if any.
    pub fn max(&self) -> Option<u32> {
        self.segments.last().map(|s| s.end)
    }
}

/// A struct local selected for physical promotion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateInfo {
    /// The original struct local; its remainder keeps living here.
    pub local: LocalId,
    /// Replacements sorted by offset, non-overlapping.
    pub replacements: Vec<Replacement>,
    /// Bytes not covered by any replacement.
    pub unpromoted: SegmentList,
    /// Cached `unpromoted.min()`; 0 when there is no remainder.
    pub unpromoted_min: u32,
    /// Cached `unpromoted.max()`; 0 when there is no remainder.
    pub unpromoted_max: u32,
}

impl AggregateInfo {
    /// Wrap a finished promotion plan.
    ///
    /// # Panics
    ///
    /// If replacement offsets are not strictly increasing or two
    /// replacements overlap.
    pub fn new(local: LocalId, replacements: Vec<Replacement>, unpromoted: SegmentList) -> Self {
        for pair in replacements.windows(2) {
            assert!(
                pair[0].end() <= pair[1].offset,
                "replacements of {local} are unsorted or overlap: [{}..{}) then [{}..{})",
                pair[0].offset,
                pair[0].end(),
                pair[1].offset,
                pair[1].end()
            );
        }

        let unpromoted_min = unpromoted.min().unwrap_or(0);
        let unpromoted_max = unpromoted.max().unwrap_or(0);
        Self {
            local,
            replacements,
            unpromoted,
            unpromoted_min,
            unpromoted_max,
        }
    }

    /// Build an aggregate for a struct of `size` bytes, treating every byte
    /// not covered by a replacement as remainder.
    pub fn from_layout(local: LocalId, size: u32, replacements: Vec<Replacement>) -> Self {
        let mut unpromoted = SegmentList::new();
        let mut cursor = 0;
        for rep in &replacements {
            if rep.offset > cursor {
                unpromoted.add(Segment::new(cursor, rep.offset));
            }
            cursor = cursor.max(rep.end());
        }
        if size > cursor {
            unpromoted.add(Segment::new(cursor, size));
        }
        Self::new(local, replacements, unpromoted)
    }

    /// Does the struct have any unpromoted bytes?
    #[inline]
    pub fn has_remainder(&self) -> bool {
        self.unpromoted_max > self.unpromoted_min
    }

    /// Binary search the replacements by offset.
    ///
    /// `Ok(i)` if replacement `i` starts exactly at `offset`, otherwise
    /// `Err(i)` with the insertion point.
    pub fn binary_search(&self, offset: u32) -> Result<usize, usize> {
        self.replacements.binary_search_by_key(&offset, |rep| rep.offset)
    }

    /// Index of the first replacement that could overlap
    /// `[offset, offset + size)`.
    ///
    /// Callers scan forward from here while replacement offsets are below
    /// `offset + size`.
    pub fn first_overlapping(&self, offset: u32, size: u32) -> usize {
        match self.binary_search(offset) {
            Ok(index) => index,
            Err(index) => {
                if index > 0 && self.replacements[index - 1].overlaps(offset, size) {
                    index - 1
                } else {
                    index
                }
            }
        }
    }

    /// Does a store to `[offset, offset + size)` overwrite the whole remainder?
    #[inline]
    pub fn remainder_covered_by(&self, offset: u32, size: u32) -> bool {
        self.unpromoted_min >= offset && self.unpromoted_max <= offset + size
    }

    /// Does `[offset, offset + size)` touch any unpromoted byte?
    #[inline]
    pub fn remainder_intersects(&self, offset: u32, size: u32) -> bool {
        self.unpromoted.intersects(Segment::new(offset, offset + size))
    }
}

/// The ordered aggregate list with lookup by struct local.
#[derive(Clone, Debug, Default)]
pub struct Aggregates {
    list: Vec<AggregateInfo>,
    by_local: FxHashMap<LocalId, usize>,
}

impl Aggregates {
    /// # Panics
    ///
    /// If two aggregates share a struct local.
    pub fn new(list: Vec<AggregateInfo>) -> Self {
        let mut by_local = FxHashMap::default();
        for (idx, agg) in list.iter().enumerate() {
            let previous = by_local.insert(agg.local, idx);
            assert!(previous.is_none(), "{} promoted twice", agg.local);
        }
        Self { list, by_local }
    }

    pub fn lookup(&self, local: LocalId) -> Option<&AggregateInfo> {
        self.by_local.get(&local).map(|&idx| &self.list[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AggregateInfo> {
        self.list.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl<'a> IntoIterator for &'a Aggregates {
    type Item = &'a AggregateInfo;
    type IntoIter = std::slice::Iter<'a, AggregateInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.list.iter()
    }
}

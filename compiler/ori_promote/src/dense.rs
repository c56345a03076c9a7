//! Dense index space for promoted remainders and fields.
//!
//! Each aggregate gets a contiguous block of `1 + replacements.len()`
//! indices: the block's first index is the remainder, the following ones
//! are the replacements in offset order. The space is private to this
//! analysis; it never consumes the compiler's tracked-variable slots.

use bitvec::vec::BitVec;
use rustc_hash::FxHashMap;

use crate::aggregate::Aggregates;
use crate::ir::LocalId;

/// Fixed-width set of dense indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarSet {
    bits: BitVec,
}

impl VarSet {
    /// Empty set over `len` indices.
    pub fn new(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Width of the index space (not the number of members).
    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// `true` if the set has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.bits.get(index).is_some_and(|bit| *bit)
    }

    #[inline]
    pub fn insert(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    #[inline]
    pub fn remove(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Members in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// `self ∪= other`.
    pub fn union_with(&mut self, other: &VarSet) {
        debug_assert_eq!(self.len(), other.len(), "var set width mismatch");
        self.bits |= other.bits.as_bitslice();
    }

    /// Overwrite `self` with `other`, reusing the allocation.
    pub fn assign(&mut self, other: &VarSet) {
        self.bits.clone_from(&other.bits);
    }

    /// `self = uses ∪ (live_out - defs)`.
    pub fn assign_liveness(&mut self, defs: &VarSet, uses: &VarSet, live_out: &VarSet) {
        self.bits.clone_from(&defs.bits);
        self.bits = !std::mem::take(&mut self.bits);
        self.bits &= live_out.bits.as_bitslice();
        self.bits |= uses.bits.as_bitslice();
    }

    /// Every member of `other` is a member of `self`.
    pub fn is_superset(&self, other: &VarSet) -> bool {
        other.iter().all(|index| self.contains(index))
    }
}

/// Dense index block of one aggregate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct IndexBlock {
    /// Index of the remainder; fields follow.
    base: usize,
    num_fields: usize,
}

/// Aggregate local → its block of dense indices.
#[derive(Clone, Debug, Default)]
pub struct DenseIndexMap {
    blocks: FxHashMap<LocalId, IndexBlock>,
    num_vars: usize,
}

impl DenseIndexMap {
    /// Assign consecutive index blocks in aggregate-list order.
    pub fn build(aggregates: &Aggregates) -> Self {
        let mut blocks = FxHashMap::default();
        let mut next = 0;
        for agg in aggregates {
            let num_fields = agg.replacements.len();
            let block = IndexBlock {
                base: next,
                num_fields,
            };
            blocks.insert(agg.local, block);
            // Remainder, then one per field.
            next += 1 + num_fields;
        }
        Self {
            blocks,
            num_vars: next,
        }
    }

    /// Total number of tracked remainders and fields.
    #[inline]
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Base index of `local`'s block (its remainder), if promoted.
    #[inline]
    pub fn base(&self, local: LocalId) -> Option<usize> {
        self.blocks.get(&local).map(|block| block.base)
    }

    /// Dense index of replacement `field` of `local`.
    ///
    /// # Panics
    ///
    /// If `local` is not a promoted aggregate, or has no field `field`.
    pub fn field_index(&self, local: LocalId, field: usize) -> usize {
        let Some(block) = self.blocks.get(&local) else {
            panic!("{local} is not a promoted aggregate");
        };
        assert!(
            field < block.num_fields,
            "{local} has no replacement {field}"
        );
        block.base + 1 + field
    }

    /// Fresh empty set over the whole index space.
    pub fn empty_set(&self) -> VarSet {
        VarSet::new(self.num_vars)
    }
}

//! Query object for the deaths recorded at a composite access.

use crate::aggregate::AggregateInfo;
use crate::dense::VarSet;

/// Which sub-parts of a promoted struct die at one composite access.
///
/// Obtained from [`PromotionLiveness::deaths_for_struct_local`].
///
/// [`PromotionLiveness::deaths_for_struct_local`]: crate::PromotionLiveness::deaths_for_struct_local
#[derive(Clone, Copy, Debug)]
pub struct StructDeaths<'a> {
    deaths: &'a VarSet,
    aggregate: &'a AggregateInfo,
}

impl<'a> StructDeaths<'a> {
    pub(crate) fn new(deaths: &'a VarSet, aggregate: &'a AggregateInfo) -> Self {
        debug_assert_eq!(deaths.len(), 1 + aggregate.replacements.len());
        Self { deaths, aggregate }
    }

    /// Is the remainder dying here?
    ///
    /// Vacuously `true` when the struct has no unpromoted bytes.
    pub fn is_remainder_dying(&self) -> bool {
        if !self.aggregate.has_remainder() {
            return true;
        }
        self.deaths.contains(0)
    }

    /// Is replacement `index` dying here?
    ///
    /// # Panics
    ///
    /// If `index` is not a replacement of the struct.
    pub fn is_replacement_dying(&self, index: usize) -> bool {
        assert!(
            index < self.aggregate.replacements.len(),
            "{} has no replacement {index}",
            self.aggregate.local
        );
        self.deaths.contains(1 + index)
    }
}

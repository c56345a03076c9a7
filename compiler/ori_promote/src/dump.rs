//! Human-readable rendering of dense var sets for trace logs.
//!
//! A remainder prints as `V03(remainder)`, a field as `V03.[008..012)`.
//! When a padding set is given, indices in it that are missing from the
//! rendered set print as blanks so consecutive dumps line up column-wise.

use std::fmt;

use crate::aggregate::Aggregates;
use crate::dense::{DenseIndexMap, VarSet};

/// Width of one rendered entry, used for blank padding.
const ENTRY_WIDTH: usize = 14;

/// `Display` adapter for a [`VarSet`].
pub struct VarSetDisplay<'a> {
    set: &'a VarSet,
    padding: Option<&'a VarSet>,
    aggregates: &'a Aggregates,
    index_map: &'a DenseIndexMap,
}

impl<'a> VarSetDisplay<'a> {
    pub fn new(set: &'a VarSet, aggregates: &'a Aggregates, index_map: &'a DenseIndexMap) -> Self {
        Self {
            set,
            padding: None,
            aggregates,
            index_map,
        }
    }

    /// Print blanks for indices in `all` that are not in the set.
    #[must_use]
    pub fn padded(mut self, all: &'a VarSet) -> Self {
        self.padding = Some(all);
        self
    }
}

impl fmt::Display for VarSetDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut sep = "";
        for agg in self.aggregates {
            let Some(base) = self.index_map.base(agg.local) else {
                continue;
            };
            for slot in 0..=agg.replacements.len() {
                let index = base + slot;
                if self.set.contains(index) {
                    if slot == 0 {
                        write!(f, "{sep}{}(remainder)", agg.local)?;
                    } else {
                        let rep = &agg.replacements[slot - 1];
                        let (local, start, end) = (agg.local, rep.offset, rep.end());
                        write!(f, "{sep}{local}.[{start:03}..{end:03})")?;
                    }
                    sep = " ";
                } else if self.padding.is_some_and(|all| all.contains(index)) {
                    write!(f, "{sep}{:width$}", "", width = ENTRY_WIDTH)?;
                    sep = " ";
                }
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests;

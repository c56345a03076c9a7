//! Liveness of physically promoted struct locals.
//!
//! When a struct local is physically promoted, each selected field becomes
//! an independent scalar local (a *replacement*) and the bytes no field
//! covers stay behind as the struct's *remainder*. This crate computes
//! precise liveness for those remainders and replacements so the rewrite
//! pass can avoid dead stores, dead copies, and unnecessary read-backs.
//!
//! # Pipeline
//!
//! [`PromotionLiveness::run`] executes three strictly ordered phases:
//!
//! 1. **Use/def summaries** ([`liveness`]) — one forward scan per block,
//!    classifying every appearance of a promoted local.
//! 2. **Fixpoint** ([`liveness`]) — backward dataflow over the CFG,
//!    including implicit flow into exception handlers.
//! 3. **Annotation** (`annotate`) — a backward walk per block that sets
//!    [`NodeFlags::DEATH`] on simple accesses and records per-sub-part
//!    deaths of composite accesses in a side table.
//!
//! # Design
//!
//! The analysis uses its own dense index space ([`DenseIndexMap`]): each
//! aggregate owns `1 + replacements` consecutive indices, remainder first.
//! Nothing is written into the compiler's regular per-block liveness, so
//! promoted fields never consume tracked-variable slots.
//!
//! While the results are in use, a `DEATH` flag on a field access means that
//! *field* dies, not the whole struct: an `int` read of `V16` at `+8` marked
//! as last use says nothing about the rest of `V16`.
//!
//! A store counts as a definition only if it overwrites a sub-part
//! completely. Partial stores are neither definitions nor uses, so they can
//! never make an earlier store to the same field look dead.
//!
//! # Crate Dependencies
//!
//! `ori_promote` only depends on the host IR view in [`ir`] and the
//! promotion plan in [`aggregate`]; deciding *what* to promote and the
//! rewrite itself live elsewhere.

pub mod aggregate;
mod annotate;
mod classify;
pub mod deaths;
pub mod dense;
pub mod dump;
pub mod graph;
pub mod ir;
pub mod liveness;

#[cfg(test)]
mod test_helpers;

pub use aggregate::{AggregateInfo, Aggregates, Replacement, Segment, SegmentList};
pub use deaths::StructDeaths;
pub use dense::{DenseIndexMap, VarSet};
pub use dump::VarSetDisplay;
pub use graph::DfsTree;
pub use ir::{
    AccessType, Block, BlockId, CallSite, Function, LocalId, LocalInfo, LocalNode, LocalNodeKind,
    NodeFlags, NodeId, ScalarType, Statement, StatementKind,
};
pub use liveness::BlockLiveness;

use annotate::DeathTable;

/// Promoted-struct liveness for one function.
///
/// Holds the per-block sets and the composite-access side table. Borrows
/// the aggregate list, which must not change while results are in use.
pub struct PromotionLiveness<'a> {
    aggregates: &'a Aggregates,
    index_map: DenseIndexMap,
    blocks: Vec<BlockLiveness>,
    deaths: DeathTable,
}

impl<'a> PromotionLiveness<'a> {
    /// Compute liveness for the promoted structs in `aggregates` and write
    /// death flags into `func`.
    pub fn run(func: &mut Function, aggregates: &'a Aggregates) -> Self {
        let index_map = DenseIndexMap::build(aggregates);

        if cfg!(debug_assertions) {
            // Let IR dumps show last-use flags of the struct (remainder) and
            // its fields.
            for agg in aggregates {
                func.locals[agg.local.index()].tracked_without_index = true;
                for rep in &agg.replacements {
                    func.locals[rep.local.index()].tracked_without_index = true;
                }
            }
        }

        tracing::debug!(
            aggregates = aggregates.len(),
            num_vars = index_map.num_vars(),
            "computing liveness for promoted remainders/fields"
        );

        let mut blocks = liveness::compute_use_def_sets(func, aggregates, &index_map);
        liveness::inter_block_liveness(func, aggregates, &index_map, &mut blocks);
        let deaths = annotate::fill_in_liveness(func, aggregates, &index_map, &blocks);

        Self {
            aggregates,
            index_map,
            blocks,
            deaths,
        }
    }

    /// Is replacement `index` of `struct_local` live at the start of `block`?
    pub fn is_replacement_live_in(
        &self,
        block: BlockId,
        struct_local: LocalId,
        index: usize,
    ) -> bool {
        let var = self.index_map.field_index(struct_local, index);
        self.blocks[block.index()].live_in.contains(var)
    }

    /// Is replacement `index` of `struct_local` live at the end of `block`?
    pub fn is_replacement_live_out(
        &self,
        block: BlockId,
        struct_local: LocalId,
        index: usize,
    ) -> bool {
        let var = self.index_map.field_index(struct_local, index);
        self.blocks[block.index()].live_out.contains(var)
    }

    /// Deaths of the remainder and fields at the composite access `node`.
    ///
    /// # Panics
    ///
    /// If `node` is not a struct-typed access (or a return-buffer
    /// definition) of a promoted struct, or was not annotated by this run.
    pub fn deaths_for_struct_local(&self, func: &Function, node: NodeId) -> StructDeaths<'_> {
        let lcl = func.node(node);
        assert!(
            lcl.ty.is_struct() || (lcl.is_addr() && lcl.is_def()),
            "{node:?} is not a struct access or return-buffer definition"
        );
        let Some(agg) = self.aggregates.lookup(lcl.local) else {
            panic!("{} of {node:?} is not a promoted struct", lcl.local);
        };
        let Some(deaths) = self.deaths.get(&node) else {
            panic!("{node:?} has no recorded deaths");
        };
        StructDeaths::new(deaths, agg)
    }

    /// Drop the side-table entry of a node the rewrite deleted or replaced.
    pub fn invalidate_node(&mut self, node: NodeId) {
        self.deaths.remove(&node);
    }

    /// The four liveness sets of `block`.
    pub fn block_liveness(&self, block: BlockId) -> &BlockLiveness {
        &self.blocks[block.index()]
    }

    pub fn index_map(&self) -> &DenseIndexMap {
        &self.index_map
    }

    /// Number of composite accesses with recorded deaths.
    pub fn num_struct_deaths(&self) -> usize {
        self.deaths.len()
    }
}

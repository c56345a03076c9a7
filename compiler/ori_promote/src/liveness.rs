//! Block-level liveness of promoted remainders and fields.
//!
//! Standard backward dataflow over the dense index space:
//!
//! 1. **Summaries** (forward scan per block): `var_use(B)` holds indices read
//!    before being fully defined in B, `var_def(B)` holds indices fully
//!    defined before being read. Partial definitions are neither.
//! 2. **Fixpoint** (postorder sweeps):
//!    - `live_out(B) = ∪ live_in(S)` over regular successors S.
//!    - `live_in(B) = var_use(B) ∪ (live_out(B) - var_def(B))`.
//!    - If B can throw, everything live into a reachable handler is added to
//!      both `live_in(B)` and `live_out(B)`.
//!
//! Sweeps repeat until no `live_in` changes. An acyclic graph needs exactly
//! one sweep, since postorder visits every successor first.
//!
//! Stores under a top-level conditional ([`Guarded`] statements) may not
//! execute and are left out of `var_def`; reads under them still count.
//!
//! [`Guarded`]: crate::ir::StatementKind::Guarded

use crate::aggregate::Aggregates;
use crate::classify::{classify, Access};
use crate::dense::{DenseIndexMap, VarSet};
use crate::dump::VarSetDisplay;
use crate::graph::DfsTree;
use crate::ir::{Block, Function};

/// Liveness sets of one basic block over the dense index space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockLiveness {
    /// Indices used before a full definition.
    pub var_use: VarSet,
    /// Indices fully defined before a use.
    ///
    /// Unlike regular liveness, partial definitions are not recorded here,
    /// and they are not uses either.
    pub var_def: VarSet,
    pub live_in: VarSet,
    pub live_out: VarSet,
}

impl BlockLiveness {
    fn new(index_map: &DenseIndexMap) -> Self {
        Self {
            var_use: index_map.empty_set(),
            var_def: index_map.empty_set(),
            live_in: index_map.empty_set(),
            live_out: index_map.empty_set(),
        }
    }
}

/// Record one touched index. A use after a full definition in the same
/// block is not a use of the incoming value.
fn mark_index(
    index: usize,
    is_use: bool,
    is_def: bool,
    var_use: &mut VarSet,
    var_def: &mut VarSet,
) {
    if is_use && !var_def.contains(index) {
        var_use.insert(index);
    }
    if is_def {
        var_def.insert(index);
    }
}

fn mark_use_def(access: &Access<'_>, var_use: &mut VarSet, var_def: &mut VarSet) {
    for &touch in &access.touches {
        mark_index(
            access.index(touch),
            touch.is_use,
            touch.is_full_def,
            var_use,
            var_def,
        );
    }
}

/// Compute `var_use`/`var_def` for every block; `live_in`/`live_out` start
/// empty.
pub(crate) fn compute_use_def_sets(
    func: &Function,
    aggregates: &Aggregates,
    index_map: &DenseIndexMap,
) -> Vec<BlockLiveness> {
    func.blocks
        .iter()
        .map(|block| {
            let mut info = BlockLiveness::new(index_map);
            for stmt in &block.statements {
                let guarded = stmt.is_guarded();
                for &node_id in &stmt.locals {
                    // Stores under a conditional may not execute.
                    if guarded && func.node(node_id).is_def() {
                        continue;
                    }
                    if let Some(access) =
                        classify(&func.nodes, stmt, node_id, aggregates, index_map)
                    {
                        mark_use_def(&access, &mut info.var_use, &mut info.var_def);
                    }
                }
            }

            tracing::trace!(
                block = block.id.raw(),
                uses = info.var_use.count(),
                defs = info.var_def.count(),
                "USE={} DEF={}",
                VarSetDisplay::new(&info.var_use, aggregates, index_map).padded(&info.var_def),
                VarSetDisplay::new(&info.var_def, aggregates, index_map).padded(&info.var_use),
            );

            info
        })
        .collect()
}

/// Union into `out` the `live_in` of every handler `block` can throw to.
pub(crate) fn add_handler_live_vars(block: &Block, blocks: &[BlockLiveness], out: &mut VarSet) {
    debug_assert!(block.has_potential_eh_succs());
    for handler in &block.eh_succs {
        out.union_with(&blocks[handler.index()].live_in);
    }
}

/// Iterative solver for `live_in`/`live_out`.
pub(crate) struct Solver<'f> {
    func: &'f Function,
    dfs: DfsTree,
    scratch_live_in: VarSet,
    scratch_live_out: VarSet,
    eh_live_vars: VarSet,
}

impl<'f> Solver<'f> {
    pub(crate) fn new(func: &'f Function, index_map: &DenseIndexMap) -> Self {
        Self {
            func,
            dfs: DfsTree::build(func),
            scratch_live_in: index_map.empty_set(),
            scratch_live_out: index_map.empty_set(),
            eh_live_vars: index_map.empty_set(),
        }
    }

    /// Sweep until no block's `live_in` changes (a single sweep when the
    /// graph is acyclic). Returns the number of sweeps.
    pub(crate) fn solve(&mut self, blocks: &mut [BlockLiveness]) -> u32 {
        let mut sweeps = 0u32;
        loop {
            sweeps += 1;
            let changed = self.sweep(blocks);
            if !changed || !self.dfs.has_cycle() {
                break;
            }
        }
        sweeps
    }

    /// One postorder pass over the reachable blocks. Returns `true` if any
    /// `live_in` changed.
    pub(crate) fn sweep(&mut self, blocks: &mut [BlockLiveness]) -> bool {
        let mut changed = false;
        for position in 0..self.dfs.postorder().len() {
            let block_idx = self.dfs.postorder()[position];
            changed |= self.per_block(block_idx, blocks);
        }
        changed
    }

    fn per_block(&mut self, block_idx: usize, blocks: &mut [BlockLiveness]) -> bool {
        let func = self.func;
        let block = &func.blocks[block_idx];

        self.scratch_live_out.clear();
        for succ in &block.succs {
            self.scratch_live_out.union_with(&blocks[succ.index()].live_in);
        }

        let info = &blocks[block_idx];
        self.scratch_live_in.assign_liveness(&info.var_def, &info.var_use, &self.scratch_live_out);

        if block.has_potential_eh_succs() {
            self.eh_live_vars.clear();
            add_handler_live_vars(block, blocks, &mut self.eh_live_vars);
            self.scratch_live_in.union_with(&self.eh_live_vars);
            self.scratch_live_out.union_with(&self.eh_live_vars);
        }

        let info = &mut blocks[block_idx];
        info.live_out.assign(&self.scratch_live_out);
        let live_in_changed = info.live_in != self.scratch_live_in;
        if live_in_changed {
            info.live_in.assign(&self.scratch_live_in);
        }
        live_in_changed
    }
}

/// Run the solver to its fixpoint and log the result.
pub(crate) fn inter_block_liveness(
    func: &Function,
    aggregates: &Aggregates,
    index_map: &DenseIndexMap,
    blocks: &mut [BlockLiveness],
) {
    let sweeps = Solver::new(func, index_map).solve(blocks);
    tracing::debug!(sweeps, "promoted liveness converged");

    if tracing::enabled!(tracing::Level::TRACE) {
        for (block, info) in func.blocks.iter().zip(blocks.iter()) {
            let mut all = info.live_in.clone();
            all.union_with(&info.live_out);
            tracing::trace!(
                block = block.id.raw(),
                live_in = info.live_in.count(),
                live_out = info.live_out.count(),
                "IN ={} OUT={}",
                VarSetDisplay::new(&info.live_in, aggregates, index_map).padded(&all),
                VarSetDisplay::new(&info.live_out, aggregates, index_map).padded(&all),
            );
        }
    }
}

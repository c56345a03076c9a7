//! Write promoted liveness back into the IR.
//!
//! Starting from each block's `live_out`, walk its statements and their
//! local appearances backwards with a running `life` set:
//!
//! - A sub-part that is not in `life` when an access reaches it is dying
//!   there. A read then makes it live; a full definition of a live sub-part
//!   removes it from `life`.
//! - Sub-parts live into a handler the block can throw to are *volatile*:
//!   a definition never removes them, since the handler may still observe
//!   the old value.
//!
//! Simple accesses (one field, or the raw remainder) record the result in
//! the node's [`NodeFlags::DEATH`] flag. Composite accesses can be the last
//! use of one field and a live use of another at the same time; their
//! deaths go to a side table keyed by [`NodeId`], one bit per sub-part with
//! bit 0 for the remainder and bit `1 + i` for field `i`.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::aggregate::Aggregates;
use crate::classify::{classify, Access, AccessShape};
use crate::dense::{DenseIndexMap, VarSet};
use crate::ir::{Function, NodeFlags, NodeId};
use crate::liveness::{add_handler_live_vars, BlockLiveness};

/// Per-node deaths of composite accesses, in aggregate-local indices.
pub(crate) type DeathTable = FxHashMap<NodeId, VarSet>;

/// Annotate every block and return the composite-access side table.
pub(crate) fn fill_in_liveness(
    func: &mut Function,
    aggregates: &Aggregates,
    index_map: &DenseIndexMap,
    blocks: &[BlockLiveness],
) -> DeathTable {
    let mut deaths = DeathTable::default();
    let mut life = index_map.empty_set();
    let mut volatile_vars = index_map.empty_set();

    let Function {
        blocks: ir_blocks,
        nodes,
        ..
    } = func;

    for (block, info) in ir_blocks.iter().zip(blocks) {
        if block.statements.is_empty() {
            continue;
        }

        volatile_vars.clear();
        if block.has_potential_eh_succs() {
            add_handler_live_vars(block, blocks, &mut volatile_vars);
        }

        life.assign(&info.live_out);

        for stmt in block.statements.iter().rev() {
            let guarded = stmt.is_guarded();
            for &node_id in stmt.locals.iter().rev() {
                // Stores under a conditional may not execute; they neither
                // kill nor get annotated.
                if guarded && nodes[node_id.index()].is_def() {
                    continue;
                }

                let Some(access) = classify(nodes, stmt, node_id, aggregates, index_map) else {
                    continue;
                };

                match access.shape {
                    AccessShape::Simple => {
                        let dying = !update_life(&access, &mut life, &volatile_vars).is_empty();
                        nodes[node_id.index()].flags.set(NodeFlags::DEATH, dying);
                    }
                    AccessShape::Composite => {
                        let mut agg_deaths = VarSet::new(1 + access.agg.replacements.len());
                        for slot in update_life(&access, &mut life, &volatile_vars) {
                            agg_deaths.insert(slot);
                        }
                        deaths.insert(node_id, agg_deaths);
                    }
                }
            }
        }
    }

    tracing::debug!(composite = deaths.len(), "promoted liveness annotated");
    deaths
}

/// Apply one access to `life`, index by index, and return the slots that
/// die at it.
fn update_life(
    access: &Access<'_>,
    life: &mut VarSet,
    volatile_vars: &VarSet,
) -> SmallVec<[usize; 8]> {
    let mut dying = SmallVec::new();
    for &touch in &access.touches {
        let index = access.index(touch);
        if life.contains(index) {
            if touch.is_full_def && !volatile_vars.contains(index) {
                life.remove(index);
            }
        } else {
            dying.push(touch.slot);
            if touch.is_use {
                life.insert(index);
            }
        }
    }
    dying
}

//! Use/def classification of a single local appearance.
//!
//! Both the per-block summary builder and the backward annotator need to
//! know, for one appearance of a promoted struct local, which remainder and
//! replacement indices it reads and which it *fully* overwrites. They must
//! agree exactly, so both consume the [`Access`] produced here instead of
//! re-deriving it.
//!
//! # Access shapes
//!
//! - **Whole struct** (`Var` of struct type): touches the remainder and every
//!   field; a store fully defines all of them.
//! - **Partial struct** (struct-typed `Field`, or a return-buffer `Addr`):
//!   touches every field overlapping the accessed range, plus the remainder.
//!   A store only counts as a definition of a field it covers completely,
//!   and of the remainder only if it covers `[unpromoted_min, unpromoted_max)`.
//!   Partial overlaps are neither uses nor definitions.
//! - **Exact field** (scalar access at a replacement's offset): that field.
//! - **Raw remainder** (scalar access at an offset with no replacement): the
//!   remainder only.
//!
//! The first two shapes are [`AccessShape::Composite`]: one node can kill
//! several sub-parts at once, so the annotator records their deaths in a side
//! table instead of the node's single death flag.

use smallvec::SmallVec;

use crate::aggregate::{AggregateInfo, Aggregates};
use crate::dense::DenseIndexMap;
use crate::ir::{AccessType, LocalNode, LocalNodeKind, NodeId, Statement};

/// How the annotator must record deaths for an access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AccessShape {
    /// Exactly one sub-part; the node's death flag suffices.
    Simple,
    /// Possibly several sub-parts; deaths go to the side table.
    Composite,
}

/// One sub-part touched by an access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Touch {
    /// Index within the aggregate: 0 is the remainder, `1 + i` is field `i`.
    pub slot: usize,
    /// The access reads this sub-part.
    pub is_use: bool,
    /// The access overwrites this sub-part completely.
    pub is_full_def: bool,
}

/// Classified appearance of a promoted struct local.
#[derive(Clone, Debug)]
pub(crate) struct Access<'a> {
    pub agg: &'a AggregateInfo,
    /// Dense index of the aggregate's remainder.
    pub base: usize,
    pub shape: AccessShape,
    pub touches: SmallVec<[Touch; 8]>,
}

impl Access<'_> {
    /// Dense index of a touched sub-part.
    #[inline]
    pub fn index(&self, touch: Touch) -> usize {
        self.base + touch.slot
    }
}

/// Classify the appearance `node_id` in `stmt`.
///
/// Returns `None` when the local is not a promoted aggregate.
pub(crate) fn classify<'a>(
    nodes: &[LocalNode],
    stmt: &Statement,
    node_id: NodeId,
    aggregates: &'a Aggregates,
    index_map: &DenseIndexMap,
) -> Option<Access<'a>> {
    let node = &nodes[node_id.index()];
    let agg = aggregates.lookup(node.local)?;
    let Some(base) = index_map.base(node.local) else {
        panic!("{} is promoted but has no dense index", node.local);
    };

    let reps = &agg.replacements;
    let is_def = node.is_def();
    let is_use = !is_def;
    let mut touches = SmallVec::new();

    let shape = if node.ty.is_struct() || node.is_addr() {
        if node.is_scalar_local() {
            for slot in 0..=reps.len() {
                touches.push(Touch {
                    slot,
                    is_use,
                    is_full_def: is_def,
                });
            }
        } else {
            let offset = node.offset();
            let size = struct_access_size(stmt, node_id, node);
            let end = offset + size;

            let mut index = agg.first_overlapping(offset, size);
            while index < reps.len() && reps[index].offset < end {
                touches.push(Touch {
                    slot: 1 + index,
                    is_use,
                    is_full_def: is_def && reps[index].is_covered_by(offset, size),
                });
                index += 1;
            }

            touches.push(Touch {
                slot: 0,
                is_use: is_use && agg.remainder_intersects(offset, size),
                is_full_def: is_def && agg.remainder_covered_by(offset, size),
            });
        }
        AccessShape::Composite
    } else {
        let offset = node.offset();
        match agg.binary_search(offset) {
            Ok(index) => touches.push(Touch {
                slot: 1 + index,
                is_use,
                is_full_def: is_def,
            }),
            Err(_) => {
                let size = node.ty.size();
                touches.push(Touch {
                    slot: 0,
                    is_use,
                    is_full_def: is_def && agg.remainder_covered_by(offset, size),
                });
            }
        }
        AccessShape::Simple
    };

    Some(Access {
        agg,
        base,
        shape,
        touches,
    })
}

/// Byte size of a partial struct access.
///
/// For a return-buffer address the size comes from the call that writes
/// through it.
fn struct_access_size(stmt: &Statement, node_id: NodeId, node: &LocalNode) -> u32 {
    match (node.kind, node.ty) {
        (LocalNodeKind::Addr { .. }, _) => {
            let Some(size) = stmt.ret_buf_size(node_id) else {
                panic!(
                    "address of {} is not the return buffer of a call in its statement",
                    node.local
                );
            };
            size
        }
        (_, AccessType::Struct { size }) => size,
        (_, AccessType::Scalar(ty)) => {
            let local = node.local;
            panic!("scalar {ty:?} access of {local} classified as struct")
        }
    }
}

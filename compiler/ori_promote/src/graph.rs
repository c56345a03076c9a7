//! Depth-first spanning tree over a [`Function`]'s control-flow graph.
//!
//! The fixpoint solver visits blocks in postorder (successors before
//! predecessors, which is what a backward problem wants) and needs to know
//! whether the graph has a cycle at all: for an acyclic graph one postorder
//! sweep is already exact.
//!
//! Exceptional edges to handlers are followed like regular edges, so
//! handlers are numbered and a cycle through a handler counts as a cycle.

use smallvec::SmallVec;

use crate::ir::{Block, BlockId, Function};

/// Regular successors followed by handler successors.
pub(crate) fn all_successors(block: &Block) -> SmallVec<[BlockId; 4]> {
    block
        .succs
        .iter()
        .chain(block.eh_succs.iter())
        .copied()
        .collect()
}

/// DFS spanning tree rooted at the entry block.
#[derive(Clone, Debug)]
pub struct DfsTree {
    /// Reachable block indices in postorder.
    postorder: Vec<usize>,
    /// Postorder number per block index; `None` for unreachable blocks.
    post_number: Vec<Option<usize>>,
    has_cycle: bool,
}

impl DfsTree {
    /// Build the tree with an iterative DFS (explicit stack, no recursion
    /// depth limit on deeply nested graphs).
    pub fn build(func: &Function) -> Self {
        let num_blocks = func.blocks.len();
        let mut visited = vec![false; num_blocks];
        let mut postorder = Vec::with_capacity(num_blocks);

        if num_blocks == 0 {
            return Self {
                postorder,
                post_number: Vec::new(),
                has_cycle: false,
            };
        }

        // Stack entries: (block_index, children_processed).
        // When children_processed is false, we push successors.
        // When true, we emit the block to postorder.
        let mut stack: Vec<(usize, bool)> = vec![(func.entry.index(), false)];

        while let Some(&mut (block_idx, ref mut children_done)) = stack.last_mut() {
            if *children_done {
                postorder.push(block_idx);
                stack.pop();
                continue;
            }

            *children_done = true;

            if visited[block_idx] {
                stack.pop();
                continue;
            }
            visited[block_idx] = true;

            for succ in all_successors(&func.blocks[block_idx]) {
                let succ_idx = succ.index();
                if !visited[succ_idx] {
                    stack.push((succ_idx, false));
                }
            }
        }

        let mut post_number = vec![None; num_blocks];
        for (number, &block_idx) in postorder.iter().enumerate() {
            post_number[block_idx] = Some(number);
        }

        // In a DFS tree, an edge u → v is a back edge iff v is an ancestor of
        // u (or u itself), i.e. v finishes no earlier than u. Tree, forward
        // and cross edges all point at blocks that finished first.
        let has_cycle = postorder.iter().any(|&block_idx| {
            let from = post_number[block_idx];
            all_successors(&func.blocks[block_idx])
                .iter()
                .any(|succ| post_number[succ.index()] >= from)
        });

        Self {
            postorder,
            post_number,
            has_cycle,
        }
    }

    /// Reachable block indices, successors before predecessors.
    pub fn postorder(&self) -> &[usize] {
        &self.postorder
    }

    /// Reachable block indices, predecessors before successors.
    pub fn reverse_postorder(&self) -> impl Iterator<Item = usize> + '_ {
        self.postorder.iter().rev().copied()
    }

    /// Postorder number of `block`, or `None` if it is unreachable.
    pub fn post_number(&self, block: BlockId) -> Option<usize> {
        self.post_number[block.index()]
    }

    #[inline]
    pub fn has_cycle(&self) -> bool {
        self.has_cycle
    }
}

//! Shared test utilities for promoted liveness.
//!
//! Factory functions used across the `graph`, `classify`, `liveness`,
//! `annotate`, `deaths`, and `dump` tests. Only compiled in test builds.

use std::sync::Once;

use proptest::prelude::*;

use crate::aggregate::{AggregateInfo, Aggregates, Replacement};
use crate::dense::VarSet;
use crate::ir::{
    AccessType, BlockId, CallSite, Function, LocalId, LocalNode, NodeId, ScalarType, Statement,
    StatementKind,
};

static TRACING_INIT: Once = Once::new();

/// Route `tracing` output to the test harness when `RUST_LOG` is set,
/// e.g. `RUST_LOG=ori_promote=trace`.
pub(crate) fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer().with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// Build a function with `num_blocks` empty blocks and the given regular
/// and handler edges. Block 0 is the entry.
pub(crate) fn func_with_edges(
    num_blocks: u32,
    edges: &[(u32, u32)],
    eh_edges: &[(u32, u32)],
) -> Function {
    let mut func = Function::new();
    for _ in 0..num_blocks {
        func.add_block();
    }
    for &(from, to) in edges {
        func.add_successor(b(from), b(to));
    }
    for &(from, handler) in eh_edges {
        func.add_eh_successor(b(from), b(handler));
    }
    func
}

/// Allocate a struct local of `size` bytes and one local per field, and
/// describe its promotion. Unpromoted bytes are the gaps between fields.
pub(crate) fn promote(
    func: &mut Function,
    size: u32,
    fields: &[(u32, ScalarType)],
) -> AggregateInfo {
    let local = func.add_local();
    let replacements = fields
        .iter()
        .map(|&(offset, ty)| Replacement::new(offset, ty, func.add_local()))
        .collect();
    AggregateInfo::from_layout(local, size, replacements)
}

/// The 12-byte struct used by most tests: `int` fields at 0 and 8,
/// remainder `[4, 8)`.
pub(crate) fn two_int_struct(func: &mut Function) -> AggregateInfo {
    promote(func, 12, &[(0, ScalarType::Int), (8, ScalarType::Int)])
}

/// Whole-struct read.
pub(crate) fn whole(local: LocalId, size: u32) -> LocalNode {
    LocalNode::var(local, AccessType::Struct { size })
}

/// `int` field read.
pub(crate) fn int_at(local: LocalId, offset: u32) -> LocalNode {
    LocalNode::field(local, offset, AccessType::Scalar(ScalarType::Int))
}

/// Struct-typed read of `size` bytes at `offset`.
pub(crate) fn part(local: LocalId, offset: u32, size: u32) -> LocalNode {
    LocalNode::field(local, offset, AccessType::Struct { size })
}

/// Append a plain statement with `nodes` (in execution order) to `block`.
pub(crate) fn stmt(func: &mut Function, block: BlockId, nodes: Vec<LocalNode>) -> Vec<NodeId> {
    let ids: Vec<NodeId> = nodes.into_iter().map(|node| func.add_node(node)).collect();
    func.push_statement(block, Statement::plain(ids.clone()));
    ids
}

/// Append a statement rooted at a top-level conditional expression.
pub(crate) fn guarded_stmt(
    func: &mut Function,
    block: BlockId,
    nodes: Vec<LocalNode>,
) -> Vec<NodeId> {
    let ids: Vec<NodeId> = nodes.into_iter().map(|node| func.add_node(node)).collect();
    func.push_statement(block, Statement::guarded(ids.clone()));
    ids
}

/// Members of a var set, ascending.
pub(crate) fn members(set: &VarSet) -> Vec<usize> {
    set.iter().collect()
}

// ── Random functions for property tests ─────────────────────────────

/// Shape of one generated appearance of the test struct.
#[derive(Clone, Copy, Debug)]
pub(crate) enum AccessSpec {
    Whole,
    Int(u32),
    Part { offset: u32, size: u32 },
    RetBuf { offset: u32, size: u32 },
}

#[derive(Clone, Debug)]
pub(crate) struct NodeSpec {
    pub access: AccessSpec,
    pub def: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct StmtSpec {
    pub guarded: bool,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Clone, Debug)]
pub(crate) struct BlockSpec {
    pub succs: Vec<u32>,
    pub eh_succs: Vec<u32>,
    pub stmts: Vec<StmtSpec>,
}

fn arb_access() -> impl Strategy<Value = AccessSpec> {
    prop_oneof![
        Just(AccessSpec::Whole),
        prop::sample::select(vec![0u32, 4, 8]).prop_map(AccessSpec::Int),
        (
            prop::sample::select(vec![0u32, 2, 4, 6, 8]),
            prop::sample::select(vec![2u32, 4, 8]),
        )
            .prop_map(|(offset, size)| AccessSpec::Part { offset, size }),
        (
            prop::sample::select(vec![0u32, 4]),
            prop::sample::select(vec![4u32, 8, 12]),
        )
            .prop_map(|(offset, size)| AccessSpec::RetBuf { offset, size }),
    ]
}

fn arb_node() -> impl Strategy<Value = NodeSpec> {
    (arb_access(), any::<bool>())
        .prop_map(|(access, def)| NodeSpec { access, def })
}

fn arb_stmt() -> impl Strategy<Value = StmtSpec> {
    (
        prop::bool::weighted(0.2),
        prop::collection::vec(arb_node(), 1..4),
    )
        .prop_map(|(guarded, nodes)| StmtSpec { guarded, nodes })
}

/// 1-7 blocks with arbitrary (possibly cyclic) regular and handler edges.
pub(crate) fn arb_blocks() -> impl Strategy<Value = Vec<BlockSpec>> {
    (1u32..8).prop_flat_map(|n| {
        let block = (
            prop::collection::vec(0..n, 0..3),
            prop::collection::vec(0..n, 0..2),
            prop::collection::vec(arb_stmt(), 0..4),
        )
            .prop_map(|(succs, eh_succs, stmts)| BlockSpec {
                succs,
                eh_succs,
                stmts,
            });
        prop::collection::vec(block, n as usize)
    })
}

/// Materialize generated blocks over [`two_int_struct`].
pub(crate) fn build_function(specs: &[BlockSpec]) -> (Function, Aggregates) {
    let mut func = Function::new();
    let agg = two_int_struct(&mut func);
    let local = agg.local;

    for _ in specs {
        func.add_block();
    }

    for (idx, spec) in specs.iter().enumerate() {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "generated block counts are tiny"
        )]
        let block = b(idx as u32);
        for &succ in &spec.succs {
            func.add_successor(block, b(succ));
        }
        for &handler in &spec.eh_succs {
            func.add_eh_successor(block, b(handler));
        }

        for stmt_spec in &spec.stmts {
            let mut stmt = Statement {
                kind: if stmt_spec.guarded {
                    StatementKind::Guarded
                } else {
                    StatementKind::Plain
                },
                locals: Vec::new(),
                calls: Vec::new(),
            };
            for node_spec in &stmt_spec.nodes {
                let node = match node_spec.access {
                    AccessSpec::Whole => whole(local, 12),
                    AccessSpec::Int(offset) => int_at(local, offset),
                    AccessSpec::Part { offset, size } => part(local, offset, size),
                    AccessSpec::RetBuf { offset, size } => {
                        let id = func.add_node(LocalNode::ret_buf(local, offset));
                        stmt.locals.push(id);
                        stmt.calls.push(CallSite {
                            ret_buf: Some(id),
                            ret_size: size,
                        });
                        continue;
                    }
                };
                let node = if node_spec.def { node.def() } else { node };
                stmt.locals.push(func.add_node(node));
            }
            func.push_statement(block, stmt);
        }
    }

    (func, Aggregates::new(vec![agg]))
}

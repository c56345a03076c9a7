//! Host IR model for promoted-struct liveness.
//!
//! The analysis does not own the compiler's IR; it only needs a narrow view
//! of it. This module models exactly that view:
//!
//! - **[`Function`]** — the local table, an arena of local-variable
//!   appearances ([`LocalNode`]), and the basic blocks
//! - **[`Block`]** — ordered statements plus regular and exceptional
//!   (handler) successors
//! - **[`Statement`]** — the local appearances of one statement in
//!   execution order, tagged [`StatementKind::Guarded`] when its root is a
//!   top-level conditional expression
//! - **[`LocalNode`]** — one appearance of a local: whole-variable, field at
//!   a byte offset, or an address taken for a return buffer
//!
//! Nodes live in a flat arena addressed by [`NodeId`] so that per-node side
//! tables can be keyed by identity without holding references into the IR.

use std::fmt;

use bitflags::bitflags;
use smallvec::SmallVec;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Local variable number within a [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    /// Create a new local ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:02}", self.0)
    }
}

/// Basic block ID within a [`Function`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a local-variable appearance in the node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new node ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Types ───────────────────────────────────────────────────────────

/// Primitive machine type of a scalar access or replacement field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Managed or unmanaged pointer-sized value.
    Ref,
}

impl ScalarType {
    /// Size in bytes.
    pub fn size(self) -> u32 {
        match self {
            ScalarType::Byte => 1,
            ScalarType::Short => 2,
            ScalarType::Int | ScalarType::Float => 4,
            ScalarType::Long | ScalarType::Double | ScalarType::Ref => 8,
        }
    }
}

/// Static type of a local appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessType {
    Scalar(ScalarType),
    /// Struct-typed access; `size` is the byte size of its layout.
    Struct { size: u32 },
}

impl AccessType {
    #[inline]
    pub fn is_struct(self) -> bool {
        matches!(self, AccessType::Struct { .. })
    }

    /// Size in bytes of the accessed value.
    pub fn size(self) -> u32 {
        match self {
            AccessType::Scalar(ty) => ty.size(),
            AccessType::Struct { size } => size,
        }
    }
}

// ── Local appearances ───────────────────────────────────────────────

/// Shape of a local appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum LocalNodeKind {
    /// The whole local, accessed as a unit.
    Var,
    /// A field of the local at a byte offset.
    Field { offset: u32 },
    /// The address of the local, passed as a return buffer to a call.
    Addr { offset: u32 },
}

bitflags! {
    /// Per-node flags shared with the rest of the compiler.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct NodeFlags: u8 {
        /// The appearance is a store (definition), not a read.
        const DEF = 1 << 0;
        /// Last use of the accessed sub-variable on this path.
        ///
        /// While promoted liveness is in effect the flag is scoped to the
        /// remainder or replacement being accessed, not the whole struct.
        const DEATH = 1 << 1;
    }
}

/// One appearance of a local variable in a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalNode {
    pub local: LocalId,
    pub kind: LocalNodeKind,
    pub ty: AccessType,
    pub flags: NodeFlags,
}

impl LocalNode {
    /// Whole-local read of type `ty`.
    pub fn var(local: LocalId, ty: AccessType) -> Self {
        Self {
            local,
            kind: LocalNodeKind::Var,
            ty,
            flags: NodeFlags::empty(),
        }
    }

    /// Field read of type `ty` at `offset`.
    pub fn field(local: LocalId, offset: u32, ty: AccessType) -> Self {
        Self {
            local,
            kind: LocalNodeKind::Field { offset },
            ty,
            flags: NodeFlags::empty(),
        }
    }

    /// Return-buffer definition of `local` at `offset`.
    ///
    /// The written size is recovered from the call that consumes the
    /// address (see [`Statement::ret_buf_size`]).
    pub fn ret_buf(local: LocalId, offset: u32) -> Self {
        Self {
            local,
            kind: LocalNodeKind::Addr { offset },
            ty: AccessType::Scalar(ScalarType::Ref),
            flags: NodeFlags::DEF,
        }
    }

    /// Turn this appearance into a store.
    #[must_use]
    pub fn def(mut self) -> Self {
        self.flags |= NodeFlags::DEF;
        self
    }

    #[inline]
    pub fn is_def(&self) -> bool {
        self.flags.contains(NodeFlags::DEF)
    }

    #[inline]
    pub fn is_dying(&self) -> bool {
        self.flags.contains(NodeFlags::DEATH)
    }

    /// `true` for a whole-local appearance (no offset).
    #[inline]
    pub fn is_scalar_local(&self) -> bool {
        matches!(self.kind, LocalNodeKind::Var)
    }

    #[inline]
    pub fn is_addr(&self) -> bool {
        matches!(self.kind, LocalNodeKind::Addr { .. })
    }

    /// Byte offset of the access within the local.
    pub fn offset(&self) -> u32 {
        match self.kind {
            LocalNodeKind::Var => 0,
            LocalNodeKind::Field { offset } | LocalNodeKind::Addr { offset } => offset,
        }
    }
}

// ── Statements and blocks ───────────────────────────────────────────

/// A call contained in a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Address node passed as the hidden return buffer, if any.
    pub ret_buf: Option<NodeId>,
    /// Byte size of the call's return layout.
    pub ret_size: u32,
}

/// Whether a statement's root is a top-level conditional expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StatementKind {
    #[default]
    Plain,
    /// `dst = cond ? a : b` style statement. Stores under it may not
    /// execute, so they never count as definitions.
    Guarded,
}

/// A statement: its local appearances in execution order.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Statement {
    pub kind: StatementKind,
    pub locals: Vec<NodeId>,
    pub calls: Vec<CallSite>,
}

impl Statement {
    pub fn plain(locals: Vec<NodeId>) -> Self {
        Self {
            kind: StatementKind::Plain,
            locals,
            calls: Vec::new(),
        }
    }

    pub fn guarded(locals: Vec<NodeId>) -> Self {
        Self {
            kind: StatementKind::Guarded,
            locals,
            calls: Vec::new(),
        }
    }

    /// Attach a call site.
    #[must_use]
    pub fn with_call(mut self, call: CallSite) -> Self {
        self.calls.push(call);
        self
    }

    #[inline]
    pub fn is_guarded(&self) -> bool {
        self.kind == StatementKind::Guarded
    }

    /// Size written through `node` by the call that takes it as its
    /// return buffer, or `None` if no call in this statement does.
    pub fn ret_buf_size(&self, node: NodeId) -> Option<u32> {
        self.calls
            .iter()
            .find(|call| call.ret_buf == Some(node))
            .map(|call| call.ret_size)
    }
}

/// A basic block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub statements: Vec<Statement>,
    /// Regular control-flow successors.
    pub succs: SmallVec<[BlockId; 2]>,
    /// Handlers reachable by implicit (exceptional) control flow.
    pub eh_succs: SmallVec<[BlockId; 2]>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            statements: Vec::new(),
            succs: SmallVec::new(),
            eh_succs: SmallVec::new(),
        }
    }

    /// Can control leave this block through an exception?
    #[inline]
    pub fn has_potential_eh_succs(&self) -> bool {
        !self.eh_succs.is_empty()
    }
}

/// Per-local information the analysis touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct LocalInfo {
    /// Set in debug builds for promoted locals so IR dumps show their
    /// death flags even though they have no tracked-variable index.
    pub tracked_without_index: bool,
}

/// A function body as seen by promoted liveness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub locals: Vec<LocalInfo>,
    pub nodes: Vec<LocalNode>,
    pub blocks: Vec<Block>,
    pub entry: BlockId,
}

impl Default for Function {
    fn default() -> Self {
        Self::new()
    }
}

impl Function {
    pub fn new() -> Self {
        Self {
            locals: Vec::new(),
            nodes: Vec::new(),
            blocks: Vec::new(),
            entry: BlockId::new(0),
        }
    }

    pub fn add_local(&mut self) -> LocalId {
        #[expect(clippy::cast_possible_truncation, reason = "local counts fit in u32")]
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(LocalInfo::default());
        id
    }

    pub fn add_block(&mut self) -> BlockId {
        #[expect(clippy::cast_possible_truncation, reason = "block counts fit in u32")]
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(Block::new(id));
        id
    }

    pub fn add_node(&mut self, node: LocalNode) -> NodeId {
        #[expect(clippy::cast_possible_truncation, reason = "node counts fit in u32")]
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn add_successor(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].succs.push(to);
    }

    pub fn add_eh_successor(&mut self, from: BlockId, handler: BlockId) {
        self.blocks[from.index()].eh_succs.push(handler);
    }

    pub fn push_statement(&mut self, block: BlockId, stmt: Statement) {
        self.blocks[block.index()].statements.push(stmt);
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &LocalNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn local(&self, id: LocalId) -> &LocalInfo {
        &self.locals[id.index()]
    }
}

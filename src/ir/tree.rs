
use std::fmt::{ Debug, Formatter, Result as FmtResult };

use generational_arena::{ Arena, Index };

use super::*;

// ------------------------------------------------------------------------------------------------
// StmtId, BlockId
// ------------------------------------------------------------------------------------------------

/// Uniquely identifies a [`Stmt`]. Stale ids (ids of erased statements) are detected by the
/// arena and panic on access rather than aliasing a newer statement.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct StmtId(pub Index);

impl Debug for StmtId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let (index, _) = self.0.into_raw_parts();
		write!(f, "%{}", index)
	}
}

/// Uniquely identifies a [`Block`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct BlockId(pub Index);

impl Debug for BlockId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let (index, _) = self.0.into_raw_parts();
		write!(f, "b{}", index)
	}
}

// ------------------------------------------------------------------------------------------------
// Block
// ------------------------------------------------------------------------------------------------

/// An ordered sequence of statements. Owned either by a container statement or, for the root
/// block, by the tree itself.
pub struct Block {
	id:     BlockId,
	parent: Option<StmtId>,
	stmts:  Vec<StmtId>,
}

impl Block {
	fn new(id: BlockId) -> Self {
		Self { id, parent: None, stmts: vec![] }
	}

	/// Its globally-unique id.
	pub fn id(&self) -> BlockId {
		self.id
	}

	/// The container statement owning this block, or `None` for the root block.
	pub fn parent(&self) -> Option<StmtId> {
		self.parent
	}

	/// Its statements, in program order.
	pub fn stmts(&self) -> &[StmtId] {
		&self.stmts
	}

	/// Where the given statement sits in this block, or `None` if it isn't here.
	pub fn position(&self, id: StmtId) -> Option<usize> {
		self.stmts.iter().position(|&s| s == id)
	}
}

// ------------------------------------------------------------------------------------------------
// IrTree
// ------------------------------------------------------------------------------------------------

/// An IR function body: arenas of statements and blocks, and the root block. All statement
/// cross-references are [`StmtId`] handles into the statement arena, so references to erased
/// statements fail fast instead of dangling.
pub struct IrTree {
	stmts:  Arena<Stmt>,
	blocks: Arena<Block>,
	root:   BlockId,
}

impl IrTree {
	pub fn new() -> Self {
		let mut blocks = Arena::new();
		let root = BlockId(blocks.insert_with(|id| Block::new(BlockId(id))));

		Self {
			stmts: Arena::new(),
			blocks,
			root,
		}
	}

	/// The root block of the function body.
	pub fn root(&self) -> BlockId {
		self.root
	}

	/// Gets the statement with the given ID.
	pub fn stmt(&self, id: StmtId) -> &Stmt {
		self.stmts.get(id.0).expect("stale StmtId")
	}

	/// Same as above but mutable.
	pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
		self.stmts.get_mut(id.0).expect("stale StmtId")
	}

	/// Gets the block with the given ID.
	pub fn block(&self, id: BlockId) -> &Block {
		self.blocks.get(id.0).expect("stale BlockId")
	}

	/// Is this id still a live statement? (Erasure invalidates ids.)
	pub fn contains(&self, id: StmtId) -> bool {
		self.stmts.get(id.0).is_some()
	}

	/// How many statements the whole tree holds.
	pub fn stmt_count(&self) -> usize {
		self.stmts.len()
	}
}

// ------------------------------------------------------------------------------------------------
// Construction
// ------------------------------------------------------------------------------------------------

impl IrTree {
	/// Creates a new, initially-unowned block. [`IrBuilder`] attaches it to its container
	/// statement once that statement exists.
	pub(crate) fn new_block(&mut self) -> BlockId {
		BlockId(self.blocks.insert_with(|id| Block::new(BlockId(id))))
	}

	pub(crate) fn set_block_parent(&mut self, block: BlockId, parent: StmtId) {
		let block = self.blocks.get_mut(block.0).expect("stale BlockId");
		assert!(block.parent.is_none());
		block.parent = Some(parent);
	}

	/// Appends a new statement at the end of `block` and returns its ID.
	pub fn append(&mut self, block: BlockId, kind: StmtKind) -> StmtId {
		let id = StmtId(self.stmts.insert_with(|id| Stmt::new(StmtId(id), block, kind)));
		self.blocks.get_mut(block.0).expect("stale BlockId").stmts.push(id);
		id
	}

	/// Inserts a new statement immediately following `after` in its owning block, and
	/// returns its ID.
	pub fn insert_after(&mut self, after: StmtId, kind: StmtKind) -> StmtId {
		let owner = self.stmt(after).block();
		let pos = self.block(owner).position(after).expect("statement not in its owning block");

		let id = StmtId(self.stmts.insert_with(|id| Stmt::new(StmtId(id), owner, kind)));
		self.blocks.get_mut(owner.0).expect("stale BlockId").stmts.insert(pos + 1, id);
		id
	}
}

// ------------------------------------------------------------------------------------------------
// Mutation primitives
// ------------------------------------------------------------------------------------------------

impl IrTree {
	/// Removes a statement from its owning block and frees it, along with any blocks (and
	/// their statements) it owns. Every handle to anything freed is invalid from here on.
	pub fn erase(&mut self, id: StmtId) {
		let owner = self.stmt(id).block();

		let block = self.blocks.get_mut(owner.0).expect("stale BlockId");
		let pos = block.position(id).expect("statement not in its owning block");
		block.stmts.remove(pos);

		self.free_stmt(id);
	}

	/// Redirects every reference to `old`'s produced value to reference `new` instead.
	/// `old` itself is left in place; callers erase it afterwards.
	pub fn replace_uses(&mut self, old: StmtId, new: StmtId) {
		for (_, stmt) in self.stmts.iter_mut() {
			stmt.kind_mut().visit_operands_mut(|id| {
				if *id == old {
					*id = new;
				}
			});
		}
	}

	fn free_stmt(&mut self, id: StmtId) {
		let stmt = self.stmts.remove(id.0).expect("stale StmtId");

		let mut subs = vec![];
		stmt.kind().visit_blocks(|b| subs.push(b));

		for b in subs {
			self.free_block(b);
		}
	}

	fn free_block(&mut self, id: BlockId) {
		let block = self.blocks.remove(id.0).expect("stale BlockId");

		for s in block.stmts {
			self.free_stmt(s);
		}
	}
}

// ------------------------------------------------------------------------------------------------
// Searching
// ------------------------------------------------------------------------------------------------

impl IrTree {
	/// Collects every statement in the subtree under `block` (in program order, descending
	/// into nested branches and loops) satisfying the predicate.
	pub fn gather_statements(&self, block: BlockId, pred: impl Fn(&Stmt) -> bool) -> Vec<StmtId> {
		let mut found = vec![];
		self.gather_rec(block, &pred, &mut found);
		found
	}

	fn gather_rec(&self, block: BlockId, pred: &impl Fn(&Stmt) -> bool, found: &mut Vec<StmtId>) {
		for &id in self.block(block).stmts() {
			let stmt = self.stmt(id);

			if pred(stmt) {
				found.push(id);
			}

			let mut subs = vec![];
			stmt.kind().visit_blocks(|b| subs.push(b));

			for b in subs {
				self.gather_rec(b, pred, found);
			}
		}
	}
}

// ------------------------------------------------------------------------------------------------
// Dumping
// ------------------------------------------------------------------------------------------------

impl Debug for IrTree {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		self.fmt_block(f, self.root, 0)
	}
}

impl IrTree {
	fn fmt_block(&self, f: &mut Formatter, block: BlockId, depth: usize) -> FmtResult {
		use StmtKind::*;

		for &id in self.block(block).stmts() {
			let stmt = self.stmt(id);
			writeln!(f, "{:indent$}{:?}", "", stmt, indent = depth * 4)?;

			match stmt.kind() {
				If { then_b, else_b, .. } => {
					if let Some(b) = then_b {
						self.fmt_block(f, *b, depth + 1)?;
					}

					if let Some(b) = else_b {
						writeln!(f, "{:indent$}else", "", indent = depth * 4)?;
						self.fmt_block(f, *b, depth + 1)?;
					}
				}

				WhileLoop { body } | RangeFor { body, .. } | StructFor { body, .. } => {
					self.fmt_block(f, *body, depth + 1)?;
				}

				_ => {}
			}
		}

		Ok(())
	}
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

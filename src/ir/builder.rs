
use smallvec::{ smallvec };

use super::*;

// ------------------------------------------------------------------------------------------------
// IrBuilder
// ------------------------------------------------------------------------------------------------

/// Helper for building IR function bodies. Flat statements are appended to the current block;
/// container statements take closures which build their nested blocks.
pub struct IrBuilder {
	tree: IrTree,
	cur:  Vec<BlockId>,
}

impl IrBuilder {
	/// Constructor.
	pub fn new() -> Self {
		let tree = IrTree::new();
		let root = tree.root();

		Self {
			tree,
			cur: vec![root],
		}
	}

	/// Finish building and get the finished tree.
	pub fn finish(self) -> IrTree {
		self.tree
	}

	fn cur(&self) -> BlockId {
		// safe because the root block is never popped.
		*self.cur.last().unwrap()
	}

	fn stmt(&mut self, kind: StmtKind) -> StmtId {
		let block = self.cur();
		self.tree.append(block, kind)
	}

	fn block(&mut self, body: impl FnOnce(&mut Self)) -> BlockId {
		let block = self.tree.new_block();
		self.cur.push(block);
		body(self);
		self.cur.pop();
		block
	}
}

// ------------------------------------------------------------------------------------------------
// Flat statements
// ------------------------------------------------------------------------------------------------

impl IrBuilder {
	///
	pub fn alloca(&mut self, ty: ValType) -> StmtId {
		self.stmt(StmtKind::Alloca { ty })
	}

	///
	pub fn const_(&mut self, ty: ValType, val: u64) -> StmtId {
		self.stmt(StmtKind::Const { ty, width: 1, val })
	}

	///
	pub fn unary(&mut self, op: UnOp, src: StmtId) -> StmtId {
		self.stmt(StmtKind::Unary { op, src })
	}

	///
	pub fn binary(&mut self, op: BinOp, lhs: StmtId, rhs: StmtId) -> StmtId {
		self.stmt(StmtKind::Binary { op, lhs, rhs })
	}

	/// A regular single-lane load of `slot`.
	pub fn load(&mut self, slot: StmtId) -> StmtId {
		self.stmt(StmtKind::LocalLoad { lanes: smallvec![LanePtr::new(slot, 0)] })
	}

	/// A load with explicitly-given `(slot, offset)` lanes.
	pub fn load_lanes(&mut self, lanes: &[(StmtId, usize)]) -> StmtId {
		let lanes = lanes.iter().map(|&(slot, offset)| LanePtr::new(slot, offset)).collect();
		self.stmt(StmtKind::LocalLoad { lanes })
	}

	///
	pub fn store(&mut self, slot: StmtId, val: StmtId) -> StmtId {
		self.stmt(StmtKind::LocalStore { slot, val })
	}

	///
	pub fn atomic(&mut self, op: AtomicKind, slot: StmtId, val: StmtId) -> StmtId {
		self.stmt(StmtKind::AtomicOp { op, slot, val })
	}

	///
	pub fn print(&mut self, arg: StmtId) -> StmtId {
		self.stmt(StmtKind::Print { arg })
	}
}

// ------------------------------------------------------------------------------------------------
// Container statements
// ------------------------------------------------------------------------------------------------

impl IrBuilder {
	///
	pub fn if_then(&mut self, cond: StmtId, then_b: impl FnOnce(&mut Self)) -> StmtId {
		let then_b = self.block(then_b);
		let id = self.stmt(StmtKind::If { cond, then_b: Some(then_b), else_b: None });
		self.tree.set_block_parent(then_b, id);
		id
	}

	///
	pub fn if_then_else(
		&mut self,
		cond:   StmtId,
		then_b: impl FnOnce(&mut Self),
		else_b: impl FnOnce(&mut Self),
	) -> StmtId {
		let then_b = self.block(then_b);
		let else_b = self.block(else_b);
		let id = self.stmt(StmtKind::If { cond, then_b: Some(then_b), else_b: Some(else_b) });
		self.tree.set_block_parent(then_b, id);
		self.tree.set_block_parent(else_b, id);
		id
	}

	///
	pub fn while_loop(&mut self, body: impl FnOnce(&mut Self)) -> StmtId {
		let body = self.block(body);
		let id = self.stmt(StmtKind::WhileLoop { body });
		self.tree.set_block_parent(body, id);
		id
	}

	///
	pub fn range_for(
		&mut self,
		var:   Option<StmtId>,
		begin: StmtId,
		end:   StmtId,
		body:  impl FnOnce(&mut Self),
	) -> StmtId {
		let body = self.block(body);
		let id = self.stmt(StmtKind::RangeFor { var, begin, end, body });
		self.tree.set_block_parent(body, id);
		id
	}

	///
	pub fn struct_for(&mut self, vars: &[StmtId], body: impl FnOnce(&mut Self)) -> StmtId {
		let body = self.block(body);
		let id = self.stmt(StmtKind::StructFor { vars: vars.to_vec(), body });
		self.tree.set_block_parent(body, id);
		id
	}
}

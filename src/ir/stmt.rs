
use std::fmt::{ Debug, Formatter, Result as FmtResult };

use derive_new::new;
use smallvec::{ SmallVec };

use super::*;

// ------------------------------------------------------------------------------------------------
// UnOp, BinOp, AtomicKind
// ------------------------------------------------------------------------------------------------

/// Unary operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnOp {
	Neg,  // dst = -src
	Abs,  // dst = |src|
	Sqrt, // dst = sqrt(src)
}

impl UnOp {
	fn name(&self) -> &'static str {
		match self {
			UnOp::Neg  => "neg",
			UnOp::Abs  => "abs",
			UnOp::Sqrt => "sqrt",
		}
	}
}

/// Binary operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinOp {
	Add, // dst = lhs + rhs
	Sub, // dst = lhs - rhs
	Mul, // dst = lhs * rhs
	Div, // dst = lhs / rhs
	Min, // dst = min(lhs, rhs)
	Max, // dst = max(lhs, rhs)
	Lt,  // dst = lhs < rhs
}

impl BinOp {
	fn name(&self) -> &'static str {
		match self {
			BinOp::Add => "add",
			BinOp::Sub => "sub",
			BinOp::Mul => "mul",
			BinOp::Div => "div",
			BinOp::Min => "min",
			BinOp::Max => "max",
			BinOp::Lt  => "lt",
		}
	}
}

/// Read-modify-write operations on slots.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AtomicKind {
	Add,
	Sub,
	Min,
	Max,
}

impl AtomicKind {
	fn name(&self) -> &'static str {
		match self {
			AtomicKind::Add => "add",
			AtomicKind::Sub => "sub",
			AtomicKind::Min => "min",
			AtomicKind::Max => "max",
		}
	}
}

// ------------------------------------------------------------------------------------------------
// LanePtr
// ------------------------------------------------------------------------------------------------

/// One lane of a [`StmtKind::LocalLoad`]: which slot it reads, and at which offset into that
/// slot's lanes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[derive(new)]
pub struct LanePtr {
	pub slot:   StmtId,
	pub offset: usize,
}

/// Inline storage for the common narrow loads.
pub type Lanes = SmallVec<[LanePtr; 4]>;

// ------------------------------------------------------------------------------------------------
// StmtKind
// ------------------------------------------------------------------------------------------------

/// Represents IR statements. Statements produce at most one value, referenced by other
/// statements through their [`StmtId`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StmtKind {
	/// Declares one scalar local variable ("slot") of a fixed type.
	Alloca  { ty: ValType },
	/// A compile-time constant, repeated across `width` lanes. `val` holds the raw bits.
	Const   { ty: ValType, width: usize, val: u64 },

	Unary   { op: UnOp, src: StmtId },
	Binary  { op: BinOp, lhs: StmtId, rhs: StmtId },

	/// Reads `lanes.len()` parallel lanes out of slots.
	LocalLoad  { lanes: Lanes },
	/// Writes the value produced by `val` into `slot`.
	LocalStore { slot: StmtId, val: StmtId },
	/// Reads-modifies-writes `slot`; produces the old value as its result.
	AtomicOp   { op: AtomicKind, slot: StmtId, val: StmtId },

	/// Two-way branch. Either block may be absent.
	If        { cond: StmtId, then_b: Option<BlockId>, else_b: Option<BlockId> },
	/// Loop with no condition of its own; the body runs an unknown number of times.
	WhileLoop { body: BlockId },
	/// Counted loop over `begin .. end`, optionally binding a slot as its induction variable.
	RangeFor  { var: Option<StmtId>, begin: StmtId, end: StmtId, body: BlockId },
	/// Structured iteration binding one or more slots as its loop variables.
	StructFor { vars: Vec<StmtId>, body: BlockId },

	/// Opaque side-effecting consumer of one value.
	Print { arg: StmtId },
}

impl StmtKind {
	/// Callback iterator over every statement this one references as an operand. Slot
	/// references count: they are references like any other, just never to value-producers
	/// other than allocas.
	pub fn visit_operands(&self, mut f: impl FnMut(StmtId)) {
		use StmtKind::*;

		match self {
			Alloca { .. } | Const { .. } | WhileLoop { .. } => {}

			Unary { src, .. }            => { f(*src); }
			Binary { lhs, rhs, .. }      => { f(*lhs); f(*rhs); }
			LocalStore { slot, val }     => { f(*slot); f(*val); }
			AtomicOp { slot, val, .. }   => { f(*slot); f(*val); }
			If { cond, .. }              => { f(*cond); }
			Print { arg }                => { f(*arg); }

			LocalLoad { lanes } => {
				for lane in lanes {
					f(lane.slot);
				}
			}
			RangeFor { var, begin, end, .. } => {
				if let Some(var) = var {
					f(*var);
				}
				f(*begin);
				f(*end);
			}
			StructFor { vars, .. } => {
				for var in vars {
					f(*var);
				}
			}
		}
	}

	/// Same as above but mutable.
	pub fn visit_operands_mut(&mut self, mut f: impl FnMut(&mut StmtId)) {
		use StmtKind::*;

		match self {
			Alloca { .. } | Const { .. } | WhileLoop { .. } => {}

			Unary { src, .. }            => { f(src); }
			Binary { lhs, rhs, .. }      => { f(lhs); f(rhs); }
			LocalStore { slot, val }     => { f(slot); f(val); }
			AtomicOp { slot, val, .. }   => { f(slot); f(val); }
			If { cond, .. }              => { f(cond); }
			Print { arg }                => { f(arg); }

			LocalLoad { lanes } => {
				for lane in lanes.iter_mut() {
					f(&mut lane.slot);
				}
			}
			RangeFor { var, begin, end, .. } => {
				if let Some(var) = var {
					f(var);
				}
				f(begin);
				f(end);
			}
			StructFor { vars, .. } => {
				for var in vars.iter_mut() {
					f(var);
				}
			}
		}
	}

	/// Does this statement reference `target` as an operand?
	pub fn has_operand(&self, target: StmtId) -> bool {
		let mut found = false;
		self.visit_operands(|id| found = found || id == target);
		found
	}

	/// Callback iterator over the blocks this statement owns.
	pub fn visit_blocks(&self, mut f: impl FnMut(BlockId)) {
		use StmtKind::*;

		match self {
			If { then_b, else_b, .. } => {
				if let Some(b) = then_b {
					f(*b);
				}
				if let Some(b) = else_b {
					f(*b);
				}
			}
			WhileLoop { body } | RangeFor { body, .. } | StructFor { body, .. } => f(*body),
			_ => {}
		}
	}

	/// True if this statement owns sub-blocks. Anything block-bearing must be explicitly
	/// handled by tree walks; see [`crate::opt`].
	pub fn is_container(&self) -> bool {
		let mut container = false;
		self.visit_blocks(|_| container = true);
		container
	}
}

// ------------------------------------------------------------------------------------------------
// Stmt
// ------------------------------------------------------------------------------------------------

/// A statement in an [`IrTree`]. Owned by exactly one [`Block`]; the `block` field is a
/// non-owning back-reference used only for locating this statement, never trusted across
/// mutations of the tree.
pub struct Stmt {
	id:    StmtId,
	block: BlockId,
	kind:  StmtKind,
}

impl Stmt {
	pub(crate) fn new(id: StmtId, block: BlockId, kind: StmtKind) -> Self {
		Self { id, block, kind }
	}

	/// Its globally-unique id.
	pub fn id(&self) -> StmtId {
		self.id
	}

	/// The block which owns it.
	pub fn block(&self) -> BlockId {
		self.block
	}

	/// What kind of statement this is.
	pub fn kind(&self) -> &StmtKind {
		&self.kind
	}

	/// Same as above, but mutable.
	pub fn kind_mut(&mut self) -> &mut StmtKind {
		&mut self.kind
	}

	/// If this statement declares a slot, its declared type.
	pub fn alloca_type(&self) -> Option<ValType> {
		match self.kind {
			StmtKind::Alloca { ty } => Some(ty),
			_                       => None,
		}
	}
}

impl Debug for Stmt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		use StmtKind::*;

		match &self.kind {
			Alloca { ty } =>
				write!(f, "{:?} = alloca {}", self.id, ty.name()),
			Const { ty, width, val } =>
				write!(f, "{:?} = const {} [{}]x{}", self.id, ty.name(), val, width),
			Unary { op, src } =>
				write!(f, "{:?} = {} {:?}", self.id, op.name(), src),
			Binary { op, lhs, rhs } =>
				write!(f, "{:?} = {} {:?}, {:?}", self.id, op.name(), lhs, rhs),
			LocalStore { slot, val } =>
				write!(f, "store {:?} <- {:?}", slot, val),
			AtomicOp { op, slot, val } =>
				write!(f, "{:?} = atomic_{} {:?}, {:?}", self.id, op.name(), slot, val),
			Print { arg } =>
				write!(f, "print {:?}", arg),

			LocalLoad { lanes } => {
				write!(f, "{:?} = load [", self.id)?;

				let mut lanes = lanes.iter();

				if let Some(lane) = lanes.next() {
					write!(f, "{:?}.{}", lane.slot, lane.offset)?;

					for lane in lanes {
						write!(f, ", {:?}.{}", lane.slot, lane.offset)?;
					}
				}

				write!(f, "]")
			}

			If { cond, .. } =>
				write!(f, "if {:?}", cond),
			WhileLoop { .. } =>
				write!(f, "while"),
			RangeFor { var, begin, end, .. } => {
				match var {
					Some(var) => write!(f, "for {:?} in {:?} .. {:?}", var, begin, end),
					None      => write!(f, "for _ in {:?} .. {:?}", begin, end),
				}
			}
			StructFor { vars, .. } =>
				write!(f, "for {:?} in struct", vars),
		}
	}
}

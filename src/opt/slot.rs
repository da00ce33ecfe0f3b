
use log::*;

use crate::ir::{ BlockId, IrError, IrResult, IrTree, LanePtr, StmtId, StmtKind, ValType };

use super::{ Change };

// ------------------------------------------------------------------------------------------------
// LoopCtx
// ------------------------------------------------------------------------------------------------

/// Where the scan cursor sits relative to loops inside the slot's scope.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) enum LoopCtx {
	/// Not inside any loop.
	Outside,
	/// Inside a loop which might store the slot.
	MayStore,
	/// Inside a loop already proven store-free for this slot, so values from before the
	/// loop survive every iteration.
	NoStores,
}

// ------------------------------------------------------------------------------------------------
// SlotState
// ------------------------------------------------------------------------------------------------

/// Everything the scan knows about one slot at the current cursor position. A small plain
/// value: branch handling runs an independent copy through each arm and merges the results.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) struct SlotState {
	/// Ever stored (or atomically updated) since scan start?
	stored: bool,
	/// Ever loaded (or atomically updated)?
	loaded: bool,

	/// The most recent store, if one is being tracked.
	last_store: Option<StmtId>,
	/// True iff `last_store` reaches the cursor on every path, which is what licenses
	/// store-forwarding. False once it came out of divergent branches.
	last_store_valid: bool,
	/// Has `last_store` been loaded since it was recorded? If not, it's a dead store.
	last_store_loaded: bool,

	/// The most recent atomic update, if one is being tracked.
	last_atomic: Option<StmtId>,
	/// Can `last_atomic` go away, provided nothing references its result?
	last_atomic_eliminable: bool,

	loop_ctx: LoopCtx,
}

impl SlotState {
	fn new() -> Self {
		Self {
			stored:                 false,
			loaded:                 false,
			last_store:             None,
			last_store_valid:       false,
			last_store_loaded:      false,
			last_atomic:            None,
			last_atomic_eliminable: false,
			loop_ctx:               LoopCtx::Outside,
		}
	}
}

// ------------------------------------------------------------------------------------------------
// Branch merging
// ------------------------------------------------------------------------------------------------

/// Merges the results of scanning both arms of a branch. `pre` is the state just before the
/// branch; `t` and `f` are what each arm turned its copy of `pre` into (an absent arm hands
/// back `pre` untouched). The loop context is inherited from `pre`: branching can't change an
/// enclosing loop's classification.
pub(crate) fn merge(pre: SlotState, t: SlotState, f: SlotState) -> SlotState {
	let mut ret = pre;

	ret.stored = t.stored || f.stored;
	ret.loaded = t.loaded || f.loaded;

	if !ret.stored {
		// neither arm stored; the pre-branch store bookkeeping carries through untouched.
	} else if t.last_store_valid && f.last_store_valid && t.last_store == f.last_store {
		// both arms end with the same store reaching on every path.
		ret.last_store_valid = true;

		if pre.last_store == t.last_store {
			ret.last_store_loaded =
				pre.last_store_loaded || t.last_store_loaded || f.last_store_loaded;
		} else {
			ret.last_store = t.last_store;
			ret.last_store_loaded = t.last_store_loaded || f.last_store_loaded;
		}
	} else {
		ret.last_store_valid = false;

		if t.last_store == pre.last_store && f.last_store == pre.last_store {
			// the last store didn't change; all that's left to track is whether it can
			// still be eliminated.
			ret.last_store_loaded =
				pre.last_store_loaded || t.last_store_loaded || f.last_store_loaded;
		} else {
			// the last store changed in at least one arm. adopt an arm's store as an
			// elimination candidate if that arm has a fresh, unloaded one; ties go to
			// the true arm so the output is deterministic.
			let t_dead = t.last_store != pre.last_store && t.last_store.is_some()
				&& !t.last_store_loaded;
			let f_dead = f.last_store != pre.last_store && f.last_store.is_some()
				&& !f.last_store_loaded;

			if t_dead {
				ret.last_store = t.last_store;
				ret.last_store_loaded = false;
			} else if f_dead {
				ret.last_store = f.last_store;
				ret.last_store_loaded = false;
			} else {
				ret.last_store = None;
				ret.last_store_loaded = false;
			}
		}
	}

	// the atomic bookkeeping merges the same way, with "eliminable" in place of "loaded".
	if t.last_atomic == pre.last_atomic && f.last_atomic == pre.last_atomic {
		ret.last_atomic_eliminable = pre.last_atomic_eliminable
			&& t.last_atomic_eliminable
			&& f.last_atomic_eliminable;
	} else {
		let t_dead = t.last_atomic != pre.last_atomic && t.last_atomic.is_some()
			&& t.last_atomic_eliminable;
		let f_dead = f.last_atomic != pre.last_atomic && f.last_atomic.is_some()
			&& f.last_atomic_eliminable;

		if t_dead {
			ret.last_atomic = t.last_atomic;
			ret.last_atomic_eliminable = true;
		} else if f_dead {
			ret.last_atomic = f.last_atomic;
			ret.last_atomic_eliminable = true;
		} else {
			ret.last_atomic = None;
			ret.last_atomic_eliminable = false;
		}
	}

	ret
}

// ------------------------------------------------------------------------------------------------
// SlotOptimize
// ------------------------------------------------------------------------------------------------

/// Optimizes one slot: scans forward from its declaration, forwarding loads where a unique
/// store provably reaches them, and finally eliminates whatever write/declaration the scan
/// proved dead. Any edit aborts the scan with `Change::Mutated`.
pub(crate) struct SlotOptimize<'ir> {
	tree:  &'ir mut IrTree,
	slot:  StmtId,
	ty:    ValType,
	state: SlotState,
}

impl<'ir> SlotOptimize<'ir> {
	pub(crate) fn new(tree: &'ir mut IrTree, slot: StmtId) -> Self {
		let ty = tree.stmt(slot).alloca_type().expect("SlotOptimize on a non-alloca");

		Self {
			tree,
			slot,
			ty,
			state: SlotState::new(),
		}
	}

	/// Scans everything after the slot's declaration in its owning block, then tries the
	/// end-of-scan eliminations.
	pub(crate) fn run(mut self) -> IrResult<Change> {
		let block = self.tree.stmt(self.slot).block();
		let pos = self.tree.block(block).position(self.slot)
			.expect("slot not in its owning block");

		let stmts = self.tree.block(block).stmts()[pos + 1 ..].to_vec();

		for id in stmts {
			if self.scan_stmt(id)?.mutated() {
				return Ok(Change::Mutated);
			}
		}

		// the last store is never loaded afterwards: it's dead. (`last_store_valid` being
		// false just means it sits in a branch arm; dead either way.)
		if let Some(store) = self.state.last_store {
			if !self.state.last_store_loaded {
				trace!("erasing dead store {:?} of slot {:?}", store, self.slot);
				self.tree.erase(store);
				return Ok(Change::Mutated);
			}
		}

		// the slot's value is never loaded back out of the last atomic update; if nothing
		// references the update's result either, it can go too.
		if let Some(atomic) = self.state.last_atomic {
			if self.state.last_atomic_eliminable {
				let uses = self.tree
					.gather_statements(block, |s| s.kind().has_operand(atomic));

				if uses.is_empty() {
					trace!("erasing dead atomic {:?} on slot {:?}", atomic, self.slot);
					self.tree.erase(atomic);
					return Ok(Change::Mutated);
				}
			}
		}

		// never stored, never loaded: the declaration itself is dead.
		if !self.state.stored && !self.state.loaded {
			trace!("erasing unused slot {:?}", self.slot);
			self.tree.erase(self.slot);
			return Ok(Change::Mutated);
		}

		Ok(Change::Unchanged)
	}

	fn scan_block(&mut self, block: BlockId) -> IrResult<Change> {
		let stmts = self.tree.block(block).stmts().to_vec();

		for id in stmts {
			if self.scan_stmt(id)?.mutated() {
				return Ok(Change::Mutated);
			}
		}

		Ok(Change::Unchanged)
	}

	fn scan_stmt(&mut self, id: StmtId) -> IrResult<Change> {
		use StmtKind::*;

		let kind = self.tree.stmt(id).kind().clone();

		match kind {
			LocalStore { slot, .. } if slot == self.slot => {
				self.state.stored = true;
				self.state.last_store = Some(id);
				self.state.last_store_valid = true;
				self.state.last_store_loaded = false;
				// a newer store supersedes any pending atomic bookkeeping.
				self.state.last_atomic = None;
				self.state.last_atomic_eliminable = false;
				Ok(Change::Unchanged)
			}

			AtomicOp { slot, .. } if slot == self.slot => {
				self.state.stored = true;
				self.state.loaded = true;
				self.state.last_store = None;
				self.state.last_store_valid = false;
				self.state.last_store_loaded = false;
				self.state.last_atomic = Some(id);
				self.state.last_atomic_eliminable = true;
				Ok(Change::Unchanged)
			}

			LocalLoad { lanes } => self.scan_load(id, &lanes),

			If { then_b, else_b, .. } => self.scan_branch(then_b, else_b),

			WhileLoop { body } => self.scan_loop(id, body, false),

			RangeFor { var, body, .. } => self.scan_loop(id, body, var == Some(self.slot)),

			StructFor { ref vars, body } => {
				let is_var = vars.contains(&self.slot);
				self.scan_loop(id, body, is_var)
			}

			// every remaining kind neither touches the slot nor bears blocks; it's
			// transparent to this slot's state. block-bearing kinds must never fall
			// through to here unhandled.
			kind => {
				if kind.is_container() {
					Err(IrError::unhandled_container(id))
				} else {
					Ok(Change::Unchanged)
				}
			}
		}
	}

	// --------------------------------------------------------------------------------------------

	fn scan_load(&mut self, id: StmtId, lanes: &[LanePtr]) -> IrResult<Change> {
		// regular: every lane reads this slot at its own index, i.e. the slot's full
		// natural-width value in order. anything else is an opaque read.
		let mut regular = true;

		for (i, lane) in lanes.iter().enumerate() {
			if lane.offset != i || lane.slot != self.slot {
				regular = false;
			}

			if lane.slot == self.slot {
				self.state.loaded = true;

				if self.state.last_store.is_some() {
					self.state.last_store_loaded = true;
				}

				if self.state.last_atomic.is_some() {
					// the atomic's result may now feed other readers; keep it.
					self.state.last_atomic_eliminable = false;
				}
			}
		}

		if !regular {
			return Ok(Change::Unchanged);
		}

		if !self.state.stored && self.state.loop_ctx != LoopCtx::MayStore {
			// provably never written on any path to here, so the value is the type's
			// default: zero.
			trace!("rewriting load {:?} of slot {:?} to zero", id, self.slot);

			let zero = self.tree.insert_after(id, StmtKind::Const {
				ty:    self.ty,
				width: lanes.len(),
				val:   0,
			});

			self.tree.replace_uses(id, zero);
			self.tree.erase(id);
			return Ok(Change::Mutated);
		}

		if self.state.last_store_valid {
			// store-forwarding. a valid last store is always an actual store.
			let store = self.state.last_store.expect("valid last_store");

			let val = match *self.tree.stmt(store).kind() {
				StmtKind::LocalStore { val, .. } => val,
				_ => panic!("last_store {:?} of slot {:?} is not a store", store, self.slot),
			};

			trace!("forwarding load {:?} of slot {:?} to {:?}", id, self.slot, val);

			self.tree.replace_uses(id, val);
			self.tree.erase(id);
			return Ok(Change::Mutated);
		}

		Ok(Change::Unchanged)
	}

	fn scan_branch(&mut self, then_b: Option<BlockId>, else_b: Option<BlockId>)
	-> IrResult<Change> {
		let pre = self.state;

		let mut t = pre;
		let mut f = pre;

		if let Some(b) = then_b {
			self.state = pre;

			if self.scan_block(b)?.mutated() {
				return Ok(Change::Mutated);
			}

			t = self.state;
		}

		if let Some(b) = else_b {
			self.state = pre;

			if self.scan_block(b)?.mutated() {
				return Ok(Change::Mutated);
			}

			f = self.state;
		}

		self.state = merge(pre, t, f);
		Ok(Change::Unchanged)
	}

	fn scan_loop(&mut self, id: StmtId, body: BlockId, is_loop_var: bool) -> IrResult<Change> {
		if is_loop_var && self.state.loop_ctx != LoopCtx::Outside {
			// an enclosing loop already put the cursor inside a loop; the same slot can't
			// be bound again below it.
			return Err(IrError::nested_loop_binding(id));
		}

		let pre = self.state;

		// first pass: fresh state, assuming the body may store the slot. if an enclosing
		// analysis already proved this loop nest store-free, that still holds here.
		let mut inner = SlotState::new();
		inner.loop_ctx = match pre.loop_ctx {
			LoopCtx::NoStores => LoopCtx::NoStores,
			_                 => LoopCtx::MayStore,
		};

		self.state = inner;

		if self.scan_block(body)?.mutated() {
			return Ok(Change::Mutated);
		}

		let body_r = self.state;

		let mut out = pre;
		out.stored = pre.stored || body_r.stored;
		out.loaded = pre.loaded || body_r.loaded;

		if is_loop_var {
			// the loop binding mechanism owns this slot; no optimization for it at all.
			out.stored = true;
			out.loaded = true;
			out.last_store = None;
			out.last_store_valid = false;
			out.last_store_loaded = false;
			out.last_atomic = None;
			out.last_atomic_eliminable = false;
		} else if !body_r.stored {
			// the body never stores the slot, so values from before the loop survive every
			// iteration. if the body loads the slot and this wasn't already known, re-scan
			// it with that knowledge: loads inside may now forward to the pre-loop value
			// (or to zero). the re-scan's summary is discarded, since by construction it
			// can't introduce stores, and the pre-loop bookkeeping stands.
			let rescan = body_r.loaded
				&& pre.loop_ctx != LoopCtx::NoStores
				&& ((!pre.stored && pre.loop_ctx != LoopCtx::MayStore) || pre.last_store_valid);

			if rescan {
				let mut again = out;
				again.loop_ctx = LoopCtx::NoStores;
				self.state = again;

				if self.scan_block(body)?.mutated() {
					return Ok(Change::Mutated);
				}
			}
		} else {
			// the body stores the slot, but may run zero times: its last store reaches
			// here on *some* path only.
			out.last_store = body_r.last_store;
			out.last_store_valid = false;
			out.last_atomic = body_r.last_atomic;

			if body_r.loaded {
				// the body's own loads may consume them; hands off.
				out.last_store_loaded = true;
				out.last_atomic_eliminable = false;
			} else {
				out.last_store_loaded = false;
				out.last_atomic_eliminable = true;
			}
		}

		self.state = out;
		Ok(Change::Unchanged)
	}
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

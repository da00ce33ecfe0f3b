
use std::collections::{ HashSet };

use log::*;

use crate::ir::{ BlockId, IrResult, IrTree, StmtId, StmtKind };

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod slot;

pub(crate) use slot::*;

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Change
// ------------------------------------------------------------------------------------------------

/// Did a scan edit the tree? Mutation is the pass's normal working signal, not a fault;
/// every caller checks it and unwinds to the driver, which restarts its sweep.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Change {
	Unchanged,
	Mutated,
}

impl Change {
	/// `true` if this is `Mutated`.
	pub fn mutated(&self) -> bool {
		matches!(self, Change::Mutated)
	}
}

// ------------------------------------------------------------------------------------------------
// optimize_local_slots
// ------------------------------------------------------------------------------------------------

/// Eliminates redundant loads and stores of every slot declared in `tree`, removing slot
/// declarations entirely where possible. Mutates the tree in place; running it a second time
/// on its own output performs zero mutations.
pub fn optimize_local_slots(tree: &mut IrTree) -> IrResult<()> {
	let mut sweeps = 0;

	loop {
		sweeps += 1;

		if !sweep(tree)?.mutated() {
			break;
		}
	}

	debug!("local slot optimization reached fixed point after {} sweep(s)", sweeps);
	Ok(())
}

// ------------------------------------------------------------------------------------------------
// Sweeping
// ------------------------------------------------------------------------------------------------

/// One top-down traversal of the whole tree, running the per-slot optimizer on every slot
/// declaration it discovers. Stops at the first mutation: structural edits invalidate block
/// positions, so the driver restarts from the root rather than trusting them.
pub(crate) fn sweep(tree: &mut IrTree) -> IrResult<Change> {
	// fresh each sweep; keyed by stable statement identity.
	let mut done = HashSet::new();
	let root = tree.root();
	sweep_block(tree, root, &mut done)
}

fn sweep_block(tree: &mut IrTree, block: BlockId, done: &mut HashSet<StmtId>)
-> IrResult<Change> {
	let stmts = tree.block(block).stmts().to_vec();

	for id in stmts {
		if matches!(tree.stmt(id).kind(), StmtKind::Alloca { .. }) {
			if done.insert(id) && SlotOptimize::new(tree, id).run()?.mutated() {
				trace!("sweep aborted by mutation while optimizing slot {:?}", id);
				return Ok(Change::Mutated);
			}

			continue;
		}

		let mut subs = vec![];
		tree.stmt(id).kind().visit_blocks(|b| subs.push(b));

		for b in subs {
			if sweep_block(tree, b, done)?.mutated() {
				return Ok(Change::Mutated);
			}
		}
	}

	Ok(Change::Unchanged)
}

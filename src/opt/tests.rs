
use super::*;
use crate::ir::*;

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

fn allocas(tree: &IrTree) -> Vec<StmtId> {
	tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::Alloca { .. }))
}

fn stores(tree: &IrTree) -> Vec<StmtId> {
	tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::LocalStore { .. }))
}

fn loads(tree: &IrTree) -> Vec<StmtId> {
	tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::LocalLoad { .. }))
}

fn atomics(tree: &IrTree) -> Vec<StmtId> {
	tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::AtomicOp { .. }))
}

fn print_args(tree: &IrTree) -> Vec<StmtId> {
	tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::Print { .. }))
		.into_iter()
		.map(|id| match *tree.stmt(id).kind() {
			StmtKind::Print { arg } => arg,
			_ => unreachable!(),
		})
		.collect()
}

#[track_caller]
fn assert_fixed_point(tree: &mut IrTree) {
	assert_eq!(sweep(tree).unwrap(), Change::Unchanged);
}

#[track_caller]
fn assert_zero_const(tree: &IrTree, id: StmtId, ty: ValType) {
	match *tree.stmt(id).kind() {
		StmtKind::Const { ty: t, val, .. } => {
			assert_eq!(t, ty);
			assert_eq!(val, 0);
		}
		ref k => panic!("expected a constant, got {:?}", k),
	}
}

// ------------------------------------------------------------------------------------------------
// Zero-default loads
// ------------------------------------------------------------------------------------------------

#[test]
fn zero_default_load() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let ld = b.load(a);
	b.print(ld);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the load of a never-written slot became a zero constant, and with nothing left
	// touching it, the declaration went too.
	assert!(loads(&tree).is_empty());
	assert!(allocas(&tree).is_empty());

	let args = print_args(&tree);
	assert_eq!(args.len(), 1);
	assert_zero_const(&tree, args[0], ValType::I32);

	assert_fixed_point(&mut tree);
}

#[test]
fn zero_default_load_in_store_free_loop() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::F32);
	b.while_loop(|b| {
		let ld = b.load(a);
		b.print(ld);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the loop never stores the slot, so the second-pass re-scan rewrites the load inside
	// the body even though the loop runs an unknown number of times.
	assert!(loads(&tree).is_empty());
	assert!(allocas(&tree).is_empty());

	let args = print_args(&tree);
	assert_eq!(args.len(), 1);
	assert_zero_const(&tree, args[0], ValType::F32);
}

// ------------------------------------------------------------------------------------------------
// Store-forwarding
// ------------------------------------------------------------------------------------------------

#[test]
fn store_forwarding() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 7);
	b.store(a, v);
	let ld = b.load(a);
	b.print(ld);
	let mut tree = b.finish();

	// the first sweep does exactly one thing: forwards the load. the store was observed by
	// the load, so it survives this sweep.
	assert_eq!(sweep(&mut tree).unwrap(), Change::Mutated);
	assert!(loads(&tree).is_empty());
	assert_eq!(stores(&tree).len(), 1);
	assert_eq!(print_args(&tree), vec![v]);

	// with its only reader forwarded away, later sweeps find the store (and then the
	// declaration) dead.
	optimize_local_slots(&mut tree).unwrap();
	assert!(stores(&tree).is_empty());
	assert!(allocas(&tree).is_empty());
	assert_eq!(print_args(&tree), vec![v]);

	assert_fixed_point(&mut tree);
}

#[test]
fn forwarding_blocked_by_storing_loop() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	b.store(a, v1);
	b.while_loop(|b| {
		b.store(a, v2);
	});
	let ld = b.load(a);
	b.print(ld);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the loop may run zero times, so neither store uniquely reaches the load; it has to
	// stay a real load, which in turn keeps both stores alive.
	assert_eq!(loads(&tree).len(), 1);
	assert_eq!(stores(&tree).len(), 2);
	assert_eq!(allocas(&tree).len(), 1);
}

// ------------------------------------------------------------------------------------------------
// Dead stores and declarations
// ------------------------------------------------------------------------------------------------

#[test]
fn dead_store_cascade() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	let s1 = b.store(a, v1);
	let s2 = b.store(a, v2);
	b.print(v1);
	let mut tree = b.finish();

	// nothing ever reads the slot, so the scan's tracked (i.e. final) store dies first...
	assert_eq!(sweep(&mut tree).unwrap(), Change::Mutated);
	assert!(!tree.contains(s2));
	assert!(tree.contains(s1));

	// ...then the restart discovers the earlier store dead, and finally the declaration.
	optimize_local_slots(&mut tree).unwrap();
	assert!(stores(&tree).is_empty());
	assert!(allocas(&tree).is_empty());

	// unrelated statements are untouched; this pass does not collect dead values.
	assert_eq!(print_args(&tree), vec![v1]);
	assert!(tree.contains(v2));
}

#[test]
fn dead_declaration() {
	let mut b = IrBuilder::new();
	b.alloca(ValType::I64);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();
	assert!(allocas(&tree).is_empty());
	assert_eq!(tree.stmt_count(), 0);
}

#[test]
fn dead_store_inside_branch_arm() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	let cond = b.const_(ValType::I32, 1);
	b.store(a, v1);
	b.if_then(cond, |b| {
		b.store(a, v2);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the branch-arm store is adopted as the elimination candidate and erased, then the
	// unconditional store, then the declaration. the branch itself stays.
	assert!(stores(&tree).is_empty());
	assert!(allocas(&tree).is_empty());
	assert_eq!(
		tree.gather_statements(tree.root(), |s| matches!(s.kind(), StmtKind::If { .. })).len(),
		1);
}

#[test]
fn dead_store_inside_unread_storing_loop() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 9);
	b.while_loop(|b| {
		b.store(a, v);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// nothing inside or after the loop reads the slot, so even the loop-carried store is
	// dead, and then so is the slot.
	assert!(stores(&tree).is_empty());
	assert!(allocas(&tree).is_empty());
}

// ------------------------------------------------------------------------------------------------
// Branch merging
// ------------------------------------------------------------------------------------------------

#[test]
fn branch_merge_is_conservative() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	let cond = b.const_(ValType::I32, 1);
	b.store(a, v1);
	b.if_then(cond, |b| {
		b.store(a, v2);
	});
	let ld = b.load(a);
	b.print(ld);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// two different stores reach the load, so it must not be forwarded to either; the
	// whole body is already at its fixed point.
	assert_eq!(loads(&tree).len(), 1);
	assert_eq!(stores(&tree).len(), 2);
	assert_eq!(allocas(&tree).len(), 1);
	assert_eq!(print_args(&tree), vec![ld]);
}

#[test]
fn branch_same_store_reaching_both_arms() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 5);
	let cond = b.const_(ValType::I32, 1);
	b.store(a, v);
	b.if_then_else(
		cond,
		|b| { b.print(v); },
		|b| { b.print(v); },
	);
	let ld = b.load(a);
	b.print(ld);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// neither arm touches the slot, so the pre-branch store still uniquely reaches the
	// load and forwarding goes through.
	assert!(loads(&tree).is_empty());
	assert_eq!(print_args(&tree), vec![v, v, v]);
}

// ------------------------------------------------------------------------------------------------
// Loops
// ------------------------------------------------------------------------------------------------

#[test]
fn loop_reanalysis_forwards_preloop_store() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 7);
	b.store(a, v);
	b.while_loop(|b| {
		let ld1 = b.load(a);
		b.print(ld1);
		let ld2 = b.load(a);
		b.print(ld2);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the body never stores the slot, so the proven-no-store re-scan forwards both loads
	// to the value stored before the loop; after that the store and slot are dead.
	assert!(loads(&tree).is_empty());
	assert!(stores(&tree).is_empty());
	assert!(allocas(&tree).is_empty());
	assert_eq!(print_args(&tree), vec![v, v]);

	assert_fixed_point(&mut tree);
}

#[test]
fn range_loop_var_is_left_alone() {
	let mut b = IrBuilder::new();
	let i = b.alloca(ValType::I32);
	let lo = b.const_(ValType::I32, 0);
	let hi = b.const_(ValType::I32, 10);
	b.range_for(Some(i), lo, hi, |b| {
		let ld = b.load(i);
		b.print(ld);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the loop binding mechanism owns the slot; no rewrite, no elimination.
	assert_eq!(loads(&tree).len(), 1);
	assert_eq!(allocas(&tree).len(), 1);
}

#[test]
fn struct_loop_var_is_left_alone() {
	let mut b = IrBuilder::new();
	let i = b.alloca(ValType::I32);
	let one = b.const_(ValType::I32, 1);
	b.struct_for(&[i], |b| {
		b.atomic(AtomicKind::Add, i, one);
	});
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	assert_eq!(atomics(&tree).len(), 1);
	assert_eq!(allocas(&tree).len(), 1);
}

#[test]
fn rebinding_inside_enclosing_loop_is_an_error() {
	let mut b = IrBuilder::new();
	let i = b.alloca(ValType::I32);
	let lo = b.const_(ValType::I32, 0);
	let hi = b.const_(ValType::I32, 4);
	b.while_loop(|b| {
		b.range_for(Some(i), lo, hi, |_| {});
	});
	let mut tree = b.finish();

	let err = optimize_local_slots(&mut tree).unwrap_err();
	assert_eq!(err.kind, IrErrorKind::NestedLoopBinding);
}

// ------------------------------------------------------------------------------------------------
// Atomics
// ------------------------------------------------------------------------------------------------

#[test]
fn atomic_removed_when_result_unused() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 1);
	b.atomic(AtomicKind::Add, a, v);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the slot is never loaded afterwards and nothing uses the update's result.
	assert!(atomics(&tree).is_empty());
	assert!(allocas(&tree).is_empty());
}

#[test]
fn atomic_kept_when_result_used() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 1);
	let at = b.atomic(AtomicKind::Add, a, v);
	b.print(at);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the slot is never loaded again, but the update's result is an operand elsewhere.
	assert_eq!(atomics(&tree).len(), 1);
	assert_eq!(allocas(&tree).len(), 1);
	assert_eq!(print_args(&tree), vec![at]);
}

#[test]
fn store_supersedes_atomic_bookkeeping() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 1);
	let w = b.const_(ValType::I32, 2);
	let at = b.atomic(AtomicKind::Add, a, v);
	b.store(a, w);
	b.print(at);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the store after the atomic is dead; the atomic itself survives because its result
	// is referenced.
	assert!(stores(&tree).is_empty());
	assert_eq!(atomics(&tree).len(), 1);
	assert_eq!(print_args(&tree), vec![at]);
}

// ------------------------------------------------------------------------------------------------
// Irregular loads
// ------------------------------------------------------------------------------------------------

#[test]
fn irregular_load_reads_but_never_rewrites() {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 7);
	b.store(a, v);
	let ld = b.load_lanes(&[(a, 1)]);
	b.print(ld);
	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();

	// the permuted load counts as a read (keeping the store alive) but is never forwarded.
	assert_eq!(loads(&tree).len(), 1);
	assert_eq!(stores(&tree).len(), 1);
	assert_eq!(print_args(&tree), vec![ld]);
}

// ------------------------------------------------------------------------------------------------
// Fixed point
// ------------------------------------------------------------------------------------------------

#[test]
fn fixed_point_on_mixed_body() {
	let mut b = IrBuilder::new();

	// a forwardable slot, an ambiguous one, an atomic counter, and a loop var all at once.
	let x = b.alloca(ValType::I32);
	let y = b.alloca(ValType::I32);
	let n = b.alloca(ValType::I32);
	let i = b.alloca(ValType::I32);

	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	let lo = b.const_(ValType::I32, 0);
	let hi = b.const_(ValType::I32, 8);

	b.store(x, v1);
	b.store(y, v1);

	b.range_for(Some(i), lo, hi, |b| {
		let iv = b.load(i);
		b.print(iv);

		let xv = b.load(x);
		let nx = b.unary(UnOp::Neg, xv);
		b.print(nx);

		b.atomic(AtomicKind::Add, n, v1);
	});

	let cond = b.const_(ValType::I32, 1);
	b.if_then(cond, |b| {
		b.store(y, v2);
	});

	let yv = b.load(y);
	b.print(yv);

	let nv = b.load(n);
	b.print(nv);

	let mut tree = b.finish();

	optimize_local_slots(&mut tree).unwrap();
	let count = tree.stmt_count();

	// the pass is idempotent at its own fixed point.
	assert_fixed_point(&mut tree);
	optimize_local_slots(&mut tree).unwrap();
	assert_eq!(tree.stmt_count(), count);

	// spot checks: x's load was forwarded inside the store-free loop and x collapsed;
	// y stayed ambiguous; the counter's atomic is read afterwards, so it stays.
	assert!(!tree.contains(x));
	assert_eq!(allocas(&tree).len(), 3);
	assert_eq!(atomics(&tree).len(), 1);
}

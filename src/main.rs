
use log::*;
use simplelog::{ Config, LevelFilter, TermLogger, TerminalMode };

use slotopt::*;

fn main() {
	better_panic::install();
	TermLogger::init(LevelFilter::Trace, Config::default(), TerminalMode::Mixed).unwrap();

	demo("store forwarding", forwarding_demo());
	demo("zero-default load in a loop", loop_demo());
	demo("dead stores", dead_store_demo());
	demo("atomic counter", atomic_demo());
}

fn demo(name: &str, mut tree: IrTree) {
	println!("=== {} ===", name);
	println!("before:");
	print!("{:?}", tree);

	match optimize_local_slots(&mut tree) {
		Ok(()) => {
			println!("after:");
			print!("{:?}", tree);
		}
		Err(e) => error!("{}", e),
	}

	println!();
}

fn forwarding_demo() -> IrTree {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v = b.const_(ValType::I32, 7);
	b.store(a, v);
	let ld = b.load(a);
	let sum = b.binary(BinOp::Add, ld, v);
	let neg = b.unary(UnOp::Neg, sum);
	b.print(neg);
	b.finish()
}

fn loop_demo() -> IrTree {
	let mut b = IrBuilder::new();
	let acc = b.alloca(ValType::F32);
	let i = b.alloca(ValType::I32);
	let lo = b.const_(ValType::I32, 0);
	let hi = b.const_(ValType::I32, 16);
	b.range_for(Some(i), lo, hi, |b| {
		let cur = b.load(acc);
		b.print(cur);
	});
	b.finish()
}

fn dead_store_demo() -> IrTree {
	let mut b = IrBuilder::new();
	let a = b.alloca(ValType::I32);
	let v1 = b.const_(ValType::I32, 1);
	let v2 = b.const_(ValType::I32, 2);
	b.store(a, v1);
	b.store(a, v2);
	b.finish()
}

fn atomic_demo() -> IrTree {
	let mut b = IrBuilder::new();
	let n = b.alloca(ValType::I32);
	let one = b.const_(ValType::I32, 1);
	let cond = b.const_(ValType::I32, 1);
	b.if_then_else(
		cond,
		|b| { b.atomic(AtomicKind::Add, n, one); },
		|b| { b.atomic(AtomicKind::Sub, n, one); },
	);
	b.finish()
}

use std::collections::{HashMap, HashSet};

use crate::loops::{
	loop2cilk::Loop2Cilk, loop_data::LoopData, loop_simplify::LoopSimplify,
};
use tapir::{
	prelude::{TirFunc, TirProgram},
	tapir_loop::LoopPtr,
};
use tir::TirTempManager;
use utils::Result;

use super::HandleLoops;

// Innermost loops first; the artificial root is dropped.
fn loops_post_order(root: &LoopPtr) -> Vec<LoopPtr> {
	let mut dfs_vec = Vec::new();
	fn dfs(node: LoopPtr, dfs_vec: &mut Vec<LoopPtr>) {
		for subloop in node.borrow().subloops.iter() {
			dfs(subloop.clone(), dfs_vec);
		}
		dfs_vec.push(node);
	}
	dfs(root.clone(), &mut dfs_vec);
	dfs_vec.pop();
	dfs_vec
}

impl HandleLoops {
	pub fn new(program: &mut TirProgram) -> Self {
		let mut loopdatas = HashMap::new();
		program.funcs.iter_mut().for_each(|func| {
			loopdatas.insert(func.name.clone(), LoopData::new(func));
		});
		Self { loopdatas }
	}

	pub fn loop_simplify(&mut self, program: &mut TirProgram) -> Result<bool> {
		fn solve(
			func: &mut TirFunc,
			loop_data: &mut LoopData,
			temp_mgr: &mut TirTempManager,
		) -> bool {
			let opter = LoopSimplify::new(func, loop_data, temp_mgr);
			opter.apply()
		}

		let TirProgram { funcs, temp_mgr } = program;
		Ok(funcs.iter_mut().fold(false, |last, func| {
			solve(func, self.loopdatas.get_mut(&func.name).unwrap(), temp_mgr)
				|| last
		}))
	}

	// The subject pass: rewrite every recognized detach/sync loop into a
	// call to the parallel-for runtime, innermost loops first.
	pub fn loop_to_cilk(&mut self, program: &mut TirProgram) -> Result<bool> {
		let mut changed = false;
		let mut extracted: Vec<TirFunc> = Vec::new();
		let TirProgram { funcs, temp_mgr } = program;
		for func in funcs.iter_mut() {
			let loopdata = self.loopdatas.get_mut(&func.name).unwrap();
			*loopdata = LoopData::new(func);
			// Headers already attempted; a rejected loop stays rejected and
			// a rewritten one no longer exists.
			let mut tried: HashSet<i32> = HashSet::new();
			loop {
				let candidates = loops_post_order(&loopdata.root_loop);
				let mut local_change = false;
				for loop_ in candidates {
					let header_id = loop_.borrow().header.borrow().id;
					if !tried.insert(header_id) {
						continue;
					}
					let mut solver =
						Loop2Cilk::new(func, loopdata, temp_mgr, &mut extracted);
					let rewritten = solver.run_on_loop(loop_)?;
					changed |= rewritten;
					// Even a rejected attempt may have canonicalized parts of
					// the loop; rebuild the per-function analyses before
					// looking at the next candidate.
					*loopdata = LoopData::new(func);
					local_change = true;
					break;
				}
				if !local_change {
					break;
				}
			}
		}
		for mut func in extracted {
			let data = LoopData::new(&mut func);
			self.loopdatas.insert(func.name.clone(), data);
			funcs.push(func);
		}
		Ok(changed)
	}
}

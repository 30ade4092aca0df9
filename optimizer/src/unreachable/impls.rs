use std::collections::HashSet;

use super::RemoveUnreachCode;
use crate::TapirOptimizer;
use tapir::prelude::{TirFunc, TirProgram};
use utils::errors::Result;

// Drop every block the entry cannot reach, then prune the edges and phi
// sources that pointed at them.
pub fn remove_unreachable_blocks(func: &mut TirFunc) -> bool {
	let size = func.cfg.size();
	let mut visited = HashSet::new();
	let mut stack = vec![func.cfg.get_entry()];
	while let Some(u) = stack.pop() {
		let id = u.borrow().id;
		if !visited.insert(id) {
			continue;
		}
		for v in u.borrow().succ.iter() {
			if !visited.contains(&v.borrow().id) {
				stack.push(v.clone())
			}
		}
	}

	func.cfg.blocks.retain(|v| {
		visited.contains(&v.borrow().id) || {
			v.borrow_mut().clear();
			false
		}
	});
	for block in func.cfg.blocks.iter() {
		block
			.borrow_mut()
			.succ
			.retain(|v| visited.contains(&v.borrow().id));
	}
	func.cfg.resolve_prev();
	size != func.cfg.size()
}

impl TapirOptimizer for RemoveUnreachCode {
	fn new() -> Self {
		Self {}
	}
	fn apply(self, program: &mut TirProgram) -> Result<bool> {
		Ok(
			program
				.funcs
				.iter_mut()
				.fold(false, |last, func| remove_unreachable_blocks(func) || last),
		)
	}
}

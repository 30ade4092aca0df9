use tapir::prelude::TirProgram;
use utils::errors::Result;

use crate::{
	HandleLoops, Mem2Reg, Optimizer0, Optimizer1, RemoveUnreachCode,
	TapirOptimizer,
};

impl Optimizer0 {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn apply(self, program: &mut TirProgram) -> Result<()> {
		loop {
			let mut flag = false;
			flag |= RemoveUnreachCode::new().apply(program)?;
			if !flag {
				break;
			}
		}
		Ok(())
	}
}

impl Optimizer1 {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn apply(self, program: &mut TirProgram) -> Result<()> {
		Mem2Reg::new().apply(program)?;
		RemoveUnreachCode::new().apply(program)?;
		let mut handle_loops = HandleLoops::new(program);
		loop {
			let mut flag = false;
			flag |= handle_loops.loop_simplify(program)?;
			flag |= handle_loops.loop_to_cilk(program)?;
			flag |= RemoveUnreachCode::new().apply(program)?;
			if !flag {
				break;
			}
			handle_loops = HandleLoops::new(program);
		}
		Ok(())
	}
}

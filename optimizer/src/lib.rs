mod impls;
mod loops;
mod mem2reg;
mod unreachable;

use tapir::prelude::TirProgram;
use utils::errors::Result;

pub use loops::HandleLoops;
pub use mem2reg::Mem2Reg;
pub use unreachable::RemoveUnreachCode;

pub trait TapirOptimizer {
	fn new() -> Self;
	fn apply(self, program: &mut TirProgram) -> Result<bool>;
}

#[derive(Default)]
pub struct Optimizer0 {}

#[derive(Default)]
pub struct Optimizer1 {}

use tir::{Value, VarType};
use utils::math::increment;

use crate::{basicblock::BasicBlock, cfg::CFG};

pub struct TirFunc {
	pub total: i32,
	pub cfg: CFG,
	pub name: String,
	pub ret_type: VarType,
	pub params: Vec<Value>,
}

impl TirFunc {
	pub fn new(
		cfg: CFG,
		name: String,
		ret_type: VarType,
		params: Vec<Value>,
	) -> Self {
		let total =
			cfg.blocks.iter().map(|v| v.borrow().id).max().unwrap_or(0);
		Self {
			total,
			cfg,
			name,
			ret_type,
			params,
		}
	}
	pub fn new_basicblock(&mut self, weight: f64) -> BasicBlock {
		BasicBlock::new(increment(&mut self.total), weight)
	}
}

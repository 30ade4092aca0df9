use tir::TirTempManager;

use crate::func::TirFunc;

pub struct TirProgram {
	pub funcs: Vec<TirFunc>,
	pub temp_mgr: TirTempManager,
}

impl TirProgram {
	pub fn new(temp_mgr: TirTempManager) -> Self {
		Self {
			funcs: Vec::new(),
			temp_mgr,
		}
	}
	pub fn make_pretty(&mut self) {
		self.funcs.iter_mut().for_each(|v| v.cfg.make_pretty());
	}
}

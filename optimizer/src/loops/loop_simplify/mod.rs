pub mod impls;

use tapir::prelude::TirFunc;
use tir::TirTempManager;

use super::loop_data::LoopData;

pub struct LoopSimplify<'a> {
	pub func: &'a mut TirFunc,
	pub loopdata: &'a mut LoopData,
	pub temp_mgr: &'a mut TirTempManager,
}

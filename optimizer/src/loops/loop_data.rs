use std::collections::HashMap;

use tapir::{
	prelude::TirFunc,
	tapir_loop::{LoopMap, LoopPtr},
	TirNode,
};
use tir::{TirTemp, Value};
use utils::UseTemp;

pub struct LoopData {
	// 每个 basicblock 属于哪个循环
	pub loop_map: LoopMap,
	// 每个变量在哪个基本块中被定义
	pub def_map: HashMap<TirTemp, TirNode>,
	// 循环树的根
	pub root_loop: LoopPtr,
	// Canonical trip counts once a loop has been recognized; this is the
	// cache the rewrite must forget when it destroys the loop.
	pub loop_infos: HashMap<u32, Value>,
}

impl LoopData {
	pub fn new(func: &mut TirFunc) -> Self {
		let def_map = Self::build_def_map(func);
		let (root_loop, loop_map) = func.cfg.loop_analysis();
		Self {
			loop_map,
			def_map,
			root_loop,
			loop_infos: HashMap::new(),
		}
	}

	pub fn build_def_map(func: &TirFunc) -> HashMap<TirTemp, TirNode> {
		let mut def_map = HashMap::new();
		for bb in func.cfg.blocks.iter() {
			for inst in bb.borrow().phi_instrs.iter() {
				def_map.insert(inst.target.clone(), bb.clone());
			}
			for inst in bb.borrow().instrs.iter() {
				if let Some(target) = inst.get_write() {
					def_map.insert(target.clone(), bb.clone());
				}
			}
		}
		def_map
	}
}

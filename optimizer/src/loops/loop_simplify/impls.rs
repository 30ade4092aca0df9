use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::debug;
use tapir::{
	cfg::{force_link_node, unlink_node},
	prelude::TirFunc,
	tapir_loop::LoopPtr,
	TirNode,
};
use tir::{JumpInstr, PhiInstr, TirInstrTrait, TirTemp, TirTempManager, Value};
use utils::Label;

use super::super::loop_data::LoopData;
use super::LoopSimplify;

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

impl<'a> LoopSimplify<'a> {
	pub fn new(
		func: &'a mut TirFunc,
		loopdata: &'a mut LoopData,
		temp_mgr: &'a mut TirTempManager,
	) -> Self {
		Self {
			func,
			loopdata,
			temp_mgr,
		}
	}

	// 按 dfs 序逐个 loop 处理
	pub fn apply(mut self) -> bool {
		let mut flag = false;
		let dfs_vec = loops_post_order(&self.loopdata.root_loop);
		for loop_node in dfs_vec.iter() {
			flag |= self.simplify_one_loop(loop_node.clone());
		}

		// Scan over the PHI nodes in the loop headers. Since they now have
		// only two incoming values, we may have simplified a PHI down to
		// 'X = phi [X, Y]', which should be replaced with 'Y'.
		let mut replace_map = HashMap::new();
		for loop_ in dfs_vec.iter() {
			self.simplify_header_phis(loop_.clone(), &mut replace_map);
		}
		if !replace_map.is_empty() {
			debug!("loop_simplify: mapping with {} entries", replace_map.len());
			flag = true;
			for bb in self.func.cfg.blocks.iter() {
				bb.borrow_mut().map_temp(&replace_map);
			}
		}
		flag
	}

	/// Moves the predecessors given in preds away from bb, to a fresh block
	/// that falls through into bb. Returns the new block.
	pub fn split_block_predecessors(
		&mut self,
		bb: TirNode,
		preds: Vec<TirNode>,
		has_loop_exit: bool,
	) -> TirNode {
		assert!(!preds.is_empty());

		let new_bb = Rc::new(RefCell::new(self.func.new_basicblock(1.0)));
		let bb_label = bb.borrow().label();
		let new_label = new_bb.borrow().label();
		let mut label_map = HashMap::new();
		label_map.insert(bb_label, new_label);

		// Move the edges from preds to point to new_bb instead of bb.
		for pred in preds.iter() {
			unlink_node(pred, &bb);
			force_link_node(pred, &new_bb);
			if let Some(term) = pred.borrow_mut().jump_instr.as_mut() {
				term.map_label(&label_map);
			}
		}

		self.update_phi_nodes(bb.clone(), new_bb.clone(), preds, has_loop_exit);

		new_bb
			.borrow_mut()
			.set_jump(Some(JumpInstr::new(bb.borrow().label())));
		force_link_node(&new_bb, &bb);

		let target_pos =
			self.func.cfg.blocks.iter().position(|v| *v == bb).unwrap();
		self.func.cfg.blocks.insert(target_pos, new_bb.clone());

		new_bb
	}

	pub fn update_phi_nodes(
		&mut self,
		bb: TirNode,
		new_bb: TirNode,
		preds: Vec<TirNode>,
		has_loop_exit: bool, // new_bb 是否是某循环的 exit
	) {
		// Create a new PHI node in new_bb for each PHI node in bb.
		for phi in bb.borrow_mut().phi_instrs.iter_mut() {
			// Check to see if all of the values coming in are the same. If
			// so, there is no need for a new PHI, unless it is needed to keep
			// exit values out of the loop.
			let mut in_var = None;
			if !has_loop_exit {
				for pred in preds.iter() {
					let pred = pred.borrow();
					if in_var.is_none() {
						in_var = phi.get_incoming_value_for_block(&pred.label());
					} else if in_var != phi.get_incoming_value_for_block(&pred.label())
					{
						in_var = None;
						break;
					}
				}
			}
			if let Some(v) = in_var {
				phi
					.source
					.retain(|(_, l)| !preds.iter().any(|b| b.borrow().label() == *l));
				phi.source.push((v, new_bb.borrow().label()));
				continue;
			}
			// The values differ; merge them in a new PHI of the new block.
			let new_target = self.temp_mgr.new_temp(phi.var_type, false);
			let new_source = phi
				.source
				.iter()
				.filter(|(_, l)| preds.iter().any(|b| b.borrow().label() == *l))
				.cloned()
				.collect::<Vec<(Value, Label)>>();
			phi
				.source
				.retain(|(_, l)| !preds.iter().any(|b| b.borrow().label() == *l));
			phi
				.source
				.push((Value::Temp(new_target.clone()), new_bb.borrow().label()));

			let new_phi = PhiInstr::new(new_target.clone(), new_source);
			new_bb.borrow_mut().phi_instrs.push(new_phi);
			self.loopdata.def_map.insert(new_target, new_bb.clone());
		}
	}

	/// InsertPreheaderForLoop - once we discover that a loop does not have
	/// a preheader, this method inserts one.
	fn insert_preheader_for_loop(&mut self, loop_: LoopPtr) -> TirNode {
		let loop_brw = loop_.borrow();
		let header_rc = loop_brw.header.clone();
		let mut outside_blocks = Vec::new();
		for prev in header_rc.clone().borrow().prev.iter() {
			if !loop_brw.contains_block(prev.borrow().id, &self.loopdata.loop_map) {
				outside_blocks.push(prev.clone());
			}
		}
		assert!(!outside_blocks.is_empty());
		drop(loop_brw);
		let new_bb = self.split_block_predecessors(header_rc, outside_blocks, false);
		debug!(
			"loop_simplify: inserted preheader block {}",
			new_bb.borrow().label()
		);
		if let Some(o) = loop_.borrow().outer.clone().and_then(|v| v.upgrade()) {
			self.loopdata.loop_map.insert(new_bb.borrow().id, o);
		}
		new_bb
	}

	// Exit blocks must only be entered from inside the loop, so that the
	// loop header dominates them.
	fn form_dedicated_exit_blocks(&mut self, loop_: LoopPtr) -> bool {
		let mut flag = false;
		let loop_blocks = loop_
			.borrow()
			.blocks(&self.func.cfg, &self.loopdata.loop_map);

		let mut exits: Vec<TirNode> = Vec::new();
		for bb in loop_blocks.iter() {
			for succ in bb.borrow().succ.iter() {
				if !loop_blocks.iter().any(|v| v.borrow().id == succ.borrow().id)
					&& !exits.iter().any(|v| v.borrow().id == succ.borrow().id)
				{
					exits.push(succ.clone());
				}
			}
		}
		for exit in exits {
			let mut in_loop_prev = Vec::new();
			let mut is_dedicated_exit = true;
			for prev in exit.borrow().prev.iter() {
				if loop_blocks.iter().any(|v| v.borrow().id == prev.borrow().id) {
					in_loop_prev.push(prev.clone());
				} else {
					is_dedicated_exit = false;
				}
			}
			assert!(!in_loop_prev.is_empty());
			if is_dedicated_exit {
				continue;
			}
			let new_bb = self.split_block_predecessors(exit, in_loop_prev, true);
			debug!(
				"loop_simplify: inserted dedicated exit block {}",
				new_bb.borrow().label()
			);
			if let Some(o) = loop_.borrow().outer.clone().and_then(|v| v.upgrade()) {
				self.loopdata.loop_map.insert(new_bb.borrow().id, o);
			}
			flag = true;
		}
		flag
	}

	fn insert_unique_backedge_block(
		&mut self,
		loop_: LoopPtr,
		preheader: TirNode,
	) -> Option<TirNode> {
		let mut backedge_blocks = Vec::new();
		let header = loop_.borrow().header.clone();
		for prev in header.borrow().prev.iter() {
			if prev.borrow().id != preheader.borrow().id {
				backedge_blocks.push(prev.clone());
			}
		}
		if backedge_blocks.len() <= 1 {
			return None;
		}

		let new_bb = self.split_block_predecessors(header, backedge_blocks, false);
		debug!(
			"loop_simplify: inserted unique backedge block {}",
			new_bb.borrow().label()
		);
		self.loopdata.loop_map.insert(new_bb.borrow().id, loop_.clone());
		Some(new_bb)
	}

	fn simplify_one_loop(&mut self, loop_: LoopPtr) -> bool {
		let mut flag = false;
		// Does the loop already have a preheader? If not, insert one.
		let preheader = loop_
			.borrow()
			.get_loop_preheader(&self.loopdata.loop_map)
			.unwrap_or_else(|| {
				flag = true;
				self.insert_preheader_for_loop(loop_.clone())
			});

		flag |= self.form_dedicated_exit_blocks(loop_.clone());

		// If the header has more than two predecessors at this point, merge
		// the backedges behind a single block.
		flag |=
			self.insert_unique_backedge_block(loop_.clone(), preheader).is_some();
		flag
	}

	fn simplify_header_phis(
		&self,
		loop_: LoopPtr,
		replace_map: &mut HashMap<TirTemp, Value>,
	) {
		let loop_ = loop_.borrow();
		let mut header = loop_.header.borrow_mut();
		if header.prev.len() != 2 {
			debug!("loop_simplify: failed to insert preheader or unique backedge");
			return;
		}
		// 逆向遍历，下标遍历，一边遍历一边删除
		for phi_idx in (0..header.phi_instrs.len()).rev() {
			let target = header.phi_instrs[phi_idx].target.clone();
			let source = header.phi_instrs[phi_idx].source.clone();
			if source.len() != 2 {
				continue;
			}
			if source[0].0.unwrap_temp().is_some_and(|t| t == target) {
				replace_map.insert(target, source[1].0.clone());
				header.phi_instrs.remove(phi_idx);
			} else if source[1].0.unwrap_temp().is_some_and(|t| t == target) {
				replace_map.insert(target, source[0].0.clone());
				header.phi_instrs.remove(phi_idx);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::super::super::loop_data::LoopData;
	use super::*;
	use tapir::builder::build_program;
	use tir::parser::parse;

	#[test]
	fn inserts_preheader_and_dedicated_exit() {
		// the header is entered straight from a conditional branch, and the
		// exit block is shared with a path around the loop
		let src = r#"
define i32 @f(i32 %n) {
	entry:
		%1 = icmp sgt i32 %n, 0
		br i32 %1, label %B1, label %B3
	B1:
		%2 = phi i32 [0, %entry], [%3, %B1]
		%3 = add i32 %2, 1
		%4 = icmp slt i32 %3, %n
		br i32 %4, label %B1, label %B3
	B3:
		%5 = phi i32 [0, %entry], [%3, %B1]
		ret i32 %5
}
"#;
		let mut program = build_program(parse(src).unwrap()).unwrap();
		let func = &mut program.funcs[0];
		let mut loopdata = LoopData::new(func);
		let changed =
			LoopSimplify::new(func, &mut loopdata, &mut program.temp_mgr).apply();
		assert!(changed);
		tapir::verify::verify_func(func).unwrap();
		// the loop header must now have exactly two predecessors
		let header = func.cfg.get_node(1).unwrap();
		assert_eq!(header.borrow().prev.len(), 2);
		// the shared exit is reached from the loop through a dedicated block
		let exit = func.cfg.get_node(3).unwrap();
		for prev in exit.borrow().prev.iter() {
			assert!(prev.borrow().id != 1);
		}
	}
}

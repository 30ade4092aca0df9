use std::{cell::RefCell, rc::Rc};

use crate::{TirNode, CFG};

use super::{Loop, LoopMap, LoopPtr};

impl CFG {
	// Build the loop forest over the dominator tree. Returns the artificial
	// root loop plus a map from block id to its innermost loop; blocks
	// outside every natural loop map to the root.
	pub fn loop_analysis(&mut self) -> (LoopPtr, LoopMap) {
		self.compute_dominator();
		let mut next_id = 1u32;
		loop_dfs(self.get_entry(), self, &mut next_id);

		let root = Rc::new(RefCell::new(Loop::new(0, self.get_entry())));
		let mut loops: Vec<LoopPtr> = Vec::new();
		for bb in self.blocks.iter() {
			if let Some(loop_) = bb.borrow().loop_.clone() {
				if !loops.iter().any(|l| l.borrow().id == loop_.borrow().id) {
					loops.push(loop_);
				}
			}
		}
		// 连接 loop 树：没有外层的 loop 挂到 root 上
		for l in loops.iter() {
			let outer = l.borrow().outer.clone().and_then(|v| v.upgrade());
			match outer {
				Some(o) => o.borrow_mut().subloops.push(l.clone()),
				None => {
					l.borrow_mut().outer = Some(Rc::downgrade(&root));
					root.borrow_mut().subloops.push(l.clone());
					root.borrow_mut().no_inner = false;
				}
			}
		}
		root.borrow_mut().level = 0;
		for l in loops.iter() {
			calc_loop_level(Some(l.clone()));
		}

		let mut loop_map = LoopMap::new();
		for bb in self.blocks.iter() {
			let loop_ = bb.borrow().loop_.clone().unwrap_or_else(|| root.clone());
			loop_map.insert(bb.borrow().id, loop_);
		}
		(root, loop_map)
	}
}

fn calc_loop_level(loop_: Option<LoopPtr>) {
	if let Some(l) = loop_ {
		if l.borrow().level != -1 {
			return;
		}
		let outer = l.borrow().outer.clone().and_then(|v| v.upgrade());
		if let Some(outer) = outer {
			calc_loop_level(Some(outer.clone()));
			let level = outer.borrow().level + 1;
			l.borrow_mut().level = level;
		} else {
			l.borrow_mut().level = 1;
		}
	}
}

// dfs on the dominator tree; a predecessor dominated by the current block
// closes a backedge, and the blocks walking back from it form a loop
pub fn loop_dfs(cur_bb: TirNode, cfg: &CFG, next_id: &mut u32) {
	cur_bb.borrow_mut().loop_ = None;
	let children = cur_bb.borrow().dominates_directly.clone();
	for next in children {
		loop_dfs(next, cfg, next_id);
	}
	let mut bbs = Vec::new();
	for prev in cur_bb.borrow().prev.iter() {
		if cur_bb.borrow().dominates.contains(prev) {
			bbs.push(prev.clone());
		}
	}
	if bbs.is_empty() {
		return;
	}
	let ptr_to_self = cfg
		.blocks
		.iter()
		.find(|bb| bb.borrow().id == cur_bb.borrow().id)
		.unwrap()
		.clone();
	let new_loop = Rc::new(RefCell::new(Loop::new(*next_id, ptr_to_self)));
	*next_id += 1;
	while let Some(bb) = bbs.pop() {
		if bb.borrow().loop_.is_none() {
			bb.borrow_mut().loop_ = Some(new_loop.clone());
			if bb.borrow().id != cur_bb.borrow().id {
				bbs.append(bb.borrow().prev.clone().as_mut());
			}
		} else {
			let mut inner_loop = bb.borrow().loop_.clone().unwrap();
			let mut outer_loop =
				inner_loop.borrow().outer.clone().and_then(|v| v.upgrade());
			while let Some(outer) = outer_loop.clone() {
				inner_loop = outer;
				outer_loop = inner_loop.borrow().outer.clone().and_then(|v| v.upgrade());
			}
			if inner_loop.borrow().id == new_loop.borrow().id {
				continue;
			}
			new_loop.borrow_mut().no_inner = false;
			inner_loop.borrow_mut().outer = Some(Rc::downgrade(&new_loop));
			bbs.append(inner_loop.borrow().header.borrow().prev.clone().as_mut());
		}
	}
}

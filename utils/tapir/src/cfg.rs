use std::{collections::HashSet, rc::Rc};

use utils::Label;

pub use crate::basicblock::{BasicBlock, TirNode};

pub struct CFG {
	pub blocks: Vec<TirNode>,
}

impl CFG {
	pub fn new(id: i32, weight: f64) -> Self {
		Self {
			blocks: vec![BasicBlock::new_node(id, weight)],
		}
	}
	pub fn get_entry(&self) -> TirNode {
		self.blocks.first().unwrap().clone()
	}
	pub fn entry_label(&self) -> Label {
		self.get_entry().borrow().label()
	}
	pub fn get_node(&self, id: i32) -> Option<TirNode> {
		self.blocks.iter().find(|v| v.borrow().id == id).cloned()
	}
	pub fn make_pretty(&mut self) {
		self.blocks.iter().for_each(|v| v.borrow_mut().make_pretty())
	}
	pub fn size(&self) -> usize {
		self.blocks.len()
	}
	// Rebuild prev edges from succ edges and drop stale phi sources.
	pub fn resolve_prev(&mut self) {
		self.blocks.iter().for_each(|v| v.borrow_mut().prev.clear());
		self.blocks.iter().for_each(|u| {
			let succ = u.borrow().succ.clone();
			for v in succ {
				v.borrow_mut().prev.push(u.clone());
			}
		});
		for block in self.blocks.iter() {
			let labels: HashSet<_> =
				block.borrow().prev.iter().map(|v| v.borrow().label()).collect();
			for instr in block.borrow_mut().phi_instrs.iter_mut() {
				instr.source.retain(|(_, label)| labels.contains(label))
			}
		}
	}
}

pub fn link_node(from: &TirNode, to: &TirNode) {
	if from.borrow().jump_instr.is_none() {
		from.borrow_mut().succ.push(to.clone());
		to.borrow_mut().prev.push(from.clone());
	}
}

pub fn force_link_node(from: &TirNode, to: &TirNode) {
	from.borrow_mut().succ.push(to.clone());
	to.borrow_mut().prev.push(from.clone());
}

pub fn unlink_node(from: &TirNode, to: &TirNode) {
	from.borrow_mut().succ.retain(|v| !Rc::ptr_eq(v, to));
	to.borrow_mut().prev.retain(|v| !Rc::ptr_eq(v, from));
}

// Unlink a block from the graph and drop it from the cfg, fixing phi
// sources of its successors. The block must already be unreachable.
pub fn delete_dead_block(cfg: &mut CFG, node: &TirNode) {
	let label = node.borrow().label();
	let id = node.borrow().id;
	let succs = node.borrow().succ.clone();
	for succ in succs {
		if succ.borrow().id == id {
			continue;
		}
		succ.borrow_mut().prev.retain(|v| v.borrow().id != id);
		for phi in succ.borrow_mut().phi_instrs.iter_mut() {
			phi.remove_incoming(&label);
		}
	}
	let prevs = node.borrow().prev.clone();
	for prev in prevs {
		if prev.borrow().id == id {
			continue;
		}
		prev.borrow_mut().succ.retain(|v| v.borrow().id != id);
	}
	node.borrow_mut().clear();
	cfg.blocks.retain(|v| v.borrow().id != id);
}

// Dominance-aware code motion. Both primitives are transactional: they
// either move a whole dependency cone or leave the ir untouched, and they
// only consult the dominator information stored in the blocks.

use std::collections::HashSet;

use tapir::{prelude::TirFunc, TirNode};
use tir::{TirInstrTrait, TirTemp, Value};
use utils::UseTemp;

use super::super::loop_data::LoopData;

pub fn block_dominates(a: &TirNode, b: &TirNode) -> bool {
	a.borrow().id == b.borrow().id
		|| a.borrow().dominates.iter().any(|v| v.borrow().id == b.borrow().id)
}

// Where a temp is read.
pub enum UseSite {
	// source of a phi; dominance is judged at the end of the matching pred
	Phi { block: TirNode, pred: TirNode },
	Body { block: TirNode, index: usize },
	Term { block: TirNode },
}

pub fn collect_uses(func: &TirFunc, temp: &TirTemp) -> Vec<UseSite> {
	let mut uses = Vec::new();
	for node in func.cfg.blocks.iter() {
		let block = node.borrow();
		for phi in block.phi_instrs.iter() {
			for (value, label) in phi.source.iter() {
				if value.unwrap_temp().as_ref() == Some(temp) {
					if let Some(pred) =
						block.prev.iter().find(|v| v.borrow().label() == *label)
					{
						uses.push(UseSite::Phi {
							block: node.clone(),
							pred: pred.clone(),
						});
					}
				}
			}
		}
		for (index, instr) in block.instrs.iter().enumerate() {
			if instr.get_read().contains(temp) {
				uses.push(UseSite::Body {
					block: node.clone(),
					index,
				});
			}
		}
		if let Some(term) = block.jump_instr.as_ref() {
			if term.get_read().contains(temp) {
				uses.push(UseSite::Term {
					block: node.clone(),
				});
			}
		}
	}
	uses
}

// Does a definition at (def_block, def_index) dominate the given use?
// A def_index of None stands for a phi definition, which orders before
// every body instruction of its block.
pub fn pos_dominates(
	def_block: &TirNode,
	def_index: Option<usize>,
	site: &UseSite,
) -> bool {
	let (use_block, use_index) = match site {
		UseSite::Phi { pred, .. } => (pred.clone(), usize::MAX),
		UseSite::Body { block, index } => (block.clone(), *index),
		UseSite::Term { block } => (block.clone(), usize::MAX),
	};
	if def_block.borrow().id == use_block.borrow().id {
		match def_index {
			None => true,
			Some(d) => d < use_index,
		}
	} else {
		block_dominates(def_block, &use_block)
	}
}

fn find_def_index(node: &TirNode, target: &TirTemp) -> Option<usize> {
	node
		.borrow()
		.instrs
		.iter()
		.position(|v| v.get_write().as_ref() == Some(target))
}

fn is_phi_def(node: &TirNode, target: &TirTemp) -> bool {
	node.borrow().phi_instrs.iter().any(|v| v.target == *target)
}

// Emit the cone rooted at `temp` in def-before-use order, considering
// only temps in `cone`.
fn post_order(
	temp: &TirTemp,
	cone: &HashSet<TirTemp>,
	loopdata: &LoopData,
	emitted: &mut Vec<TirTemp>,
	seen: &mut HashSet<TirTemp>,
) {
	if !cone.contains(temp) || !seen.insert(temp.clone()) {
		return;
	}
	let node = loopdata.def_map.get(temp).unwrap();
	if let Some(index) = find_def_index(node, temp) {
		for operand in node.borrow().instrs[index].get_read() {
			post_order(&operand, cone, loopdata, emitted, seen);
		}
	}
	emitted.push(temp.clone());
}

// Recursive hoist: move every transitive operand of `value` that does not
// already dominate the end of `dst` to the end of `dst`, keeping
// def-before-use order. Nothing moves unless the whole cone is movable.
pub fn move_before_term(
	dst: &TirNode,
	value: &Value,
	loopdata: &mut LoopData,
) -> bool {
	let seed = match value.unwrap_temp() {
		Some(t) if !t.is_global => t,
		_ => return true,
	};
	let mut cone: HashSet<TirTemp> = HashSet::new();
	let mut worklist = vec![seed.clone()];
	while let Some(temp) = worklist.pop() {
		if cone.contains(&temp) {
			continue;
		}
		let def = match loopdata.def_map.get(&temp) {
			Some(node) => node.clone(),
			None => continue, // parameter or global
		};
		if block_dominates(&def, dst) {
			continue;
		}
		if is_phi_def(&def, &temp) {
			// a phi pinned to a non-dominating block cannot be hoisted
			return false;
		}
		let index = match find_def_index(&def, &temp) {
			Some(index) => index,
			None => return false,
		};
		{
			let block = def.borrow();
			let instr = &block.instrs[index];
			if !instr.is_pure() && !instr.is_load() {
				return false;
			}
			worklist.extend(instr.get_read());
		}
		cone.insert(temp);
	}
	if cone.is_empty() {
		return true;
	}

	let mut order = Vec::new();
	let mut seen = HashSet::new();
	post_order(&seed, &cone, loopdata, &mut order, &mut seen);
	// operands of cone members that were already dominating are absent
	// from `order`; the cone itself is complete
	for temp in order {
		let def = loopdata.def_map.get(&temp).unwrap().clone();
		let index = find_def_index(&def, &temp).unwrap();
		let instr = def.borrow_mut().instrs.remove(index);
		dst.borrow_mut().instrs.push(instr);
		loopdata.def_map.insert(temp, dst.clone());
	}
	true
}

// Recursive sink: push `user` (an instruction reading the anchor-defined
// value from above it) and its chained users to just after the anchor.
// Restricted to the pure-computation whitelist; bails without touching
// the ir otherwise.
pub fn move_after(
	func: &TirFunc,
	anchor: &TirNode,
	anchor_temp: &TirTemp,
	user: &TirTemp,
	loopdata: &mut LoopData,
) -> bool {
	let mut cone: HashSet<TirTemp> = HashSet::new();
	let mut worklist = vec![user.clone()];
	while let Some(temp) = worklist.pop() {
		if cone.contains(&temp) {
			continue;
		}
		let def = match loopdata.def_map.get(&temp) {
			Some(node) => node.clone(),
			None => return false,
		};
		if is_phi_def(&def, &temp) {
			return false;
		}
		let index = match find_def_index(&def, &temp) {
			Some(index) => index,
			None => return false,
		};
		if !def.borrow().instrs[index].is_pure() {
			return false;
		}
		cone.insert(temp.clone());
		// chase the uses that the anchor will no longer dominate
		for site in collect_uses(func, &temp) {
			let anchor_index = match find_def_index(anchor, anchor_temp) {
				Some(index) => index,
				None => return false,
			};
			if pos_dominates(anchor, Some(anchor_index), &site) {
				continue;
			}
			match site {
				UseSite::Body { block, index } => {
					let target = block.borrow().instrs[index].get_write();
					match target {
						Some(t) => {
							if !cone.contains(&t) {
								worklist.push(t);
							}
						}
						None => return false,
					}
				}
				// a phi or terminator cannot be pushed past the anchor
				_ => return false,
			}
		}
	}
	if cone.is_empty() {
		return true;
	}

	let mut order = Vec::new();
	let mut seen = HashSet::new();
	// the cone is a use-chain dag; emit every member, operands first
	let mut members: Vec<TirTemp> = cone.iter().cloned().collect();
	members.sort();
	for temp in members.iter() {
		post_order(temp, &cone, loopdata, &mut order, &mut seen);
	}

	let mut moved = Vec::new();
	for temp in order.iter() {
		let def = loopdata.def_map.get(temp).unwrap().clone();
		let index = find_def_index(&def, temp).unwrap();
		moved.push(def.borrow_mut().instrs.remove(index));
	}
	let mut at = match find_def_index(anchor, anchor_temp) {
		Some(index) => index + 1,
		None => return false,
	};
	for instr in moved {
		let target = instr.get_write().unwrap();
		anchor.borrow_mut().instrs.insert(at, instr);
		loopdata.def_map.insert(target, anchor.clone());
		at += 1;
	}
	true
}

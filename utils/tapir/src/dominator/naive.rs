// naive algorithm computing the dominator tree with complexity O(n*m):
// a node dominates whatever becomes unreachable once it is removed

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{TirNode, CFG};

pub fn compute_dominator(
	cfg: &CFG,
	dominates: &mut HashMap<i32, Vec<TirNode>>,
	dominates_directly: &mut HashMap<i32, Vec<TirNode>>,
	dominator: &mut HashMap<i32, TirNode>,
) {
	for bb in cfg.blocks.iter() {
		let to_be_removed = bb.borrow().id;

		let mut reachable = HashSet::new();
		let mut worklist = VecDeque::new();
		if to_be_removed != cfg.get_entry().borrow().id {
			worklist.push_back(cfg.get_entry().clone());
		}
		while let Some(bb) = worklist.pop_front() {
			if reachable.contains(&bb.borrow().id) {
				continue;
			}
			reachable.insert(bb.borrow().id);
			for succ in bb.borrow().succ.iter() {
				if succ.borrow().id != to_be_removed {
					worklist.push_back(succ.clone());
				}
			}
		}
		cfg.blocks.iter().for_each(|bb_inner| {
			if !reachable.contains(&bb_inner.borrow().id) {
				dominates.entry(bb.borrow().id).or_default().push(bb_inner.clone());
			}
		});
	}
	// 计算完 dominates 后，计算 dominates_directly
	for bb in cfg.blocks.iter() {
		let bb_id = bb.borrow().id;
		dominates[&bb_id].clone().iter().for_each(|bb_inner| {
			let bb_inner_id = bb_inner.borrow().id;
			if bb_inner_id == bb_id {
				return;
			}
			if let Some(old) = dominator.get(&bb_inner_id).cloned() {
				if dominates[&old.borrow().id].contains(bb) {
					dominates_directly.entry(bb_id).or_default().push(bb_inner.clone());
					dominates_directly
						.entry(old.borrow().id)
						.or_default()
						.retain(|x| x.borrow().id != bb_inner_id);
					dominator.insert(bb_inner_id, bb.clone());
				}
			} else {
				dominates_directly.entry(bb_id).or_default().push(bb_inner.clone());
				dominator.insert(bb_inner_id, bb.clone());
			}
		});
	}
}

impl CFG {
	// 计算正向支配树并将信息存在每一个节点中, 计算前会清空支配树信息
	pub fn compute_dominator(&mut self) {
		self.blocks.iter().for_each(|v| {
			v.borrow_mut().dominates.clear();
			v.borrow_mut().dominates_directly.clear();
			v.borrow_mut().dominator = None;
		});
		for bb in self.blocks.iter() {
			let to_be_removed = bb.borrow().id;

			let mut reachable = HashSet::new();
			let mut worklist = VecDeque::new();
			if to_be_removed != self.get_entry().borrow().id {
				worklist.push_back(self.get_entry().clone());
			}
			while let Some(bb) = worklist.pop_front() {
				if reachable.contains(&bb.borrow().id) {
					continue;
				}
				reachable.insert(bb.borrow().id);
				for succ in bb.borrow().succ.iter() {
					if succ.borrow().id != to_be_removed {
						worklist.push_back(succ.clone());
					}
				}
			}
			self.blocks.iter().for_each(|bb_inner| {
				if !reachable.contains(&bb_inner.borrow().id) {
					bb.borrow_mut().dominates.push(bb_inner.clone());
				}
			});
		}
		for bb in self.blocks.iter() {
			let bb_id = bb.borrow().id;
			let bb_dominates = bb.borrow().dominates.clone();
			bb_dominates.iter().for_each(|bb_inner| {
				let bb_inner_id = bb_inner.borrow().id;
				if bb_inner_id == bb_id {
					return;
				}
				let bb_inner_dominator = bb_inner.borrow().dominator.clone();
				if let Some(dominator) = bb_inner_dominator {
					let is_contained = dominator.borrow().dominates.contains(bb);
					// 如果 bb_inner 的支配者支配了 bb
					if is_contained {
						bb.borrow_mut().dominates_directly.push(bb_inner.clone());
						bb_inner.borrow_mut().dominator = Some(bb.clone());
						dominator
							.borrow_mut()
							.dominates_directly
							.retain(|x| x.borrow().id != bb_inner_id);
					}
				} else {
					bb.borrow_mut().dominates_directly.push(bb_inner.clone());
					bb_inner.borrow_mut().dominator = Some(bb.clone());
				}
			});
		}
	}
}

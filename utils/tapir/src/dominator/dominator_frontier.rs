use std::collections::HashMap;

use crate::{TirNode, CFG};

pub fn compute_dominator_frontier(
	cfg: &CFG,
	dominates: &HashMap<i32, Vec<TirNode>>,
	dominator: &HashMap<i32, TirNode>,
	dominator_frontier: &mut HashMap<i32, Vec<TirNode>>,
) {
	for bb in cfg.blocks.iter() {
		if bb.borrow().prev.len() > 1 {
			for pred in bb.borrow().prev.iter() {
				let mut runner = pred.clone();
				let mut runner_id = runner.borrow().id;
				// walk up the dominator tree until runner strictly dominates bb
				while !(dominates.get(&runner_id).map_or(false, |v| v.contains(bb))
					&& runner_id != bb.borrow().id)
				{
					dominator_frontier.entry(runner_id).or_default().push(bb.clone());
					runner = dominator.get(&runner_id).cloned().unwrap();
					runner_id = runner.borrow().id;
				}
			}
		}
	}
}

// Exit-block normalizer: compute the unique "true exit" of a loop and
// collapse trivial branch chains feeding the sync block.

use std::collections::HashSet;

use itertools::Itertools;
use log::trace;
use tapir::{tapir_loop::LoopPtr, TirNode};
use tir::TirInstrTrait;

use super::Loop2Cilk;

impl<'a> Loop2Cilk<'a> {
	// The unique sync-side exit after transitively absorbing exit blocks
	// whose every forward path stays within already-classified exits. The
	// walk is conservative: only branches are followed; any other
	// terminator ends the attempt for that exit.
	pub fn true_exit(&self, loop_: &LoopPtr) -> Option<TirNode> {
		let loop_brw = loop_.borrow();
		let exit_blocks: Vec<TirNode> = loop_brw
			.exit_blocks(&self.func.cfg, &self.loopdata.loop_map)
			.into_iter()
			.unique_by(|v| v.borrow().id)
			.collect();
		let exit_ids: HashSet<i32> =
			exit_blocks.iter().map(|v| v.borrow().id).collect();
		let mut exits = exit_blocks.clone();
		let mut also_loop: HashSet<i32> = HashSet::new();

		let mut to_remove = true;
		while to_remove {
			to_remove = false;
			if exits.len() < 2 {
				break;
			}
			for temp_exit in exits.clone() {
				let mut reachable: HashSet<i32> = HashSet::new();
				let mut queue = vec![temp_exit.clone()];
				let mut valid = true;
				while let Some(m) = queue.pop() {
					if !valid {
						break;
					}
					let block = m.borrow();
					let branch = block
						.jump_instr
						.as_ref()
						.is_some_and(|t| t.is_uncond_jump() || t.is_cond_jump());
					if !branch {
						valid = false;
						break;
					}
					reachable.insert(block.id);
					for suc in block.succ.iter() {
						let id = suc.borrow().id;
						if loop_brw.contains_block(id, &self.loopdata.loop_map)
							|| exit_ids.contains(&id)
							|| also_loop.contains(&id)
							|| reachable.contains(&id)
						{
							continue;
						}
						queue.push(suc.clone());
					}
				}
				if valid && !reachable.is_empty() {
					exits.retain(|v| !reachable.contains(&v.borrow().id));
					also_loop.extend(reachable);
					to_remove = true;
					break;
				}
			}
		}

		if exits.len() == 1 {
			Some(exits[0].clone())
		} else {
			trace!("loop2cilk: {} exits survive absorption", exits.len());
			None
		}
	}

	// After canonicalization, empty unconditional-branch predecessors of
	// the sync block are merged away, keeping loop-info in step.
	pub fn collapse_sync_chains(&mut self, syncer: &TirNode) {
		let mut simplified = false;
		while !simplified {
			simplified = true;
			let preds = syncer.borrow().prev.clone();
			for pred in preds {
				let collapsible = {
					let block = pred.borrow();
					block.id != 0
						&& block.phi_instrs.is_empty()
						&& block.instrs.is_empty()
						&& block.jump_instr.as_ref().is_some_and(|t| t.is_uncond_jump())
				};
				if collapsible && self.simplify_uncond_branch_from_empty_block(&pred)
				{
					self.loopdata.loop_map.remove(&pred.borrow().id);
					simplified = false;
					break;
				}
			}
		}
	}

	// Redirect every predecessor of an empty block straight to its single
	// successor, then drop the block.
	fn simplify_uncond_branch_from_empty_block(&mut self, node: &TirNode) -> bool {
		let succ = node.borrow().get_succ();
		if succ.borrow().id == node.borrow().id {
			return false;
		}
		// a successor phi would need per-predecessor sources we do not have
		if !succ.borrow().no_phi() {
			return false;
		}
		let node_label = node.borrow().label();
		let preds = node.borrow().prev.clone();
		let mut label_map = std::collections::HashMap::new();
		label_map.insert(node_label.clone(), succ.borrow().label());
		for pred in preds.iter() {
			if let Some(term) = pred.borrow_mut().jump_instr.as_mut() {
				term.map_label(&label_map);
			}
			let node_id = node.borrow().id;
			for s in pred.borrow_mut().succ.iter_mut() {
				if s.borrow().id == node_id {
					*s = succ.clone();
				}
			}
		}
		{
			let node_id = node.borrow().id;
			let mut succ_mut = succ.borrow_mut();
			succ_mut.prev.retain(|v| v.borrow().id != node_id);
			succ_mut.prev.extend(preds.iter().cloned());
		}
		node.borrow_mut().clear();
		let node_id = node.borrow().id;
		self.func.cfg.blocks.retain(|v| v.borrow().id != node_id);
		trace!("loop2cilk: collapsed empty exit block {}", node_label);
		true
	}
}

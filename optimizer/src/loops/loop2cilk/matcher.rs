// Structural matcher: locate the detach/sync block pair framing the
// parallel body, or explain why the loop is not shaped that way.

use log::trace;
use tapir::{tapir_loop::LoopPtr, TirNode};
use tir::TirInstrTrait;

use super::{DetachedLoop, Loop2Cilk, Reject, Res};

impl<'a> Loop2Cilk<'a> {
	pub fn match_structure(&self, loop_: &LoopPtr) -> Res<DetachedLoop> {
		let header = loop_.borrow().header.clone();
		// The loop is entered either through a two-way branch in the header
		// or, when the header itself ends in the detach, through the
		// preheader.
		let (branch_block, cond) = self.entering_branch(loop_, &header)?;

		if cond {
			self.match_conditional_entry(loop_, &branch_block)
		} else {
			self.match_fallthrough_entry(loop_, &branch_block)
		}
	}

	// Returns the block whose terminator enters the loop and whether that
	// terminator is a two-way branch.
	fn entering_branch(
		&self,
		loop_: &LoopPtr,
		header: &TirNode,
	) -> Res<(TirNode, bool)> {
		let kind = |node: &TirNode| {
			let block = node.borrow();
			let term = block.jump_instr.as_ref();
			match term {
				Some(t) if t.is_cond_jump() => Some(true),
				Some(t) if t.is_uncond_jump() => Some(false),
				_ => None,
			}
		};
		if let Some(cond) = kind(header) {
			return Ok((header.clone(), cond));
		}
		let preheader = loop_
			.borrow()
			.get_loop_preheader(&self.loopdata.loop_map)
			.ok_or(Reject::StructureMismatch("loop not entered via branch"))?;
		match kind(&preheader) {
			Some(cond) => Ok((preheader, cond)),
			None => Err(Reject::StructureMismatch("loop not entered via branch")),
		}
	}

	// Two successors: one must end in detach, the other in sync, and the
	// loop's true exit must collapse onto the sync block.
	fn match_conditional_entry(
		&self,
		loop_: &LoopPtr,
		branch_block: &TirNode,
	) -> Res<DetachedLoop> {
		let (s0, s1) = {
			let block = branch_block.borrow();
			(block.succ[0].clone(), block.succ[1].clone())
		};
		let ends_in_detach =
			|n: &TirNode| n.borrow().jump_instr.as_ref().is_some_and(|t| t.is_detach());
		let ends_in_sync =
			|n: &TirNode| n.borrow().jump_instr.as_ref().is_some_and(|t| t.is_sync());

		let (detacher, syncer) = if ends_in_detach(&s0) && ends_in_sync(&s1) {
			(s0, s1)
		} else if ends_in_detach(&s1) && ends_in_sync(&s0) {
			(s1, s0)
		} else {
			return Err(Reject::StructureMismatch("successors are not detach+sync"));
		};

		let mut done =
			self.true_exit(loop_).ok_or(Reject::MultiExit)?;
		// A conditional branch straight back over the pair still exits
		// through the sync.
		let branches_over_pair = {
			let block = done.borrow();
			block.jump_instr.as_ref().is_some_and(|t| t.is_cond_jump())
				&& block.succ.len() == 2
				&& {
					let a = block.succ[0].borrow().id;
					let b = block.succ[1].borrow().id;
					let (d, s) = (detacher.borrow().id, syncer.borrow().id);
					(a == d && b == s) || (a == s && b == d)
				}
		};
		if branches_over_pair {
			done = syncer.clone();
		}
		// So does a block hanging off the sync that no longer reenters the
		// loop.
		if done.borrow().id != syncer.borrow().id {
			let preds = done.borrow().prev.clone();
			let unique_pred = match preds.as_slice() {
				[p] => Some(p.clone()),
				_ => None,
			};
			if unique_pred.is_some_and(|p| p.borrow().id == syncer.borrow().id) {
				let loop_brw = loop_.borrow();
				let reenters = done.borrow().succ.iter().any(|s| {
					loop_brw.contains_block(s.borrow().id, &self.loopdata.loop_map)
				});
				if !reenters {
					done = syncer.clone();
				}
			}
		}
		if done.borrow().id != syncer.borrow().id {
			trace!("loop2cilk: exit != sync");
			return Err(Reject::MultiExit);
		}
		Ok(DetachedLoop {
			header: branch_block.clone(),
			detacher,
			syncer,
		})
	}

	// One successor: the detacher is entered directly and the sync block
	// is found by walking the (empty) exit chain.
	fn match_fallthrough_entry(
		&self,
		loop_: &LoopPtr,
		branch_block: &TirNode,
	) -> Res<DetachedLoop> {
		let detacher = branch_block.borrow().get_succ();
		if !detacher
			.borrow()
			.jump_instr
			.as_ref()
			.is_some_and(|t| t.is_detach())
		{
			return Err(Reject::StructureMismatch("fallthrough target not a detach"));
		}
		let mut end = self.true_exit(loop_).ok_or(Reject::MultiExit)?;
		let mut fuel = self.func.cfg.size();
		loop {
			if fuel == 0 {
				return Err(Reject::StructureMismatch("exit chain does not reach sync"));
			}
			fuel -= 1;
			let is_sync =
				end.borrow().jump_instr.as_ref().is_some_and(|t| t.is_sync());
			if is_sync {
				break;
			}
			let passthrough = {
				let block = end.borrow();
				block.phi_instrs.is_empty()
					&& block.instrs.is_empty()
					&& block.jump_instr.as_ref().is_some_and(|t| t.is_uncond_jump())
			};
			if !passthrough {
				return Err(Reject::StructureMismatch("exit chain does not reach sync"));
			}
			let next = end.borrow().get_succ();
			end = next;
		}
		Ok(DetachedLoop {
			header: branch_block.clone(),
			detacher,
			syncer: end,
		})
	}
}

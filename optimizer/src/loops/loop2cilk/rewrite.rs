// Rewriter driver: stitches the matcher, normalizer, canonicalizer and
// outliner together, then performs the graph surgery that replaces the
// loop with one runtime call.

use std::collections::{HashMap, HashSet};

use log::debug;
use tapir::{
	cfg::{delete_dead_block, force_link_node, unlink_node},
	tapir_loop::LoopPtr,
	verify::verify_func,
	TirNode,
};
use tir::{
	CallInstr, JumpInstr, TirInstrTrait, TirTemp, Value, VarType,
};
use utils::{
	errors::Result, Label, UseTemp, CILK_FOR_32, CILK_FOR_64, CILK_FOR_GRAIN,
};

use super::{
	code_motion::{
		block_dominates, collect_uses, move_before_term, pos_dominates, UseSite,
	},
	DetachedLoop, Loop2Cilk, Reject, Res,
};

#[cfg(debug_assertions)]
fn check(func: &tapir::prelude::TirFunc) {
	if let Err(e) = verify_func(func) {
		panic!("loop2cilk broke function {}: {}", func.name, e);
	}
}

#[cfg(not(debug_assertions))]
fn check(_: &tapir::prelude::TirFunc) {}

impl<'a> Loop2Cilk<'a> {
	pub fn run_on_loop(&mut self, loop_: LoopPtr) -> Result<bool> {
		match self.transform(loop_) {
			Ok(()) => {
				check(self.func);
				Ok(true)
			}
			Err(reject) => {
				debug!("loop2cilk: leaving loop unchanged: {}", reject);
				// a rejected loop may be partially canonicalized but must
				// still verify
				check(self.func);
				Ok(false)
			}
		}
	}

	fn transform(&mut self, loop_: LoopPtr) -> Res<()> {
		self.func.cfg.compute_dominator();
		let shape = self.match_structure(&loop_)?;
		self.empty_detacher(&shape)?;
		self.empty_syncer(&shape)?;

		let (primary, trip) = self.get_ind_var(&loop_, &shape)?;
		let width = trip.get_type().bits();
		if width != 32 && width != 64 {
			return Err(Reject::WidthMismatch);
		}
		let header = loop_.borrow().header.clone();
		if header.borrow().phi_instrs.len() != 1 {
			return Err(Reject::NonCanonicalInduction(
				"loop carries more than its induction phi",
			));
		}

		self.collapse_sync_chains(&shape.syncer);
		self.func.cfg.compute_dominator();

		if !move_before_term(&shape.header, &trip, self.loopdata) {
			return Err(Reject::HoistFailure);
		}
		self.reject_live_out_piv(&loop_, &shape, &primary)?;

		let outlined = self
			.extract_detach_body_to_function(
				&shape.detacher,
				&primary.phi,
				trip.get_type(),
			)
			.ok_or(Reject::StructureMismatch("detach body not extractable"))?;

		self.splice_runtime_call(&loop_, &shape, &primary.phi, &trip, outlined);
		Ok(())
	}

	// Everything but the detach itself is hoisted into the first post-phi
	// position of the detached block, provided it is side-effect free and
	// its uses stay below the detach edge.
	fn empty_detacher(&mut self, shape: &DetachedLoop) -> Res<()> {
		let detacher = &shape.detacher;
		let task = detacher.borrow().succ[0].clone();
		loop {
			let instr = match detacher.borrow().instrs.last() {
				Some(v) => v.clone_box(),
				None => break,
			};
			if !instr.is_pure() && !instr.is_load() {
				debug!("loop2cilk: detach block writes memory");
				return Err(Reject::DetacherNotEmpty);
			}
			let target = match instr.get_write() {
				Some(t) => t,
				None => return Err(Reject::DetacherNotEmpty),
			};
			for site in collect_uses(self.func, &target) {
				if !pos_dominates(&task, None, &site) {
					debug!("loop2cilk: use not dominated by the detached body");
					return Err(Reject::DetacherNotEmpty);
				}
			}
			detacher.borrow_mut().instrs.pop();
			task.borrow_mut().instrs.insert(0, instr);
			self.loopdata.def_map.insert(target, task.clone());
		}
		Ok(())
	}

	// The sync block keeps only its terminator: computations sink into the
	// join's successor and one-armed phis collapse onto their value.
	fn empty_syncer(&mut self, shape: &DetachedLoop) -> Res<()> {
		let syncer = &shape.syncer;
		let after = syncer.borrow().get_succ();
		loop {
			let instr = match syncer.borrow().instrs.last() {
				Some(v) => v.clone_box(),
				None => break,
			};
			if !instr.is_pure() && !instr.is_load() {
				debug!("loop2cilk: sync block writes memory");
				return Err(Reject::SyncNotEmpty);
			}
			let target = match instr.get_write() {
				Some(t) => t,
				None => return Err(Reject::SyncNotEmpty),
			};
			for site in collect_uses(self.func, &target) {
				if !pos_dominates(&after, None, &site) {
					return Err(Reject::SyncNotEmpty);
				}
			}
			syncer.borrow_mut().instrs.pop();
			after.borrow_mut().instrs.insert(0, instr);
			self.loopdata.def_map.insert(target, after.clone());
		}

		let phis = syncer.borrow().phi_instrs.clone();
		if phis.is_empty() {
			return Ok(());
		}
		let mut map = HashMap::new();
		for phi in phis.iter() {
			if phi.source.len() != 1 {
				debug!("loop2cilk: sync phi merges several values");
				return Err(Reject::SyncNotEmpty);
			}
			map.insert(phi.target.clone(), phi.source[0].0.clone());
		}
		syncer.borrow_mut().phi_instrs.clear();
		for node in self.func.cfg.blocks.iter() {
			node.borrow_mut().map_temp(&map);
		}
		for phi in phis.iter() {
			self.loopdata.def_map.remove(&phi.target);
		}
		Ok(())
	}

	// After canonicalization the only remaining readers of the induction
	// phi may be its increment, the exit test and its cast chain, and the
	// detached body about to be outlined. Anything else means the counter
	// escapes the loop, and the rewrite would orphan that reader.
	fn reject_live_out_piv(
		&self,
		loop_: &LoopPtr,
		shape: &DetachedLoop,
		primary: &super::indvar::Primary,
	) -> Res<()> {
		let header = loop_.borrow().header.clone();
		let task = shape.detacher.borrow().succ[0].clone();
		let cmp_node = if header.borrow().id == shape.detacher.borrow().id {
			let loop_brw = loop_.borrow();
			header
				.borrow()
				.prev
				.iter()
				.find(|p| {
					loop_brw.contains_block(p.borrow().id, &self.loopdata.loop_map)
				})
				.cloned()
		} else {
			match shape.detacher.borrow().prev.as_slice() {
				[p] => Some(p.clone()),
				_ => None,
			}
		};
		let cmp_id = cmp_node.map(|v| v.borrow().id);
		for site in collect_uses(self.func, &primary.phi) {
			let (block, target) = match &site {
				UseSite::Phi { block, .. } => (block.clone(), None),
				UseSite::Body { block, index } => {
					(block.clone(), block.borrow().instrs[*index].get_write())
				}
				UseSite::Term { block } => (block.clone(), None),
			};
			if block_dominates(&task, &block) {
				continue;
			}
			if target.as_ref() == Some(&primary.incr) {
				continue;
			}
			if !matches!(site, UseSite::Phi { .. })
				&& Some(block.borrow().id) == cmp_id
			{
				continue;
			}
			debug!("loop2cilk: induction value escapes the loop");
			return Err(Reject::HoistFailure);
		}
		Ok(())
	}

	fn splice_runtime_call(
		&mut self,
		loop_: &LoopPtr,
		shape: &DetachedLoop,
		piv: &TirTemp,
		trip: &Value,
		outlined: super::outline::Outlined,
	) {
		let header = loop_.borrow().header.clone();
		let detacher = &shape.detacher;
		let syncer = &shape.syncer;

		// the canonical phi only fed structures that are going away
		header.borrow_mut().phi_instrs.retain(|p| p.target != *piv);
		self.loopdata.def_map.remove(piv);

		// erase the detach and drop the orphaned continuation
		let cont = detacher.borrow().succ[1].clone();
		detacher.borrow_mut().jump_instr = None;
		detacher.borrow_mut().succ.clear();
		{
			let detacher_id = detacher.borrow().id;
			cont.borrow_mut().prev.retain(|v| v.borrow().id != detacher_id);
		}
		if cont.borrow().prev.is_empty()
			&& cont.borrow().id != header.borrow().id
		{
			delete_dead_block(&mut self.func.cfg, &cont);
			self.loopdata.loop_map.remove(&cont.borrow().id);
		}

		// the entering block now falls through into the call
		let entering = &shape.header;
		let old_succs = entering.borrow().succ.clone();
		for succ in old_succs {
			unlink_node(entering, &succ);
		}
		entering
			.borrow_mut()
			.set_jump(Some(JumpInstr::new(detacher.borrow().label())));
		force_link_node(entering, detacher);

		// the detacher becomes the call site
		let width = trip.get_type().bits();
		let runtime = if width == 32 { CILK_FOR_32 } else { CILK_FOR_64 };
		let mut instrs = outlined.setup;
		instrs.push(Box::new(CallInstr {
			target: self.temp_mgr.new_temp(VarType::Void, false),
			var_type: VarType::Void,
			func: Label::new(runtime),
			params: vec![
				(VarType::VoidPtr, Value::Func(outlined.body_fn)),
				(VarType::VoidPtr, outlined.closure),
				(trip.get_type(), trip.clone()),
				(VarType::I32, Value::Int(CILK_FOR_GRAIN)),
			],
		}));
		detacher.borrow_mut().instrs.extend(instrs);
		detacher
			.borrow_mut()
			.set_jump(Some(JumpInstr::new(syncer.borrow().label())));
		{
			let syncer_id = syncer.borrow().id;
			let already =
				detacher.borrow().succ.iter().any(|v| v.borrow().id == syncer_id);
			if !already {
				force_link_node(detacher, syncer);
			}
		}

		// whatever the dead frame left behind goes away with it
		self.remove_unreachable();
		self.sweep_dead_locals();
		debug_assert!(
			collect_uses(self.func, piv).is_empty(),
			"induction phi still used after the rewrite"
		);

		// analyses: forget the loop, recompute dominance
		let loop_id = loop_.borrow().id;
		self.loopdata.loop_infos.remove(&loop_id);
		if let Some(outer) =
			loop_.borrow().outer.clone().and_then(|v| v.upgrade())
		{
			outer.borrow_mut().subloops.retain(|l| l.borrow().id != loop_id);
		}
		self.func.cfg.compute_dominator();
		self.extracted.push(outlined.func);
	}

	// Blocks cut off by the surgery (the old latch, collapsed exit paths)
	// are unlinked and dropped, keeping loop-info in step.
	fn remove_unreachable(&mut self) {
		let mut reachable: HashSet<i32> = HashSet::new();
		let mut stack = vec![self.func.cfg.get_entry()];
		while let Some(node) = stack.pop() {
			if !reachable.insert(node.borrow().id) {
				continue;
			}
			let succs: Vec<TirNode> = node.borrow().succ.clone();
			stack.extend(succs);
		}
		let dead: Vec<TirNode> = self
			.func
			.cfg
			.blocks
			.iter()
			.filter(|v| !reachable.contains(&v.borrow().id))
			.cloned()
			.collect();
		for node in dead {
			let id = node.borrow().id;
			delete_dead_block(&mut self.func.cfg, &node);
			self.loopdata.loop_map.remove(&id);
		}
	}

	// Dead pure computations left in the loop frame (the old exit test and
	// its cast chain) are erased so no use of a deleted phi survives.
	fn sweep_dead_locals(&mut self) {
		loop {
			let mut removed = false;
			let blocks = self.func.cfg.blocks.clone();
			for node in blocks {
				let dead_index = {
					let block = node.borrow();
					block.instrs.iter().position(|instr| {
						if !instr.is_pure() && !instr.is_load() {
							return false;
						}
						match instr.get_write() {
							Some(target) => collect_uses(self.func, &target).is_empty(),
							None => false,
						}
					})
				};
				if let Some(index) = dead_index {
					let target =
						node.borrow().instrs[index].get_write().unwrap();
					node.borrow_mut().instrs.remove(index);
					self.loopdata.def_map.remove(&target);
					removed = true;
				}
			}
			if !removed {
				break;
			}
		}
	}
}

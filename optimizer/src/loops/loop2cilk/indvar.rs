// Induction-variable canonicalizer. Proves one header phi drives the
// exit comparison, folds every other induction phi into an affine
// expression of it, rewrites the exit test into a trip count, and leaves
// the primary phi running over [0, trip_count) by unit step.

use std::collections::{HashMap, HashSet};

use log::trace;
use tapir::{tapir_loop::LoopPtr, TirNode};
use tir::{
	compute_two_value, get_int, int_value, is_one, is_zero, ArithInstr,
	ArithOp, CompInstr, CompOp, ConvertInstr, ConvertOp, JumpCondInstr,
	TirInstrTrait, TirInstrVariant, TirTemp, TirTempManager, Value, VarType,
};
use utils::UseTemp;

use super::{
	code_motion::{
		collect_uses, move_after, move_before_term, pos_dominates, UseSite,
	},
	DetachedLoop, Loop2Cilk, Reject, Res,
};

pub struct Primary {
	pub phi: TirTemp,
	pub incr: TirTemp,
	pub step: Value,
	// the exit comparison reads the increment rather than the phi
	pub via_incr: bool,
	// operand index of the bound in the comparison
	pub bound_idx: usize,
}

struct Secondary {
	phi: TirTemp,
	incr: TirTemp,
	step: Value,
}

// Insertion cursor into a block's body. Created temps are remembered so
// the canonical-form rewrite can leave its own helpers alone.
struct Builder {
	node: TirNode,
	at: usize,
	created: HashSet<TirTemp>,
}

impl Builder {
	fn new(node: TirNode, at: usize) -> Self {
		Self {
			node,
			at,
			created: HashSet::new(),
		}
	}
	fn binary(
		&mut self,
		mgr: &mut TirTempManager,
		lhs: Value,
		rhs: Value,
		op: ArithOp,
	) -> Value {
		let (value, instr) = compute_two_value(lhs, rhs, op, mgr);
		if let Some(instr) = instr {
			let target = instr.get_write().unwrap();
			self.node.borrow_mut().instrs.insert(self.at, instr);
			self.at += 1;
			self.created.insert(target);
		}
		value
	}
	// One cast opcode, picked from the width relation of the two types.
	fn cast_to(
		&mut self,
		mgr: &mut TirTempManager,
		value: Value,
		to_type: VarType,
	) -> Value {
		if value.get_type() == to_type {
			return value;
		}
		if let Some(i) = get_int(&value) {
			return int_value(to_type, i);
		}
		let from_type = value.get_type();
		let op = if to_type.bits() > from_type.bits() {
			ConvertOp::SExt
		} else {
			ConvertOp::Trunc
		};
		let target = mgr.new_temp(to_type, false);
		let instr = ConvertInstr {
			target: target.clone(),
			op,
			from_type,
			to_type,
			lhs: value,
		};
		self.node.borrow_mut().instrs.insert(self.at, Box::new(instr));
		self.at += 1;
		self.created.insert(target.clone());
		Value::Temp(target)
	}
	fn flush_defs(
		&self,
		loopdata: &mut super::super::loop_data::LoopData,
	) {
		for temp in self.created.iter() {
			loopdata.def_map.insert(temp.clone(), self.node.clone());
		}
	}
}

pub fn find_def_index(node: &TirNode, target: &TirTemp) -> Option<usize> {
	node
		.borrow()
		.instrs
		.iter()
		.position(|v| v.get_write().as_ref() == Some(target))
}

pub fn clone_comp(node: &TirNode, index: usize) -> CompInstr {
	match node.borrow().instrs[index].get_variant() {
		TirInstrVariant::CompInstr(c) => c.clone(),
		_ => unreachable!(),
	}
}

fn clone_arith(node: &TirNode, index: usize) -> Option<ArithInstr> {
	match node.borrow().instrs[index].get_variant() {
		TirInstrVariant::ArithInstr(a) => Some(a.clone()),
		_ => None,
	}
}

fn phi_incoming(
	header: &TirNode,
	phi: &TirTemp,
	label: &utils::Label,
) -> Option<Value> {
	header
		.borrow()
		.phi_instrs
		.iter()
		.find(|p| p.target == *phi)
		.and_then(|p| p.get_incoming_value_for_block(label))
}

impl<'a> Loop2Cilk<'a> {
	// Follow sext/zext/trunc chains back to the underlying value.
	fn uncast(&self, value: &Value) -> Value {
		let mut value = value.clone();
		loop {
			let temp = match value.unwrap_temp() {
				Some(t) => t,
				None => return value,
			};
			let def = match self.loopdata.def_map.get(&temp) {
				Some(node) => node.clone(),
				None => return value,
			};
			let index = match find_def_index(&def, &temp) {
				Some(index) => index,
				None => return value,
			};
			let inner = match def.borrow().instrs[index].get_variant() {
				TirInstrVariant::ConvertInstr(c)
					if matches!(
						c.op,
						ConvertOp::SExt | ConvertOp::ZExt | ConvertOp::Trunc
					) =>
				{
					c.lhs.clone()
				}
				_ => return value,
			};
			value = inner;
		}
	}

	// Returns the primary induction phi and the loop-invariant trip count;
	// after this the loop runs the phi over [0, trip) by ones and exits on
	// `phi != trip`.
	pub fn get_ind_var(
		&mut self,
		loop_: &LoopPtr,
		shape: &DetachedLoop,
	) -> Res<(Primary, Value)> {
		let header = loop_.borrow().header.clone();
		let (incoming, backedge) = self.header_preds(loop_, &header)?;

		// (a) the block holding the exit comparison
		let cmp_node = if header.borrow().id == shape.detacher.borrow().id {
			backedge.clone()
		} else {
			let preds = shape.detacher.borrow().prev.clone();
			match preds.as_slice() {
				[p] => p.clone(),
				_ => {
					return Err(Reject::NonCanonicalInduction(
						"detach block has no unique predecessor",
					))
				}
			}
		};
		let cond = self.orient_exit_branch(loop_, &cmp_node)?;

		// (b) expose induction phis masked by promotable stack slots
		self.promote_comparison_slots(&cmp_node, &cond);

		// (c) classify the header phis
		let (primary, others) =
			self.classify_phis(&header, &incoming, &backedge, &cmp_node, &cond)?;

		// (d) + (f) closed forms are built at the top of the detached body
		let task = shape.detacher.borrow().succ[0].clone();
		let piv_ty = primary.phi.var_type;
		let mut bld = Builder::new(task.clone(), 0);

		let init_p = phi_incoming(&header, &primary.phi, &incoming.borrow().label())
			.ok_or(Reject::NonCanonicalInduction("primary phi lost its start"))?;
		let mul = if is_one(&primary.step) {
			Value::Temp(primary.phi.clone())
		} else {
			bld.binary(
				self.temp_mgr,
				Value::Temp(primary.phi.clone()),
				primary.step.clone(),
				ArithOp::Mul,
			)
		};
		let new_v = if is_zero(&init_p) {
			mul
		} else {
			bld.binary(self.temp_mgr, mul, init_p.clone(), ArithOp::Add)
		};
		bld.flush_defs(self.loopdata);

		for sec in others.iter() {
			self.rewrite_secondary(&header, &incoming, &task, &primary, sec, &mut bld)?;
		}
		self.erase_dead_increments(&others);

		// (e) fold the exit test into a trip count
		let trip =
			self.build_trip_count(&cmp_node, &cond, &header, &incoming, &primary)?;

		// (f) install the canonical form
		self.install_canonical_form(
			&header, &incoming, &cmp_node, &cond, &task, &primary, &new_v, &bld, &trip,
		)?;

		self.loopdata.loop_infos.insert(loop_.borrow().id, trip.clone());
		Ok((primary, trip))
	}

	fn header_preds(
		&self,
		loop_: &LoopPtr,
		header: &TirNode,
	) -> Res<(TirNode, TirNode)> {
		let preds = header.borrow().prev.clone();
		if preds.len() != 2 {
			return Err(Reject::NonCanonicalInduction(
				"header does not have exactly two predecessors",
			));
		}
		let loop_brw = loop_.borrow();
		let inside = |n: &TirNode| {
			loop_brw.contains_block(n.borrow().id, &self.loopdata.loop_map)
		};
		match (inside(&preds[0]), inside(&preds[1])) {
			(false, true) => Ok((preds[0].clone(), preds[1].clone())),
			(true, false) => Ok((preds[1].clone(), preds[0].clone())),
			_ => Err(Reject::NonCanonicalInduction(
				"header predecessors are not incoming plus backedge",
			)),
		}
	}

	// Make the "true" successor stay in the loop, inverting the predicate
	// if needed, and require an integer ordering test.
	fn orient_exit_branch(
		&mut self,
		loop_: &LoopPtr,
		cmp_node: &TirNode,
	) -> Res<TirTemp> {
		let term = cmp_node.borrow().jump_instr.as_ref().map(|v| v.clone_box());
		let branch = match term.as_ref().map(|v| v.get_variant()) {
			Some(TirInstrVariant::JumpCondInstr(b)) => b.clone(),
			_ => {
				return Err(Reject::NonCanonicalInduction(
					"no comparison branch closes the loop",
				))
			}
		};
		let cond = branch.cond.unwrap_temp().ok_or(
			Reject::NonCanonicalInduction("exit branch tests a constant"),
		)?;
		let comp_idx = find_def_index(cmp_node, &cond).ok_or(
			Reject::NonCanonicalInduction("exit test not in its block"),
		)?;
		let mut comp = clone_comp(cmp_node, comp_idx);

		let true_in_loop = {
			let loop_brw = loop_.borrow();
			let t = cmp_node.borrow().succ[0].clone();
			let t_id = t.borrow().id;
			loop_brw.contains_block(t_id, &self.loopdata.loop_map)
		};
		if !true_in_loop {
			comp.op = comp.op.invert();
			let mut new_branch = branch.clone();
			std::mem::swap(
				&mut new_branch.target_true,
				&mut new_branch.target_false,
			);
			cmp_node.borrow_mut().jump_instr = Some(Box::new(new_branch));
			cmp_node.borrow_mut().succ.swap(0, 1);
			cmp_node.borrow_mut().instrs[comp_idx] = Box::new(comp.clone());
		}
		if !comp.op.is_int() || !comp.var_type.is_int() {
			return Err(Reject::NonCanonicalInduction(
				"exit comparison is not an integer ordering",
			));
		}
		if comp.op == CompOp::EQ {
			return Err(Reject::NonCanonicalInduction(
				"exit comparison is an equality",
			));
		}
		Ok(cond)
	}

	// A comparison side that loads a promotable stack slot hides its phi;
	// run the promotion utility on just that slot.
	fn promote_comparison_slots(&mut self, cmp_node: &TirNode, cond: &TirTemp) {
		let comp_idx = match find_def_index(cmp_node, cond) {
			Some(index) => index,
			None => return,
		};
		let comp = clone_comp(cmp_node, comp_idx);
		let mut slots = Vec::new();
		for side in [&comp.lhs, &comp.rhs] {
			let loaded = match self.uncast(side).unwrap_temp() {
				Some(t) => t,
				None => continue,
			};
			let def = match self.loopdata.def_map.get(&loaded) {
				Some(node) => node.clone(),
				None => continue,
			};
			let index = match find_def_index(&def, &loaded) {
				Some(index) => index,
				None => continue,
			};
			let addr = match def.borrow().instrs[index].get_variant() {
				TirInstrVariant::LoadInstr(load) => load.addr.unwrap_temp(),
				_ => None,
			};
			if let Some(addr) = addr {
				if crate::mem2reg::promotable_allocas(self.func).contains(&addr) {
					slots.push(addr);
				}
			}
		}
		if slots.is_empty() {
			return;
		}
		slots.sort();
		slots.dedup();
		trace!("loop2cilk: promoting {} slots feeding the exit test", slots.len());
		crate::mem2reg::promote_allocas(self.func, &slots, self.temp_mgr);
		self.loopdata.def_map =
			super::super::loop_data::LoopData::build_def_map(self.func);
		self.func.cfg.compute_dominator();
	}

	fn classify_phis(
		&mut self,
		header: &TirNode,
		incoming: &TirNode,
		backedge: &TirNode,
		cmp_node: &TirNode,
		cond: &TirTemp,
	) -> Res<(Primary, Vec<Secondary>)> {
		let mut primary: Option<Primary> = None;
		let mut others: Vec<Secondary> = Vec::new();
		let phi_targets: Vec<TirTemp> = header
			.borrow()
			.phi_instrs
			.iter()
			.map(|p| p.target.clone())
			.collect();

		for phi in phi_targets {
			if !phi.var_type.is_int() {
				return Err(Reject::NonCanonicalInduction("non-integer header phi"));
			}
			let backedge_value =
				phi_incoming(header, &phi, &backedge.borrow().label())
					.and_then(|v| v.unwrap_temp())
					.ok_or(Reject::NonCanonicalInduction(
						"backedge value is not an instruction",
					))?;
			let incr =
				self.normalize_increment(&phi, backedge_value, &mut others)?;

			// step and start must be available above the loop
			let (step, init) = {
				let def = self.loopdata.def_map.get(&incr).unwrap().clone();
				let index = find_def_index(&def, &incr).unwrap();
				let arith = clone_arith(&def, index)
					.ok_or(Reject::NonCanonicalInduction("increment is not an add"))?;
				let init = phi_incoming(header, &phi, &incoming.borrow().label())
					.ok_or(Reject::NonCanonicalInduction("phi lost its start"))?;
				(arith.rhs, init)
			};
			if !move_before_term(incoming, &step, self.loopdata) {
				return Err(Reject::HoistFailure);
			}
			if !move_before_term(incoming, &init, self.loopdata) {
				return Err(Reject::HoistFailure);
			}

			let comp_idx = find_def_index(cmp_node, cond)
				.ok_or(Reject::NonCanonicalInduction("exit test not in its block"))?;
			let comp = clone_comp(cmp_node, comp_idx);
			let mut matched = None;
			for (i, side) in [&comp.lhs, &comp.rhs].into_iter().enumerate() {
				let u = self.uncast(side);
				let is_phi = u == Value::Temp(phi.clone());
				let is_incr = u == Value::Temp(incr.clone());
				if is_phi && is_incr {
					return Err(Reject::NonCanonicalInduction(
						"exit test confuses phi and increment",
					));
				}
				if is_phi || is_incr {
					matched = Some((i, is_incr));
					break;
				}
			}
			match matched {
				Some((i, via_incr)) => {
					if primary.is_some() {
						return Err(Reject::NonCanonicalInduction(
							"two induction phis reach the exit test",
						));
					}
					primary = Some(Primary {
						phi,
						incr,
						step,
						via_incr,
						bound_idx: 1 - i,
					});
				}
				None => others.push(Secondary {
					phi,
					incr,
					step,
				}),
			}
		}

		primary
			.map(|p| (p, others))
			.ok_or(Reject::NonCanonicalInduction("no primary induction phi"))
	}

	// `x - c` on the backedge becomes `x + (-c)`, so every induction phi
	// presents as an add. Earlier classifications are re-pointed at the
	// replacement.
	fn normalize_increment(
		&mut self,
		phi: &TirTemp,
		incr: TirTemp,
		others: &mut [Secondary],
	) -> Res<TirTemp> {
		let def = self
			.loopdata
			.def_map
			.get(&incr)
			.cloned()
			.ok_or(Reject::NonCanonicalInduction("backedge value is a parameter"))?;
		let index = find_def_index(&def, &incr)
			.ok_or(Reject::NonCanonicalInduction("backedge value is a phi"))?;
		let arith = clone_arith(&def, index)
			.ok_or(Reject::NonCanonicalInduction("increment is not an add"))?;
		let ty = phi.var_type;

		let mut arith = match arith.op {
			ArithOp::Add => arith,
			ArithOp::Sub if arith.lhs == Value::Temp(phi.clone()) => {
				let (neg, neg_instr) = match get_int(&arith.rhs) {
					Some(c) => (int_value(ty, -c), None),
					None => {
						let target = self.temp_mgr.new_temp(ty, false);
						let instr = ArithInstr {
							target: target.clone(),
							op: ArithOp::Sub,
							var_type: ty,
							lhs: int_value(ty, 0),
							rhs: arith.rhs.clone(),
						};
						(Value::Temp(target), Some(instr))
					}
				};
				let new_incr = self.temp_mgr.new_temp(ty, false);
				let add = ArithInstr {
					target: new_incr.clone(),
					op: ArithOp::Add,
					var_type: ty,
					lhs: Value::Temp(phi.clone()),
					rhs: neg,
				};
				{
					let mut block = def.borrow_mut();
					block.instrs.remove(index);
					block.instrs.insert(index, Box::new(add.clone()));
					if let Some(neg_instr) = neg_instr {
						self
							.loopdata
							.def_map
							.insert(neg_instr.target.clone(), def.clone());
						block.instrs.insert(index, Box::new(neg_instr));
					}
				}
				// the old increment disappears; repoint every reader
				let mut map = HashMap::new();
				map.insert(incr.clone(), Value::Temp(new_incr.clone()));
				for node in self.func.cfg.blocks.iter() {
					node.borrow_mut().map_temp(&map);
				}
				for sec in others.iter_mut() {
					if sec.incr == incr {
						sec.incr = new_incr.clone();
					}
					if sec.step == Value::Temp(incr.clone()) {
						sec.step = Value::Temp(new_incr.clone());
					}
				}
				self.loopdata.def_map.remove(&incr);
				self.loopdata.def_map.insert(new_incr.clone(), def.clone());
				add
			}
			_ => {
				return Err(Reject::NonCanonicalInduction("increment is not an add"))
			}
		};

		// put the phi on the left of the add
		if arith.rhs == Value::Temp(phi.clone())
			&& arith.lhs != Value::Temp(phi.clone())
		{
			std::mem::swap(&mut arith.lhs, &mut arith.rhs);
		}
		if arith.lhs != Value::Temp(phi.clone()) {
			return Err(Reject::NonCanonicalInduction(
				"increment does not step the phi",
			));
		}
		let new_incr = arith.target.clone();
		let index = find_def_index(&def, &new_incr).unwrap();
		def.borrow_mut().instrs[index] = Box::new(arith);
		Ok(new_incr)
	}

	// Replace a secondary phi by `init + step * cast(piv)` built at the
	// top of the detached body, pushing non-dominated readers past the
	// expression.
	fn rewrite_secondary(
		&mut self,
		header: &TirNode,
		incoming: &TirNode,
		task: &TirNode,
		primary: &Primary,
		sec: &Secondary,
		bld: &mut Builder,
	) -> Res<()> {
		let sec_ty = sec.phi.var_type;
		let mut val =
			bld.cast_to(self.temp_mgr, Value::Temp(primary.phi.clone()), sec_ty);
		if !is_one(&sec.step) {
			val = bld.binary(self.temp_mgr, val, sec.step.clone(), ArithOp::Mul);
		}
		let init_s = phi_incoming(header, &sec.phi, &incoming.borrow().label())
			.ok_or(Reject::NonCanonicalInduction("phi lost its start"))?;
		if !is_zero(&init_s) {
			val = bld.binary(self.temp_mgr, val, init_s, ArithOp::Add);
		}
		bld.flush_defs(self.loopdata);

		// readers the expression does not dominate are pushed below it; a
		// reader that cannot move (a phi or branch outside the body) sinks
		// the whole loop
		if let Some(val_temp) = val.unwrap_temp() {
			if val_temp != primary.phi {
				loop {
					let mut moved = false;
					for site in collect_uses(self.func, &sec.phi) {
						let val_idx = find_def_index(task, &val_temp).unwrap();
						let target = match &site {
							UseSite::Body { block, index } => {
								block.borrow().instrs[*index].get_write()
							}
							_ => {
								if !pos_dominates(task, Some(val_idx), &site) {
									return Err(Reject::HoistFailure);
								}
								continue;
							}
						};
						if target.as_ref() == Some(&sec.incr) {
							continue;
						}
						if pos_dominates(task, Some(val_idx), &site) {
							continue;
						}
						let target = target.ok_or(Reject::HoistFailure)?;
						if !move_after(self.func, task, &val_temp, &target, self.loopdata)
						{
							return Err(Reject::HoistFailure);
						}
						moved = true;
						break;
					}
					if !moved {
						break;
					}
				}
			}
		}

		// swap every reader over, except the phi itself and its increment
		let mut map = HashMap::new();
		map.insert(sec.phi.clone(), val);
		for node in self.func.cfg.blocks.iter() {
			let mut block = node.borrow_mut();
			for phi in block.phi_instrs.iter_mut() {
				if phi.target == sec.phi {
					continue;
				}
				phi.map_temp(&map);
			}
			for instr in block.instrs.iter_mut() {
				if instr.get_write().as_ref() == Some(&sec.incr) {
					continue;
				}
				instr.map_temp(&map);
			}
			if let Some(term) = block.jump_instr.as_mut() {
				term.map_temp(&map);
			}
		}
		header.borrow_mut().phi_instrs.retain(|p| p.target != sec.phi);
		self.loopdata.def_map.remove(&sec.phi);
		Ok(())
	}

	// An increment whose phi is gone dies too, unless another secondary
	// tuple still refers to it.
	fn erase_dead_increments(&mut self, others: &[Secondary]) {
		for sec in others.iter() {
			if collect_uses(self.func, &sec.incr).is_empty() {
				let referenced = others.iter().any(|other| {
					other.phi != sec.phi
						&& (other.incr == sec.incr
							|| other.step == Value::Temp(sec.incr.clone()))
				});
				if referenced {
					continue;
				}
				if let Some(def) = self.loopdata.def_map.get(&sec.incr).cloned() {
					if let Some(index) = find_def_index(&def, &sec.incr) {
						def.borrow_mut().instrs.remove(index);
					}
					self.loopdata.def_map.remove(&sec.incr);
				}
			}
		}
	}

	// The §4.3(e) algebra: orient, widen, difference, strictness, step
	// sign, division, fencepost.
	fn build_trip_count(
		&mut self,
		cmp_node: &TirNode,
		cond: &TirTemp,
		header: &TirNode,
		incoming: &TirNode,
		primary: &Primary,
	) -> Res<Value> {
		let comp_idx = find_def_index(cmp_node, cond)
			.ok_or(Reject::NonCanonicalInduction("exit test not in its block"))?;
		let comp = clone_comp(cmp_node, comp_idx);
		let piv_ty = primary.phi.var_type;
		let mut cbld = Builder::new(cmp_node.clone(), comp_idx);

		let bound = if primary.bound_idx == 0 {
			comp.lhs.clone()
		} else {
			comp.rhs.clone()
		};
		let top_raw = cbld.cast_to(self.temp_mgr, bound, piv_ty);
		let mut amt = cbld.cast_to(self.temp_mgr, primary.step.clone(), piv_ty);
		let adder = phi_incoming(header, &primary.phi, &incoming.borrow().label())
			.ok_or(Reject::NonCanonicalInduction("primary phi lost its start"))?;
		let adder = cbld.cast_to(self.temp_mgr, adder, piv_ty);

		let mut bottom = adder.clone();
		let mut top = top_raw;
		if primary.via_incr {
			// exiting on the incremented value starts one step later
			bottom = cbld.binary(self.temp_mgr, adder, amt.clone(), ArithOp::Add);
		}
		let dir = comp.op.direction();
		if dir < 0 {
			std::mem::swap(&mut bottom, &mut top);
		}
		let mut val = if is_zero(&bottom) {
			top
		} else {
			cbld.binary(self.temp_mgr, top, bottom, ArithOp::Sub)
		};
		if comp.op.is_strict() {
			val = cbld.binary(self.temp_mgr, val, int_value(piv_ty, 1), ArithOp::Sub);
		}
		// the step sign must agree with which side the bound sits on
		let neg_needed = (dir > 0 && primary.bound_idx == 0)
			|| (dir < 0 && primary.bound_idx == 1);
		if neg_needed {
			amt = cbld.binary(self.temp_mgr, int_value(piv_ty, 0), amt, ArithOp::Sub);
		}
		if dir == 0 && !is_one(&amt) {
			// `!=` exits only count iterations for unit steps
			return Err(Reject::NonCanonicalInduction(
				"inequality exit with non-unit step",
			));
		}
		if !is_one(&amt) {
			val = cbld.binary(self.temp_mgr, val, amt, ArithOp::Div);
		}
		if comp.op != CompOp::NE {
			val = cbld.binary(self.temp_mgr, val, int_value(piv_ty, 1), ArithOp::Add);
		}
		cbld.flush_defs(self.loopdata);
		Ok(val)
	}

	// Point every remaining reader of the primary phi at the closed form,
	// then pin the loop to start 0, step 1, exit `phi != trip`.
	#[allow(clippy::too_many_arguments)]
	fn install_canonical_form(
		&mut self,
		header: &TirNode,
		incoming: &TirNode,
		cmp_node: &TirNode,
		cond: &TirTemp,
		task: &TirNode,
		primary: &Primary,
		new_v: &Value,
		bld: &Builder,
		trip: &Value,
	) -> Res<()> {
		if *new_v != Value::Temp(primary.phi.clone()) {
			let new_v_temp = new_v.unwrap_temp().unwrap();
			loop {
				let mut moved = false;
				for site in collect_uses(self.func, &primary.phi) {
					let (block, index) = match &site {
						UseSite::Body { block, index } => (block.clone(), *index),
						// phi and branch readers are left for the driver's
						// liveness guard to judge
						_ => continue,
					};
					let target = block.borrow().instrs[index].get_write();
					if target.as_ref() == Some(&primary.incr)
						|| target.as_ref() == Some(cond)
					{
						continue;
					}
					if target.as_ref().is_some_and(|t| bld.created.contains(t)) {
						continue;
					}
					if block.borrow().id == cmp_node.borrow().id {
						continue;
					}
					let val_idx = find_def_index(task, &new_v_temp).unwrap();
					if !pos_dominates(task, Some(val_idx), &site) {
						let target = target.ok_or(Reject::HoistFailure)?;
						if !move_after(
							self.func,
							task,
							&new_v_temp,
							&target,
							self.loopdata,
						) {
							return Err(Reject::HoistFailure);
						}
						moved = true;
						break;
					}
					let mut map = HashMap::new();
					map.insert(primary.phi.clone(), new_v.clone());
					block.borrow_mut().instrs[index].map_temp(&map);
				}
				if !moved {
					break;
				}
			}
		}

		// increment becomes +1
		{
			let def = self.loopdata.def_map.get(&primary.incr).unwrap().clone();
			let index = find_def_index(&def, &primary.incr).unwrap();
			let mut arith = clone_arith(&def, index)
				.ok_or(Reject::NonCanonicalInduction("increment vanished"))?;
			arith.rhs = int_value(primary.phi.var_type, 1);
			def.borrow_mut().instrs[index] = Box::new(arith);
		}
		// start becomes 0
		{
			let incoming_label = incoming.borrow().label();
			let mut block = header.borrow_mut();
			let phi = block
				.phi_instrs
				.iter_mut()
				.find(|p| p.target == primary.phi)
				.ok_or(Reject::NonCanonicalInduction("primary phi vanished"))?;
			for (value, label) in phi.source.iter_mut() {
				if *label == incoming_label {
					*value = int_value(primary.phi.var_type, 0);
				}
			}
		}
		// exit test becomes `phi != trip`
		{
			let comp_idx = find_def_index(cmp_node, cond)
				.ok_or(Reject::NonCanonicalInduction("exit test not in its block"))?;
			let mut comp = clone_comp(cmp_node, comp_idx);
			comp.op = CompOp::NE;
			comp.var_type = primary.phi.var_type;
			let piv = Value::Temp(primary.phi.clone());
			if primary.bound_idx == 0 {
				comp.lhs = trip.clone();
				comp.rhs = piv;
			} else {
				comp.lhs = piv;
				comp.rhs = trip.clone();
			}
			cmp_node.borrow_mut().instrs[comp_idx] = Box::new(comp);
		}
		Ok(())
	}
}

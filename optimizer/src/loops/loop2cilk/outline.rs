// Detach-body outliner. Lifts the detached region into its own function
// with the runtime's body signature `void f(i8* closure, iN low, iN
// high)`: captured temps travel through a closure record, the iteration
// index replaces the primary induction variable, and a serial wrapper
// loop walks [low, high).

use std::collections::{HashMap, HashSet};

use log::trace;
use tapir::{
	cfg::{force_link_node, CFG},
	prelude::TirFunc,
	TirNode,
};
use tir::{
	type2ptr, AllocInstr, ArithInstr, ArithOp, CompInstr, CompKind, CompOp,
	GEPInstr, JumpCondInstr, JumpInstr, LoadInstr, PhiInstr, RetInstr,
	StoreInstr, TirInstr, TirInstrTrait, TirInstrVariant, TirTemp, Value,
	VarType,
};
use utils::{Label, UseTemp, CLOSURE_SLOT_SIZE};

use super::Loop2Cilk;

pub struct Outlined {
	pub func: TirFunc,
	// function value for the runtime call
	pub body_fn: Label,
	// closure pointer argument; a literal null when nothing is captured
	pub closure: Value,
	// closure allocation and stores, to be placed before the call
	pub setup: Vec<TirInstr>,
}

impl<'a> Loop2Cilk<'a> {
	pub fn extract_detach_body_to_function(
		&mut self,
		detacher: &TirNode,
		piv: &TirTemp,
		index_ty: VarType,
	) -> Option<Outlined> {
		let (task, cont) = {
			let block = detacher.borrow();
			(block.succ[0].clone(), block.succ[1].clone())
		};
		let region = self.collect_region(&task, &cont, detacher)?;
		self.collapse_entry_phis(&task);
		let captures = self.region_captures(&region, piv);

		// spill the captures into a closure record at the call site
		let mut setup: Vec<TirInstr> = Vec::new();
		let closure = if captures.is_empty() {
			Value::Int(0)
		} else {
			let record = self.temp_mgr.new_temp(VarType::VoidPtr, false);
			setup.push(Box::new(AllocInstr {
				target: record.clone(),
				length: Value::Int(CLOSURE_SLOT_SIZE * captures.len() as i32),
				var_type: VarType::VoidPtr,
			}));
			for (slot, cap) in captures.iter().enumerate() {
				let field = self.temp_mgr.new_temp(type2ptr(cap.var_type), false);
				setup.push(Box::new(GEPInstr {
					target: field.clone(),
					var_type: type2ptr(cap.var_type),
					addr: Value::Temp(record.clone()),
					offset: Value::Int(CLOSURE_SLOT_SIZE * slot as i32),
				}));
				setup.push(Box::new(StoreInstr {
					value: Value::Temp(cap.clone()),
					addr: Value::Temp(field.clone()),
				}));
			}
			Value::Temp(record)
		};

		let name = format!("{}.body.{}", self.func.name, self.extracted.len() + 1);
		trace!("loop2cilk: outlining detach body into {}", name);
		let func =
			self.build_body_func(&name, &task, &cont, region, &captures, piv, index_ty);
		Some(Outlined {
			func,
			body_fn: Label::new(name),
			closure,
			setup,
		})
	}

	// The detached region: every block reachable from the task entry up to
	// the reattaches back to the continuation. Anything else (a nested
	// detach, a stray exit, a branch to the continuation that is not a
	// reattach) makes the body non-outlinable.
	fn collect_region(
		&self,
		task: &TirNode,
		cont: &TirNode,
		detacher: &TirNode,
	) -> Option<Vec<TirNode>> {
		let mut region: Vec<TirNode> = Vec::new();
		let mut seen: HashSet<i32> = HashSet::new();
		let mut queue = vec![task.clone()];
		while let Some(node) = queue.pop() {
			if !seen.insert(node.borrow().id) {
				continue;
			}
			let block = node.borrow();
			let term = block.jump_instr.as_ref()?;
			if term.is_reattach() {
				if block.succ[0].borrow().id != cont.borrow().id {
					return None;
				}
			} else if term.is_uncond_jump() || term.is_cond_jump() {
				for succ in block.succ.iter() {
					let id = succ.borrow().id;
					if id == cont.borrow().id || id == detacher.borrow().id {
						return None;
					}
					queue.push(succ.clone());
				}
			} else {
				return None;
			}
			drop(block);
			region.push(node);
		}
		Some(region)
	}

	// The task entry has a single predecessor, so any phi there is a
	// one-armed copy; fold it away before computing the captures.
	fn collapse_entry_phis(&mut self, task: &TirNode) {
		let phis: Vec<PhiInstr> =
			std::mem::take(&mut task.borrow_mut().phi_instrs);
		if phis.is_empty() {
			return;
		}
		let mut map = HashMap::new();
		for phi in phis {
			if let Some((value, _)) = phi.source.first() {
				map.insert(phi.target.clone(), value.clone());
			}
		}
		for node in self.func.cfg.blocks.iter() {
			node.borrow_mut().map_temp(&map);
		}
	}

	// Temps read inside the region but defined outside of it, primary
	// induction variable and globals excluded.
	fn region_captures(&self, region: &[TirNode], piv: &TirTemp) -> Vec<TirTemp> {
		let mut defs: HashSet<TirTemp> = HashSet::new();
		for node in region.iter() {
			for temp in node.borrow().defs() {
				defs.insert(temp);
			}
		}
		let mut captures: Vec<TirTemp> = Vec::new();
		let mut seen: HashSet<TirTemp> = HashSet::new();
		for node in region.iter() {
			let block = node.borrow();
			let reads = block
				.phi_instrs
				.iter()
				.flat_map(|p| p.get_read())
				.chain(block.instrs.iter().flat_map(|i| i.get_read()))
				.chain(block.jump_instr.iter().flat_map(|t| t.get_read()));
			for temp in reads {
				if temp.is_global
					|| temp == *piv
					|| defs.contains(&temp)
					|| !seen.insert(temp.clone())
				{
					continue;
				}
				captures.push(temp);
			}
		}
		captures.sort();
		captures
	}

	#[allow(clippy::too_many_arguments)]
	fn build_body_func(
		&mut self,
		name: &str,
		task: &TirNode,
		cont: &TirNode,
		region: Vec<TirNode>,
		captures: &[TirTemp],
		piv: &TirTemp,
		index_ty: VarType,
	) -> TirFunc {
		let closure_param = self.temp_mgr.new_temp(VarType::VoidPtr, false);
		let low = self.temp_mgr.new_temp(index_ty, false);
		let high = self.temp_mgr.new_temp(index_ty, false);

		let mut next_id = self.func.total;
		let entry = tapir::BasicBlock::new_node(0, 1.0);
		next_id += 1;
		let header = tapir::BasicBlock::new_node(next_id, 1.0);
		next_id += 1;
		let latch = tapir::BasicBlock::new_node(next_id, 1.0);
		next_id += 1;
		let exit = tapir::BasicBlock::new_node(next_id, 1.0);

		// reload the captures from the closure record
		let mut remap: HashMap<TirTemp, Value> = HashMap::new();
		for (slot, cap) in captures.iter().enumerate() {
			let field = self.temp_mgr.new_temp(type2ptr(cap.var_type), false);
			let local = self.temp_mgr.new_temp(cap.var_type, false);
			entry.borrow_mut().push(Box::new(GEPInstr {
				target: field.clone(),
				var_type: type2ptr(cap.var_type),
				addr: Value::Temp(closure_param.clone()),
				offset: Value::Int(CLOSURE_SLOT_SIZE * slot as i32),
			}));
			entry.borrow_mut().push(Box::new(LoadInstr {
				target: local.clone(),
				var_type: cap.var_type,
				addr: Value::Temp(field.clone()),
			}));
			remap.insert(cap.clone(), Value::Temp(local.clone()));
		}
		entry
			.borrow_mut()
			.set_jump(Some(JumpInstr::new(header.borrow().label())));

		// the serial wrapper: idx = phi(low, idx + 1); idx < high ?
		let idx = self.temp_mgr.new_temp(index_ty, false);
		let idx_next = self.temp_mgr.new_temp(index_ty, false);
		let in_range = self.temp_mgr.new_temp(VarType::I32, false);
		header.borrow_mut().push_phi(PhiInstr::new(
			idx.clone(),
			vec![
				(Value::Temp(low.clone()), entry.borrow().label()),
				(Value::Temp(idx_next.clone()), latch.borrow().label()),
			],
		));
		header.borrow_mut().push(Box::new(CompInstr {
			kind: CompKind::Icmp,
			target: in_range.clone(),
			op: CompOp::SLT,
			var_type: index_ty,
			lhs: Value::Temp(idx.clone()),
			rhs: Value::Temp(high.clone()),
		}));
		header.borrow_mut().set_jump(Some(Box::new(JumpCondInstr {
			var_type: VarType::I32,
			cond: Value::Temp(in_range.clone()),
			target_true: task.borrow().label(),
			target_false: exit.borrow().label(),
		})));
		latch.borrow_mut().push(Box::new(ArithInstr {
			target: idx_next.clone(),
			op: ArithOp::Add,
			var_type: index_ty,
			lhs: Value::Temp(idx.clone()),
			rhs: tir::int_value(index_ty, 1),
		}));
		latch
			.borrow_mut()
			.set_jump(Some(JumpInstr::new(header.borrow().label())));
		latch.borrow_mut().succ = vec![header.clone()];
		exit.borrow_mut().set_jump(Some(Box::new(RetInstr { value: None })));

		// move the region over: the index replaces the induction variable,
		// reattaches fall through to the wrapper latch
		remap.insert(piv.clone(), Value::Temp(idx.clone()));
		let latch_label = latch.borrow().label();
		let region_ids: HashSet<i32> =
			region.iter().map(|v| v.borrow().id).collect();
		for node in region.iter() {
			node.borrow_mut().map_temp(&remap);
			let is_reattach = node
				.borrow()
				.jump_instr
				.as_ref()
				.is_some_and(|t| t.is_reattach());
			if is_reattach {
				node
					.borrow_mut()
					.set_jump(Some(JumpInstr::new(latch_label.clone())));
				node.borrow_mut().succ = vec![latch.clone()];
				latch.borrow_mut().prev.push(node.clone());
			}
		}
		// the task entry now hangs off the wrapper header
		task.borrow_mut().prev = vec![header.clone()];
		header.borrow_mut().succ = vec![task.clone(), exit.clone()];
		exit.borrow_mut().prev = vec![header.clone()];
		force_link_node(&entry, &header);
		header.borrow_mut().prev.push(latch.clone());
		{
			let mut cont_mut = cont.borrow_mut();
			cont_mut.prev.retain(|v| !region_ids.contains(&v.borrow().id));
			let region_labels: Vec<Label> =
				region.iter().map(|v| v.borrow().label()).collect();
			for phi in cont_mut.phi_instrs.iter_mut() {
				phi.source.retain(|(_, l)| !region_labels.contains(l));
			}
		}
		self
			.func
			.cfg
			.blocks
			.retain(|v| !region_ids.contains(&v.borrow().id));
		self.loopdata.loop_map.retain(|id, _| !region_ids.contains(id));
		for node in region.iter() {
			node.borrow_mut().dominates.clear();
			node.borrow_mut().dominates_directly.clear();
			node.borrow_mut().dominator = None;
			node.borrow_mut().loop_ = None;
		}

		let mut blocks = vec![entry, header];
		blocks.extend(region);
		blocks.push(latch);
		blocks.push(exit);
		let cfg = CFG { blocks };
		let mut func = TirFunc::new(
			cfg,
			name.to_string(),
			VarType::Void,
			vec![
				Value::Temp(closure_param),
				Value::Temp(low),
				Value::Temp(high),
			],
		);
		func.cfg.compute_dominator();
		func
	}
}

use std::collections::{HashMap, HashSet};

use super::Mem2Reg;
use crate::TapirOptimizer;
use log::trace;
use tapir::{
	dominator::DomTree,
	prelude::{TirFunc, TirProgram},
	TirNode,
};
use tir::{
	PhiInstr, TirInstrTrait, TirInstrVariant, TirTemp, TirTempManager, Value,
};
use utils::{errors::Result, Label, UseTemp};

// A stack slot is promotable when its address never escapes: every use is
// a direct load or a direct store of a scalar through it.
pub fn promotable_allocas(func: &TirFunc) -> Vec<TirTemp> {
	let mut candidates = HashSet::new();
	for node in func.cfg.blocks.iter() {
		for instr in node.borrow().instrs.iter() {
			if let TirInstrVariant::AllocInstr(alloc) = instr.get_variant() {
				if alloc.var_type.is_ptr() && alloc.var_type != tir::VarType::VoidPtr
				{
					candidates.insert(alloc.target.clone());
				}
			}
		}
	}
	if candidates.is_empty() {
		return Vec::new();
	}
	let mut escaped = HashSet::new();
	let mut mark = |value: &Value, escaped: &mut HashSet<TirTemp>| {
		if let Some(t) = value.unwrap_temp() {
			if candidates.contains(&t) {
				escaped.insert(t);
			}
		}
	};
	for node in func.cfg.blocks.iter() {
		let block = node.borrow();
		for phi in block.phi_instrs.iter() {
			for (value, _) in phi.source.iter() {
				mark(value, &mut escaped);
			}
		}
		for instr in block.instrs.iter() {
			match instr.get_variant() {
				TirInstrVariant::LoadInstr(_) => {}
				TirInstrVariant::StoreInstr(store) => {
					// storing the slot address itself leaks it
					mark(&store.value, &mut escaped);
				}
				TirInstrVariant::AllocInstr(_) => {}
				_ => {
					for temp in instr.get_read() {
						if candidates.contains(&temp) {
							escaped.insert(temp);
						}
					}
				}
			}
		}
		if let Some(term) = block.jump_instr.as_ref() {
			for temp in term.get_read() {
				if candidates.contains(&temp) {
					escaped.insert(temp);
				}
			}
		}
	}
	let mut result: Vec<TirTemp> =
		candidates.difference(&escaped).cloned().collect();
	result.sort();
	result
}

struct Renamer<'a> {
	dom_tree: DomTree,
	targets: HashSet<TirTemp>,
	// phi temp chosen for (block, alloca)
	instance_phi: HashMap<(i32, TirTemp), TirTemp>,
	// every load target replaced by the reaching value
	replacement: HashMap<TirTemp, Value>,
	mgr: &'a mut TirTempManager,
}

impl<'a> Renamer<'a> {
	fn resolve(&self, value: Value) -> Value {
		let mut value = value;
		while let Value::Temp(t) = &value {
			match self.replacement.get(t) {
				Some(next) => value = next.clone(),
				None => break,
			}
		}
		value
	}

	// Walk the dominator tree carrying the reaching definition of every
	// promoted slot; loads record replacements, stores update the value.
	fn rename(&mut self, node: TirNode, mut cur: HashMap<TirTemp, Value>) {
		let id = node.borrow().id;
		for target in self.targets.clone() {
			if let Some(phi) = self.instance_phi.get(&(id, target.clone())) {
				cur.insert(target, Value::Temp(phi.clone()));
			}
		}
		{
			let block = node.borrow();
			for instr in block.instrs.iter() {
				match instr.get_variant() {
					TirInstrVariant::LoadInstr(load) => {
						if let Some(addr) = load.addr.unwrap_temp() {
							if self.targets.contains(&addr) {
								let reaching = cur
									.get(&addr)
									.cloned()
									.unwrap_or_else(|| addr.var_type.deref_type().default_value());
								self.replacement.insert(load.target.clone(), reaching);
							}
						}
					}
					TirInstrVariant::StoreInstr(store) => {
						if let Some(addr) = store.addr.unwrap_temp() {
							if self.targets.contains(&addr) {
								cur.insert(addr, self.resolve(store.value.clone()));
							}
						}
					}
					_ => {}
				}
			}
		}
		// feed the phi of every successor that merges a promoted slot
		let succs: Vec<TirNode> = node.borrow().succ.clone();
		let label = node.borrow().label();
		for succ in succs {
			let succ_id = succ.borrow().id;
			for target in self.targets.clone() {
				if let Some(phi_temp) =
					self.instance_phi.get(&(succ_id, target.clone()))
				{
					let reaching = cur
						.get(&target)
						.cloned()
						.unwrap_or_else(|| target.var_type.deref_type().default_value());
					append_phi_source(&succ, phi_temp, reaching, label.clone());
				}
			}
		}
		let children = self.dom_tree.get_children(id).clone();
		for child in children {
			self.rename(child, cur.clone());
		}
	}
}

fn append_phi_source(
	node: &TirNode,
	phi_temp: &TirTemp,
	value: Value,
	label: Label,
) {
	let mut block = node.borrow_mut();
	for phi in block.phi_instrs.iter_mut() {
		if phi.target == *phi_temp {
			phi.source.push((value, label));
			return;
		}
	}
	unreachable!("phi for promoted slot disappeared");
}

pub fn promote_allocas(
	func: &mut TirFunc,
	targets: &[TirTemp],
	mgr: &mut TirTempManager,
) -> bool {
	if targets.is_empty() {
		return false;
	}
	trace!("mem2reg: promoting {} slots in {}", targets.len(), func.name);
	let mut dom_tree = DomTree::new(&func.cfg);

	// phi placement on the iterated dominance frontier of the stores
	let mut instance_phi: HashMap<(i32, TirTemp), TirTemp> = HashMap::new();
	for target in targets.iter() {
		let mut def_blocks: Vec<i32> = Vec::new();
		for node in func.cfg.blocks.iter() {
			let block = node.borrow();
			let stores = block.instrs.iter().any(|instr| {
				matches!(
					instr.get_variant(),
					TirInstrVariant::StoreInstr(store)
						if store.addr.unwrap_temp().as_ref() == Some(target)
				)
			});
			if stores {
				def_blocks.push(block.id);
			}
		}
		let mut placed = HashSet::new();
		let mut worklist = def_blocks.clone();
		while let Some(id) = worklist.pop() {
			for frontier in dom_tree.get_df(id).clone() {
				let fid = frontier.borrow().id;
				if placed.insert(fid) {
					let phi_temp =
						mgr.new_temp(target.var_type.deref_type(), false);
					frontier
						.borrow_mut()
						.phi_instrs
						.push(PhiInstr::new(phi_temp.clone(), Vec::new()));
					instance_phi.insert((fid, target.clone()), phi_temp);
					if !def_blocks.contains(&fid) {
						worklist.push(fid);
					}
				}
			}
		}
	}

	let mut renamer = Renamer {
		dom_tree,
		targets: targets.iter().cloned().collect(),
		instance_phi,
		replacement: HashMap::new(),
		mgr,
	};
	renamer.rename(func.cfg.get_entry(), HashMap::new());

	// drop the memory traffic, then rewrite the load targets everywhere
	let target_set = renamer.targets.clone();
	for node in func.cfg.blocks.iter() {
		node.borrow_mut().instrs.retain(|instr| match instr.get_variant() {
			TirInstrVariant::AllocInstr(alloc) => {
				!target_set.contains(&alloc.target)
			}
			TirInstrVariant::LoadInstr(load) => load
				.addr
				.unwrap_temp()
				.map_or(true, |addr| !target_set.contains(&addr)),
			TirInstrVariant::StoreInstr(store) => store
				.addr
				.unwrap_temp()
				.map_or(true, |addr| !target_set.contains(&addr)),
			_ => true,
		});
	}
	let resolved: HashMap<TirTemp, Value> = renamer
		.replacement
		.keys()
		.map(|k| (k.clone(), renamer.resolve(Value::Temp(k.clone()))))
		.collect();
	for node in func.cfg.blocks.iter() {
		node.borrow_mut().map_temp(&resolved);
	}
	true
}

impl TapirOptimizer for Mem2Reg {
	fn new() -> Self {
		Self {}
	}
	fn apply(self, program: &mut TirProgram) -> Result<bool> {
		let TirProgram { funcs, temp_mgr } = program;
		Ok(funcs.iter_mut().fold(false, |last, func| {
			let targets = promotable_allocas(func);
			promote_allocas(func, &targets, temp_mgr) || last
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tapir::builder::build_program;
	use tir::parser::parse;

	#[test]
	fn promotes_masked_induction_slot() {
		let src = r#"
define i32 @f(i32 %n) {
	entry:
		%1 = alloca i32*, 4
		store i32 0, %1
		br label %B1
	B1:
		%2 = load i32, %1
		%3 = icmp slt i32 %2, %n
		br i32 %3, label %B2, label %B3
	B2:
		%4 = load i32, %1
		%5 = add i32 %4, 1
		store i32 %5, %1
		br label %B1
	B3:
		%6 = load i32, %1
		ret i32 %6
}
"#;
		let mut program = build_program(parse(src).unwrap()).unwrap();
		let func = &mut program.funcs[0];
		let targets = promotable_allocas(func);
		assert_eq!(targets.len(), 1);
		assert!(promote_allocas(func, &targets, &mut program.temp_mgr));
		for node in func.cfg.blocks.iter() {
			for instr in node.borrow().instrs.iter() {
				assert!(!instr.is_load() && !instr.is_store());
			}
		}
		let header = func.cfg.get_node(1).unwrap();
		assert_eq!(header.borrow().phi_instrs.len(), 1);
		tapir::verify::verify_func(func).unwrap();
	}

	#[test]
	fn escaped_slot_is_kept() {
		let src = r#"
define void @f() {
	entry:
		%1 = alloca i32*, 4
		call void @leak(i32* %1)
		ret void
}
"#;
		let program = build_program(parse(src).unwrap()).unwrap();
		assert!(promotable_allocas(&program.funcs[0]).is_empty());
	}
}

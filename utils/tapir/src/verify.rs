// Structural and SSA checks run after every significant mutation of the
// ir. A failure here is a compiler bug, not a user error; passes assert
// on it in debug builds.

use std::collections::{HashMap, HashSet};

use tir::{TirInstrTrait, TirTemp, Value};
use utils::{errors::Result, Label, TapircError::VerifyError, UseTemp};

use crate::{dominator::DomTree, func::TirFunc, TirNode};

fn err(msg: impl std::fmt::Display) -> utils::TapircError {
	VerifyError(msg.to_string())
}

pub fn verify_func(func: &TirFunc) -> Result<()> {
	let cfg = &func.cfg;
	if cfg.blocks.is_empty() {
		return Err(err(format!("function {} has no blocks", func.name)));
	}
	let ids: HashSet<i32> =
		cfg.blocks.iter().map(|v| v.borrow().id).collect();
	if ids.len() != cfg.blocks.len() {
		return Err(err("duplicate block ids"));
	}

	check_edges(func)?;
	let defs = check_single_assignment(func)?;
	check_dominance(func, &defs)?;
	Ok(())
}

fn check_edges(func: &TirFunc) -> Result<()> {
	for node in func.cfg.blocks.iter() {
		let block = node.borrow();
		let term = block
			.jump_instr
			.as_ref()
			.ok_or_else(|| err(format!("block {} has no terminator", block.label())))?;
		let labels = term.get_succ_labels();
		if labels.len() != block.succ.len() {
			return Err(err(format!(
				"block {} successor count does not match terminator",
				block.label()
			)));
		}
		for (label, succ) in labels.iter().zip(block.succ.iter()) {
			if succ.borrow().label() != *label {
				return Err(err(format!(
					"block {} jumps to {} but edge points to {}",
					block.label(),
					label,
					succ.borrow().label()
				)));
			}
			if !succ
				.borrow()
				.prev
				.iter()
				.any(|v| v.borrow().id == block.id)
			{
				return Err(err(format!(
					"edge {} -> {} has no reverse edge",
					block.label(),
					label
				)));
			}
		}
		for prev in block.prev.iter() {
			if !prev.borrow().succ.iter().any(|v| v.borrow().id == block.id) {
				return Err(err(format!(
					"stale predecessor {} of {}",
					prev.borrow().label(),
					block.label()
				)));
			}
		}
		// phi sources must name the predecessors exactly
		let prev_labels: HashSet<Label> =
			block.prev.iter().map(|v| v.borrow().label()).collect();
		for phi in block.phi_instrs.iter() {
			let source_labels: HashSet<Label> =
				phi.source.iter().map(|(_, l)| l.clone()).collect();
			if source_labels != prev_labels {
				return Err(err(format!(
					"phi {} in {} does not cover its predecessors",
					phi.target,
					block.label()
				)));
			}
		}
	}
	Ok(())
}

type DefMap = HashMap<TirTemp, (i32, usize)>;

// Position of a definition: (block id, index). Phis take index 0; body
// instructions are offset by one so phis order before them.
fn check_single_assignment(func: &TirFunc) -> Result<DefMap> {
	let mut defs = DefMap::new();
	for param in func.params.iter() {
		if let Value::Temp(t) = param {
			defs.insert(t.clone(), (-1, 0));
		}
	}
	for node in func.cfg.blocks.iter() {
		let block = node.borrow();
		for phi in block.phi_instrs.iter() {
			if defs.insert(phi.target.clone(), (block.id, 0)).is_some() {
				return Err(err(format!("temp {} defined twice", phi.target)));
			}
		}
		for (idx, instr) in block.instrs.iter().enumerate() {
			if let Some(target) = instr.get_write() {
				if defs.insert(target.clone(), (block.id, idx + 1)).is_some() {
					return Err(err(format!("temp {} defined twice", target)));
				}
			}
		}
	}
	Ok(defs)
}

fn check_dominance(func: &TirFunc, defs: &DefMap) -> Result<()> {
	let dom = DomTree::new(&func.cfg);
	let check_use = |temp: &TirTemp, at: (i32, usize)| -> Result<()> {
		if temp.is_global {
			return Ok(());
		}
		let (def_block, def_idx) = *defs
			.get(temp)
			.ok_or_else(|| err(format!("use of undefined temp {}", temp)))?;
		if def_block == -1 {
			return Ok(()); // parameter
		}
		let ok = if def_block == at.0 {
			def_idx < at.1 || (def_idx == 0 && at.1 == 0)
		} else {
			dom.dominates(def_block, at.0)
		};
		if !ok {
			return Err(err(format!(
				"definition of {} does not dominate its use",
				temp
			)));
		}
		Ok(())
	};
	for node in func.cfg.blocks.iter() {
		let block = node.borrow();
		// a phi's operand must dominate the end of the matching predecessor
		for phi in block.phi_instrs.iter() {
			for (value, label) in phi.source.iter() {
				if let Value::Temp(t) = value {
					let pred = block
						.prev
						.iter()
						.find(|v| v.borrow().label() == *label)
						.cloned()
						.ok_or_else(|| err("phi source without predecessor"))?;
					check_use(t, (pred.borrow().id, usize::MAX))?;
				}
			}
		}
		for (idx, instr) in block.instrs.iter().enumerate() {
			for temp in instr.get_read() {
				check_use(&temp, (block.id, idx + 1))?;
			}
		}
		if let Some(term) = block.jump_instr.as_ref() {
			for temp in term.get_read() {
				check_use(&temp, (block.id, usize::MAX))?;
			}
		}
	}
	check_reachable_defs(func)
}

// Temps defined in unreachable blocks must not leak into reachable code;
// the dominance walk above cannot see those blocks.
fn check_reachable_defs(func: &TirFunc) -> Result<()> {
	let mut reachable = HashSet::new();
	let mut stack = vec![func.cfg.get_entry()];
	while let Some(node) = stack.pop() {
		if !reachable.insert(node.borrow().id) {
			continue;
		}
		let succ: Vec<TirNode> = node.borrow().succ.clone();
		stack.extend(succ);
	}
	for node in func.cfg.blocks.iter() {
		if !reachable.contains(&node.borrow().id) {
			return Err(err(format!(
				"unreachable block {} still linked in cfg",
				node.borrow().label()
			)));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::builder::build_program;
	use tir::parser::parse;

	#[test]
	fn accepts_well_formed_loop() {
		let src = r#"
define void @f(i32 %n) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B1]
		%2 = add i32 %1, 1
		%3 = icmp slt i32 %2, %n
		br i32 %3, label %B1, label %B2
	B2:
		ret void
}
"#;
		let program = build_program(parse(src).unwrap()).unwrap();
		super::verify_func(&program.funcs[0]).unwrap();
	}

	#[test]
	fn rejects_use_without_dominating_def() {
		let src = r#"
define void @f(i32 %n) {
	entry:
		%1 = icmp slt i32 %n, 10
		br i32 %1, label %B1, label %B2
	B1:
		%2 = add i32 %n, 1
		br label %B3
	B2:
		br label %B3
	B3:
		%3 = add i32 %2, 1
		ret void
}
"#;
		let program = build_program(parse(src).unwrap()).unwrap();
		assert!(super::verify_func(&program.funcs[0]).is_err());
	}
}

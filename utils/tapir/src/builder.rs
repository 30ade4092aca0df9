use std::{cell::RefCell, collections::HashMap, rc::Rc};

use tir::{
	parser::{ParsedFunc, ParsedProgram},
	TirInstrTrait, TirInstrVariant,
};
use utils::{errors::Result, from_label, Label, TapircError::SyntaxError};

use crate::{
	basicblock::{BasicBlock, TirNode},
	cfg::CFG,
	func::TirFunc,
	program::TirProgram,
};

// Turn the parser's flat instruction lists into a linked CFG program.
pub fn build_program(parsed: ParsedProgram) -> Result<TirProgram> {
	let mut program = TirProgram::new(parsed.temp_mgr);
	for func in parsed.funcs {
		program.funcs.push(build_func(func)?);
	}
	Ok(program)
}

fn err(msg: impl std::fmt::Display) -> utils::TapircError {
	SyntaxError(msg.to_string())
}

fn seal_block(
	current: &mut Option<BasicBlock>,
	blocks: &mut Vec<BasicBlock>,
) -> Result<()> {
	if let Some(done) = current.take() {
		if done.jump_instr.is_none() {
			return Err(err(format!("block {} has no terminator", done.label())));
		}
		blocks.push(done);
	}
	Ok(())
}

fn build_func(parsed: ParsedFunc) -> Result<TirFunc> {
	let mut blocks = Vec::new();
	let mut current: Option<BasicBlock> = None;
	for instr in parsed.body {
		let label = match instr.get_variant() {
			TirInstrVariant::LabelInstr(l) => Some(l.label.clone()),
			_ => None,
		};
		if let Some(label) = label {
			seal_block(&mut current, &mut blocks)?;
			let id = from_label(&label)
				.ok_or_else(|| err(format!("unrecognized label {}", label)))?;
			current = Some(BasicBlock::new(id, 1.0));
			continue;
		}
		let block = current
			.as_mut()
			.ok_or_else(|| err("instruction before first label"))?;
		if block.jump_instr.is_some() {
			return Err(err(format!(
				"unreachable instruction after terminator in {}",
				block.label()
			)));
		}
		if instr.is_phi() {
			if !block.instrs.is_empty() {
				return Err(err("phi after non-phi instruction"));
			}
			let phi = match instr.get_variant() {
				TirInstrVariant::PhiInstr(p) => p.clone(),
				_ => unreachable!(),
			};
			block.push_phi(phi);
		} else if instr.is_terminator() {
			block.set_jump(Some(instr));
		} else {
			block.push(instr);
		}
	}
	seal_block(&mut current, &mut blocks)?;
	if blocks.is_empty() {
		return Err(err(format!("function {} has no blocks", parsed.name)));
	}
	if blocks[0].id != 0 {
		return Err(err(format!(
			"function {} does not start with entry",
			parsed.name
		)));
	}

	let mut cfg = CFG { blocks: Vec::new() };
	let mut by_label: HashMap<Label, TirNode> = HashMap::new();
	for block in blocks {
		let label = block.label();
		let node = Rc::new(RefCell::new(block));
		if by_label.insert(label.clone(), node.clone()).is_some() {
			return Err(err(format!("duplicate label {}", label)));
		}
		cfg.blocks.push(node);
	}
	for node in cfg.blocks.iter() {
		let succ_labels =
			node.borrow().jump_instr.as_ref().unwrap().get_succ_labels();
		let mut succ = Vec::new();
		for label in succ_labels {
			let target = by_label
				.get(&label)
				.ok_or_else(|| err(format!("jump to unknown label {}", label)))?;
			succ.push(target.clone());
		}
		node.borrow_mut().succ = succ;
	}
	cfg.resolve_prev();
	Ok(TirFunc::new(cfg, parsed.name, parsed.ret_type, parsed.params))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tir::parser::parse;

	#[test]
	fn build_links_edges() {
		let src = r#"
define i32 @sum(i32 %n) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%3, %B2]
		%2 = phi i32 [0, %entry], [%4, %B2]
		%5 = icmp slt i32 %1, %n
		br i32 %5, label %B2, label %B3
	B2:
		%4 = add i32 %2, %1
		%3 = add i32 %1, 1
		br label %B1
	B3:
		ret i32 %2
}
"#;
		let program = build_program(parse(src).unwrap()).unwrap();
		let func = &program.funcs[0];
		assert_eq!(func.cfg.size(), 4);
		let header = func.cfg.get_node(1).unwrap();
		assert_eq!(header.borrow().prev.len(), 2);
		assert_eq!(header.borrow().succ.len(), 2);
		assert_eq!(header.borrow().phi_instrs.len(), 2);
		assert_eq!(func.total, 3);
		crate::verify::verify_func(func).unwrap();
	}

	#[test]
	fn terminator_required() {
		let src = r#"
define void @f() {
	entry:
		%1 = add i32 1, 2
}
"#;
		assert!(build_program(parse(src).unwrap()).is_err());
	}
}

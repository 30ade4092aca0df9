use std::collections::HashMap;

use pest::{iterators::Pair, Parser};
use pest_derive::Parser;
use utils::{
	errors::Result,
	Label,
	TapircError::{self, SyntaxError},
};

use crate::{
	temp::Temp, tirinstr::*, tirop::*, tirvar::VarType, TirTempManager,
};

#[derive(Parser)]
#[grammar = "tir.pest"]
struct IrParser;

pub struct ParsedFunc {
	pub name: String,
	pub ret_type: VarType,
	pub params: Vec<Value>,
	// Flat instruction list; block boundaries are LabelInstr markers.
	pub body: Vec<TirInstr>,
}

pub struct ParsedProgram {
	pub funcs: Vec<ParsedFunc>,
	pub temp_mgr: TirTempManager,
}

pub fn parse(str: &str) -> Result<ParsedProgram> {
	let mut program = IrParser::parse(Rule::Program, str)
		.map_err(|e| SyntaxError(e.to_string()))?;
	let mut funcs = Vec::new();
	let mut max_temp = 0u32;
	for pair in program.next().unwrap().into_inner() {
		if pair.as_rule() == Rule::Func {
			funcs.push(parse_func(pair, &mut max_temp)?);
		}
	}
	Ok(ParsedProgram {
		funcs,
		temp_mgr: TirTempManager { total: max_temp },
	})
}

fn err(msg: impl std::fmt::Display) -> TapircError {
	SyntaxError(msg.to_string())
}

fn parse_type(s: &str) -> VarType {
	match s {
		"i32" => VarType::I32,
		"i64" => VarType::I64,
		"f32" => VarType::F32,
		"i32*" => VarType::I32Ptr,
		"i64*" => VarType::I64Ptr,
		"f32*" => VarType::F32Ptr,
		"i8*" => VarType::VoidPtr,
		"void" => VarType::Void,
		_ => unreachable!(),
	}
}

fn parse_arith_op(s: &str) -> ArithOp {
	match s {
		"add" => ArithOp::Add,
		"sub" => ArithOp::Sub,
		"div" => ArithOp::Div,
		"mul" => ArithOp::Mul,
		"rem" => ArithOp::Rem,
		"fadd" => ArithOp::Fadd,
		"fsub" => ArithOp::Fsub,
		"fdiv" => ArithOp::Fdiv,
		"fmul" => ArithOp::Fmul,
		"shl" => ArithOp::Shl,
		"lshr" => ArithOp::Lshr,
		"ashr" => ArithOp::Ashr,
		"and" => ArithOp::And,
		"or" => ArithOp::Or,
		"xor" => ArithOp::Xor,
		_ => unreachable!(),
	}
}

fn parse_comp_op(s: &str) -> CompOp {
	match s {
		"eq" => CompOp::EQ,
		"ne" => CompOp::NE,
		"sgt" => CompOp::SGT,
		"sge" => CompOp::SGE,
		"slt" => CompOp::SLT,
		"sle" => CompOp::SLE,
		"ugt" => CompOp::UGT,
		"uge" => CompOp::UGE,
		"ult" => CompOp::ULT,
		"ule" => CompOp::ULE,
		"oeq" => CompOp::OEQ,
		"one" => CompOp::ONE,
		"ogt" => CompOp::OGT,
		"oge" => CompOp::OGE,
		"olt" => CompOp::OLT,
		"ole" => CompOp::OLE,
		_ => unreachable!(),
	}
}

fn parse_convert_op(s: &str) -> ConvertOp {
	match s {
		"sext" => ConvertOp::SExt,
		"zext" => ConvertOp::ZExt,
		"trunc" => ConvertOp::Trunc,
		"sitofp" => ConvertOp::Int2Float,
		"fptosi" => ConvertOp::Float2Int,
		_ => unreachable!(),
	}
}

// Temps are typed at their definition; operand positions only name them.
struct FuncCtx {
	def_types: HashMap<String, VarType>,
}

impl FuncCtx {
	fn resolve(&self, pair: &Pair<Rule>, hint: VarType) -> Result<Value> {
		let inner = pair.as_str();
		match pair.as_rule() {
			Rule::IntLit => {
				let v: i64 = inner.parse().map_err(err)?;
				Ok(match hint {
					VarType::I64 => Value::Int64(v),
					_ => Value::Int(v as i32),
				})
			}
			Rule::FloatLit => Ok(Value::Float(inner.parse().map_err(err)?)),
			Rule::LocalTemp => {
				let name = inner.trim_start_matches('%');
				let var_type = self
					.def_types
					.get(name)
					.copied()
					.ok_or_else(|| err(format!("use of undefined temp %{}", name)))?;
				Ok(Value::Temp(Temp::new(name, var_type, false)))
			}
			Rule::GlobalTemp => {
				let name = inner.trim_start_matches('@');
				Ok(Value::Temp(Temp::new(name, hint, true)))
			}
			_ => unreachable!(),
		}
	}
}

fn target_name(pair: &Pair<Rule>) -> String {
	pair.as_str().trim_start_matches('%').to_string()
}

fn update_max_temp(name: &str, max_temp: &mut u32) {
	if let Ok(n) = name.parse::<u32>() {
		*max_temp = (*max_temp).max(n);
	}
}

// First pass: record the type every temp is defined with, so the second
// pass can type operands from their definitions.
fn collect_def_types(
	items: &[Pair<Rule>],
	ctx: &mut FuncCtx,
	max_temp: &mut u32,
) -> Result<()> {
	for item in items {
		let instr = match item.clone().into_inner().next() {
			Some(p) if p.as_rule() == Rule::Instr => p.into_inner().next().unwrap(),
			_ => continue,
		};
		let rule = instr.as_rule();
		let mut inner = instr.into_inner();
		let (name, var_type) = match rule {
			Rule::Phi | Rule::Load | Rule::Alloca | Rule::Gep => {
				let name = target_name(&inner.next().unwrap());
				(name, parse_type(inner.next().unwrap().as_str()))
			}
			Rule::Arith => {
				let name = target_name(&inner.next().unwrap());
				let _op = inner.next();
				(name, parse_type(inner.next().unwrap().as_str()))
			}
			Rule::Comp => {
				let name = target_name(&inner.next().unwrap());
				(name, VarType::I32)
			}
			Rule::Convert => {
				let name = target_name(&inner.next().unwrap());
				// target type is the trailing "to" type
				let to = inner.rev().next().unwrap();
				(name, parse_type(to.as_str()))
			}
			Rule::Call => {
				let name = target_name(&inner.next().unwrap());
				(name, parse_type(inner.next().unwrap().as_str()))
			}
			_ => continue,
		};
		update_max_temp(&name, max_temp);
		if ctx.def_types.insert(name.clone(), var_type).is_some() {
			return Err(err(format!("temp %{} defined twice", name)));
		}
	}
	Ok(())
}

fn parse_func(pair: Pair<Rule>, max_temp: &mut u32) -> Result<ParsedFunc> {
	let mut inner = pair.into_inner();
	let ret_type = parse_type(inner.next().unwrap().as_str());
	let name = inner.next().unwrap().as_str().trim_start_matches('@').to_string();

	let mut ctx = FuncCtx {
		def_types: HashMap::new(),
	};
	let mut params = Vec::new();
	let mut items = Vec::new();
	for p in inner {
		match p.as_rule() {
			Rule::Params => {
				for param in p.into_inner() {
					let mut parts = param.into_inner();
					let var_type = parse_type(parts.next().unwrap().as_str());
					let pname = target_name(&parts.next().unwrap());
					update_max_temp(&pname, max_temp);
					ctx.def_types.insert(pname.clone(), var_type);
					params.push(Value::Temp(Temp::new(pname, var_type, false)));
				}
			}
			Rule::Item => items.push(p),
			_ => {}
		}
	}

	collect_def_types(&items, &mut ctx, max_temp)?;

	let mut body: Vec<TirInstr> = Vec::new();
	for item in items {
		let inner = item.into_inner().next().unwrap();
		match inner.as_rule() {
			Rule::LabelDef => {
				let label =
					Label::new(inner.into_inner().next().unwrap().as_str());
				body.push(Box::new(LabelInstr { label }));
			}
			Rule::Instr => {
				body.push(parse_instr(inner.into_inner().next().unwrap(), &ctx)?)
			}
			_ => unreachable!(),
		}
	}

	Ok(ParsedFunc {
		name,
		ret_type,
		params,
		body,
	})
}

fn parse_instr(instr: Pair<Rule>, ctx: &FuncCtx) -> Result<TirInstr> {
	let rule = instr.as_rule();
	let mut inner = instr.into_inner();
	match rule {
		Rule::Arith => {
			let target = target_name(&inner.next().unwrap());
			let op = parse_arith_op(inner.next().unwrap().as_str());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let lhs = ctx.resolve(&inner.next().unwrap(), var_type)?;
			let rhs = ctx.resolve(&inner.next().unwrap(), var_type)?;
			Ok(Box::new(ArithInstr {
				target: Temp::new(target, var_type, false),
				op,
				var_type,
				lhs,
				rhs,
			}))
		}
		Rule::Comp => {
			let target = target_name(&inner.next().unwrap());
			let kind = match inner.next().unwrap().as_str() {
				"icmp" => CompKind::Icmp,
				_ => CompKind::Fcmp,
			};
			let op = parse_comp_op(inner.next().unwrap().as_str());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let lhs = ctx.resolve(&inner.next().unwrap(), var_type)?;
			let rhs = ctx.resolve(&inner.next().unwrap(), var_type)?;
			Ok(Box::new(CompInstr {
				kind,
				target: Temp::new(target, VarType::I32, false),
				op,
				var_type,
				lhs,
				rhs,
			}))
		}
		Rule::Convert => {
			let target = target_name(&inner.next().unwrap());
			let op = parse_convert_op(inner.next().unwrap().as_str());
			let from_type = parse_type(inner.next().unwrap().as_str());
			let lhs = ctx.resolve(&inner.next().unwrap(), from_type)?;
			let to_type = parse_type(inner.next().unwrap().as_str());
			Ok(Box::new(ConvertInstr {
				target: Temp::new(target, to_type, false),
				op,
				from_type,
				to_type,
				lhs,
			}))
		}
		Rule::Phi => {
			let target = target_name(&inner.next().unwrap());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let mut source = Vec::new();
			for src in inner {
				let mut parts = src.into_inner();
				let value = ctx.resolve(&parts.next().unwrap(), var_type)?;
				let label = Label::new(parts.next().unwrap().as_str());
				source.push((value, label));
			}
			Ok(Box::new(PhiInstr {
				target: Temp::new(target, var_type, false),
				var_type,
				source,
			}))
		}
		Rule::Load => {
			let target = target_name(&inner.next().unwrap());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let addr = ctx.resolve(&inner.next().unwrap(), crate::type2ptr(var_type))?;
			Ok(Box::new(LoadInstr {
				target: Temp::new(target, var_type, false),
				var_type,
				addr,
			}))
		}
		Rule::Alloca => {
			let target = target_name(&inner.next().unwrap());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let length = ctx.resolve(&inner.next().unwrap(), VarType::I32)?;
			Ok(Box::new(AllocInstr {
				target: Temp::new(target, var_type, false),
				length,
				var_type,
			}))
		}
		Rule::Gep => {
			let target = target_name(&inner.next().unwrap());
			let var_type = parse_type(inner.next().unwrap().as_str());
			let addr = ctx.resolve(&inner.next().unwrap(), var_type)?;
			let offset = ctx.resolve(&inner.next().unwrap(), VarType::I32)?;
			Ok(Box::new(GEPInstr {
				target: Temp::new(target, var_type, false),
				var_type,
				addr,
				offset,
			}))
		}
		Rule::Call | Rule::VoidCall => {
			let (target, var_type) = if rule == Rule::Call {
				let t = target_name(&inner.next().unwrap());
				let ty = parse_type(inner.next().unwrap().as_str());
				(t, ty)
			} else {
				("void".to_string(), VarType::Void)
			};
			let func = Label::new(
				inner.next().unwrap().as_str().trim_start_matches('@'),
			);
			let mut params = Vec::new();
			if let Some(list) = inner.next() {
				for param in list.into_inner() {
					let mut parts = param.into_inner();
					let ty = parse_type(parts.next().unwrap().as_str());
					let value = ctx.resolve(&parts.next().unwrap(), ty)?;
					params.push((ty, value));
				}
			}
			Ok(Box::new(CallInstr {
				target: Temp::new(target, var_type, false),
				var_type,
				func,
				params,
			}))
		}
		Rule::Store => {
			let var_type = parse_type(inner.next().unwrap().as_str());
			let value = ctx.resolve(&inner.next().unwrap(), var_type)?;
			let addr = ctx.resolve(&inner.next().unwrap(), crate::type2ptr(var_type))?;
			Ok(Box::new(StoreInstr { value, addr }))
		}
		Rule::Branch => {
			let target = Label::new(inner.next().unwrap().as_str());
			Ok(Box::new(JumpInstr { target }))
		}
		Rule::CondBranch => {
			let var_type = parse_type(inner.next().unwrap().as_str());
			let cond = ctx.resolve(&inner.next().unwrap(), var_type)?;
			let target_true = Label::new(inner.next().unwrap().as_str());
			let target_false = Label::new(inner.next().unwrap().as_str());
			Ok(Box::new(JumpCondInstr {
				var_type,
				cond,
				target_true,
				target_false,
			}))
		}
		Rule::Ret => {
			let var_type = parse_type(inner.next().unwrap().as_str());
			let value = match inner.next() {
				Some(v) => Some(ctx.resolve(&v, var_type)?),
				None => None,
			};
			Ok(Box::new(RetInstr { value }))
		}
		Rule::Detach => {
			let task = Label::new(inner.next().unwrap().as_str());
			let next = Label::new(inner.next().unwrap().as_str());
			Ok(Box::new(DetachInstr { task, next }))
		}
		Rule::Reattach => {
			let next = Label::new(inner.next().unwrap().as_str());
			Ok(Box::new(ReattachInstr { next }))
		}
		Rule::Sync => {
			let next = Label::new(inner.next().unwrap().as_str());
			Ok(Box::new(SyncInstr { next }))
		}
		_ => unreachable!(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const LOOP_SRC: &str = r#"
define void @main(i32 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%5, %B4]
		%2 = icmp slt i32 %1, %n
		br i32 %2, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%3 = getelementptr i32*, %a, %1
		store i32 %1, %3
		reattach label %B4
	B4:
		%5 = add i32 %1, 1
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;

	#[test]
	fn parse_detach_loop() {
		let parsed = parse(LOOP_SRC).unwrap();
		assert_eq!(parsed.funcs.len(), 1);
		let func = &parsed.funcs[0];
		assert_eq!(func.name, "main");
		assert_eq!(func.params.len(), 2);
		assert_eq!(func.ret_type, VarType::Void);
		let labels =
			func.body.iter().filter(|v| matches!(v.get_variant(), crate::TirInstrVariant::LabelInstr(_))).count();
		assert_eq!(labels, 7);
		assert!(func.body.iter().any(|v| v.is_detach()));
		assert!(func.body.iter().any(|v| v.is_sync()));
		assert!(parsed.temp_mgr.total >= 5);
	}

	#[test]
	fn operands_typed_from_defs() {
		let src = r#"
define i32 @f(i64 %x) {
	entry:
		%1 = add i64 %x, 3
		%2 = trunc i64 %1 to i32
		ret i32 %2
}
"#;
		let parsed = parse(src).unwrap();
		let body = &parsed.funcs[0].body;
		let add = body.iter().find_map(|v| match v.get_variant() {
			crate::TirInstrVariant::ArithInstr(i) => Some(i.clone()),
			_ => None,
		});
		let add = add.unwrap();
		assert_eq!(add.var_type, VarType::I64);
		assert_eq!(add.rhs, Value::Int64(3));
	}

	#[test]
	fn undefined_temp_is_rejected() {
		let src = r#"
define void @f() {
	entry:
		%1 = add i32 %ghost, 1
		ret void
}
"#;
		assert!(parse(src).is_err());
	}
}

use crate::HandleLoops;
use tapir::{builder::build_program, prelude::*, verify::verify_func};
use tir::{
	parser::parse, CallInstr, TirInstrTrait, TirInstrVariant, Value, VarType,
};
use utils::UseTemp;

fn compile(src: &str) -> TirProgram {
	let mut program = build_program(parse(src).unwrap()).unwrap();
	for func in program.funcs.iter() {
		verify_func(func).unwrap();
	}
	let mut handle = HandleLoops::new(&mut program);
	handle.loop_simplify(&mut program).unwrap();
	handle.loop_to_cilk(&mut program).unwrap();
	for func in program.funcs.iter() {
		verify_func(func).unwrap();
	}
	program
}

fn runtime_call(func: &TirFunc) -> Option<CallInstr> {
	let mut found = None;
	for node in func.cfg.blocks.iter() {
		for instr in node.borrow().instrs.iter() {
			if let TirInstrVariant::CallInstr(call) = instr.get_variant() {
				if call.func.name.starts_with("__cilkrts_cilk_for") {
					assert!(found.is_none(), "runtime call emitted more than once");
					found = Some(call.clone());
				}
			}
		}
	}
	found
}

fn has_parallel_terminators(func: &TirFunc) -> bool {
	func.cfg.blocks.iter().any(|node| {
		node
			.borrow()
			.jump_instr
			.as_ref()
			.is_some_and(|t| t.is_detach() || t.is_reattach())
	})
}

fn body_func<'a>(program: &'a TirProgram, parent: &str) -> &'a TirFunc {
	program
		.funcs
		.iter()
		.find(|f| f.name.starts_with(&format!("{}.body", parent)))
		.expect("extracted body function missing")
}

const UNIT_STRIDE: &str = r#"
define void @f(i32 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B4]
		%3 = icmp slt i32 %1, %n
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = getelementptr i32*, %a, %1
		store i32 %1, %4
		reattach label %B4
	B4:
		%2 = add i32 %1, 1
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;

#[test]
fn unit_stride_ascending_becomes_runtime_call() {
	let program = compile(UNIT_STRIDE);
	let main = &program.funcs[0];
	assert!(!has_parallel_terminators(main));
	let call = runtime_call(main).expect("runtime call missing");
	assert_eq!(call.func.name, "__cilkrts_cilk_for_32");
	assert_eq!(call.params.len(), 4);
	// body function, closure, trip count, grain 0
	assert!(matches!(call.params[0].1, Value::Func(_)));
	assert_eq!(call.params[2].1.get_type(), VarType::I32);
	assert_eq!(call.params[3].1, Value::Int(0));

	let body = body_func(&program, "f");
	assert_eq!(body.params.len(), 3);
	assert_eq!(body.params[0].get_type(), VarType::VoidPtr);
	assert_eq!(body.params[1].get_type(), VarType::I32);
	// the former detached block must still be a block of the body
	assert!(body.cfg.blocks.iter().any(|v| v.borrow().id == 3));
	assert!(body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| i.is_store())
	}));
}

#[test]
fn rewrite_is_idempotent() {
	let mut program = compile(UNIT_STRIDE);
	let before = program.to_string();
	let mut handle = HandleLoops::new(&mut program);
	assert!(!handle.loop_simplify(&mut program).unwrap());
	assert!(!handle.loop_to_cilk(&mut program).unwrap());
	assert_eq!(before, program.to_string());
}

#[test]
fn non_unit_stride_with_offset_start() {
	// for (i = 3; i <= 17; i += 2): eight iterations
	let src = r#"
define void @f(i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [3, %entry], [%2, %B4]
		%3 = icmp sle i32 %1, 17
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = getelementptr i32*, %a, %1
		store i32 %1, %4
		reattach label %B4
	B4:
		%2 = add i32 %1, 2
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	let call = runtime_call(&program.funcs[0]).expect("runtime call missing");
	assert_eq!(call.params[2].1, Value::Int(8));
	// inside the body every use of i reads 3 + 2 * index
	let body = body_func(&program, "f");
	let has_scale = body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| match i.get_variant() {
			TirInstrVariant::ArithInstr(a) => {
				a.op == tir::ArithOp::Mul && a.rhs == Value::Int(2)
			}
			_ => false,
		})
	});
	let has_offset = body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| match i.get_variant() {
			TirInstrVariant::ArithInstr(a) => {
				a.op == tir::ArithOp::Add && a.rhs == Value::Int(3)
			}
			_ => false,
		})
	});
	assert!(has_scale && has_offset);
}

#[test]
fn descending_loop_normalizes_the_subtraction() {
	// for (i = 10; i > 0; i -= 1): ten iterations
	let src = r#"
define void @f(i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [10, %entry], [%2, %B4]
		%3 = icmp sgt i32 %1, 0
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = getelementptr i32*, %a, %1
		store i32 %1, %4
		reattach label %B4
	B4:
		%2 = sub i32 %1, 1
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	let call = runtime_call(&program.funcs[0]).expect("runtime call missing");
	assert_eq!(call.params[2].1, Value::Int(10));
	// i is rebuilt as 10 + (-1) * index
	let body = body_func(&program, "f");
	let has_scale = body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| match i.get_variant() {
			TirInstrVariant::ArithInstr(a) => {
				a.op == tir::ArithOp::Mul && a.rhs == Value::Int(-1)
			}
			_ => false,
		})
	});
	assert!(has_scale);
}

#[test]
fn comparison_against_the_increment() {
	// for (i = 0; ++i < n; ...): the bound side reads the increment
	let src = r#"
define void @f(i32 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B4]
		detach label %B3, label %B4
	B3:
		%5 = getelementptr i32*, %a, %1
		store i32 %1, %5
		reattach label %B4
	B4:
		%2 = add i32 %1, 1
		%3 = icmp slt i32 %2, %n
		br i32 %3, label %B1, label %B5
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	let main = &program.funcs[0];
	assert!(!has_parallel_terminators(main));
	let call = runtime_call(main).expect("runtime call missing");
	assert_eq!(call.params[2].1.get_type(), VarType::I32);
	assert!(body_func(&program, "f").cfg.blocks.len() >= 5);
}

#[test]
fn secondary_induction_variable_is_folded_away() {
	// i counts 0..n by one while j runs 100, 97, 94, ...
	let src = r#"
define void @f(i32 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B4]
		%5 = phi i32 [100, %entry], [%6, %B4]
		%3 = icmp slt i32 %1, %n
		br i32 %3, label %B2, label %B7
	B2:
		detach label %B3, label %B4
	B3:
		%7 = getelementptr i32*, %a, %1
		store i32 %5, %7
		reattach label %B4
	B4:
		%2 = add i32 %1, 1
		%6 = sub i32 %5, 3
		br label %B1
	B7:
		sync label %B8
	B8:
		ret void
}
"#;
	let program = compile(src);
	let main = &program.funcs[0];
	assert!(runtime_call(main).is_some());
	// neither j's phi nor its decrement survives anywhere
	for func in program.funcs.iter() {
		for node in func.cfg.blocks.iter() {
			assert!(node.borrow().phi_instrs.iter().all(|p| p.target.name != "5"));
			for instr in node.borrow().instrs.iter() {
				if let Some(t) = instr.get_write() {
					assert!(t.name != "6");
				}
			}
		}
	}
	// j's value is rebuilt as 100 + (-3) * i inside the body
	let body = body_func(&program, "f");
	let has_scale = body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| match i.get_variant() {
			TirInstrVariant::ArithInstr(a) => {
				a.op == tir::ArithOp::Mul && a.rhs == Value::Int(-3)
			}
			_ => false,
		})
	});
	let has_offset = body.cfg.blocks.iter().any(|node| {
		node.borrow().instrs.iter().any(|i| match i.get_variant() {
			TirInstrVariant::ArithInstr(a) => {
				a.op == tir::ArithOp::Add && a.rhs == Value::Int(100)
			}
			_ => false,
		})
	});
	assert!(has_scale && has_offset);
}

#[test]
fn inequality_exit_with_non_unit_step_is_rejected() {
	let src = r#"
define void @f(i32 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B4]
		%3 = icmp ne i32 %1, %n
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = getelementptr i32*, %a, %1
		store i32 %1, %4
		reattach label %B4
	B4:
		%2 = add i32 %1, 2
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	let main = &program.funcs[0];
	assert_eq!(program.funcs.len(), 1);
	assert!(runtime_call(main).is_none());
	// the detach frame is untouched
	assert!(has_parallel_terminators(main));
}

#[test]
fn sixty_four_bit_counter_selects_the_wide_entry_point() {
	let src = r#"
define void @f(i64 %n, i32* %a) {
	entry:
		br label %B1
	B1:
		%1 = phi i64 [0, %entry], [%2, %B4]
		%3 = icmp slt i64 %1, %n
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = trunc i64 %1 to i32
		%5 = getelementptr i32*, %a, %4
		store i32 %4, %5
		reattach label %B4
	B4:
		%2 = add i64 %1, 1
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	let call = runtime_call(&program.funcs[0]).expect("runtime call missing");
	assert_eq!(call.func.name, "__cilkrts_cilk_for_64");
	assert_eq!(call.params[2].1.get_type(), VarType::I64);
	let body = body_func(&program, "f");
	assert_eq!(body.params[1].get_type(), VarType::I64);
}

#[test]
fn loop_body_with_an_effectful_call_is_left_alone() {
	// calls may not be hoisted out of the detacher, so a dirty detach
	// block rejects the loop
	let src = r#"
define void @f(i32 %n) {
	entry:
		br label %B1
	B1:
		%1 = phi i32 [0, %entry], [%2, %B4]
		%3 = icmp slt i32 %1, %n
		br i32 %3, label %B2, label %B5
	B2:
		%4 = call i32 @side_effect(i32 %1)
		detach label %B3, label %B4
	B3:
		%5 = add i32 %4, 1
		reattach label %B4
	B4:
		%2 = add i32 %1, 1
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	assert!(runtime_call(&program.funcs[0]).is_none());
	assert!(has_parallel_terminators(&program.funcs[0]));
}

#[test]
fn masked_counter_behind_a_stack_slot_is_promoted() {
	// the exit test loads i from a stack slot; mem2reg inside the
	// canonicalizer exposes the phi
	let src = r#"
define void @f(i32 %n, i32* %a) {
	entry:
		%9 = alloca i32*, 4
		store i32 0, %9
		br label %B1
	B1:
		%1 = load i32, %9
		%3 = icmp slt i32 %1, %n
		br i32 %3, label %B2, label %B5
	B2:
		detach label %B3, label %B4
	B3:
		%4 = getelementptr i32*, %a, %1
		store i32 %1, %4
		reattach label %B4
	B4:
		%2 = add i32 %1, 1
		store i32 %2, %9
		br label %B1
	B5:
		sync label %B6
	B6:
		ret void
}
"#;
	let program = compile(src);
	assert!(runtime_call(&program.funcs[0]).is_some());
	assert!(!has_parallel_terminators(&program.funcs[0]));
}

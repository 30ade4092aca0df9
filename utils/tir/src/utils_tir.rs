use crate::{
	ArithInstr, ArithOp, TirInstr, TirTemp, TirTempManager, Value, VarType,
};

pub fn unwrap_values(arr: Vec<&Value>) -> Vec<TirTemp> {
	arr.into_iter().flat_map(|v| v.unwrap_temp()).collect()
}

pub fn get_int(v: &Value) -> Option<i64> {
	match v {
		Value::Int(i) => Some(*i as i64),
		Value::Int64(i) => Some(*i),
		_ => None,
	}
}

pub fn is_zero(v: &Value) -> bool {
	get_int(v) == Some(0)
}

pub fn is_one(v: &Value) -> bool {
	get_int(v) == Some(1)
}

// An integer literal of the given width.
pub fn int_value(var_type: VarType, v: i64) -> Value {
	match var_type {
		VarType::I64 => Value::Int64(v),
		_ => Value::Int(v as i32),
	}
}

fn fold_int(i1: i64, i2: i64, op: ArithOp) -> i64 {
	match op {
		ArithOp::Add => i1.wrapping_add(i2),
		ArithOp::Sub => i1.wrapping_sub(i2),
		ArithOp::Mul => i1.wrapping_mul(i2),
		ArithOp::Div => i1 / i2,
		ArithOp::Rem => i1 % i2,
		_ => unreachable!(),
	}
}

// Combine two integer values, folding constants and algebraic identities.
// Emits at most one new instruction, which the caller must place.
pub fn compute_two_value(
	v1: Value,
	v2: Value,
	op: ArithOp,
	temp_mgr: &mut TirTempManager,
) -> (Value, Option<TirInstr>) {
	match (v1.clone(), v2.clone()) {
		(Value::Int(i1), Value::Int(i2)) => {
			(Value::Int(fold_int(i1 as i64, i2 as i64, op) as i32), None)
		}
		(Value::Int64(i1), Value::Int64(i2)) => {
			(Value::Int64(fold_int(i1, i2, op)), None)
		}
		(Value::Int(_) | Value::Int64(_), Value::Temp(t2)) => {
			assert!(t2.var_type.is_int());
			match (get_int(&v1).unwrap(), op) {
				(0, ArithOp::Add) | (1, ArithOp::Mul) => (v2, None),
				(0, ArithOp::Mul) => (int_value(t2.var_type, 0), None),
				_ => {
					let target = temp_mgr.new_temp(t2.var_type, false);
					let instr = ArithInstr {
						target: target.clone(),
						op,
						var_type: t2.var_type,
						lhs: v1,
						rhs: v2,
					};
					(Value::Temp(target), Some(Box::new(instr)))
				}
			}
		}
		(Value::Temp(t1), Value::Int(_) | Value::Int64(_)) => {
			assert!(t1.var_type.is_int());
			match (get_int(&v2).unwrap(), op) {
				(0, ArithOp::Add | ArithOp::Sub)
				| (1, ArithOp::Mul | ArithOp::Div) => (v1, None),
				(0, ArithOp::Mul) => (int_value(t1.var_type, 0), None),
				_ => {
					let target = temp_mgr.new_temp(t1.var_type, false);
					let instr = ArithInstr {
						target: target.clone(),
						op,
						var_type: t1.var_type,
						lhs: v1,
						rhs: v2,
					};
					(Value::Temp(target), Some(Box::new(instr)))
				}
			}
		}
		(Value::Temp(t1), Value::Temp(t2)) => {
			assert!(t1.var_type == t2.var_type);
			let target = temp_mgr.new_temp(t1.var_type, false);
			let instr = ArithInstr {
				target: target.clone(),
				op,
				var_type: t1.var_type,
				lhs: v1,
				rhs: v2,
			};
			(Value::Temp(target), Some(Box::new(instr)))
		}
		_ => unreachable!(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fold_literals() {
		let mut mgr = TirTempManager::new();
		let (v, i) =
			compute_two_value(Value::Int(14), Value::Int(2), ArithOp::Div, &mut mgr);
		assert!(i.is_none());
		assert_eq!(v, Value::Int(7));
	}

	#[test]
	fn identities_keep_the_temp() {
		let mut mgr = TirTempManager::new();
		let t = mgr.new_temp(VarType::I32, false);
		let (v, i) = compute_two_value(
			Value::Temp(t.clone()),
			Value::Int(0),
			ArithOp::Add,
			&mut mgr,
		);
		assert!(i.is_none());
		assert_eq!(v, Value::Temp(t.clone()));
		let (v, i) =
			compute_two_value(Value::Temp(t), Value::Int(1), ArithOp::Mul, &mut mgr);
		assert!(i.is_none());
		assert!(matches!(v, Value::Temp(_)));
	}

	#[test]
	fn mixed_operands_emit_an_instr() {
		let mut mgr = TirTempManager::new();
		let t = mgr.new_temp(VarType::I64, false);
		let (v, i) = compute_two_value(
			Value::Temp(t),
			Value::Int64(3),
			ArithOp::Mul,
			&mut mgr,
		);
		assert!(i.is_some());
		assert_eq!(v.get_type(), VarType::I64);
	}
}

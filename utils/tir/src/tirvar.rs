use std::fmt::Display;

use crate::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarType {
	I32,
	I64,
	F32,
	I32Ptr,
	I64Ptr,
	F32Ptr,
	VoidPtr,
	Void,
}

impl Display for VarType {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let type_str = match self {
			Self::I32 => "i32",
			Self::I64 => "i64",
			Self::F32 => "f32",
			Self::I32Ptr => "i32*",
			Self::I64Ptr => "i64*",
			Self::F32Ptr => "f32*",
			Self::VoidPtr => "i8*",
			Self::Void => "void",
		};
		write!(f, "{}", type_str)
	}
}

impl VarType {
	pub fn is_ptr(&self) -> bool {
		matches!(
			self,
			Self::I32Ptr | Self::I64Ptr | Self::F32Ptr | Self::VoidPtr
		)
	}
	pub fn is_int(&self) -> bool {
		matches!(self, Self::I32 | Self::I64)
	}
	pub fn is_float(&self) -> bool {
		matches!(self, Self::F32)
	}
	pub fn bits(&self) -> u32 {
		match self {
			Self::I32 | Self::F32 => 32,
			Self::I64 => 64,
			_ => 0,
		}
	}
	pub fn deref_type(&self) -> VarType {
		match self {
			Self::I32Ptr => Self::I32,
			Self::I64Ptr => Self::I64,
			Self::F32Ptr => Self::F32,
			_ => unreachable!("deref of non-pointer type"),
		}
	}
	pub fn default_value(&self) -> Value {
		match self {
			Self::I32 => Value::Int(0),
			Self::I64 => Value::Int64(0),
			Self::F32 => Value::Float(0.0),
			_ => unreachable!(),
		}
	}
}

// The address of a slot holding a value of this type. Pointers spill
// into untyped slots.
pub fn type2ptr(var_type: VarType) -> VarType {
	match var_type {
		VarType::I32 => VarType::I32Ptr,
		VarType::I64 => VarType::I64Ptr,
		VarType::F32 => VarType::F32Ptr,
		_ if var_type.is_ptr() => VarType::VoidPtr,
		_ => unreachable!(),
	}
}

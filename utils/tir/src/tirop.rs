use crate::{temp::Temp, tirvar::VarType};
use serde_derive::Serialize;
use std::fmt::Display;
use utils::Label;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Int(i32),
	Int64(i64),
	Float(f32),
	Temp(Temp),
	Func(Label),
	Void,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithOp {
	Add,
	Sub,
	Div,
	Mul,
	Rem,
	Fadd,
	Fsub,
	Fdiv,
	Fmul,
	Shl,
	Lshr,
	Ashr,
	And,
	Or,
	Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompOp {
	EQ,
	NE,
	SGT,
	SGE,
	SLT,
	SLE,
	UGT,
	UGE,
	ULT,
	ULE,
	OEQ,
	ONE,
	OGT,
	OGE,
	OLT,
	OLE,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompKind {
	Icmp,
	Fcmp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertOp {
	SExt,
	ZExt,
	Trunc,
	Int2Float,
	Float2Int,
}

impl Value {
	pub fn get_type(&self) -> VarType {
		match self {
			Self::Int(_) => VarType::I32,
			Self::Int64(_) => VarType::I64,
			Self::Float(_) => VarType::F32,
			Self::Temp(v) => v.var_type,
			Self::Func(_) => VarType::VoidPtr,
			Self::Void => VarType::Void,
		}
	}
	pub fn unwrap_temp(&self) -> Option<Temp> {
		match self {
			Self::Temp(v) => Some(v.clone()),
			_ => None,
		}
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Self::Int(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Self::Int64(v)
	}
}

impl From<f32> for Value {
	fn from(v: f32) -> Self {
		Self::Float(v)
	}
}

impl From<Temp> for Value {
	fn from(v: Temp) -> Self {
		Self::Temp(v)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Int(v) => write!(f, "{}", v),
			Self::Int64(v) => write!(f, "{}", v),
			Self::Float(v) => write!(f, "{}", v),
			Self::Temp(v) => write!(f, "{}", v),
			Self::Func(v) => write!(f, "@{}", v),
			Self::Void => write!(f, "void"),
		}
	}
}

impl Display for ArithOp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(serde_json::to_string(self).unwrap().trim_matches('\"'))
	}
}

impl Display for CompOp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(serde_json::to_string(self).unwrap().trim_matches('\"'))
	}
}

impl Display for CompKind {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(serde_json::to_string(self).unwrap().trim_matches('\"'))
	}
}

impl Display for ConvertOp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::SExt => write!(f, "sext"),
			Self::ZExt => write!(f, "zext"),
			Self::Trunc => write!(f, "trunc"),
			Self::Int2Float => write!(f, "sitofp"),
			Self::Float2Int => write!(f, "fptosi"),
		}
	}
}

impl CompOp {
	// The logically inverse predicate, used when a branch is reoriented.
	pub fn invert(self) -> CompOp {
		match self {
			Self::EQ => Self::NE,
			Self::NE => Self::EQ,
			Self::SGT => Self::SLE,
			Self::SGE => Self::SLT,
			Self::SLT => Self::SGE,
			Self::SLE => Self::SGT,
			Self::UGT => Self::ULE,
			Self::UGE => Self::ULT,
			Self::ULT => Self::UGE,
			Self::ULE => Self::UGT,
			Self::OEQ => Self::ONE,
			Self::ONE => Self::OEQ,
			Self::OGT => Self::OLE,
			Self::OGE => Self::OLT,
			Self::OLT => Self::OGE,
			Self::OLE => Self::OGT,
		}
	}
	pub fn is_int(self) -> bool {
		!matches!(
			self,
			Self::OEQ | Self::ONE | Self::OGT | Self::OGE | Self::OLT | Self::OLE
		)
	}
	pub fn is_equality(self) -> bool {
		matches!(self, Self::EQ | Self::NE | Self::OEQ | Self::ONE)
	}
	// Strict orderings describe open intervals; the trip count must shrink
	// the range by one before counting.
	pub fn is_strict(self) -> bool {
		matches!(self, Self::SLT | Self::SGT | Self::ULT | Self::UGT)
	}
	// +1 for less-than flavors, -1 for greater-than flavors, 0 otherwise.
	pub fn direction(self) -> i32 {
		match self {
			Self::SLT | Self::SLE | Self::ULT | Self::ULE => 1,
			Self::SGT | Self::SGE | Self::UGT | Self::UGE => -1,
			_ => 0,
		}
	}
}

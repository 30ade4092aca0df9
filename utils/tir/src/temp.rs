use std::fmt::Display;

use crate::tirvar::VarType;

pub type TirTemp = Temp;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temp {
	pub name: String,
	pub is_global: bool,
	pub var_type: VarType,
}

impl Display for Temp {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		if self.is_global {
			write!(f, "@{}", self.name)
		} else {
			write!(f, "%{}", self.name)
		}
	}
}

impl Temp {
	pub fn new(name: impl Display, var_type: VarType, is_global: bool) -> Self {
		Self {
			name: name.to_string(),
			var_type,
			is_global,
		}
	}
}

#[derive(Default)]
pub struct TirTempManager {
	pub total: u32,
}

impl TirTempManager {
	pub fn new() -> Self {
		Self::default()
	}
	pub fn new_temp(&mut self, var_type: VarType, is_global: bool) -> Temp {
		self.total += 1;
		Temp::new(self.total, var_type, is_global)
	}
}

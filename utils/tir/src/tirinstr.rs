use std::{collections::HashMap, fmt::Display};

use utils::{Label, UseTemp};

use crate::{temp::Temp, tirop::*, tirvar::VarType, TirInstrVariant};

pub type TirInstr = Box<dyn TirInstrTrait>;

pub trait TirInstrTrait: Display + UseTemp<Temp> {
	fn get_variant(&self) -> TirInstrVariant;
	// Rewrite every read of a mapped temp into the mapped value.
	fn map_temp(&mut self, map: &HashMap<Temp, Value>);
	fn map_label(&mut self, _map: &HashMap<Label, Label>) {}
	// Successor labels of a terminator, in edge order. A detach lists the
	// task block first and the continuation second.
	fn get_succ_labels(&self) -> Vec<Label> {
		Vec::new()
	}
	fn is_phi(&self) -> bool {
		false
	}
	fn is_load(&self) -> bool {
		false
	}
	fn is_store(&self) -> bool {
		false
	}
	fn is_call(&self) -> bool {
		false
	}
	fn is_ret(&self) -> bool {
		false
	}
	fn is_uncond_jump(&self) -> bool {
		false
	}
	fn is_cond_jump(&self) -> bool {
		false
	}
	fn is_detach(&self) -> bool {
		false
	}
	fn is_reattach(&self) -> bool {
		false
	}
	fn is_sync(&self) -> bool {
		false
	}
	fn is_terminator(&self) -> bool {
		self.is_uncond_jump()
			|| self.is_cond_jump()
			|| self.is_ret()
			|| self.is_detach()
			|| self.is_reattach()
			|| self.is_sync()
	}
	// The code-motion whitelist: value computations that may be reordered
	// freely. Loads are excluded; they are only legal to hoist, never to
	// sink past an anchor.
	fn is_pure(&self) -> bool {
		false
	}
	fn clone_box(&self) -> TirInstr;
}

impl Clone for TirInstr {
	fn clone(&self) -> Self {
		self.clone_box()
	}
}

pub fn map_value(value: &mut Value, map: &HashMap<Temp, Value>) {
	if let Value::Temp(t) = value {
		if let Some(new) = map.get(t) {
			*value = new.clone();
		}
	}
}

#[derive(Clone)]
pub struct ArithInstr {
	pub target: Temp,
	pub op: ArithOp,
	pub var_type: VarType,
	pub lhs: Value,
	pub rhs: Value,
}

#[derive(Clone)]
pub struct LabelInstr {
	pub label: Label,
}

#[derive(Clone)]
pub struct CompInstr {
	pub kind: CompKind,
	pub target: Temp,
	pub op: CompOp,
	pub var_type: VarType,
	pub lhs: Value,
	pub rhs: Value,
}

#[derive(Clone)]
pub struct ConvertInstr {
	pub target: Temp,
	pub op: ConvertOp,
	pub from_type: VarType,
	pub to_type: VarType,
	pub lhs: Value,
}

#[derive(Clone)]
pub struct JumpInstr {
	pub target: Label,
}

impl JumpInstr {
	pub fn new(target: Label) -> TirInstr {
		Box::new(JumpInstr { target })
	}
}

#[derive(Clone)]
pub struct JumpCondInstr {
	pub var_type: VarType,
	pub cond: Value,
	pub target_true: Label,
	pub target_false: Label,
}

#[derive(Clone)]
pub struct PhiInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub source: Vec<(Value, Label)>,
}

impl PhiInstr {
	pub fn new(target: Temp, source: Vec<(Value, Label)>) -> Self {
		Self {
			var_type: target.var_type,
			target,
			source,
		}
	}
	pub fn get_incoming_value_for_block(&self, label: &Label) -> Option<Value> {
		self.source.iter().find(|(_, l)| l == label).map(|(v, _)| v.clone())
	}
	pub fn all_has_the_same_value(&self) -> Option<Value> {
		let first = self.source.first().map(|(v, _)| v.clone())?;
		self.source.iter().all(|(v, _)| *v == first).then_some(first)
	}
	pub fn remove_incoming(&mut self, label: &Label) {
		self.source.retain(|(_, l)| l != label);
	}
}

#[derive(Clone)]
pub struct RetInstr {
	pub value: Option<Value>,
}

#[derive(Clone)]
pub struct AllocInstr {
	pub target: Temp,
	pub length: Value,
	pub var_type: VarType,
}

#[derive(Clone)]
pub struct StoreInstr {
	pub value: Value,
	pub addr: Value,
}

#[derive(Clone)]
pub struct LoadInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub addr: Value,
}

#[derive(Clone)]
pub struct GEPInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub addr: Value,
	pub offset: Value,
}

#[derive(Clone)]
pub struct CallInstr {
	pub target: Temp,
	pub var_type: VarType,
	pub func: Label,
	pub params: Vec<(VarType, Value)>,
}

// Forks the task block as a child; execution continues in the next block.
#[derive(Clone)]
pub struct DetachInstr {
	pub task: Label,
	pub next: Label,
}

// Closes a detached region, returning control to the continuation.
#[derive(Clone)]
pub struct ReattachInstr {
	pub next: Label,
}

// Joins all detached children before control may pass.
#[derive(Clone)]
pub struct SyncInstr {
	pub next: Label,
}

use std::collections::HashMap;

use utils::{Label, UseTemp};

use crate::{temp::Temp, tirinstr::*, tirop::Value, TirInstrVariant};

fn unwrap_temps(arr: Vec<&Value>) -> Vec<Temp> {
	arr.into_iter().flat_map(|v| v.unwrap_temp()).collect()
}

impl std::fmt::Display for ArithInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {}, {}",
			self.target, self.op, self.var_type, self.lhs, self.rhs
		)
	}
}

impl UseTemp<Temp> for ArithInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.lhs, &self.rhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for ArithInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::ArithInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.lhs, map);
		map_value(&mut self.rhs, map);
	}
	fn is_pure(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for LabelInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{}:", self.label)
	}
}

impl UseTemp<Temp> for LabelInstr {}

impl TirInstrTrait for LabelInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::LabelInstr(self)
	}
	fn map_temp(&mut self, _map: &HashMap<Temp, Value>) {}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for CompInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {} {}, {}",
			self.target, self.kind, self.op, self.var_type, self.lhs, self.rhs
		)
	}
}

impl UseTemp<Temp> for CompInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.lhs, &self.rhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for CompInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::CompInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.lhs, map);
		map_value(&mut self.rhs, map);
	}
	fn is_pure(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for ConvertInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = {} {} {} to {}",
			self.target, self.op, self.from_type, self.lhs, self.to_type
		)
	}
}

impl UseTemp<Temp> for ConvertInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.lhs])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for ConvertInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::ConvertInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.lhs, map);
	}
	fn is_pure(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for JumpInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "br label %{}", self.target)
	}
}

impl UseTemp<Temp> for JumpInstr {}

impl TirInstrTrait for JumpInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::JumpInstr(self)
	}
	fn map_temp(&mut self, _map: &HashMap<Temp, Value>) {}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		if let Some(new) = map.get(&self.target) {
			self.target = new.clone();
		}
	}
	fn get_succ_labels(&self) -> Vec<Label> {
		vec![self.target.clone()]
	}
	fn is_uncond_jump(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for JumpCondInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"br {} {}, label %{}, label %{}",
			self.var_type, self.cond, self.target_true, self.target_false
		)
	}
}

impl UseTemp<Temp> for JumpCondInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.cond])
	}
}

impl TirInstrTrait for JumpCondInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::JumpCondInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.cond, map);
	}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		if let Some(new) = map.get(&self.target_true) {
			self.target_true = new.clone();
		}
		if let Some(new) = map.get(&self.target_false) {
			self.target_false = new.clone();
		}
	}
	fn get_succ_labels(&self) -> Vec<Label> {
		vec![self.target_true.clone(), self.target_false.clone()]
	}
	fn is_cond_jump(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for PhiInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let source = self
			.source
			.iter()
			.map(|(v, l)| format!("[{}, %{}]", v, l))
			.collect::<Vec<_>>()
			.join(", ");
		write!(f, "{} = phi {} {}", self.target, self.var_type, source)
	}
}

impl UseTemp<Temp> for PhiInstr {
	fn get_read(&self) -> Vec<Temp> {
		self.source.iter().flat_map(|(v, _)| v.unwrap_temp()).collect()
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for PhiInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::PhiInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		for (value, _) in self.source.iter_mut() {
			map_value(value, map);
		}
	}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		for (_, label) in self.source.iter_mut() {
			if let Some(new) = map.get(label) {
				*label = new.clone();
			}
		}
	}
	fn is_phi(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for RetInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match &self.value {
			Some(v) => write!(f, "ret {} {}", v.get_type(), v),
			None => write!(f, "ret void"),
		}
	}
}

impl UseTemp<Temp> for RetInstr {
	fn get_read(&self) -> Vec<Temp> {
		self.value.iter().flat_map(|v| v.unwrap_temp()).collect()
	}
}

impl TirInstrTrait for RetInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::RetInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		if let Some(v) = self.value.as_mut() {
			map_value(v, map);
		}
	}
	fn is_ret(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for AllocInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = alloca {}, {}",
			self.target, self.var_type, self.length
		)
	}
}

impl UseTemp<Temp> for AllocInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.length])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for AllocInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::AllocInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.length, map);
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for StoreInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"store {} {}, {}",
			self.value.get_type(),
			self.value,
			self.addr
		)
	}
}

impl UseTemp<Temp> for StoreInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.value, &self.addr])
	}
}

impl TirInstrTrait for StoreInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::StoreInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.value, map);
		map_value(&mut self.addr, map);
	}
	fn is_store(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for LoadInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} = load {}, {}", self.target, self.var_type, self.addr)
	}
}

impl UseTemp<Temp> for LoadInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.addr])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for LoadInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::LoadInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.addr, map);
	}
	fn is_load(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for GEPInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{} = getelementptr {}, {}, {}",
			self.target, self.var_type, self.addr, self.offset
		)
	}
}

impl UseTemp<Temp> for GEPInstr {
	fn get_read(&self) -> Vec<Temp> {
		unwrap_temps(vec![&self.addr, &self.offset])
	}
	fn get_write(&self) -> Option<Temp> {
		Some(self.target.clone())
	}
}

impl TirInstrTrait for GEPInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::GEPInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		map_value(&mut self.addr, map);
		map_value(&mut self.offset, map);
	}
	fn is_pure(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for CallInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let params = self
			.params
			.iter()
			.map(|(t, v)| format!("{} {}", t, v))
			.collect::<Vec<_>>()
			.join(", ");
		if self.var_type == crate::VarType::Void {
			write!(f, "call void @{}({})", self.func, params)
		} else {
			write!(
				f,
				"{} = call {} @{}({})",
				self.target, self.var_type, self.func, params
			)
		}
	}
}

impl UseTemp<Temp> for CallInstr {
	fn get_read(&self) -> Vec<Temp> {
		self.params.iter().flat_map(|(_, v)| v.unwrap_temp()).collect()
	}
	fn get_write(&self) -> Option<Temp> {
		(self.var_type != crate::VarType::Void).then(|| self.target.clone())
	}
}

impl TirInstrTrait for CallInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::CallInstr(self)
	}
	fn map_temp(&mut self, map: &HashMap<Temp, Value>) {
		for (_, value) in self.params.iter_mut() {
			map_value(value, map);
		}
	}
	fn is_call(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for DetachInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "detach label %{}, label %{}", self.task, self.next)
	}
}

impl UseTemp<Temp> for DetachInstr {}

impl TirInstrTrait for DetachInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::DetachInstr(self)
	}
	fn map_temp(&mut self, _map: &HashMap<Temp, Value>) {}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		if let Some(new) = map.get(&self.task) {
			self.task = new.clone();
		}
		if let Some(new) = map.get(&self.next) {
			self.next = new.clone();
		}
	}
	fn get_succ_labels(&self) -> Vec<Label> {
		vec![self.task.clone(), self.next.clone()]
	}
	fn is_detach(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for ReattachInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "reattach label %{}", self.next)
	}
}

impl UseTemp<Temp> for ReattachInstr {}

impl TirInstrTrait for ReattachInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::ReattachInstr(self)
	}
	fn map_temp(&mut self, _map: &HashMap<Temp, Value>) {}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		if let Some(new) = map.get(&self.next) {
			self.next = new.clone();
		}
	}
	fn get_succ_labels(&self) -> Vec<Label> {
		vec![self.next.clone()]
	}
	fn is_reattach(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

impl std::fmt::Display for SyncInstr {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "sync label %{}", self.next)
	}
}

impl UseTemp<Temp> for SyncInstr {}

impl TirInstrTrait for SyncInstr {
	fn get_variant(&self) -> TirInstrVariant {
		TirInstrVariant::SyncInstr(self)
	}
	fn map_temp(&mut self, _map: &HashMap<Temp, Value>) {}
	fn map_label(&mut self, map: &HashMap<Label, Label>) {
		if let Some(new) = map.get(&self.next) {
			self.next = new.clone();
		}
	}
	fn get_succ_labels(&self) -> Vec<Label> {
		vec![self.next.clone()]
	}
	fn is_sync(&self) -> bool {
		true
	}
	fn clone_box(&self) -> TirInstr {
		Box::new(self.clone())
	}
}

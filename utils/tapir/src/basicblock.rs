use std::{
	cell::RefCell,
	collections::HashMap,
	fmt::Display,
	hash::Hash,
	rc::Rc,
};

use tir::{PhiInstr, TirInstr, TirInstrTrait, TirTemp, Value};
use utils::{instr_format, to_label, Label, UseTemp};

use crate::tapir_loop::LoopPtr;

pub type TirNode = Rc<RefCell<BasicBlock>>;

pub struct BasicBlock {
	pub id: i32,
	pub weight: f64,
	pub prev: Vec<TirNode>,
	pub succ: Vec<TirNode>,
	pub phi_instrs: Vec<PhiInstr>,
	pub instrs: Vec<TirInstr>,
	pub jump_instr: Option<TirInstr>,
	// 所有被自己支配的节点
	pub dominates: Vec<TirNode>,
	// 支配树上的边
	pub dominates_directly: Vec<TirNode>,
	// 支配树上的父亲，entry 没有父亲
	pub dominator: Option<TirNode>,
	pub loop_: Option<LoopPtr>,
}

fn get_other_label(
	now: *const BasicBlock,
	now_label: Label,
	other: &TirNode,
) -> Label {
	if std::ptr::eq(now, other.as_ptr()) {
		now_label
	} else {
		other.borrow().label()
	}
}

impl PartialEq for BasicBlock {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for BasicBlock {}

impl Hash for BasicBlock {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl BasicBlock {
	pub fn new(id: i32, weight: f64) -> Self {
		BasicBlock {
			id,
			weight,
			prev: Vec::new(),
			succ: Vec::new(),
			phi_instrs: Vec::new(),
			instrs: Vec::new(),
			jump_instr: None,
			dominates: Vec::new(),
			dominates_directly: Vec::new(),
			dominator: None,
			loop_: None,
		}
	}
	pub fn new_node(id: i32, weight: f64) -> TirNode {
		Rc::new(RefCell::new(Self::new(id, weight)))
	}
	pub fn label(&self) -> Label {
		to_label(self.id)
	}
	// Use this before dropping a BasicBlock, or the Rc cycle leaks.
	pub fn clear(&mut self) {
		self.prev.clear();
		self.succ.clear();
		self.dominates.clear();
		self.dominates_directly.clear();
		self.dominator = None;
		self.loop_ = None;
	}
	pub fn push(&mut self, instr: TirInstr) {
		self.instrs.push(instr);
	}
	pub fn push_phi(&mut self, instr: PhiInstr) {
		self.phi_instrs.push(instr);
	}
	pub fn single_prev(&self) -> bool {
		self.prev.len() == 1
	}
	pub fn single_succ(&self) -> bool {
		self.succ.len() == 1
	}
	pub fn get_succ(&self) -> TirNode {
		self.succ.first().unwrap().clone()
	}
	pub fn no_phi(&self) -> bool {
		self.phi_instrs.is_empty()
	}
	pub fn set_jump(&mut self, instr: Option<TirInstr>) {
		self.jump_instr = instr;
	}
	pub fn make_pretty(&mut self) {
		self.phi_instrs.sort_by(|x, y| x.target.cmp(&y.target));
	}
	pub fn replace_prev(&mut self, label: &Label, target: TirNode) {
		let new_label = get_other_label(self, self.label(), &target);
		for instr in self.phi_instrs.iter_mut() {
			if let Some((_, v)) = instr.source.iter_mut().find(|(_, v)| v == label) {
				*v = new_label.clone();
			}
		}
		if let Some(prev) =
			self.prev.iter_mut().find(|v| v.borrow().label() == *label)
		{
			*prev = target
		} else {
			unreachable!()
		}
	}
	pub fn replace_prevs(&mut self, label: &Label, targets: Vec<TirNode>) {
		for instr in self.phi_instrs.iter_mut() {
			let value =
				instr.source.iter().find(|(_, l)| l == label).unwrap().0.clone();
			instr.source.retain(|(_, l)| l != label);
			instr.source.append(
				&mut targets
					.iter()
					.map(|t| (value.clone(), t.borrow().label()))
					.collect(),
			);
		}
		self.prev.retain(|v| v.borrow().label() != *label);
		self.prev.append(&mut targets.clone());
	}
	pub fn map_temp(&mut self, map: &HashMap<TirTemp, Value>) {
		self.phi_instrs.iter_mut().for_each(|v| v.map_temp(map));
		self.instrs.iter_mut().for_each(|v| v.map_temp(map));
		if let Some(instr) = self.jump_instr.as_mut() {
			instr.map_temp(map);
		}
	}
	pub fn map_phi_label(&mut self, map: &HashMap<Label, Label>) {
		self.phi_instrs.iter_mut().for_each(|v| v.map_label(map));
	}
	pub fn map_label(&mut self, map: &HashMap<Label, Label>) {
		self.map_phi_label(map);
		if let Some(instr) = self.jump_instr.as_mut() {
			instr.map_label(map);
		}
	}
	// Targets defined in this block, phis included.
	pub fn defs(&self) -> Vec<TirTemp> {
		self
			.phi_instrs
			.iter()
			.map(|v| v.target.clone())
			.chain(self.instrs.iter().flat_map(|v| v.get_write()))
			.collect()
	}
}

impl Clone for BasicBlock {
	fn clone(&self) -> Self {
		Self {
			phi_instrs: self.phi_instrs.clone(),
			instrs: self.instrs.to_vec(),
			jump_instr: self.jump_instr.as_ref().cloned(),
			..Self::new(self.id, self.weight)
		}
	}
}

impl Display for BasicBlock {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let instrs = self
			.phi_instrs
			.iter()
			.map(instr_format)
			.chain(self.instrs.iter().map(instr_format))
			.chain(self.jump_instr.iter().map(instr_format))
			.collect::<Vec<_>>()
			.join("\n");
		write!(f, "  {}:\n{}", self.label(), instrs)
	}
}

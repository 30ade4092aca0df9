pub mod loop_analysis;

use std::{
	cell::RefCell,
	collections::HashMap,
	rc::{Rc, Weak},
};

use crate::{TirNode, CFG};

pub type LoopPtr = Rc<RefCell<Loop>>;
pub type LoopMap = HashMap<i32, LoopPtr>;

pub struct Loop {
	pub id: u32,
	pub outer: Option<Weak<RefCell<Loop>>>,
	pub header: TirNode,
	pub subloops: Vec<LoopPtr>,
	pub level: i32,
	pub no_inner: bool,
}

impl PartialEq for Loop {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Loop {}

impl Loop {
	pub fn new(id: u32, header: TirNode) -> Self {
		Self {
			id,
			outer: None,
			header,
			subloops: Vec::new(),
			level: -1,
			no_inner: true,
		}
	}
	// Inclusive: a loop is a super loop of itself.
	pub fn is_super_loop_of(&self, other: &LoopPtr) -> bool {
		let mut cur = Some(other.clone());
		while let Some(l) = cur {
			if l.borrow().id == self.id {
				return true;
			}
			cur = l.borrow().outer.clone().and_then(|v| v.upgrade());
		}
		false
	}
	pub fn contains_block(&self, id: i32, loop_map: &LoopMap) -> bool {
		loop_map.get(&id).map_or(false, |l| self.is_super_loop_of(l))
	}
	// All blocks of the loop, subloops included.
	pub fn blocks(&self, cfg: &CFG, loop_map: &LoopMap) -> Vec<TirNode> {
		cfg
			.blocks
			.iter()
			.filter(|v| self.contains_block(v.borrow().id, loop_map))
			.cloned()
			.collect()
	}
	pub fn blocks_without_subloops(
		&self,
		cfg: &CFG,
		loop_map: &LoopMap,
	) -> Vec<TirNode> {
		cfg
			.blocks
			.iter()
			.filter(|v| {
				loop_map.get(&v.borrow().id).map_or(false, |l| l.borrow().id == self.id)
			})
			.cloned()
			.collect()
	}
	// The unique out-of-loop predecessor of the header, provided it branches
	// only into the loop.
	pub fn get_loop_preheader(
		&self,
		loop_map: &LoopMap,
	) -> Option<TirNode> {
		let mut outside = Vec::new();
		for prev in self.header.borrow().prev.iter() {
			if !self.contains_block(prev.borrow().id, loop_map) {
				outside.push(prev.clone());
			}
		}
		match outside.as_slice() {
			[pre] if pre.borrow().single_succ() => Some(pre.clone()),
			_ => None,
		}
	}
	// The unique in-loop predecessor of the header.
	pub fn get_loop_latch(&self, loop_map: &LoopMap) -> Option<TirNode> {
		let mut latches = Vec::new();
		for prev in self.header.borrow().prev.iter() {
			if self.contains_block(prev.borrow().id, loop_map) {
				latches.push(prev.clone());
			}
		}
		match latches.as_slice() {
			[latch] => Some(latch.clone()),
			_ => None,
		}
	}
	// Blocks outside the loop reachable by one edge from inside.
	pub fn exit_blocks(&self, cfg: &CFG, loop_map: &LoopMap) -> Vec<TirNode> {
		let mut exits: Vec<TirNode> = Vec::new();
		for bb in self.blocks(cfg, loop_map) {
			for succ in bb.borrow().succ.iter() {
				if !self.contains_block(succ.borrow().id, loop_map)
					&& !exits.iter().any(|v| v.borrow().id == succ.borrow().id)
				{
					exits.push(succ.clone());
				}
			}
		}
		exits
	}
	pub fn is_root(&self) -> bool {
		self.outer.is_none()
	}
}

use crate::{TirNode, CFG};

use super::{compute_dominator, compute_dominator_frontier, DomTree};

impl DomTree {
	pub fn new(cfg: &CFG) -> Self {
		let mut dom_tree = Self::default();
		compute_dominator(
			cfg,
			&mut dom_tree.dominates,
			&mut dom_tree.dom_direct,
			&mut dom_tree.dominator,
		);
		compute_dominator_frontier(
			cfg,
			&dom_tree.dominates,
			&dom_tree.dominator,
			&mut dom_tree.df,
		);
		dom_tree
	}
	pub fn get_children(&mut self, id: i32) -> &Vec<TirNode> {
		self.dom_direct.entry(id).or_default()
	}
	pub fn get_df(&mut self, id: i32) -> &Vec<TirNode> {
		self.df.entry(id).or_default()
	}
	pub fn get_dominator(&mut self, id: i32) -> Option<TirNode> {
		self.dominator.get(&id).cloned()
	}
	pub fn dominates(&self, a: i32, b: i32) -> bool {
		a == b
			|| self
				.dominates
				.get(&a)
				.map_or(false, |v| v.iter().any(|n| n.borrow().id == b))
	}
}

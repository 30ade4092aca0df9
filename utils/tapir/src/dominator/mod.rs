mod dominator_frontier;
mod impls;
mod naive;

use std::collections::HashMap;

pub use dominator_frontier::*;
pub use naive::*;

use crate::TirNode;

#[derive(Default)]
pub struct DomTree {
	pub dominates: HashMap<i32, Vec<TirNode>>,
	pub dominator: HashMap<i32, TirNode>,
	pub dom_direct: HashMap<i32, Vec<TirNode>>,
	pub df: HashMap<i32, Vec<TirNode>>,
}

use std::collections::HashMap;

use loop_data::LoopData;

mod impls;
mod loop2cilk;
mod loop_data;
mod loop_simplify;

pub struct HandleLoops {
	loopdatas: HashMap<String, LoopData>,
}

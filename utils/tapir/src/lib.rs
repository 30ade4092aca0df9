pub mod basicblock;
pub mod builder;
pub mod cfg;
pub mod dominator;
pub mod func;
pub mod impls;
pub mod program;
pub mod tapir_loop;
pub mod verify;

pub use basicblock::{BasicBlock, TirNode};
pub use cfg::CFG;

pub mod prelude {
	pub use crate::basicblock::*;
	pub use crate::cfg::*;
	pub use crate::func::*;
	pub use crate::program::*;
}

mod code_motion;
mod exits;
mod indvar;
mod matcher;
mod outline;
mod rewrite;
#[cfg(test)]
mod tests;

use std::fmt::Display;

use tapir::prelude::TirFunc;
use tir::TirTempManager;

use super::loop_data::LoopData;

// Why a loop was left untouched. Every reason is recoverable: the pass
// reports "unchanged" and the driver moves on to the next loop.
pub enum Reject {
	StructureMismatch(&'static str),
	MultiExit,
	NonCanonicalInduction(&'static str),
	HoistFailure,
	DetacherNotEmpty,
	SyncNotEmpty,
	WidthMismatch,
}

impl Display for Reject {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::StructureMismatch(why) => {
				write!(f, "loop is not shaped as detach+sync: {}", why)
			}
			Self::MultiExit => write!(f, "no unique true exit block"),
			Self::NonCanonicalInduction(why) => {
				write!(f, "no canonical induction variable: {}", why)
			}
			Self::HoistFailure => {
				write!(f, "an operand could not be moved to a dominating position")
			}
			Self::DetacherNotEmpty => {
				write!(f, "detach block holds an instruction that cannot move")
			}
			Self::SyncNotEmpty => {
				write!(f, "sync block holds an instruction that cannot move")
			}
			Self::WidthMismatch => {
				write!(f, "trip count is neither 32 nor 64 bits wide")
			}
		}
	}
}

pub type Res<T> = std::result::Result<T, Reject>;

// The blocks framing a recognized parallel loop. `header` is the block
// whose terminator enters the loop; when the loop header itself ends in
// the detach, this is the preheader instead.
pub struct DetachedLoop {
	pub header: tapir::TirNode,
	pub detacher: tapir::TirNode,
	pub syncer: tapir::TirNode,
}

pub struct Loop2Cilk<'a> {
	pub func: &'a mut TirFunc,
	pub loopdata: &'a mut LoopData,
	pub temp_mgr: &'a mut TirTempManager,
	pub extracted: &'a mut Vec<TirFunc>,
}

impl<'a> Loop2Cilk<'a> {
	pub fn new(
		func: &'a mut TirFunc,
		loopdata: &'a mut LoopData,
		temp_mgr: &'a mut TirTempManager,
		extracted: &'a mut Vec<TirFunc>,
	) -> Self {
		Self {
			func,
			loopdata,
			temp_mgr,
			extracted,
		}
	}
}

pub mod parser;
pub mod temp;
pub mod tirinstr;
pub mod tirop;
pub mod tirvar;

mod impls;
mod utils_tir;

pub use temp::*;
pub use tirinstr::*;
pub use tirop::*;
pub use tirvar::*;
pub use utils_tir::*;

pub enum TirInstrVariant<'a> {
	ArithInstr(&'a ArithInstr),
	LabelInstr(&'a LabelInstr),
	CompInstr(&'a CompInstr),
	ConvertInstr(&'a ConvertInstr),
	JumpInstr(&'a JumpInstr),
	JumpCondInstr(&'a JumpCondInstr),
	PhiInstr(&'a PhiInstr),
	RetInstr(&'a RetInstr),
	AllocInstr(&'a AllocInstr),
	StoreInstr(&'a StoreInstr),
	LoadInstr(&'a LoadInstr),
	GEPInstr(&'a GEPInstr),
	CallInstr(&'a CallInstr),
	DetachInstr(&'a DetachInstr),
	ReattachInstr(&'a ReattachInstr),
	SyncInstr(&'a SyncInstr),
}

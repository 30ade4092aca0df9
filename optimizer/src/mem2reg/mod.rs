mod impls;

pub use impls::{promotable_allocas, promote_allocas};

pub struct Mem2Reg {}

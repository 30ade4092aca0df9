mod impls;

pub struct RemoveUnreachCode {}

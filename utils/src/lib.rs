pub mod constants;
pub mod errors;
pub mod label;
pub mod math;

use std::fmt::Display;

pub use constants::*;
pub use errors::*;
pub use label::*;

pub fn fatal_error(str: impl Display) {
	eprintln!("{}: {}", console::style("fatal error").bold().red(), str);
	std::process::exit(1);
}

pub fn warning(str: impl Display) {
	eprintln!("{}: {}", console::style("warning").bold().magenta(), str);
}

pub trait UseTemp<U> {
	fn get_read(&self) -> Vec<U> {
		Vec::new()
	}
	fn get_write(&self) -> Option<U> {
		None
	}
}

pub fn instr_format<T: Display>(v: T) -> String {
	format!("  {}", v)
}

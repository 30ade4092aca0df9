pub use clap::Parser;
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Emit {
	/// Print the program straight back after parsing.
	Parse,
	/// Print the ir after the selected pipeline ran.
	Ir,
}

#[derive(Parser, Debug)]
pub struct Args {
	#[arg(long, value_enum, default_value = "ir")]
	pub emit: Emit,

	/// Run the parallel-loop pipeline (mem2reg, loop simplify, loop2cilk).
	#[arg(short = 'O', long)]
	pub optimize: bool,

	#[arg(short)]
	pub output: Option<String>,

	#[arg(value_parser)]
	pub input: Option<String>,
}

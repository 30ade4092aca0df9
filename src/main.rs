mod cli;

use std::{
	fs::{self, File},
	io,
	io::Write,
};

use anyhow::Result;
use clap::Parser;
use cli::{Args, Emit};
use optimizer::{Optimizer0, Optimizer1};
use tapir::{builder::build_program, prelude::TirProgram, verify::verify_func};
use utils::{fatal_error, map_sys_err};

fn step_parse(name: Option<String>) -> Result<TirProgram> {
	if name.is_none() {
		fatal_error("no input files");
	}
	let code = fs::read_to_string(name.unwrap())
		.map_err(|_| fatal_error("no input files"))
		.unwrap();
	let program = build_program(tir::parser::parse(&code)?)?;
	for func in program.funcs.iter() {
		verify_func(func)?;
	}
	Ok(program)
}

fn main() -> Result<()> {
	env_logger::init();
	let args = Args::parse();

	let mut writer: Box<dyn Write> = if let Some(o) = args.output {
		Box::new(File::create(o).map_err(map_sys_err)?)
	} else {
		Box::new(io::stdout())
	};

	let mut program = step_parse(args.input)?;
	if args.emit == Emit::Parse {
		write!(writer, "{}", program)?;
		return Ok(());
	}

	if args.optimize {
		Optimizer1::new().apply(&mut program)?;
	} else {
		Optimizer0::new().apply(&mut program)?;
	}
	for func in program.funcs.iter() {
		verify_func(func)?;
	}

	program.make_pretty();
	writeln!(writer, "{}", program)?;
	Ok(())
}

//! The main runner. Takes a source file, compiles it, and runs it on the
//! virtual machine.
//!
//! Run with `--help` for more info.

use std::process::ExitCode;

use clap::Parser;
use patito::compile_and_run;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the Patito source file to run
    file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("io error: could not read '{}': {e}", args.file);
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match compile_and_run(&source, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

//! A debugging aid: dumps tokens, quads, constants, or symbol tables
//! instead of running the program.
//!
//! Run with `--help` for more info.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use patito::front::lex::Lexer;
use patito::front::parse::parse;
use patito::middle::irgen::generate;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// what to dump
    #[arg(value_enum, short, long, default_value_t = Emit::Quads)]
    emit: Emit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Emit {
    /// the token stream
    Tokens,
    /// the quadruple list
    Quads,
    /// the constant table
    Consts,
    /// the global variable table and function directory
    Symbols,
}

fn main() -> ExitCode {
    use Emit::*;
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("io error: could not read '{}': {e}", args.file);
            return ExitCode::FAILURE;
        }
    };

    match args.emit {
        Tokens => {
            let mut lexer = Lexer::new(&source);
            loop {
                match lexer.next() {
                    Ok(Some(tok)) => println!("{tok}"),
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("lexical error: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
        }
        Quads => match parse(&source).and_then(|p| generate(&p)) {
            Ok(unit) => {
                for (i, quad) in unit.quads.iter().enumerate() {
                    println!("{i:>4}: {quad}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        Consts => match parse(&source).and_then(|p| generate(&p)) {
            Ok(unit) => {
                for (ty, value, addr) in unit.consts.iter() {
                    println!("{addr}: {ty} {value:?}");
                }
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
        Symbols => match parse(&source).and_then(|p| generate(&p)) {
            Ok(unit) => {
                println!("globals:");
                for v in unit.globals.iter() {
                    println!("  {} : {} @ {}", v.name, v.ty, v.address);
                }
                println!("functions:");
                for f in unit.functions.iter() {
                    println!("  {}({} params) entry={}", f.name, f.parameters.len(), f.entry_quad);
                    for v in f.locals.iter() {
                        let role = if v.is_param { "param" } else { "local" };
                        println!("    {role} {} : {} @ {}", v.name, v.ty, v.address);
                    }
                }
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

//! The error taxonomy shared by every stage of the pipeline.
//!
//! Each stage (lexer, parser, semantic analyzer/IR generator, allocator, VM)
//! has its own narrower error type internally, but all of them convert into
//! one [`PatitoError`] so the binaries and the integration tests have a
//! single `Result` to match on instead of parsing message strings.

use std::fmt;

use crate::front::lex::LexError;
use crate::front::parse::ParseError;
use crate::middle::irgen::SemanticError;
use crate::middle::memory::AllocError;
use crate::back::vm::RuntimeError;

#[derive(Debug)]
pub enum PatitoError {
    Lexical(LexError),
    Syntactic(ParseError),
    Semantic(SemanticError),
    Allocator(AllocError),
    Runtime(RuntimeError),
}

impl PatitoError {
    /// The line number of the offending construct, when one is tracked.
    ///
    /// Only lexical and syntactic errors carry a line; semantic and runtime
    /// errors are reported without one, matching the original implementation.
    pub fn line(&self) -> Option<usize> {
        match self {
            PatitoError::Lexical(e) => Some(e.line),
            PatitoError::Syntactic(e) => e.line(),
            _ => None,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            PatitoError::Lexical(_) => "lexical",
            PatitoError::Syntactic(_) => "syntax",
            PatitoError::Semantic(_) => "semantic",
            PatitoError::Allocator(_) => "allocator",
            PatitoError::Runtime(_) => "runtime",
        }
    }
}

impl fmt::Display for PatitoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: ", self.kind_label())?;
        match self {
            PatitoError::Lexical(e) => write!(f, "{e}"),
            PatitoError::Syntactic(e) => write!(f, "{e}"),
            PatitoError::Semantic(e) => write!(f, "{e}"),
            PatitoError::Allocator(e) => write!(f, "{e}"),
            PatitoError::Runtime(e) => write!(f, "{e}"),
        }?;
        if let Some(line) = self.line() {
            write!(f, " at line {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PatitoError {}

impl From<LexError> for PatitoError {
    fn from(e: LexError) -> Self {
        PatitoError::Lexical(e)
    }
}

impl From<ParseError> for PatitoError {
    fn from(e: ParseError) -> Self {
        PatitoError::Syntactic(e)
    }
}

impl From<SemanticError> for PatitoError {
    fn from(e: SemanticError) -> Self {
        PatitoError::Semantic(e)
    }
}

impl From<AllocError> for PatitoError {
    fn from(e: AllocError) -> Self {
        PatitoError::Allocator(e)
    }
}

impl From<RuntimeError> for PatitoError {
    fn from(e: RuntimeError) -> Self {
        PatitoError::Runtime(e)
    }
}

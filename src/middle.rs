//! The middle-end: the type compatibility matrix, virtual memory allocator,
//! symbol tables, quadruple IR, and the generator that drives them from an
//! AST into a [`CompiledUnit`](irgen::CompiledUnit).

pub mod irgen;
pub mod memory;
pub mod quad;
pub mod symbols;
pub mod types;

pub use irgen::{generate, CompiledUnit, SemanticError};

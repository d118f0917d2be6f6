//! The back-end: the stack-machine virtual machine that executes a
//! compiled unit's quads.

pub mod vm;

pub use vm::VirtualMachine;

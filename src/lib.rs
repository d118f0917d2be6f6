//! This is the Patito compiler and virtual machine as a library.  See
//! `src/bin` directory for the executable programs using this library.

pub mod common;
pub mod error;
pub mod front;
pub mod middle;
pub mod back;

pub use error::PatitoError;

/// Compile `source` and run it on the virtual machine, writing `write`
/// output to `out` in emission order.
///
/// This is the single entry point both binaries and integration tests use,
/// so "compile then run" always goes through the same sequence of steps.
pub fn compile_and_run(source: &str, out: &mut impl std::io::Write) -> Result<(), PatitoError> {
    let program = front::parse::parse(source)?;
    let unit = middle::irgen::generate(&program)?;
    let mut vm = back::vm::VirtualMachine::new(&unit);
    vm.run(out)?;
    Ok(())
}

//! `tealc` library crate.
//!
//! Back end of an ahead-of-time compiler lowering a small imperative
//! scripting language to stack-machine smart-contract assembly:
//! - `resolver` + `symbols`: scope construction and name binding
//! - `codegen` + `emitter`: two-pass lowering to textual instructions
//! - `ast`: the tree handed over by the external parser (JSON on the wire)
use thiserror::Error;

pub mod ast;
pub(crate) mod builtins;
pub mod codegen;
pub mod emitter;
pub mod resolver;
pub mod symbols;

use ast::Node;
use codegen::{CodeGenerator, CodegenError};
use emitter::CodeEmitter;
use resolver::ResolveError;

/// Version pragma prefixed to every compiled program.
pub const TARGET_VERSION: u32 = 3;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Highest scratch slot index of the target; the data stack grows down
    /// from here. Slot 0 stays reserved for the stack pointer.
    pub max_scratch: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_scratch: 255 }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Compiles a parsed program to target assembly text.
///
/// The first error aborts the compilation; nothing is recovered. The same
/// tree may be compiled again afterwards, annotations are simply rebuilt.
pub fn compile(program: &mut Node, options: &CompileOptions) -> Result<String, CompileError> {
    let tables = resolver::resolve_symbols(program)?;
    let mut emitter = CodeEmitter::new();
    let mut generator = CodeGenerator::new(&tables, &mut emitter, options);
    generator.generate_code(program)?;
    Ok(format!(
        "#pragma version {TARGET_VERSION}\r\n{}",
        emitter.output()
    ))
}

//! Crate root: wires together the compilation pipeline.
//!
//! Stages, in the order a source file passes through them:
//! - `tokenizer` performs lexical analysis, handing out one token at a time.
//! - `parser` owns all syntactic knowledge and returns the program AST.
//! - `scope` and `label` hold the bookkeeping code generation relies on.
//! - `codegen` lowers the AST into 32-bit Intel-syntax assembly.
//! - `error` centralises the error type shared by the other modules.

pub mod ast;
pub mod config;
pub mod error;
pub mod label;
pub mod parser;
pub mod scope;
pub mod tokenizer;
pub mod ty;

mod codegen;

use tracing::debug;

pub use error::{CompileError, CompileResult};

/// Compile a source string into assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let program = parser::parse(source)?;
  compile_program(&program)
}

/// Generate assembly for an already built program tree.
pub fn compile_program(program: &ast::Program) -> CompileResult<String> {
  debug!(functions = program.functions.len(), "generating code");
  codegen::generate(program)
}

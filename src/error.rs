//! Shared error utilities used across the compilation pipeline.
//!
//! Every stage returns a [`CompileResult`] and stops at the first problem.
//! Syntax errors point at the offending byte with a caret, while the semantic
//! errors raised during code generation only name the symbol involved since
//! the AST does not carry source positions.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{line}:{column}: {message}\n{source_line}\n{marker}"))]
  Syntax {
    line: usize,
    column: usize,
    source_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("undeclared variable '{name}'"))]
  UndeclaredVariable { name: String },

  #[snafu(display("redeclaration of variable '{name}'"))]
  RedeclaredVariable { name: String },

  #[snafu(display("left side of assignment must be a variable"))]
  InvalidAssignmentTarget,

  #[snafu(display("'{keyword}' used outside of a loop"))]
  InvalidLoopControl { keyword: &'static str },

  #[snafu(display("'{name}' expects {expected} argument(s), but got {found}"))]
  ArityMismatch {
    name: String,
    expected: usize,
    found: usize,
  },

  #[snafu(display("redefinition of '{name}'"))]
  DuplicateFunction { name: String },

  #[snafu(display("'{name}' is a register name and cannot name a global or a function"))]
  ReservedSymbol { name: String },
}

impl CompileError {
  /// Construct a syntax error anchored at a specific byte offset in the source.
  pub fn syntax(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = loc.min(source.len());
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line = source[..line_start].matches('\n').count() + 1;
    let column = source[line_start..safe_loc].chars().count() + 1;
    let marker = format!("{}^", " ".repeat(column - 1));
    Self::Syntax {
      line,
      column,
      source_line: source[line_start..line_end].to_string(),
      marker,
      message: message.into(),
    }
  }
}

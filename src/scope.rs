//! Symbol resolution: where each variable lives.
//!
//! Locals sit below the frame pointer at `[ebp-4]`, `[ebp-8]`, ... and
//! parameters above the saved `ebp` and return address at `[ebp+8]`,
//! `[ebp+12]`, .... Globals live at a static label equal to their name.
//!
//! Frames are pushed for the function (holding the parameters and the body's
//! top-level declarations) and for every nested block. The running local
//! offset only grows within a function, so slots of closed blocks are never
//! reused and the final offset is a safe upper bound for the frame size.

use std::collections::{HashMap, HashSet};
use std::fmt;

use snafu::ensure;
use tracing::trace;

use crate::error::{
  CompileResult, RedeclaredVariableSnafu, ReservedSymbolSnafu, UndeclaredVariableSnafu,
};
use crate::ty::{Type, WORD_SIZE};

/// Stack alignment required at function boundaries.
pub const STACK_ALIGNMENT: i32 = 16;

/// Offset of the first parameter: saved `ebp` plus the return address.
const FIRST_PARAM_OFFSET: i32 = 2 * WORD_SIZE;

pub fn align_to(n: i32, align: i32) -> i32 {
  (n + align - 1) / align * align
}

/// Names the assembler reads as registers inside an operand. Globals and
/// functions are emitted under their own names, so they cannot use these.
const REGISTER_NAMES: &[&str] = &[
  "eax", "ebx", "ecx", "edx", "esi", "edi", "esp", "ebp", "ax", "bx", "cx", "dx", "si", "di", "sp",
  "bp", "al", "ah", "bl", "bh", "cl", "ch", "dl", "dh",
];

/// Fail if `name` cannot be used as an assembler symbol.
pub fn check_symbol_name(name: &str) -> CompileResult<()> {
  ensure!(
    !REGISTER_NAMES.contains(&name.to_ascii_lowercase().as_str()),
    ReservedSymbolSnafu { name }
  );
  Ok(())
}

/// Resolved location of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
  /// Signed offset from `ebp`: negative for locals, positive for parameters.
  Frame(i32),
  Global(String),
}

impl fmt::Display for Storage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Storage::Frame(offset) if *offset < 0 => write!(f, "DWORD PTR [ebp-{}]", -offset),
      Storage::Frame(offset) => write!(f, "DWORD PTR [ebp+{offset}]"),
      Storage::Global(label) => write!(f, "DWORD PTR [{label}]"),
    }
  }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
  frames: Vec<HashMap<String, i32>>,
  globals: HashSet<String>,
  offset: i32,
}

impl SymbolTable {
  pub fn new<'a>(globals: impl IntoIterator<Item = &'a str>) -> CompileResult<Self> {
    let mut table = Self::default();
    for name in globals {
      check_symbol_name(name)?;
      ensure!(
        table.globals.insert(name.to_string()),
        RedeclaredVariableSnafu { name }
      );
    }
    Ok(table)
  }

  pub fn is_global(&self, name: &str) -> bool {
    self.globals.contains(name)
  }

  /// Open a fresh function frame holding the parameters.
  pub fn enter_function(&mut self, params: &[String]) -> CompileResult<()> {
    self.frames.clear();
    self.offset = 0;

    let mut frame = HashMap::new();
    let mut param_offset = FIRST_PARAM_OFFSET;
    for name in params {
      ensure!(
        !frame.contains_key(name),
        RedeclaredVariableSnafu { name: name.as_str() }
      );
      frame.insert(name.clone(), param_offset);
      param_offset += Type::Int.size();
    }
    self.frames.push(frame);
    trace!(params = params.len(), "entered function scope");
    Ok(())
  }

  pub fn exit_function(&mut self) {
    self.frames.clear();
  }

  pub fn enter_scope(&mut self) {
    self.frames.push(HashMap::new());
    trace!(depth = self.frames.len(), "entered scope");
  }

  pub fn exit_scope(&mut self) {
    self.frames.pop();
    trace!(depth = self.frames.len(), "left scope");
  }

  /// Bind `name` in the innermost frame and give it the next unused slot.
  pub fn declare(&mut self, name: &str) -> CompileResult<i32> {
    let Some(frame) = self.frames.last_mut() else {
      unreachable!("declare called outside of a function");
    };
    ensure!(!frame.contains_key(name), RedeclaredVariableSnafu { name });

    self.offset += Type::Int.size();
    let offset = -self.offset;
    frame.insert(name.to_string(), offset);
    Ok(offset)
  }

  /// Look `name` up innermost frame first, then among the globals.
  pub fn resolve(&self, name: &str) -> CompileResult<Storage> {
    if let Some(offset) = self
      .frames
      .iter()
      .rev()
      .find_map(|frame| frame.get(name).copied())
    {
      return Ok(Storage::Frame(offset));
    }

    ensure!(self.is_global(name), UndeclaredVariableSnafu { name });
    Ok(Storage::Global(name.to_string()))
  }

  /// Bytes of local storage used so far, rounded up to the stack alignment.
  pub fn frame_size(&self) -> i32 {
    align_to(self.offset, STACK_ALIGNMENT)
  }
}

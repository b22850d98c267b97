//! Command-line configuration for the `minicc` binary.

use std::path::PathBuf;

use snafu::{OptionExt, Snafu};

/// What the driver writes out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emit {
  #[default]
  Asm,
  Tokens,
  Ast,
}

impl Emit {
  fn parse(value: &str) -> Result<Self, ConfigError> {
    match value {
      "asm" => Ok(Emit::Asm),
      "tokens" => Ok(Emit::Tokens),
      "ast" => Ok(Emit::Ast),
      _ => UnknownEmitSnafu { value }.fail(),
    }
  }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
  #[snafu(display("usage: {program} <input> [-o <output>] [--emit asm|tokens|ast]"))]
  Usage { program: String },

  #[snafu(display("missing value for '{flag}'"))]
  MissingValue { flag: &'static str },

  #[snafu(display("unknown emit kind '{value}', expected asm, tokens or ast"))]
  UnknownEmit { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub input: PathBuf,
  /// `None` writes to stdout.
  pub output: Option<PathBuf>,
  pub emit: Emit,
}

impl Config {
  /// Parse `argv`, including the program name in first position.
  pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self, ConfigError> {
    let mut args = args.into_iter();
    let program = args.next().unwrap_or_else(|| "minicc".to_string());

    let mut input = None;
    let mut output = None;
    let mut emit = Emit::default();

    while let Some(arg) = args.next() {
      match arg.as_str() {
        "-o" => {
          let path = args.next().context(MissingValueSnafu { flag: "-o" })?;
          output = Some(PathBuf::from(path));
        }
        "--emit" => {
          let value = args.next().context(MissingValueSnafu { flag: "--emit" })?;
          emit = Emit::parse(&value)?;
        }
        flag if flag.starts_with("--emit=") => {
          emit = Emit::parse(&flag["--emit=".len()..])?;
        }
        // includes a lone `-`: input is always read from a file
        flag if flag.starts_with('-') => {
          return UsageSnafu { program: &program }.fail();
        }
        _ if input.is_none() => input = Some(PathBuf::from(arg)),
        _ => return UsageSnafu { program: &program }.fail(),
      }
    }

    let input = input.context(UsageSnafu { program: &program })?;
    Ok(Self {
      input,
      output,
      emit,
    })
  }
}

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use minicc::config::{Config, Emit};
use minicc::{CompileError, parser, tokenizer};
use snafu::{ResultExt, Snafu};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Snafu)]
enum DriverError {
  #[snafu(display("cannot read '{}': {source}", path.display()))]
  Read { path: PathBuf, source: io::Error },

  #[snafu(display("cannot write '{}': {source}", path.display()))]
  Write { path: PathBuf, source: io::Error },

  #[snafu(display("cannot write to stdout: {source}"))]
  Stdout { source: io::Error },

  #[snafu(display("{source}"))]
  Compile { source: CompileError },
}

fn run(config: &Config) -> Result<(), DriverError> {
  let source = fs::read_to_string(&config.input).context(ReadSnafu {
    path: &config.input,
  })?;
  debug!(input = %config.input.display(), emit = ?config.emit, "compiling");

  let output = match config.emit {
    Emit::Asm => minicc::generate_assembly(&source).context(CompileSnafu)?,
    Emit::Ast => format!("{:#?}\n", parser::parse(&source).context(CompileSnafu)?),
    Emit::Tokens => tokenizer::tokenize(&source)
      .iter()
      .map(|token| format!("{:?} {:?} @{}\n", token.kind, token.text, token.loc))
      .collect(),
  };

  match &config.output {
    Some(path) => fs::write(path, output).context(WriteSnafu { path })?,
    None => io::stdout()
      .write_all(output.as_bytes())
      .context(StdoutSnafu)?,
  }
  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let config = match Config::from_args(env::args()) {
    Ok(config) => config,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  if let Err(err) = run(&config) {
    eprintln!("error: {err}");
    process::exit(1);
  }
}

#![allow(dead_code)]

mod machine;
pub use machine::*;

/// Compile `source`, panicking with the diagnostic if it is rejected.
pub fn compile(source: &str) -> String {
  minicc::generate_assembly(source).unwrap_or_else(|err| panic!("compilation failed:\n{err}"))
}

/// Compile and execute `source`, starting at `main`.
pub fn run(source: &str) -> Outcome {
  let asm = compile(source);
  Machine::load(&asm).run()
}

/// Compile, run, and check both the printed lines and the exit value.
pub fn assert_runs(source: &str, output: &[i32], exit: i32) {
  let outcome = run(source);
  assert_eq!(outcome.output, output, "printed values");
  assert_eq!(outcome.exit, exit, "exit value");
  assert!(outcome.stack_balanced, "stack pointer not restored after main");
}

//! Code generation: lower the parsed AST into 32-bit Intel-syntax assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack and every statement leaves the stack as it found it.
//! Because statements are balanced, `break`/`continue` can jump between them
//! without any cleanup.
//!
//! Each function goes through two passes. The layout pass walks the body and
//! declares every local so the frame size is known before the prologue is
//! written; the emit pass then replays the same declarations in the same
//! order, which hands every local the same slot it had during layout.

use std::collections::HashMap;

use snafu::{OptionExt, ensure};
use tracing::debug;

use crate::ast::{BinaryOp, Declarator, Expr, Function, Program, Stmt, UnaryOp};
use crate::error::{
  ArityMismatchSnafu, CompileResult, DuplicateFunctionSnafu, InvalidAssignmentTargetSnafu,
  InvalidLoopControlSnafu,
};
use crate::label::LabelAllocator;
use crate::scope::{Storage, SymbolTable, check_symbol_name};
use crate::ty::WORD_SIZE;

/// Name of the builtin that prints an integer followed by a newline.
const PRINT_BUILTIN: &str = "println_int";

/// Starts with a dot so no identifier can collide with it.
const FORMAT_LABEL: &str = ".L_format";

#[derive(Debug, Clone, Copy)]
struct FunctionInfo {
  arity: usize,
}

/// Jump targets of the innermost enclosing loop.
#[derive(Debug, Clone)]
struct LoopLabels {
  continue_label: String,
  break_label: String,
}

/// Emit assembly for a whole program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut codegen = Codegen::new(program)?;
  let frame_sizes = codegen.layout_program(program)?;
  codegen.emit_header(program);
  for (func, frame_size) in program.functions.iter().zip(frame_sizes) {
    codegen.emit_function(func, frame_size)?;
  }
  debug!(lines = codegen.asm.lines().count(), "generated assembly");
  Ok(codegen.asm)
}

/// State of one compilation unit.
struct Codegen {
  symbols: SymbolTable,
  functions: HashMap<String, FunctionInfo>,
  labels: LabelAllocator,
  loops: Vec<LoopLabels>,
  asm: String,
}

impl Codegen {
  fn new(program: &Program) -> CompileResult<Self> {
    let symbols = SymbolTable::new(program.globals.iter().map(|g| g.name.as_str()))?;
    Ok(Self {
      symbols,
      functions: HashMap::new(),
      labels: LabelAllocator::new(),
      loops: Vec::new(),
      asm: String::new(),
    })
  }

  fn emit(&mut self, instr: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(instr);
    self.asm.push('\n');
  }

  fn emit_label(&mut self, label: &str) {
    self.asm.push_str(label);
    self.asm.push_str(":\n");
  }

  /// Register every function and size its frame. Returns the frame sizes in
  /// definition order.
  fn layout_program(&mut self, program: &Program) -> CompileResult<Vec<i32>> {
    let mut frame_sizes = Vec::with_capacity(program.functions.len());
    for func in &program.functions {
      check_symbol_name(&func.name)?;
      ensure!(
        !self.functions.contains_key(&func.name) && !self.symbols.is_global(&func.name),
        DuplicateFunctionSnafu { name: &func.name }
      );
      self.functions.insert(
        func.name.clone(),
        FunctionInfo {
          arity: func.params.len(),
        },
      );

      let frame_size = self.layout_function(func)?;
      debug!(
        function = %func.name,
        ret = func.ret.keyword(),
        arity = func.params.len(),
        frame_size,
        "laid out function frame"
      );
      frame_sizes.push(frame_size);
    }
    Ok(frame_sizes)
  }

  fn layout_function(&mut self, func: &Function) -> CompileResult<i32> {
    self.symbols.enter_function(&func.params)?;
    for stmt in &func.body {
      self.declare_locals(stmt)?;
    }
    let frame_size = self.symbols.frame_size();
    self.symbols.exit_function();
    Ok(frame_size)
  }

  /// Declare every local in `stmt` using the same scope discipline as `emit_stmt`.
  fn declare_locals(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::VarDecl(declarators) => {
        for Declarator { name, .. } in declarators {
          self.symbols.declare(name)?;
        }
      }
      Stmt::Block(stmts) => {
        self.symbols.enter_scope();
        for stmt in stmts {
          self.declare_locals(stmt)?;
        }
        self.symbols.exit_scope();
      }
      Stmt::If {
        then, otherwise, ..
      } => {
        self.declare_locals(then)?;
        if let Some(otherwise) = otherwise {
          self.declare_locals(otherwise)?;
        }
      }
      Stmt::While { body, .. } => self.declare_locals(body)?,
      Stmt::Expr(_) | Stmt::Return(_) | Stmt::Break | Stmt::Continue => {}
    }
    Ok(())
  }

  fn emit_header(&mut self, program: &Program) {
    self.asm.push_str(".intel_syntax noprefix\n");
    for func in &program.functions {
      self.asm.push_str(&format!(".global {}\n", func.name));
    }
    self.asm.push_str(".extern printf\n\n");

    self.asm.push_str(".data\n");
    self.emit_label(FORMAT_LABEL);
    self.emit(".asciz \"%d\\n\"");
    for global in &program.globals {
      self.emit_label(&global.name);
      self.emit(".long 0");
    }

    self.asm.push_str("\n.text\n");
  }

  fn emit_function(&mut self, func: &Function, frame_size: i32) -> CompileResult<()> {
    self.emit_label(&func.name);
    self.emit("push ebp");
    self.emit("mov ebp, esp");
    if frame_size > 0 {
      self.emit(&format!("sub esp, {frame_size}"));
    }

    self.symbols.enter_function(&func.params)?;
    let mut returned = false;
    for stmt in &func.body {
      self.emit_stmt(stmt)?;
      returned |= matches!(stmt, Stmt::Return(_));
    }
    debug_assert_eq!(self.symbols.frame_size(), frame_size);
    self.symbols.exit_function();

    if !returned {
      self.emit("mov eax, 0");
      self.emit("leave");
      self.emit("ret");
    }
    Ok(())
  }

  fn emit_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Block(stmts) => {
        self.symbols.enter_scope();
        for stmt in stmts {
          self.emit_stmt(stmt)?;
        }
        self.symbols.exit_scope();
      }
      Stmt::VarDecl(declarators) => {
        for Declarator { name, init } in declarators {
          let offset = self.symbols.declare(name)?;
          if let Some(init) = init {
            self.emit_expr(init)?;
            self.emit("pop eax");
            self.emit(&format!("mov {}, eax", Storage::Frame(offset)));
          }
        }
      }
      Stmt::Expr(expr) => {
        self.emit_expr(expr)?;
        self.emit(&format!("add esp, {WORD_SIZE}"));
      }
      Stmt::Return(expr) => {
        match expr {
          Some(expr) => {
            self.emit_expr(expr)?;
            self.emit("pop eax");
          }
          None => self.emit("mov eax, 0"),
        }
        self.emit("leave");
        self.emit("ret");
      }
      Stmt::If {
        cond,
        then,
        otherwise,
      } => {
        let else_label = self.labels.label("else");
        let end_label = self.labels.label("end");

        self.emit_condition(cond)?;
        match otherwise {
          Some(otherwise) => {
            self.emit(&format!("je {else_label}"));
            self.emit_stmt(then)?;
            self.emit(&format!("jmp {end_label}"));
            self.emit_label(&else_label);
            self.emit_stmt(otherwise)?;
          }
          None => {
            self.emit(&format!("je {end_label}"));
            self.emit_stmt(then)?;
          }
        }
        self.emit_label(&end_label);
      }
      Stmt::While { cond, body } => {
        let cond_label = self.labels.label("cond");
        let end_label = self.labels.label("end");

        self.emit_label(&cond_label);
        self.emit_condition(cond)?;
        self.emit(&format!("je {end_label}"));

        self.loops.push(LoopLabels {
          continue_label: cond_label.clone(),
          break_label: end_label.clone(),
        });
        let body_result = self.emit_stmt(body);
        self.loops.pop();
        body_result?;

        self.emit(&format!("jmp {cond_label}"));
        self.emit_label(&end_label);
      }
      Stmt::Break => {
        let target = self
          .loops
          .last()
          .context(InvalidLoopControlSnafu { keyword: "break" })?
          .break_label
          .clone();
        self.emit(&format!("jmp {target}"));
      }
      Stmt::Continue => {
        let target = self
          .loops
          .last()
          .context(InvalidLoopControlSnafu {
            keyword: "continue",
          })?
          .continue_label
          .clone();
        self.emit(&format!("jmp {target}"));
      }
    }
    Ok(())
  }

  /// Evaluate `cond` and compare it against zero, ready for a `je`.
  fn emit_condition(&mut self, cond: &Expr) -> CompileResult<()> {
    self.emit_expr(cond)?;
    self.emit("pop eax");
    self.emit("cmp eax, 0");
    Ok(())
  }

  /// Emit stack-based code for a single expression node.
  fn emit_expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match expr {
      Expr::Num { value } => self.emit(&format!("push {value}")),
      Expr::Ident { name } => {
        let storage = self.symbols.resolve(name)?;
        self.emit(&format!("mov eax, {storage}"));
        self.emit("push eax");
      }
      Expr::Unary { op, operand } => {
        self.emit_expr(operand)?;
        self.emit("pop eax");
        match op {
          UnaryOp::Neg => self.emit("neg eax"),
          UnaryOp::BitNot => self.emit("not eax"),
          UnaryOp::Not => {
            self.emit("cmp eax, 0");
            self.emit("sete al");
            self.emit("movzx eax, al");
          }
        }
        self.emit("push eax");
      }
      Expr::Binary {
        op: BinaryOp::Assign,
        lhs,
        rhs,
      } => self.emit_assign(lhs, rhs)?,
      Expr::Binary {
        op: op @ (BinaryOp::LogAnd | BinaryOp::LogOr),
        lhs,
        rhs,
      } => self.emit_logical(*op, lhs, rhs)?,
      Expr::Binary { op, lhs, rhs } => {
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.emit("pop ecx");
        self.emit("pop eax");
        self.emit_binary_op(*op);
        self.emit("push eax");
      }
      Expr::Call { name, args } if name == PRINT_BUILTIN => self.emit_print(args)?,
      Expr::Call { name, args } => self.emit_call(name, args)?,
    }
    Ok(())
  }

  /// Combine `eax` (left) and `ecx` (right) into `eax`.
  fn emit_binary_op(&mut self, op: BinaryOp) {
    match op {
      BinaryOp::Add => self.emit("add eax, ecx"),
      BinaryOp::Sub => self.emit("sub eax, ecx"),
      BinaryOp::Mul => self.emit("imul eax, ecx"),
      BinaryOp::Div => {
        self.emit("cdq");
        self.emit("idiv ecx");
      }
      BinaryOp::Mod => {
        self.emit("cdq");
        self.emit("idiv ecx");
        self.emit("mov eax, edx");
      }
      BinaryOp::BitAnd => self.emit("and eax, ecx"),
      BinaryOp::BitOr => self.emit("or eax, ecx"),
      BinaryOp::BitXor => self.emit("xor eax, ecx"),
      BinaryOp::Eq => self.emit_compare("e"),
      BinaryOp::Ne => self.emit_compare("ne"),
      BinaryOp::Lt => self.emit_compare("l"),
      BinaryOp::Le => self.emit_compare("le"),
      BinaryOp::Gt => self.emit_compare("g"),
      BinaryOp::Ge => self.emit_compare("ge"),
      BinaryOp::Assign | BinaryOp::LogAnd | BinaryOp::LogOr => {
        unreachable!("{op:?} is lowered before its operands are evaluated")
      }
    }
  }

  fn emit_compare(&mut self, condition: &str) {
    self.emit("cmp eax, ecx");
    self.emit(&format!("set{condition} al"));
    self.emit("movzx eax, al");
  }

  fn emit_assign(&mut self, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    let Expr::Ident { name } = lhs else {
      return InvalidAssignmentTargetSnafu.fail();
    };
    let storage = self.symbols.resolve(name)?;

    self.emit_expr(rhs)?;
    self.emit("pop eax");
    self.emit(&format!("mov {storage}, eax"));
    self.emit("push eax");
    Ok(())
  }

  /// Short-circuit `&&` and `||`, materialising 0 or 1.
  fn emit_logical(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    let (prefix, jump, decided, undecided) = if op == BinaryOp::LogAnd {
      ("false", "je", 0, 1)
    } else {
      ("true", "jne", 1, 0)
    };
    let short_label = self.labels.label(prefix);
    let end_label = self.labels.label("end");

    for operand in [lhs, rhs] {
      self.emit_condition(operand)?;
      self.emit(&format!("{jump} {short_label}"));
    }
    self.emit(&format!("mov eax, {undecided}"));
    self.emit(&format!("jmp {end_label}"));
    self.emit_label(&short_label);
    self.emit(&format!("mov eax, {decided}"));
    self.emit_label(&end_label);
    self.emit("push eax");
    Ok(())
  }

  /// cdecl call: arguments pushed right to left, caller pops them.
  fn emit_call(&mut self, name: &str, args: &[Expr]) -> CompileResult<()> {
    if let Some(expected) = self.functions.get(name).map(|info| info.arity) {
      ensure!(
        expected == args.len(),
        ArityMismatchSnafu {
          name,
          expected,
          found: args.len(),
        }
      );
    }

    for arg in args.iter().rev() {
      self.emit_expr(arg)?;
    }
    self.emit(&format!("call {name}"));
    if !args.is_empty() {
      self.emit(&format!("add esp, {}", args.len() as i32 * WORD_SIZE));
    }
    self.emit("push eax");
    Ok(())
  }

  /// `println_int(e)` prints through `printf` and yields 0 like any other call.
  fn emit_print(&mut self, args: &[Expr]) -> CompileResult<()> {
    ensure!(
      args.len() == 1,
      ArityMismatchSnafu {
        name: PRINT_BUILTIN,
        expected: 1usize,
        found: args.len(),
      }
    );

    self.emit_expr(&args[0])?;
    self.emit(&format!("push offset {FORMAT_LABEL}"));
    self.emit("call printf");
    self.emit(&format!("add esp, {}", 2 * WORD_SIZE));
    self.emit("push 0");
    Ok(())
  }
}

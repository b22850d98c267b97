//! Syntax tree produced by the parser and consumed by code generation.
//!
//! The tree is strictly hierarchical: a `Program` owns its functions, each
//! function owns its body, and every child is boxed or stored inline in a
//! `Vec`. Identifiers and calls hold names only; they are resolved against
//! the symbol tables while generating code.

use crate::ty::Type;

/// Unary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
  BitNot,
}

/// Binary operators recognised by the language, including assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Assign,
  LogOr,
  LogAnd,
  BitOr,
  BitXor,
  BitAnd,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
  Add,
  Sub,
  Mul,
  Div,
  Mod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
  Num {
    value: i64,
  },
  Ident {
    name: String,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Call {
    name: String,
    args: Vec<Expr>,
  },
}

impl Expr {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn ident(name: impl Into<String>) -> Self {
    Self::Ident { name: name.into() }
  }

  pub fn unary(op: UnaryOp, operand: Expr) -> Self {
    Self::Unary {
      op,
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  pub fn assign(lhs: Expr, rhs: Expr) -> Self {
    Self::binary(BinaryOp::Assign, lhs, rhs)
  }

  pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
    Self::Call {
      name: name.into(),
      args,
    }
  }
}

/// One `name [= init]` entry of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
  pub name: String,
  pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
  Block(Vec<Stmt>),
  VarDecl(Vec<Declarator>),
  Expr(Expr),
  Return(Option<Expr>),
  If {
    cond: Expr,
    then: Box<Stmt>,
    otherwise: Option<Box<Stmt>>,
  },
  While {
    cond: Expr,
    body: Box<Stmt>,
  },
  Break,
  Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  pub ret: Type,
  pub name: String,
  pub params: Vec<String>,
  /// Statements of the function's single top-level block.
  pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
  pub globals: Vec<Global>,
  pub functions: Vec<Function>,
}

//! Recursive-descent parser producing the program AST.
//!
//! Items and statements are parsed by dispatching on the leading token.
//! Expressions go through a precedence cascade: each binary level parses an
//! operand of the next-higher level, then folds further operands in while the
//! current token belongs to its operator set, which keeps every level
//! left-associative. Assignment is the one right-associative level and sits
//! at the bottom of the cascade.
//!
//! The parser pulls tokens from the scanner lazily and only ever looks at the
//! current token.

use std::mem;

use tracing::debug;

use crate::ast::{BinaryOp, Declarator, Expr, Function, Global, Program, Stmt, UnaryOp};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Scanner, Token, TokenKind};
use crate::ty::Type;

type ParseFn = fn(&mut TokenStream) -> CompileResult<Expr>;

/// Parse a complete program from source text.
pub fn parse(source: &str) -> CompileResult<Program> {
  let mut stream = TokenStream::new(source);

  if stream.is_eof() {
    return Err(CompileError::syntax(source, 0, "program is empty"));
  }

  let mut program = Program::default();
  while !stream.is_eof() {
    parse_item(&mut stream, &mut program)?;
  }

  debug!(
    tokens = stream.consumed,
    globals = program.globals.len(),
    functions = program.functions.len(),
    "parsed program"
  );
  Ok(program)
}

/// A top-level item: `type name(params) { ... }` or `int a, b;`.
fn parse_item(stream: &mut TokenStream, program: &mut Program) -> CompileResult<()> {
  let ret = if stream.equal(TokenKind::Int) {
    Type::Int
  } else if stream.equal(TokenKind::Void) {
    Type::Void
  } else {
    return Err(stream.unexpected("\"int\" or \"void\""));
  };

  let name_loc = stream.peek().loc;
  let name = stream.get_ident()?;

  if stream.equal(TokenKind::LParen) {
    let params = parse_params(stream)?;
    stream.skip(TokenKind::LBrace)?;
    let body = parse_block_items(stream)?;
    program.functions.push(Function {
      ret,
      name,
      params,
      body,
    });
    return Ok(());
  }

  if ret == Type::Void {
    return Err(CompileError::syntax(
      stream.source(),
      name_loc,
      format!("variable '{name}' declared void"),
    ));
  }

  program.globals.push(Global { name });
  while stream.equal(TokenKind::Comma) {
    let name = stream.get_ident()?;
    program.globals.push(Global { name });
  }
  stream.skip(TokenKind::Semicolon)?;
  Ok(())
}

/// Parameter list after the opening parenthesis: `)`, `void)`, or `int a, int b)`.
fn parse_params(stream: &mut TokenStream) -> CompileResult<Vec<String>> {
  let mut params = Vec::new();
  if stream.equal(TokenKind::RParen) {
    return Ok(params);
  }
  if stream.equal(TokenKind::Void) {
    stream.skip(TokenKind::RParen)?;
    return Ok(params);
  }

  loop {
    stream.skip(TokenKind::Int)?;
    params.push(stream.get_ident()?);
    if !stream.equal(TokenKind::Comma) {
      break;
    }
  }
  stream.skip(TokenKind::RParen)?;
  Ok(params)
}

/// Statements up to and including the closing brace of a block.
fn parse_block_items(stream: &mut TokenStream) -> CompileResult<Vec<Stmt>> {
  let mut stmts = Vec::new();
  while !matches!(stream.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
    stmts.push(parse_stmt(stream)?);
  }
  stream.skip(TokenKind::RBrace)?;
  Ok(stmts)
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Stmt> {
  match stream.peek().kind {
    TokenKind::Int => {
      stream.advance();
      parse_declaration(stream)
    }
    TokenKind::Return => {
      stream.advance();
      if stream.equal(TokenKind::Semicolon) {
        return Ok(Stmt::Return(None));
      }
      let expr = parse_expr(stream)?;
      stream.skip(TokenKind::Semicolon)?;
      Ok(Stmt::Return(Some(expr)))
    }
    TokenKind::If => {
      stream.advance();
      stream.skip(TokenKind::LParen)?;
      let cond = parse_expr(stream)?;
      stream.skip(TokenKind::RParen)?;
      let then = Box::new(parse_stmt(stream)?);
      let otherwise = if stream.equal(TokenKind::Else) {
        Some(Box::new(parse_stmt(stream)?))
      } else {
        None
      };
      Ok(Stmt::If {
        cond,
        then,
        otherwise,
      })
    }
    TokenKind::While => {
      stream.advance();
      stream.skip(TokenKind::LParen)?;
      let cond = parse_expr(stream)?;
      stream.skip(TokenKind::RParen)?;
      let body = Box::new(parse_stmt(stream)?);
      Ok(Stmt::While { cond, body })
    }
    TokenKind::Break => {
      stream.advance();
      stream.skip(TokenKind::Semicolon)?;
      Ok(Stmt::Break)
    }
    TokenKind::Continue => {
      stream.advance();
      stream.skip(TokenKind::Semicolon)?;
      Ok(Stmt::Continue)
    }
    TokenKind::LBrace => {
      stream.advance();
      Ok(Stmt::Block(parse_block_items(stream)?))
    }
    _ => {
      let expr = parse_expr(stream)?;
      stream.skip(TokenKind::Semicolon)?;
      Ok(Stmt::Expr(expr))
    }
  }
}

/// `a, b = e, c;` after the leading `int`.
fn parse_declaration(stream: &mut TokenStream) -> CompileResult<Stmt> {
  let mut declarators = Vec::new();
  loop {
    let name = stream.get_ident()?;
    let init = if stream.equal(TokenKind::Assign) {
      Some(parse_assign(stream)?)
    } else {
      None
    };
    declarators.push(Declarator { name, init });
    if !stream.equal(TokenKind::Comma) {
      break;
    }
  }
  stream.skip(TokenKind::Semicolon)?;
  Ok(Stmt::VarDecl(declarators))
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_assign(stream)
}

fn parse_assign(stream: &mut TokenStream) -> CompileResult<Expr> {
  let node = parse_log_or(stream)?;

  if stream.equal(TokenKind::Assign) {
    let rhs = parse_assign(stream)?;
    return Ok(Expr::assign(node, rhs));
  }

  Ok(node)
}

/// Fold a left-associative binary level.
fn parse_left_assoc(
  stream: &mut TokenStream,
  ops: &[(TokenKind, BinaryOp)],
  next: ParseFn,
) -> CompileResult<Expr> {
  let mut node = next(stream)?;

  while let Some(&(kind, op)) = ops.iter().find(|(kind, _)| stream.peek().kind == *kind) {
    stream.skip(kind)?;
    let rhs = next(stream)?;
    node = Expr::binary(op, node, rhs);
  }

  Ok(node)
}

fn parse_log_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(stream, &[(TokenKind::OrOr, BinaryOp::LogOr)], parse_log_and)
}

fn parse_log_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(stream, &[(TokenKind::AndAnd, BinaryOp::LogAnd)], parse_bit_or)
}

fn parse_bit_or(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(stream, &[(TokenKind::Pipe, BinaryOp::BitOr)], parse_bit_xor)
}

fn parse_bit_xor(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(stream, &[(TokenKind::Caret, BinaryOp::BitXor)], parse_bit_and)
}

fn parse_bit_and(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(stream, &[(TokenKind::Amp, BinaryOp::BitAnd)], parse_equality)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(
    stream,
    &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
    parse_relational,
  )
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(
    stream,
    &[
      (TokenKind::Lt, BinaryOp::Lt),
      (TokenKind::Le, BinaryOp::Le),
      (TokenKind::Gt, BinaryOp::Gt),
      (TokenKind::Ge, BinaryOp::Ge),
    ],
    parse_add,
  )
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(
    stream,
    &[
      (TokenKind::Plus, BinaryOp::Add),
      (TokenKind::Minus, BinaryOp::Sub),
    ],
    parse_mul,
  )
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Expr> {
  parse_left_assoc(
    stream,
    &[
      (TokenKind::Star, BinaryOp::Mul),
      (TokenKind::Slash, BinaryOp::Div),
      (TokenKind::Percent, BinaryOp::Mod),
    ],
    parse_unary,
  )
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Expr> {
  if stream.equal(TokenKind::Plus) {
    return parse_unary(stream);
  }

  let op = match stream.peek().kind {
    TokenKind::Minus => UnaryOp::Neg,
    TokenKind::Bang => UnaryOp::Not,
    TokenKind::Tilde => UnaryOp::BitNot,
    _ => return parse_primary(stream),
  };
  stream.advance();
  let operand = parse_unary(stream)?;
  Ok(Expr::unary(op, operand))
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Expr> {
  match stream.peek().kind {
    TokenKind::LParen => {
      stream.advance();
      let node = parse_expr(stream)?;
      stream.skip(TokenKind::RParen)?;
      Ok(node)
    }
    TokenKind::Num => {
      let token = stream.advance();
      Ok(Expr::number(token.number()))
    }
    TokenKind::Ident => {
      let name = stream.advance().text;
      if !stream.equal(TokenKind::LParen) {
        return Ok(Expr::ident(name));
      }

      let mut args = Vec::new();
      if !stream.equal(TokenKind::RParen) {
        loop {
          args.push(parse_assign(stream)?);
          if !stream.equal(TokenKind::Comma) {
            break;
          }
        }
        stream.skip(TokenKind::RParen)?;
      }
      Ok(Expr::call(name, args))
    }
    _ => Err(stream.unexpected("an expression")),
  }
}

/// One-token lookahead over the scanner.
struct TokenStream<'a> {
  scanner: Scanner<'a>,
  current: Token,
  /// Tokens consumed so far.
  consumed: usize,
}

impl<'a> TokenStream<'a> {
  fn new(source: &'a str) -> Self {
    let mut scanner = Scanner::new(source);
    let current = scanner.next_token();
    Self {
      scanner,
      current,
      consumed: 0,
    }
  }

  fn source(&self) -> &'a str {
    self.scanner.source()
  }

  fn peek(&self) -> &Token {
    &self.current
  }

  /// Move past the current token and hand it back.
  fn advance(&mut self) -> Token {
    let next = self.scanner.next_token();
    self.consumed += 1;
    mem::replace(&mut self.current, next)
  }

  /// Consume the current token if it has the given kind.
  fn equal(&mut self, kind: TokenKind) -> bool {
    if self.current.kind == kind {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, kind: TokenKind) -> CompileResult<Token> {
    if self.current.kind == kind {
      Ok(self.advance())
    } else {
      Err(self.unexpected(&format!("\"{}\"", kind.describe())))
    }
  }

  fn get_ident(&mut self) -> CompileResult<String> {
    if self.current.kind == TokenKind::Ident {
      return Ok(self.advance().text);
    }
    Err(self.unexpected("an identifier"))
  }

  /// Syntax error naming what was expected and what the current token is.
  fn unexpected(&self, expected: &str) -> CompileError {
    let got = self.current.describe();
    let message = if self.current.kind == TokenKind::Illegal {
      format!("expected {expected}, but got illegal character '{got}'")
    } else {
      format!("expected {expected}, but got \"{got}\"")
    };
    CompileError::syntax(self.source(), self.current.loc, message)
  }

  fn is_eof(&self) -> bool {
    self.current.kind == TokenKind::Eof
  }
}

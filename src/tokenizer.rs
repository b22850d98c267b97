//! Lexical analysis: turns the raw input string into tokens on demand.
//!
//! The scanner is pull-based. The parser asks for one token at a time and the
//! scanner keeps answering `Eof` once the input is exhausted. Multi-character
//! punctuators are matched with a single byte of lookahead before falling back
//! to the single-character set. Characters outside the language come back as
//! `Illegal` tokens so the parser can report them with full context.

use tracing::debug;

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Eof,
  Illegal,

  // Keywords
  Int,
  Void,
  Return,
  If,
  Else,
  While,
  Break,
  Continue,

  Ident,
  Num,

  // Punctuation and operators
  Assign,
  Semicolon,
  Comma,
  LParen,
  RParen,
  LBrace,
  RBrace,
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Lt,
  Le,
  Gt,
  Ge,
  EqEq,
  Ne,
  Amp,
  Pipe,
  Caret,
  AndAnd,
  OrOr,
  Bang,
  Tilde,
}

impl TokenKind {
  /// Spelling used when a token of this kind is expected but missing.
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::Eof => "EOF",
      TokenKind::Illegal => "illegal token",
      TokenKind::Int => "int",
      TokenKind::Void => "void",
      TokenKind::Return => "return",
      TokenKind::If => "if",
      TokenKind::Else => "else",
      TokenKind::While => "while",
      TokenKind::Break => "break",
      TokenKind::Continue => "continue",
      TokenKind::Ident => "an identifier",
      TokenKind::Num => "a number",
      TokenKind::Assign => "=",
      TokenKind::Semicolon => ";",
      TokenKind::Comma => ",",
      TokenKind::LParen => "(",
      TokenKind::RParen => ")",
      TokenKind::LBrace => "{",
      TokenKind::RBrace => "}",
      TokenKind::Plus => "+",
      TokenKind::Minus => "-",
      TokenKind::Star => "*",
      TokenKind::Slash => "/",
      TokenKind::Percent => "%",
      TokenKind::Lt => "<",
      TokenKind::Le => "<=",
      TokenKind::Gt => ">",
      TokenKind::Ge => ">=",
      TokenKind::EqEq => "==",
      TokenKind::Ne => "!=",
      TokenKind::Amp => "&",
      TokenKind::Pipe => "|",
      TokenKind::Caret => "^",
      TokenKind::AndAnd => "&&",
      TokenKind::OrOr => "||",
      TokenKind::Bang => "!",
      TokenKind::Tilde => "~",
    }
  }
}

const KEYWORDS: [(&str, TokenKind); 8] = [
  ("int", TokenKind::Int),
  ("void", TokenKind::Void),
  ("return", TokenKind::Return),
  ("if", TokenKind::If),
  ("else", TokenKind::Else),
  ("while", TokenKind::While),
  ("break", TokenKind::Break),
  ("continue", TokenKind::Continue),
];

const TWO_CHAR_OPS: [(&str, TokenKind); 6] = [
  ("==", TokenKind::EqEq),
  ("!=", TokenKind::Ne),
  ("<=", TokenKind::Le),
  (">=", TokenKind::Ge),
  ("&&", TokenKind::AndAnd),
  ("||", TokenKind::OrOr),
];

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub loc: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, loc: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      loc,
    }
  }

  /// Value of a `Num` token. Digits are folded with wrapping arithmetic, so
  /// oversized literals pass through instead of failing.
  pub fn number(&self) -> i64 {
    self.text.bytes().fold(0i64, |acc, digit| {
      acc
        .wrapping_mul(10)
        .wrapping_add(i64::from(digit.wrapping_sub(b'0')))
    })
  }

  /// Human-friendly description used in diagnostics.
  pub fn describe(&self) -> &str {
    match self.kind {
      TokenKind::Eof => "EOF",
      _ => &self.text,
    }
  }
}

/// Pull-based scanner over a borrowed source string.
pub struct Scanner<'a> {
  source: &'a str,
  pos: usize,
  finished: bool,
}

impl<'a> Scanner<'a> {
  pub fn new(source: &'a str) -> Self {
    Self {
      source,
      pos: 0,
      finished: false,
    }
  }

  pub fn source(&self) -> &'a str {
    self.source
  }

  /// Return the next token. After the input runs out every call yields `Eof`.
  pub fn next_token(&mut self) -> Token {
    self.skip_trivia();

    let bytes = self.source.as_bytes();
    let start = self.pos;
    let Some(&c) = bytes.get(start) else {
      return Token::new(TokenKind::Eof, "", self.source.len());
    };

    if c.is_ascii_alphabetic() || c == b'_' {
      self.pos += 1;
      while self
        .peek_byte()
        .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
      {
        self.pos += 1;
      }
      let text = &self.source[start..self.pos];
      let kind = KEYWORDS
        .iter()
        .find(|(word, _)| *word == text)
        .map_or(TokenKind::Ident, |(_, kind)| *kind);
      return Token::new(kind, text, start);
    }

    if c.is_ascii_digit() {
      self.pos += 1;
      while self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
        self.pos += 1;
      }
      return Token::new(TokenKind::Num, &self.source[start..self.pos], start);
    }

    if let Some((op, kind)) = TWO_CHAR_OPS
      .iter()
      .find(|(op, _)| self.source[start..].starts_with(op))
    {
      self.pos += op.len();
      return Token::new(*kind, *op, start);
    }

    let kind = match c {
      b'=' => TokenKind::Assign,
      b';' => TokenKind::Semicolon,
      b',' => TokenKind::Comma,
      b'(' => TokenKind::LParen,
      b')' => TokenKind::RParen,
      b'{' => TokenKind::LBrace,
      b'}' => TokenKind::RBrace,
      b'+' => TokenKind::Plus,
      b'-' => TokenKind::Minus,
      b'*' => TokenKind::Star,
      b'/' => TokenKind::Slash,
      b'%' => TokenKind::Percent,
      b'<' => TokenKind::Lt,
      b'>' => TokenKind::Gt,
      b'&' => TokenKind::Amp,
      b'|' => TokenKind::Pipe,
      b'^' => TokenKind::Caret,
      b'!' => TokenKind::Bang,
      b'~' => TokenKind::Tilde,
      _ => {
        let invalid = self.source[start..].chars().next().unwrap_or('\0');
        self.pos += invalid.len_utf8();
        return Token::new(TokenKind::Illegal, invalid.to_string(), start);
      }
    };
    self.pos += 1;
    Token::new(kind, &self.source[start..self.pos], start)
  }

  fn peek_byte(&self) -> Option<u8> {
    self.source.as_bytes().get(self.pos).copied()
  }

  /// Skip whitespace and `//` line comments.
  fn skip_trivia(&mut self) {
    loop {
      match self.peek_byte() {
        Some(b) if b.is_ascii_whitespace() => self.pos += 1,
        Some(b'/') if self.source[self.pos..].starts_with("//") => {
          self.pos = self.source[self.pos..]
            .find('\n')
            .map_or(self.source.len(), |i| self.pos + i);
        }
        _ => break,
      }
    }
  }
}

impl Iterator for Scanner<'_> {
  type Item = Token;

  /// Yields the terminating `Eof` exactly once, then ends.
  fn next(&mut self) -> Option<Token> {
    if self.finished {
      return None;
    }
    let token = self.next_token();
    if token.kind == TokenKind::Eof {
      self.finished = true;
    }
    Some(token)
  }
}

/// Lex the whole input into a vector of tokens terminated by an `Eof` marker.
pub fn tokenize(source: &str) -> Vec<Token> {
  let tokens: Vec<Token> = Scanner::new(source).collect();
  debug!(tokens = tokens.len(), "scanned source");
  tokens
}

/// Size in bytes of the only data type the language has.
pub const WORD_SIZE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
  Int,
  Void,
}

impl Type {
  pub fn size(&self) -> i32 {
    match self {
      Type::Int => WORD_SIZE,
      Type::Void => 0,
    }
  }

  pub fn keyword(&self) -> &'static str {
    match self {
      Type::Int => "int",
      Type::Void => "void",
    }
  }
}

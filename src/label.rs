/// Issues unique label numbers for one compilation unit.
///
/// Every construct that needs a jump target draws fresh numbers and never
/// gives them back, so two labels never collide even across functions.
#[derive(Debug, Default)]
pub struct LabelAllocator {
  next: usize,
}

impl LabelAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn next(&mut self) -> usize {
    let id = self.next;
    self.next += 1;
    id
  }

  /// Draw a fresh number and format it as a local assembler label.
  pub fn label(&mut self, prefix: &str) -> String {
    let id = self.next();
    format!(".L_{prefix}_{id}")
  }
}

//! Interpreter for the x86 subset the compiler emits.
//!
//! Only what the code generator produces is understood: push/pop stack code,
//! two-operand arithmetic on `eax`/`ecx`/`edx`, `ebp`-relative and labelled
//! memory operands, compares with `setCC`, jumps, calls, and `printf` with the
//! integer format string. Anything else panics so a test notices it.

use std::collections::HashMap;

const STACK_TOP: u32 = 0x0010_0000;
const DATA_BASE: u32 = 0x0000_1000;
const FORMAT_ADDR: u32 = 0x0000_0f00;
/// Return address pushed before entering `main`.
const HALT: u32 = 0xffff_fff0;
const STEP_LIMIT: usize = 1_000_000;
/// Registers an assembler would read in place of a same-named symbol.
const REGISTERS: &[&str] = &[
  "eax", "ebx", "ecx", "edx", "esi", "edi", "esp", "ebp", "ax", "bx", "cx", "dx", "si", "di", "sp",
  "bp", "al", "ah", "bl", "bh", "cl", "ch", "dl", "dh",
];

fn assert_not_register(symbol: &str) {
  assert!(
    !REGISTERS.contains(&symbol.to_ascii_lowercase().as_str()),
    "register `{symbol}` used where a symbol was expected"
  );
}

#[derive(Debug)]
pub struct Outcome {
  /// `eax` when `main` returned.
  pub exit: i32,
  /// Every value passed to `printf`.
  pub output: Vec<i32>,
  /// Whether `esp` was back at its starting point after `main` returned.
  pub stack_balanced: bool,
}

#[derive(Debug)]
struct Instr {
  op: String,
  args: Vec<String>,
}

#[derive(Debug, Default)]
struct Registers {
  eax: i32,
  ebx: i32,
  ecx: i32,
  edx: i32,
  esp: i32,
  ebp: i32,
}

pub struct Machine {
  code: Vec<Instr>,
  labels: HashMap<String, usize>,
  data: HashMap<String, u32>,
  memory: HashMap<u32, i32>,
  regs: Registers,
  flags: (i32, i32),
  output: Vec<i32>,
}

impl Machine {
  pub fn load(asm: &str) -> Self {
    let mut machine = Machine {
      code: Vec::new(),
      labels: HashMap::new(),
      data: HashMap::new(),
      memory: HashMap::new(),
      regs: Registers::default(),
      flags: (0, 0),
      output: Vec::new(),
    };

    let mut in_data = false;
    let mut pending: Option<String> = None;
    let mut next_data = DATA_BASE;

    for line in asm.lines().map(str::trim).filter(|line| !line.is_empty()) {
      match line {
        ".data" => {
          in_data = true;
          continue;
        }
        ".text" => {
          in_data = false;
          continue;
        }
        _ => {}
      }

      if let Some(label) = line.strip_suffix(':') {
        if in_data {
          pending = Some(label.to_string());
        } else {
          let previous = machine.labels.insert(label.to_string(), machine.code.len());
          assert!(previous.is_none(), "duplicate label {label}");
        }
        continue;
      }

      if line.starts_with('.') {
        if in_data {
          let name = pending.take();
          if let Some(value) = line.strip_prefix(".long ") {
            let name = name.unwrap_or_else(|| panic!("unlabelled data: {line}"));
            machine.data.insert(name, next_data);
            machine.memory.insert(next_data, value.trim().parse().unwrap());
            next_data += 4;
          } else if line.starts_with(".asciz") {
            assert_eq!(line, ".asciz \"%d\\n\"", "unexpected string data");
            machine.data.insert(name.unwrap(), FORMAT_ADDR);
          }
        }
        continue;
      }

      let (op, rest) = line.split_once(' ').unwrap_or((line, ""));
      let args = if rest.is_empty() {
        Vec::new()
      } else {
        rest.split(", ").map(|arg| arg.trim().to_string()).collect()
      };
      machine.code.push(Instr {
        op: op.to_string(),
        args,
      });
    }

    machine
  }

  pub fn run(mut self) -> Outcome {
    self.regs.esp = STACK_TOP as i32;
    self.push(HALT as i32);
    let mut ip = *self.labels.get("main").expect("no main label");

    for _ in 0..STEP_LIMIT {
      let instr = &self.code[ip];
      let op = instr.op.clone();
      let args = instr.args.clone();
      ip += 1;

      match op.as_str() {
        "push" => {
          let value = self.value(&args[0]);
          self.push(value);
        }
        "pop" => {
          let value = self.pop();
          self.store(&args[0], value);
        }
        "mov" => {
          let value = self.value(&args[1]);
          self.store(&args[0], value);
        }
        "movzx" => {
          let value = self.value(&args[1]) & 0xff;
          self.store(&args[0], value);
        }
        "add" | "sub" | "imul" | "and" | "or" | "xor" => {
          let lhs = self.value(&args[0]);
          let rhs = self.value(&args[1]);
          let result = match op.as_str() {
            "add" => lhs.wrapping_add(rhs),
            "sub" => lhs.wrapping_sub(rhs),
            "imul" => lhs.wrapping_mul(rhs),
            "and" => lhs & rhs,
            "or" => lhs | rhs,
            _ => lhs ^ rhs,
          };
          self.store(&args[0], result);
        }
        "neg" => {
          let value = self.value(&args[0]);
          self.store(&args[0], value.wrapping_neg());
        }
        "not" => {
          let value = self.value(&args[0]);
          self.store(&args[0], !value);
        }
        "cdq" => self.regs.edx = if self.regs.eax < 0 { -1 } else { 0 },
        "idiv" => {
          let divisor = i64::from(self.value(&args[0]));
          assert_ne!(divisor, 0, "division by zero");
          let dividend = (i64::from(self.regs.edx) << 32) | i64::from(self.regs.eax as u32);
          self.regs.eax = (dividend / divisor) as i32;
          self.regs.edx = (dividend % divisor) as i32;
        }
        "cmp" => self.flags = (self.value(&args[0]), self.value(&args[1])),
        "sete" | "setne" | "setl" | "setle" | "setg" | "setge" => {
          let taken = self.condition(&op["set".len()..]);
          self.store(&args[0], i32::from(taken));
        }
        "je" | "jne" | "jmp" => {
          let taken = op == "jmp" || self.condition(&op[1..]);
          if taken {
            ip = self.target(&args[0]);
          }
        }
        "call" => {
          if args[0] == "printf" {
            let format = self.load_word(self.regs.esp as u32);
            assert_eq!(format as u32, FORMAT_ADDR, "printf without format string");
            let value = self.load_word((self.regs.esp as u32).wrapping_add(4));
            self.output.push(value);
            self.regs.eax = 2;
          } else {
            assert_not_register(&args[0]);
            self.push(ip as i32);
            ip = self.target(&args[0]);
          }
        }
        "leave" => {
          self.regs.esp = self.regs.ebp;
          self.regs.ebp = self.pop();
        }
        "ret" => {
          let address = self.pop() as u32;
          if address == HALT {
            return Outcome {
              exit: self.regs.eax,
              output: self.output,
              stack_balanced: self.regs.esp as u32 == STACK_TOP,
            };
          }
          ip = address as usize;
        }
        other => panic!("unsupported instruction: {other} {args:?}"),
      }
    }

    panic!("program did not finish within {STEP_LIMIT} steps");
  }

  fn target(&self, label: &str) -> usize {
    *self
      .labels
      .get(label)
      .unwrap_or_else(|| panic!("unknown label {label}"))
  }

  fn condition(&self, code: &str) -> bool {
    let (lhs, rhs) = self.flags;
    match code {
      "e" => lhs == rhs,
      "ne" => lhs != rhs,
      "l" => lhs < rhs,
      "le" => lhs <= rhs,
      "g" => lhs > rhs,
      "ge" => lhs >= rhs,
      other => panic!("unsupported condition {other}"),
    }
  }

  fn push(&mut self, value: i32) {
    self.regs.esp = self.regs.esp.wrapping_sub(4);
    self.memory.insert(self.regs.esp as u32, value);
  }

  fn pop(&mut self) -> i32 {
    let value = self.load_word(self.regs.esp as u32);
    self.regs.esp = self.regs.esp.wrapping_add(4);
    value
  }

  fn load_word(&self, address: u32) -> i32 {
    self.memory.get(&address).copied().unwrap_or(0)
  }

  fn address(&self, operand: &str) -> u32 {
    let inner = operand
      .strip_prefix('[')
      .and_then(|rest| rest.strip_suffix(']'))
      .unwrap_or_else(|| panic!("bad memory operand {operand}"));
    let ebp = self.regs.ebp as u32;
    if let Some(disp) = inner.strip_prefix("ebp-") {
      ebp.wrapping_sub(disp.parse().unwrap())
    } else if let Some(disp) = inner.strip_prefix("ebp+") {
      ebp.wrapping_add(disp.parse().unwrap())
    } else {
      assert_not_register(inner);
      *self
        .data
        .get(inner)
        .unwrap_or_else(|| panic!("unknown data label {inner}"))
    }
  }

  fn value(&self, operand: &str) -> i32 {
    if let Some(memory) = operand.strip_prefix("DWORD PTR ") {
      return self.load_word(self.address(memory));
    }
    if let Some(label) = operand.strip_prefix("offset ") {
      return self.data[label] as i32;
    }
    match operand {
      "eax" => self.regs.eax,
      "ebx" => self.regs.ebx,
      "ecx" => self.regs.ecx,
      "edx" => self.regs.edx,
      "esp" => self.regs.esp,
      "ebp" => self.regs.ebp,
      "al" => self.regs.eax & 0xff,
      literal => literal
        .parse::<i64>()
        .unwrap_or_else(|_| panic!("bad operand {literal}")) as i32,
    }
  }

  fn store(&mut self, operand: &str, value: i32) {
    if let Some(memory) = operand.strip_prefix("DWORD PTR ") {
      let address = self.address(memory);
      self.memory.insert(address, value);
      return;
    }
    match operand {
      "eax" => self.regs.eax = value,
      "ebx" => self.regs.ebx = value,
      "ecx" => self.regs.ecx = value,
      "edx" => self.regs.edx = value,
      "esp" => self.regs.esp = value,
      "ebp" => self.regs.ebp = value,
      "al" => self.regs.eax = (self.regs.eax & !0xff) | (value & 0xff),
      other => panic!("cannot store to {other}"),
    }
  }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Instruction selectors of the stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum OpCode {
    Lit = 1,
    Opr = 2,
    Lod = 3,
    Sto = 4,
    Inc = 6,
    Jmp = 7,
    Jpc = 8,
    Sio = 9,
}

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Lit => "LIT",
            OpCode::Opr => "OPR",
            OpCode::Lod => "LOD",
            OpCode::Sto => "STO",
            OpCode::Inc => "INC",
            OpCode::Jmp => "JMP",
            OpCode::Jpc => "JPC",
            OpCode::Sio => "SIO",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> u8 {
        opcode as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = CodegenError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(OpCode::Lit),
            2 => Ok(OpCode::Opr),
            3 => Ok(OpCode::Lod),
            4 => Ok(OpCode::Sto),
            6 => Ok(OpCode::Inc),
            7 => Ok(OpCode::Jmp),
            8 => Ok(OpCode::Jpc),
            9 => Ok(OpCode::Sio),
            _ => Err(CodegenError::UnknownOpcode(byte)),
        }
    }
}

/// OPR modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Neg = 1,
    Add = 2,
    Sub = 3,
    Mul = 4,
    Div = 5,
    Odd = 6,
    Eql = 8,
    Neq = 9,
    Lss = 10,
    Leq = 11,
    Gtr = 12,
    Geq = 13,
}

impl Operation {
    pub fn from_modifier(modifier: i32) -> Option<Self> {
        let operation = match modifier {
            1 => Operation::Neg,
            2 => Operation::Add,
            3 => Operation::Sub,
            4 => Operation::Mul,
            5 => Operation::Div,
            6 => Operation::Odd,
            8 => Operation::Eql,
            9 => Operation::Neq,
            10 => Operation::Lss,
            11 => Operation::Leq,
            12 => Operation::Gtr,
            13 => Operation::Geq,
            _ => return None,
        };
        Some(operation)
    }

    fn name(self) -> &'static str {
        match self {
            Operation::Neg => "neg",
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
            Operation::Odd => "odd",
            Operation::Eql => "eql",
            Operation::Neq => "neq",
            Operation::Lss => "lss",
            Operation::Leq => "leq",
            Operation::Gtr => "gtr",
            Operation::Geq => "geq",
        }
    }
}

/// SIO modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysCall {
    Write = 0,
    Read = 1,
    Halt = 2,
}

impl SysCall {
    pub fn from_modifier(modifier: i32) -> Option<Self> {
        match modifier {
            0 => Some(SysCall::Write),
            1 => Some(SysCall::Read),
            2 => Some(SysCall::Halt),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SysCall::Write => "write",
            SysCall::Read => "read",
            SysCall::Halt => "halt",
        }
    }
}

/// One `opcode level modifier` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: OpCode,
    pub level: u16,
    pub modifier: i32,
}

impl Instruction {
    pub fn new(opcode: OpCode, level: u16, modifier: i32) -> Self {
        Self {
            opcode,
            level,
            modifier,
        }
    }

    pub fn literal(value: i32) -> Self {
        Self::new(OpCode::Lit, 0, value)
    }

    pub fn operation(operation: Operation) -> Self {
        Self::new(OpCode::Opr, 0, operation as i32)
    }

    pub fn load(level: u16, offset: i32) -> Self {
        Self::new(OpCode::Lod, level, offset)
    }

    pub fn store(level: u16, offset: i32) -> Self {
        Self::new(OpCode::Sto, level, offset)
    }

    pub fn reserve(size: i32) -> Self {
        Self::new(OpCode::Inc, 0, size)
    }

    pub fn jump(target: i32) -> Self {
        Self::new(OpCode::Jmp, 0, target)
    }

    pub fn jump_if_false(target: i32) -> Self {
        Self::new(OpCode::Jpc, 0, target)
    }

    pub fn system(call: SysCall) -> Self {
        Self::new(OpCode::Sio, 0, call as i32)
    }

    fn annotation(&self) -> Option<&'static str> {
        match self.opcode {
            OpCode::Opr => Operation::from_modifier(self.modifier).map(Operation::name),
            OpCode::Sio => SysCall::from_modifier(self.modifier).map(SysCall::name),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.opcode.mnemonic(), self.level, self.modifier)
    }
}

/// Append-only instruction store with a fixed capacity. Already emitted
/// instructions can only change through `patch`.
#[derive(Debug)]
pub struct CodeBuffer {
    instructions: Vec<Instruction>,
    capacity: usize,
}

impl CodeBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instructions: Vec::new(),
            capacity,
        }
    }

    /// Append an instruction and return its address.
    pub fn emit(&mut self, instruction: Instruction) -> Result<usize, CodegenError> {
        if self.instructions.len() >= self.capacity {
            return Err(CodegenError::Full(self.capacity));
        }
        let address = self.instructions.len();
        tracing::trace!(address, %instruction, "emit");
        self.instructions.push(instruction);
        Ok(address)
    }

    /// Overwrite the modifier of the instruction at `address`.
    pub fn patch(&mut self, address: usize, modifier: i32) -> Result<(), CodegenError> {
        let instruction = self
            .instructions
            .get_mut(address)
            .ok_or(CodegenError::PatchOutOfRange(address))?;
        tracing::trace!(address, from = instruction.modifier, to = modifier, "patch");
        instruction.modifier = modifier;
        Ok(())
    }

    /// Address the next emitted instruction will receive.
    pub fn next_address(&self) -> usize {
        self.instructions.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn finalize(self) -> Program {
        Program {
            instructions: self.instructions,
        }
    }
}

/// A finished, fully patched instruction sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    /// Human readable listing, one numbered instruction per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (address, instruction) in self.instructions.iter().enumerate() {
            let line = format!("{:>4}  {}", address, instruction);
            match instruction.annotation() {
                Some(note) => out.push_str(&format!("{:<20}; {}", line, note)),
                None => out.push_str(&line),
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodegenError {
    #[error("Code buffer is full ({0} instructions)")]
    Full(usize),

    #[error("Cannot patch instruction {0}: no such address")]
    PatchOutOfRange(usize),

    #[error("Unknown opcode {0}")]
    UnknownOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_addresses() {
        let mut code = CodeBuffer::with_capacity(8);
        assert_eq!(code.emit(Instruction::reserve(4)).unwrap(), 0);
        assert_eq!(code.emit(Instruction::literal(5)).unwrap(), 1);
        assert_eq!(code.next_address(), 2);
    }

    #[test]
    fn test_patch_rewrites_modifier_only() {
        let mut code = CodeBuffer::with_capacity(8);
        let at = code.emit(Instruction::jump_if_false(0)).unwrap();
        code.emit(Instruction::literal(1)).unwrap();
        code.patch(at, 2).unwrap();

        let program = code.finalize();
        assert_eq!(program.instructions[0], Instruction::new(OpCode::Jpc, 0, 2));
        assert_eq!(program.instructions[1], Instruction::literal(1));
    }

    #[test]
    fn test_patch_out_of_range() {
        let mut code = CodeBuffer::with_capacity(8);
        assert_eq!(code.patch(3, 1), Err(CodegenError::PatchOutOfRange(3)));
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut code = CodeBuffer::with_capacity(2);
        code.emit(Instruction::literal(1)).unwrap();
        code.emit(Instruction::literal(2)).unwrap();
        assert_eq!(code.emit(Instruction::literal(3)), Err(CodegenError::Full(2)));
        assert_eq!(code.finalize().len(), 2);
    }

    #[test]
    fn test_constructors_use_fixed_encoding() {
        assert_eq!(Instruction::operation(Operation::Neg), Instruction::new(OpCode::Opr, 0, 1));
        assert_eq!(Instruction::operation(Operation::Geq), Instruction::new(OpCode::Opr, 0, 13));
        assert_eq!(Instruction::system(SysCall::Halt), Instruction::new(OpCode::Sio, 0, 2));
        assert_eq!(Instruction::load(0, 4).opcode as u8, 3);
        assert_eq!(Instruction::store(0, 4).opcode as u8, 4);
        assert_eq!(Instruction::reserve(5).opcode as u8, 6);
    }

    #[test]
    fn test_opcode_byte_conversion() {
        assert_eq!(OpCode::try_from(7u8), Ok(OpCode::Jmp));
        assert_eq!(u8::from(OpCode::Sio), 9);
        assert_eq!(OpCode::try_from(5u8), Err(CodegenError::UnknownOpcode(5)));
        assert_eq!(OpCode::try_from(0u8), Err(CodegenError::UnknownOpcode(0)));
    }

    #[test]
    fn test_listing_annotates_operations() {
        let program = Program::new(vec![
            Instruction::reserve(5),
            Instruction::operation(Operation::Add),
            Instruction::system(SysCall::Write),
        ]);
        let listing = program.listing();
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines[0], "   0  INC 0 5");
        assert!(lines[1].starts_with("   1  OPR 0 2"));
        assert!(lines[1].ends_with("; add"));
        assert!(lines[2].ends_with("; write"));
        assert_eq!(lines.len(), 3);
        assert!(listing.ends_with("; write\n"));
    }

    #[test]
    fn test_listing_of_empty_program() {
        assert_eq!(Program::default().listing(), "");
    }

    #[test]
    fn test_program_json_uses_numeric_opcodes() {
        let program = Program::new(vec![Instruction::literal(5)]);
        let json = serde_json::to_string(&program).unwrap();
        assert_eq!(json, r#"{"instructions":[{"opcode":1,"level":0,"modifier":5}]}"#);

        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, program);
    }
}

use std::fmt::{self, Write as _};

use thiserror::Error;

use super::freq;
use super::literals::describe_constant;
use super::opcode::{Opcode, SimpleOp, WIDE_MARKER};
use crate::codeblock::CodeBlock;
use crate::value::Value;

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Position of the opcode byte.
    pub offset: usize,
    pub op: Opcode,
    pub operand: u16,
    /// Encoded in the three-byte form.
    pub wide: bool,
}

impl Instruction {
    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        if self.wide { 3 } else { 1 }
    }

    pub fn simple(&self) -> Option<SimpleOp> {
        match self.op {
            Opcode::Simple => SimpleOp::decode(self.operand, self.wide),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.simple() {
            Some(simple) => f.write_str(simple.name()),
            None if self.op == Opcode::Simple => write!(f, "simple {}", self.operand),
            None => write!(f, "{} {}", self.op, self.operand),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode byte {byte:#04x} at {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },
    #[error("instruction at {offset} is cut short")]
    Truncated { offset: usize },
}

/// Walks a bytecode buffer instruction by instruction.
pub struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let offset = self.pos;
        let byte = self.bytes[offset];
        let op = Opcode::from_u8(byte >> 3).ok_or(DecodeError::UnknownOpcode { offset, byte })?;
        let b = byte & 7;
        if b != WIDE_MARKER {
            self.pos += 1;
            return Ok(Instruction { offset, op, operand: u16::from(b), wide: false });
        }
        let (Some(&hi), Some(&lo)) = (self.bytes.get(offset + 1), self.bytes.get(offset + 2)) else {
            self.pos = self.bytes.len();
            return Err(DecodeError::Truncated { offset });
        };
        self.pos += 3;
        Ok(Instruction { offset, op, operand: u16::from_be_bytes([hi, lo]), wide: true })
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_at_end() {
            return None;
        }
        Some(self.decode())
    }
}

/// Decodes a whole buffer.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    Decoder::new(bytes).collect()
}

// --- Disassembly ---

fn literal_comment(block: &CodeBlock, index: u16) -> Option<String> {
    block
        .literals
        .as_ref()
        .and_then(|lits| lits.get(usize::from(index)))
        .map(|v| match v {
            Value::CodeBlock(_) => format!("<CodeBlock #{}>", index),
            other => other.to_string(),
        })
}

/// Renders one code block as a listing; nested code blocks in the literal
/// pool are listed after it.
pub fn disassemble(block: &CodeBlock) -> Result<String, DecodeError> {
    let mut out = String::new();
    disassemble_into(&mut out, block, "<top>")?;
    Ok(out)
}

fn disassemble_into(out: &mut String, block: &CodeBlock, label: &str) -> Result<(), DecodeError> {
    let name = block.debug.as_ref().and_then(|d| d.name.as_ref()).map(|n| n.to_string());
    let _ = writeln!(
        out,
        "{} {}: {} bytes, numArgs {:#x}{}",
        label,
        name.as_deref().unwrap_or(""),
        block.instructions.len(),
        block.num_args,
        if block.arg_frame.is_some() { ", with arg frame" } else { "" },
    );
    for inst in Decoder::new(&block.instructions) {
        let inst = inst?;
        let comment = match inst.op {
            Opcode::Push | Opcode::FindVar | Opcode::FindAndSetVar => literal_comment(block, inst.operand),
            Opcode::PushConstant => Some(describe_constant(inst.operand).to_string()),
            Opcode::FreqFunc => freq::name_of(inst.operand).map(str::to_string),
            _ => None,
        };
        match comment {
            Some(c) => {
                let _ = writeln!(out, "{:5}  {:<28} ; {}", inst.offset, inst.to_string(), c);
            }
            None => {
                let _ = writeln!(out, "{:5}  {}", inst.offset, inst);
            }
        }
    }
    if let Some(literals) = &block.literals {
        for (i, lit) in literals.iter().enumerate() {
            if let Value::CodeBlock(nested) = lit {
                out.push('\n');
                disassemble_into(out, nested, &format!("{}/#{}", label, i))?;
            }
        }
    }
    Ok(())
}

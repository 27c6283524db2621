use log::trace;
use thiserror::Error;

use super::opcode::{Opcode, SimpleOp, MAX_SHORT_OPERAND, WIDE_MARKER};

/// A reserved three-byte instruction whose operand is filled in later.
///
/// Created by [`CodeBuilder::placeholder`]; resolve it with
/// [`CodeBuilder::patch`] or [`CodeBuilder::patch_here`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Label {
    /// Position of the opcode byte in the buffer.
    pos: usize,
}

impl Label {
    pub fn position(self) -> usize {
        self.pos
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("operand {operand} of `{op}` does not fit in 16 bits")]
    OperandTooLarge { op: Opcode, operand: usize },
}

/// Builds the bytecode of one function.
///
/// Backpatch sites are buffer indices, so growing the buffer never
/// invalidates a [`Label`].
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: Vec<u8>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self { code: Vec::with_capacity(64) }
    }

    /// Current write position; the target of a branch emitted next.
    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.code.shrink_to_fit();
        self.code
    }

    // --- emit helpers ---

    fn check_operand(op: Opcode, operand: usize) -> Result<u16, BuildError> {
        u16::try_from(operand).map_err(|_| BuildError::OperandTooLarge { op, operand })
    }

    fn emit_short(&mut self, op: Opcode, operand: u16) {
        self.code.push(((op as u8) << 3) | operand as u8);
    }

    fn emit_long(&mut self, op: Opcode, operand: u16) {
        self.code.push(((op as u8) << 3) | WIDE_MARKER);
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// Emits `op` in the shortest form that holds `operand`.
    pub fn emit(&mut self, op: Opcode, operand: usize) -> Result<(), BuildError> {
        let operand = Self::check_operand(op, operand)?;
        trace!("{:5}  {} {}", self.code.len(), op, operand);
        if operand <= MAX_SHORT_OPERAND {
            self.emit_short(op, operand);
        } else {
            self.emit_long(op, operand);
        }
        Ok(())
    }

    pub fn emit_simple(&mut self, op: SimpleOp) {
        let (operand, wide) = op.encoding();
        trace!("{:5}  {}", self.code.len(), op.name());
        if wide {
            self.emit_long(Opcode::Simple, operand);
        } else {
            self.emit_short(Opcode::Simple, operand);
        }
    }

    // --- backpatching ---

    /// Reserves a three-byte `op` with a zero operand.
    pub fn placeholder(&mut self, op: Opcode) -> Label {
        let pos = self.code.len();
        trace!("{:5}  {} <pending>", pos, op);
        self.emit_long(op, 0);
        Label { pos }
    }

    /// Overwrites the operand of a reserved instruction.
    pub fn patch(&mut self, label: Label, operand: usize) -> Result<(), BuildError> {
        let op = Opcode::from_u8(self.code[label.pos] >> 3).unwrap_or(Opcode::Simple);
        let operand = Self::check_operand(op, operand)?;
        let [hi, lo] = operand.to_be_bytes();
        self.code[label.pos + 1] = hi;
        self.code[label.pos + 2] = lo;
        Ok(())
    }

    /// Points a reserved branch at the current position.
    pub fn patch_here(&mut self, label: Label) -> Result<(), BuildError> {
        let here = self.position();
        self.patch(label, here)
    }

    /// Emits a branch to an already known `target`.
    pub fn branch_to(&mut self, op: Opcode, target: usize) -> Result<(), BuildError> {
        debug_assert!(op.is_branch());
        self.emit(op, target)
    }
}

//! Opcode set of the stack machine.
//!
//! An instruction byte is `(opcode << 3) | B`. When the operand does not fit
//! in 0..=6 the B field is 7 and a big-endian `u16` operand follows.

use std::fmt;

/// Largest operand that fits in the B field of a one-byte instruction.
pub const MAX_SHORT_OPERAND: u16 = 6;
/// B field value announcing a 16-bit operand.
pub const WIDE_MARKER: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Operand selects a [`SimpleOp`].
    Simple = 0,
    /// Push literal-pool entry `operand`.
    Push = 3,
    /// Push an immediate value reference.
    PushConstant = 4,
    /// Call the global function named on the stack with `operand` args.
    Call = 5,
    /// Call the closure on the stack with `operand` args.
    Invoke = 6,
    Send = 7,
    SendIfDefined = 8,
    Resend = 9,
    ResendIfDefined = 10,
    Branch = 11,
    BranchIfTrue = 12,
    BranchIfFalse = 13,
    /// Look a variable up at run time; operand is the literal index of its name.
    FindVar = 14,
    /// Push local slot `operand`.
    GetVar = 15,
    MakeFrame = 16,
    MakeArray = 17,
    GetPath = 18,
    SetPath = 19,
    SetVar = 20,
    FindAndSetVar = 21,
    IncrVar = 22,
    BranchIfLoopNotDone = 23,
    FreqFunc = 24,
    NewHandlers = 25,
}

impl Opcode {
    pub fn from_u8(op: u8) -> Option<Opcode> {
        use Opcode::*;
        let op = match op {
            0 => Simple,
            3 => Push,
            4 => PushConstant,
            5 => Call,
            6 => Invoke,
            7 => Send,
            8 => SendIfDefined,
            9 => Resend,
            10 => ResendIfDefined,
            11 => Branch,
            12 => BranchIfTrue,
            13 => BranchIfFalse,
            14 => FindVar,
            15 => GetVar,
            16 => MakeFrame,
            17 => MakeArray,
            18 => GetPath,
            19 => SetPath,
            20 => SetVar,
            21 => FindAndSetVar,
            22 => IncrVar,
            23 => BranchIfLoopNotDone,
            24 => FreqFunc,
            25 => NewHandlers,
            _ => return None,
        };
        Some(op)
    }

    /// True for instructions whose operand is an absolute code position.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Branch | Opcode::BranchIfTrue | Opcode::BranchIfFalse | Opcode::BranchIfLoopNotDone
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Simple => "simple",
            Opcode::Push => "push",
            Opcode::PushConstant => "push-constant",
            Opcode::Call => "call",
            Opcode::Invoke => "invoke",
            Opcode::Send => "send",
            Opcode::SendIfDefined => "send-if-defined",
            Opcode::Resend => "resend",
            Opcode::ResendIfDefined => "resend-if-defined",
            Opcode::Branch => "branch",
            Opcode::BranchIfTrue => "branch-if-true",
            Opcode::BranchIfFalse => "branch-if-false",
            Opcode::FindVar => "find-var",
            Opcode::GetVar => "get-var",
            Opcode::MakeFrame => "make-frame",
            Opcode::MakeArray => "make-array",
            Opcode::GetPath => "get-path",
            Opcode::SetPath => "set-path",
            Opcode::SetVar => "set-var",
            Opcode::FindAndSetVar => "find-and-set-var",
            Opcode::IncrVar => "incr-var",
            Opcode::BranchIfLoopNotDone => "branch-if-loop-not-done",
            Opcode::FreqFunc => "freq-func",
            Opcode::NewHandlers => "new-handlers",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand-less instructions encoded under [`Opcode::Simple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleOp {
    Pop,
    Dup,
    Return,
    PushSelf,
    SetLexScope,
    IterNext,
    IterDone,
    /// Always encoded in the three-byte form with operand 1.
    PopHandlers,
}

impl SimpleOp {
    /// Returns the operand value and whether it must use the wide form.
    pub fn encoding(self) -> (u16, bool) {
        match self {
            SimpleOp::Pop => (0, false),
            SimpleOp::Dup => (1, false),
            SimpleOp::Return => (2, false),
            SimpleOp::PushSelf => (3, false),
            SimpleOp::SetLexScope => (4, false),
            SimpleOp::IterNext => (5, false),
            SimpleOp::IterDone => (6, false),
            SimpleOp::PopHandlers => (1, true),
        }
    }

    pub fn decode(operand: u16, wide: bool) -> Option<SimpleOp> {
        let op = match (operand, wide) {
            (0, false) => SimpleOp::Pop,
            (1, false) => SimpleOp::Dup,
            (2, false) => SimpleOp::Return,
            (3, false) => SimpleOp::PushSelf,
            (4, false) => SimpleOp::SetLexScope,
            (5, false) => SimpleOp::IterNext,
            (6, false) => SimpleOp::IterDone,
            (1, true) => SimpleOp::PopHandlers,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            SimpleOp::Pop => "pop",
            SimpleOp::Dup => "dup",
            SimpleOp::Return => "return",
            SimpleOp::PushSelf => "push-self",
            SimpleOp::SetLexScope => "set-lex-scope",
            SimpleOp::IterNext => "iter-next",
            SimpleOp::IterDone => "iter-done",
            SimpleOp::PopHandlers => "pop-handlers",
        }
    }
}

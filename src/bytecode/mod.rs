//! src/bytecode/mod.rs
//!
//! 字节码层：指令编码、回填、字面量池、常用函数表与反汇编。

pub mod builder;
pub mod decoder;
pub mod freq;
pub mod literals;
pub mod opcode;


pub use builder::{BuildError, CodeBuilder, Label};
pub use decoder::{decode_all, disassemble, DecodeError, Decoder, Instruction};
pub use literals::{constant_ref, LiteralPool};
pub use opcode::{Opcode, SimpleOp};

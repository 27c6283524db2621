//! src/codeblock.rs
//!
//! The finished artifact handed to an interpreter.

use crate::config::CompatMode;
use crate::value::{Symbol, Value};

/// Names kept for debuggers when `debug_names` is on.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfo {
    pub name: Option<Symbol>,
    pub args: Vec<Symbol>,
    pub locals: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub instructions: Vec<u8>,
    /// `None` when the function uses no literals.
    pub literals: Option<Vec<Value>>,
    /// Argument count in Newton 2.0 layout, `(locals << 16) | args` in native layout.
    pub num_args: u32,
    /// Call-frame template: `_nextArgFrame, _parent, _implementor`, then
    /// arguments and locals.
    pub arg_frame: Option<Value>,
    pub debug: Option<DebugInfo>,
    pub compat: CompatMode,
}

impl CodeBlock {
    pub fn arg_count(&self) -> u32 {
        match self.compat {
            CompatMode::Newton20 => self.num_args,
            CompatMode::Native => self.num_args & 0xFFFF,
        }
    }

    pub fn literal(&self, index: usize) -> Option<&Value> {
        self.literals.as_ref().and_then(|l| l.get(index))
    }

    /// Every code block reachable through the literal pool, depth first.
    pub fn nested(&self) -> Vec<&CodeBlock> {
        let mut out = Vec::new();
        for lit in self.literals.iter().flatten() {
            if let Value::CodeBlock(block) = lit {
                out.push(block.as_ref());
                out.extend(block.nested());
            }
        }
        out
    }
}

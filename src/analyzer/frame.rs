use super::scope::Scope;
use crate::config::CompatMode;

/// Slots every call-frame template starts with.
pub const FRAME_HEADER: [&str; 3] = ["_nextArgFrame", "_parent", "_implementor"];

// 栈帧布局
// Decided once per function after pass 2, consumed by pass 3 and finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// The function carries a call-frame template.
    pub has_frame: bool,
    /// Index of the first variable in get-var/set-var operands.
    pub base: usize,
    pub num_args: u32,
}

impl FrameLayout {
    pub fn compute(scope: &Scope, compat: CompatMode) -> Self {
        let args = scope.args.len() as u32;
        let locals = scope.locals.len() as u32;
        let (has_frame, num_args) = match compat {
            CompatMode::Newton20 => (true, args),
            CompatMode::Native => (
                scope.uses_self || scope.has_closed_over || scope.captures_outer,
                (locals << 16) | args,
            ),
        };
        let base = if has_frame { FRAME_HEADER.len() } else { 0 };
        FrameLayout { has_frame, base, num_args }
    }

    /// Operand of get-var/set-var for variable `slot`.
    pub fn var_index(&self, slot: usize) -> usize {
        self.base + slot
    }
}

// In src/codegen/utils.rs
//
// Emission helpers shared by every node kind.

use crate::analyzer::Resolved;
use crate::bytecode::literals::int_ref;
use crate::bytecode::{constant_ref, BuildError, Label, Opcode, SimpleOp};
use crate::diagnostics::codes::*;
use crate::diagnostics::{CompileError, Diagnostic, Label as DiagLabel};
use crate::parser::ast::{BinaryOp, Expr, Node};
use crate::utils::Span;
use crate::value::{Symbol, Value};

use super::{CodegenCtx, Emit};

/// Handler addresses travel as immediate integers.
const MAX_HANDLER_ADDRESS: i32 = 8191;

impl<'a> CodegenCtx<'a> {
    // --- 错误 ---

    pub(super) fn error(&self, code: &'static ErrorCode, span: Span, message: impl Into<String>) -> CompileError {
        CompileError::new(code, self.file, span).with_message(message)
    }

    fn too_large(&self, e: BuildError) -> CompileError {
        self.error(&E4005_CODE_TOO_LARGE, self.func.span, format!("Function is too large: {}", e))
    }

    pub(super) fn warn(&mut self, code: &'static ErrorCode, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(code, DiagLabel::new(span, code.message)).with_dynamic_message(message);
        self.diagnostics.report(diagnostic);
    }

    // --- 指令 ---

    pub(super) fn op(&mut self, op: Opcode, operand: usize) -> Result<(), CompileError> {
        self.func.code.emit(op, operand).map_err(|e| self.too_large(e))
    }

    pub(super) fn simple(&mut self, op: SimpleOp) {
        self.func.code.emit_simple(op);
    }

    pub(super) fn here(&self) -> usize {
        self.func.code.position()
    }

    pub(super) fn placeholder(&mut self, op: Opcode) -> Label {
        self.func.code.placeholder(op)
    }

    pub(super) fn patch(&mut self, label: Label, operand: usize) -> Result<(), CompileError> {
        self.func.code.patch(label, operand).map_err(|e| self.too_large(e))
    }

    pub(super) fn patch_here(&mut self, label: Label) -> Result<(), CompileError> {
        let here = self.here();
        self.patch(label, here)
    }

    pub(super) fn branch_to(&mut self, op: Opcode, target: usize) -> Result<(), CompileError> {
        self.func.code.branch_to(op, target).map_err(|e| self.too_large(e))
    }

    /// Patches a handler-address placeholder with the current position as an
    /// immediate integer.
    pub(super) fn patch_address_here(&mut self, label: Label) -> Result<(), CompileError> {
        let here = self.here();
        match i32::try_from(here) {
            Ok(pc) if pc <= MAX_HANDLER_ADDRESS => self.patch(label, usize::from(int_ref(pc))),
            _ => Err(self.error(
                &E4005_CODE_TOO_LARGE,
                self.func.span,
                format!("Exception handler at {} is out of reach", here),
            )),
        }
    }

    // --- 字面量与常量 ---

    pub(super) fn literal_index(&mut self, value: Value) -> usize {
        self.func.literals.add(value)
    }

    pub(super) fn push_literal(&mut self, value: Value) -> Result<(), CompileError> {
        let index = self.literal_index(value);
        self.op(Opcode::Push, index)
    }

    /// Pushes `value`, as an immediate when it has one.
    pub(super) fn push_value(&mut self, value: Value) -> Result<(), CompileError> {
        match constant_ref(&value) {
            Some(r) => self.op(Opcode::PushConstant, usize::from(r)),
            None => self.push_literal(value),
        }
    }

    pub(super) fn push_nil(&mut self) -> Result<(), CompileError> {
        self.push_value(Value::Nil)
    }

    pub(super) fn push_int(&mut self, n: i32) -> Result<(), CompileError> {
        self.push_value(Value::Int(n))
    }

    pub(super) fn push_sym(&mut self, name: &Symbol) -> Result<(), CompileError> {
        self.push_literal(Value::Symbol(name.clone()))
    }

    pub(super) fn push_symbol(&mut self, name: &str) -> Result<(), CompileError> {
        let sym = self.store.intern(name);
        self.push_literal(Value::Symbol(sym))
    }

    pub(super) fn freq(&mut self, index: u16) -> Result<(), CompileError> {
        self.op(Opcode::FreqFunc, usize::from(index))
    }

    /// `push 'name; call argc` with the arguments already on the stack.
    pub(super) fn call_global(&mut self, name: &str, argc: usize) -> Result<(), CompileError> {
        self.push_symbol(name)?;
        self.op(Opcode::Call, argc)
    }

    // --- 变量 ---

    /// Resolves a name in the current function. Global constants only apply
    /// to names no enclosing function declares.
    pub(super) fn resolve(&self, name: &Symbol) -> Resolved {
        match self.unit.resolve(self.func.scope, name) {
            Resolved::Environment => match self.store.global_constant(name) {
                Some(v) => Resolved::Constant(v),
                None => Resolved::Environment,
            },
            found => found,
        }
    }

    /// Slot of a variable the declaration pass put in this function.
    pub(super) fn local_slot(&self, name: &Symbol, span: Span) -> Result<usize, CompileError> {
        self.unit
            .scope(self.func.scope)
            .slot_of(name)
            .ok_or_else(|| self.error(&E4001_BAD_PATH, span, format!("`{}` is not a local variable", name)))
    }

    pub(super) fn get_var(&mut self, slot: usize) -> Result<(), CompileError> {
        let index = self.func.layout.var_index(slot);
        self.op(Opcode::GetVar, index)
    }

    pub(super) fn set_var(&mut self, slot: usize) -> Result<(), CompileError> {
        let index = self.func.layout.var_index(slot);
        self.op(Opcode::SetVar, index)
    }

    pub(super) fn incr_var(&mut self, slot: usize) -> Result<(), CompileError> {
        let index = self.func.layout.var_index(slot);
        self.op(Opcode::IncrVar, index)
    }

    // --- 子节点 ---

    /// Emits `node` for its value.
    pub(super) fn emit_value(&mut self, node: &Node) -> Result<(), CompileError> {
        let pushed = node.emit(self, false)?;
        debug_assert!(pushed, "value requested but nothing was pushed");
        Ok(())
    }

    /// Emits `node` in statement position and drops whatever it leaves.
    pub(super) fn emit_discard(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            Expr::Binary { op: BinaryOp::Equal, .. } => self.warn(
                &W5003_STANDALONE_EQUALS,
                node.span,
                "Stand-alone `=` compares and throws the result away; did you mean `:=`?",
            ),
            Expr::Literal(_) | Expr::Name(_) | Expr::SelfRef | Expr::Func(_) => {}
            _ if node.is_pure() => self.warn(&W5002_UNUSED_VALUE, node.span, "The value of this expression is never used"),
            _ => {}
        }
        if node.emit(self, true)? {
            self.simple(SimpleOp::Pop);
        }
        Ok(())
    }
}

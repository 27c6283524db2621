// In src/codegen/lvalue.rs
//
// Slot paths and assignment targets.

use crate::analyzer::Resolved;
use crate::bytecode::freq::FREQ_SET_AREF;
use crate::bytecode::{Opcode, SimpleOp};
use crate::diagnostics::codes::{E4001_BAD_PATH, E4002_ASSIGN_TO_CONSTANT};
use crate::diagnostics::CompileError;
use crate::parser::ast::{Expr, Node, PathKey};
use crate::utils::Span;
use crate::value::{Symbol, Value};

use super::CodegenCtx;

/// Pushes the object and key of a path node. A chain of plain slot names
/// (`a.b.c`) collapses into a single `pathExpr` array key over `a`.
pub(super) fn emit_path_target(ctx: &mut CodegenCtx<'_>, node: &Node) -> Result<(), CompileError> {
    let Expr::Path { object, key } = &node.kind else {
        return Err(ctx.error(&E4001_BAD_PATH, node.span, "Expected a slot path"));
    };
    match key {
        PathKey::Expr(key) => {
            ctx.emit_value(object)?;
            ctx.emit_value(key)
        }
        PathKey::Slot(slot) => {
            let mut slots = vec![slot.clone()];
            let mut base: &Node = object;
            while let Expr::Path { object: inner, key: PathKey::Slot(slot) } = &base.kind {
                slots.push(slot.clone());
                base = &**inner;
            }
            slots.reverse();

            ctx.emit_value(base)?;
            if let [single] = slots.as_slice() {
                return ctx.push_sym(single);
            }
            let class = ctx.store.intern("pathExpr");
            let elements = slots.into_iter().map(Value::Symbol).collect();
            let path = ctx.store.make_array(class, elements);
            ctx.push_literal(path)
        }
    }
}

/// `obj.slot` as a value. With `fail_on_nil` off a missing intermediate
/// slot yields `nil` instead of an exception.
pub(super) fn emit_path_get(ctx: &mut CodegenCtx<'_>, node: &Node, fail_on_nil: bool) -> Result<(), CompileError> {
    emit_path_target(ctx, node)?;
    ctx.op(Opcode::GetPath, usize::from(fail_on_nil))
}

/// Stores the value on top of the stack into a named variable. With `keep`
/// a copy stays on the stack.
pub(super) fn store_name(ctx: &mut CodegenCtx<'_>, name: &Symbol, keep: bool, span: Span) -> Result<(), CompileError> {
    match ctx.resolve(name) {
        Resolved::Constant(_) => Err(assign_to_constant(ctx, name, span)),
        Resolved::Slot(slot) => {
            if keep {
                ctx.simple(SimpleOp::Dup);
            }
            ctx.set_var(slot)
        }
        Resolved::Outer | Resolved::Environment => {
            if keep {
                ctx.simple(SimpleOp::Dup);
            }
            let index = ctx.literal_index(Value::Symbol(name.clone()));
            ctx.op(Opcode::FindAndSetVar, index)
        }
    }
}

fn assign_to_constant(ctx: &CodegenCtx<'_>, name: &Symbol, span: Span) -> CompileError {
    ctx.error(&E4002_ASSIGN_TO_CONSTANT, span, format!("Cannot assign to the constant `{}`", name))
        .with_value(Value::Symbol(name.clone()))
}

/// `target := value`
pub(super) fn emit_assign(ctx: &mut CodegenCtx<'_>, target: &Node, value: &Node, discard: bool) -> Result<bool, CompileError> {
    match &target.kind {
        Expr::Name(name) => {
            if let Resolved::Constant(_) = ctx.resolve(name) {
                return Err(assign_to_constant(ctx, name, target.span));
            }
            ctx.emit_value(value)?;
            store_name(ctx, name, !discard, target.span)?;
            Ok(!discard)
        }
        Expr::Path { .. } => {
            emit_path_target(ctx, target)?;
            ctx.emit_value(value)?;
            ctx.op(Opcode::SetPath, usize::from(!discard))?;
            Ok(!discard)
        }
        Expr::Index { object, index } => {
            ctx.emit_value(object)?;
            ctx.emit_value(index)?;
            ctx.emit_value(value)?;
            ctx.freq(FREQ_SET_AREF)?;
            Ok(true)
        }
        _ => Err(ctx.error(&E4001_BAD_PATH, target.span, "Only variables, slot paths and elements can be assigned")),
    }
}

// In src/codegen/statement.rs

use crate::bytecode::{Opcode, SimpleOp};
use crate::diagnostics::CompileError;
use crate::parser::ast::{Binding, Handler, Node};
use crate::value::Symbol;

use super::{lvalue, CodegenCtx, Emit};

// --- 1. 语句块 ---

/// Every item but the last is emitted for effect; the last one gives the
/// block its value.
pub(super) fn emit_begin(ctx: &mut CodegenCtx<'_>, items: &[Node], discard: bool) -> Result<bool, CompileError> {
    let Some((last, init)) = items.split_last() else {
        if discard {
            return Ok(false);
        }
        ctx.push_nil()?;
        return Ok(true);
    };
    for item in init {
        ctx.emit_discard(item)?;
    }
    last.emit(ctx, discard)
}

// --- 2. if ---

pub(super) fn emit_if(
    ctx: &mut CodegenCtx<'_>,
    cond: &Node,
    then_branch: &Node,
    else_branch: Option<&Node>,
    discard: bool,
) -> Result<bool, CompileError> {
    ctx.emit_value(cond)?;
    let to_else = ctx.placeholder(Opcode::BranchIfFalse);

    match else_branch {
        Some(else_branch) => {
            emit_arm(ctx, then_branch, discard)?;
            let to_end = ctx.placeholder(Opcode::Branch);
            ctx.patch_here(to_else)?;
            emit_arm(ctx, else_branch, discard)?;
            ctx.patch_here(to_end)?;
        }
        None if discard => {
            emit_arm(ctx, then_branch, true)?;
            ctx.patch_here(to_else)?;
        }
        None => {
            ctx.emit_value(then_branch)?;
            let to_end = ctx.placeholder(Opcode::Branch);
            ctx.patch_here(to_else)?;
            ctx.push_nil()?;
            ctx.patch_here(to_end)?;
        }
    }
    Ok(!discard)
}

/// Emits one arm of a conditional so every arm leaves the same stack depth.
fn emit_arm(ctx: &mut CodegenCtx<'_>, arm: &Node, discard: bool) -> Result<(), CompileError> {
    if discard {
        ctx.emit_discard(arm)
    } else {
        ctx.emit_value(arm)
    }
}

// --- 3. 声明 ---

/// `local a := 1, b`: only bindings with an initializer generate code. The
/// statement's value is the last initializer, or nil.
pub(super) fn emit_local(ctx: &mut CodegenCtx<'_>, bindings: &[Binding], discard: bool) -> Result<bool, CompileError> {
    let last_init = bindings.iter().rposition(|b| b.value.is_some());
    for (i, binding) in bindings.iter().enumerate() {
        let Some(value) = &binding.value else { continue };
        ctx.emit_value(value)?;
        let keep = !discard && Some(i) == last_init;
        lvalue::store_name(ctx, &binding.name, keep, binding.span)?;
    }
    if !discard && last_init.is_none() {
        ctx.push_nil()?;
    }
    Ok(!discard)
}

/// Constants are folded away by pass 1; only the statement value remains.
pub(super) fn emit_constant(ctx: &mut CodegenCtx<'_>, discard: bool) -> Result<bool, CompileError> {
    if discard {
        return Ok(false);
    }
    ctx.push_nil()?;
    Ok(true)
}

/// `global name := value` calls `DefGlobalVar(name, value)`.
pub(super) fn emit_global(ctx: &mut CodegenCtx<'_>, name: &Symbol, value: Option<&Node>) -> Result<bool, CompileError> {
    ctx.push_sym(name)?;
    match value {
        Some(value) => ctx.emit_value(value)?,
        None => ctx.push_nil()?,
    }
    ctx.call_global("DefGlobalVar", 2)?;
    Ok(true)
}

/// `global name(args) body` calls `DefGlobalFn(name, codeblock)`.
pub(super) fn emit_global_func(ctx: &mut CodegenCtx<'_>, name: &Symbol, func: &Node) -> Result<bool, CompileError> {
    ctx.push_sym(name)?;
    ctx.emit_value(func)?;
    ctx.call_global("DefGlobalFn", 2)?;
    Ok(true)
}

// --- 4. return ---

pub(super) fn emit_return(ctx: &mut CodegenCtx<'_>, value: Option<&Node>, discard: bool) -> Result<bool, CompileError> {
    match value {
        Some(value) => ctx.emit_value(value)?,
        None => ctx.push_nil()?,
    }
    ctx.simple(SimpleOp::Return);
    Ok(!discard)
}

// --- 5. try / onexception ---

/// Layout:
///
/// ```text
///     push 'sym1; push-constant <handler1>   ; one pair per handler
///     new-handlers N
///     <body>
///     pop-handlers
///     branch CONT
/// H1: <handler1>; branch END
/// Hn: <handlerN>
/// END: pop-handlers
/// CONT:
/// ```
pub(super) fn emit_try(ctx: &mut CodegenCtx<'_>, body: &Node, handlers: &[Handler], discard: bool) -> Result<bool, CompileError> {
    let mut addresses = Vec::with_capacity(handlers.len());
    for handler in handlers {
        ctx.push_sym(&handler.exception)?;
        addresses.push(ctx.placeholder(Opcode::PushConstant));
    }
    ctx.op(Opcode::NewHandlers, handlers.len())?;

    emit_arm(ctx, body, discard)?;
    ctx.simple(SimpleOp::PopHandlers);
    let to_cont = ctx.placeholder(Opcode::Branch);

    let mut to_end = Vec::new();
    for (i, (handler, address)) in handlers.iter().zip(addresses).enumerate() {
        ctx.patch_address_here(address)?;
        emit_arm(ctx, &handler.body, discard)?;
        if i + 1 < handlers.len() {
            to_end.push(ctx.placeholder(Opcode::Branch));
        }
    }
    for label in to_end {
        ctx.patch_here(label)?;
    }
    ctx.simple(SimpleOp::PopHandlers);
    ctx.patch_here(to_cont)?;
    Ok(!discard)
}

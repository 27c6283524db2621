// In src/codegen/loops.rs
//
// Loops leave one value at their exit: nil on normal termination, or the
// value of the `break` that left them.

use crate::analyzer::{foreach_iter_name, synthetic_name};
use crate::bytecode::freq::{FREQ_ADD, FREQ_AREF, FREQ_LENGTH, FREQ_NEW_ITERATOR, FREQ_SET_AREF};
use crate::bytecode::{Opcode, SimpleOp};
use crate::diagnostics::codes::E4003_BREAK_OUTSIDE_LOOP;
use crate::diagnostics::CompileError;
use crate::parser::ast::Node;
use crate::utils::Span;
use crate::value::{Symbol, Value};

use super::{CodegenCtx, LoopState};

/// Size hint `make-array` gets for the result of `collect`.
const GROWABLE_ARRAY: usize = 0xFFFF;

// --- 循环栈 ---

fn open_loop(ctx: &mut CodegenCtx<'_>) {
    ctx.func.loops.push(LoopState::default());
}

/// Ends the innermost loop: every `break` in it jumps to the current position.
fn patch_breaks(ctx: &mut CodegenCtx<'_>) -> Result<(), CompileError> {
    let state = ctx.func.loops.pop().unwrap_or_default();
    state.breaks.into_iter().try_for_each(|site| ctx.patch_here(site))
}

fn loop_value(ctx: &mut CodegenCtx<'_>, discard: bool) -> Result<bool, CompileError> {
    if discard {
        ctx.simple(SimpleOp::Pop);
        return Ok(false);
    }
    Ok(true)
}

fn close_loop(ctx: &mut CodegenCtx<'_>, discard: bool) -> Result<bool, CompileError> {
    patch_breaks(ctx)?;
    loop_value(ctx, discard)
}

pub(super) fn emit_break(ctx: &mut CodegenCtx<'_>, value: Option<&Node>, span: Span, discard: bool) -> Result<bool, CompileError> {
    if ctx.func.loops.is_empty() {
        return Err(ctx.error(&E4003_BREAK_OUTSIDE_LOOP, span, "`break` outside of a loop"));
    }
    match value {
        Some(value) => ctx.emit_value(value)?,
        None => ctx.push_nil()?,
    }
    let site = ctx.placeholder(Opcode::Branch);
    if let Some(innermost) = ctx.func.loops.last_mut() {
        innermost.breaks.push(site);
    }
    Ok(!discard)
}

// --- loop / while / repeat ---

pub(super) fn emit_loop(ctx: &mut CodegenCtx<'_>, body: &Node, discard: bool) -> Result<bool, CompileError> {
    open_loop(ctx);
    let top = ctx.here();
    ctx.emit_discard(body)?;
    ctx.branch_to(Opcode::Branch, top)?;
    close_loop(ctx, discard)
}

pub(super) fn emit_while(ctx: &mut CodegenCtx<'_>, cond: &Node, body: &Node, discard: bool) -> Result<bool, CompileError> {
    open_loop(ctx);
    let top = ctx.here();
    ctx.emit_value(cond)?;
    let exit = ctx.placeholder(Opcode::BranchIfFalse);
    ctx.emit_discard(body)?;
    ctx.branch_to(Opcode::Branch, top)?;
    ctx.patch_here(exit)?;
    ctx.push_nil()?;
    close_loop(ctx, discard)
}

pub(super) fn emit_repeat(ctx: &mut CodegenCtx<'_>, body: &Node, cond: &Node, discard: bool) -> Result<bool, CompileError> {
    open_loop(ctx);
    let top = ctx.here();
    ctx.emit_discard(body)?;
    ctx.emit_value(cond)?;
    ctx.branch_to(Opcode::BranchIfFalse, top)?;
    ctx.push_nil()?;
    close_loop(ctx, discard)
}

// --- for ---

/// Operands of a `for` node.
pub(super) struct ForLoop<'n> {
    pub var: &'n Symbol,
    pub start: &'n Node,
    pub limit: &'n Node,
    pub step: Option<&'n Node>,
    pub body: &'n Node,
}

/// ```text
///     <start>; set-var i; <limit>; set-var i|limit; <step>; set-var i|incr
///     get-var i|incr; get-var i; branch TEST
/// TOP: <body>
///     get-var i|incr; incr-var i
/// TEST: get-var i|limit; branch-if-loop-not-done TOP
///     push nil
/// ```
pub(super) fn emit_for(ctx: &mut CodegenCtx<'_>, span: Span, parts: ForLoop<'_>, discard: bool) -> Result<bool, CompileError> {
    let ForLoop { var, start, limit, step, body } = parts;
    let index = ctx.local_slot(var, span)?;
    let limit_name = synthetic_name(ctx.store, &[var], "limit");
    let incr_name = synthetic_name(ctx.store, &[var], "incr");
    let limit_slot = ctx.local_slot(&limit_name, span)?;
    let incr_slot = ctx.local_slot(&incr_name, span)?;

    ctx.emit_value(start)?;
    ctx.set_var(index)?;
    ctx.emit_value(limit)?;
    ctx.set_var(limit_slot)?;
    match step {
        Some(step) => ctx.emit_value(step)?,
        None => ctx.push_int(1)?,
    }
    ctx.set_var(incr_slot)?;

    open_loop(ctx);
    ctx.get_var(incr_slot)?;
    ctx.get_var(index)?;
    let to_test = ctx.placeholder(Opcode::Branch);

    let top = ctx.here();
    ctx.emit_discard(body)?;
    ctx.get_var(incr_slot)?;
    ctx.incr_var(index)?;

    ctx.patch_here(to_test)?;
    ctx.get_var(limit_slot)?;
    ctx.branch_to(Opcode::BranchIfLoopNotDone, top)?;
    ctx.push_nil()?;
    close_loop(ctx, discard)
}

// --- foreach ---

/// Operands of a `foreach` node.
pub(super) struct ForeachLoop<'n> {
    pub key: Option<&'n Symbol>,
    pub value: &'n Symbol,
    pub deeply: bool,
    pub collection: &'n Node,
    pub collect: bool,
    pub body: &'n Node,
}

/// Locals of a `collect` loop.
#[derive(Clone, Copy)]
struct CollectSlots {
    index: usize,
    result: usize,
    /// Holds the body's value so nothing sits below it while the body runs.
    item: usize,
}

/// ```text
///     <coll>
///     [collect: dup; Length; push 'array; make-array; set-var v|result; push 0; set-var v|index]
///     push deeply; newIterator; set-var iter; branch TEST
/// TOP: get-var iter; push 1; aref; set-var v
///     [key: get-var iter; push 0; aref; set-var k]
///     <body>          (collect: set-var v|item; v|result[v|index++] := v|item)
///     get-var iter; iter-next
/// TEST: get-var iter; iter-done; branch-if-false TOP
///     push nil        (collect: get-var v|result)
/// EXIT: push nil; set-var iter
/// ```
pub(super) fn emit_foreach(ctx: &mut CodegenCtx<'_>, span: Span, parts: ForeachLoop<'_>, discard: bool) -> Result<bool, CompileError> {
    let ForeachLoop { key, value, deeply, collection, collect, body } = parts;
    let value_slot = ctx.local_slot(value, span)?;
    let key_slot = match key {
        Some(key) => Some(ctx.local_slot(key, span)?),
        None => None,
    };
    let iter_name = foreach_iter_name(ctx.store, value, key);
    let iter_slot = ctx.local_slot(&iter_name, span)?;
    let collect_slots = if collect {
        let index_name = synthetic_name(ctx.store, &[value], "index");
        let result_name = synthetic_name(ctx.store, &[value], "result");
        let item_name = synthetic_name(ctx.store, &[value], "item");
        Some(CollectSlots {
            index: ctx.local_slot(&index_name, span)?,
            result: ctx.local_slot(&result_name, span)?,
            item: ctx.local_slot(&item_name, span)?,
        })
    } else {
        None
    };

    ctx.emit_value(collection)?;
    if let Some(slots) = collect_slots {
        ctx.simple(SimpleOp::Dup);
        ctx.freq(FREQ_LENGTH)?;
        ctx.push_symbol("array")?;
        ctx.op(Opcode::MakeArray, GROWABLE_ARRAY)?;
        ctx.set_var(slots.result)?;
        ctx.push_int(0)?;
        ctx.set_var(slots.index)?;
    }
    ctx.push_value(if deeply { Value::True } else { Value::Nil })?;
    ctx.freq(FREQ_NEW_ITERATOR)?;
    ctx.set_var(iter_slot)?;

    open_loop(ctx);
    let to_test = ctx.placeholder(Opcode::Branch);

    let top = ctx.here();
    ctx.get_var(iter_slot)?;
    ctx.push_int(1)?;
    ctx.freq(FREQ_AREF)?;
    ctx.set_var(value_slot)?;
    if let Some(key_slot) = key_slot {
        ctx.get_var(iter_slot)?;
        ctx.push_int(0)?;
        ctx.freq(FREQ_AREF)?;
        ctx.set_var(key_slot)?;
    }

    match collect_slots {
        Some(slots) => {
            // a `break` in the body must find the stack as it was at TOP
            ctx.emit_value(body)?;
            ctx.set_var(slots.item)?;
            ctx.get_var(slots.result)?;
            ctx.get_var(slots.index)?;
            ctx.get_var(slots.item)?;
            ctx.freq(FREQ_SET_AREF)?;
            ctx.simple(SimpleOp::Pop);
            ctx.get_var(slots.index)?;
            ctx.push_int(1)?;
            ctx.freq(FREQ_ADD)?;
            ctx.set_var(slots.index)?;
        }
        None => ctx.emit_discard(body)?,
    }
    ctx.get_var(iter_slot)?;
    ctx.simple(SimpleOp::IterNext);

    ctx.patch_here(to_test)?;
    ctx.get_var(iter_slot)?;
    ctx.simple(SimpleOp::IterDone);
    ctx.branch_to(Opcode::BranchIfFalse, top)?;
    match collect_slots {
        Some(slots) => ctx.get_var(slots.result)?,
        None => ctx.push_nil()?,
    }

    // The iterator is released on every way out, breaks included.
    patch_breaks(ctx)?;
    ctx.push_nil()?;
    ctx.set_var(iter_slot)?;
    loop_value(ctx, discard)
}

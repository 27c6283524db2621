// In src/codegen/function.rs
//
// Function literals: compile the body with its own state, then seal the
// result into a code block.

use std::mem;
use std::rc::Rc;

use log::debug;

use crate::analyzer::frame::FRAME_HEADER;
use crate::analyzer::{FrameLayout, ScopeId};
use crate::bytecode::SimpleOp;
use crate::codeblock::{CodeBlock, DebugInfo};
use crate::diagnostics::codes::{E4005_CODE_TOO_LARGE, E4006_UNDECLARED_FUNCTION};
use crate::diagnostics::CompileError;
use crate::parser::ast::{FuncLit, Node};
use crate::utils::Span;
use crate::value::{FrameObject, Symbol, Value};

use super::{CodegenCtx, FunctionState};

/// Largest instruction stream a code block can hold.
const MAX_CODE_SIZE: usize = 0xFFFF;

/// Compiles `body` as the whole of function `scope_id`.
pub(super) fn compile_function(ctx: &mut CodegenCtx<'_>, scope_id: ScopeId, body: &Node) -> Result<CodeBlock, CompileError> {
    let unit = ctx.unit;
    let scope = unit.scope(scope_id);
    let layout = FrameLayout::compute(scope, ctx.options.compat);
    let state = FunctionState::new(scope_id, scope.span, layout);

    let outer = mem::replace(&mut ctx.func, state);
    let result = emit_body(ctx, body);
    let state = mem::replace(&mut ctx.func, outer);
    result?;

    finish(ctx, state)
}

fn emit_body(ctx: &mut CodegenCtx<'_>, body: &Node) -> Result<(), CompileError> {
    ctx.emit_value(body)?;
    ctx.simple(SimpleOp::Return);
    Ok(())
}

fn finish(ctx: &mut CodegenCtx<'_>, state: FunctionState) -> Result<CodeBlock, CompileError> {
    let unit = ctx.unit;
    let scope = unit.scope(state.scope);
    let instructions = state.code.into_bytes();
    if instructions.len() > MAX_CODE_SIZE {
        return Err(CompileError::new(&E4005_CODE_TOO_LARGE, ctx.file, state.span)
            .with_message(format!("Function body is {} bytes long", instructions.len())));
    }

    let arg_frame = if state.layout.has_frame {
        let mut slots: Vec<Symbol> = FRAME_HEADER.iter().map(|name| ctx.store.intern(name)).collect();
        slots.extend(scope.variables().cloned());
        let values = vec![Value::Nil; slots.len()];
        let map = ctx.store.shared_map(&slots);
        Some(Value::Frame(Rc::new(FrameObject { map, values })))
    } else {
        None
    };

    let debug = ctx.options.debug_names.then(|| DebugInfo {
        name: scope.name.clone(),
        args: scope.args.clone(),
        locals: scope.locals.clone(),
    });

    let literals = state.literals.finish();
    debug!(
        "sealed function {:?}: {} bytes, {} literal(s), frame: {}",
        scope.name.as_ref().map(Symbol::as_str).unwrap_or("<anonymous>"),
        instructions.len(),
        literals.as_ref().map_or(0, Vec::len),
        state.layout.has_frame
    );

    Ok(CodeBlock {
        instructions,
        literals,
        num_args: state.layout.num_args,
        arg_frame,
        debug,
        compat: ctx.options.compat,
    })
}

/// `func (...) ...` in expression position.
pub(super) fn emit_func_literal(
    ctx: &mut CodegenCtx<'_>,
    func: &FuncLit,
    span: Span,
    discard: bool,
) -> Result<bool, CompileError> {
    let Some(scope_id) = ctx.unit.scope_for(func.id) else {
        return Err(CompileError::new(&E4006_UNDECLARED_FUNCTION, ctx.file, span)
            .with_message("Function literal has no scope; was it declared?"));
    };
    let block = compile_function(ctx, scope_id, &func.body)?;
    if discard {
        return Ok(false);
    }
    let needs_context = block.arg_frame.is_some();
    ctx.push_literal(Value::CodeBlock(Rc::new(block)))?;
    if needs_context {
        ctx.simple(SimpleOp::SetLexScope);
    }
    Ok(true)
}

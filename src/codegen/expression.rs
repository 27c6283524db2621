// In src/codegen/expression.rs

use crate::analyzer::{negate_constant, Resolved};
use crate::bytecode::freq::{self, *};
use crate::bytecode::{Opcode, SimpleOp};
use crate::diagnostics::codes::E4001_BAD_PATH;
use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::utils::Span;
use crate::value::{Symbol, Value};

use super::{function, loops, lvalue, statement, CodegenCtx, Emit};

impl Emit for Node {
    fn emit(&self, ctx: &mut CodegenCtx<'_>, discard: bool) -> Result<bool, CompileError> {
        match &self.kind {
            // --- 叶子节点 ---
            Expr::Literal(value) => {
                if discard {
                    return Ok(false);
                }
                ctx.push_value(value.clone())?;
                Ok(true)
            }
            Expr::Name(name) => {
                if discard {
                    return Ok(false);
                }
                emit_name(ctx, name)?;
                Ok(true)
            }
            Expr::SelfRef => {
                if discard {
                    return Ok(false);
                }
                ctx.simple(SimpleOp::PushSelf);
                Ok(true)
            }
            Expr::Func(func) => function::emit_func_literal(ctx, func, self.span, discard),

            // --- 运算符 ---
            Expr::Unary { op, operand } => {
                emit_unary(ctx, *op, operand)?;
                Ok(true)
            }
            Expr::Binary { op, lhs, rhs } => {
                emit_binary(ctx, self, *op, lhs, rhs)?;
                Ok(true)
            }
            Expr::Logical { op, lhs, rhs } => emit_logical(ctx, *op, lhs, rhs, discard),
            Expr::Exists(target) => {
                emit_exists(ctx, target, self.span)?;
                Ok(true)
            }

            // --- 访问与赋值 ---
            Expr::Path { .. } => {
                lvalue::emit_path_get(ctx, self, true)?;
                Ok(true)
            }
            Expr::Index { object, index } => {
                ctx.emit_value(object)?;
                ctx.emit_value(index)?;
                ctx.freq(FREQ_AREF)?;
                Ok(true)
            }
            Expr::Assign { target, value } => lvalue::emit_assign(ctx, target, value, discard),

            // --- 声明 ---
            Expr::Local(bindings) => statement::emit_local(ctx, bindings, discard),
            Expr::Constant(_) => statement::emit_constant(ctx, discard),
            Expr::Global { name, value } => statement::emit_global(ctx, name, value.as_deref()),
            Expr::GlobalFunc { name, func } => statement::emit_global_func(ctx, name, func),

            // --- 调用与消息 ---
            Expr::Call { name, args } => {
                emit_call(ctx, name, args)?;
                Ok(true)
            }
            Expr::Invoke { func, args } => {
                emit_args(ctx, args)?;
                ctx.emit_value(func)?;
                ctx.op(Opcode::Invoke, args.len())?;
                Ok(true)
            }
            Expr::Send { receiver, message, args, may_be_undefined } => {
                emit_send(ctx, receiver.as_deref(), message, args, *may_be_undefined)?;
                Ok(true)
            }
            Expr::Resend { message, args, may_be_undefined } => {
                emit_args(ctx, args)?;
                ctx.push_sym(message)?;
                let op = if *may_be_undefined { Opcode::ResendIfDefined } else { Opcode::Resend };
                ctx.op(op, args.len())?;
                Ok(true)
            }

            // --- 控制流 ---
            Expr::Begin(items) => statement::emit_begin(ctx, items, discard),
            Expr::If { cond, then_branch, else_branch } => {
                statement::emit_if(ctx, cond, then_branch, else_branch.as_deref(), discard)
            }
            Expr::Try { body, handlers } => statement::emit_try(ctx, body, handlers, discard),
            Expr::Return(value) => statement::emit_return(ctx, value.as_deref(), discard),
            Expr::Loop(body) => loops::emit_loop(ctx, body, discard),
            Expr::While { cond, body } => loops::emit_while(ctx, cond, body, discard),
            Expr::Repeat { body, cond } => loops::emit_repeat(ctx, body, cond, discard),
            Expr::For { var, start, limit, step, body } => {
                let parts = loops::ForLoop { var, start, limit, step: step.as_deref(), body };
                loops::emit_for(ctx, self.span, parts, discard)
            }
            Expr::Foreach { key, value, deeply, collection, collect, body } => {
                let parts = loops::ForeachLoop {
                    key: key.as_ref(),
                    value,
                    deeply: *deeply,
                    collection,
                    collect: *collect,
                    body,
                };
                loops::emit_foreach(ctx, self.span, parts, discard)
            }
            Expr::Break(value) => loops::emit_break(ctx, value.as_deref(), self.span, discard),

            // --- 构造器 ---
            Expr::MakeArray { class, elements } => {
                emit_args(ctx, elements)?;
                match class {
                    Some(class) => ctx.push_sym(class)?,
                    None => ctx.push_symbol("array")?,
                }
                ctx.op(Opcode::MakeArray, elements.len())?;
                Ok(true)
            }
            Expr::MakeFrame(slots) => {
                for (_, value) in slots {
                    ctx.emit_value(value)?;
                }
                let names: Vec<Symbol> = slots.iter().map(|(name, _)| name.clone()).collect();
                let map = ctx.store.shared_map(&names);
                ctx.push_literal(Value::Map(map))?;
                ctx.op(Opcode::MakeFrame, slots.len())?;
                Ok(true)
            }
        }
    }
}

// --- 变量读取 ---

pub(super) fn emit_name(ctx: &mut CodegenCtx<'_>, name: &Symbol) -> Result<(), CompileError> {
    match ctx.resolve(name) {
        Resolved::Slot(slot) => ctx.get_var(slot),
        Resolved::Constant(value) => ctx.push_value(value),
        Resolved::Outer | Resolved::Environment => {
            let index = ctx.literal_index(Value::Symbol(name.clone()));
            ctx.op(Opcode::FindVar, index)
        }
    }
}

pub(super) fn emit_args(ctx: &mut CodegenCtx<'_>, args: &[Node]) -> Result<(), CompileError> {
    args.iter().try_for_each(|arg| ctx.emit_value(arg))
}

// --- 一元与二元运算 ---

fn emit_unary(ctx: &mut CodegenCtx<'_>, op: UnaryOp, operand: &Node) -> Result<(), CompileError> {
    match op {
        UnaryOp::Negate => {
            if let Some(value) = fold_negation(ctx, operand) {
                return ctx.push_value(value);
            }
            ctx.push_int(0)?;
            ctx.emit_value(operand)?;
            ctx.freq(FREQ_SUBTRACT)
        }
        UnaryOp::Not => {
            ctx.emit_value(operand)?;
            ctx.freq(FREQ_NOT)
        }
    }
}

/// `-literal` and `- -literal` become a single literal.
fn fold_negation(ctx: &mut CodegenCtx<'_>, operand: &Node) -> Option<Value> {
    let value = match &operand.kind {
        Expr::Literal(value) => value.clone(),
        Expr::Unary { op: UnaryOp::Negate, operand: inner } => fold_negation(ctx, inner)?,
        _ => return None,
    };
    negate_constant(&value, ctx.store)
}

fn emit_binary(ctx: &mut CodegenCtx<'_>, node: &Node, op: BinaryOp, lhs: &Node, rhs: &Node) -> Result<(), CompileError> {
    let index = match op {
        BinaryOp::Concat | BinaryOp::ConcatSpace => return emit_concat(ctx, node),
        BinaryOp::Mod => return emit_library_call(ctx, lhs, rhs, "Mod"),
        BinaryOp::ShiftLeft => return emit_library_call(ctx, lhs, rhs, "ShiftLeft"),
        BinaryOp::ShiftRight => return emit_library_call(ctx, lhs, rhs, "ShiftRight"),
        BinaryOp::Add => FREQ_ADD,
        BinaryOp::Sub => FREQ_SUBTRACT,
        BinaryOp::Mul => FREQ_MULTIPLY,
        BinaryOp::Div => FREQ_DIVIDE,
        BinaryOp::IntDiv => FREQ_DIV,
        BinaryOp::Equal => FREQ_EQUALS,
        BinaryOp::NotEqual => FREQ_NOT_EQUALS,
        BinaryOp::Less => FREQ_LESS,
        BinaryOp::Greater => FREQ_GREATER,
        BinaryOp::LessEqual => FREQ_LESS_EQUAL,
        BinaryOp::GreaterEqual => FREQ_GREATER_EQUAL,
    };
    ctx.emit_value(lhs)?;
    ctx.emit_value(rhs)?;
    ctx.freq(index)
}

fn emit_library_call(ctx: &mut CodegenCtx<'_>, lhs: &Node, rhs: &Node, name: &str) -> Result<(), CompileError> {
    ctx.emit_value(lhs)?;
    ctx.emit_value(rhs)?;
    ctx.call_global(name, 2)
}

/// One piece of a flattened `&`/`&&` chain; `Space` is the separator `&&` adds.
enum ConcatPart<'n> {
    Node(&'n Node),
    Space,
}

fn concat_parts<'n>(node: &'n Node, parts: &mut Vec<ConcatPart<'n>>) {
    match &node.kind {
        Expr::Binary { op: BinaryOp::Concat, lhs, rhs } => {
            concat_parts(lhs, parts);
            concat_parts(rhs, parts);
        }
        Expr::Binary { op: BinaryOp::ConcatSpace, lhs, rhs } => {
            concat_parts(lhs, parts);
            parts.push(ConcatPart::Space);
            concat_parts(rhs, parts);
        }
        _ => parts.push(ConcatPart::Node(node)),
    }
}

/// `a & b && c` builds `[a, b, " ", c]` and hands it to the stringer.
fn emit_concat(ctx: &mut CodegenCtx<'_>, node: &Node) -> Result<(), CompileError> {
    let mut parts = Vec::new();
    concat_parts(node, &mut parts);

    let mut space = None;
    for part in &parts {
        match part {
            ConcatPart::Node(n) => ctx.emit_value(n)?,
            ConcatPart::Space => {
                let value = space.get_or_insert_with(|| ctx.store.make_string(" ")).clone();
                ctx.push_literal(value)?;
            }
        }
    }
    ctx.push_symbol("array")?;
    ctx.op(Opcode::MakeArray, parts.len())?;
    ctx.freq(FREQ_STRINGER)
}

// --- 短路求值 ---

fn emit_logical(ctx: &mut CodegenCtx<'_>, op: LogicalOp, lhs: &Node, rhs: &Node, discard: bool) -> Result<bool, CompileError> {
    let (skip, short_value) = match op {
        LogicalOp::And => (Opcode::BranchIfFalse, Value::Nil),
        LogicalOp::Or => (Opcode::BranchIfTrue, Value::True),
    };
    ctx.emit_value(lhs)?;
    let short = ctx.placeholder(skip);
    if discard {
        ctx.emit_discard(rhs)?;
        ctx.patch_here(short)?;
        return Ok(false);
    }
    ctx.emit_value(rhs)?;
    let done = ctx.placeholder(Opcode::Branch);
    ctx.patch_here(short)?;
    ctx.push_value(short_value)?;
    ctx.patch_here(done)?;
    Ok(true)
}

// --- exists ---

fn emit_exists(ctx: &mut CodegenCtx<'_>, target: &Node, span: Span) -> Result<(), CompileError> {
    match &target.kind {
        Expr::Name(name) => match ctx.resolve(name) {
            Resolved::Slot(_) | Resolved::Constant(_) | Resolved::Outer => ctx.push_value(Value::True),
            Resolved::Environment => {
                ctx.push_sym(name)?;
                ctx.call_global("HasVar", 1)
            }
        },
        Expr::Path { .. } => {
            lvalue::emit_path_target(ctx, target)?;
            ctx.freq(FREQ_HAS_PATH)
        }
        _ => Err(ctx.error(&E4001_BAD_PATH, span, "`exists` needs a variable or a slot path")),
    }
}

// --- 调用与发送 ---

fn emit_call(ctx: &mut CodegenCtx<'_>, name: &Symbol, args: &[Node]) -> Result<(), CompileError> {
    emit_args(ctx, args)?;
    match freq::lookup(name.as_str(), args.len()) {
        Some(index) => ctx.freq(index),
        None => {
            ctx.push_sym(name)?;
            ctx.op(Opcode::Call, args.len())
        }
    }
}

fn emit_send(
    ctx: &mut CodegenCtx<'_>,
    receiver: Option<&Node>,
    message: &Symbol,
    args: &[Node],
    may_be_undefined: bool,
) -> Result<(), CompileError> {
    emit_args(ctx, args)?;
    match receiver {
        // `a.b:?m()` tolerates a missing slot on the way to the receiver.
        Some(r @ Node { kind: Expr::Path { .. }, .. }) if may_be_undefined => lvalue::emit_path_get(ctx, r, false)?,
        Some(r) => ctx.emit_value(r)?,
        None => ctx.simple(SimpleOp::PushSelf),
    }
    ctx.push_sym(message)?;
    let op = if may_be_undefined { Opcode::SendIfDefined } else { Opcode::Send };
    ctx.op(op, args.len())
}

// In src/codegen/mod.rs

// 1. 声明所有子模块
mod expression;
mod function;
mod loops;
mod lvalue;
mod statement;
mod utils;

#[cfg(test)]
mod test;

// 2. 导入依赖
use crate::analyzer::{FrameLayout, ScopeId, Unit};
use crate::bytecode::{CodeBuilder, Label, LiteralPool};
use crate::codeblock::CodeBlock;
use crate::config::CompilerOptions;
use crate::diagnostics::{CompileError, DiagnosticBag};
use crate::parser::ast::Node;
use crate::store::ObjectStore;
use crate::utils::Span;

// --- 核心抽象 ---

/// Break sites of one syntactically active loop, patched when it closes.
/// The enclosing loop is the previous entry of `FunctionState::loops`.
#[derive(Debug, Default)]
pub struct LoopState {
    breaks: Vec<Label>,
}

/// Per-function state of pass 3. One exists for every function literal
/// being compiled; nested literals swap in a fresh one and restore the
/// enclosing state when they finish.
pub struct FunctionState {
    scope: ScopeId,
    span: Span,
    layout: FrameLayout,
    code: CodeBuilder,
    literals: LiteralPool,
    loops: Vec<LoopState>,
}

impl FunctionState {
    fn new(scope: ScopeId, span: Span, layout: FrameLayout) -> Self {
        Self {
            scope,
            span,
            layout,
            code: CodeBuilder::new(),
            literals: LiteralPool::new(),
            loops: Vec::new(),
        }
    }
}

/// CodegenCtx: everything pass 3 reads, plus the state of the function
/// currently being emitted.
pub struct CodegenCtx<'a> {
    pub unit: &'a Unit,
    pub store: &'a mut dyn ObjectStore,
    pub diagnostics: &'a mut DiagnosticBag,
    pub options: &'a CompilerOptions,
    pub file: &'a str,
    func: FunctionState,
}

/// Pass 3 over a PT node.
///
/// `discard` tells the node its value is not needed. The result says whether
/// a value was left on the stack; with `discard == false` it is always true.
pub trait Emit {
    fn emit(&self, ctx: &mut CodegenCtx<'_>, discard: bool) -> Result<bool, CompileError>;
}

/// Compiles one analyzed top-level tree into its code block.
pub fn generate(
    tree: &Node,
    unit: &Unit,
    store: &mut dyn ObjectStore,
    diagnostics: &mut DiagnosticBag,
    options: &CompilerOptions,
    file: &str,
) -> Result<CodeBlock, CompileError> {
    let root = unit.root();
    let layout = FrameLayout::compute(root, options.compat);
    let mut ctx = CodegenCtx {
        unit,
        store,
        diagnostics,
        options,
        file,
        func: FunctionState::new(Unit::ROOT, root.span, layout),
    };
    function::compile_function(&mut ctx, Unit::ROOT, tree)
}

// In src/lib.rs

// 1. 编译器流水线的各个阶段
pub mod analyzer;
pub mod bytecode;
pub mod codeblock;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod store;
pub mod utils;
pub mod value;

pub use codeblock::CodeBlock;
pub use compiler::Compiler;
pub use config::{CompatMode, CompilerOptions};
pub use diagnostics::{CompileError, DiagnosticBag};
pub use store::{Heap, ObjectStore};

use source::SourceStream;

// 2. 顶层的公共 API
/// Compiles a NewtonScript source string into a code block.
///
/// Warnings are dropped; use [`Compiler`] directly to collect them.
///
/// # Returns
/// * `Ok(CodeBlock)` for the whole program.
/// * `Err(CompileError)` for the first fatal error.
pub fn compile(
    source: &str,
    file_name: &str,
    store: &mut dyn ObjectStore,
    options: CompilerOptions,
) -> Result<CodeBlock, CompileError> {
    let mut stream = SourceStream::new(source, file_name);
    let mut compiler = Compiler::new(&mut stream, store, options);
    compiler.compile()
}

//! src/compiler.rs
//!
//! 编译驱动：字符流 → 词法 → 语法 → pass 1 → pass 2 → pass 3，
//! one top-level command at a time.

use log::{debug, info};

use crate::analyzer::{walk_closures, walk_declarations};
use crate::codeblock::CodeBlock;
use crate::codegen::generate;
use crate::config::CompilerOptions;
use crate::diagnostics::{CompileError, DiagnosticBag};
use crate::lexer::Lexer;
use crate::parser::ast::{Expr, Node};
use crate::parser::{Parse, Parser};
use crate::source::CharStream;
use crate::store::ObjectStore;
use crate::utils::Span;

pub struct Compiler<'a> {
    parser: Parser<'a>,
    options: CompilerOptions,
    diagnostics: DiagnosticBag,
}

impl<'a> Compiler<'a> {
    pub fn new(stream: &'a mut dyn CharStream, store: &'a mut dyn ObjectStore, options: CompilerOptions) -> Self {
        let diagnostics = if options.warnings { DiagnosticBag::new() } else { DiagnosticBag::silent() };
        Self {
            parser: Parser::new(Lexer::new(stream, store)),
            options,
            diagnostics,
        }
    }

    /// Warnings collected so far. Callers may also report errors here to
    /// render everything in one go.
    pub fn diagnostics(&mut self) -> &mut DiagnosticBag {
        &mut self.diagnostics
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles the whole input (or only its first command when
    /// `first_command_only` is set) into one code block.
    pub fn compile(&mut self) -> Result<CodeBlock, CompileError> {
        let tree = if self.options.first_command_only {
            match self.parser.next_command()? {
                Some(tree) => tree,
                None => Node::new(Expr::Begin(Vec::new()), Span::default()),
            }
        } else {
            self.parser.parse_program()?
        };
        self.compile_tree(&tree)
    }

    /// Compiles each top-level command on its own. A failed command does not
    /// stop the ones after it; syntax errors skip to the next `;`.
    pub fn compile_each(&mut self) -> Vec<Result<CodeBlock, CompileError>> {
        let mut results = Vec::new();
        loop {
            match self.parser.next_command() {
                Ok(Some(tree)) => results.push(self.compile_tree(&tree)),
                Ok(None) => break,
                Err(e) => {
                    results.push(Err(e));
                    self.parser.synchronize();
                }
            }
            if self.options.first_command_only {
                break;
            }
        }
        info!(
            "compiled {} command(s), {} failed",
            results.len(),
            results.iter().filter(|r| r.is_err()).count()
        );
        results
    }

    fn compile_tree(&mut self, tree: &Node) -> Result<CodeBlock, CompileError> {
        let file = self.parser.file_name().to_string();
        let store = self.parser.store();

        let mut unit = walk_declarations(tree, store, &mut self.diagnostics, &file)?;
        walk_closures(tree, &mut unit, &file)?;
        let block = generate(tree, &unit, store, &mut self.diagnostics, &self.options, &file)?;

        // 顶层常量对后续命令可见
        for (name, value) in &unit.root().constants {
            store.define_constant(name.clone(), value.clone());
        }
        debug!(
            "{}:{}: {} function(s), {} bytes at top level",
            file,
            tree.span.line,
            unit.scopes.len(),
            block.instructions.len()
        );
        Ok(block)
    }
}

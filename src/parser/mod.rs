//! src/parser/mod.rs
//!
//! 语法分析阶段的公共接口：Token 流 → PT 节点树。

pub mod ast;
mod expression;
mod main;

#[cfg(test)]
mod test;

pub use main::{Parse, Parser};

use crate::diagnostics::CompileError;
use crate::lexer::Lexer;
use crate::source::SourceStream;
use crate::store::ObjectStore;
use ast::Node;

/// Parses a whole source string into one `begin` node.
pub fn parse_source(source: &str, file_name: &str, store: &mut dyn ObjectStore) -> Result<Node, CompileError> {
    let mut stream = SourceStream::new(source, file_name);
    let mut parser = Parser::new(Lexer::new(&mut stream, store));
    parser.parse_program()
}

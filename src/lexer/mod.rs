//! src/lexer/mod.rs
//!
//! Character stream → tokens.

mod main;
pub mod token;


pub use main::Lexer;
pub use token::{Keyword, Literal, Operator, Punctuation, Token, TokenKind, RESERVED_WORDS};

use crate::diagnostics::CompileError;
use crate::source::SourceStream;
use crate::store::ObjectStore;

/// Tokenizes a whole string. Convenient for tools and tests; the compiler
/// itself pulls tokens one at a time.
pub fn tokenize(source: &str, file_name: &str, store: &mut dyn ObjectStore) -> Result<Vec<Token>, CompileError> {
    let mut stream = SourceStream::new(source, file_name);
    Lexer::new(&mut stream, store).scan_all_tokens()
}

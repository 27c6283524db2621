//! Character input for the lexer.
//!
//! The lexer never touches files or strings directly; it pulls characters
//! through [`CharStream`], so a REPL, a file loader or a test can all feed it.

/// A character source with one-character pushback and position tracking.
pub trait CharStream {
    /// Returns the next character, or `None` at end of input.
    fn get_char(&mut self) -> Option<char>;
    /// Pushes back the character most recently returned by `get_char`.
    fn unget_char(&mut self, c: char);
    /// Name reported in diagnostics.
    fn file_name(&self) -> &str;
    /// 1-based line of the next character.
    fn line_number(&self) -> u32;
    /// Byte offset of the next character.
    fn position(&self) -> usize;
}

/// An in-memory [`CharStream`] over a source string.
#[derive(Debug, Clone)]
pub struct SourceStream {
    source: String,
    file_name: String,
    pos: usize,
    line: u32,
}

impl SourceStream {
    pub fn new(source: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: file_name.into(),
            pos: 0,
            line: 1,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl CharStream for SourceStream {
    fn get_char(&mut self) -> Option<char> {
        let c = self.source[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn unget_char(&mut self, c: char) {
        let len = c.len_utf8();
        debug_assert!(self.pos >= len, "unget_char past the start of input");
        self.pos = self.pos.saturating_sub(len);
        if c == '\n' {
            self.line = self.line.saturating_sub(1).max(1);
        }
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn line_number(&self) -> u32 {
        self.line
    }

    fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_across_pushback() {
        let mut stream = SourceStream::new("a\nb", "t.ns");
        assert_eq!(stream.get_char(), Some('a'));
        assert_eq!(stream.get_char(), Some('\n'));
        assert_eq!(stream.line_number(), 2);
        stream.unget_char('\n');
        assert_eq!(stream.line_number(), 1);
        assert_eq!(stream.position(), 1);
        assert_eq!(stream.get_char(), Some('\n'));
        assert_eq!(stream.get_char(), Some('b'));
        assert_eq!(stream.get_char(), None);
    }
}

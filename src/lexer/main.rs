// 主词法分析器模块。
// The scanner: pulls characters from a `CharStream` and produces tokens on demand.

use super::token::*;
use crate::diagnostics::codes::*;
use crate::diagnostics::{CompileError, ErrorCode};
use crate::source::CharStream;
use crate::store::ObjectStore;
use crate::utils::Span;
use crate::value::{MAX_INT, Symbol};

// --- 1. Lexer 定义 ---

/// The lexer. Keeps one token of pushback so a `;` or `,` in front of a
/// closing delimiter can be absorbed.
pub struct Lexer<'a> {
    stream: &'a mut dyn CharStream,
    store: &'a mut dyn ObjectStore,
    pushback: Option<Token>,
    /// Byte offset where the token being scanned starts.
    start_pos: usize,
    start_line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(stream: &'a mut dyn CharStream, store: &'a mut dyn ObjectStore) -> Self {
        Lexer {
            stream,
            store,
            pushback: None,
            start_pos: 0,
            start_line: 1,
        }
    }

    pub fn store(&mut self) -> &mut dyn ObjectStore {
        &mut *self.store
    }

    pub fn file_name(&self) -> &str {
        self.stream.file_name()
    }

    /// Returns the next token, absorbing `;` before `end`, `else`, `until`,
    /// `onexception` and closing brackets, and `,` before `]` or `}`.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        if let Some(tok) = self.pushback.take() {
            return Ok(tok);
        }
        let tok = self.scan_token()?;
        let absorbs: fn(&TokenKind) -> bool = match tok.kind {
            TokenKind::Punctuation(Punctuation::Semicolon) => closes_sequence,
            TokenKind::Punctuation(Punctuation::Comma) => closes_list,
            _ => return Ok(tok),
        };
        let next = self.scan_token()?;
        if absorbs(&next.kind) {
            Ok(next)
        } else {
            self.pushback = Some(next);
            Ok(tok)
        }
    }

    /// Consumes the lexer and scans every token up to and including `Eof`.
    pub fn scan_all_tokens(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }
}

fn closes_sequence(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(Keyword::End | Keyword::Else | Keyword::Until | Keyword::OnException)
            | TokenKind::Punctuation(Punctuation::RParen | Punctuation::RBracket | Punctuation::RBrace)
    )
}

fn closes_list(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Punctuation(Punctuation::RBracket | Punctuation::RBrace)
    )
}

// --- 2. Core Character Logic ---
// --- 2. 底层字符操作逻辑 ---

trait LexerCore {
    /// 消费当前字符并前进一个位置。
    /// Consumes one character; `None` at end of input.
    fn advance(&mut self) -> Option<char>;
    /// Looks at the next character without consuming it.
    fn peek(&mut self) -> Option<char>;
    /// 检查当前字符是否与预期字符匹配。如果匹配，则消费该字符并返回 `true`。
    fn match_char(&mut self, expected: char) -> bool;
    fn make_token(&mut self, kind: TokenKind) -> Token;
    fn error(&self, code: &'static ErrorCode, message: String) -> CompileError;
}

impl<'a> LexerCore for Lexer<'a> {
    fn advance(&mut self) -> Option<char> {
        self.stream.get_char()
    }

    fn peek(&mut self) -> Option<char> {
        let c = self.stream.get_char()?;
        self.stream.unget_char(c);
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        let span = Span::new(self.start_pos, self.stream.position(), self.start_line);
        Token { kind, span }
    }

    fn error(&self, code: &'static ErrorCode, message: String) -> CompileError {
        let span = Span::new(self.start_pos, self.stream.position(), self.start_line);
        CompileError::new(code, self.stream.file_name(), span).with_message(message)
    }
}

// --- 3. Main Token Scanning Logic ---
// --- 3. 主要词法识别逻辑 ---

trait TokenScanner {
    /// 扫描并返回下一个 Token。
    fn scan_token(&mut self) -> Result<Token, CompileError>;

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError>;
    fn scan_identifier(&mut self, first: char) -> TokenKind;
    fn scan_bar_symbol(&mut self) -> Result<TokenKind, CompileError>;
    fn scan_number(&mut self, first: char) -> Result<TokenKind, CompileError>;
    fn scan_string(&mut self) -> Result<TokenKind, CompileError>;
    fn scan_char_literal(&mut self) -> Result<TokenKind, CompileError>;
    fn scan_magic_pointer(&mut self) -> Result<TokenKind, CompileError>;
    /// Reads exactly `count` hex digits.
    fn scan_hex_digits(&mut self, count: usize) -> Result<u32, CompileError>;
}

impl<'a> TokenScanner for Lexer<'a> {
    fn scan_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace_and_comments()?;
        self.start_pos = self.stream.position();
        self.start_line = self.stream.line_number();

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            '(' => TokenKind::punct(Punctuation::LParen),
            ')' => TokenKind::punct(Punctuation::RParen),
            '{' => TokenKind::punct(Punctuation::LBrace),
            '}' => TokenKind::punct(Punctuation::RBrace),
            '[' => TokenKind::punct(Punctuation::LBracket),
            ']' => TokenKind::punct(Punctuation::RBracket),
            ',' => TokenKind::punct(Punctuation::Comma),
            ';' => TokenKind::punct(Punctuation::Semicolon),
            '\'' => TokenKind::punct(Punctuation::Quote),

            '+' => TokenKind::op(Operator::Plus),
            '-' => TokenKind::op(Operator::Minus),
            '*' => TokenKind::op(Operator::Star),
            '/' => TokenKind::op(Operator::Slash),
            '=' => TokenKind::op(Operator::Eq),
            '.' => TokenKind::op(Operator::Dot),
            '<' => {
                if self.match_char('=') {
                    TokenKind::op(Operator::LtEq)
                } else if self.match_char('<') {
                    TokenKind::op(Operator::Shl)
                } else if self.match_char('>') {
                    TokenKind::op(Operator::NotEq)
                } else {
                    TokenKind::op(Operator::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::op(Operator::GtEq)
                } else if self.match_char('>') {
                    TokenKind::op(Operator::Shr)
                } else {
                    TokenKind::op(Operator::Gt)
                }
            }
            ':' => {
                if self.match_char('=') {
                    TokenKind::op(Operator::Assign)
                } else if self.match_char('?') {
                    TokenKind::op(Operator::ColonQ)
                } else {
                    TokenKind::op(Operator::Colon)
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::op(Operator::AmpAmp)
                } else {
                    TokenKind::op(Operator::Amp)
                }
            }

            '"' => self.scan_string()?,
            '|' => self.scan_bar_symbol()?,
            '$' => self.scan_char_literal()?,
            '@' => self.scan_magic_pointer()?,
            c if c.is_ascii_digit() => self.scan_number(c)?,
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(c),

            other => {
                return Err(self.error(
                    &E1001_UNRECOGNIZED_CHAR,
                    format!("Unrecognized character '{}'", other.escape_default()),
                ));
            }
        };

        Ok(self.make_token(kind))
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            match self.advance() {
                Some(c) if c.is_whitespace() => {}
                Some('/') => match self.peek() {
                    Some('/') => {
                        while let Some(c) = self.advance() {
                            if c == '\n' {
                                break;
                            }
                        }
                    }
                    Some('*') => {
                        self.start_pos = self.stream.position() - 1;
                        self.start_line = self.stream.line_number();
                        self.advance();
                        // runs of `*` may precede the closing `/`
                        let mut star = false;
                        loop {
                            match self.advance() {
                                None => {
                                    return Err(self.error(
                                        &E1006_UNTERMINATED_COMMENT,
                                        "Unterminated block comment".to_string(),
                                    ));
                                }
                                Some('/') if star => break,
                                Some(c) => star = c == '*',
                            }
                        }
                    }
                    _ => {
                        self.stream.unget_char('/');
                        return Ok(());
                    }
                },
                Some(c) => {
                    self.stream.unget_char(c);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if text.eq_ignore_ascii_case("nil") {
            return TokenKind::Literal(Literal::Nil);
        }
        if text.eq_ignore_ascii_case("true") {
            return TokenKind::Literal(Literal::True);
        }
        match Keyword::lookup(&text) {
            Some(k) => TokenKind::Keyword(k),
            None => TokenKind::Identifier(self.store.intern(&text)),
        }
    }

    fn scan_bar_symbol(&mut self) -> Result<TokenKind, CompileError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error(&E1003_UNTERMINATED_SYMBOL, "Unterminated symbol".to_string()));
                }
                Some('|') => break,
                Some('\\') => match self.advance() {
                    Some(c @ ('|' | '\\')) => text.push(c),
                    Some(other) => {
                        return Err(self.error(
                            &E1009_UNKNOWN_ESCAPE,
                            format!("Unknown escape `\\{}` in symbol", other),
                        ));
                    }
                    None => {
                        return Err(self.error(&E1003_UNTERMINATED_SYMBOL, "Unterminated symbol".to_string()));
                    }
                },
                Some(c) => text.push(c),
            }
        }
        let sym: Symbol = self.store.intern(&text);
        Ok(TokenKind::Identifier(sym))
    }

    fn scan_number(&mut self, first: char) -> Result<TokenKind, CompileError> {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut value: u64 = 0;
            let mut digits = 0;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                self.advance();
                value = value.saturating_mul(16).saturating_add(u64::from(d));
                digits += 1;
            }
            if digits == 0 {
                return Err(self.error(&E1008_BAD_NUMBER, "Expected hex digits after `0x`".to_string()));
            }
            return int_literal(value).ok_or_else(|| {
                self.error(&E1005_INT_OUT_OF_RANGE, "Integer literal out of range".to_string())
            });
        }

        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.advance();
        }

        let mut is_real = false;
        if self.match_char('.') {
            is_real = true;
            text.push('.');
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.advance();
            }
        }
        if let Some(e @ ('e' | 'E')) = self.peek() {
            is_real = true;
            self.advance();
            text.push(e);
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.advance();
                text.push(sign);
            }
            let mut digits = 0;
            while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                text.push(c);
                self.advance();
                digits += 1;
            }
            if digits == 0 {
                return Err(self.error(&E1008_BAD_NUMBER, format!("Missing exponent digits in `{}`", text)));
            }
        }

        if is_real {
            return text
                .parse::<f64>()
                .map(|r| TokenKind::Literal(Literal::Real(r)))
                .map_err(|_| self.error(&E1008_BAD_NUMBER, format!("Malformed number `{}`", text)));
        }
        let value = text.parse::<u64>().unwrap_or(u64::MAX);
        int_literal(value).ok_or_else(|| {
            self.error(&E1005_INT_OUT_OF_RANGE, format!("Integer literal `{}` out of range", text))
        })
    }

    fn scan_string(&mut self) -> Result<TokenKind, CompileError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error(&E1002_UNTERMINATED_STRING, "Unterminated string literal".to_string()));
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('u') => {
                        // groups of four hex digits until a closing `\u` or the end of the string
                        loop {
                            if self.peek() == Some('"') {
                                break;
                            }
                            if self.match_char('\\') {
                                if self.match_char('u') {
                                    break;
                                }
                                return Err(self.error(
                                    &E1004_BAD_HEX_DIGITS,
                                    "Unicode run must be closed with `\\u`".to_string(),
                                ));
                            }
                            let code = self.scan_hex_digits(4)?;
                            let c = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
                            value.push(c);
                        }
                    }
                    Some(c) if c.is_ascii_hexdigit() => {
                        self.stream.unget_char(c);
                        let code = self.scan_hex_digits(2)?;
                        value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                    }
                    Some(other) => {
                        return Err(self.error(
                            &E1009_UNKNOWN_ESCAPE,
                            format!("Unknown escape sequence `\\{}`", other),
                        ));
                    }
                    None => {
                        return Err(self.error(&E1002_UNTERMINATED_STRING, "Unterminated string literal".to_string()));
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Ok(TokenKind::Literal(Literal::String(value)))
    }

    fn scan_char_literal(&mut self) -> Result<TokenKind, CompileError> {
        let code = match self.advance() {
            None => {
                return Err(self.error(&E1007_BAD_CHAR_LITERAL, "Expected a character after `$`".to_string()));
            }
            Some('\\') => match self.peek() {
                Some('n') => {
                    self.advance();
                    0x0D
                }
                Some('t') => {
                    self.advance();
                    0x09
                }
                Some('\\') => {
                    self.advance();
                    u32::from('\\')
                }
                Some('u') => {
                    self.advance();
                    self.scan_hex_digits(4)?
                }
                Some(c) if c.is_ascii_hexdigit() => self.scan_hex_digits(2)?,
                Some(other) => {
                    return Err(self.error(
                        &E1007_BAD_CHAR_LITERAL,
                        format!("Unknown character escape `$\\{}`", other),
                    ));
                }
                None => {
                    return Err(self.error(&E1007_BAD_CHAR_LITERAL, "Incomplete character escape".to_string()));
                }
            },
            Some(c) => u32::from(c),
        };
        let code = u16::try_from(code).map_err(|_| {
            self.error(&E1007_BAD_CHAR_LITERAL, "Character is outside the 16-bit range".to_string())
        })?;
        Ok(TokenKind::Literal(Literal::Char(code)))
    }

    fn scan_magic_pointer(&mut self) -> Result<TokenKind, CompileError> {
        let mut value: u64 = 0;
        let mut digits = 0;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            self.advance();
            value = value.saturating_mul(10).saturating_add(u64::from(d));
            digits += 1;
        }
        if digits == 0 {
            return Err(self.error(&E1008_BAD_NUMBER, "Expected a number after `@`".to_string()));
        }
        match i32::try_from(value) {
            Ok(n) if n <= MAX_INT => Ok(TokenKind::Literal(Literal::MagicPointer(n))),
            _ => Err(self.error(&E1005_INT_OUT_OF_RANGE, "Magic pointer out of range".to_string())),
        }
    }

    fn scan_hex_digits(&mut self, count: usize) -> Result<u32, CompileError> {
        let mut value = 0;
        for _ in 0..count {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    self.advance();
                    value = value * 16 + d;
                }
                None => {
                    return Err(self.error(
                        &E1004_BAD_HEX_DIGITS,
                        format!("Expected exactly {} hex digits", count),
                    ));
                }
            }
        }
        Ok(value)
    }
}

/// Largest magnitude of an integer token. One past `MAX_INT` is let through
/// for `-536870912`; the parser rejects it anywhere else.
const MAX_MAGNITUDE: u64 = MAX_INT as u64 + 1;

fn int_literal(value: u64) -> Option<TokenKind> {
    if value > MAX_MAGNITUDE {
        return None;
    }
    i32::try_from(value).ok().map(|n| TokenKind::Literal(Literal::Integer(n)))
}

//! 解析器主体：Token 流 → PT 节点。
//! Statement-level constructs are parsed by recursive descent; operator
//! expressions go through the shift-reduce engine in `expression.rs`.

use super::ast::*;
use super::expression::ExpressionParser;
use crate::diagnostics::codes::E2001_SYNTAX_ERROR;
use crate::diagnostics::CompileError;
use crate::lexer::*;
use crate::store::ObjectStore;
use crate::utils::Span;
use crate::value::Symbol;
use log::trace;

// --- 1. 主解析器结构体 ---

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// The token being looked at.
    pub(super) current: Token,
    /// Second token of lookahead, filled on demand.
    lookahead: Option<Token>,
    /// Span of the most recently consumed token.
    pub(super) previous: Span,
    /// Tokens that would have been accepted at the current position.
    expected: Vec<String>,
    started: bool,
    next_func: u32,
}

// --- 2. Trait 定义 ---

/// Entry points used by the compiler driver.
pub trait Parse {
    /// Parses every command up to end of input into one `begin` node.
    fn parse_program(&mut self) -> Result<Node, CompileError>;
    /// Parses the next top-level command, `None` at end of input.
    fn next_command(&mut self) -> Result<Option<Node>, CompileError>;
    /// Skips to just past the next `;` after a syntax error.
    fn synchronize(&mut self);
}

pub(super) trait StatementParser {
    fn parse_keyword_form(&mut self, kw: Keyword) -> Result<Node, CompileError>;
    /// Expressions separated by `;` up to (not including) one of `terminators`.
    fn parse_sequence(&mut self, terminators: &[Keyword]) -> Result<Node, CompileError>;
    fn parse_if(&mut self) -> Result<Node, CompileError>;
    fn parse_while(&mut self) -> Result<Node, CompileError>;
    fn parse_repeat(&mut self) -> Result<Node, CompileError>;
    fn parse_for(&mut self) -> Result<Node, CompileError>;
    fn parse_foreach(&mut self) -> Result<Node, CompileError>;
    fn parse_try(&mut self) -> Result<Node, CompileError>;
    fn parse_bindings(&mut self, constant: bool) -> Result<Vec<Binding>, CompileError>;
    fn parse_global(&mut self) -> Result<Node, CompileError>;
    fn parse_func(&mut self, name: Option<Symbol>) -> Result<Node, CompileError>;
    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError>;
}

pub(super) trait Util {
    /// Consumes the current token and returns it.
    fn advance(&mut self) -> Result<Token, CompileError>;
    /// The token after `current`.
    fn peek_next(&mut self) -> Result<&Token, CompileError>;
    /// Checks the current token, recording `kind` as expected when it does not match.
    fn check(&mut self, kind: &TokenKind) -> bool;
    fn check_keyword(&mut self, kw: Keyword) -> bool;
    fn match_token(&mut self, kind: &TokenKind) -> Result<bool, CompileError>;
    fn consume(&mut self, kind: &TokenKind) -> Result<Token, CompileError>;
    fn consume_identifier(&mut self) -> Result<(Symbol, Span), CompileError>;
    fn expect_description(&mut self, what: &str);
    /// Syntax error at the current token listing everything expected here.
    fn unexpected(&mut self) -> CompileError;
    fn span_from(&self, start: Span) -> Span;
    fn new_func_id(&mut self) -> FuncId;
}

// --- 3. 基础实现 ---

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Self {
        Parser {
            lexer,
            current: Token { kind: TokenKind::Eof, span: Span::default() },
            lookahead: None,
            previous: Span::default(),
            expected: Vec::new(),
            started: false,
            next_func: 0,
        }
    }

    pub fn store(&mut self) -> &mut dyn ObjectStore {
        self.lexer.store()
    }

    pub fn file_name(&self) -> &str {
        self.lexer.file_name()
    }

    fn prime(&mut self) -> Result<(), CompileError> {
        if !self.started {
            self.current = self.lexer.next_token()?;
            self.started = true;
        }
        Ok(())
    }
}

impl<'a> Parse for Parser<'a> {
    fn parse_program(&mut self) -> Result<Node, CompileError> {
        self.prime()?;
        let start = self.current.span;
        let mut commands = Vec::new();
        while let Some(command) = self.next_command()? {
            commands.push(command);
        }
        trace!("parsed {} top-level commands", commands.len());
        let span = if commands.is_empty() { start } else { self.span_from(start) };
        Ok(Node::new(Expr::Begin(commands), span))
    }

    fn next_command(&mut self) -> Result<Option<Node>, CompileError> {
        self.prime()?;
        while self.match_token(&TokenKind::punct(Punctuation::Semicolon))? {}
        if self.current.kind == TokenKind::Eof {
            return Ok(None);
        }
        let command = self.parse_expression()?;
        if !self.match_token(&TokenKind::punct(Punctuation::Semicolon))? && !self.check(&TokenKind::Eof) {
            return Err(self.unexpected());
        }
        Ok(Some(command))
    }

    fn synchronize(&mut self) {
        // a failed scan has still consumed input, so every step makes progress
        let skipped = |result: Result<(), CompileError>| {
            if let Err(e) = result {
                trace!("skipping after lexical error: {}", e);
            }
        };
        loop {
            if !self.started {
                skipped(self.prime());
                continue;
            }
            match self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Punctuation(Punctuation::Semicolon) => {
                    skipped(self.advance().map(drop));
                    return;
                }
                _ => skipped(self.advance().map(drop)),
            }
        }
    }
}

impl<'a> Util for Parser<'a> {
    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = match self.lookahead.take() {
            Some(tok) => tok,
            None => self.lexer.next_token()?,
        };
        self.expected.clear();
        let old = std::mem::replace(&mut self.current, next);
        self.previous = old.span;
        Ok(old)
    }

    fn peek_next(&mut self) -> Result<&Token, CompileError> {
        let tok = match self.lookahead.take() {
            Some(tok) => tok,
            None => self.lexer.next_token()?,
        };
        Ok(self.lookahead.insert(tok))
    }

    fn check(&mut self, kind: &TokenKind) -> bool {
        if &self.current.kind == kind {
            return true;
        }
        self.expect_description(&format!("`{}`", kind));
        false
    }

    fn check_keyword(&mut self, kw: Keyword) -> bool {
        self.check(&TokenKind::Keyword(kw))
    }

    fn match_token(&mut self, kind: &TokenKind) -> Result<bool, CompileError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    fn consume_identifier(&mut self) -> Result<(Symbol, Span), CompileError> {
        if let TokenKind::Identifier(sym) = &self.current.kind {
            let sym = sym.clone();
            let tok = self.advance()?;
            return Ok((sym, tok.span));
        }
        self.expect_description("identifier");
        Err(self.unexpected())
    }

    fn expect_description(&mut self, what: &str) {
        if !self.expected.iter().any(|e| e == what) {
            self.expected.push(what.to_string());
        }
    }

    fn unexpected(&mut self) -> CompileError {
        let found = self.current.kind.to_string_for_error();
        let message = if self.expected.is_empty() {
            format!("Unexpected {}", found)
        } else {
            format!("Unexpected {}; expected {}", found, self.expected.join(", "))
        };
        CompileError::new(&E2001_SYNTAX_ERROR, self.lexer.file_name(), self.current.span)
            .with_message(message)
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.previous)
    }

    fn new_func_id(&mut self) -> FuncId {
        self.next_func += 1;
        FuncId(self.next_func)
    }
}

// --- 4. Statement-level forms ---

impl<'a> StatementParser for Parser<'a> {
    fn parse_keyword_form(&mut self, kw: Keyword) -> Result<Node, CompileError> {
        let start = self.current.span;
        match kw {
            Keyword::If => self.parse_if(),
            Keyword::While => self.parse_while(),
            Keyword::Repeat => self.parse_repeat(),
            Keyword::For => self.parse_for(),
            Keyword::Foreach => self.parse_foreach(),
            Keyword::Try => self.parse_try(),
            Keyword::Global => self.parse_global(),
            Keyword::Func => self.parse_func(None),
            Keyword::Loop => {
                self.advance()?;
                let body = self.parse_expression()?;
                Ok(Node::new(Expr::Loop(body.boxed()), self.span_from(start)))
            }
            Keyword::Begin => {
                self.advance()?;
                let mut body = self.parse_sequence(&[Keyword::End])?;
                self.consume(&TokenKind::Keyword(Keyword::End))?;
                body.span = self.span_from(start);
                Ok(body)
            }
            Keyword::Local | Keyword::Constant => {
                self.advance()?;
                let bindings = self.parse_bindings(kw == Keyword::Constant)?;
                let kind = if kw == Keyword::Constant { Expr::Constant(bindings) } else { Expr::Local(bindings) };
                Ok(Node::new(kind, self.span_from(start)))
            }
            Keyword::Break | Keyword::Return => {
                self.advance()?;
                let value = if self.can_start_expression() {
                    Some(self.parse_expression()?.boxed())
                } else {
                    None
                };
                let kind = if kw == Keyword::Break { Expr::Break(value) } else { Expr::Return(value) };
                Ok(Node::new(kind, self.span_from(start)))
            }
            Keyword::Call => {
                self.advance()?;
                let func = self.parse_expression()?;
                self.consume(&TokenKind::Keyword(Keyword::With))?;
                let args = self.parse_args()?;
                Ok(Node::new(Expr::Invoke { func: func.boxed(), args }, self.span_from(start)))
            }
            Keyword::Inherited => {
                self.advance()?;
                let may_be_undefined = if self.match_token(&TokenKind::op(Operator::ColonQ))? {
                    true
                } else {
                    self.consume(&TokenKind::op(Operator::Colon))?;
                    false
                };
                let (message, _) = self.consume_identifier()?;
                let args = self.parse_args()?;
                Ok(Node::new(Expr::Resend { message, args, may_be_undefined }, self.span_from(start)))
            }
            _ => {
                self.expect_description("expression");
                Err(self.unexpected())
            }
        }
    }

    fn parse_sequence(&mut self, terminators: &[Keyword]) -> Result<Node, CompileError> {
        let start = self.current.span;
        let mut items = Vec::new();
        loop {
            if terminators.iter().any(|t| self.current.kind == TokenKind::Keyword(*t)) {
                break;
            }
            items.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::punct(Punctuation::Semicolon))? {
                break;
            }
        }
        for t in terminators {
            self.check_keyword(*t);
        }
        Ok(Node::new(Expr::Begin(items), self.span_from(start)))
    }

    fn parse_if(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let cond = self.parse_expression()?;
        self.consume(&TokenKind::Keyword(Keyword::Then))?;
        let then_branch = self.parse_expression()?;
        let else_branch = if self.match_token(&TokenKind::Keyword(Keyword::Else))? {
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        Ok(Node::new(
            Expr::If { cond: cond.boxed(), then_branch: then_branch.boxed(), else_branch },
            self.span_from(start),
        ))
    }

    fn parse_while(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let cond = self.parse_expression()?;
        self.consume(&TokenKind::Keyword(Keyword::Do))?;
        let body = self.parse_expression()?;
        Ok(Node::new(Expr::While { cond: cond.boxed(), body: body.boxed() }, self.span_from(start)))
    }

    fn parse_repeat(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let body = self.parse_sequence(&[Keyword::Until])?;
        self.consume(&TokenKind::Keyword(Keyword::Until))?;
        let cond = self.parse_expression()?;
        Ok(Node::new(Expr::Repeat { body: body.boxed(), cond: cond.boxed() }, self.span_from(start)))
    }

    fn parse_for(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let (var, _) = self.consume_identifier()?;
        self.consume(&TokenKind::op(Operator::Assign))?;
        let first = self.parse_expression()?;
        self.consume(&TokenKind::Keyword(Keyword::To))?;
        let limit = self.parse_expression()?;
        let step = if self.match_token(&TokenKind::Keyword(Keyword::By))? {
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        self.consume(&TokenKind::Keyword(Keyword::Do))?;
        let body = self.parse_expression()?;
        Ok(Node::new(
            Expr::For { var, start: first.boxed(), limit: limit.boxed(), step, body: body.boxed() },
            self.span_from(start),
        ))
    }

    fn parse_foreach(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let (first, _) = self.consume_identifier()?;
        let (key, value) = if self.match_token(&TokenKind::punct(Punctuation::Comma))? {
            let (value, _) = self.consume_identifier()?;
            (Some(first), value)
        } else {
            (None, first)
        };
        let deeply = self.match_token(&TokenKind::Keyword(Keyword::Deeply))?;
        self.consume(&TokenKind::Keyword(Keyword::In))?;
        let collection = self.parse_expression()?;
        let collect = if self.match_token(&TokenKind::Keyword(Keyword::Collect))? {
            true
        } else {
            self.consume(&TokenKind::Keyword(Keyword::Do))?;
            false
        };
        let body = self.parse_expression()?;
        Ok(Node::new(
            Expr::Foreach { key, value, deeply, collection: collection.boxed(), collect, body: body.boxed() },
            self.span_from(start),
        ))
    }

    fn parse_try(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let body = self.parse_sequence(&[Keyword::OnException])?;
        let mut handlers = Vec::new();
        while self.check_keyword(Keyword::OnException) || handlers.is_empty() {
            self.consume(&TokenKind::Keyword(Keyword::OnException))?;
            let (exception, _) = self.consume_identifier()?;
            self.match_token(&TokenKind::Keyword(Keyword::Do))?;
            let handler_body = self.parse_expression()?;
            handlers.push(Handler { exception, body: handler_body.boxed() });
        }
        Ok(Node::new(Expr::Try { body: body.boxed(), handlers }, self.span_from(start)))
    }

    fn parse_bindings(&mut self, constant: bool) -> Result<Vec<Binding>, CompileError> {
        let mut bindings = Vec::new();
        loop {
            let start = self.current.span;
            let mut ty = None;
            if matches!(self.current.kind, TokenKind::Identifier(_))
                && matches!(self.peek_next()?.kind, TokenKind::Identifier(_))
            {
                ty = Some(self.consume_identifier()?.0);
            }
            let (name, _) = self.consume_identifier()?;
            let value = if constant {
                self.consume(&TokenKind::op(Operator::Assign))?;
                Some(self.parse_expression()?.boxed())
            } else if self.match_token(&TokenKind::op(Operator::Assign))? {
                Some(self.parse_expression()?.boxed())
            } else {
                None
            };
            bindings.push(Binding { name, ty, value, span: self.span_from(start) });
            if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                return Ok(bindings);
            }
        }
    }

    fn parse_global(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let (name, _) = self.consume_identifier()?;
        if self.check(&TokenKind::punct(Punctuation::LParen)) {
            let func = self.parse_func(Some(name.clone()))?;
            return Ok(Node::new(Expr::GlobalFunc { name, func: func.boxed() }, self.span_from(start)));
        }
        let value = if self.match_token(&TokenKind::op(Operator::Assign))? {
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        Ok(Node::new(Expr::Global { name, value }, self.span_from(start)))
    }

    /// `func [native] (params) body`, or the `(params) body` tail of a global function.
    fn parse_func(&mut self, name: Option<Symbol>) -> Result<Node, CompileError> {
        let start = self.current.span;
        let mut native = false;
        if name.is_none() {
            self.consume(&TokenKind::Keyword(Keyword::Func))?;
            native = self.match_token(&TokenKind::Keyword(Keyword::Native))?;
        }
        let params = self.parse_params()?;
        let body = self.parse_expression()?;
        let id = self.new_func_id();
        Ok(Node::new(
            Expr::Func(FuncLit { id, params, body: body.boxed(), native, name }),
            self.span_from(start),
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.consume(&TokenKind::punct(Punctuation::LParen))?;
        let mut params = Vec::new();
        if self.match_token(&TokenKind::punct(Punctuation::RParen))? {
            return Ok(params);
        }
        loop {
            let start = self.current.span;
            let mut ty = None;
            if matches!(self.current.kind, TokenKind::Identifier(_))
                && matches!(self.peek_next()?.kind, TokenKind::Identifier(_))
            {
                ty = Some(self.consume_identifier()?.0);
            }
            let (name, _) = self.consume_identifier()?;
            params.push(Param { name, ty, span: self.span_from(start) });
            if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                break;
            }
        }
        self.consume(&TokenKind::punct(Punctuation::RParen))?;
        Ok(params)
    }
}

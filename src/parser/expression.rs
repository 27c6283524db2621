// In src/parser/expression.rs
//
// Operator expressions are parsed by a shift-reduce engine driven by the
// precedence table below: operands and pending operators live on two explicit
// stacks, and an incoming operator first reduces every pending operator that
// binds at least as tightly.

use super::ast::*;
use super::main::{Parser, StatementParser, Util};
use crate::diagnostics::codes::E1005_INT_OUT_OF_RANGE;
use crate::diagnostics::CompileError;
use crate::lexer::*;
use crate::utils::Span;
use crate::value::{Symbol, Value, MAX_INT, MIN_INT};

// --- 1. Precedence table ---

const PREC_ASSIGN: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_NOT: u8 = 4;
const PREC_RELATIONAL: u8 = 5;
const PREC_EXISTS: u8 = 6;
const PREC_CONCAT: u8 = 7;
const PREC_ADDITIVE: u8 = 8;
const PREC_MULTIPLICATIVE: u8 = 9;
const PREC_SHIFT: u8 = 10;
const PREC_NEGATE: u8 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfixKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
    Assign,
}

/// (operator, precedence, right-associative)
fn infix_operator(kind: &TokenKind) -> Option<(InfixKind, u8, bool)> {
    use InfixKind::*;
    let entry = match kind {
        TokenKind::Operator(op) => match op {
            Operator::Assign => (Assign, PREC_ASSIGN, true),
            Operator::Eq => (Binary(BinaryOp::Equal), PREC_RELATIONAL, false),
            Operator::NotEq => (Binary(BinaryOp::NotEqual), PREC_RELATIONAL, false),
            Operator::Lt => (Binary(BinaryOp::Less), PREC_RELATIONAL, false),
            Operator::Gt => (Binary(BinaryOp::Greater), PREC_RELATIONAL, false),
            Operator::LtEq => (Binary(BinaryOp::LessEqual), PREC_RELATIONAL, false),
            Operator::GtEq => (Binary(BinaryOp::GreaterEqual), PREC_RELATIONAL, false),
            Operator::Amp => (Binary(BinaryOp::Concat), PREC_CONCAT, false),
            Operator::AmpAmp => (Binary(BinaryOp::ConcatSpace), PREC_CONCAT, false),
            Operator::Plus => (Binary(BinaryOp::Add), PREC_ADDITIVE, false),
            Operator::Minus => (Binary(BinaryOp::Sub), PREC_ADDITIVE, false),
            Operator::Star => (Binary(BinaryOp::Mul), PREC_MULTIPLICATIVE, false),
            Operator::Slash => (Binary(BinaryOp::Div), PREC_MULTIPLICATIVE, false),
            Operator::Shl => (Binary(BinaryOp::ShiftLeft), PREC_SHIFT, false),
            Operator::Shr => (Binary(BinaryOp::ShiftRight), PREC_SHIFT, false),
            _ => return None,
        },
        TokenKind::Keyword(Keyword::Or) => (Logical(LogicalOp::Or), PREC_OR, false),
        TokenKind::Keyword(Keyword::And) => (Logical(LogicalOp::And), PREC_AND, false),
        TokenKind::Keyword(Keyword::Div) => (Binary(BinaryOp::IntDiv), PREC_MULTIPLICATIVE, false),
        TokenKind::Keyword(Keyword::Mod) => (Binary(BinaryOp::Mod), PREC_MULTIPLICATIVE, false),
        _ => return None,
    };
    Some(entry)
}

fn prefix_operator(kind: &TokenKind) -> Option<(UnaryOp, u8)> {
    match kind {
        TokenKind::Operator(Operator::Minus) => Some((UnaryOp::Negate, PREC_NEGATE)),
        TokenKind::Keyword(Keyword::Not) => Some((UnaryOp::Not, PREC_NOT)),
        _ => None,
    }
}

/// An operator waiting on the operator stack.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Infix { op: InfixKind, prec: u8, span: Span },
    Prefix { op: UnaryOp, prec: u8, span: Span },
}

impl Pending {
    fn prec(&self) -> u8 {
        match self {
            Pending::Infix { prec, .. } | Pending::Prefix { prec, .. } => *prec,
        }
    }
}

// --- 2. Trait ---

pub(super) trait ExpressionParser {
    fn parse_expression(&mut self) -> Result<Node, CompileError>;
    /// Prefix operators are handled by the caller; this parses a primary plus its postfix chain.
    fn parse_operand(&mut self) -> Result<Node, CompileError>;
    fn parse_primary(&mut self) -> Result<Node, CompileError>;
    fn parse_postfix(&mut self, node: Node) -> Result<Node, CompileError>;
    fn parse_args(&mut self) -> Result<Vec<Node>, CompileError>;
    fn parse_array_constructor(&mut self) -> Result<Node, CompileError>;
    fn parse_frame_constructor(&mut self) -> Result<Node, CompileError>;
    fn parse_quoted(&mut self) -> Result<Value, CompileError>;
    fn literal_value(&mut self, literal: Literal) -> Value;
    /// Whether the current token is the magnitude of the smallest integer.
    fn at_min_int_magnitude(&self) -> bool;
    /// Integer tokens may exceed the positive range by one; only a negation makes that valid.
    fn check_int_range(&self, literal: &Literal) -> Result<(), CompileError>;
    fn can_start_expression(&self) -> bool;
}

fn reduce(operands: &mut Vec<Node>, op: Pending) {
    match op {
        Pending::Prefix { op, span, .. } => {
            if let Some(operand) = operands.pop() {
                let span = span.to(operand.span);
                operands.push(Node::new(Expr::Unary { op, operand: operand.boxed() }, span));
            }
        }
        Pending::Infix { op, .. } => {
            let (Some(rhs), Some(lhs)) = (operands.pop(), operands.pop()) else {
                return;
            };
            let span = lhs.span.to(rhs.span);
            let kind = match op {
                InfixKind::Binary(op) => Expr::Binary { op, lhs: lhs.boxed(), rhs: rhs.boxed() },
                InfixKind::Logical(op) => Expr::Logical { op, lhs: lhs.boxed(), rhs: rhs.boxed() },
                InfixKind::Assign => Expr::Assign { target: lhs.boxed(), value: rhs.boxed() },
            };
            operands.push(Node::new(kind, span));
        }
    }
}

// --- 3. Shift-reduce engine ---

impl<'a> ExpressionParser for Parser<'a> {
    fn parse_expression(&mut self) -> Result<Node, CompileError> {
        let mut operands: Vec<Node> = Vec::with_capacity(4);
        let mut operators: Vec<Pending> = Vec::with_capacity(4);

        loop {
            // shift prefix operators
            while let Some((op, prec)) = prefix_operator(&self.current.kind) {
                let span = self.advance()?.span;
                operators.push(Pending::Prefix { op, prec, span });
            }
            // `-536870912` is the only way to write the smallest integer
            let operand = match operators.last() {
                Some(&Pending::Prefix { op: UnaryOp::Negate, span, .. }) if self.at_min_int_magnitude() => {
                    operators.pop();
                    let literal = self.advance()?.span;
                    Node::new(Expr::Literal(Value::Int(MIN_INT)), span.to(literal))
                }
                _ => self.parse_operand()?,
            };
            operands.push(operand);

            // postfix `exists`
            while self.current.kind == TokenKind::Keyword(Keyword::Exists) {
                while operators.last().is_some_and(|top| top.prec() > PREC_EXISTS) {
                    if let Some(op) = operators.pop() {
                        reduce(&mut operands, op);
                    }
                }
                let span = self.advance()?.span;
                if let Some(operand) = operands.pop() {
                    let span = operand.span.to(span);
                    operands.push(Node::new(Expr::Exists(operand.boxed()), span));
                }
            }

            let Some((op, prec, right_assoc)) = infix_operator(&self.current.kind) else {
                break;
            };
            while let Some(top) = operators.last() {
                let top_prec = top.prec();
                if top_prec > prec || (top_prec == prec && !right_assoc) {
                    if let Some(op) = operators.pop() {
                        reduce(&mut operands, op);
                    }
                } else {
                    break;
                }
            }
            let span = self.advance()?.span;
            operators.push(Pending::Infix { op, prec, span });
        }

        while let Some(op) = operators.pop() {
            reduce(&mut operands, op);
        }
        match operands.pop() {
            Some(node) if operands.is_empty() => Ok(node),
            _ => {
                self.expect_description("expression");
                Err(self.unexpected())
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Node, CompileError> {
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> Result<Node, CompileError> {
        let start = self.current.span;
        match self.current.kind.clone() {
            TokenKind::Literal(literal) => {
                self.check_int_range(&literal)?;
                self.advance()?;
                let value = self.literal_value(literal);
                Ok(Node::new(Expr::Literal(value), start))
            }
            TokenKind::Identifier(name) => {
                self.advance()?;
                if self.current.kind == TokenKind::punct(Punctuation::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Node::new(Expr::Call { name, args }, self.span_from(start)));
                }
                Ok(Node::new(Expr::Name(name), start))
            }
            TokenKind::Keyword(Keyword::SelfKw) => {
                self.advance()?;
                Ok(Node::new(Expr::SelfRef, start))
            }
            TokenKind::Keyword(kw) => self.parse_keyword_form(kw),
            TokenKind::Punctuation(Punctuation::LParen) => {
                self.advance()?;
                let mut inner = self.parse_expression()?;
                self.consume(&TokenKind::punct(Punctuation::RParen))?;
                inner.span = self.span_from(start);
                Ok(inner)
            }
            TokenKind::Punctuation(Punctuation::LBracket) => self.parse_array_constructor(),
            TokenKind::Punctuation(Punctuation::LBrace) => self.parse_frame_constructor(),
            TokenKind::Punctuation(Punctuation::Quote) => {
                self.advance()?;
                let value = self.parse_quoted()?;
                Ok(Node::new(Expr::Literal(value), self.span_from(start)))
            }
            TokenKind::Operator(op @ (Operator::Colon | Operator::ColonQ)) => {
                // send to the implicit receiver
                self.advance()?;
                let (message, _) = self.consume_identifier()?;
                let args = self.parse_args()?;
                Ok(Node::new(
                    Expr::Send { receiver: None, message, args, may_be_undefined: op == Operator::ColonQ },
                    self.span_from(start),
                ))
            }
            _ => {
                self.expect_description("expression");
                Err(self.unexpected())
            }
        }
    }

    fn parse_postfix(&mut self, mut node: Node) -> Result<Node, CompileError> {
        loop {
            let start = node.span;
            node = match self.current.kind {
                TokenKind::Operator(Operator::Dot) => {
                    self.advance()?;
                    let key = if self.match_token(&TokenKind::punct(Punctuation::LParen))? {
                        let key = self.parse_expression()?;
                        self.consume(&TokenKind::punct(Punctuation::RParen))?;
                        PathKey::Expr(key.boxed())
                    } else {
                        PathKey::Slot(self.consume_identifier()?.0)
                    };
                    Node::new(Expr::Path { object: node.boxed(), key }, self.span_from(start))
                }
                TokenKind::Operator(op @ (Operator::Colon | Operator::ColonQ)) => {
                    self.advance()?;
                    let (message, _) = self.consume_identifier()?;
                    let args = self.parse_args()?;
                    Node::new(
                        Expr::Send {
                            receiver: Some(node.boxed()),
                            message,
                            args,
                            may_be_undefined: op == Operator::ColonQ,
                        },
                        self.span_from(start),
                    )
                }
                TokenKind::Punctuation(Punctuation::LBracket) => {
                    self.advance()?;
                    let index = self.parse_expression()?;
                    self.consume(&TokenKind::punct(Punctuation::RBracket))?;
                    Node::new(Expr::Index { object: node.boxed(), index: index.boxed() }, self.span_from(start))
                }
                _ => return Ok(node),
            };
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Node>, CompileError> {
        self.consume(&TokenKind::punct(Punctuation::LParen))?;
        let mut args = Vec::new();
        if self.match_token(&TokenKind::punct(Punctuation::RParen))? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                break;
            }
        }
        self.consume(&TokenKind::punct(Punctuation::RParen))?;
        Ok(args)
    }

    /// `[class: e1, e2]` or `[e1, e2]`.
    fn parse_array_constructor(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let mut class = None;
        if matches!(self.current.kind, TokenKind::Identifier(_))
            && self.peek_next()?.kind == TokenKind::op(Operator::Colon)
        {
            class = Some(self.consume_identifier()?.0);
            self.advance()?;
        }
        let mut elements = Vec::new();
        if !self.match_token(&TokenKind::punct(Punctuation::RBracket))? {
            loop {
                elements.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                    break;
                }
            }
            self.consume(&TokenKind::punct(Punctuation::RBracket))?;
        }
        Ok(Node::new(Expr::MakeArray { class, elements }, self.span_from(start)))
    }

    fn parse_frame_constructor(&mut self) -> Result<Node, CompileError> {
        let start = self.advance()?.span;
        let mut slots = Vec::new();
        if !self.match_token(&TokenKind::punct(Punctuation::RBrace))? {
            loop {
                let (name, _) = self.consume_identifier()?;
                self.consume(&TokenKind::op(Operator::Colon))?;
                let value = self.parse_expression()?;
                slots.push((name, value));
                if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                    break;
                }
            }
            self.consume(&TokenKind::punct(Punctuation::RBrace))?;
        }
        Ok(Node::new(Expr::MakeFrame(slots), self.span_from(start)))
    }

    /// The object following a `'`. Inside a quote bare words are symbols.
    fn parse_quoted(&mut self) -> Result<Value, CompileError> {
        let token = self.current.kind.clone();
        match token {
            TokenKind::Identifier(sym) => {
                self.advance()?;
                Ok(Value::Symbol(sym))
            }
            TokenKind::Keyword(kw) => {
                self.advance()?;
                Ok(Value::Symbol(self.store().intern(kw.as_str())))
            }
            TokenKind::Literal(literal) => {
                self.check_int_range(&literal)?;
                self.advance()?;
                Ok(self.literal_value(literal))
            }
            TokenKind::Punctuation(Punctuation::Quote) => {
                self.advance()?;
                self.parse_quoted()
            }
            TokenKind::Operator(Operator::Minus) => {
                self.advance()?;
                match self.current.kind.clone() {
                    TokenKind::Literal(Literal::Integer(n)) => {
                        self.advance()?;
                        Ok(Value::Int(-n))
                    }
                    TokenKind::Literal(Literal::Real(r)) => {
                        self.advance()?;
                        Ok(self.store().make_real(-r))
                    }
                    _ => {
                        self.expect_description("number");
                        Err(self.unexpected())
                    }
                }
            }
            TokenKind::Punctuation(Punctuation::LBracket) => {
                self.advance()?;
                let mut class: Option<Symbol> = None;
                if matches!(self.current.kind, TokenKind::Identifier(_))
                    && self.peek_next()?.kind == TokenKind::op(Operator::Colon)
                {
                    class = Some(self.consume_identifier()?.0);
                    self.advance()?;
                }
                let mut elements = Vec::new();
                if !self.match_token(&TokenKind::punct(Punctuation::RBracket))? {
                    loop {
                        elements.push(self.parse_quoted()?);
                        if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                            break;
                        }
                    }
                    self.consume(&TokenKind::punct(Punctuation::RBracket))?;
                }
                let class = match class {
                    Some(class) => class,
                    None => self.store().intern("array"),
                };
                Ok(self.store().make_array(class, elements))
            }
            TokenKind::Punctuation(Punctuation::LBrace) => {
                self.advance()?;
                let mut slots = Vec::new();
                let mut values = Vec::new();
                if !self.match_token(&TokenKind::punct(Punctuation::RBrace))? {
                    loop {
                        let (name, _) = self.consume_identifier()?;
                        self.consume(&TokenKind::op(Operator::Colon))?;
                        slots.push(name);
                        values.push(self.parse_quoted()?);
                        if !self.match_token(&TokenKind::punct(Punctuation::Comma))? {
                            break;
                        }
                    }
                    self.consume(&TokenKind::punct(Punctuation::RBrace))?;
                }
                Ok(self.store().make_frame(slots, values))
            }
            _ => {
                self.expect_description("literal");
                Err(self.unexpected())
            }
        }
    }

    fn at_min_int_magnitude(&self) -> bool {
        matches!(self.current.kind, TokenKind::Literal(Literal::Integer(n)) if i64::from(n) == -i64::from(MIN_INT))
    }

    fn check_int_range(&self, literal: &Literal) -> Result<(), CompileError> {
        match literal {
            Literal::Integer(n) if *n > MAX_INT => Err(CompileError::new(
                &E1005_INT_OUT_OF_RANGE,
                self.file_name(),
                self.current.span,
            )
            .with_message(format!("Integer literal `{}` out of range", n))),
            _ => Ok(()),
        }
    }

    fn literal_value(&mut self, literal: Literal) -> Value {
        match literal {
            Literal::Integer(n) => Value::Int(n),
            Literal::Real(r) => self.store().make_real(r),
            Literal::Char(c) => Value::Char(c),
            Literal::String(s) => self.store().make_string(&s),
            Literal::MagicPointer(n) => Value::MagicPointer(n),
            Literal::Nil => Value::Nil,
            Literal::True => Value::True,
        }
    }

    fn can_start_expression(&self) -> bool {
        match &self.current.kind {
            TokenKind::Literal(_) | TokenKind::Identifier(_) => true,
            TokenKind::Punctuation(p) => matches!(
                p,
                Punctuation::LParen | Punctuation::LBracket | Punctuation::LBrace | Punctuation::Quote
            ),
            TokenKind::Operator(op) => matches!(op, Operator::Minus | Operator::Colon | Operator::ColonQ),
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::Not
                    | Keyword::SelfKw
                    | Keyword::If
                    | Keyword::Loop
                    | Keyword::While
                    | Keyword::Repeat
                    | Keyword::For
                    | Keyword::Foreach
                    | Keyword::Try
                    | Keyword::Begin
                    | Keyword::Local
                    | Keyword::Constant
                    | Keyword::Global
                    | Keyword::Func
                    | Keyword::Break
                    | Keyword::Return
                    | Keyword::Call
                    | Keyword::Inherited
            ),
            TokenKind::Eof => false,
        }
    }
}

use crate::utils::Span;
use crate::value::Symbol;
use std::fmt::{Display, Formatter, Result};

/// 主体 Token 定义，包含其种类和在源代码中的位置。
/// A token together with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    /// 文件结束标志。
    Eof,

    /// A bare or bar-delimited name, already interned.
    Identifier(Symbol),

    Literal(Literal),

    Keyword(Keyword),

    Operator(Operator),

    Punctuation(Punctuation),
}

impl TokenKind {
    /// A short description for error messages.
    pub fn to_string_for_error(&self) -> String {
        match self {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Identifier(s) => format!("identifier `{}`", s),
            TokenKind::Literal(l) => format!("literal `{}`", l),
            TokenKind::Keyword(k) => format!("`{}`", k),
            TokenKind::Operator(o) => format!("`{}`", o),
            TokenKind::Punctuation(p) => format!("`{}`", p),
        }
    }

    pub fn keyword(k: Keyword) -> Self {
        TokenKind::Keyword(k)
    }

    pub fn op(o: Operator) -> Self {
        TokenKind::Operator(o)
    }

    pub fn punct(p: Punctuation) -> Self {
        TokenKind::Punctuation(p)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Literal(l) => write!(f, "{}", l),
            TokenKind::Keyword(k) => write!(f, "{}", k),
            TokenKind::Operator(o) => write!(f, "{}", o),
            TokenKind::Punctuation(p) => write!(f, "{}", p),
        }
    }
}

// --- Keywords ---

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Keyword {
    And,
    Begin,
    Break,
    By,
    Call,
    Collect,
    Constant,
    Deeply,
    Div,
    Do,
    Else,
    End,
    Exists,
    For,
    Foreach,
    Func,
    Global,
    If,
    In,
    Inherited,
    Local,
    Loop,
    Mod,
    Native,
    Not,
    OnException,
    Or,
    Repeat,
    Return,
    SelfKw,
    Then,
    To,
    Try,
    Until,
    While,
    With,
}

/// Reserved words, sorted so they can be binary-searched.
pub const RESERVED_WORDS: &[(&str, Keyword)] = &[
    ("and", Keyword::And),
    ("begin", Keyword::Begin),
    ("break", Keyword::Break),
    ("by", Keyword::By),
    ("call", Keyword::Call),
    ("collect", Keyword::Collect),
    ("constant", Keyword::Constant),
    ("deeply", Keyword::Deeply),
    ("div", Keyword::Div),
    ("do", Keyword::Do),
    ("else", Keyword::Else),
    ("end", Keyword::End),
    ("exists", Keyword::Exists),
    ("for", Keyword::For),
    ("foreach", Keyword::Foreach),
    ("func", Keyword::Func),
    ("global", Keyword::Global),
    ("if", Keyword::If),
    ("in", Keyword::In),
    ("inherited", Keyword::Inherited),
    ("local", Keyword::Local),
    ("loop", Keyword::Loop),
    ("mod", Keyword::Mod),
    ("native", Keyword::Native),
    ("not", Keyword::Not),
    ("onexception", Keyword::OnException),
    ("or", Keyword::Or),
    ("repeat", Keyword::Repeat),
    ("return", Keyword::Return),
    ("self", Keyword::SelfKw),
    ("then", Keyword::Then),
    ("to", Keyword::To),
    ("try", Keyword::Try),
    ("until", Keyword::Until),
    ("while", Keyword::While),
    ("with", Keyword::With),
];

impl Keyword {
    /// Looks `s` up in the reserved-word table, ignoring case.
    pub fn lookup(s: &str) -> Option<Keyword> {
        let lower = s.to_ascii_lowercase();
        RESERVED_WORDS
            .binary_search_by(|(word, _)| (*word).cmp(lower.as_str()))
            .ok()
            .map(|i| RESERVED_WORDS[i].1)
    }

    pub fn as_str(self) -> &'static str {
        RESERVED_WORDS
            .iter()
            .find(|(_, k)| *k == self)
            .map_or("?", |(word, _)| word)
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Literals ---

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Integer(i32),
    Real(f64),
    /// A 16-bit unicode character.
    Char(u16),
    String(String),
    MagicPointer(i32),
    Nil,
    True,
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Real(r) => write!(f, "{}", r),
            Literal::Char(c) => write!(f, "$\\u{:04X}", c),
            Literal::String(s) => write!(f, "\"{}\"", s),
            Literal::MagicPointer(n) => write!(f, "@{}", n),
            Literal::Nil => write!(f, "nil"),
            Literal::True => write!(f, "true"),
        }
    }
}

// --- Operators ---

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Operator {
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Amp,     // &
    AmpAmp,  // &&
    Eq,      // =
    NotEq,   // <>
    Lt,      // <
    Gt,      // >
    LtEq,    // <=
    GtEq,    // >=
    Shl,     // <<
    Shr,     // >>
    Assign,  // :=
    Dot,     // .
    Colon,   // :
    ColonQ,  // :?
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let s = match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Amp => "&",
            Operator::AmpAmp => "&&",
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Assign => ":=",
            Operator::Dot => ".",
            Operator::Colon => ":",
            Operator::ColonQ => ":?",
        };
        write!(f, "{}", s)
    }
}

// --- Punctuation ---

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Punctuation {
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Semicolon, // ;
    Quote,     // '
}

impl Display for Punctuation {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let s = match self {
            Punctuation::LParen => "(",
            Punctuation::RParen => ")",
            Punctuation::LBrace => "{",
            Punctuation::RBrace => "}",
            Punctuation::LBracket => "[",
            Punctuation::RBracket => "]",
            Punctuation::Comma => ",",
            Punctuation::Semicolon => ";",
            Punctuation::Quote => "'",
        };
        write!(f, "{}", s)
    }
}

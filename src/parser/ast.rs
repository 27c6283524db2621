use crate::utils::Span;
use crate::value::{Symbol, Value};

// --- 1. 核心 AST 节点 ---

/// A PT node: a kind tag with its operands, plus the source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr,
    pub span: Span,
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }
}

/// Identifies one function literal across all passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

// --- 2. Operators ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    /// `&`
    Concat,
    /// `&&`, concatenation with a space between.
    ConcatSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

// --- 3. Operand records ---

#[derive(Debug, Clone, PartialEq)]
pub enum PathKey {
    /// `obj.slot`
    Slot(Symbol),
    /// `obj.(expr)`
    Expr(Box<Node>),
}

/// One name in a `local` or `constant` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Symbol,
    /// Optional type annotation; parsed, never enforced.
    pub ty: Option<Symbol>,
    pub value: Option<Box<Node>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Symbol,
    pub ty: Option<Symbol>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub id: FuncId,
    pub params: Vec<Param>,
    pub body: Box<Node>,
    pub native: bool,
    /// Set for `global name(...)` definitions.
    pub name: Option<Symbol>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    /// Exception name set, e.g. `|evt.ex.fr|`.
    pub exception: Symbol,
    pub body: Box<Node>,
}

// --- 4. Node kinds ---

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(Symbol),
    SelfRef,
    Begin(Vec<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Exists(Box<Node>),
    Path {
        object: Box<Node>,
        key: PathKey,
    },
    Index {
        object: Box<Node>,
        index: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Local(Vec<Binding>),
    Constant(Vec<Binding>),
    Global {
        name: Symbol,
        value: Option<Box<Node>>,
    },
    GlobalFunc {
        name: Symbol,
        func: Box<Node>,
    },
    Func(FuncLit),
    /// `name(args)`: call of a global function.
    Call {
        name: Symbol,
        args: Vec<Node>,
    },
    /// `call f with (args)`
    Invoke {
        func: Box<Node>,
        args: Vec<Node>,
    },
    Send {
        receiver: Option<Box<Node>>,
        message: Symbol,
        args: Vec<Node>,
        may_be_undefined: bool,
    },
    /// `inherited:msg(args)`
    Resend {
        message: Symbol,
        args: Vec<Node>,
        may_be_undefined: bool,
    },
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Loop(Box<Node>),
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    Repeat {
        body: Box<Node>,
        cond: Box<Node>,
    },
    For {
        var: Symbol,
        start: Box<Node>,
        limit: Box<Node>,
        step: Option<Box<Node>>,
        body: Box<Node>,
    },
    Foreach {
        key: Option<Symbol>,
        value: Symbol,
        deeply: bool,
        collection: Box<Node>,
        collect: bool,
        body: Box<Node>,
    },
    Try {
        body: Box<Node>,
        handlers: Vec<Handler>,
    },
    Break(Option<Box<Node>>),
    Return(Option<Box<Node>>),
    MakeArray {
        class: Option<Symbol>,
        elements: Vec<Node>,
    },
    MakeFrame(Vec<(Symbol, Node)>),
}

// --- 5. Traversal table ---

impl Node {
    /// Visits every direct sub-node in source order. Function literals are
    /// leaves here; passes that descend into them do so explicitly.
    pub fn for_each_child<E>(&self, mut f: impl FnMut(&Node) -> Result<(), E>) -> Result<(), E> {
        match &self.kind {
            Expr::Literal(_) | Expr::Name(_) | Expr::SelfRef | Expr::Func(_) => Ok(()),
            Expr::Begin(items) => items.iter().try_for_each(f),
            Expr::Unary { operand, .. } => f(operand),
            Expr::Exists(operand) | Expr::Loop(operand) => f(operand),
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                f(lhs)?;
                f(rhs)
            }
            Expr::Path { object, key } => {
                f(object)?;
                match key {
                    PathKey::Slot(_) => Ok(()),
                    PathKey::Expr(e) => f(e),
                }
            }
            Expr::Index { object, index } => {
                f(object)?;
                f(index)
            }
            Expr::Assign { target, value } => {
                f(target)?;
                f(value)
            }
            Expr::Local(bindings) | Expr::Constant(bindings) => bindings
                .iter()
                .filter_map(|b| b.value.as_deref())
                .try_for_each(f),
            Expr::Global { value, .. } => value.as_deref().map_or(Ok(()), f),
            Expr::GlobalFunc { func, .. } => f(func),
            Expr::Call { args, .. } | Expr::Resend { args, .. } => args.iter().try_for_each(f),
            Expr::Invoke { func, args } => {
                args.iter().try_for_each(&mut f)?;
                f(func)
            }
            Expr::Send { receiver, args, .. } => {
                args.iter().try_for_each(&mut f)?;
                receiver.as_deref().map_or(Ok(()), f)
            }
            Expr::If { cond, then_branch, else_branch } => {
                f(cond)?;
                f(then_branch)?;
                else_branch.as_deref().map_or(Ok(()), f)
            }
            Expr::While { cond, body } => {
                f(cond)?;
                f(body)
            }
            Expr::Repeat { body, cond } => {
                f(body)?;
                f(cond)
            }
            Expr::For { start, limit, step, body, .. } => {
                f(start)?;
                f(limit)?;
                if let Some(step) = step {
                    f(step)?;
                }
                f(body)
            }
            Expr::Foreach { collection, body, .. } => {
                f(collection)?;
                f(body)
            }
            Expr::Try { body, handlers } => {
                f(body)?;
                handlers.iter().try_for_each(|h| f(&h.body))
            }
            Expr::Break(value) | Expr::Return(value) => value.as_deref().map_or(Ok(()), f),
            Expr::MakeArray { elements, .. } => elements.iter().try_for_each(f),
            Expr::MakeFrame(slots) => slots.iter().try_for_each(|(_, v)| f(v)),
        }
    }

    /// True for nodes whose evaluation has no effect besides producing a value.
    pub fn is_pure(&self) -> bool {
        match &self.kind {
            Expr::Literal(_) | Expr::Name(_) | Expr::SelfRef | Expr::Func(_) => true,
            Expr::Unary { operand, .. } | Expr::Exists(operand) => operand.is_pure(),
            Expr::Binary { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                lhs.is_pure() && rhs.is_pure()
            }
            Expr::Path { object, key } => {
                object.is_pure()
                    && match key {
                        PathKey::Slot(_) => true,
                        PathKey::Expr(e) => e.is_pure(),
                    }
            }
            Expr::Index { object, index } => object.is_pure() && index.is_pure(),
            Expr::MakeArray { elements, .. } => elements.iter().all(Node::is_pure),
            Expr::MakeFrame(slots) => slots.iter().all(|(_, v)| v.is_pure()),
            _ => false,
        }
    }
}

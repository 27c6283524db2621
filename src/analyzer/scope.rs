//! Scope records, one per function literal plus the top level.
//!
//! Scopes live in an arena (`Unit::scopes`) and point at their parent by
//! index, so the chain mirrors lexical nesting without shared ownership.

use std::collections::{HashMap, HashSet};

use crate::parser::ast::FuncId;
use crate::utils::Span;
use crate::value::{Symbol, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Slot of the function's own frame or stack area.
    Local,
    /// Local that a nested function refers to; kept in the heap frame.
    ClosedOver,
    /// Searched for at run time through the lexical and receiver chain.
    Environment,
}

/// How a name resolves from some scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Index into the scope's `args ++ locals`.
    Slot(usize),
    Constant(Value),
    /// Variable of an enclosing function, reached through the lexical frame.
    Outer,
    Environment,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Name of a global function, for debug tables.
    pub name: Option<Symbol>,
    pub native: bool,
    pub span: Span,
    pub args: Vec<Symbol>,
    pub locals: Vec<Symbol>,
    /// Local constants declared in this scope. Lookups continue in the parent.
    pub constants: HashMap<Symbol, Value>,
    pub locations: HashMap<Symbol, Location>,
    /// Reference counts of this scope's own variables.
    pub references: HashMap<Symbol, u32>,
    /// `for` indexes; stack-only unless also declared with `local`.
    pub loop_indices: HashSet<Symbol>,
    pub explicit_locals: HashSet<Symbol>,
    /// Needs the caller's receiver/method context (`self`, implicit sends, `inherited`).
    pub uses_self: bool,
    /// Refers to variables owned by an enclosing function.
    pub captures_outer: bool,
    /// A nested function refers to one of this scope's variables.
    pub has_closed_over: bool,
}

impl Scope {
    pub fn new(parent: Option<ScopeId>, span: Span) -> Self {
        Self {
            parent,
            name: None,
            native: false,
            span,
            args: Vec::new(),
            locals: Vec::new(),
            constants: HashMap::new(),
            locations: HashMap::new(),
            references: HashMap::new(),
            loop_indices: HashSet::new(),
            explicit_locals: HashSet::new(),
            uses_self: false,
            captures_outer: false,
            has_closed_over: false,
        }
    }

    /// A `for` index that is neither an argument nor declared with `local`.
    pub fn is_bare_loop_index(&self, name: &Symbol) -> bool {
        self.loop_indices.contains(name) && !self.explicit_locals.contains(name) && !self.args.contains(name)
    }

    pub fn owns(&self, name: &Symbol) -> bool {
        self.args.contains(name) || self.locals.contains(name)
    }

    /// Position of `name` in `args ++ locals`.
    pub fn slot_of(&self, name: &Symbol) -> Option<usize> {
        self.args
            .iter()
            .chain(self.locals.iter())
            .position(|n| n == name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Symbol> {
        self.args.iter().chain(self.locals.iter())
    }
}

/// All scope records of one top-level command.
#[derive(Debug, Clone)]
pub struct Unit {
    pub scopes: Vec<Scope>,
    pub by_func: HashMap<FuncId, ScopeId>,
}

impl Unit {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn new(span: Span) -> Self {
        Self { scopes: vec![Scope::new(None, span)], by_func: HashMap::new() }
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn root(&self) -> &Scope {
        self.scope(Self::ROOT)
    }

    pub fn push_scope(&mut self, scope: Scope) -> ScopeId {
        self.scopes.push(scope);
        ScopeId(self.scopes.len() - 1)
    }

    pub fn scope_for(&self, func: FuncId) -> Option<ScopeId> {
        self.by_func.get(&func).copied()
    }

    /// Iterates `id` and its ancestors, innermost first.
    pub fn chain(&self, id: ScopeId) -> impl Iterator<Item = (ScopeId, &Scope)> {
        std::iter::successors(Some(id), move |id| self.scope(*id).parent).map(move |id| (id, self.scope(id)))
    }

    /// Local constant visible from `id`, innermost binding first.
    pub fn lookup_constant(&self, id: ScopeId, name: &Symbol) -> Option<&Value> {
        for (_, scope) in self.chain(id) {
            if scope.owns(name) {
                return None;
            }
            if let Some(v) = scope.constants.get(name) {
                return Some(v);
            }
        }
        None
    }

    /// Resolves a name as pass 3 sees it. Global constants are the
    /// caller's business; `Environment` means no function in the chain
    /// declares the name.
    pub fn resolve(&self, id: ScopeId, name: &Symbol) -> Resolved {
        let scope = self.scope(id);
        if let Some(slot) = scope.slot_of(name) {
            return Resolved::Slot(slot);
        }
        if let Some(v) = self.lookup_constant(id, name) {
            return Resolved::Constant(v.clone());
        }
        if self.chain(id).skip(1).any(|(_, outer)| outer.owns(name)) {
            Resolved::Outer
        } else {
            Resolved::Environment
        }
    }
}

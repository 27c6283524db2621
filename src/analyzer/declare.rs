// In src/analyzer/declare.rs
//
// Pass 1: collect arguments, locals, local constants and the synthetic loop
// variables of every function literal.

use log::debug;

use super::scope::{Scope, Unit};
use super::{foreach_iter_name, synthetic_name, Declare, DeclareContext};
use crate::diagnostics::codes::*;
use crate::diagnostics::{CompileError, Diagnostic, DiagnosticBag, Label};
use crate::parser::ast::*;
use crate::store::ObjectStore;
use crate::utils::Span;
use crate::value::{Symbol, Value, MAX_INT, MIN_INT};

/// Runs pass 1 over one top-level tree and returns its scope records.
pub fn walk_declarations(
    tree: &Node,
    store: &mut dyn ObjectStore,
    diagnostics: &mut DiagnosticBag,
    file: &str,
) -> Result<Unit, CompileError> {
    let mut unit = Unit::new(tree.span);
    let mut ctx = DeclareContext { unit: &mut unit, store, diagnostics, file, current: Unit::ROOT };
    tree.declare(&mut ctx)?;
    debug!(
        "pass 1: {} scope(s), {} top-level local(s)",
        unit.scopes.len(),
        unit.root().locals.len()
    );
    Ok(unit)
}

impl Declare for Node {
    fn declare(&self, ctx: &mut DeclareContext<'_>) -> Result<(), CompileError> {
        match &self.kind {
            Expr::Local(bindings) => {
                for b in bindings {
                    if let Some(value) = &b.value {
                        value.declare(ctx)?;
                    }
                    if ctx.scope().constants.contains_key(&b.name) {
                        return Err(local_constant_clash(ctx, &b.name, b.span));
                    }
                    ctx.add_local(&b.name, b.span, true);
                    ctx.scope_mut().explicit_locals.insert(b.name.clone());
                }
                Ok(())
            }
            Expr::Constant(bindings) => {
                for b in bindings {
                    declare_constant(b, ctx)?;
                }
                Ok(())
            }
            Expr::For { var, start, limit, step, body } => {
                start.declare(ctx)?;
                limit.declare(ctx)?;
                if let Some(step) = step {
                    step.declare(ctx)?;
                }
                if ctx.scope().constants.contains_key(var) {
                    return Err(local_constant_clash(ctx, var, self.span));
                }
                ctx.add_local(var, self.span, false);
                for suffix in ["limit", "incr"] {
                    let synthetic = ctx.synthetic(&[var], suffix);
                    ctx.add_local(&synthetic, self.span, false);
                }
                ctx.scope_mut().loop_indices.insert(var.clone());
                body.declare(ctx)
            }
            Expr::Foreach { key, value, collection, collect, body, .. } => {
                collection.declare(ctx)?;
                for name in key.iter().chain(std::iter::once(value)) {
                    if ctx.scope().constants.contains_key(name) {
                        return Err(local_constant_clash(ctx, name, self.span));
                    }
                    ctx.add_local(name, self.span, false);
                }
                let iter = foreach_iter_name(ctx.store, value, key.as_ref());
                ctx.add_local(&iter, self.span, false);
                if *collect {
                    for suffix in ["index", "result", "item"] {
                        let synthetic = ctx.synthetic(&[value], suffix);
                        ctx.add_local(&synthetic, self.span, false);
                    }
                }
                body.declare(ctx)
            }
            Expr::Func(func) => declare_function(func, self.span, ctx),
            _ => self.for_each_child(|child| child.declare(ctx)),
        }
    }
}

fn declare_function(func: &FuncLit, span: Span, ctx: &mut DeclareContext<'_>) -> Result<(), CompileError> {
    let mut scope = Scope::new(Some(ctx.current), span);
    scope.native = func.native;
    scope.name = func.name.clone();
    for param in &func.params {
        if scope.args.contains(&param.name) {
            ctx.diagnostics.report(duplicate_name(&param.name, param.span));
            continue;
        }
        scope.args.push(param.name.clone());
    }
    let id = ctx.unit.push_scope(scope);
    ctx.unit.by_func.insert(func.id, id);

    let outer = std::mem::replace(&mut ctx.current, id);
    let result = func.body.declare(ctx);
    ctx.current = outer;
    result
}

fn declare_constant(b: &Binding, ctx: &mut DeclareContext<'_>) -> Result<(), CompileError> {
    let name = &b.name;
    if ctx.scope().owns(name) {
        return Err(local_constant_clash(ctx, name, b.span));
    }
    if ctx.current == Unit::ROOT && ctx.store.has_global(name) {
        return Err(CompileError::new(&E3002_CONSTANT_GLOBAL_CLASH, ctx.file, b.span)
            .with_value(Value::Symbol(name.clone()))
            .with_message(format!("Constant `{}` has the same name as a global", name)));
    }
    let value = match b.value.as_deref() {
        Some(init) => {
            init.declare(ctx)?;
            constant_value(init, ctx)
        }
        None => None,
    };
    let Some(value) = value else {
        return Err(CompileError::new(&E3003_NON_LITERAL_CONSTANT, ctx.file, b.span)
            .with_value(Value::Symbol(name.clone()))
            .with_message(format!("The value of constant `{}` is not a literal", name)));
    };
    ctx.scope_mut().constants.insert(name.clone(), value);
    Ok(())
}

/// A literal, a bound constant, or a negation of one.
fn constant_value(node: &Node, ctx: &mut DeclareContext<'_>) -> Option<Value> {
    match &node.kind {
        Expr::Literal(v) => Some(v.clone()),
        Expr::Name(name) => {
            if ctx.unit.chain(ctx.current).any(|(_, s)| s.owns(name)) {
                return None;
            }
            match ctx.unit.lookup_constant(ctx.current, name) {
                Some(v) => Some(v.clone()),
                None => ctx.store.global_constant(name),
            }
        }
        Expr::Unary { op: UnaryOp::Negate, operand } => {
            let value = constant_value(operand, ctx)?;
            negate_constant(&value, ctx.store)
        }
        _ => None,
    }
}

/// Folds `-value` for numeric literals.
pub(crate) fn negate_constant(value: &Value, store: &mut dyn ObjectStore) -> Option<Value> {
    match value {
        Value::Int(n) => {
            let negated = n.checked_neg()?;
            (MIN_INT..=MAX_INT).contains(&negated).then_some(Value::Int(negated))
        }
        Value::Real(r) => Some(store.make_real(-r)),
        _ => None,
    }
}

fn local_constant_clash(ctx: &DeclareContext<'_>, name: &Symbol, span: Span) -> CompileError {
    CompileError::new(&E3001_LOCAL_CONSTANT_CLASH, ctx.file, span)
        .with_value(Value::Symbol(name.clone()))
        .with_message(format!("`{}` is declared both as a local and as a constant", name))
}

fn duplicate_name(name: &Symbol, span: Span) -> Diagnostic {
    Diagnostic::warning(&W5001_DUPLICATE_NAME, Label::new(span, "declared again here"))
        .with_dynamic_message(format!("Duplicate name `{}`", name))
}

impl<'a> DeclareContext<'a> {
    fn scope(&self) -> &Scope {
        self.unit.scope(self.current)
    }

    fn scope_mut(&mut self) -> &mut Scope {
        self.unit.scope_mut(self.current)
    }

    /// Adds a local to the current scope. Redeclarations are warned about
    /// only when `warn` is set; loop variables are silently reused.
    fn add_local(&mut self, name: &Symbol, span: Span, warn: bool) {
        if self.scope().owns(name) {
            if warn {
                self.diagnostics.report(duplicate_name(name, span));
            }
            return;
        }
        self.scope_mut().locals.push(name.clone());
    }

    fn synthetic(&mut self, parts: &[&Symbol], suffix: &str) -> Symbol {
        synthetic_name(self.store, parts, suffix)
    }
}

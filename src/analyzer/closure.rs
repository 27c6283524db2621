// In src/analyzer/closure.rs
//
// Pass 2: classify every variable reference as local, closed over or
// dynamic, and propagate the capture flags outward.

use log::debug;

use super::scope::{Location, ScopeId, Unit};
use super::{Classify, ClosureContext};
use crate::diagnostics::codes::E4004_CAPTURED_LOOP_INDEX;
use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::utils::Span;
use crate::value::{Symbol, Value};

/// Runs pass 2 over a tree already walked by pass 1.
pub fn walk_closures(tree: &Node, unit: &mut Unit, file: &str) -> Result<(), CompileError> {
    let mut ctx = ClosureContext { unit, file, current: Unit::ROOT };
    tree.classify(&mut ctx)?;
    finalize_locations(ctx.unit);
    debug!(
        "pass 2: {} closed-over scope(s), {} scope(s) using self",
        ctx.unit.scopes.iter().filter(|s| s.has_closed_over).count(),
        ctx.unit.scopes.iter().filter(|s| s.uses_self).count()
    );
    Ok(())
}

impl Classify for Node {
    fn classify(&self, ctx: &mut ClosureContext<'_>) -> Result<(), CompileError> {
        match &self.kind {
            Expr::Name(name) => ctx.reference(name, self.span),
            Expr::SelfRef => {
                ctx.mark_uses_self();
                Ok(())
            }
            Expr::Send { receiver: None, .. } | Expr::Resend { .. } => {
                ctx.mark_uses_self();
                self.for_each_child(|child| child.classify(ctx))
            }
            Expr::Func(func) => {
                let Some(id) = ctx.unit.scope_for(func.id) else {
                    return Ok(());
                };
                let outer = std::mem::replace(&mut ctx.current, id);
                let result = func.body.classify(ctx);
                ctx.current = outer;
                result
            }
            _ => self.for_each_child(|child| child.classify(ctx)),
        }
    }
}

impl<'a> ClosureContext<'a> {
    fn reference(&mut self, name: &Symbol, span: Span) -> Result<(), CompileError> {
        let chain: Vec<ScopeId> = self.unit.chain(self.current).map(|(id, _)| id).collect();
        for (depth, &id) in chain.iter().enumerate() {
            let scope = self.unit.scope(id);
            if scope.owns(name) {
                if depth == 0 {
                    *self.unit.scope_mut(id).references.entry(name.clone()).or_insert(0) += 1;
                    return Ok(());
                }
                if scope.is_bare_loop_index(name) {
                    return Err(CompileError::new(&E4004_CAPTURED_LOOP_INDEX, self.file, span)
                        .with_value(Value::Symbol(name.clone()))
                        .with_message(format!("Cannot close over the `for` index `{}`", name)));
                }
                let owner = self.unit.scope_mut(id);
                owner.locations.insert(name.clone(), Location::ClosedOver);
                owner.has_closed_over = true;
                for &inner in &chain[..depth] {
                    self.unit.scope_mut(inner).captures_outer = true;
                }
                self.unit
                    .scope_mut(self.current)
                    .locations
                    .insert(name.clone(), Location::Environment);
                return Ok(());
            }
            if scope.constants.contains_key(name) {
                return Ok(());
            }
        }
        self.unit
            .scope_mut(self.current)
            .locations
            .entry(name.clone())
            .or_insert(Location::Environment);
        Ok(())
    }

    /// `self`, implicit sends and `inherited` need the receiver context in
    /// every enclosing function.
    fn mark_uses_self(&mut self) {
        let chain: Vec<ScopeId> = self.unit.chain(self.current).map(|(id, _)| id).collect();
        for id in chain {
            self.unit.scope_mut(id).uses_self = true;
        }
    }
}

/// Every variable not closed over is a plain local.
fn finalize_locations(unit: &mut Unit) {
    for scope in &mut unit.scopes {
        let names: Vec<Symbol> = scope.variables().cloned().collect();
        for name in names {
            scope.locations.entry(name).or_insert(Location::Local);
        }
    }
}

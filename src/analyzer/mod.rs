// In src/analyzer/mod.rs

// 1. 声明所有模块
mod closure;
mod declare;
pub mod frame;
pub mod scope;

#[cfg(test)]
mod test;

// 2. 导入依赖
use crate::diagnostics::{CompileError, DiagnosticBag};
use crate::store::ObjectStore;
use crate::value::Symbol;

pub use closure::walk_closures;
pub use declare::walk_declarations;
pub(crate) use declare::negate_constant;
pub use frame::FrameLayout;
pub use scope::{Location, Resolved, Scope, ScopeId, Unit};

// --- 核心抽象：上下文与 Trait ---

/// State threaded through pass 1.
pub struct DeclareContext<'a> {
    pub unit: &'a mut Unit,
    pub store: &'a mut dyn ObjectStore,
    pub diagnostics: &'a mut DiagnosticBag,
    pub file: &'a str,
    /// Scope of the function literal being walked.
    pub current: ScopeId,
}

/// State threaded through pass 2.
pub struct ClosureContext<'a> {
    pub unit: &'a mut Unit,
    pub file: &'a str,
    pub current: ScopeId,
}

/// Pass 1 over a PT node.
pub trait Declare {
    fn declare(&self, ctx: &mut DeclareContext<'_>) -> Result<(), CompileError>;
}

/// Pass 2 over a PT node.
pub trait Classify {
    fn classify(&self, ctx: &mut ClosureContext<'_>) -> Result<(), CompileError>;
}

// --- Synthetic loop variables ---

/// Builds names like `i|limit`.
pub(crate) fn synthetic_name(store: &mut dyn ObjectStore, parts: &[&Symbol], suffix: &str) -> Symbol {
    let mut name = String::new();
    for part in parts {
        name.push_str(part.as_str());
        name.push('|');
    }
    name.push_str(suffix);
    store.intern(&name)
}

/// `v|iter`, or `v|k|iter` when the loop also binds a key.
pub(crate) fn foreach_iter_name(store: &mut dyn ObjectStore, value: &Symbol, key: Option<&Symbol>) -> Symbol {
    match key {
        Some(key) => synthetic_name(store, &[value, key], "iter"),
        None => synthetic_name(store, &[value], "iter"),
    }
}

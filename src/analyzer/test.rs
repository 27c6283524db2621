// In src/analyzer/test.rs

use super::*;
use crate::config::CompatMode;
use crate::diagnostics::codes::W5001_DUPLICATE_NAME;
use crate::parser::ast::{Expr, Node};
use crate::parser::parse_source;
use crate::store::Heap;
use crate::value::Value;

// --- Test Harness ---

fn parse(src: &str, heap: &mut Heap) -> Node {
    match parse_source(src, "test.ns", heap) {
        Ok(tree) => tree,
        Err(e) => panic!("Test setup failed (parse error): {}", e),
    }
}

/// Runs passes 1 and 2 and returns the scopes plus any warnings.
fn analyze_with(src: &str, heap: &mut Heap) -> (Unit, DiagnosticBag) {
    let tree = parse(src, heap);
    let mut diagnostics = DiagnosticBag::new();
    let mut unit = match walk_declarations(&tree, heap, &mut diagnostics, "test.ns") {
        Ok(unit) => unit,
        Err(e) => panic!("Declaration pass failed unexpectedly: {}", e),
    };
    if let Err(e) = walk_closures(&tree, &mut unit, "test.ns") {
        panic!("Closure pass failed unexpectedly: {}", e);
    }
    (unit, diagnostics)
}

fn analyze_ok(src: &str) -> Unit {
    analyze_with(src, &mut Heap::new()).0
}

fn analyze_err(src: &str) -> CompileError {
    analyze_err_with(src, &mut Heap::new())
}

fn analyze_err_with(src: &str, heap: &mut Heap) -> CompileError {
    let tree = parse(src, heap);
    let mut diagnostics = DiagnosticBag::new();
    let mut unit = match walk_declarations(&tree, heap, &mut diagnostics, "test.ns") {
        Ok(unit) => unit,
        Err(e) => return e,
    };
    match walk_closures(&tree, &mut unit, "test.ns") {
        Ok(()) => panic!("Analysis succeeded, but an error was expected"),
        Err(e) => e,
    }
}

fn names(list: &[Symbol]) -> Vec<String> {
    list.iter().map(|s| s.as_str().to_string()).collect()
}

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

// --- Pass 1 ---

#[test]
fn test_top_level_locals() {
    let unit = analyze_ok("local a := 1, b; local c;");
    assert_eq!(names(&unit.root().locals), vec!["a", "b", "c"]);
    assert!(unit.root().explicit_locals.contains(&sym("b")));
}

#[test]
fn test_for_declares_synthetic_locals() {
    let unit = analyze_ok("for i := 1 to 3 do i");
    assert_eq!(names(&unit.root().locals), vec!["i", "i|limit", "i|incr"]);
    assert!(unit.root().loop_indices.contains(&sym("i")));
}

#[test]
fn test_sequential_for_loops_reuse_locals() {
    let unit = analyze_ok("for i := 1 to 3 do nil; for i := 1 to 3 do nil");
    assert_eq!(unit.root().locals.len(), 3);
}

#[test]
fn test_foreach_declares_iterator_and_collect_locals() {
    let unit = analyze_ok("foreach k, v in x collect v");
    assert_eq!(names(&unit.root().locals), vec!["k", "v", "v|k|iter", "v|index", "v|result", "v|item"]);

    let unit = analyze_ok("foreach v in x do v");
    assert_eq!(names(&unit.root().locals), vec!["v", "v|iter"]);
}

#[test]
fn test_function_scopes_nest() {
    let unit = analyze_ok("func(a, b) begin local c; func(d) d end");
    assert_eq!(unit.scopes.len(), 3);
    let outer = &unit.scopes[1];
    assert_eq!(outer.parent, Some(Unit::ROOT));
    assert_eq!(names(&outer.args), vec!["a", "b"]);
    assert_eq!(names(&outer.locals), vec!["c"]);
    assert_eq!(unit.scopes[2].parent, Some(ScopeId(1)));
}

#[test]
fn test_constants_are_bound_and_chained() {
    let unit = analyze_ok("constant k := 3, m := -k; func() begin constant n := m; n end");
    assert_eq!(unit.root().constants.get(&sym("m")), Some(&Value::Int(-3)));
    let inner = ScopeId(1);
    assert_eq!(unit.lookup_constant(inner, &sym("n")), Some(&Value::Int(-3)));
    assert_eq!(unit.lookup_constant(inner, &sym("k")), Some(&Value::Int(3)));
    assert_eq!(unit.resolve(inner, &sym("k")), Resolved::Constant(Value::Int(3)));
}

#[test]
fn test_inner_local_shadows_outer_constant() {
    let unit = analyze_ok("constant k := 3; func() begin local k := 4; k end");
    assert_eq!(unit.lookup_constant(ScopeId(1), &sym("k")), None);
    assert_eq!(unit.resolve(ScopeId(1), &sym("k")), Resolved::Slot(0));
}

#[test]
fn test_constant_errors() {
    assert_eq!(analyze_err("local x; constant x := 1").number(), 3001);
    assert_eq!(analyze_err("constant x := 1; local x").number(), 3001);
    assert_eq!(analyze_err("constant x := y + 1").number(), 3003);
    assert_eq!(analyze_err("local y; constant x := y").number(), 3003);

    let mut heap = Heap::new();
    heap.define_global("g", Value::Int(1));
    let err = analyze_err_with("constant g := 2", &mut heap);
    assert_eq!(err.number(), 3002);
    assert_eq!(err.value, Some(Value::Symbol(sym("g"))));
}

#[test]
fn test_global_constant_collision_only_at_top_level() {
    let mut heap = Heap::new();
    heap.define_global("g", Value::Int(1));
    let (unit, _) = analyze_with("func() begin constant g := 2; g end", &mut heap);
    assert_eq!(unit.scopes[1].constants.get(&sym("g")), Some(&Value::Int(2)));
}

#[test]
fn test_duplicate_names_warn() {
    let (unit, diagnostics) = analyze_with("func(a, a) begin local b; local b; end", &mut Heap::new());
    assert_eq!(unit.scopes[1].args.len(), 1);
    assert_eq!(unit.scopes[1].locals.len(), 1);
    assert_eq!(diagnostics.warning_count(), 2);
    assert!(diagnostics.iter().all(|d| d.code() == &W5001_DUPLICATE_NAME));
}

// --- Pass 2 ---

#[test]
fn test_reference_to_own_variable_is_local() {
    let unit = analyze_ok("func(x) x + x");
    let f = &unit.scopes[1];
    assert_eq!(f.locations.get(&sym("x")), Some(&Location::Local));
    assert_eq!(f.references.get(&sym("x")), Some(&2));
    assert!(!f.captures_outer);
}

#[test]
fn test_closure_marks_owner_closed_over() {
    let unit = analyze_ok("func(x) func() x");
    let outer = &unit.scopes[1];
    let inner = &unit.scopes[2];
    assert_eq!(outer.locations.get(&sym("x")), Some(&Location::ClosedOver));
    assert!(outer.has_closed_over);
    assert!(inner.captures_outer);
    assert_eq!(inner.locations.get(&sym("x")), Some(&Location::Environment));
}

#[test]
fn test_capture_flags_cover_intermediate_scopes() {
    let unit = analyze_ok("func(x) func() func() x");
    assert!(unit.scopes[2].captures_outer);
    assert!(unit.scopes[3].captures_outer);
    assert!(!unit.scopes[1].captures_outer);
}

#[test]
fn test_unknown_names_are_dynamic() {
    let unit = analyze_ok("func() someGlobal");
    assert_eq!(unit.scopes[1].locations.get(&sym("someGlobal")), Some(&Location::Environment));
}

#[test]
fn test_self_and_implicit_sends_mark_every_enclosing_scope() {
    let unit = analyze_ok("func() func() :foo()");
    assert!(unit.scopes.iter().all(|s| s.uses_self));

    let unit = analyze_ok("func() 1; func() self");
    assert!(!unit.scopes[1].uses_self);
    assert!(unit.scopes[2].uses_self);
}

#[test]
fn test_explicit_send_does_not_need_self() {
    let unit = analyze_ok("func(o) o:foo()");
    assert!(!unit.scopes[1].uses_self);
}

#[test]
fn test_capturing_for_index_fails() {
    let err = analyze_err("for i := 1 to 3 do func() i");
    assert_eq!(err.number(), 4004);
    assert_eq!(err.value, Some(Value::Symbol(sym("i"))));

    let err = analyze_err("func() for j := 1 to 3 do x := func() j + 1");
    assert_eq!(err.number(), 4004);
}

#[test]
fn test_capturing_declared_for_index_is_allowed() {
    let unit = analyze_ok("local i; for i := 1 to 3 do func() i");
    assert_eq!(unit.root().locations.get(&sym("i")), Some(&Location::ClosedOver));
}

#[test]
fn test_capturing_argument_used_as_for_index_is_allowed() {
    let unit = analyze_ok("func(i) begin for i := 1 to 2 do nil; func() i end");
    let outer = unit.scope(ScopeId(1));
    assert_eq!(names(&outer.args), vec!["i"]);
    assert!(outer.loop_indices.contains(&sym("i")));
    assert!(!outer.is_bare_loop_index(&sym("i")));
    assert_eq!(outer.locations.get(&sym("i")), Some(&Location::ClosedOver));
}

#[test]
fn test_outer_variables_resolve_as_outer() {
    let unit = analyze_ok("local x := 1; func() x");
    assert_eq!(unit.resolve(ScopeId(1), &sym("x")), Resolved::Outer);
    assert_eq!(unit.resolve(ScopeId(1), &sym("unknown")), Resolved::Environment);
    assert_eq!(unit.resolve(Unit::ROOT, &sym("x")), Resolved::Slot(0));
}

// --- Frame layout ---

#[test]
fn test_frame_layout_per_mode() {
    let unit = analyze_ok("func(a) begin local b; a end; func(a) func() a");
    let plain = unit.scope(ScopeId(1));
    let native = FrameLayout::compute(plain, CompatMode::Native);
    assert!(!native.has_frame);
    assert_eq!(native.num_args, (1 << 16) | 1);
    assert_eq!(native.var_index(1), 1);

    let newton = FrameLayout::compute(plain, CompatMode::Newton20);
    assert!(newton.has_frame);
    assert_eq!(newton.num_args, 1);
    assert_eq!(newton.var_index(1), 4);

    let capturing = FrameLayout::compute(unit.scope(ScopeId(2)), CompatMode::Native);
    assert!(capturing.has_frame);
}

#[test]
fn test_tree_is_not_modified() {
    let mut heap = Heap::new();
    let tree = parse("func(x) x", &mut heap);
    let before = tree.clone();
    let mut diagnostics = DiagnosticBag::silent();
    let mut unit = walk_declarations(&tree, &mut heap, &mut diagnostics, "t").unwrap();
    walk_closures(&tree, &mut unit, "t").unwrap();
    assert_eq!(tree, before);
    assert!(matches!(tree.kind, Expr::Begin(_)));
}

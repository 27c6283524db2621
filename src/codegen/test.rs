// In src/codegen/test.rs

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;

use super::*;
use crate::analyzer::{walk_closures, walk_declarations};
use crate::bytecode::freq::FREQ_FUNCS;
use crate::bytecode::{decode_all, Opcode, SimpleOp};
use crate::config::CompatMode;
use crate::diagnostics::codes::{W5002_UNUSED_VALUE, W5003_STANDALONE_EQUALS};
use crate::parser::parse_source;
use crate::store::{Heap, ObjectStore};
use crate::value::Value;

// --- Test Harness ---

fn compile_with(src: &str, heap: &mut Heap, options: &CompilerOptions) -> (Result<CodeBlock, CompileError>, DiagnosticBag) {
    let tree = match parse_source(src, "test.ns", heap) {
        Ok(tree) => tree,
        Err(e) => panic!("Test setup failed (parse error): {}", e),
    };
    let mut diagnostics = DiagnosticBag::new();
    let result = walk_declarations(&tree, heap, &mut diagnostics, "test.ns").and_then(|mut unit| {
        walk_closures(&tree, &mut unit, "test.ns")?;
        generate(&tree, &unit, heap, &mut diagnostics, options, "test.ns")
    });
    (result, diagnostics)
}

fn compile_in(src: &str, compat: CompatMode) -> CodeBlock {
    let options = CompilerOptions::default().with_compat(compat);
    match compile_with(src, &mut Heap::new(), &options).0 {
        Ok(block) => block,
        Err(e) => panic!("Compilation failed unexpectedly: {}", e),
    }
}

fn compile_ok(src: &str) -> CodeBlock {
    compile_in(src, CompatMode::Native)
}

fn compile_err(src: &str) -> CompileError {
    match compile_with(src, &mut Heap::new(), &CompilerOptions::default()).0 {
        Ok(_) => panic!("Compilation succeeded, but an error was expected for {:?}", src),
        Err(e) => e,
    }
}

fn warnings(src: &str) -> Vec<u16> {
    let (result, diagnostics) = compile_with(src, &mut Heap::new(), &CompilerOptions::default());
    assert!(result.is_ok());
    diagnostics.iter().map(|d| d.code().number).collect()
}

/// The instruction listing of a block, one `op operand` string each.
fn ops(block: &CodeBlock) -> Vec<String> {
    decode_all(&block.instructions)
        .expect("generated code must decode")
        .iter()
        .map(|inst| inst.to_string())
        .collect()
}

fn nested(block: &CodeBlock, index: usize) -> &CodeBlock {
    match block.literal(index) {
        Some(Value::CodeBlock(inner)) => inner,
        other => panic!("literal {} is not a code block: {:?}", index, other),
    }
}

fn sym(v: &Value) -> &str {
    match v {
        Value::Symbol(s) => s.as_str(),
        other => panic!("expected a symbol, got {}", other),
    }
}

/// Follows every path through `block` and records the stack depth in front of
/// each reachable instruction. Paths that meet must agree, and every `return`
/// must see exactly one value.
fn stack_depths(block: &CodeBlock) -> BTreeMap<usize, i32> {
    let code = decode_all(&block.instructions).expect("generated code must decode");
    let index: HashMap<usize, usize> = code.iter().enumerate().map(|(i, inst)| (inst.offset, i)).collect();
    let mut depths = BTreeMap::new();
    let mut work = vec![(0usize, 0i32)];
    while let Some((offset, depth)) = work.pop() {
        if let Some(&seen) = depths.get(&offset) {
            assert_eq!(seen, depth, "paths meet at {} with different stack depths", offset);
            continue;
        }
        depths.insert(offset, depth);
        let i = index[&offset];
        let inst = code[i];
        let operand = i32::from(inst.operand);
        let target = usize::from(inst.operand);
        let next = code.get(i + 1).map(|n| n.offset);
        let (effect, jump, falls_through) = match inst.op {
            Opcode::Push | Opcode::PushConstant | Opcode::FindVar | Opcode::GetVar | Opcode::IncrVar => (1, None, true),
            Opcode::SetVar | Opcode::FindAndSetVar => (-1, None, true),
            Opcode::Call | Opcode::MakeFrame => (-operand, None, true),
            Opcode::MakeArray if inst.operand == 0xFFFF => (-1, None, true),
            Opcode::MakeArray => (-operand, None, true),
            Opcode::FreqFunc => (1 - i32::from(FREQ_FUNCS[target].arity), None, true),
            Opcode::Branch => (0, Some(target), false),
            Opcode::BranchIfTrue | Opcode::BranchIfFalse => (-1, Some(target), true),
            Opcode::BranchIfLoopNotDone => (-3, Some(target), true),
            Opcode::Simple => match inst.simple() {
                Some(SimpleOp::Pop) | Some(SimpleOp::IterNext) => (-1, None, true),
                Some(SimpleOp::Dup) | Some(SimpleOp::PushSelf) => (1, None, true),
                Some(SimpleOp::SetLexScope) | Some(SimpleOp::IterDone) => (0, None, true),
                Some(SimpleOp::Return) => {
                    assert_eq!(depth, 1, "return at {} sees {} values", offset, depth);
                    continue;
                }
                other => panic!("no stack effect for {:?}", other),
            },
            other => panic!("no stack effect for {}", other),
        };
        let after = depth + effect;
        assert!(after >= 0, "stack underflow at {}", offset);
        if let Some(target) = jump {
            work.push((target, after));
        }
        if falls_through {
            if let Some(next) = next {
                work.push((next, after));
            }
        }
    }
    depths
}

// --- 表达式 ---

#[test]
fn test_arithmetic_precedence() {
    let block = compile_ok("1 + 2 * 3");
    assert_eq!(
        ops(&block),
        ["push-constant 4", "push-constant 8", "push-constant 12", "freq-func 7", "freq-func 0", "return"]
    );
    assert_eq!(block.literals, None);
}

#[test]
fn test_names_resolve_to_slots_or_lookups() {
    let block = compile_ok("local a := 1; a");
    assert_eq!(ops(&block), ["push-constant 4", "set-var 0", "get-var 0", "return"]);
    assert_eq!(block.num_args, 1 << 16);

    let block = compile_ok("x := y");
    assert_eq!(ops(&block), ["find-var 0", "dup", "find-and-set-var 1", "return"]);
    let literals = block.literals.expect("literals");
    assert_eq!(sym(&literals[0]), "y");
    assert_eq!(sym(&literals[1]), "x");
}

#[test]
fn test_constants_are_inlined() {
    let block = compile_ok("constant k := 5; k + 1");
    assert_eq!(ops(&block), ["push-constant 20", "push-constant 4", "freq-func 0", "return"]);

    let mut heap = Heap::new();
    let k = heap.intern("limit");
    heap.define_constant(k, Value::Int(7));
    let block = compile_with("limit", &mut heap, &CompilerOptions::default()).0.unwrap();
    assert_eq!(ops(&block), ["push-constant 28", "return"]);
}

#[test]
fn test_negation() {
    assert_eq!(ops(&compile_ok("-x")), ["push-constant 0", "find-var 0", "freq-func 1", "return"]);
    assert_eq!(ops(&compile_ok("- - 3")), ["push-constant 12", "return"]);
}

#[test]
fn test_concatenation_flattens_into_one_stringer_call() {
    let block = compile_ok("\"a\" & \"b\" && \"c\"");
    assert_eq!(
        ops(&block),
        ["push 0", "push 1", "push 2", "push 3", "push 4", "make-array 4", "freq-func 22", "return"]
    );
    assert_eq!(block.literal(2), Some(&Value::String(" ".into())));
    assert_eq!(sym(&block.literals.as_ref().unwrap()[4]), "array");
}

#[test]
fn test_library_operators_call_globals() {
    let block = compile_ok("a mod b");
    assert_eq!(ops(&block), ["find-var 0", "find-var 1", "push 2", "call 2", "return"]);
    assert_eq!(sym(block.literal(2).unwrap()), "Mod");
}

#[test]
fn test_calls_use_freq_funcs_when_they_match() {
    assert_eq!(ops(&compile_ok("Length(x)")), ["find-var 0", "freq-func 18", "return"]);
    assert_eq!(ops(&compile_ok("foo(1, 2)")), ["push-constant 4", "push-constant 8", "push 0", "call 2", "return"]);
    assert_eq!(ops(&compile_ok("call f with (1)")), ["push-constant 4", "find-var 0", "invoke 1", "return"]);
}

#[test]
fn test_sends() {
    assert_eq!(ops(&compile_ok("o:foo(1)")), ["push-constant 4", "find-var 0", "push 1", "send 1", "return"]);
    assert_eq!(ops(&compile_ok(":foo()")), ["push-self", "push 0", "send 0", "return"]);
    assert_eq!(
        ops(&compile_ok("a.b:?m()")),
        ["find-var 0", "push 1", "get-path 0", "push 2", "send-if-defined 0", "return"]
    );
    assert_eq!(ops(&compile_ok("inherited:m(1)")), ["push-constant 4", "push 0", "resend 1", "return"]);
}

#[test]
fn test_paths_and_indexing() {
    let block = compile_ok("a.b.c");
    assert_eq!(ops(&block), ["find-var 0", "push 1", "get-path 1", "return"]);
    match block.literal(1) {
        Some(Value::Array(path)) => {
            assert_eq!(path.class.as_str(), "pathExpr");
            assert_eq!(path.elements.iter().map(sym).collect::<Vec<_>>(), ["b", "c"]);
        }
        other => panic!("expected a path array, got {:?}", other),
    }

    assert_eq!(ops(&compile_ok("a.b := 1")), ["find-var 0", "push 1", "push-constant 4", "set-path 1", "return"]);
    assert_eq!(ops(&compile_ok("a[1]")), ["find-var 0", "push-constant 4", "freq-func 2", "return"]);
    assert_eq!(
        ops(&compile_ok("a[1] := 2")),
        ["find-var 0", "push-constant 4", "push-constant 8", "freq-func 3", "return"]
    );
}

#[test]
fn test_exists() {
    assert_eq!(ops(&compile_ok("x exists")), ["push 0", "push 1", "call 1", "return"]);
    assert_eq!(ops(&compile_ok("local y; y exists")), ["push-constant 26", "return"]);
    assert_eq!(ops(&compile_ok("a.b exists")), ["find-var 0", "push 1", "freq-func 23", "return"]);
}

#[test]
fn test_constructors() {
    assert_eq!(ops(&compile_ok("[1, 2]")), ["push-constant 4", "push-constant 8", "push 0", "make-array 2", "return"]);

    let block = compile_ok("{a: 1, b: x}");
    assert_eq!(ops(&block), ["push-constant 4", "find-var 0", "push 1", "make-frame 2", "return"]);
    match block.literal(1) {
        Some(Value::Map(map)) => assert_eq!(map.slots.iter().map(|s| s.as_str()).collect::<Vec<_>>(), ["a", "b"]),
        other => panic!("expected a frame map, got {:?}", other),
    }
}

#[test]
fn test_globals() {
    let block = compile_ok("global g := 1");
    assert_eq!(ops(&block), ["push 0", "push-constant 4", "push 1", "call 2", "return"]);
    assert_eq!(sym(block.literal(1).unwrap()), "DefGlobalVar");

    let options = CompilerOptions::default().with_debug_names(true);
    let block = compile_with("global f(x) x", &mut Heap::new(), &options).0.unwrap();
    assert_eq!(ops(&block), ["push 0", "push 1", "push 2", "call 2", "return"]);
    let f = nested(&block, 1);
    let debug = f.debug.as_ref().expect("debug names");
    assert_eq!(debug.name.as_ref().map(|n| n.as_str()), Some("f"));
    assert_eq!(debug.args.len(), 1);
}

// --- 短路与条件 ---

#[test]
fn test_logical_value() {
    assert_eq!(
        ops(&compile_ok("x and y")),
        ["find-var 0", "branch-if-false 8", "find-var 1", "branch 9", "push-constant 2", "return"]
    );
    assert_eq!(
        ops(&compile_ok("x or y")),
        ["find-var 0", "branch-if-true 8", "find-var 1", "branch 11", "push-constant 26", "return"]
    );
}

#[test]
fn test_discarded_logical_and_if_push_no_filler() {
    let expected = |branch: &str| {
        vec![
            "find-var 0".to_string(),
            format!("{} 7", branch),
            "push 1".into(),
            "call 0".into(),
            "pop".into(),
            "push-constant 2".into(),
            "return".into(),
        ]
    };
    assert_eq!(ops(&compile_ok("x and f(); nil")), expected("branch-if-false"));
    assert_eq!(ops(&compile_ok("x or f(); nil")), expected("branch-if-true"));
    assert_eq!(ops(&compile_ok("if x then f(); nil")), expected("branch-if-false"));
}

#[test]
fn test_if_value() {
    assert_eq!(
        ops(&compile_ok("if x then 1 else 2")),
        ["find-var 0", "branch-if-false 8", "push-constant 4", "branch 11", "push-constant 8", "return"]
    );
    assert_eq!(
        ops(&compile_ok("if x then 1")),
        ["find-var 0", "branch-if-false 8", "push-constant 4", "branch 9", "push-constant 2", "return"]
    );
}

// --- 循环 ---

#[test]
fn test_while_loop() {
    assert_eq!(
        ops(&compile_ok("while x do f()")),
        ["find-var 0", "branch-if-false 8", "push 1", "call 0", "pop", "branch 0", "push-constant 2", "return"]
    );
}

#[test]
fn test_break_targets_innermost_loop() {
    let block = compile_ok("loop begin loop break 1; break 2 end");
    assert_eq!(
        ops(&block),
        ["push-constant 4", "branch 5", "branch 0", "pop", "push-constant 8", "branch 13", "branch 0", "return"]
    );
}

#[test]
fn test_for_loop() {
    let block = compile_ok("for i := 1 to 10 do f(i)");
    assert_eq!(
        ops(&block),
        [
            "push-constant 4",
            "set-var 0",
            "push-constant 40",
            "set-var 1",
            "push-constant 4",
            "set-var 2",
            "get-var 2",
            "get-var 0",
            "branch 19",
            "get-var 0",
            "push 0",
            "call 1",
            "pop",
            "get-var 2",
            "incr-var 0",
            "get-var 1",
            "branch-if-loop-not-done 13",
            "push-constant 2",
            "return",
        ]
    );
    assert_eq!(block.num_args, 3 << 16);
}

#[test]
fn test_foreach_do() {
    let block = compile_ok("foreach v in c do f(v)");
    assert_eq!(
        ops(&block),
        [
            "find-var 0",
            "push-constant 2",
            "freq-func 17",
            "set-var 1",
            "branch 19",
            "get-var 1",
            "push-constant 4",
            "freq-func 2",
            "set-var 0",
            "get-var 0",
            "push 1",
            "call 1",
            "pop",
            "get-var 1",
            "iter-next",
            "get-var 1",
            "iter-done",
            "branch-if-false 9",
            "push-constant 2",
            "push-constant 2",
            "set-var 1",
            "return",
        ]
    );
}

#[test]
fn test_foreach_collect_builds_result_array() {
    let listing = ops(&compile_ok("foreach k, v deeply in c collect v"));
    assert!(listing.contains(&"make-array 65535".to_string()));
    assert!(listing.contains(&"freq-func 3".to_string()));
    assert!(listing.contains(&"push-constant 26".to_string()));
    assert_eq!(listing.iter().filter(|op| *op == "iter-next").count(), 1);
}

// --- try ---

#[test]
fn test_break_inside_collect_leaves_one_value() {
    let block = compile_ok("foreach v in c collect if v then break 9 else v");
    let listing = ops(&block);
    stack_depths(&block);
    // The body value is parked before the result array is touched.
    let first_aref = listing.iter().position(|op| op == "freq-func 3").unwrap();
    let body = listing.iter().position(|op| op == "push-constant 36").unwrap();
    assert!(body < first_aref);
}

#[test]
fn test_loops_keep_the_stack_balanced() {
    for src in [
        "foreach v in c collect v",
        "foreach k, v deeply in c collect if k then break k else v",
        "foreach v in c do if v then break v",
        "for i := 1 to 10 by 2 do if i then break i",
        "while x do if y then break 1",
        "repeat if x then break x until y",
        "loop if x then break 2",
    ] {
        stack_depths(&compile_ok(src));
    }
}

#[test]
fn test_try_layout() {
    let block = compile_ok("try f() onexception |evt.ex| do 1");
    assert_eq!(
        ops(&block),
        [
            "push 0",
            "push-constant 52",
            "new-handlers 1",
            "push 1",
            "call 0",
            "pop-handlers",
            "branch 17",
            "push-constant 4",
            "pop-handlers",
            "return",
        ]
    );
    assert_eq!(sym(block.literal(0).unwrap()), "evt.ex");
}

#[test]
fn test_far_exception_handler_is_rejected() {
    let src = format!("try {} onexception |e| do 1", "f(); ".repeat(3000));
    assert_eq!(compile_err(&src).number(), 4005);
}

// --- 函数 ---

#[test]
fn test_closures_get_frames_in_native_mode() {
    let block = compile_ok("func(x) func() x");
    assert_eq!(ops(&block), ["push 0", "set-lex-scope", "return"]);
    assert!(block.arg_frame.is_none());

    let outer = nested(&block, 0);
    assert_eq!(ops(outer), ["push 0", "set-lex-scope", "return"]);
    assert_eq!(outer.num_args, 1);
    match &outer.arg_frame {
        Some(Value::Frame(frame)) => {
            let names: Vec<&str> = frame.map.slots.iter().map(|s| s.as_str()).collect();
            assert_eq!(names, ["_nextArgFrame", "_parent", "_implementor", "x"]);
        }
        other => panic!("expected an arg frame, got {:?}", other),
    }

    let inner = nested(outer, 0);
    assert_eq!(ops(inner), ["find-var 0", "return"]);
}

#[test]
fn test_plain_functions_have_no_frame_in_native_mode() {
    let block = compile_ok("func(a) a");
    assert_eq!(ops(&block), ["push 0", "return"]);
    let f = nested(&block, 0);
    assert!(f.arg_frame.is_none());
    assert_eq!(ops(f), ["get-var 0", "return"]);
}

#[test]
fn test_newton20_layout() {
    let block = compile_in("func(a) a", CompatMode::Newton20);
    assert_eq!(ops(&block), ["push 0", "set-lex-scope", "return"]);
    let f = nested(&block, 0);
    assert!(f.arg_frame.is_some());
    assert_eq!(f.num_args, 1);
    assert_eq!(f.arg_count(), 1);
    assert_eq!(ops(f), ["get-var 3", "return"]);
}

#[test]
fn test_captured_local_wins_over_global_constant() {
    let mut heap = Heap::new();
    let x = heap.intern("x");
    heap.define_constant(x, Value::Int(7));
    let options = CompilerOptions::default();

    let block = compile_with("local x := 1; func() x", &mut heap, &options).0.unwrap();
    let inner = nested(&block, 0);
    assert_eq!(ops(inner), ["find-var 0", "return"]);
    assert_eq!(sym(inner.literal(0).unwrap()), "x");

    let block = compile_with("local x := 1; func() x := 2", &mut heap, &options).0.unwrap();
    let inner = nested(&block, 0);
    assert_eq!(ops(inner), ["push-constant 8", "dup", "find-and-set-var 0", "return"]);

    let block = compile_with("local x := 1; func() x exists", &mut heap, &options).0.unwrap();
    assert_eq!(ops(nested(&block, 0)), ["push-constant 26", "return"]);

    // Without a local of that name the constant still applies.
    let block = compile_with("func() x", &mut heap, &options).0.unwrap();
    assert_eq!(ops(nested(&block, 0)), ["push-constant 28", "return"]);
}

#[test]
fn test_function_missing_from_unit_is_an_error() {
    let mut heap = Heap::new();
    let mut diagnostics = DiagnosticBag::new();
    let declared = parse_source("1", "test.ns", &mut heap).unwrap();
    let unit = walk_declarations(&declared, &mut heap, &mut diagnostics, "test.ns").unwrap();
    let other = parse_source("func() 1", "test.ns", &mut heap).unwrap();
    let result = generate(&other, &unit, &mut heap, &mut diagnostics, &CompilerOptions::default(), "test.ns");
    match result {
        Err(e) => assert_eq!(e.number(), 4006),
        Ok(_) => panic!("expected an undeclared function error"),
    }
}

#[test]
fn test_return() {
    let block = compile_ok("func() return 1");
    assert_eq!(ops(nested(&block, 0)), ["push-constant 4", "return", "return"]);
}

// --- 错误与警告 ---

#[test]
fn test_codegen_errors() {
    assert_eq!(compile_err("break").number(), 4003);
    assert_eq!(compile_err("loop func() break").number(), 4003);
    let err = compile_err("constant k := 1; k := 2");
    assert_eq!(err.number(), 4002);
    assert_eq!(err.value.as_ref().map(sym), Some("k"));
    assert_eq!(compile_err("1 := 2").number(), 4001);
    assert_eq!(compile_err("1 exists").number(), 4001);
}

#[test]
fn test_statement_warnings() {
    assert_eq!(warnings("x = 1; nil"), [W5003_STANDALONE_EQUALS.number]);
    assert_eq!(warnings("x + 1; nil"), [W5002_UNUSED_VALUE.number]);
    assert!(warnings("f(); x; 1; nil").is_empty());
}

// --- 性质测试 ---

fn operand() -> impl Strategy<Value = String> {
    prop_oneof![(0..20000i32).prop_map(|n| n.to_string()), "[a-e]"]
}

fn arithmetic_source() -> impl Strategy<Value = String> {
    let op = prop_oneof![Just("+"), Just("-"), Just("*"), Just("<"), Just("and"), Just("&")];
    (operand(), prop::collection::vec((op, operand()), 0..8)).prop_map(|(first, rest)| {
        let mut src = first;
        for (op, operand) in rest {
            src.push_str(&format!(" {} {}", op, operand));
        }
        src
    })
}

proptest! {
    #[test]
    fn test_codegen_is_deterministic(src in arithmetic_source()) {
        let first = compile_ok(&src);
        let second = compile_ok(&src);
        prop_assert_eq!(first.instructions, second.instructions);
        prop_assert_eq!(first.num_args, second.num_args);
    }
}

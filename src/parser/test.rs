use super::ast::*;
use super::*;
use crate::store::Heap;
use crate::value::{Symbol, Value};

/// Parses `source` and returns the list of top-level commands.
fn parse_ok(source: &str) -> Vec<Node> {
    let mut heap = Heap::new();
    match parse_source(source, "test.ns", &mut heap) {
        Ok(Node { kind: Expr::Begin(commands), .. }) => commands,
        Ok(other) => panic!("expected a begin node, got {:?}", other),
        Err(e) => panic!("parsing failed: {}", e),
    }
}

fn parse_one(source: &str) -> Expr {
    let mut commands = parse_ok(source);
    assert_eq!(commands.len(), 1, "expected exactly one command");
    commands.remove(0).kind
}

fn parse_err(source: &str) -> CompileError {
    let mut heap = Heap::new();
    match parse_source(source, "test.ns", &mut heap) {
        Ok(node) => panic!("expected a syntax error, got {:?}", node),
        Err(e) => e,
    }
}

fn name(n: &str) -> Symbol {
    Symbol::new(n)
}

/// Renders the tree in a compact prefix form so shapes can be compared as text.
fn sexpr(node: &Node) -> String {
    match &node.kind {
        Expr::Literal(v) => v.to_string(),
        Expr::Name(s) => s.to_string(),
        Expr::SelfRef => "self".into(),
        Expr::Unary { op, operand } => format!("({:?} {})", op, sexpr(operand)),
        Expr::Binary { op, lhs, rhs } => format!("({:?} {} {})", op, sexpr(lhs), sexpr(rhs)),
        Expr::Logical { op, lhs, rhs } => format!("({:?} {} {})", op, sexpr(lhs), sexpr(rhs)),
        Expr::Assign { target, value } => format!("(:= {} {})", sexpr(target), sexpr(value)),
        Expr::Exists(e) => format!("(exists {})", sexpr(e)),
        Expr::Path { object, key: PathKey::Slot(s) } => format!("(. {} {})", sexpr(object), s),
        Expr::Path { object, key: PathKey::Expr(e) } => format!("(. {} {})", sexpr(object), sexpr(e)),
        Expr::Index { object, index } => format!("([] {} {})", sexpr(object), sexpr(index)),
        Expr::Call { name, args } => {
            let args: Vec<String> = args.iter().map(sexpr).collect();
            format!("(call {} {})", name, args.join(" "))
        }
        other => format!("{:?}", std::mem::discriminant(other)),
    }
}

fn shape(source: &str) -> String {
    let commands = parse_ok(source);
    sexpr(&commands[0])
}

// --- Operator precedence ---

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(shape("1 + 2 * 3"), "(Add 1 (Mul 2 3))");
    assert_eq!(shape("1 - 2 - 3"), "(Sub (Sub 1 2) 3)");
    assert_eq!(shape("a << 1 + b"), "(Add (ShiftLeft a 1) b)");
    assert_eq!(shape("x div 2 mod 3"), "(Mod (IntDiv x 2) 3)");
}

#[test]
fn test_unary_and_logical_precedence() {
    assert_eq!(shape("-a * b"), "(Mul (Negate a) b)");
    assert_eq!(shape("not a = b"), "(Not (Equal a b))");
    assert_eq!(shape("not a and b or c"), "(Or (And (Not a) b) c)");
    assert_eq!(shape("a < b and c <> d"), "(And (Less a b) (NotEqual c d))");
}

#[test]
fn test_smallest_integer_literal() {
    assert_eq!(shape("-536870912"), "-536870912");
    assert_eq!(shape("x - -536870912"), "(Sub x -536870912)");
    assert_eq!(shape("-536870911"), "(Negate 536870911)");
    assert_eq!(parse_err("536870912").number(), 1005);
    assert_eq!(parse_err("x - 536870912").number(), 1005);
    assert_eq!(parse_err("'[536870912]").number(), 1005);
}

#[test]
fn test_assignment_is_right_associative() {
    assert_eq!(shape("a := b := 1 + 2"), "(:= a (:= b (Add 1 2)))");
    assert_eq!(shape("x.y := 3"), "(:= (. x y) 3)");
}

#[test]
fn test_concatenation_binds_looser_than_addition() {
    assert_eq!(shape("\"a\" & 1 + 2 && b"), "(ConcatSpace (Concat \"a\" (Add 1 2)) b)");
}

#[test]
fn test_exists_is_postfix() {
    assert_eq!(shape("x exists"), "(exists x)");
    assert_eq!(shape("not f.slot exists"), "(Not (exists (. f slot)))");
}

#[test]
fn test_paths_indexes_and_calls() {
    assert_eq!(shape("a.b.c"), "(. (. a b) c)");
    assert_eq!(shape("a.(k)[2]"), "([] (. a k) 2)");
    assert_eq!(shape("Length(xs) + 1"), "(Add (call Length xs) 1)");
}

// --- Statement forms ---

#[test]
fn test_if_then_else_absorbs_trailing_expression() {
    match parse_one("if a then 1 else 2 + 3") {
        Expr::If { else_branch: Some(e), .. } => assert_eq!(sexpr(&e), "(Add 2 3)"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_semicolon_before_else_is_absorbed() {
    assert!(matches!(parse_one("if a then b; else c"), Expr::If { else_branch: Some(_), .. }));
}

#[test]
fn test_for_loop() {
    match parse_one("for i := 1 to 10 by 2 do x := x + i") {
        Expr::For { var, step: Some(step), body, .. } => {
            assert_eq!(var, name("i"));
            assert_eq!(sexpr(&step), "2");
            assert_eq!(sexpr(&body), "(:= x (Add x i))");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_foreach_forms() {
    match parse_one("foreach k, v deeply in f collect v") {
        Expr::Foreach { key, value, deeply, collect, .. } => {
            assert_eq!(key, Some(name("k")));
            assert_eq!(value, name("v"));
            assert!(deeply);
            assert!(collect);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        parse_one("foreach v in f do print(v)"),
        Expr::Foreach { key: None, deeply: false, collect: false, .. }
    ));
}

#[test]
fn test_while_repeat_loop_and_begin() {
    assert!(matches!(parse_one("while x < 3 do x := x + 1"), Expr::While { .. }));
    match parse_one("repeat a; b; until done") {
        Expr::Repeat { body, .. } => assert!(matches!(&body.kind, Expr::Begin(items) if items.len() == 2)),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(parse_one("loop break"), Expr::Loop(_)));
    match parse_one("begin 1; 2; 3 end") {
        Expr::Begin(items) => assert_eq!(items.len(), 3),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_try_with_handlers() {
    match parse_one("try 1/0 onexception |evt.ex.div0| do 99 onexception |evt.ex| 100") {
        Expr::Try { handlers, .. } => {
            assert_eq!(handlers.len(), 2);
            assert_eq!(handlers[0].exception, name("evt.ex.div0"));
            assert_eq!(sexpr(&handlers[1].body), "100");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_declarations() {
    match parse_one("local int a := 1, b") {
        Expr::Local(bindings) => {
            assert_eq!(bindings.len(), 2);
            assert_eq!(bindings[0].ty, Some(name("int")));
            assert!(bindings[1].value.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(parse_one("constant k := 3"), Expr::Constant(_)));
    assert!(matches!(parse_one("global g := 1"), Expr::Global { value: Some(_), .. }));
    assert!(matches!(parse_one("global f(x) x"), Expr::GlobalFunc { .. }));
}

#[test]
fn test_function_literals() {
    match parse_one("func native(int x, y) x + y") {
        Expr::Func(f) => {
            assert!(f.native);
            assert_eq!(f.params.len(), 2);
            assert_eq!(f.params[0].ty, Some(name("int")));
            assert_eq!(f.params[1].name, name("y"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_function_ids_are_unique() {
    let commands = parse_ok("func() 1; func() func() 2");
    let mut ids = Vec::new();
    fn collect(node: &Node, ids: &mut Vec<FuncId>) {
        if let Expr::Func(f) = &node.kind {
            ids.push(f.id);
            collect(&f.body, ids);
        }
    }
    for c in &commands {
        collect(c, &mut ids);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_message_sends() {
    match parse_one("obj:?foo(1, 2)") {
        Expr::Send { receiver: Some(_), message, args, may_be_undefined } => {
            assert_eq!(message, name("foo"));
            assert_eq!(args.len(), 2);
            assert!(may_be_undefined);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(parse_one(":bar()"), Expr::Send { receiver: None, may_be_undefined: false, .. }));
    assert!(matches!(parse_one("inherited:?baz()"), Expr::Resend { may_be_undefined: true, .. }));
    assert!(matches!(parse_one("call f with (1)"), Expr::Invoke { .. }));
}

#[test]
fn test_constructors_and_quotes() {
    match parse_one("[pt: 1, 2,]") {
        Expr::MakeArray { class, elements } => {
            assert_eq!(class, Some(name("pt")));
            assert_eq!(elements.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    match parse_one("{a: 1, b: x}") {
        Expr::MakeFrame(slots) => assert_eq!(slots[1].0, name("b")),
        other => panic!("unexpected {:?}", other),
    }
    match parse_one("'[foo, 1, -2, {x: bar}]") {
        Expr::Literal(v) => assert_eq!(v.to_string(), "['foo, 1, -2, {x: 'bar}]"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(parse_one("'sym"), Expr::Literal(Value::Symbol(name("sym"))));
}

#[test]
fn test_break_and_return_values_are_optional() {
    assert!(matches!(parse_one("return"), Expr::Return(None)));
    assert!(matches!(parse_one("return 1"), Expr::Return(Some(_))));
    match parse_one("loop begin break; end") {
        Expr::Loop(body) => assert!(matches!(&body.kind, Expr::Begin(items) if matches!(items[0].kind, Expr::Break(None)))),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_multiple_commands() {
    assert_eq!(parse_ok("a := 1; b := 2;").len(), 2);
}

// --- Errors ---

#[test]
fn test_syntax_error_lists_expected_tokens() {
    let err = parse_err("if a b");
    assert_eq!(err.number(), 2001);
    assert!(err.message.contains("`then`"), "message was {}", err.message);
    assert!(err.message.contains("identifier `b`"), "message was {}", err.message);
}

#[test]
fn test_missing_operand() {
    let err = parse_err("1 + ;");
    assert_eq!(err.number(), 2001);
    assert!(err.message.contains("expression"));
}

#[test]
fn test_expected_set_has_no_duplicates() {
    let err = parse_err("foo(1 2)");
    let commas = err.message.matches("`,`").count();
    assert!(commas <= 1, "message was {}", err.message);
}

#[test]
fn test_recovery_resumes_after_semicolon() {
    let mut heap = Heap::new();
    let mut stream = SourceStream::new("1 +; 2; 3", "t.ns");
    let mut parser = Parser::new(Lexer::new(&mut stream, &mut heap));
    assert!(parser.next_command().is_err());
    parser.synchronize();
    let second = parser.next_command().unwrap().unwrap();
    assert_eq!(second.kind, Expr::Literal(Value::Int(2)));
    let third = parser.next_command().unwrap().unwrap();
    assert_eq!(third.kind, Expr::Literal(Value::Int(3)));
    assert!(parser.next_command().unwrap().is_none());
}

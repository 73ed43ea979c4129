//! An integer calculator built on a precedence rule.

use fastpeg::{
    ActionFunc, Expr, InfixFn, OpExpr, Reader, RuleSet, UnaryFn, Value,
};

fn lit(s: &str) -> Expr {
    Expr::literal(s)
}

fn ws() -> Expr {
    Expr::discard(Expr::repeat(Expr::char_range(" \t\r\n", [])))
}

/// A literal followed by optional whitespace.
fn tok(s: &str) -> Expr {
    Expr::seq([lit(s), ws()])
}

fn int(v: &Value) -> i64 {
    v.as_int().unwrap()
}

fn infix(s: &str, f: fn(i64, i64) -> i64) -> (Expr, InfixFn) {
    let action = InfixFn::new(format!("lhs {s} rhs"), move |_, _, lhs, rhs| {
        Value::Int(f(int(&lhs), int(&rhs)))
    });
    (tok(s), action)
}

fn calculator() -> RuleSet {
    let neg = UnaryFn::new("-x", |_, _, x| Value::Int(-int(&x)));

    let number = Expr::action(
        Expr::seq([
            Expr::label("n", Expr::slice(Expr::one_or_more(Expr::char_range("", [('0', '9')])))),
            ws(),
        ]),
        ActionFunc::new("int(n)", |cx, _| Value::Int(cx.capture_text("n").parse().unwrap()))
            .with_captures(["n"]),
    );
    let paren = Expr::action(
        Expr::seq([
            Expr::discard(tok("(")),
            Expr::label("e", Expr::rule("Expr")),
            Expr::discard(tok(")")),
        ]),
        ActionFunc::new("e", |cx, _| cx.capture("e").cloned().unwrap_or(Value::Nil))
            .with_captures(["e"]),
    );
    let calc = Expr::action(
        Expr::seq([
            ws(),
            Expr::label("e", Expr::rule("Expr")),
            Expr::discard(Expr::not(Expr::any())),
        ]),
        ActionFunc::new("e", |cx, _| cx.capture("e").cloned().unwrap_or(Value::Nil))
            .with_captures(["e"]),
    );

    RuleSet::builder()
        .name("calculator")
        .rule("Calc", calc)
        .precedence(
            "Expr",
            [
                OpExpr::left_assoc([infix("+", |a, b| a + b), infix("-", |a, b| a - b)]).into(),
                OpExpr::left_assoc([infix("*", |a, b| a * b), infix("/", |a, b| a / b)]).into(),
                OpExpr::prefix([(tok("-"), neg)]).into(),
                OpExpr::right_assoc([infix("^", |a, b| a.pow(b as u32))]).into(),
                Expr::rule("Number").into(),
                Expr::rule("Paren").into(),
            ],
        )
        .rule("Number", number)
        .rule("Paren", paren)
        .build()
        .unwrap()
}

fn eval(set: &RuleSet, input: &str) -> i64 {
    let mut reader = Reader::from_text(input);
    match set.parse(&mut reader) {
        Ok(value) => int(&value),
        Err(err) => panic!("{err} ({})", reader.location(err.pos)),
    }
}

#[test]
fn arithmetic() {
    let set = calculator();
    assert_eq!(eval(&set, "1 + 2 * 3"), 7);
    assert_eq!(eval(&set, "(1 + 2) * 3"), 9);
    assert_eq!(eval(&set, "10 - 4 - 3"), 3);
    assert_eq!(eval(&set, " 8 / 2 / 2 "), 2);
    assert_eq!(eval(&set, "2 ^ 3 ^ 2"), 512);
    assert_eq!(eval(&set, "-2 ^ 2"), -4);
    assert_eq!(eval(&set, "-(3 + 4) * -2"), 14);
    assert_eq!(eval(&set, "((42))"), 42);
}

#[test]
fn unclosed_paren() {
    let set = calculator();
    let mut reader = Reader::from_text("1 + (2 * 3");
    let err = set.parse(&mut reader).unwrap_err();
    assert_eq!(err.pos, 10);
    assert_eq!(err.expr.to_string(), r#"")""#);
    assert_eq!(reader.location(err.pos).to_string(), "1:11");
}

#[test]
fn missing_operand() {
    let set = calculator();
    let mut reader = Reader::from_text("1 +\n  * 2");
    let err = set.parse(&mut reader).unwrap_err();
    assert_eq!(err.pos, 6);
    assert_eq!(reader.location(err.pos).to_string(), "2:3");
}

#[test]
fn trailing_input() {
    let set = calculator();
    let err = set.parse(&mut Reader::from_text("1 2")).unwrap_err();
    assert_eq!(err.pos, 2);
    assert_eq!(err.expr.to_string(), "!.");
}

#[test]
fn render() {
    let set = calculator();
    let grammar = set.render_grammar();
    assert!(grammar.starts_with("Calc <- "));
    assert!(grammar.contains("\nExpr <-\n  |--\n"));
    assert!(grammar.contains(r#"  | @' ( "+" -[ \t\r\n]* ) @ { lhs + rhs }"#));
    assert!(grammar.contains("\n  |--\n  | Number\n  | Paren\n"));
    assert!(!grammar.contains("Expr_0 <-"));
}

#[test]
fn shared_between_threads() {
    let set = calculator();
    let inputs = [("1+1", 2), ("2*3+4", 10), ("2^10", 1024), ("-(1-8)", 7)];
    std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|&(input, expected)| {
                let set = &set;
                s.spawn(move || assert_eq!(eval(set, input), expected))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
}

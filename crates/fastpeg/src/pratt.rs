//! Precedence climbing. A [`PrecedenceRule`] is expanded into one rule per operator level
//! when the rule set is built, each level parses its operands with the next tighter one.

use std::{fmt::Write, sync::Arc};

use cranelift_entity::PrimaryMap;
use fastpeg_runtime::{Captures, Reader, Value};

use crate::{
    action::{ActionCx, InfixFn, UnaryFn},
    error::{ErrorAccumulator, GrammarError},
    eval::{EvalResult, Evaluator},
    expr::Expr,
    grammar::{RuleBody, RuleDef, RuleHandle, RuleKind},
};

/// One precedence level, operators are tried in order and the first match wins.
#[derive(Clone, Debug)]
pub enum OpExpr {
    Prefix(Vec<(Expr, UnaryFn)>),
    Postfix(Vec<(Expr, UnaryFn)>),
    LeftAssocInfix(Vec<(Expr, InfixFn)>),
    RightAssocInfix(Vec<(Expr, InfixFn)>),
}

impl OpExpr {
    pub fn prefix(ops: impl IntoIterator<Item = (Expr, UnaryFn)>) -> OpExpr {
        OpExpr::Prefix(ops.into_iter().collect())
    }
    pub fn postfix(ops: impl IntoIterator<Item = (Expr, UnaryFn)>) -> OpExpr {
        OpExpr::Postfix(ops.into_iter().collect())
    }
    pub fn left_assoc(ops: impl IntoIterator<Item = (Expr, InfixFn)>) -> OpExpr {
        OpExpr::LeftAssocInfix(ops.into_iter().collect())
    }
    pub fn right_assoc(ops: impl IntoIterator<Item = (Expr, InfixFn)>) -> OpExpr {
        OpExpr::RightAssocInfix(ops.into_iter().collect())
    }

    pub fn operators(&self) -> Vec<&Expr> {
        match self {
            OpExpr::Prefix(ops) | OpExpr::Postfix(ops) => ops.iter().map(|(e, _)| e).collect(),
            OpExpr::LeftAssocInfix(ops) | OpExpr::RightAssocInfix(ops) => {
                ops.iter().map(|(e, _)| e).collect()
            }
        }
    }
    pub fn operators_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            OpExpr::Prefix(ops) | OpExpr::Postfix(ops) => {
                ops.iter_mut().map(|(e, _)| e).collect()
            }
            OpExpr::LeftAssocInfix(ops) | OpExpr::RightAssocInfix(ops) => {
                ops.iter_mut().map(|(e, _)| e).collect()
            }
        }
    }

    /// Renders the level as a `|--` block, `@` marks the operand position and `@'` the
    /// operand parsed by the tighter level.
    pub fn render_into(&self, buf: &mut dyn Write) -> std::fmt::Result {
        write!(buf, "\n  |--")?;
        match self {
            OpExpr::Prefix(ops) => {
                for (op, f) in ops {
                    write!(buf, "\n  | {} @ {{ {} }}", op.render_grammar(true), f.source())?;
                }
            }
            OpExpr::Postfix(ops) => {
                for (op, f) in ops {
                    write!(buf, "\n  | @ {} {{ {} }}", op.render_grammar(true), f.source())?;
                }
            }
            OpExpr::LeftAssocInfix(ops) => {
                for (op, f) in ops {
                    write!(buf, "\n  | @' {} @ {{ {} }}", op.render_grammar(true), f.source())?;
                }
            }
            OpExpr::RightAssocInfix(ops) => {
                for (op, f) in ops {
                    write!(buf, "\n  | @ {} @' {{ {} }}", op.render_grammar(true), f.source())?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum PrecedenceItem {
    Operators(OpExpr),
    Atom(Expr),
}

impl From<OpExpr> for PrecedenceItem {
    fn from(value: OpExpr) -> Self {
        PrecedenceItem::Operators(value)
    }
}

impl From<Expr> for PrecedenceItem {
    fn from(value: Expr) -> Self {
        PrecedenceItem::Atom(value)
    }
}

/// Operator levels ordered from the loosest to the tightest, followed by the atoms.
#[derive(Clone, Debug)]
pub struct PrecedenceRule {
    pub(crate) name: Arc<str>,
    pub(crate) items: Vec<PrecedenceItem>,
}

impl PrecedenceRule {
    pub fn new(
        name: impl Into<Arc<str>>,
        items: impl IntoIterator<Item = PrecedenceItem>,
    ) -> PrecedenceRule {
        PrecedenceRule {
            name: name.into(),
            items: items.into_iter().collect(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render_grammar(&self) -> String {
        let mut levels = Vec::new();
        let mut atoms = Vec::new();
        for item in &self.items {
            match item {
                PrecedenceItem::Operators(ops) => levels.push(ops),
                PrecedenceItem::Atom(atom) => atoms.push(atom),
            }
        }
        let mut buf = String::new();
        _ = render_precedence(&mut buf, &self.name, &levels, &atoms);
        buf
    }

    /// Adds the rule and its synthesized levels `name_0 .. name_N` to the arena.
    ///
    /// The head rule is pushed first so that it keeps its place in definition order, even
    /// when the items are malformed.
    pub(crate) fn register(
        self,
        rules: &mut PrimaryMap<RuleHandle, RuleDef>,
        err: &ErrorAccumulator,
    ) -> RuleHandle {
        let name = self.name;
        let head = rules.push(RuleDef {
            name: name.clone(),
            kind: RuleKind::Precedence,
            body: RuleBody::Precedence(Vec::new()),
        });

        let mut levels = Vec::new();
        let mut atoms = Vec::new();
        let mut misplaced = false;
        for item in self.items {
            match item {
                PrecedenceItem::Operators(ops) => {
                    misplaced |= !atoms.is_empty();
                    levels.push(ops);
                }
                PrecedenceItem::Atom(atom) => atoms.push(atom),
            }
        }

        if misplaced {
            err.error(GrammarError::MisplacedAtom(name.to_string()));
        }
        let atom = match atoms.len() {
            0 => {
                err.error(GrammarError::MissingAtoms(name.to_string()));
                return head;
            }
            1 => atoms.remove(0),
            _ => Expr::Choice(atoms),
        };
        if misplaced {
            return head;
        }

        // built from the tightest level outwards so that each level knows its operand
        let count = levels.len();
        let mut operand = rules.push(RuleDef {
            name: format!("{name}_{count}").into(),
            kind: RuleKind::PrecedenceLevel,
            body: RuleBody::Expr(atom),
        });
        let mut handles = vec![operand];
        for (i, ops) in levels.into_iter().enumerate().rev() {
            operand = rules.push(RuleDef {
                name: format!("{name}_{i}").into(),
                kind: RuleKind::PrecedenceLevel,
                body: RuleBody::Level { ops, operand },
            });
            handles.push(operand);
        }
        handles.reverse();

        log::debug!(
            "precedence rule `{name}` synthesized {} levels",
            handles.len()
        );
        rules[head].body = RuleBody::Precedence(handles);
        head
    }
}

pub(crate) fn render_precedence(
    buf: &mut dyn Write,
    name: &str,
    levels: &[&OpExpr],
    atoms: &[&Expr],
) -> std::fmt::Result {
    write!(buf, "{name} <-")?;
    for ops in levels {
        ops.render_into(buf)?;
    }
    write!(buf, "\n  |--\n  | ")?;
    for (i, atom) in atoms.iter().enumerate() {
        if i > 0 {
            write!(buf, "\n  | ")?;
        }
        atom.render_into(buf, false)?;
    }
    Ok(())
}

impl<'g> Evaluator<'g> {
    pub(crate) fn eval_level(
        self,
        level: RuleHandle,
        ops: &'g OpExpr,
        operand: RuleHandle,
        reader: &mut Reader<'_>,
    ) -> EvalResult<'g> {
        match ops {
            OpExpr::Prefix(ops) => {
                let mut scope = Captures::new();
                match self.match_operator(ops, reader, &mut scope) {
                    Some((op, f)) => {
                        let x = self.call_rule(level, reader)?;
                        let cx = ActionCx::new(reader.input(), &scope);
                        Ok(f.call(&cx, Value::List(vec![op, x.clone()]), x))
                    }
                    None => self.call_rule(operand, reader),
                }
            }
            OpExpr::Postfix(ops) => {
                let mut x = self.call_rule(operand, reader)?;
                loop {
                    let before = reader.pos();
                    let mut scope = Captures::new();
                    let Some((op, f)) = self.match_operator(ops, reader, &mut scope) else {
                        break;
                    };
                    let cx = ActionCx::new(reader.input(), &scope);
                    x = f.call(&cx, Value::List(vec![x.clone(), op]), x);
                    if reader.pos() == before {
                        log::warn!("postfix operator matched without consuming input at {before}");
                        break;
                    }
                }
                Ok(x)
            }
            OpExpr::LeftAssocInfix(ops) => {
                let mut left = self.call_rule(operand, reader)?;
                loop {
                    let before = reader.pos();
                    let mut scope = Captures::new();
                    let Some((op, f)) = self.match_operator(ops, reader, &mut scope) else {
                        break;
                    };
                    let right = self.call_rule(operand, reader)?;
                    let cx = ActionCx::new(reader.input(), &scope);
                    let matched = Value::List(vec![left.clone(), op, right.clone()]);
                    left = f.call(&cx, matched, left, right);
                    if reader.pos() == before {
                        log::warn!("infix operator matched without consuming input at {before}");
                        break;
                    }
                }
                Ok(left)
            }
            OpExpr::RightAssocInfix(ops) => {
                let left = self.call_rule(operand, reader)?;
                let mut scope = Captures::new();
                match self.match_operator(ops, reader, &mut scope) {
                    Some((op, f)) => {
                        let right = self.call_rule(level, reader)?;
                        let cx = ActionCx::new(reader.input(), &scope);
                        let matched = Value::List(vec![left.clone(), op, right.clone()]);
                        Ok(f.call(&cx, matched, left, right))
                    }
                    None => Ok(left),
                }
            }
        }
    }

    /// Tries each operator in order, the reader is left after the first one that matched.
    fn match_operator<F>(
        self,
        ops: &'g [(Expr, F)],
        reader: &mut Reader<'_>,
        scope: &mut Captures,
    ) -> Option<(Value, &'g F)> {
        for (op, f) in ops {
            let saved = reader.save_position();
            match self.eval(op, reader, scope) {
                Ok(value) => return Some((value, f)),
                Err(_) => reader.restore_position(saved),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use fastpeg_runtime::{Reader, Value};

    use super::{OpExpr, PrecedenceRule};
    use crate::{
        action::{ActionFunc, InfixFn, UnaryFn},
        error::GrammarError,
        expr::Expr,
        grammar::{RuleKind, RuleSet},
    };

    fn lit(s: &str) -> Expr {
        Expr::literal(s)
    }

    fn digit() -> Expr {
        Expr::action(
            Expr::char_range("", [('0', '9')]),
            ActionFunc::new("int", |cx, v| Value::Int(cx.text(&v).parse().unwrap())),
        )
    }

    fn int(v: &Value) -> i64 {
        v.as_int().unwrap()
    }

    fn add() -> (Expr, InfixFn) {
        (lit("+"), InfixFn::new("a+b", |_, _, a, b| Value::Int(int(&a) + int(&b))))
    }
    fn sub() -> (Expr, InfixFn) {
        (lit("-"), InfixFn::new("a-b", |_, _, a, b| Value::Int(int(&a) - int(&b))))
    }
    fn neg() -> (Expr, UnaryFn) {
        (lit("-"), UnaryFn::new("-x", |_, _, x| Value::Int(-int(&x))))
    }

    fn eval(set: &RuleSet, input: &str) -> i64 {
        int(&set.parse(&mut Reader::from_text(input)).unwrap())
    }

    #[test]
    fn test_left_assoc_with_prefix() {
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [
                    OpExpr::left_assoc([add(), sub()]).into(),
                    OpExpr::prefix([neg()]).into(),
                    digit().into(),
                ],
            )
            .build()
            .unwrap();
        assert_eq!(eval(&set, "-3+4-5"), -4);
        assert_eq!(eval(&set, "--3"), 3);
        assert_eq!(eval(&set, "7"), 7);
    }

    #[test]
    fn test_prefix_looser_than_infix() {
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [
                    OpExpr::prefix([neg()]).into(),
                    OpExpr::left_assoc([add(), sub()]).into(),
                    digit().into(),
                ],
            )
            .build()
            .unwrap();
        // the prefix applies to the whole sum
        assert_eq!(eval(&set, "-3+4-5"), -2);
    }

    #[test]
    fn test_right_assoc() {
        let pow = InfixFn::new("a^b", |_, _, a, b| {
            Value::Int(int(&a).pow(int(&b) as u32))
        });
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [OpExpr::right_assoc([(lit("^"), pow)]).into(), digit().into()],
            )
            .build()
            .unwrap();
        assert_eq!(eval(&set, "2^3^2"), 512);
    }

    #[test]
    fn test_postfix_chain() {
        let fact = UnaryFn::new("x!", |_, _, x| Value::Int((1..=int(&x)).product()));
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [OpExpr::postfix([(lit("!"), fact)]).into(), digit().into()],
            )
            .build()
            .unwrap();
        assert_eq!(eval(&set, "3!!"), 720);
        assert_eq!(eval(&set, "3"), 3);
    }

    #[test]
    fn test_operator_order() {
        let op = |s: &'static str| {
            (
                lit(s),
                InfixFn::new(s, move |_, _, _, _| Value::str(s)),
            )
        };
        let set = RuleSet::builder()
            .precedence(
                "cmp",
                [OpExpr::left_assoc([op("<="), op("<")]).into(), digit().into()],
            )
            .build()
            .unwrap();
        let mut r = Reader::from_text("1<=2");
        assert_eq!(set.parse(&mut r).unwrap(), Value::str("<="));
        assert_eq!(r.pos(), 4);
    }

    #[test]
    fn test_missing_right_operand() {
        let set = RuleSet::builder()
            .precedence("expr", [OpExpr::left_assoc([add()]).into(), digit().into()])
            .build()
            .unwrap();
        let err = set.parse(&mut Reader::from_text("1+")).unwrap_err();
        assert_eq!(err.pos, 2);
    }

    #[test]
    fn test_multiple_atoms() {
        let paren = Expr::seq([Expr::discard(lit("(")), Expr::rule("expr"), Expr::discard(lit(")"))]);
        let paren = Expr::action(paren, ActionFunc::new("inner", |_, v| v.as_list().unwrap()[0].clone()));
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [
                    OpExpr::left_assoc([sub()]).into(),
                    digit().into(),
                    paren.into(),
                ],
            )
            .build()
            .unwrap();
        assert_eq!(eval(&set, "9-(5-1)"), 5);
    }

    #[test]
    fn test_levels_registered() {
        let set = RuleSet::builder()
            .precedence(
                "expr",
                [
                    OpExpr::left_assoc([add()]).into(),
                    OpExpr::prefix([neg()]).into(),
                    digit().into(),
                ],
            )
            .build()
            .unwrap();
        assert_eq!(set.rule("expr").unwrap().kind(), RuleKind::Precedence);
        for level in ["expr_0", "expr_1", "expr_2"] {
            assert_eq!(set.rule(level).unwrap().kind(), RuleKind::PrecedenceLevel);
        }
        assert_eq!(set.entrypoint().name(), "expr");

        // a level can be entered directly, skipping the looser ones
        let mut r = Reader::from_text("-1+2");
        let value = set.parse_rule(&mut r, "expr_1").unwrap();
        assert_eq!(value, Value::Int(-1));
        assert_eq!(r.pos(), 2);
    }

    #[test]
    fn test_malformed() {
        let errors = RuleSet::builder()
            .precedence("a", [OpExpr::prefix([neg()]).into()])
            .precedence(
                "b",
                [digit().into(), OpExpr::prefix([neg()]).into(), digit().into()],
            )
            .build()
            .unwrap_err();
        assert!(errors.contains(&GrammarError::MissingAtoms("a".into())));
        assert!(errors.contains(&GrammarError::MisplacedAtom("b".into())));
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn test_render() {
        let rule = PrecedenceRule::new(
            "expr",
            [
                OpExpr::left_assoc([add(), sub()]).into(),
                OpExpr::prefix([neg()]).into(),
                digit().into(),
                Expr::rule("Paren").into(),
            ],
        );
        let expected = [
            "expr <-",
            "  |--",
            r#"  | @' "+" @ { a+b }"#,
            r#"  | @' "-" @ { a-b }"#,
            "  |--",
            r#"  | "-" @ { -x }"#,
            "  |--",
            "  | [0-9] { int }",
            "  | Paren",
        ]
        .join("\n");
        assert_eq!(rule.render_grammar(), expected);

        let set = RuleSet::builder()
            .definition(rule)
            .rule("Paren", Expr::seq([lit("("), Expr::rule("expr"), lit(")")]))
            .build()
            .unwrap();
        assert_eq!(
            set.render_grammar(),
            format!("{expected}\n{}", r#"Paren <- "(" expr ")""#)
        );
    }
}

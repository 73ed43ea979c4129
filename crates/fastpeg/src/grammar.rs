use std::{collections::HashMap, fmt::Write, sync::Arc};

use cranelift_entity::{entity_impl, PrimaryMap};
use fastpeg_runtime::{Reader, Value};

use crate::{
    error::{ErrorAccumulator, GrammarError, GrammarErrors, NoMatch, ParseError},
    eval::Evaluator,
    expr::Expr,
    pratt::{self, OpExpr, PrecedenceItem, PrecedenceRule},
    resolve::{self, ResolveCx},
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RuleHandle(u32);

entity_impl! { RuleHandle }

impl RuleHandle {
    pub fn name(self, set: &RuleSet) -> &str {
        &set.get(self).name
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RuleKind {
    Rule,
    Precedence,
    /// Synthesized from a precedence rule.
    PrecedenceLevel,
}

#[derive(Clone, Debug)]
pub enum RuleBody {
    Expr(Expr),
    /// Levels from the loosest to the atoms, the rule itself parses the first one.
    Precedence(Vec<RuleHandle>),
    Level {
        ops: OpExpr,
        operand: RuleHandle,
    },
}

#[derive(Clone, Debug)]
pub struct RuleDef {
    pub(crate) name: Arc<str>,
    pub(crate) kind: RuleKind,
    pub(crate) body: RuleBody,
}

impl RuleDef {
    pub fn new(name: impl Into<Arc<str>>, expr: Expr) -> RuleDef {
        RuleDef {
            name: name.into(),
            kind: RuleKind::Rule,
            body: RuleBody::Expr(expr),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> RuleKind {
        self.kind
    }
    pub fn body(&self) -> &RuleBody {
        &self.body
    }
    pub fn expr(&self) -> Option<&Expr> {
        match &self.body {
            RuleBody::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    /// Every expression owned by this rule, operators of a level included.
    pub(crate) fn exprs(&self) -> Vec<&Expr> {
        match &self.body {
            RuleBody::Expr(expr) => vec![expr],
            RuleBody::Precedence(_) => Vec::new(),
            RuleBody::Level { ops, .. } => ops.operators(),
        }
    }
    pub(crate) fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.body {
            RuleBody::Expr(expr) => vec![expr],
            RuleBody::Precedence(_) => Vec::new(),
            RuleBody::Level { ops, .. } => ops.operators_mut(),
        }
    }
}

pub enum Definition {
    Rule(RuleDef),
    Precedence(PrecedenceRule),
}

impl From<RuleDef> for Definition {
    fn from(value: RuleDef) -> Self {
        Definition::Rule(value)
    }
}

impl From<PrecedenceRule> for Definition {
    fn from(value: PrecedenceRule) -> Self {
        Definition::Precedence(value)
    }
}

/// A resolved grammar, immutable once built.
#[derive(Debug)]
pub struct RuleSet {
    name: Option<Arc<str>>,
    rules: PrimaryMap<RuleHandle, RuleDef>,
    name_to_rule: HashMap<Arc<str>, RuleHandle>,
    entrypoint: RuleHandle,
}

impl RuleSet {
    /// Builds a rule set whose entrypoint is the first definition.
    pub fn new<I, D>(definitions: I) -> Result<RuleSet, GrammarErrors>
    where
        I: IntoIterator<Item = D>,
        D: Into<Definition>,
    {
        RuleSet::builder().definitions(definitions).build()
    }
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
    pub fn handle(&self, name: &str) -> Option<RuleHandle> {
        self.name_to_rule.get(name).copied()
    }
    pub fn rule(&self, name: &str) -> Option<&RuleDef> {
        self.handle(name).map(|handle| self.get(handle))
    }
    pub fn get(&self, handle: RuleHandle) -> &RuleDef {
        &self.rules[handle]
    }
    pub fn entrypoint(&self) -> &RuleDef {
        self.get(self.entrypoint)
    }
    /// All rules in definition order, synthesized precedence levels included.
    pub fn iter(&self) -> impl Iterator<Item = (RuleHandle, &RuleDef)> {
        self.rules.iter()
    }

    /// Parses with the default entrypoint.
    pub fn parse(&self, reader: &mut Reader<'_>) -> Result<Value, NoMatch<'_>> {
        Evaluator::new(&self.rules).call_rule(self.entrypoint, reader)
    }

    pub fn parse_rule(&self, reader: &mut Reader<'_>, name: &str) -> Result<Value, ParseError<'_>> {
        let Some(handle) = self.handle(name) else {
            return Err(ParseError::UnknownEntrypoint(name.to_owned()));
        };
        let value = Evaluator::new(&self.rules).call_rule(handle, reader)?;
        Ok(value)
    }

    pub fn render_rule(&self, handle: RuleHandle) -> String {
        let mut buf = String::new();
        _ = self.render_rule_into(&mut buf, handle);
        buf
    }
    fn render_rule_into(&self, buf: &mut dyn Write, handle: RuleHandle) -> std::fmt::Result {
        let rule = self.get(handle);
        match &rule.body {
            RuleBody::Expr(expr) => {
                write!(buf, "{} <- ", rule.name)?;
                expr.render_into(buf, false)
            }
            RuleBody::Precedence(levels) => {
                let mut ops = Vec::new();
                let mut atoms = Vec::new();
                for &level in levels {
                    match &self.get(level).body {
                        RuleBody::Level { ops: level_ops, .. } => ops.push(level_ops),
                        RuleBody::Expr(Expr::Choice(choice)) => atoms.extend(choice),
                        RuleBody::Expr(atom) => atoms.push(atom),
                        RuleBody::Precedence(_) => {}
                    }
                }
                pratt::render_precedence(buf, &rule.name, &ops, &atoms)
            }
            RuleBody::Level { ops, .. } => {
                write!(buf, "{} <-", rule.name)?;
                ops.render_into(buf)
            }
        }
    }

    /// Renders every user defined rule, synthesized levels appear inside their precedence
    /// rule.
    pub fn render_grammar(&self) -> String {
        let mut buf = String::new();
        for (handle, rule) in self.rules.iter() {
            if rule.kind == RuleKind::PrecedenceLevel {
                continue;
            }
            if !buf.is_empty() {
                buf.push('\n');
            }
            _ = self.render_rule_into(&mut buf, handle);
        }
        buf
    }
}

#[derive(Default)]
pub struct RuleSetBuilder {
    name: Option<Arc<str>>,
    entrypoint: Option<Arc<str>>,
    definitions: Vec<Definition>,
}

impl RuleSetBuilder {
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }
    /// Overrides the default entrypoint, which is the first definition.
    pub fn entrypoint(mut self, name: impl Into<Arc<str>>) -> Self {
        self.entrypoint = Some(name.into());
        self
    }
    pub fn definition(mut self, definition: impl Into<Definition>) -> Self {
        self.definitions.push(definition.into());
        self
    }
    pub fn definitions<I, D>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Definition>,
    {
        self.definitions
            .extend(definitions.into_iter().map(Into::into));
        self
    }
    pub fn rule(self, name: impl Into<Arc<str>>, expr: Expr) -> Self {
        self.definition(RuleDef::new(name, expr))
    }
    pub fn precedence(
        self,
        name: impl Into<Arc<str>>,
        items: impl IntoIterator<Item = PrecedenceItem>,
    ) -> Self {
        self.definition(PrecedenceRule::new(name, items))
    }

    pub fn build(self) -> Result<RuleSet, GrammarErrors> {
        let err = ErrorAccumulator::new();

        let mut rules = PrimaryMap::new();
        for definition in self.definitions {
            match definition {
                Definition::Rule(rule) => {
                    rules.push(rule);
                }
                Definition::Precedence(rule) => {
                    rule.register(&mut rules, &err);
                }
            }
        }
        if rules.is_empty() {
            err.error(GrammarError::Empty);
        }

        let cx = ResolveCx::new(&rules, &err);
        resolve::resolve(&mut rules, &cx);

        let entrypoint = match &self.entrypoint {
            Some(name) => {
                let handle = cx.name_to_rule.get(name).copied();
                if handle.is_none() {
                    err.error(GrammarError::UnknownEntrypoint(name.to_string()));
                }
                handle
            }
            None => rules.keys().next(),
        };
        let name_to_rule = cx.name_to_rule;

        err.finish()?;
        let Some(entrypoint) = entrypoint else {
            unreachable!("A missing entrypoint is reported as an error");
        };

        log::debug!(
            "built rule set {:?}: {} rules ({} synthesized), entrypoint `{}`",
            self.name.as_deref().unwrap_or(""),
            rules.len(),
            rules
                .values()
                .filter(|r| r.kind == RuleKind::PrecedenceLevel)
                .count(),
            rules[entrypoint].name
        );

        Ok(RuleSet {
            name: self.name,
            rules,
            name_to_rule,
            entrypoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use fastpeg_runtime::{Reader, Token, Value};

    use super::{RuleDef, RuleSet};
    use crate::{
        action::ActionFunc,
        error::{GrammarError, ParseError},
        expr::Expr,
    };

    fn lit(s: &str) -> Expr {
        Expr::literal(s)
    }

    #[test]
    fn test_forward_reference() {
        let set = RuleSet::new([
            RuleDef::new("A", Expr::seq([Expr::rule("B"), Expr::rule("B")])),
            RuleDef::new("B", lit("b")),
        ])
        .unwrap();
        let value = set.parse(&mut Reader::from_text("bb")).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Token(Token::new(0, 1)),
                Value::Token(Token::new(1, 2))
            ])
        );
    }

    #[test]
    fn test_recursion() {
        // P <- "(" P? ")"
        let nested = RuleDef::new(
            "P",
            Expr::slice(Expr::seq([
                lit("("),
                Expr::optional(Expr::rule("P")),
                lit(")"),
            ])),
        );
        let set = RuleSet::new([nested]).unwrap();

        let mut r = Reader::from_text("((()))x");
        assert_eq!(set.parse(&mut r).unwrap(), Value::Token(Token::new(0, 6)));

        let err = set.parse(&mut Reader::from_text("(()")).unwrap_err();
        assert_eq!(err.pos, 3);
    }

    #[test]
    fn test_rule_scope() {
        let sees_x = ActionFunc::new("x", |cx, _| Value::Bool(cx.capture("x").is_some()));
        let set = RuleSet::new([
            RuleDef::new(
                "A",
                Expr::action(
                    Expr::seq([Expr::label("x", lit("a")), Expr::label("b", Expr::rule("B"))]),
                    ActionFunc::new("b", |cx, _| cx.capture("b").cloned().unwrap_or(Value::Nil)),
                ),
            ),
            RuleDef::new("B", Expr::action(lit("b"), sees_x)),
        ])
        .unwrap();
        assert_eq!(
            set.parse(&mut Reader::from_text("ab")).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_entrypoint() {
        let set = RuleSet::builder()
            .name("letters")
            .rule("A", lit("a"))
            .rule("B", lit("b"))
            .entrypoint("B")
            .build()
            .unwrap();
        assert_eq!(set.name(), Some("letters"));
        assert_eq!(set.entrypoint().name(), "B");
        assert!(set.parse(&mut Reader::from_text("b")).is_ok());

        let mut r = Reader::from_text("a");
        assert!(set.parse_rule(&mut r, "A").is_ok());

        let err = set.parse_rule(&mut r, "C").unwrap_err();
        assert!(matches!(err, ParseError::UnknownEntrypoint(name) if name == "C"));
        let err = set.parse_rule(&mut r, "B").unwrap_err();
        assert_eq!(err.as_no_match().map(|e| e.pos), Some(1));
    }

    #[test]
    fn test_build_errors() {
        let errors = RuleSet::builder()
            .rule("A", Expr::seq([Expr::rule("Missing"), lit("a")]))
            .rule("A", lit("b"))
            .entrypoint("Z")
            .build()
            .unwrap_err();
        assert_eq!(
            errors.errors(),
            [
                GrammarError::DuplicateRule("A".into()),
                GrammarError::UnknownRule {
                    name: "Missing".into(),
                    from: "A".into()
                },
                GrammarError::UnknownEntrypoint("Z".into()),
            ]
        );

        let errors = RuleSet::new(Vec::<RuleDef>::new()).unwrap_err();
        assert_eq!(errors.errors(), [GrammarError::Empty]);
    }

    #[test]
    fn test_unknown_capture() {
        let action = ActionFunc::new("x + y", |_, v| v).with_captures(["x", "y"]);
        let errors = RuleSet::new([RuleDef::new(
            "A",
            Expr::action(Expr::label("x", lit("a")), action),
        )])
        .unwrap_err();
        assert_eq!(
            errors.errors(),
            [GrammarError::UnknownCapture {
                rule: "A".into(),
                action: "x + y".into(),
                name: "y".into()
            }]
        );
    }

    #[test]
    fn test_enclosing_capture() {
        let inner = Expr::action(
            lit("2"),
            ActionFunc::new("x + 2", |cx, _| {
                Value::Int(cx.capture_text("x").parse::<i64>().unwrap() + 2)
            })
            .with_captures(["x"]),
        );
        let sum = ActionFunc::new("x + y", |cx, _| {
            let x: i64 = cx.capture_text("x").parse().unwrap();
            let y = cx.capture("y").and_then(|v| v.as_int()).unwrap();
            Value::Int(x + y)
        })
        .with_captures(["x", "y"]);
        let set = RuleSet::new([RuleDef::new(
            "A",
            Expr::action(
                Expr::seq([Expr::label("x", lit("1")), Expr::label("y", inner)]),
                sum,
            ),
        )])
        .unwrap();
        assert_eq!(set.parse(&mut Reader::from_text("12")).unwrap(), Value::Int(4));

        // rule calls start from an empty scope
        let errors = RuleSet::new([
            RuleDef::new("B", Expr::seq([Expr::label("x", lit("1")), Expr::rule("C")])),
            RuleDef::new(
                "C",
                Expr::action(lit("2"), ActionFunc::new("x", |_, v| v).with_captures(["x"])),
            ),
        ])
        .unwrap_err();
        assert_eq!(
            errors.errors(),
            [GrammarError::UnknownCapture {
                rule: "C".into(),
                action: "x".into(),
                name: "x".into()
            }]
        );
    }

    #[test]
    fn test_render() {
        let set = RuleSet::new([
            RuleDef::new("A", Expr::seq([lit("a"), Expr::repeat(Expr::rule("B"))])),
            RuleDef::new("B", Expr::choice([lit("b"), lit("c")])),
        ])
        .unwrap();
        assert_eq!(set.render_grammar(), "A <- \"a\" B*\nB <- \"b\" / \"c\"");
        let handle = set.handle("B").unwrap();
        assert_eq!(handle.name(&set), "B");
        assert_eq!(set.render_rule(handle), "B <- \"b\" / \"c\"");
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleSet>();
        assert_send_sync::<Expr>();
    }
}

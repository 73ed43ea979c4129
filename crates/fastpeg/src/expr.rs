use std::sync::Arc;

use fastpeg_runtime::{Reader, Value};

use crate::{action::ActionFunc, error::NoMatch, eval::Evaluator, grammar::RuleHandle};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Literal {
    /// Already lowercased when `ignore_case` is set.
    pub(crate) bytes: Arc<[u8]>,
    pub(crate) ignore_case: bool,
}

impl Literal {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

/// A set of code points, stored as numeric bounds so that the whole unicode range works.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CharRange {
    pub(crate) singles: Vec<char>,
    pub(crate) ranges: Vec<(u32, u32)>,
}

impl CharRange {
    pub fn new(singles: &str, ranges: impl IntoIterator<Item = (char, char)>) -> CharRange {
        CharRange {
            singles: singles.chars().collect(),
            ranges: ranges
                .into_iter()
                .map(|(lo, hi)| (lo as u32, hi as u32))
                .collect(),
        }
    }
    pub fn contains(&self, ch: char) -> bool {
        if self.singles.contains(&ch) {
            return true;
        }
        let code = ch as u32;
        self.ranges.iter().any(|&(lo, hi)| lo <= code && code <= hi)
    }
}

/// A reference to a rule by name, bound to its definition when the rule set is built.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RuleRef {
    pub(crate) name: Arc<str>,
    pub(crate) handle: Option<RuleHandle>,
}

impl RuleRef {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn handle(&self) -> Option<RuleHandle> {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Literal(Literal),
    CharRange(CharRange),
    AnyChar,

    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    OneOrMore(Box<Expr>),
    Optional(Box<Expr>),
    LookAhead(Box<Expr>),
    Not(Box<Expr>),
    /// Matches but is left out of the enclosing sequence's result.
    Discard(Box<Expr>),

    Label(Arc<str>, Box<Expr>),
    Action(Box<Expr>, ActionFunc),
    Slice(Box<Expr>),
    Concat(Box<Expr>),

    Rule(RuleRef),
}

impl Expr {
    pub fn literal(lit: impl AsRef<[u8]>) -> Expr {
        Expr::Literal(Literal {
            bytes: lit.as_ref().into(),
            ignore_case: false,
        })
    }
    pub fn literal_ignore_case(lit: impl AsRef<[u8]>) -> Expr {
        Expr::Literal(Literal {
            bytes: lit.as_ref().to_ascii_lowercase().into(),
            ignore_case: true,
        })
    }
    pub fn char_range(singles: &str, ranges: impl IntoIterator<Item = (char, char)>) -> Expr {
        Expr::CharRange(CharRange::new(singles, ranges))
    }
    pub fn any() -> Expr {
        Expr::AnyChar
    }
    pub fn seq(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Seq(exprs.into_iter().collect())
    }
    pub fn choice(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Choice(exprs.into_iter().collect())
    }
    pub fn repeat(expr: Expr) -> Expr {
        Expr::Repeat(Box::new(expr))
    }
    pub fn one_or_more(expr: Expr) -> Expr {
        Expr::OneOrMore(Box::new(expr))
    }
    pub fn optional(expr: Expr) -> Expr {
        Expr::Optional(Box::new(expr))
    }
    pub fn look_ahead(expr: Expr) -> Expr {
        Expr::LookAhead(Box::new(expr))
    }
    pub fn not(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }
    pub fn discard(expr: Expr) -> Expr {
        Expr::Discard(Box::new(expr))
    }
    pub fn label(name: impl Into<Arc<str>>, expr: Expr) -> Expr {
        Expr::Label(name.into(), Box::new(expr))
    }
    pub fn action(expr: Expr, action: ActionFunc) -> Expr {
        Expr::Action(Box::new(expr), action)
    }
    pub fn slice(expr: Expr) -> Expr {
        Expr::Slice(Box::new(expr))
    }
    pub fn concat(expr: Expr) -> Expr {
        Expr::Concat(Box::new(expr))
    }
    pub fn rule(name: impl Into<Arc<str>>) -> Expr {
        Expr::Rule(RuleRef {
            name: name.into(),
            handle: None,
        })
    }

    /// Direct child expressions, rule references are not followed.
    pub fn children(&self) -> &[Expr] {
        match self {
            Expr::Literal(_) | Expr::CharRange(_) | Expr::AnyChar | Expr::Rule(_) => &[],
            Expr::Seq(vec) | Expr::Choice(vec) => vec.as_slice(),
            Expr::Repeat(e)
            | Expr::OneOrMore(e)
            | Expr::Optional(e)
            | Expr::LookAhead(e)
            | Expr::Not(e)
            | Expr::Discard(e)
            | Expr::Label(_, e)
            | Expr::Action(e, _)
            | Expr::Slice(e)
            | Expr::Concat(e) => std::slice::from_ref(&**e),
        }
    }
    pub fn children_mut(&mut self) -> &mut [Expr] {
        match self {
            Expr::Literal(_) | Expr::CharRange(_) | Expr::AnyChar | Expr::Rule(_) => &mut [],
            Expr::Seq(vec) | Expr::Choice(vec) => vec.as_mut_slice(),
            Expr::Repeat(e)
            | Expr::OneOrMore(e)
            | Expr::Optional(e)
            | Expr::LookAhead(e)
            | Expr::Not(e)
            | Expr::Discard(e)
            | Expr::Label(_, e)
            | Expr::Action(e, _)
            | Expr::Slice(e)
            | Expr::Concat(e) => std::slice::from_mut(&mut **e),
        }
    }

    fn visit_impl(&self, f: &mut dyn FnMut(&Expr)) {
        for child in self.children() {
            child.visit_impl(f);
        }
        f(self)
    }
    /// Postorder traversal of the expression tree.
    pub fn visit(&self, mut f: impl FnMut(&Expr)) {
        self.visit_impl(&mut f)
    }
    fn visit_mut_impl(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        for child in self.children_mut() {
            child.visit_mut_impl(f);
        }
        f(self)
    }
    pub fn visit_mut(&mut self, mut f: impl FnMut(&mut Expr)) {
        self.visit_mut_impl(&mut f)
    }

    /// Labels an action over this expression can see.
    ///
    /// Labels inside nested actions belong to those actions' scopes and are skipped.
    pub fn labels(&self) -> Vec<Arc<str>> {
        fn collect(expr: &Expr, out: &mut Vec<Arc<str>>) {
            match expr {
                Expr::Action(..) => return,
                Expr::Label(name, _) if !out.contains(name) => out.push(name.clone()),
                _ => {}
            }
            for child in expr.children() {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }

    /// Matches this expression on its own.
    ///
    /// Panics when the expression references rules, those only work through a
    /// [`RuleSet`](crate::RuleSet).
    pub fn parse(&self, reader: &mut Reader) -> Result<Value, NoMatch<'_>> {
        Evaluator::standalone().eval_root(self, reader)
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal(value)
    }
}

impl From<CharRange> for Expr {
    fn from(value: CharRange) -> Self {
        Expr::CharRange(value)
    }
}

#[test]
fn test_char_range() {
    let range = CharRange::new("_-", [('a', 'z'), ('α', 'ω')]);
    assert!(range.contains('_'));
    assert!(range.contains('-'));
    assert!(range.contains('q'));
    assert!(range.contains('λ'));
    assert!(!range.contains('Q'));
    assert!(!range.contains('0'));
}

#[test]
fn test_labels() {
    let expr = Expr::seq([
        Expr::label("a", Expr::literal("a")),
        Expr::optional(Expr::label("b", Expr::rule("B"))),
        Expr::action(
            Expr::label("hidden", Expr::any()),
            ActionFunc::new("nil", |_, _| Value::Nil),
        ),
        Expr::label("a", Expr::literal("again")),
    ]);
    let labels = expr.labels();
    let labels: Vec<&str> = labels.iter().map(|s| &**s).collect();
    assert_eq!(labels, ["a", "b"]);
}

#[test]
fn test_visit_order() {
    let expr = Expr::seq([Expr::literal("a"), Expr::repeat(Expr::rule("b"))]);
    let mut seen = Vec::new();
    expr.visit(|e| seen.push(e.render_grammar(false)));
    assert_eq!(seen, ["\"a\"", "b", "b*", "\"a\" b*"]);
}

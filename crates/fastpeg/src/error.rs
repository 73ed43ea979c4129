use std::{cell::RefCell, fmt::Display};

use thiserror::Error;

use crate::expr::Expr;

/// The backtrackable failure of a single expression.
///
/// Carries the expression that failed and where, combinators that try alternatives keep
/// the one that got furthest into the input.
#[derive(Clone, Copy, Debug, Error)]
#[error("{} doesn't match at {}", .expr.render_grammar(false), .pos)]
pub struct NoMatch<'g> {
    pub expr: &'g Expr,
    pub pos: usize,
}

impl<'g> NoMatch<'g> {
    pub fn new(expr: &'g Expr, pos: usize) -> NoMatch<'g> {
        NoMatch { expr, pos }
    }

    /// Keeps the deeper of two failures, preferring `self` on a tie.
    pub fn furthest(self, other: NoMatch<'g>) -> NoMatch<'g> {
        match other.pos > self.pos {
            true => other,
            false => self,
        }
    }

    /// Merges into an accumulated failure, if any.
    pub fn merge_into(self, acc: &mut Option<NoMatch<'g>>) {
        *acc = Some(match acc.take() {
            Some(prev) => prev.furthest(self),
            None => self,
        });
    }
}

#[derive(Debug, Error)]
pub enum ParseError<'g> {
    #[error("{0}")]
    NoMatch(NoMatch<'g>),
    #[error("Entrypoint `{0}` not found")]
    UnknownEntrypoint(String),
}

impl<'g> From<NoMatch<'g>> for ParseError<'g> {
    fn from(value: NoMatch<'g>) -> Self {
        ParseError::NoMatch(value)
    }
}

impl<'g> ParseError<'g> {
    pub fn as_no_match(&self) -> Option<&NoMatch<'g>> {
        match self {
            ParseError::NoMatch(a) => Some(a),
            _ => None,
        }
    }
}

/// Mistakes in the grammar itself, found while building a rule set.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum GrammarError {
    #[error("Rule `{name}` referenced from `{from}` is not defined")]
    UnknownRule { name: String, from: String },
    #[error("Duplicate rule name `{0}`")]
    DuplicateRule(String),
    #[error("Precedence rule `{0}` has no atoms")]
    MissingAtoms(String),
    #[error("Precedence rule `{0}` has an atom before an operator level, atoms must come last")]
    MisplacedAtom(String),
    #[error("Action `{action}` in rule `{rule}` expects capture `{name}` which no label provides")]
    UnknownCapture {
        rule: String,
        action: String,
        name: String,
    },
    #[error("Entrypoint `{0}` not found")]
    UnknownEntrypoint(String),
    #[error("Rule set contains no rules")]
    Empty,
}

/// All errors reported while building one rule set.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GrammarErrors(pub Vec<GrammarError>);

impl GrammarErrors {
    pub fn errors(&self) -> &[GrammarError] {
        &self.0
    }
    pub fn contains(&self, error: &GrammarError) -> bool {
        self.0.contains(error)
    }
}

impl std::error::Error for GrammarErrors {}

impl Display for GrammarErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ErrorAccumulator {
    errors: RefCell<Vec<GrammarError>>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn error(&self, err: GrammarError) {
        log::debug!("grammar error: {err}");
        self.errors.borrow_mut().push(err);
    }
    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
    pub fn finish(self) -> Result<(), GrammarErrors> {
        let errors = self.errors.into_inner();
        match errors.is_empty() {
            true => Ok(()),
            false => Err(GrammarErrors(errors)),
        }
    }
}

#[test]
fn test_furthest() {
    let expr = Expr::any();
    let a = NoMatch::new(&expr, 2);
    let b = NoMatch::new(&expr, 5);
    assert_eq!(a.furthest(b).pos, 5);
    assert_eq!(b.furthest(a).pos, 5);

    let mut acc = None;
    a.merge_into(&mut acc);
    b.merge_into(&mut acc);
    NoMatch::new(&expr, 1).merge_into(&mut acc);
    assert_eq!(acc.map(|e| e.pos), Some(5));
}

#[test]
fn test_display() {
    let expr = Expr::literal("ab");
    assert_eq!(NoMatch::new(&expr, 3).to_string(), "\"ab\" doesn't match at 3");

    let errors = GrammarErrors(vec![
        GrammarError::DuplicateRule("a".into()),
        GrammarError::Empty,
    ]);
    assert_eq!(
        errors.to_string(),
        "Duplicate rule name `a`\nRule set contains no rules"
    );
}

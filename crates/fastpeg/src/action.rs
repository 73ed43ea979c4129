use std::{borrow::Cow, fmt::Debug, sync::Arc};

use fastpeg_runtime::{Captures, Value};

/// What an action gets to see besides the matched value.
pub struct ActionCx<'a> {
    input: &'a [u8],
    captures: &'a Captures,
}

impl<'a> ActionCx<'a> {
    pub fn new(input: &'a [u8], captures: &'a Captures) -> ActionCx<'a> {
        ActionCx { input, captures }
    }
    pub fn input(&self) -> &'a [u8] {
        self.input
    }
    pub fn captures(&self) -> &'a Captures {
        self.captures
    }
    /// A label bound in the action's scope, `None` if it didn't match.
    pub fn capture(&self, name: &str) -> Option<&'a Value> {
        self.captures.get(name)
    }
    pub fn text<'v>(&self, value: &'v Value) -> Cow<'v, str>
    where
        'a: 'v,
    {
        value.text(self.input)
    }
    /// Text of a bound label, empty if it isn't bound.
    pub fn capture_text(&self, name: &str) -> Cow<'a, str> {
        match self.capture(name) {
            Some(value) => value.text(self.input),
            None => Cow::Borrowed(""),
        }
    }
}

type ActionImpl = dyn Fn(&ActionCx<'_>, Value) -> Value + Send + Sync;
type UnaryImpl = dyn Fn(&ActionCx<'_>, Value, Value) -> Value + Send + Sync;
type InfixImpl = dyn Fn(&ActionCx<'_>, Value, Value, Value) -> Value + Send + Sync;

/// Semantic action attached to an expression.
///
/// `source` is only used when rendering the grammar. `names` are the labels the action
/// expects, the rule set checks that each of them is bound somewhere inside the action's
/// expression.
#[derive(Clone)]
pub struct ActionFunc {
    source: Arc<str>,
    names: Vec<Arc<str>>,
    func: Arc<ActionImpl>,
}

impl ActionFunc {
    pub fn new(
        source: impl Into<Arc<str>>,
        func: impl Fn(&ActionCx<'_>, Value) -> Value + Send + Sync + 'static,
    ) -> ActionFunc {
        ActionFunc {
            source: source.into(),
            names: Vec::new(),
            func: Arc::new(func),
        }
    }
    pub fn with_captures<I, S>(mut self, names: I) -> ActionFunc
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }
    pub fn call(&self, cx: &ActionCx<'_>, matched: Value) -> Value {
        (self.func)(cx, matched)
    }
}

impl Debug for ActionFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionFunc")
            .field("source", &self.source)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Action of a prefix or postfix operator, called as `(cx, matched, x)`.
#[derive(Clone)]
pub struct UnaryFn {
    source: Arc<str>,
    func: Arc<UnaryImpl>,
}

impl UnaryFn {
    pub fn new(
        source: impl Into<Arc<str>>,
        func: impl Fn(&ActionCx<'_>, Value, Value) -> Value + Send + Sync + 'static,
    ) -> UnaryFn {
        UnaryFn {
            source: source.into(),
            func: Arc::new(func),
        }
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn call(&self, cx: &ActionCx<'_>, matched: Value, x: Value) -> Value {
        (self.func)(cx, matched, x)
    }
}

impl Debug for UnaryFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UnaryFn").field(&self.source).finish()
    }
}

/// Action of an infix operator, called as `(cx, matched, lhs, rhs)`.
#[derive(Clone)]
pub struct InfixFn {
    source: Arc<str>,
    func: Arc<InfixImpl>,
}

impl InfixFn {
    pub fn new(
        source: impl Into<Arc<str>>,
        func: impl Fn(&ActionCx<'_>, Value, Value, Value) -> Value + Send + Sync + 'static,
    ) -> InfixFn {
        InfixFn {
            source: source.into(),
            func: Arc::new(func),
        }
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn call(&self, cx: &ActionCx<'_>, matched: Value, lhs: Value, rhs: Value) -> Value {
        (self.func)(cx, matched, lhs, rhs)
    }
}

impl Debug for InfixFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InfixFn").field(&self.source).finish()
    }
}

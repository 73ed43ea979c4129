//! A parsing expression grammar engine.
//!
//! Grammars are built out of [`Expr`] combinators and named [`RuleDef`]s, collected into a
//! [`RuleSet`] which binds rule references and validates the grammar once. Operator
//! grammars can be written as a [`PrecedenceRule`] which expands into one rule per
//! precedence level.
//!
//! ```
//! use fastpeg::{ActionFunc, Expr, Reader, RuleDef, RuleSet, Value};
//!
//! let digits = Expr::action(
//!     Expr::slice(Expr::one_or_more(Expr::char_range("", [('0', '9')]))),
//!     ActionFunc::new("int", |cx, v| Value::Int(cx.text(&v).parse().unwrap())),
//! );
//! let set = RuleSet::new([RuleDef::new("Number", digits)]).unwrap();
//!
//! let value = set.parse(&mut Reader::from_text("42")).unwrap();
//! assert_eq!(value, Value::Int(42));
//! ```

pub mod action;
mod display;
pub mod error;
mod eval;
pub mod expr;
pub mod grammar;
pub mod pratt;
mod resolve;

pub use action::{ActionCx, ActionFunc, InfixFn, UnaryFn};
pub use display::display_byte_literal;
pub use error::{GrammarError, GrammarErrors, NoMatch, ParseError};
pub use expr::{CharRange, Expr, Literal, RuleRef};
pub use grammar::{Definition, RuleBody, RuleDef, RuleHandle, RuleKind, RuleSet, RuleSetBuilder};
pub use pratt::{OpExpr, PrecedenceItem, PrecedenceRule};

pub use fastpeg_runtime::{Captures, Location, PseudoToken, Reader, Token, Value};

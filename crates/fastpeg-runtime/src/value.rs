use std::{any::Any, borrow::Cow, fmt::Debug, sync::Arc};

use bstr::ByteSlice;

use crate::token::{PseudoToken, Token};

/// The result of a successful match.
///
/// Terminals produce tokens, sequences and repetitions produce lists, actions produce
/// whatever they like.
#[derive(Clone)]
pub enum Value {
    Token(Token),
    Pseudo(PseudoToken),
    List(Vec<Value>),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bool(bool),
    Nil,
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Value {
        Value::Custom(Arc::new(value))
    }
    pub fn str(value: &str) -> Value {
        Value::Str(value.into())
    }

    pub fn as_token(&self) -> Option<Token> {
        match *self {
            Value::Token(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(a) => Some(a),
            Value::Int(a) => Some(a as f64),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(a) => Some(&**a),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(a) => Some(a.as_slice()),
            _ => None,
        }
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Custom(a) => a.downcast_ref(),
            _ => None,
        }
    }
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The input span of token-like values.
    pub fn span(&self) -> Option<Token> {
        match self {
            Value::Token(a) => Some(*a),
            Value::Pseudo(a) => Some(a.span()),
            _ => None,
        }
    }

    /// Flattens nested lists into their leaves, in order.
    pub fn flatten(self) -> Vec<Value> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }
    fn flatten_into(self, out: &mut Vec<Value>) {
        match self {
            Value::List(list) => {
                for value in list {
                    value.flatten_into(out);
                }
            }
            other => out.push(other),
        }
    }

    /// Matched content of the value.
    ///
    /// Lists concatenate their leaves, scalars produced by actions are formatted.
    pub fn bytes<'a>(&'a self, input: &'a [u8]) -> Cow<'a, [u8]> {
        match self {
            Value::Token(a) => Cow::Borrowed(a.bytes(input)),
            Value::Pseudo(a) => Cow::Borrowed(a.bytes()),
            Value::Str(a) => Cow::Borrowed(a.as_bytes()),
            Value::List(list) => {
                let mut buf = Vec::new();
                for value in list {
                    buf.extend_from_slice(&value.bytes(input));
                }
                Cow::Owned(buf)
            }
            Value::Int(a) => Cow::Owned(a.to_string().into_bytes()),
            Value::Float(a) => Cow::Owned(a.to_string().into_bytes()),
            Value::Bool(a) => Cow::Owned(a.to_string().into_bytes()),
            Value::Nil | Value::Custom(_) => Cow::Borrowed(&input[..0]),
        }
    }

    pub fn text<'a>(&'a self, input: &'a [u8]) -> Cow<'a, str> {
        match self.bytes(input) {
            Cow::Borrowed(a) => a.to_str_lossy(),
            Cow::Owned(a) => Cow::Owned(a.to_str_lossy().into_owned()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Token(a) => write!(f, "Token({a})"),
            Value::Pseudo(a) => write!(f, "Pseudo({}, {:?})", a.span(), a.text()),
            Value::List(a) => f.debug_list().entries(a).finish(),
            Value::Int(a) => write!(f, "Int({a})"),
            Value::Float(a) => write!(f, "Float({a})"),
            Value::Str(a) => write!(f, "Str({a:?})"),
            Value::Bool(a) => write!(f, "Bool({a})"),
            Value::Nil => write!(f, "Nil"),
            Value::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Token(a), Value::Token(b)) => a == b,
            (Value::Pseudo(a), Value::Pseudo(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Token> for Value {
    fn from(value: Token) -> Self {
        Value::Token(value)
    }
}

impl From<PseudoToken> for Value {
    fn from(value: PseudoToken) -> Self {
        Value::Pseudo(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

#[test]
fn test_flatten() {
    let value = Value::List(vec![
        Value::Token(Token::new(0, 1)),
        Value::List(vec![
            Value::List(vec![]),
            Value::Token(Token::new(1, 2)),
            Value::Int(3),
        ]),
    ]);
    assert_eq!(
        value.flatten(),
        vec![
            Value::Token(Token::new(0, 1)),
            Value::Token(Token::new(1, 2)),
            Value::Int(3),
        ]
    );
}

#[test]
fn test_text() {
    let input = b"hello world";
    let value = Value::List(vec![
        Value::Token(Token::new(0, 5)),
        Value::Pseudo(PseudoToken::new(5, 6, b"_".to_vec())),
        Value::Token(Token::new(6, 11)),
    ]);
    assert_eq!(value.text(input), "hello_world");
    assert_eq!(Value::Int(-4).text(input), "-4");
    assert_eq!(Value::Nil.text(input), "");
}

#[test]
fn test_custom() {
    #[derive(Debug, PartialEq)]
    struct Point(i32, i32);

    let value = Value::custom(Point(1, 2));
    assert_eq!(value.downcast_ref::<Point>(), Some(&Point(1, 2)));
    assert_eq!(value.downcast_ref::<i32>(), None);
    assert_eq!(value.clone(), value);
}

use std::sync::Arc;

use crate::value::Value;

/// Label bindings visible to an action.
///
/// Cloning is O(1), a scope hands a copy to each nested action and rule call
/// without ever observing what they bind.
#[derive(Clone, Default, Debug)]
pub struct Captures(im::HashMap<Arc<str>, Value>);

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
    /// Binds `name`, replacing any previous binding in this scope.
    pub fn insert(&mut self, name: Arc<str>, value: Value) -> Option<Value> {
        self.0.insert(name, value)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (&**name, value))
    }
}

#[test]
fn test_scope_copy() {
    let mut outer = Captures::new();
    outer.insert("x".into(), Value::Int(1));

    let mut inner = outer.clone();
    inner.insert("x".into(), Value::Int(2));
    inner.insert("y".into(), Value::Int(3));

    assert_eq!(outer.get("x"), Some(&Value::Int(1)));
    assert!(!outer.contains("y"));
    assert_eq!(inner.get("x"), Some(&Value::Int(2)));
    assert_eq!(inner.len(), 2);
}

//! Dynamic values and records: the currency of props, state, and context.
//!
//! A [`Record`] is an insertion-ordered keyed map with the shallow-merge
//! semantics the reconciler's state handling is defined in terms of.
//! [`Value`] covers the things a prop can be: scalars, lists, nested records,
//! renderable nodes, event handlers, and ref callbacks.

use crate::{
    element::{RefCallback, View},
    events::Handler,
};
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// A dynamically-typed prop, state, or context value.
#[derive(Clone)]
pub enum Value {
    /// Absence; writing `Null` over an existing prop removes it from the DOM.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Num(f64),
    /// A string.
    Str(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A nested record (used by `style` and `dangerous_inner_html`).
    Map(Record),
    /// A renderable node (used by `children`).
    Node(View),
    /// An event handler.
    Handler(Handler),
    /// A ref callback, invoked with the mounted public instance.
    Ref(RefCallback),
}

impl Value {
    /// The string inside `Str`, if that is what this is.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The number inside `Num`, if that is what this is.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean inside `Bool`, if that is what this is.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The record inside `Map`, if that is what this is.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Map(r) => Some(r),
            _ => None,
        }
    }

    /// The view inside `Node`, if that is what this is.
    pub fn as_view(&self) -> Option<&View> {
        match self {
            Value::Node(v) => Some(v),
            _ => None,
        }
    }

    /// The handler inside `Handler`, if that is what this is.
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Value::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// The callback inside `Ref`, if that is what this is.
    pub fn as_ref_callback(&self) -> Option<&RefCallback> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => Debug::fmt(b, f),
            Value::Num(n) => Debug::fmt(n, f),
            Value::Str(s) => Debug::fmt(s, f),
            Value::List(l) => f.debug_list().entries(l).finish(),
            Value::Map(r) => Debug::fmt(r, f),
            Value::Node(v) => Debug::fmt(v, f),
            Value::Handler(..) => f.write_str("<handler>"),
            Value::Ref(..) => f.write_str("<ref>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Num(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Num(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Map(r)
    }
}

impl From<View> for Value {
    fn from(v: View) -> Self {
        Value::Node(v)
    }
}

impl From<crate::element::Element> for Value {
    fn from(e: crate::element::Element) -> Self {
        Value::Node(View::Element(e))
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

impl From<RefCallback> for Value {
    fn from(r: RefCallback) -> Self {
        Value::Ref(r)
    }
}

/// An insertion-ordered keyed record. Writing to an existing key keeps the
/// key's original position, so serialised output is stable across updates.
#[derive(Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    /// An empty record.
    pub fn new() -> Self {
        Record::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read an entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(k, v)| if k == key { Some(v) } else { None })
    }

    /// Whether an entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Write an entry, keeping the key's existing position if present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Remove an entry, returning its value if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Shallow-merge `other` into `self`: every entry of `other` overwrites
    /// or appends.
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }

    /// A copy of `self` with `other` shallow-merged on top.
    pub fn merged(&self, other: &Record) -> Record {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// A copy containing only the entries whose keys appear in `keys`.
    /// This is the masking step of context propagation: unknown keys are
    /// dropped at each boundary.
    pub fn masked_by(&self, keys: &[&str]) -> Record {
        let mut out = Record::new();
        for (k, v) in self.iter() {
            if keys.contains(&k) {
                out.insert(k, v.clone());
            }
        }
        out
    }

    /// Builder-style insert, for terse construction in tests and defaults.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

/// Build a [`Record`] from `key => value` pairs.
///
/// ```
/// use arbor::{record, Value};
/// let props = record! { "id" => "x", "tabindex" => 3 };
/// assert_eq!(props.get("id"), Some(&Value::Str("x".into())));
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert($key, $crate::Value::from($value)); )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_survives_overwrites() {
        let mut r = record! { "a" => 1, "b" => 2 };
        r.insert("a", 3);
        let keys: Vec<&str> = r.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(r.get("a"), Some(&Value::Num(3.0)));
    }

    #[test]
    fn shallow_merge_overwrites_and_appends() {
        let base = record! { "a" => 1, "b" => 2 };
        let patch = record! { "b" => 20, "c" => 30 };
        let merged = base.merged(&patch);
        assert_eq!(merged.get("a"), Some(&Value::Num(1.0)));
        assert_eq!(merged.get("b"), Some(&Value::Num(20.0)));
        assert_eq!(merged.get("c"), Some(&Value::Num(30.0)));
    }

    #[test]
    fn masking_drops_unknown_keys() {
        let ctx = record! { "theme" => "dark", "secret" => 42 };
        let masked = ctx.masked_by(&["theme"]);
        assert_eq!(masked.len(), 1);
        assert!(masked.contains_key("theme"));
    }

    #[test]
    fn handlers_compare_by_identity() {
        let h = Handler::new(|_| {});
        assert_eq!(Value::from(h.clone()), Value::from(h.clone()));
        assert_ne!(Value::from(h), Value::from(Handler::new(|_| {})));
    }
}

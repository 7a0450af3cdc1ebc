//! Immutable, structurally shared model values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::path::Segment;

/// An ordered map of named children. Keys keep insertion order.
#[derive(Clone, Debug, Default)]
pub struct Fields(Vec<(Arc<str>, Node)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0
            .iter()
            .find_map(|(name, value)| (name.as_ref() == key).then_some(value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace `key`, keeping the original position of an existing key.
    /// Inserting [`Node::Missing`] removes the key.
    pub fn insert(&mut self, key: impl Into<Arc<str>>, value: Node) {
        let key = key.into();
        let position = self.0.iter().position(|(name, _)| *name == key);
        match (position, value) {
            (Some(position), Node::Missing) => {
                self.0.remove(position);
            }
            (Some(position), value) => self.0[position].1 = value,
            (None, Node::Missing) => {}
            (None, value) => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let position = self.0.iter().position(|(name, _)| name.as_ref() == key)?;
        Some(self.0.remove(position).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(name, value)| (name.as_ref(), value))
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|theirs| theirs == value))
    }
}

impl<K: Into<Arc<str>>> FromIterator<(K, Node)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// A model value.
///
/// Containers hold their children behind `Arc`, so cloning a node is cheap and
/// an update rebuilds only the spine from the root to the changed location.
/// Everything else keeps pointer identity with the previous snapshot, which is
/// what [`Node::same`] observes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Node {
    /// No value at all. Reads through absent branches produce this.
    #[default]
    Missing,
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    List(Arc<Vec<Node>>),
    Map(Arc<Fields>),
}

impl Node {
    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Node::List(Arc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<Arc<str>>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Map(Arc::new(entries.into_iter().collect()))
    }

    pub fn empty_map() -> Self {
        Node::Map(Arc::new(Fields::new()))
    }

    /// Serialize a typed model into a tree.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(model).map(Node::from)
    }

    /// Deserialize the tree into a typed model.
    pub fn to_model<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Node::Missing)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// `Missing` or `Null`: lookups stop here instead of descending.
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Node::Missing | Node::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(value) => value.as_f64(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Node::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// A list or map with at least one child.
    pub fn is_iterable(&self) -> bool {
        match self {
            Node::List(items) => !items.is_empty(),
            Node::Map(fields) => !fields.is_empty(),
            _ => false,
        }
    }

    /// Own keys in order: list positions or map keys.
    pub fn child_segments(&self) -> Vec<Segment> {
        match self {
            Node::List(items) => (0..items.len()).map(Segment::index).collect(),
            Node::Map(fields) => fields.keys().map(Segment::key).collect(),
            _ => Vec::new(),
        }
    }

    /// The child addressed by `segment`, or `Missing`.
    pub fn child(&self, segment: &Segment) -> Node {
        match self {
            Node::List(items) => segment
                .as_index()
                .and_then(|index| items.get(index))
                .cloned()
                .unwrap_or_default(),
            Node::Map(fields) => fields
                .get(segment.as_key())
                .cloned()
                .unwrap_or_default(),
            _ => Node::Missing,
        }
    }

    /// Identity comparison: scalars by value, containers by allocation.
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Missing, Node::Missing) | (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Number(a), Node::Number(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b),
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// [`Node::same`], plus two lists of equal length whose elements are
    /// pairwise `same`, and any two empty maps.
    pub fn equivalent(&self, other: &Node) -> bool {
        if self.same(other) {
            return true;
        }
        match (self, other) {
            (Node::List(a), Node::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same(y))
            }
            (Node::Map(a), Node::Map(b)) => a.is_empty() && b.is_empty(),
            _ => false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self.same(other),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(value) => Node::Bool(value),
            Value::Number(value) => Node::Number(value),
            Value::String(value) => Node::String(value.into()),
            Value::Array(items) => Node::list(items.into_iter().map(Node::from)),
            Value::Object(entries) => Node::map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value))),
            ),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Missing | Node::Null => Value::Null,
            Node::Bool(value) => Value::Bool(value),
            Node::Number(value) => Value::Number(value),
            Node::String(value) => Value::String(value.to_string()),
            Node::List(items) => Value::Array(items.iter().cloned().map(Value::from).collect()),
            Node::Map(fields) => {
                let mut entries = Map::with_capacity(fields.len());
                for (key, value) in fields.iter() {
                    if !value.is_missing() {
                        entries.insert(key.to_owned(), Value::from(value.clone()));
                    }
                }
                Value::Object(entries)
            }
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.into())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value.into())
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Number(value.into())
    }
}

impl From<u64> for Node {
    fn from(value: u64) -> Self {
        Node::Number(value.into())
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Node::Missing, Into::into)
    }
}

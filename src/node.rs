//! Tree node data model.
//!
//! A [`Node`] is recursively a scalar, an ordered sequence, or a keyed
//! mapping. Two opt-in leaf capabilities round out the model: [`Node::Lazy`]
//! wraps a zero-argument producer whose result substitutes for the leaf
//! during reads, and [`Node::Extern`] wraps an external object that resolves
//! dotted-path segments itself via the [`Resolve`] trait.
//!
//! `Null` doubles as the explicit placeholder for unassigned sequence slots:
//! a sequence's length always equals one plus its highest assigned index,
//! with gaps filled by `Null` rather than left absent.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

/// Mapping storage. `BTreeMap` gives a deterministic iteration order;
/// enumerated keys are sorted again on the joined string anyway.
pub type Map = BTreeMap<String, Node>;

/// Zero-argument producer backing a lazily computed leaf.
pub type Producer = Arc<dyn Fn() -> Node + Send + Sync>;

/// Capability interface for external leaf objects that participate in
/// dotted-path traversal. Collection nodes satisfy this implicitly; foreign
/// objects opt in explicitly — there is no runtime reflection fallback.
pub trait Resolve: Send + Sync {
    /// Resolve one path segment against this object. Index segments are
    /// presented in their decimal string form.
    fn resolve_segment(&self, label: &str) -> Option<Node>;
}

#[derive(Clone, Default)]
pub enum Node {
    /// Opaque empty value; also the placeholder for unassigned sequence slots.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Order-significant, 0-based, contiguous.
    Seq(Vec<Node>),
    Map(Map),
    /// Lazily computed leaf; invoked repeatedly during reads until a
    /// non-producer value appears.
    Lazy(Producer),
    /// External object resolving its own sub-paths.
    Extern(Arc<dyn Resolve>),
}

impl Node {
    /// Wrap a zero-argument producer as a lazy leaf.
    pub fn lazy<F>(producer: F) -> Node
    where
        F: Fn() -> Node + Send + Sync + 'static,
    {
        Node::Lazy(Arc::new(producer))
    }

    /// Wrap an external object as a resolvable leaf.
    pub fn external<R>(object: R) -> Node
    where
        R: Resolve + 'static,
    {
        Node::Extern(Arc::new(object))
    }

    /// Invoke producers until a non-producer value appears.
    pub fn resolved(self) -> Node {
        let mut current = self;
        while let Node::Lazy(producer) = current {
            current = producer();
        }
        current
    }

    /// True for sequence and mapping nodes; everything else is a leaf for
    /// key-enumeration purposes.
    pub fn is_collection(&self) -> bool {
        matches!(self, Node::Seq(_) | Node::Map(_))
    }

    /// Number of direct children of a collection node.
    pub fn len(&self) -> Option<usize> {
        match self {
            Node::Seq(seq) => Some(seq.len()),
            Node::Map(map) => Some(map.len()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(seq) => Some(seq.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => f.write_str("Null"),
            Node::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Node::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Node::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Node::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Node::Seq(seq) => f.debug_tuple("Seq").field(seq).finish(),
            Node::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Node::Lazy(_) => f.write_str("Lazy(..)"),
            Node::Extern(_) => f.write_str("Extern(..)"),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Null, Node::Null) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Int(a), Node::Int(b)) => a == b,
            (Node::Float(a), Node::Float(b)) => a == b,
            (Node::Str(a), Node::Str(b)) => a == b,
            (Node::Seq(a), Node::Seq(b)) => a == b,
            (Node::Map(a), Node::Map(b)) => a == b,
            // Opaque handles compare by identity.
            (Node::Lazy(a), Node::Lazy(b)) => Arc::ptr_eq(a, b),
            (Node::Extern(a), Node::Extern(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Scalar rendering used by expansion `__format__` templates: `null`,
/// `true`/`false`, bare numbers, raw strings; collections render as compact
/// JSON; opaque handles render as placeholders.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => f.write_str("null"),
            Node::Bool(value) => write!(f, "{}", value),
            Node::Int(value) => write!(f, "{}", value),
            Node::Float(value) => write!(f, "{}", value),
            Node::Str(value) => f.write_str(value),
            Node::Seq(_) | Node::Map(_) => {
                let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&rendered)
            }
            Node::Lazy(_) => f.write_str("<lazy>"),
            Node::Extern(_) => f.write_str("<extern>"),
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(value) => serializer.serialize_bool(*value),
            Node::Int(value) => serializer.serialize_i64(*value),
            Node::Float(value) => serializer.serialize_f64(*value),
            Node::Str(value) => serializer.serialize_str(value),
            Node::Seq(seq) => seq.serialize(serializer),
            Node::Map(map) => map.serialize(serializer),
            // Producers serialize as their resolved value.
            Node::Lazy(producer) => producer().resolved().serialize(serializer),
            // External handles have no JSON representation.
            Node::Extern(_) => serializer.serialize_unit(),
        }
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::Int(i64::from(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Int(value)
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Float(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Str(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Str(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Seq(value)
    }
}

impl From<Map> for Node {
    fn from(value: Map) -> Self {
        Node::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_lazy_chain_when_resolving_then_unwraps_to_final_value() {
        let node = Node::lazy(|| Node::lazy(|| Node::from("done")));
        assert_eq!(node.resolved(), Node::from("done"));
    }

    #[test]
    fn given_scalars_when_displaying_then_renders_plain_forms() {
        assert_eq!(Node::Null.to_string(), "null");
        assert_eq!(Node::from(true).to_string(), "true");
        assert_eq!(Node::from(42_i64).to_string(), "42");
        assert_eq!(Node::from("plain").to_string(), "plain");
    }

    #[test]
    fn given_collection_when_displaying_then_renders_compact_json() {
        let mut map = Map::new();
        map.insert("a".to_string(), Node::from(1_i64));
        assert_eq!(Node::Map(map).to_string(), r#"{"a":1}"#);
    }

    #[test]
    fn given_lazy_node_when_serializing_then_emits_resolved_value() {
        let node = Node::lazy(|| Node::from(7_i64));
        assert_eq!(serde_json::to_string(&node).unwrap(), "7");
    }

    #[test]
    fn given_same_producer_when_comparing_then_equal_by_identity() {
        let node = Node::lazy(|| Node::Null);
        let alias = node.clone();
        assert_eq!(node, alias);
        assert_ne!(node, Node::lazy(|| Node::Null));
    }
}

//! The context tree: dotted-path access to nested data.
//!
//! All reads and writes go through dotted path strings. Writes
//! autovivify: missing intermediate mappings and sequences are created on
//! the way down, sequences are padded with `Null` placeholders so indices
//! stay contiguous, and structured values are rebuilt so dotted keys inside
//! them obey the same assignment semantics as top-level paths.
//!
//! The tree owns its nodes exclusively. Reads hand out deep clones; there
//! is no aliasing of interior nodes across trees.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};
use tracing::instrument;

use crate::errors::{TreeError, TreeResult};
use crate::node::{Map, Node};
use crate::path::{self, Segment};

/// Constructor invoked whenever a new intermediate mapping must be created.
/// Injectable so callers can pre-seed freshly created mappings.
pub type MapCtor = Arc<dyn Fn() -> Map + Send + Sync>;

/// Formatting options for [`Tree::dumps_with`], passed through to the JSON
/// serializer uninterpreted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Spaces per indentation level; `None` renders compact.
    pub indent: Option<usize>,
}

pub struct Tree {
    data: Map,
    map_ctor: MapCtor,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Tree {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            map_ctor: Arc::clone(&self.map_ctor),
        }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree").field("data", &self.data).finish()
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Serialize for Tree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.data.serialize(serializer)
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            data: Map::new(),
            map_ctor: Arc::new(Map::new),
        }
    }

    /// Create an empty tree with an injected mapping constructor.
    pub fn with_map_ctor(map_ctor: MapCtor) -> Self {
        Self {
            data: (map_ctor)(),
            map_ctor,
        }
    }

    /// Create a tree from an initial mapping payload. The payload is driven
    /// through [`Tree::set`] pair by pair, never aliased, so dotted keys
    /// inside it are parsed and expanded.
    pub fn from_payload(payload: Map) -> TreeResult<Self> {
        let mut tree = Self::new();
        tree.update(payload)?;
        Ok(tree)
    }

    /// [`Tree::from_payload`] with an injected mapping constructor.
    pub fn from_payload_with_ctor(payload: Map, map_ctor: MapCtor) -> TreeResult<Self> {
        let mut tree = Self::with_map_ctor(map_ctor);
        tree.update(payload)?;
        Ok(tree)
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &Map {
        &self.data
    }

    /// Consume the tree, returning the underlying mapping.
    pub fn into_inner(self) -> Map {
        self.data
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resolve `path` and return a deep clone of the node there.
    ///
    /// Lazy producers encountered along the walk (including at the final
    /// position) are invoked repeatedly until a non-producer value appears;
    /// external leaves resolve segments through [`crate::node::Resolve`].
    #[instrument(level = "trace", skip(self))]
    pub fn get(&self, path: &str) -> TreeResult<Node> {
        let segments = path::parse(path);
        Ok(self.lookup(&segments)?.into_owned())
    }

    /// True iff [`Tree::get`] succeeds.
    #[instrument(level = "trace", skip(self))]
    pub fn contains(&self, path: &str) -> bool {
        self.lookup(&path::parse(path)).is_ok()
    }

    /// [`Tree::get`] that swallows a failed lookup by writing `default`
    /// back into the tree and returning it. Auto-vivifies on read: after
    /// this call, a plain `get` at the same path succeeds. Failures other
    /// than a missed lookup propagate.
    #[instrument(level = "trace", skip(self, default))]
    pub fn get_or_insert(&mut self, path: &str, default: impl Into<Node>) -> TreeResult<Node> {
        match self.get(path) {
            Ok(node) => Ok(node),
            Err(TreeError::KeyNotFound { .. }) => {
                let default = default.into();
                self.set(path, default.clone())?;
                Ok(default)
            }
            Err(err) => Err(err),
        }
    }

    /// Assign `value` at `path`, creating intermediate structure as needed.
    ///
    /// At each step down, a missing slot is initialized as a sequence when
    /// the following segment is an index and as a mapping otherwise. An
    /// existing mapping child is preserved and descended into when the next
    /// segment is a label; any other shape mismatch replaces the existing
    /// value wholesale. Mapping and sequence values are rebuilt before
    /// assignment so their own dotted keys re-enter these semantics.
    #[instrument(level = "trace", skip(self, value))]
    pub fn set(&mut self, path: &str, value: impl Into<Node>) -> TreeResult<()> {
        if path.is_empty() {
            return Err(TreeError::EmptyPath);
        }
        let segments = path::parse(path);
        let value = self.build_value(value.into())?;
        Self::assign_map(&mut self.data, &segments, 0, value, &self.map_ctor)
    }

    /// Remove the entry at `path`.
    ///
    /// Walks to the parent with plain collection traversal (no producer
    /// resolution, no auto-creation) and removes the final key or index.
    /// Removing a sequence element shifts subsequent elements down.
    #[instrument(level = "trace", skip(self))]
    pub fn delete(&mut self, path: &str) -> TreeResult<()> {
        if path.is_empty() {
            return Err(TreeError::EmptyPath);
        }
        let segments = path::parse(path);
        if segments.len() == 1 {
            if self.data.remove(segments[0].map_key().as_ref()).is_none() {
                return Err(key_not_found(&segments));
            }
            return Ok(());
        }

        let parent_end = segments.len() - 1;
        let mut node: &mut Node = match self.data.get_mut(segments[0].map_key().as_ref()) {
            Some(node) => node,
            None => return Err(key_not_found(&segments[..1])),
        };
        for i in 1..parent_end {
            node = match node {
                Node::Map(map) => map
                    .get_mut(segments[i].map_key().as_ref())
                    .ok_or_else(|| key_not_found(&segments[..=i]))?,
                Node::Seq(seq) => match &segments[i] {
                    Segment::Index(index) => seq
                        .get_mut(*index)
                        .ok_or_else(|| key_not_found(&segments[..=i]))?,
                    Segment::Label(_) => return Err(key_not_found(&segments[..=i])),
                },
                _ => return Err(unsupported_shape(&segments[..=i])),
            };
        }

        match node {
            Node::Map(map) => {
                if map.remove(segments[parent_end].map_key().as_ref()).is_none() {
                    return Err(key_not_found(&segments));
                }
                Ok(())
            }
            Node::Seq(seq) => match &segments[parent_end] {
                Segment::Index(index) if *index < seq.len() => {
                    seq.remove(*index);
                    Ok(())
                }
                _ => Err(key_not_found(&segments)),
            },
            _ => Err(unsupported_shape(&segments)),
        }
    }

    /// Read-then-delete. A missed lookup yields `None`; a failed delete is
    /// ignored. Shape failures on the read propagate.
    #[instrument(level = "trace", skip(self))]
    pub fn pop(&mut self, path: &str) -> TreeResult<Option<Node>> {
        let value = match self.get(path) {
            Ok(node) => Some(node),
            Err(TreeError::KeyNotFound { .. }) => None,
            Err(err) => return Err(err),
        };
        self.delete(path).ok();
        Ok(value)
    }

    /// Merge a mapping payload by driving each top-level pair through
    /// [`Tree::set`].
    pub fn update(&mut self, payload: Map) -> TreeResult<()> {
        for (key, value) in payload {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Merge another tree leaf by leaf via its enumerated items.
    pub fn update_tree(&mut self, other: &Tree) -> TreeResult<()> {
        for (key, value) in other.items()? {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// All leaf paths of the tree, sorted lexicographically on the joined
    /// dotted string. Scalars, producers, and external leaves contribute
    /// their own key; empty collections contribute nothing.
    #[instrument(level = "trace", skip(self))]
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for (label, child) in &self.data {
            Self::append_keys(&mut keys, label, child);
        }
        keys.sort();
        keys
    }

    /// Leaf paths beneath `root`. A scalar there yields the singleton
    /// `[root]` (or `[""]` when stripping); otherwise results carry the
    /// `root.` prefix unless `strip` is set.
    #[instrument(level = "trace", skip(self))]
    pub fn keys_under(&self, root: &str, strip: bool) -> TreeResult<Vec<String>> {
        let node = self.get(root)?;
        if !node.is_collection() {
            return Ok(vec![if strip { String::new() } else { root.to_string() }]);
        }
        let mut keys = Self::node_keys(&node);
        keys.sort();
        if !strip {
            keys = keys
                .into_iter()
                .map(|key| format!("{}.{}", root, key))
                .collect();
        }
        Ok(keys)
    }

    /// Enumerated keys paired with their values.
    pub fn items(&self) -> TreeResult<Vec<(String, Node)>> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// [`Tree::items`] scoped beneath `root`.
    pub fn items_under(&self, root: &str) -> TreeResult<Vec<(String, Node)>> {
        self.keys_under(root, false)?
            .into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Deep clone of the whole tree.
    pub fn copy(&self) -> Tree {
        self.clone()
    }

    /// Deep clone of the subtree at `path`, or the whole tree as a mapping
    /// node when omitted.
    #[instrument(level = "trace", skip(self))]
    pub fn value(&self, path: Option<&str>) -> TreeResult<Node> {
        match path {
            Some(path) => self.get(path),
            None => Ok(Node::Map(self.data.clone())),
        }
    }

    /// Serialize the whole tree (or the subtree at `path`) to JSON. An
    /// unresolvable path serializes as `null` rather than failing.
    pub fn dumps(&self, path: Option<&str>) -> TreeResult<String> {
        self.dumps_with(path, DumpOptions::default())
    }

    pub fn dumps_with(&self, path: Option<&str>, options: DumpOptions) -> TreeResult<String> {
        match path {
            None => render_json(&self.data, options),
            Some(path) => match self.get(path) {
                Ok(node) => render_json(&node, options),
                Err(TreeError::KeyNotFound { .. }) => render_json(&Node::Null, options),
                Err(err) => Err(err),
            },
        }
    }

    fn lookup(&self, segments: &[Segment]) -> TreeResult<Cow<'_, Node>> {
        let mut current: Cow<'_, Node> = match self.data.get(segments[0].map_key().as_ref()) {
            Some(node) => Cow::Borrowed(node),
            None => return Err(key_not_found(&segments[..1])),
        };
        current = resolve_producers(current);
        for (i, segment) in segments.iter().enumerate().skip(1) {
            current = descend(current, segment, &segments[..=i])?;
            current = resolve_producers(current);
        }
        Ok(current)
    }

    /// Rebuild a structured value so each of its own dotted keys re-enters
    /// the assignment semantics. Pure: returns new structure, never mutates
    /// the input. Producers inside structured input are resolved; a
    /// directly-assigned producer leaf stays lazy.
    fn build_value(&self, value: Node) -> TreeResult<Node> {
        match value {
            Node::Map(payload) => {
                let mut rebuilt = (self.map_ctor)();
                for (key, child) in payload {
                    let child = self.build_value(child.resolved())?;
                    let segments = path::parse(&key);
                    Self::assign_map(&mut rebuilt, &segments, 0, child, &self.map_ctor)?;
                }
                Ok(Node::Map(rebuilt))
            }
            Node::Seq(items) => {
                let rebuilt = items
                    .into_iter()
                    .map(|item| self.build_value(item.resolved()))
                    .collect::<TreeResult<Vec<_>>>()?;
                Ok(Node::Seq(rebuilt))
            }
            other => Ok(other),
        }
    }

    fn assign_map(
        map: &mut Map,
        segments: &[Segment],
        pos: usize,
        value: Node,
        map_ctor: &MapCtor,
    ) -> TreeResult<()> {
        let key = segments[pos].map_key().into_owned();
        if pos + 1 == segments.len() {
            map.insert(key, value);
            return Ok(());
        }
        let next = &segments[pos + 1];
        let child = map
            .entry(key)
            .or_insert_with(|| fresh_container(next, map_ctor));
        if !shape_matches(child, next) {
            *child = fresh_container(next, map_ctor);
        }
        Self::assign_node(child, segments, pos + 1, value, map_ctor)
    }

    fn assign_node(
        node: &mut Node,
        segments: &[Segment],
        pos: usize,
        value: Node,
        map_ctor: &MapCtor,
    ) -> TreeResult<()> {
        match node {
            Node::Map(map) => Self::assign_map(map, segments, pos, value, map_ctor),
            Node::Seq(seq) => {
                let index = match &segments[pos] {
                    Segment::Index(index) => *index,
                    Segment::Label(_) => return Err(unsupported_shape(&segments[..=pos])),
                };
                if seq.len() < index + 1 {
                    seq.resize(index + 1, Node::Null);
                }
                if pos + 1 == segments.len() {
                    seq[index] = value;
                    return Ok(());
                }
                let next = &segments[pos + 1];
                let slot = &mut seq[index];
                match slot {
                    Node::Null => *slot = fresh_container(next, map_ctor),
                    Node::Map(_) | Node::Seq(_) => {
                        if !shape_matches(slot, next) {
                            *slot = fresh_container(next, map_ctor);
                        }
                    }
                    // A concrete scalar occupying the slot cannot be
                    // descended through.
                    _ => return Err(unsupported_shape(&segments[..=pos])),
                }
                Self::assign_node(slot, segments, pos + 1, value, map_ctor)
            }
            _ => Err(unsupported_shape(&segments[..=pos])),
        }
    }

    fn node_keys(node: &Node) -> Vec<String> {
        let mut keys = Vec::new();
        match node {
            Node::Map(map) => {
                for (label, child) in map {
                    Self::append_keys(&mut keys, label, child);
                }
            }
            Node::Seq(seq) => {
                for (index, child) in seq.iter().enumerate() {
                    Self::append_keys(&mut keys, &index.to_string(), child);
                }
            }
            _ => {}
        }
        keys
    }

    fn append_keys(keys: &mut Vec<String>, label: &str, child: &Node) {
        if child.is_collection() {
            for sub in Self::node_keys(child) {
                keys.push(format!("{}.{}", label, sub));
            }
        } else {
            keys.push(label.to_string());
        }
    }
}

/// Container for a fresh slot, chosen by the segment that will descend into
/// it next: sequences for indices, mappings for labels.
fn fresh_container(next: &Segment, map_ctor: &MapCtor) -> Node {
    match next {
        Segment::Index(_) => Node::Seq(Vec::new()),
        Segment::Label(_) => Node::Map((map_ctor)()),
    }
}

/// An existing child survives descent only when its shape matches the next
/// segment kind; everything else is replaced wholesale.
fn shape_matches(node: &Node, next: &Segment) -> bool {
    matches!(
        (node, next),
        (Node::Map(_), Segment::Label(_)) | (Node::Seq(_), Segment::Index(_))
    )
}

fn resolve_producers(node: Cow<'_, Node>) -> Cow<'_, Node> {
    match &*node {
        Node::Lazy(_) => Cow::Owned(node.into_owned().resolved()),
        _ => node,
    }
}

fn descend<'a>(
    current: Cow<'a, Node>,
    segment: &Segment,
    attempted: &[Segment],
) -> TreeResult<Cow<'a, Node>> {
    match current {
        Cow::Borrowed(node) => match node {
            Node::Map(map) => map
                .get(segment.map_key().as_ref())
                .map(Cow::Borrowed)
                .ok_or_else(|| key_not_found(attempted)),
            Node::Seq(seq) => match segment {
                Segment::Index(index) => seq
                    .get(*index)
                    .map(Cow::Borrowed)
                    .ok_or_else(|| key_not_found(attempted)),
                Segment::Label(_) => Err(key_not_found(attempted)),
            },
            Node::Extern(object) => object
                .resolve_segment(segment.map_key().as_ref())
                .map(Cow::Owned)
                .ok_or_else(|| key_not_found(attempted)),
            _ => Err(unsupported_shape(attempted)),
        },
        Cow::Owned(node) => match node {
            Node::Map(mut map) => map
                .remove(segment.map_key().as_ref())
                .map(Cow::Owned)
                .ok_or_else(|| key_not_found(attempted)),
            Node::Seq(mut seq) => match segment {
                // Order no longer matters once the sequence is owned;
                // everything but the picked element is dropped.
                Segment::Index(index) if *index < seq.len() => {
                    Ok(Cow::Owned(seq.swap_remove(*index)))
                }
                _ => Err(key_not_found(attempted)),
            },
            Node::Extern(object) => object
                .resolve_segment(segment.map_key().as_ref())
                .map(Cow::Owned)
                .ok_or_else(|| key_not_found(attempted)),
            _ => Err(unsupported_shape(attempted)),
        },
    }
}

fn key_not_found(attempted: &[Segment]) -> TreeError {
    TreeError::KeyNotFound {
        path: path::join(attempted),
    }
}

fn unsupported_shape(attempted: &[Segment]) -> TreeError {
    TreeError::UnsupportedShape {
        path: path::join(attempted),
    }
}

fn render_json<T: Serialize>(value: &T, options: DumpOptions) -> TreeResult<String> {
    match options.indent {
        None => Ok(serde_json::to_string(value)?),
        Some(width) => {
            let indent = " ".repeat(width).into_bytes();
            let mut buffer = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8_lossy(&buffer).into_owned())
        }
    }
}

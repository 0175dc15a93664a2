//! Combinatorial expansion of parameterized trees.
//!
//! A mapping node carrying one of the reserved descriptor keys is a
//! parameter *axis*: `__choices__` holds an explicit candidate sequence,
//! `__range__` holds 1–3 integers interpreted as a half-open
//! start/stop/step range. `__format__` renders each candidate through a
//! `{value}` template and `__exclude__` drops candidates (checked against
//! the raw value and again after formatting). Expansion enumerates the
//! cartesian product of all axes, yielding one concrete tree per
//! combination with every descriptor mapping replaced by its chosen value.

use std::vec::IntoIter;

use itertools::structs::MultiProduct;
use itertools::Itertools;
use tracing::debug;

use crate::errors::{TreeError, TreeResult};
use crate::node::Node;
use crate::tree::Tree;

pub const CHOICES_KEY: &str = "__choices__";
pub const RANGE_KEY: &str = "__range__";
pub const FORMAT_KEY: &str = "__format__";
pub const EXCLUDE_KEY: &str = "__exclude__";

impl Tree {
    /// Enumerate the cartesian product of all parameter axes as a lazy
    /// sequence of concrete trees.
    ///
    /// Choices axes come first (in first-seen order of the sorted keys),
    /// then range axes; the last axis varies fastest. A tree without axes
    /// yields exactly one clone of itself; an axis left without candidates
    /// after exclusion empties the whole product. Each call starts a fresh
    /// enumeration. Callers wanting the raw structure instead of trees take
    /// [`Tree::into_inner`] on each yield.
    pub fn expand(&self) -> TreeResult<Expansion> {
        Expansion::new(self)
    }
}

/// Lazy iterator over the expanded trees.
pub struct Expansion {
    base: Tree,
    axes: Vec<String>,
    product: Option<MultiProduct<IntoIter<Node>>>,
    done: bool,
}

impl Expansion {
    fn new(tree: &Tree) -> TreeResult<Self> {
        let (choices, ranges) = detect_axes(tree);
        let axes: Vec<String> = choices.into_iter().chain(ranges).collect();
        debug!(axes = axes.len(), "expansion axes detected");

        let mut values = Vec::with_capacity(axes.len());
        for axis in &axes {
            values.push(axis_values(tree, axis)?);
        }
        let product = if axes.is_empty() {
            None
        } else {
            Some(values.into_iter().multi_cartesian_product())
        };
        Ok(Self {
            base: tree.clone(),
            axes,
            product,
            done: false,
        })
    }

    /// The axis prefixes in product order.
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    fn realize(&self, combination: Vec<Node>) -> TreeResult<Tree> {
        let mut tree = self.base.clone();
        for (axis, value) in self.axes.iter().zip(combination) {
            tree.set(axis, value)?;
        }
        Ok(tree)
    }
}

impl Iterator for Expansion {
    type Item = TreeResult<Tree>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.product {
            Some(product) => {
                let combination = product.next()?;
                Some(self.realize(combination))
            }
            // No axes: the product of zero factors is a single empty
            // combination, i.e. one unchanged clone.
            None => {
                if self.done {
                    return None;
                }
                self.done = true;
                Some(Ok(self.base.clone()))
            }
        }
    }
}

/// Scan enumerated keys for axis prefixes. Each distinct prefix is
/// recorded once; first occurrence in sorted key order wins.
fn detect_axes(tree: &Tree) -> (Vec<String>, Vec<String>) {
    let mut choices = Vec::new();
    let mut ranges = Vec::new();
    for key in tree.keys() {
        if let Some(prefix) = axis_prefix(&key, CHOICES_KEY) {
            if !choices.contains(&prefix) {
                choices.push(prefix);
            }
        } else if let Some(prefix) = axis_prefix(&key, RANGE_KEY) {
            if !ranges.contains(&prefix) {
                ranges.push(prefix);
            }
        }
    }
    (choices, ranges)
}

/// The prefix before `tag` when `tag` appears as an interior or trailing
/// path segment of `key`.
fn axis_prefix(key: &str, tag: &str) -> Option<String> {
    let infix = format!(".{}.", tag);
    if let Some(pos) = key.find(&infix) {
        return Some(key[..pos].to_string());
    }
    let suffix = format!(".{}", tag);
    key.strip_suffix(&suffix).map(str::to_string)
}

/// Resolve the candidate values for one axis: explicit choices if present,
/// otherwise the materialized range, minus exclusions, through the
/// optional format template.
fn axis_values(tree: &Tree, prefix: &str) -> TreeResult<Vec<Node>> {
    let format = optional(tree.get(&format!("{}.{}", prefix, FORMAT_KEY)))?;

    let choices_path = format!("{}.{}", prefix, CHOICES_KEY);
    let raw: Vec<Node> = match optional(tree.get(&choices_path))? {
        Some(Node::Seq(seq)) => seq,
        Some(_) => {
            return Err(TreeError::UnsupportedShape { path: choices_path });
        }
        None => {
            let range_path = format!("{}.{}", prefix, RANGE_KEY);
            match optional(tree.get(&range_path))? {
                Some(node) => range_candidates(node, &range_path)?,
                None => {
                    return Err(TreeError::KeyNotFound {
                        path: prefix.to_string(),
                    });
                }
            }
        }
    };

    let exclude_path = format!("{}.{}", prefix, EXCLUDE_KEY);
    let excluded: Vec<Node> = match optional(tree.get(&exclude_path))? {
        Some(Node::Seq(seq)) => seq,
        Some(_) => {
            return Err(TreeError::UnsupportedShape { path: exclude_path });
        }
        None => Vec::new(),
    };

    let mut values = Vec::new();
    for candidate in raw {
        if excluded.contains(&candidate) {
            continue;
        }
        let candidate = match &format {
            Some(template) => Node::Str(render_format(template, &candidate)),
            None => candidate,
        };
        // Exclusions match both the raw candidate and its formatted form.
        if excluded.contains(&candidate) {
            continue;
        }
        values.push(candidate);
    }
    Ok(values)
}

/// Materialize a `__range__` descriptor: 1–3 integers as half-open
/// start/stop/step, defaulting to start 0 and step 1.
fn range_candidates(node: Node, path: &str) -> TreeResult<Vec<Node>> {
    let malformed = || TreeError::UnsupportedShape {
        path: path.to_string(),
    };
    let args = match node {
        Node::Seq(seq) => seq,
        _ => return Err(malformed()),
    };
    let ints = args
        .iter()
        .map(Node::as_i64)
        .collect::<Option<Vec<i64>>>()
        .ok_or_else(malformed)?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(malformed()),
    };
    if step == 0 {
        return Err(malformed());
    }

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        values.push(Node::Int(current));
        current += step;
    }
    Ok(values)
}

fn render_format(template: &Node, candidate: &Node) -> String {
    template
        .to_string()
        .replace("{value}", &candidate.to_string())
}

/// A missed lookup becomes `None`; other failures propagate.
fn optional(result: TreeResult<Node>) -> TreeResult<Option<Node>> {
    match result {
        Ok(node) => Ok(Some(node)),
        Err(TreeError::KeyNotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_of(args: &[i64]) -> Vec<i64> {
        let node = Node::Seq(args.iter().map(|&v| Node::Int(v)).collect());
        range_candidates(node, "test.__range__")
            .unwrap()
            .iter()
            .map(|n| n.as_i64().unwrap())
            .collect()
    }

    #[test]
    fn given_single_arg_when_materializing_range_then_counts_from_zero() {
        assert_eq!(range_of(&[3]), vec![0, 1, 2]);
    }

    #[test]
    fn given_start_stop_step_when_materializing_range_then_matches_half_open_semantics() {
        assert_eq!(range_of(&[1, 5]), vec![1, 2, 3, 4]);
        assert_eq!(range_of(&[0, 10, 3]), vec![0, 3, 6, 9]);
        assert_eq!(range_of(&[5, 0, -2]), vec![5, 3, 1]);
        assert_eq!(range_of(&[2, 2]), Vec::<i64>::new());
    }

    #[test]
    fn given_zero_step_when_materializing_range_then_fails() {
        let node = Node::Seq(vec![Node::Int(0), Node::Int(5), Node::Int(0)]);
        assert!(range_candidates(node, "test.__range__").is_err());
    }

    #[test]
    fn given_key_with_reserved_segment_when_extracting_prefix_then_returns_axis_root() {
        assert_eq!(
            axis_prefix("a.b.__range__.0", RANGE_KEY),
            Some("a.b".to_string())
        );
        assert_eq!(axis_prefix("a.__choices__", CHOICES_KEY), Some("a".to_string()));
        assert_eq!(axis_prefix("a.b.c", RANGE_KEY), None);
        assert_eq!(axis_prefix("__range__.0", RANGE_KEY), None);
    }
}

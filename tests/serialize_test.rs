//! Tests for deep copy, subtree extraction, and JSON dumps.

use rsctx::{DumpOptions, Node, Tree, TreeError};

// ============================================================
// Copy independence
// ============================================================

#[test]
fn given_copy_when_mutating_copy_then_original_unaffected() {
    let mut tree = Tree::new();
    tree.set("cfg.mode", "fast").unwrap();
    tree.set("cfg.hosts.0", "alpha").unwrap();

    let mut copy = tree.copy();
    copy.set("cfg.mode", "slow").unwrap();
    copy.set("cfg.hosts.1", "beta").unwrap();

    assert_eq!(tree.get("cfg.mode").unwrap(), Node::from("fast"));
    assert_eq!(tree.get("cfg.hosts").unwrap().len(), Some(1));
    assert_eq!(copy.get("cfg.mode").unwrap(), Node::from("slow"));
    assert_eq!(copy.get("cfg.hosts").unwrap().len(), Some(2));
}

#[test]
fn given_copy_when_mutating_original_then_copy_unaffected() {
    let mut tree = Tree::new();
    tree.set("a.b", 1_i64).unwrap();

    let copy = tree.copy();
    tree.set("a.b", 2_i64).unwrap();
    tree.delete("a").unwrap();

    assert_eq!(copy.get("a.b").unwrap(), Node::from(1_i64));
}

// ============================================================
// Subtree extraction
// ============================================================

#[test]
fn given_path_when_extracting_value_then_returns_subtree_clone() {
    let mut tree = Tree::new();
    tree.set("svc.host", "alpha").unwrap();
    tree.set("svc.port", 80_i64).unwrap();

    let subtree = tree.value(Some("svc")).unwrap();
    let map = subtree.as_map().unwrap();
    assert_eq!(map["host"], Node::from("alpha"));
    assert_eq!(map["port"], Node::from(80_i64));

    let whole = tree.value(None).unwrap();
    assert!(whole.as_map().unwrap().contains_key("svc"));
}

#[test]
fn given_missing_path_when_extracting_value_then_fails_with_key_not_found() {
    let tree = Tree::new();
    assert!(matches!(
        tree.value(Some("nothing")),
        Err(TreeError::KeyNotFound { .. })
    ));
}

// ============================================================
// Dumps
// ============================================================

#[test]
fn given_empty_tree_when_dumping_then_returns_empty_object() {
    assert_eq!(Tree::new().dumps(None).unwrap(), "{}");
}

#[test]
fn given_missing_path_when_dumping_then_returns_null() {
    let tree = Tree::new();
    assert_eq!(tree.dumps(Some("missing.path")).unwrap(), "null");
}

#[test]
fn given_subtree_path_when_dumping_then_serializes_only_subtree() {
    let mut tree = Tree::new();
    tree.set("svc.host", "alpha").unwrap();
    tree.set("other", true).unwrap();

    assert_eq!(tree.dumps(Some("svc")).unwrap(), r#"{"host":"alpha"}"#);
}

#[test]
fn given_sparse_sequence_when_dumping_then_placeholders_serialize_as_null() {
    let mut tree = Tree::new();
    tree.set("xs.2", true).unwrap();

    assert_eq!(tree.dumps(Some("xs")).unwrap(), "[null,null,true]");
}

#[test]
fn given_lazy_leaf_when_dumping_then_serializes_resolved_value() {
    let mut tree = Tree::new();
    tree.set("val", Node::lazy(|| Node::from(5_i64))).unwrap();

    assert_eq!(tree.dumps(Some("val")).unwrap(), "5");
    assert_eq!(tree.dumps(None).unwrap(), r#"{"val":5}"#);
}

#[test]
fn given_indent_option_when_dumping_then_pretty_prints() {
    let mut tree = Tree::new();
    tree.set("a", 1_i64).unwrap();

    let rendered = tree
        .dumps_with(None, DumpOptions { indent: Some(2) })
        .unwrap();
    assert_eq!(rendered, "{\n  \"a\": 1\n}");
}

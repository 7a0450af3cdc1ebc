//! Reading and immutably rewriting values at a path.
//!
//! ```
//! use formtree::model::{Node, get, set};
//! use serde_json::json;
//!
//! let root = Node::from(json!({"lists": {"emails": [{"email": "a@x.com"}, {"email": "b@x.com"}]}}));
//! assert_eq!(get("lists.emails.1.email").from(&root).as_str(), Some("b@x.com"));
//!
//! let built = set("prop1.something.else").to("expected").within(&Node::empty_map());
//! assert_eq!(built, Node::from(json!({"prop1": {"something": {"else": "expected"}}})));
//! ```

use std::sync::Arc;

use super::node::{Fields, Node};
use super::path::{Path, Segment};

/// Shape given to a branch that does not exist yet when the segment written into
/// it is an integer. Existing maps, scalars and nulls always take a key write.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BranchPolicy {
    /// `set("a.0")` on a model without `a` creates `a` as a list.
    #[default]
    List,
    /// `set("a.0")` on a model without `a` creates `a` as a map keyed `"0"`.
    Map,
}

pub fn get(path: impl Into<Path>) -> Getter {
    Getter { path: path.into() }
}

pub fn set(path: impl Into<Path>) -> Setter {
    Setter { path: path.into() }
}

#[derive(Clone, Debug)]
pub struct Getter {
    path: Path,
}

impl Getter {
    /// The value at the path. Descent stops at the first `Missing` or `Null`
    /// and returns it; reads never fail.
    pub fn from(&self, root: &Node) -> Node {
        read(root, self.path.segments())
    }
}

#[derive(Clone, Debug)]
pub struct Setter {
    path: Path,
}

impl Setter {
    pub fn to(self, value: impl Into<Node>) -> Assignment {
        Assignment {
            path: self.path,
            value: value.into(),
            policy: BranchPolicy::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Assignment {
    path: Path,
    value: Node,
    policy: BranchPolicy,
}

impl Assignment {
    pub fn with_policy(mut self, policy: BranchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// A new root with the value written at the path. Branches off the path
    /// keep their identity, and writing an equivalent value returns `root`
    /// itself.
    pub fn within(&self, root: &Node) -> Node {
        write(root, self.path.segments(), self.value.clone(), self.policy)
    }
}

fn read(root: &Node, segments: &[Segment]) -> Node {
    descend(root, segments, false)
}

// With `through_null`, a null met before the last segment reads as an empty
// branch, which is how writes build through it.
fn descend(root: &Node, segments: &[Segment], through_null: bool) -> Node {
    let mut current = root;
    for segment in segments {
        match current {
            Node::Missing => return Node::Missing,
            Node::Null if through_null => return Node::Missing,
            Node::Null => return Node::Null,
            Node::List(items) => match segment.as_index().and_then(|index| items.get(index)) {
                Some(item) => current = item,
                None => return Node::Missing,
            },
            Node::Map(fields) => match fields.get(segment.as_key()) {
                Some(value) => current = value,
                None => return Node::Missing,
            },
            _ => return Node::Missing,
        }
    }
    current.clone()
}

fn write(root: &Node, segments: &[Segment], value: Node, policy: BranchPolicy) -> Node {
    let existing = read(root, segments);
    if existing.equivalent(&value) {
        return root.clone();
    }

    let Some((last, parent_segments)) = segments.split_last() else {
        return value;
    };
    let parent = descend(root, parent_segments, true);
    let updated_parent = match (last.as_index(), &parent) {
        (Some(index), Node::List(items)) if within_list_reach(items.len(), index) => {
            write_index(items, index, value)
        }
        (Some(index), Node::Missing)
            if policy == BranchPolicy::List && within_list_reach(0, index) =>
        {
            write_index(&[], index, value)
        }
        _ => write_key(&parent, last, value),
    };

    if parent_segments.is_empty() {
        updated_parent
    } else {
        write(root, parent_segments, updated_parent, policy)
    }
}

// Indexes further than this past the end of a list are written as map keys.
const MAX_LIST_GAP: usize = 4096;

fn within_list_reach(len: usize, index: usize) -> bool {
    index <= len.saturating_add(MAX_LIST_GAP)
}

fn write_index(items: &[Node], index: usize, value: Node) -> Node {
    let mut updated = items.to_vec();
    if value.is_missing() {
        if index < updated.len() {
            updated[index] = Node::Missing;
        }
        while updated.last().is_some_and(Node::is_missing) {
            updated.pop();
        }
    } else {
        if updated.len() <= index {
            updated.resize(index + 1, Node::Missing);
        }
        updated[index] = value;
    }
    Node::List(Arc::new(updated))
}

fn write_key(parent: &Node, segment: &Segment, value: Node) -> Node {
    let mut fields = match parent {
        Node::Map(fields) => Fields::clone(fields),
        Node::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item.clone()))
            .collect(),
        _ => Fields::new(),
    };
    fields.insert(segment.as_key(), value);
    Node::Map(Arc::new(fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        Node::from(value)
    }

    #[test]
    fn reads_nested_values_through_lists() {
        let root = node(json!({"lists": {"emails": [{"email": "a@x.com"}, {"email": "b@x.com"}]}}));
        assert_eq!(get("lists.emails.1.email").from(&root), Node::from("b@x.com"));
        assert_eq!(get("1").from(&node(json!(["not me", "you found me"]))), Node::from("you found me"));
    }

    #[test]
    fn empty_path_returns_the_root_itself() {
        let root = node(json!({"a": 1}));
        assert!(get("").from(&root).same(&root));
        assert_eq!(get("").from(&Node::from("expected")), Node::from("expected"));
    }

    #[test]
    fn misses_are_missing_not_errors() {
        let root = node(json!({}));
        assert!(get("somewhere.that.does.not.exist").from(&root).is_missing());
        assert!(get("a.b").from(&node(json!({"a": "scalar"}))).is_missing());
        assert!(get("a.b").from(&node(json!({"a": null}))).is_null());
        assert!(get("list.9").from(&node(json!({"list": [1]}))).is_missing());
    }

    #[test]
    fn numeric_keys_on_maps_are_plain_keys() {
        let root = node(json!({"outer": {"123": {"value": "found"}}}));
        assert_eq!(get("outer.123.value").from(&root), Node::from("found"));
    }

    #[test]
    fn set_keeps_sibling_identity() {
        let root = node(json!({
            "prop1": {"prop1": {"target": "original value"}, "prop2": {}},
            "prop2": {}
        }));
        let updated = set("prop1.prop1.target").to("updated value").within(&root);

        assert_eq!(get("prop1.prop1.target").from(&updated), Node::from("updated value"));
        assert!(get("prop2").from(&updated).same(&get("prop2").from(&root)));
        assert!(get("prop1.prop2").from(&updated).same(&get("prop1.prop2").from(&root)));
        assert!(!get("prop1").from(&updated).same(&get("prop1").from(&root)));
    }

    #[test]
    fn set_builds_missing_structure() {
        let built = set("prop1.something.else").to("expected").within(&node(json!({})));
        assert_eq!(built, node(json!({"prop1": {"something": {"else": "expected"}}})));
    }

    #[test]
    fn set_writes_through_list_elements() {
        let root = node(json!({"list": [{"value": "old"}, {"value": "old"}, {"value": "old"}]}));
        let updated = set("list.1.value").to("updated").within(&root);
        assert_eq!(
            updated,
            node(json!({"list": [{"value": "old"}, {"value": "updated"}, {"value": "old"}]}))
        );
        assert!(get("list.0").from(&updated).same(&get("list.0").from(&root)));
    }

    #[test]
    fn set_expands_lists_with_holes() {
        let root = node(json!({"list": [{"value": "a"}]}));
        let updated = set("list.4.value").to("x").within(&root);
        let list = get("list").from(&updated);
        let items = list.as_list().expect("list");
        assert_eq!(items.len(), 5);
        assert!(items[1..4].iter().all(Node::is_missing));
        assert_eq!(items[4], node(json!({"value": "x"})));
    }

    #[test]
    fn set_of_the_current_value_returns_the_same_root() {
        let root = node(json!({"a": {"b": [1, 2]}, "c": "x"}));
        for path in ["a", "a.b", "a.b.1", "c", "missing.path", ""] {
            let current = get(path).from(&root);
            assert!(set(path).to(current).within(&root).same(&root), "{path}");
        }
    }

    #[test]
    fn set_treats_rebuilt_equal_lists_as_no_change() {
        let root = node(json!({"tags": ["a", "b"]}));
        let rebuilt = Node::list([Node::from("a"), Node::from("b")]);
        assert!(set("tags").to(rebuilt).within(&root).same(&root));
    }

    #[test]
    fn set_builds_through_null_intermediates() {
        let root = node(json!({"a": null}));
        let updated = set("a.b.0").to("x").within(&root);
        assert_eq!(updated, node(json!({"a": {"b": ["x"]}})));
    }

    #[test]
    fn fresh_integer_branches_follow_the_policy() {
        let empty = node(json!({}));
        assert_eq!(set("a.0").to(1i64).within(&empty), node(json!({"a": [1]})));
        assert_eq!(
            set("a.0")
                .to(1i64)
                .with_policy(BranchPolicy::Map)
                .within(&empty),
            node(json!({"a": {"0": 1}}))
        );
    }

    #[test]
    fn integer_writes_over_scalars_and_null_are_key_writes() {
        assert_eq!(
            set("a.0").to("v").within(&node(json!({"a": "x"}))),
            node(json!({"a": {"0": "v"}}))
        );
        assert_eq!(
            set("a.1").to("v").within(&node(json!({"a": null}))),
            node(json!({"a": {"1": "v"}}))
        );
        assert_eq!(
            set("0").to("v").within(&node(json!(7))),
            node(json!({"0": "v"}))
        );
    }

    #[test]
    fn out_of_reach_indexes_become_keys() {
        let root = node(json!({"list": []}));
        let updated = set("list.18446744073709551615").to("x").within(&root);
        assert_eq!(
            get("list.18446744073709551615").from(&updated),
            Node::from("x")
        );
        assert!(get("list").from(&updated).as_map().is_some());

        let far = set("list.1000000000000").to("x").within(&root);
        assert_eq!(get("list.1000000000000").from(&far), Node::from("x"));

        let fresh = set("fresh.18446744073709551615").to("x").within(&node(json!({})));
        assert_eq!(fresh, node(json!({"fresh": {"18446744073709551615": "x"}})));

        let near = set("list.3").to("x").within(&root);
        assert_eq!(get("list").from(&near).as_list().map(<[Node]>::len), Some(4));
    }

    #[test]
    fn integer_keys_on_existing_maps_stay_keys() {
        let root = node(json!({"outer": {"123": {"value": "a"}}}));
        let updated = set("outer.123.value").to("b").within(&root);
        assert_eq!(updated, node(json!({"outer": {"123": {"value": "b"}}})));
    }

    #[test]
    fn blocking_scalars_are_overwritten() {
        let root = node(json!({"a": "scalar"}));
        assert_eq!(set("a.b").to(1i64).within(&root), node(json!({"a": {"b": 1}})));
    }

    #[test]
    fn writing_missing_removes_keys_and_trailing_items() {
        let root = node(json!({"keep": 1, "drop": 2, "list": [1, 2, 3]}));
        let without_key = set("drop").to(Node::Missing).within(&root);
        assert_eq!(without_key, node(json!({"keep": 1, "list": [1, 2, 3]})));

        let hole = set("list.1").to(Node::Missing).within(&root);
        assert!(get("list.1").from(&hole).is_missing());
        assert_eq!(get("list").from(&hole).as_list().map(<[Node]>::len), Some(3));

        let trimmed = set("list.2").to(Node::Missing).within(&hole);
        assert_eq!(get("list").from(&trimmed), node(json!([1])));
    }

    #[test]
    fn root_path_replaces_the_root() {
        let root = node(json!({"a": 1}));
        assert_eq!(set("").to("replaced").within(&root), Node::from("replaced"));
    }
}

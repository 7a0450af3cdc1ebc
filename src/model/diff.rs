//! Change-sets between two model snapshots.
//!
//! All four variants walk both trees with the same algorithm and differ only in
//! when they descend into a pair of values instead of reporting the pair as a
//! single change. None of them descends between a list and a map, or from a
//! scalar or null into a list.
//!
//! | variant                  | descends when                                        |
//! |--------------------------|------------------------------------------------------|
//! | [`diff`]                 | both values are non-empty lists or maps              |
//! | [`leaf_diff`]            | the updated value is a non-empty list or map         |
//! | [`normalized_diff`]      | as `diff`, but never into a list of scalars          |
//! | [`normalized_leaf_diff`] | as `leaf_diff`, but never into a list of scalars     |
//!
//! Replaying the entries in order with [`set`](super::set) on the original
//! snapshot reconstructs the updated one; [`apply`] does exactly that.

use serde::{Deserialize, Serialize};

use super::access::set;
use super::node::Node;
use super::path::{Path, Segment};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    New,
    Changed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    pub location: Path,
    pub updated_value: Node,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DiffStatus>,
}

impl DiffEntry {
    pub fn new(location: impl Into<Path>, updated_value: impl Into<Node>) -> Self {
        Self {
            location: location.into(),
            updated_value: updated_value.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: DiffStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiffOptions {
    /// Tag every entry as [`DiffStatus::New`] or [`DiffStatus::Changed`].
    pub specify_new_or_updated: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffStrategy {
    Diff,
    LeafDiff,
    NormalizedDiff,
    NormalizedLeafDiff,
}

impl DiffStrategy {
    fn should_recurse(self, original: &Node, updated: &Node) -> bool {
        if changes_container_kind(original, updated) {
            return false;
        }
        match self {
            DiffStrategy::Diff => original.is_iterable() && updated.is_iterable(),
            DiffStrategy::LeafDiff => updated.is_iterable(),
            DiffStrategy::NormalizedDiff => {
                original.is_iterable() && updated.is_iterable() && !is_scalar_list(updated)
            }
            DiffStrategy::NormalizedLeafDiff => updated.is_iterable() && !is_scalar_list(updated),
        }
    }
}

// Index entries only replay as list writes into a list that exists or is
// being created; anywhere else they land as map keys.
fn changes_container_kind(original: &Node, updated: &Node) -> bool {
    match (original, updated) {
        (Node::List(_), Node::Map(_)) => true,
        (Node::Missing | Node::List(_), Node::List(_)) => false,
        (_, Node::List(_)) => true,
        _ => false,
    }
}

fn is_scalar_list(node: &Node) -> bool {
    node.as_list()
        .is_some_and(|items| items.iter().all(|item| !item.is_iterable()))
}

pub fn diff(original: &Node) -> DiffFrom<'_> {
    DiffFrom::new(DiffStrategy::Diff, original)
}

pub fn leaf_diff(original: &Node) -> DiffFrom<'_> {
    DiffFrom::new(DiffStrategy::LeafDiff, original)
}

pub fn normalized_diff(original: &Node) -> DiffFrom<'_> {
    DiffFrom::new(DiffStrategy::NormalizedDiff, original)
}

pub fn normalized_leaf_diff(original: &Node) -> DiffFrom<'_> {
    DiffFrom::new(DiffStrategy::NormalizedLeafDiff, original)
}

#[derive(Clone, Copy, Debug)]
pub struct DiffFrom<'a> {
    strategy: DiffStrategy,
    original: &'a Node,
    options: DiffOptions,
}

impl<'a> DiffFrom<'a> {
    pub fn new(strategy: DiffStrategy, original: &'a Node) -> Self {
        Self {
            strategy,
            original,
            options: DiffOptions::default(),
        }
    }

    pub fn options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    pub fn specify_new_or_updated(mut self) -> Self {
        self.options.specify_new_or_updated = true;
        self
    }

    pub fn to(&self, updated: &Node) -> Vec<DiffEntry> {
        let mut entries = Vec::new();
        process(
            self.original,
            updated,
            self.strategy,
            self.options,
            &Path::root(),
            &mut entries,
        );
        entries
    }
}

fn process(
    original: &Node,
    updated: &Node,
    strategy: DiffStrategy,
    options: DiffOptions,
    location: &Path,
    entries: &mut Vec<DiffEntry>,
) {
    if original.equivalent(updated) {
        return;
    }

    if strategy.should_recurse(original, updated) {
        for segment in union_of_keys(updated, original) {
            process(
                &original.child(&segment),
                &updated.child(&segment),
                strategy,
                options,
                &location.child(segment),
                entries,
            );
        }
        return;
    }

    let mut entry = DiffEntry::new(location, updated.clone());
    if options.specify_new_or_updated {
        entry.status = Some(if original.is_missing() {
            DiffStatus::New
        } else {
            DiffStatus::Changed
        });
    }
    entries.push(entry);
}

fn union_of_keys(updated: &Node, original: &Node) -> Vec<Segment> {
    let mut keys = updated.child_segments();
    for segment in original.child_segments() {
        if !keys.iter().any(|known| known.as_key() == segment.as_key()) {
            keys.push(segment);
        }
    }
    keys
}

/// Replay `entries` over `original`.
pub fn apply(entries: &[DiffEntry], original: &Node) -> Node {
    entries.iter().fold(original.clone(), |current, entry| {
        set(&entry.location)
            .to(entry.updated_value.clone())
            .within(&current)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        Node::from(value)
    }

    fn locations(entries: &[DiffEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| entry.location.to_string())
            .collect()
    }

    #[test]
    fn equal_scalars_have_no_changes() {
        assert!(diff(&node(json!(1))).to(&node(json!(1))).is_empty());
        assert!(diff(&node(json!("hello"))).to(&node(json!("hello"))).is_empty());
        assert!(diff(&node(json!(true))).to(&node(json!(true))).is_empty());
    }

    #[test]
    fn changed_scalars_are_root_entries() {
        assert_eq!(
            diff(&node(json!(1))).to(&node(json!(2))),
            vec![DiffEntry::new("", node(json!(2)))]
        );
        assert_eq!(
            diff(&node(json!(1))).to(&node(json!({}))),
            vec![DiffEntry::new("", node(json!({})))]
        );
    }

    #[test]
    fn symmetrical_objects_report_only_changed_keys() {
        let original = node(json!({"changed": "p1 value 1", "original": "p2 value 1"}));
        let updated = node(json!({"changed": "p1 value 2", "original": "p2 value 1"}));
        assert_eq!(
            diff(&original).to(&updated),
            vec![DiffEntry::new("changed", "p1 value 2")]
        );
    }

    #[test]
    fn removed_subtrees_are_missing_entries() {
        let original = node(json!({
            "left": {"with": {"some": ["values"]}},
            "right": {"has": {"some": ["other values"]}}
        }));
        let without_left = node(json!({"right": {"has": {"some": ["other values"]}}}));
        assert_eq!(
            diff(&original).to(&without_left),
            vec![DiffEntry::new("left", Node::Missing)]
        );

        let emptied_right = node(json!({
            "left": {"with": {"some": ["values"]}},
            "right": {}
        }));
        assert_eq!(
            diff(&original).to(&emptied_right),
            vec![DiffEntry::new("right", node(json!({})))]
        );
    }

    #[test]
    fn updated_keys_come_before_removed_ones() {
        let original = node(json!({"outer": [{"wrapper": {"changed": "p1 value 1", "original": "p2 value 1"}}]}));
        let updated = node(json!({"outer": [{"wrapper": {"changed": "p1 value 2", "new": "p2 value 1"}}]}));
        let entries = diff(&original).to(&updated);
        assert_eq!(
            locations(&entries),
            vec![
                "outer.0.wrapper.changed",
                "outer.0.wrapper.new",
                "outer.0.wrapper.original"
            ]
        );
        assert!(entries[2].updated_value.is_missing());
    }

    #[test]
    fn leaf_diff_expands_new_objects() {
        let original = node(json!({"contact": "none"}));
        let updated = node(json!({"contact": {"email": "a@x.com", "phone": "1"}}));

        assert_eq!(locations(&diff(&original).to(&updated)), vec!["contact"]);
        assert_eq!(
            locations(&leaf_diff(&original).to(&updated)),
            vec!["contact.email", "contact.phone"]
        );
    }

    #[test]
    fn normalized_variants_replace_scalar_lists_whole() {
        let original = node(json!({"tags": ["a", "b"]}));
        let updated = node(json!({"tags": ["a", "c"]}));

        assert_eq!(locations(&diff(&original).to(&updated)), vec!["tags.1"]);
        assert_eq!(
            normalized_diff(&original).to(&updated),
            vec![DiffEntry::new("tags", node(json!(["a", "c"])))]
        );
        assert_eq!(
            locations(&normalized_leaf_diff(&original).to(&updated)),
            vec!["tags"]
        );
    }

    #[test]
    fn normalized_variants_still_descend_into_lists_of_objects() {
        let original = node(json!({"rows": [{"v": 1}, {"v": 2}]}));
        let updated = node(json!({"rows": [{"v": 1}, {"v": 3}]}));
        assert_eq!(
            locations(&normalized_diff(&original).to(&updated)),
            vec!["rows.1.v"]
        );
    }

    #[test]
    fn container_kind_changes_replace_the_whole_value() {
        let original = node(json!({"v": {"0": "a"}}));
        let updated = node(json!({"v": ["a"]}));
        for strategy in [DiffStrategy::Diff, DiffStrategy::LeafDiff] {
            let entries = DiffFrom::new(strategy, &original).to(&updated);
            assert_eq!(entries, vec![DiffEntry::new("v", node(json!(["a"])))]);
            assert_eq!(apply(&entries, &original), updated);
        }
    }

    #[test]
    fn lists_replacing_scalars_are_one_entry() {
        let original = node(json!({"a": "x", "b": null}));
        let updated = node(json!({"a": ["v"], "b": ["w"]}));
        let entries = leaf_diff(&original).to(&updated);
        assert_eq!(locations(&entries), vec!["a", "b"]);
        assert_eq!(apply(&entries, &original), updated);
    }

    #[test]
    fn numeric_keys_replacing_scalars_replay_as_keys() {
        let original = node(json!({"a": "x"}));
        let updated = node(json!({"a": {"0": "v", "1": {"k": [1]}}}));
        let entries = leaf_diff(&original).to(&updated);
        assert_eq!(locations(&entries), vec!["a.0", "a.1.k.0"]);
        assert_eq!(apply(&entries, &original), updated);
    }

    #[test]
    fn rebuilt_equal_lists_are_unchanged() {
        let original = node(json!({"tags": ["a", "b"]}));
        let rebuilt = set("tags")
            .to(Node::list([Node::from("a"), Node::from("b")]))
            .within(&node(json!({})));
        assert!(diff(&original).to(&rebuilt).is_empty());
    }

    #[test]
    fn status_marks_new_and_changed_leaves() {
        let original = node(json!({"kept": 1, "changed": 1}));
        let updated = node(json!({"kept": 1, "changed": 2, "added": 3}));
        let entries = leaf_diff(&original).specify_new_or_updated().to(&updated);
        assert_eq!(
            entries,
            vec![
                DiffEntry::new("changed", 2i64).with_status(DiffStatus::Changed),
                DiffEntry::new("added", 3i64).with_status(DiffStatus::New),
            ]
        );
    }

    #[test]
    fn applying_entries_rebuilds_the_updated_snapshot() {
        let original = node(json!({"outer": [{"wrapper": {"changed": "p1 value 1", "original": "p2 value 1"}}], "list": [1, 2, 3]}));
        let updated = node(json!({"outer": [{"wrapper": {"changed": "p1 value 2", "new": "p2 value 1"}}], "list": [1]}));
        for strategy in [
            DiffStrategy::Diff,
            DiffStrategy::LeafDiff,
            DiffStrategy::NormalizedDiff,
            DiffStrategy::NormalizedLeafDiff,
        ] {
            let entries = DiffFrom::new(strategy, &original).to(&updated);
            assert_eq!(apply(&entries, &original), updated, "{strategy:?}");
        }
    }

    #[test]
    fn entries_serialize_with_camel_case_fields() {
        let entry = DiffEntry::new("contact.email", "a@x.com").with_status(DiffStatus::New);
        assert_eq!(
            serde_json::to_value(&entry).expect("serialize entry"),
            json!({"location": "contact.email", "updatedValue": "a@x.com", "status": "new"})
        );
    }
}

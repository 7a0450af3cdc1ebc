use formtree::model::{DiffFrom, DiffStrategy, Node, Path, apply, diff, get, set};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

const STRATEGIES: [DiffStrategy; 4] = [
    DiffStrategy::Diff,
    DiffStrategy::LeafDiff,
    DiffStrategy::NormalizedDiff,
    DiffStrategy::NormalizedLeafDiff,
];

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-3i64..4).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::String),
    ]
}

// Object keys stay non-numeric here: a branch that does not exist yet is built
// as a list when written through an integer segment.
fn tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-d]", inner, 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn numeric_keyed() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[0-3]", tree(), 1..4)
        .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>()))
}

fn path() -> impl Strategy<Value = Path> {
    prop::collection::vec(prop_oneof!["[a-d]", "[0-2]"], 0..4)
        .prop_map(|segments| Path::parse(&segments.join(".")))
}

proptest! {
    #[test]
    fn replaying_a_diff_rebuilds_the_updated_tree(original in tree(), updated in tree()) {
        let original = Node::from(original);
        let updated = Node::from(updated);
        for strategy in STRATEGIES {
            let entries = DiffFrom::new(strategy, &original).to(&updated);
            prop_assert_eq!(apply(&entries, &original), updated.clone(), "{:?}", strategy);
        }
    }

    #[test]
    fn numeric_keys_replacing_a_scalar_replay_as_keys(
        scalar in scalar(),
        keyed in numeric_keyed(),
        rest in tree(),
    ) {
        let original = Node::from(json!({"a": scalar, "rest": rest}));
        let updated = Node::from(json!({"a": keyed, "rest": rest}));
        for strategy in STRATEGIES {
            let entries = DiffFrom::new(strategy, &original).to(&updated);
            prop_assert_eq!(apply(&entries, &original), updated.clone(), "{:?}", strategy);
        }
    }

    #[test]
    fn writing_the_current_value_keeps_the_root(root in tree(), path in path()) {
        let root = Node::from(root);
        let current = get(&path).from(&root);
        prop_assert!(set(&path).to(current).within(&root).same(&root));
    }

    #[test]
    fn writes_keep_untouched_siblings_shared(sibling in tree(), target in tree(), value in scalar()) {
        let root = Node::from(json!({"a": {"b": {"c": target}}, "other": sibling}));
        let updated = set("a.b.c").to(Node::from(value)).within(&root);
        prop_assert!(get("other").from(&updated).same(&get("other").from(&root)));
    }

    #[test]
    fn get_reads_back_what_set_wrote(root in tree(), path in path(), value in tree()) {
        let root = Node::from(root);
        let value = Node::from(value);
        let updated = set(&path).to(value.clone()).within(&root);
        prop_assert_eq!(get(&path).from(&updated), value);
    }

    #[test]
    fn a_tree_has_no_changes_against_itself(value in tree()) {
        let node = Node::from(value.clone());
        prop_assert!(diff(&node).to(&node).is_empty());

        let rebuilt = Node::from(value);
        for strategy in STRATEGIES {
            prop_assert!(DiffFrom::new(strategy, &node).to(&rebuilt).is_empty());
        }
    }
}

#[test]
fn list_writes_past_the_end_leave_holes() {
    let root = Node::from(json!({"list": [{"value": "a"}]}));
    let updated = set("list.4.value").to("x").within(&root);
    let list = get("list").from(&updated);
    let items = list.as_list().expect("list stays a list");

    assert_eq!(items.len(), 5);
    assert!(items[1..4].iter().all(Node::is_missing));
    assert_eq!(items[4], Node::from(json!({"value": "x"})));
}

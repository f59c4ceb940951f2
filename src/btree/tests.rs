//! Scenario and property tests for the tree as a whole

use std::collections::BTreeSet;

use proptest::prelude::*;

use super::*;

fn root_internal(tree: &BPlusTree) -> &InternalNode {
    tree.get_node(tree.root_node_id())
        .and_then(|n| n.as_internal())
        .expect("root should be internal")
}

#[test]
fn test_incremental_split_order_3() {
    let mut tree = BPlusTree::new(3).unwrap();
    for key in [1, 2, 3, 4] {
        tree.insert(key).unwrap();
    }

    let root = root_internal(&tree);
    assert_eq!(root.keys, vec![3]);
    assert_eq!(root.children.len(), 2);

    let left = tree.get_node(root.children[0]).unwrap().as_leaf().unwrap();
    let right = tree.get_node(root.children[1]).unwrap().as_leaf().unwrap();
    assert_eq!(left.keys, vec![1, 2]);
    assert_eq!(right.keys, vec![3, 4]);
    assert_eq!(left.next, Some(root.children[1]));
    assert_eq!(right.next, None);

    assert_eq!(tree.height(), 2);
    assert_eq!(tree.node_count(), 3);
    assert!(tree.search(3));
    assert!(!tree.search(5));
    assert_eq!(tree.all_keys(), vec![1, 2, 3, 3, 4]);
}

#[test]
fn test_bulk_build_order_4() {
    let mut tree = BPlusTree::new(4).unwrap();
    assert!(tree.build_bottom_up(vec![5, 3, 8, 1, 9, 2, 7, 6, 4, 10]));

    assert_eq!(
        tree.leaf_chain(),
        vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10]]
    );
    assert_eq!(root_internal(&tree).keys, vec![4, 7, 10]);

    assert_eq!(tree.height(), 2);
    assert_eq!(tree.node_count(), 5);
    assert!(tree.search(10));
    assert!(!tree.search(11));
}

#[test]
fn test_empty_bulk_build_on_fresh_tree() {
    let mut tree = BPlusTree::new(4).unwrap();

    assert!(!tree.build_bottom_up(Vec::new()));

    assert_eq!(tree.node_count(), 1);
    assert!(tree.all_keys().is_empty());
    assert_eq!(tree.height(), 1);
}

#[test]
fn test_bulk_build_discards_inserted_keys() {
    let mut tree = BPlusTree::new(4).unwrap();
    for key in [11, 12, 13, 14, 15] {
        tree.insert(key).unwrap();
    }

    tree.build_bottom_up(vec![13, 20, 30]);

    assert!(!tree.search(11));
    assert!(!tree.search(15));
    assert!(tree.search(13));
    assert!(tree.search(30));
    assert_eq!(tree.len(), 3);
}

#[test]
fn test_shapes_differ_between_construction_paths() {
    let keys: Vec<BPlusKey> = (1..=30).collect();

    let mut incremental = BPlusTree::new(4).unwrap();
    for &key in &keys {
        incremental.insert(key).unwrap();
    }
    let mut bulk = BPlusTree::new(4).unwrap();
    bulk.build_bottom_up(keys.clone());

    incremental.validate().unwrap();
    bulk.validate().unwrap();
    assert!(bulk.node_count() < incremental.node_count());
    assert!(bulk.height() <= incremental.height());
    assert_eq!(
        bulk.iter().collect::<Vec<_>>(),
        incremental.iter().collect::<Vec<_>>()
    );
}

#[test]
fn test_large_tree() {
    let mut tree = BPlusTree::new(4).unwrap();

    // Pseudo-random order without pulling in an RNG
    for i in 0..1000i64 {
        tree.insert((i * 7919) % 1000).unwrap();
    }

    tree.validate().unwrap();
    assert_eq!(tree.len(), 1000);
    assert!(tree.height() >= 5);
    for key in 0..1000 {
        assert!(tree.search(key));
    }
    assert_eq!(tree.range(500, 510).len(), 11);
}

fn order_strategy() -> impl Strategy<Value = usize> {
    3usize..=8
}

fn keys_strategy() -> impl Strategy<Value = Vec<BPlusKey>> {
    // Narrow domain so duplicates are common
    prop::collection::vec(-50i64..50, 0..200)
}

proptest! {
    #[test]
    fn prop_invariants_hold_after_every_insert(order in order_strategy(), keys in keys_strategy()) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &keys {
            tree.insert(key).unwrap();
            prop_assert!(tree.validate().is_ok(), "{:?}", tree.validate());
        }
        prop_assert_eq!(tree.len(), keys.len());
    }

    #[test]
    fn prop_search_matches_inserted_set(order in order_strategy(), keys in keys_strategy()) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &keys {
            tree.insert(key).unwrap();
        }

        let model: BTreeSet<BPlusKey> = keys.iter().copied().collect();
        for probe in -60i64..60 {
            prop_assert_eq!(tree.search(probe), model.contains(&probe));
        }
    }

    #[test]
    fn prop_leaf_chain_is_sorted_multiset(order in order_strategy(), keys in keys_strategy()) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &keys {
            tree.insert(key).unwrap();
        }

        let mut expected = keys.clone();
        expected.sort_unstable();
        prop_assert_eq!(tree.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn prop_range_matches_filter(
        order in order_strategy(),
        keys in keys_strategy(),
        lower in -60i64..60,
        width in 0i64..40,
    ) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &keys {
            tree.insert(key).unwrap();
        }

        let upper = lower + width;
        let mut expected: Vec<_> = keys.iter().copied().filter(|k| (lower..=upper).contains(k)).collect();
        expected.sort_unstable();
        prop_assert_eq!(tree.range(lower, upper), expected);
    }

    #[test]
    fn prop_reads_are_idempotent(order in order_strategy(), keys in keys_strategy()) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &keys {
            tree.insert(key).unwrap();
        }

        prop_assert_eq!(tree.all_keys(), tree.all_keys());
        prop_assert_eq!(tree.height(), tree.height());
        prop_assert_eq!(tree.node_count(), tree.node_count());
    }

    #[test]
    fn prop_bulk_build_is_valid_and_searchable(
        order in order_strategy(),
        before in keys_strategy(),
        keys in prop::collection::vec(-50i64..50, 1..300),
    ) {
        let mut tree = BPlusTree::new(order).unwrap();
        for &key in &before {
            tree.insert(key).unwrap();
        }

        prop_assert!(tree.build_bottom_up(keys.clone()));
        prop_assert!(tree.validate().is_ok(), "{:?}", tree.validate());
        prop_assert_eq!(tree.height(), BPlusTree::bulk_height(keys.len(), order));

        let model: BTreeSet<BPlusKey> = keys.iter().copied().collect();
        for probe in -60i64..60 {
            prop_assert_eq!(tree.search(probe), model.contains(&probe));
        }
    }
}

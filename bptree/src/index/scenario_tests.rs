//! Whole-tree scenarios and properties across capacity configurations.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand::seq::SliceRandom;

use crate::config::TreeConfig;
use crate::index::{BPlusTree, Node};

/// Capacity pairs (internal fanout, leaf entries) the properties run against.
const CONFIGS: [(usize, usize); 7] = [(2, 2), (3, 3), (3, 8), (4, 4), (6, 6), (10, 10), (5, 16)];

fn tree_for(max_internal: usize, max_leaf: usize) -> BPlusTree<i64, String> {
    BPlusTree::with_config(TreeConfig::new(max_internal, max_leaf)).expect("valid config")
}

fn shuffled_keys(count: i64, seed: u64) -> Vec<i64> {
    let mut keys: Vec<i64> = (0..count).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(seed));
    keys
}

fn collected_keys(tree: &BPlusTree<i64, String>) -> Vec<i64> {
    tree.iter().map(|(k, _)| *k).collect()
}

#[test]
fn test_seven_key_scenario() {
    let keys = [1, 5, 12, 18, 21, 22, 23];
    let mut tree = tree_for(3, 3);

    for key in keys {
        tree.insert(key, format!("v{key}")).expect("insert");
        tree.check_invariants().expect("invariants after insert");
    }

    let root = tree.root_id().and_then(|id| tree.node(id)).expect("root");
    assert!(matches!(root, Node::Internal(_)));
    assert_eq!(collected_keys(&tree), keys.to_vec());

    for key in keys {
        assert_eq!(tree.delete(&key).expect("delete"), Some(format!("v{key}")));
        tree.check_invariants().expect("invariants after delete");
    }

    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.height(), 0);
    for key in keys {
        assert!(tree.search(&key).is_none());
    }
}

#[test]
fn test_hundred_thousand_ascending_keys() {
    let mut tree: BPlusTree<i64, i64> = BPlusTree::new();

    for key in 1..100_000 {
        tree.insert(key, key * 3).expect("insert");
    }
    assert_eq!(tree.len(), 99_999);
    tree.check_invariants().expect("invariants after inserts");
    assert_eq!(tree.height(), 3);

    for key in 1..100_000 {
        assert_eq!(tree.search(&key), Some(&(key * 3)), "lookup {key}");
    }

    for key in 1..100_000 {
        assert_eq!(tree.delete(&key).expect("delete"), Some(key * 3));
    }

    assert!(tree.is_empty());
    tree.check_invariants().expect("invariants after deletes");
    for key in (1..100_000).step_by(997) {
        assert!(tree.search(&key).is_none());
    }
}

#[test]
fn test_random_order_round_trip() {
    for (max_internal, max_leaf) in CONFIGS {
        let mut tree = tree_for(max_internal, max_leaf);
        let keys = shuffled_keys(300, 7);

        for &key in &keys {
            assert!(tree.insert(key, key.to_string()).expect("insert").is_none());
            tree.check_invariants().unwrap_or_else(|violation| {
                panic!("{max_internal}/{max_leaf}: after inserting {key}: {violation}")
            });
        }
        assert_eq!(tree.len(), keys.len());
        assert_eq!(collected_keys(&tree), (0..300).collect::<Vec<_>>());

        for &key in &keys {
            assert_eq!(tree.search(&key), Some(&key.to_string()));
        }

        for &key in keys.iter().rev() {
            assert_eq!(tree.delete(&key).expect("delete"), Some(key.to_string()));
            tree.check_invariants().unwrap_or_else(|violation| {
                panic!("{max_internal}/{max_leaf}: after deleting {key}: {violation}")
            });
            assert!(tree.search(&key).is_none());
        }
        assert!(tree.is_empty(), "{max_internal}/{max_leaf} not empty");
    }
}

#[test]
fn test_descending_inserts_and_ascending_deletes() {
    for (max_internal, max_leaf) in CONFIGS {
        let mut tree = tree_for(max_internal, max_leaf);

        for key in (0..150).rev() {
            tree.insert(key, key.to_string()).expect("insert");
        }
        tree.check_invariants().expect("invariants after inserts");

        for key in 0..150 {
            tree.delete(&key).expect("delete");
            tree.check_invariants().unwrap_or_else(|violation| {
                panic!("{max_internal}/{max_leaf}: after deleting {key}: {violation}")
            });
            assert_eq!(tree.first_key_value().map(|(k, _)| *k), (key < 149).then_some(key + 1));
        }
        assert!(tree.is_empty());
    }
}

#[test]
fn test_delete_from_middle_keeps_order() {
    for (max_internal, max_leaf) in CONFIGS {
        let mut tree = tree_for(max_internal, max_leaf);
        for key in 0..200 {
            tree.insert(key, key.to_string()).expect("insert");
        }

        let removed = shuffled_keys(200, 99);
        let (gone, kept) = removed.split_at(120);
        for key in gone {
            tree.delete(key).expect("delete");
        }
        tree.check_invariants().expect("invariants after partial delete");

        let mut expected = kept.to_vec();
        expected.sort_unstable();
        assert_eq!(collected_keys(&tree), expected);
        for key in gone {
            assert!(!tree.contains_key(key));
        }
    }
}

#[test]
fn test_idempotent_upsert() {
    for (max_internal, max_leaf) in CONFIGS {
        let mut tree = tree_for(max_internal, max_leaf);
        for key in 0..50 {
            tree.insert(key, "v1".to_string()).expect("insert");
        }
        let height = tree.height();

        for key in 0..50 {
            let old = tree.insert(key, "v2".to_string()).expect("upsert");
            assert_eq!(old.as_deref(), Some("v1"));
        }

        assert_eq!(tree.len(), 50);
        assert_eq!(tree.height(), height);
        assert!(tree.iter().all(|(_, v)| v == "v2"));
        tree.check_invariants().expect("invariants after upserts");
    }
}

#[test]
fn test_reinsert_after_emptying() {
    let mut tree = tree_for(4, 4);
    for round in 0..3 {
        for key in 0..40 {
            tree.insert(key, format!("{round}")).expect("insert");
        }
        for key in 0..40 {
            tree.delete(&key).expect("delete");
        }
        assert!(tree.is_empty());
        tree.check_invariants().expect("arena drained");
    }
}

#[test]
fn test_range_matches_filter() {
    let mut tree = tree_for(3, 8);
    let keys = shuffled_keys(400, 3);
    for &key in &keys {
        tree.insert(key * 5, key.to_string()).expect("insert");
    }
    for &key in keys.iter().take(150) {
        tree.delete(&(key * 5)).expect("delete");
    }

    let all = collected_keys(&tree);
    for (lo, hi) in [(0, 50), (13, 977), (1_000, 1_001), (1_995, 5_000), (-20, 3)] {
        let ranged: Vec<i64> = tree.range(lo..hi).map(|(k, _)| *k).collect();
        let filtered: Vec<i64> = all.iter().copied().filter(|k| (lo..hi).contains(k)).collect();
        assert_eq!(ranged, filtered, "range {lo}..{hi}");
    }
}

#[test]
fn test_mixed_operations_match_model_for_small_capacities() {
    for max_internal in 2..=7 {
        for max_leaf in 2..=7 {
            for seed in 0..10 {
                let mut tree = tree_for(max_internal, max_leaf);
                let mut model = BTreeMap::new();
                let mut rng = StdRng::seed_from_u64(seed);

                for step in 0..600 {
                    let key = rng.random_range(0..60);
                    if rng.random_bool(0.55) {
                        let value = format!("{seed}:{step}");
                        let old = tree.insert(key, value.clone()).expect("insert");
                        assert_eq!(old, model.insert(key, value));
                    } else {
                        let old = tree.delete(&key).expect("delete");
                        assert_eq!(old, model.remove(&key));
                    }

                    tree.check_invariants().unwrap_or_else(|violation| {
                        panic!("{max_internal}/{max_leaf} seed {seed} step {step}: {violation}")
                    });
                    assert!(
                        tree.iter().eq(model.iter()),
                        "{max_internal}/{max_leaf} seed {seed} step {step}: contents diverged"
                    );
                }

                let remaining: Vec<i64> = model.keys().copied().collect();
                for key in remaining {
                    assert_eq!(tree.delete(&key).expect("drain"), model.remove(&key));
                    tree.check_invariants().expect("invariants while draining");
                }
                assert!(tree.is_empty());
                assert_eq!(tree.height(), 0);
            }
        }
    }
}

//! Integration tests for `BPlusIndex`: the public API, durability across
//! reopen and randomized checks against `BTreeMap`.

use std::collections::BTreeMap;
use std::path::Path;

use pagedb::common::config::StoreConfig;
use pagedb::{BPlusIndex, Error};
use proptest::prelude::*;
use tempfile::tempdir;

fn open_at(dir: &Path) -> BPlusIndex<i32, i64> {
    BPlusIndex::open(dir.join("i.nodes"), dir.join("i.keys"), dir.join("i.values")).unwrap()
}

#[test]
fn test_five_inserts_split_once() {
    let dir = tempdir().unwrap();
    let mut index: BPlusIndex<i32, [u8; 1]> = BPlusIndex::open(
        dir.path().join("s.nodes"),
        dir.path().join("s.keys"),
        dir.path().join("s.values"),
    )
    .unwrap();

    for (k, v) in [(5, b"a"), (1, b"b"), (9, b"c"), (3, b"d"), (7, b"e")] {
        index.insert(k, *v).unwrap();
    }

    assert_eq!(&index.get(&1).unwrap(), b"b");
    assert_eq!(&index.get(&9).unwrap(), b"c");
    let shape = index.check().unwrap();
    assert_eq!(shape.depth, 2);
    assert_eq!(shape.leaves, 2);
    assert_eq!(shape.entries, 5);
}

#[test]
fn test_round_trip_update_and_delete() {
    let dir = tempdir().unwrap();
    let mut index = open_at(dir.path());

    index.insert(42, 1).unwrap();
    assert_eq!(index.get(&42).unwrap(), 1);

    index.update(&42, &2).unwrap();
    index.update(&42, &3).unwrap();
    assert_eq!(index.get(&42).unwrap(), 3);

    index.insert(42, 99).unwrap();
    assert_eq!(index.get(&42).unwrap(), 3);

    index.remove(&42).unwrap();
    assert!(matches!(index.get(&42), Err(Error::EmptyIndex)));

    index.insert(1, 1).unwrap();
    assert!(matches!(index.get(&42), Err(Error::KeyNotFound)));
    assert!(matches!(index.update(&42, &0), Err(Error::KeyNotFound)));
    assert!(!index.contains_key(&42).unwrap());
    assert!(index.contains_key(&1).unwrap());
}

#[test]
fn test_update_on_empty_index() {
    let dir = tempdir().unwrap();
    let mut index = open_at(dir.path());
    assert!(matches!(index.update(&1, &1), Err(Error::EmptyIndex)));
    assert_eq!(index.len().unwrap(), 0);
}

#[test]
fn test_reopen_preserves_entries() {
    let dir = tempdir().unwrap();
    let keys: Vec<i32> = (0..2000).map(|i| (i * 7919) % 10007).collect();

    {
        let mut index = open_at(dir.path());
        for &k in &keys {
            index.insert(k, -(k as i64)).unwrap();
        }
        for &k in keys.iter().step_by(5) {
            index.remove(&k).unwrap();
        }
    }

    let index = open_at(dir.path());
    let shape = index.check().unwrap();
    assert_eq!(shape.entries, 1600);
    for (i, &k) in keys.iter().enumerate() {
        if i % 5 == 0 {
            assert!(matches!(index.get(&k), Err(Error::KeyNotFound)));
        } else {
            assert_eq!(index.get(&k).unwrap(), -(k as i64));
        }
    }

    let entries = index.entries().unwrap();
    assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn test_empty_pool_config_rejected() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::default().with_pool_size(0);

    let opened = BPlusIndex::<i32, i64>::open_with_config(
        dir.path().join("z.nodes"),
        dir.path().join("z.keys"),
        dir.path().join("z.values"),
        &config,
    );
    assert!(matches!(opened, Err(Error::Configuration(_))));
}

#[test]
fn test_small_pools_evict_without_losing_pins() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::default().with_pool_size(16);
    let mut index: BPlusIndex<u64, u64> = BPlusIndex::open_with_config(
        dir.path().join("p.nodes"),
        dir.path().join("p.keys"),
        dir.path().join("p.values"),
        &config,
    )
    .unwrap();

    for k in 0..5000u64 {
        index.insert(k.wrapping_mul(0x9E37_79B9_7F4A_7C15), k).unwrap();
    }
    for k in (0..5000u64).step_by(2) {
        index.remove(&k.wrapping_mul(0x9E37_79B9_7F4A_7C15)).unwrap();
    }

    let shape = index.check().unwrap();
    assert_eq!(shape.entries, 2500);
    index.flush().unwrap();
}

#[test]
fn test_byte_array_keys() {
    let dir = tempdir().unwrap();
    let mut index: BPlusIndex<[u8; 16], u32> = BPlusIndex::open(
        dir.path().join("b.nodes"),
        dir.path().join("b.keys"),
        dir.path().join("b.values"),
    )
    .unwrap();

    let mut names = ["delta", "alpha", "echo", "charlie", "bravo", "foxtrot"]
        .map(|s| {
            let mut k = [0u8; 16];
            k[..s.len()].copy_from_slice(s.as_bytes());
            k
        });
    for (i, k) in names.iter().enumerate() {
        index.insert(*k, i as u32).unwrap();
    }

    names.sort();
    let listed: Vec<[u8; 16]> = index.entries().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(listed, names);
    index.check().unwrap();
}

#[derive(Debug, Clone)]
enum IndexOp {
    Insert(i32, i64),
    Remove(i32),
    Update(i32, i64),
    Get(i32),
}

fn index_op() -> impl Strategy<Value = IndexOp> {
    // A narrow key range forces duplicates, misses and deep rebalancing.
    let key = 0..300i32;
    prop_oneof![
        4 => (key.clone(), any::<i64>()).prop_map(|(k, v)| IndexOp::Insert(k, v)),
        3 => key.clone().prop_map(IndexOp::Remove),
        1 => (key.clone(), any::<i64>()).prop_map(|(k, v)| IndexOp::Update(k, v)),
        1 => key.prop_map(IndexOp::Get),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_index_matches_btreemap(ops in prop::collection::vec(index_op(), 1..600)) {
        let dir = tempdir().unwrap();
        let mut index = open_at(dir.path());
        let mut model: BTreeMap<i32, i64> = BTreeMap::new();

        for op in ops {
            match op {
                IndexOp::Insert(k, v) => {
                    index.insert(k, v).unwrap();
                    model.entry(k).or_insert(v);
                }
                IndexOp::Remove(k) => {
                    index.remove(&k).unwrap();
                    model.remove(&k);
                }
                IndexOp::Update(k, v) => {
                    let result = index.update(&k, &v);
                    if let Some(slot) = model.get_mut(&k) {
                        prop_assert!(result.is_ok());
                        *slot = v;
                    } else if model.is_empty() {
                        prop_assert!(matches!(result, Err(Error::EmptyIndex)));
                    } else {
                        prop_assert!(matches!(result, Err(Error::KeyNotFound)));
                    }
                }
                IndexOp::Get(k) => match model.get(&k) {
                    Some(v) => prop_assert_eq!(index.get(&k).unwrap(), *v),
                    None => prop_assert!(index.get(&k).is_err()),
                },
            }
            index.check().unwrap();
        }

        let entries = index.entries().unwrap();
        let expected: Vec<(i32, i64)> = model.into_iter().collect();
        prop_assert_eq!(entries, expected);
    }
}

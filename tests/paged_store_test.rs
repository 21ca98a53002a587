//! Integration tests for `PagedStore`: allocation, the free list and
//! persistence across reopen.

use std::collections::HashMap;

use pagedb::common::config::StoreConfig;
use pagedb::storage::page::MAX_RECORD_SIZE;
use pagedb::{Address, Error, PageId, PagedStore};
use proptest::prelude::*;
use tempfile::tempdir;

#[test]
fn test_reopen_keeps_records_and_free_list() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("values.db");

    let addrs: Vec<Address> = {
        let store: PagedStore<u64> = PagedStore::open(&path).unwrap();
        let addrs: Vec<Address> = (0..1000u64).map(|i| store.insert(&(i * i)).unwrap()).collect();
        for a in addrs.iter().step_by(7) {
            store.remove(*a).unwrap();
        }
        addrs
    };

    let store: PagedStore<u64> = PagedStore::open(&path).unwrap();
    for (i, a) in addrs.iter().enumerate() {
        if i % 7 == 0 {
            assert!(matches!(store.get_value(*a), Err(Error::SlotNotOccupied(_))));
        } else {
            assert_eq!(store.get_value(*a).unwrap(), (i * i) as u64);
        }
    }

    // The freed slots are handed out again before the file grows.
    let pages_before = store.meta().unwrap().total_pages;
    for _ in 0..addrs.len().div_ceil(7) {
        let reused = store.insert(&1).unwrap();
        assert!(addrs.iter().step_by(7).any(|a| *a == reused), "{reused}");
    }
    assert_eq!(store.meta().unwrap().total_pages, pages_before);
}

#[test]
fn test_record_size_mismatch_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("values.db");

    drop(PagedStore::<u64>::open(&path).unwrap());
    assert!(matches!(
        PagedStore::<u32>::open(&path),
        Err(Error::Configuration(_))
    ));
    assert!(PagedStore::<i64>::open(&path).is_ok());
}

#[test]
fn test_pool_too_small_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("values.db");

    for pool_size in [0, 1] {
        let config = StoreConfig::default().with_pool_size(pool_size);
        assert!(matches!(
            PagedStore::<u64>::open_with_config(&path, &config),
            Err(Error::Configuration(_))
        ));
    }
    assert!(!path.exists());

    let config = StoreConfig::default().with_pool_size(2);
    let store: PagedStore<u64> = PagedStore::open_with_config(&path, &config).unwrap();
    let a = store.insert(&5).unwrap();
    assert_eq!(store.get_value(a).unwrap(), 5);
}

#[test]
fn test_oversized_record_rejected() {
    let dir = tempdir().unwrap();

    assert!(matches!(
        PagedStore::<[u8; MAX_RECORD_SIZE + 1]>::open(dir.path().join("big.db")),
        Err(Error::Configuration(_))
    ));

    let store: PagedStore<[u8; MAX_RECORD_SIZE]> =
        PagedStore::open(dir.path().join("max.db")).unwrap();
    assert_eq!(store.capacity_per_page(), 1);
    let a = store.insert(&[7; MAX_RECORD_SIZE]).unwrap();
    let b = store.insert(&[8; MAX_RECORD_SIZE]).unwrap();
    assert_ne!(a.page_id(), b.page_id());
}

#[test]
fn test_concurrent_updates_and_inserts_survive_eviction() {
    const WRITERS: usize = 4;
    const ROUNDS: usize = 20;

    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let config = StoreConfig::default().with_pool_size(8);

    let addrs: Vec<Address> = {
        let store: PagedStore<[u8; 500]> = PagedStore::open_with_config(&path, &config).unwrap();
        (0..120).map(|_| store.insert(&[0; 500]).unwrap()).collect()
    };

    // Cold cache: every writer and the inserter miss on shared pages.
    let store: PagedStore<[u8; 500]> = PagedStore::open_with_config(&path, &config).unwrap();
    let inserted: Vec<Address> = std::thread::scope(|s| {
        for t in 0..WRITERS {
            let store = &store;
            let addrs = &addrs;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    for (i, a) in addrs.iter().enumerate().filter(|(i, _)| i % WRITERS == t) {
                        store.update(*a, &[(i + round) as u8; 500]).unwrap();
                    }
                }
            });
        }
        let inserter = s.spawn(|| {
            (0..40u8)
                .map(|i| store.insert(&[i; 500]).unwrap())
                .collect::<Vec<_>>()
        });
        inserter.join().unwrap()
    });

    let check = |store: &PagedStore<[u8; 500]>| {
        for (i, a) in addrs.iter().enumerate() {
            assert_eq!(store.get_value(*a).unwrap(), [(i + ROUNDS - 1) as u8; 500], "record {i}");
        }
        for (i, a) in inserted.iter().enumerate() {
            assert_eq!(store.get_value(*a).unwrap(), [i as u8; 500]);
        }
        assert_eq!(store.record_count().unwrap(), addrs.len() + inserted.len());
    };

    check(&store);
    drop(store);
    check(&PagedStore::open_with_config(&path, &config).unwrap());
}

#[test]
fn test_small_pool_evicts_and_reloads() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::default().with_pool_size(3);
    let store: PagedStore<[u8; 1000]> =
        PagedStore::open_with_config(dir.path().join("small.db"), &config).unwrap();

    let addrs: Vec<Address> = (0..60u8).map(|i| store.insert(&[i; 1000]).unwrap()).collect();
    assert_eq!(store.meta().unwrap().total_pages, 21);
    for (i, a) in addrs.iter().enumerate() {
        assert_eq!(store.get_value(*a).unwrap(), [i as u8; 1000]);
    }

    let stats = store.stats();
    assert!(stats.evictions > 0, "{stats}");
    assert!(stats.pages_written > 0, "{stats}");
}

#[test]
fn test_file_grows_one_page_at_a_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.db");
    let store: PagedStore<u32> = PagedStore::open(&path).unwrap();
    let per_page = store.capacity_per_page();

    for i in 0..per_page as u32 {
        store.insert(&i).unwrap();
    }
    assert_eq!(store.meta().unwrap().total_pages, 2);
    assert!(store.free_pages().unwrap().is_empty());

    let spill = store.insert(&0).unwrap();
    assert_eq!(spill.page_id(), PageId::new(2));
    store.flush().unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 3 * 4096);
}

#[derive(Debug, Clone)]
enum StoreOp {
    Insert(u64),
    Remove(usize),
    Update(usize, u64),
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => any::<u64>().prop_map(StoreOp::Insert),
        2 => any::<usize>().prop_map(StoreOp::Remove),
        1 => (any::<usize>(), any::<u64>()).prop_map(|(i, v)| StoreOp::Update(i, v)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Live addresses are unique, hold what was last written, and the
    /// occupancy count matches the model.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(store_op(), 1..400)) {
        let dir = tempdir().unwrap();
        let store: PagedStore<[u8; 700]> = PagedStore::open(dir.path().join("p.db")).unwrap();
        let mut model: HashMap<Address, u64> = HashMap::new();
        let mut live: Vec<Address> = Vec::new();

        let record = |v: u64| {
            let mut r = [0u8; 700];
            r[..8].copy_from_slice(&v.to_le_bytes());
            r
        };

        for op in ops {
            match op {
                StoreOp::Insert(v) => {
                    let a = store.insert(&record(v)).unwrap();
                    prop_assert!(model.insert(a, v).is_none(), "address {} handed out twice", a);
                    live.push(a);
                }
                StoreOp::Remove(i) if !live.is_empty() => {
                    let a = live.swap_remove(i % live.len());
                    store.remove(a).unwrap();
                    model.remove(&a);
                }
                StoreOp::Update(i, v) if !live.is_empty() => {
                    let a = live[i % live.len()];
                    store.update(a, &record(v)).unwrap();
                    model.insert(a, v);
                }
                _ => {}
            }
        }

        prop_assert_eq!(store.record_count().unwrap(), model.len());
        for (a, v) in &model {
            prop_assert_eq!(store.get_value(*a).unwrap(), record(*v));
        }
    }
}

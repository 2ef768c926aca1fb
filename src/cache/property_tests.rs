//! Property-Based Tests for Cache Module
//!
//! Random operation sequences against `MemoryStore`, checking the capacity
//! bound, tag-index consistency and statistics bookkeeping.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    tag_set, CacheBackend, EvictionPolicy, Expiry, ManualClock, MemoryStore, StoreOptions, TagSet,
};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 8;

// == Strategies ==
fn key_strategy() -> impl Strategy<Value = String> {
    "k[0-9]{1,2}".prop_map(|s| s)
}

fn tags_strategy() -> impl Strategy<Value = TagSet> {
    prop::collection::btree_set("t[a-c]", 0..3)
}

fn policy_strategy() -> impl Strategy<Value = EvictionPolicy> {
    prop_oneof![
        Just(EvictionPolicy::Lru),
        Just(EvictionPolicy::Lfu),
        Just(EvictionPolicy::Fifo),
        Just(EvictionPolicy::Random),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: i64, tags: TagSet },
    Get { key: String },
    Delete { key: String },
    DeleteByTag { tag: String },
    Advance { secs: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), any::<i64>(), tags_strategy())
            .prop_map(|(key, value, tags)| CacheOp::Set { key, value, tags }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => "t[a-c]".prop_map(|tag| CacheOp::DeleteByTag { tag }),
        1 => (0u64..4).prop_map(|secs| CacheOp::Advance { secs }),
    ]
}

fn store_with_clock(policy: EvictionPolicy, ttl: Option<Duration>) -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let store = MemoryStore::with_options(
        StoreOptions::new(TEST_MAX_ENTRIES, policy)
            .default_ttl(ttl)
            .clock(clock.clone()),
    );
    (store, clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Size never exceeds capacity, whatever the policy or operation mix.
    #[test]
    fn prop_capacity_bound(
        policy in policy_strategy(),
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
    ) {
        let (store, clock) = store_with_clock(policy, Some(Duration::from_secs(5)));

        for op in ops {
            match op {
                CacheOp::Set { key, value, tags } => {
                    store.set(&key, json!(value), Expiry::Default, tags).unwrap();
                }
                CacheOp::Get { key } => { store.get(&key); }
                CacheOp::Delete { key } => { store.delete(&key); }
                CacheOp::DeleteByTag { tag } => { store.delete_by_tags(&tag_set([tag])); }
                CacheOp::Advance { secs } => clock.advance(Duration::from_secs(secs)),
            }
            prop_assert!(store.len() <= TEST_MAX_ENTRIES);
            prop_assert_eq!(store.stats().current_size, store.len());
        }
    }

    // The tag index mirrors the tags of live entries after every operation.
    #[test]
    fn prop_tag_index_consistency(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let (store, clock) = store_with_clock(EvictionPolicy::Lru, Some(Duration::from_secs(3)));

        for op in ops {
            match op {
                CacheOp::Set { key, value, tags } => {
                    store.set(&key, json!(value), Expiry::Default, tags).unwrap();
                }
                CacheOp::Get { key } => { store.get(&key); }
                CacheOp::Delete { key } => { store.delete(&key); }
                CacheOp::DeleteByTag { tag } => { store.delete_by_tags(&tag_set([tag])); }
                CacheOp::Advance { secs } => {
                    clock.advance(Duration::from_secs(secs));
                    store.purge_expired();
                }
            }
            prop_assert!(store.tag_index_consistent());
        }
    }

    // Hits and misses match a model map when nothing can expire or be evicted.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let store = MemoryStore::new(1000, EvictionPolicy::Lru);
        let mut model: HashMap<String, i64> = HashMap::new();
        let (mut hits, mut misses, mut sets, mut deletes) = (0u64, 0u64, 0u64, 0u64);

        for op in ops {
            match op {
                CacheOp::Set { key, value, tags } => {
                    store.set(&key, json!(value), Expiry::Never, tags).unwrap();
                    model.insert(key, value);
                    sets += 1;
                }
                CacheOp::Get { key } => {
                    let got = store.get(&key);
                    match model.get(&key) {
                        Some(value) => {
                            prop_assert_eq!(got, Some(json!(*value)));
                            hits += 1;
                        }
                        None => {
                            prop_assert!(got.is_none());
                            misses += 1;
                        }
                    }
                }
                CacheOp::Delete { key } => {
                    let removed = store.delete(&key);
                    prop_assert_eq!(removed, model.remove(&key).is_some());
                    if removed {
                        deletes += 1;
                    }
                }
                CacheOp::DeleteByTag { tag } => {
                    let removed = store.delete_by_tags(&tag_set([tag.clone()]));
                    let doomed: Vec<String> = model
                        .keys()
                        .filter(|key| store.peek_entry(key).is_none())
                        .cloned()
                        .collect();
                    prop_assert_eq!(removed, doomed.len());
                    for key in doomed {
                        model.remove(&key);
                    }
                    deletes += removed as u64;
                }
                CacheOp::Advance { .. } => {}
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        prop_assert_eq!(stats.sets, sets);
        prop_assert_eq!(stats.deletes, deletes);
        prop_assert_eq!(stats.total_requests, hits + misses);
        prop_assert_eq!(stats.evictions, 0);
        prop_assert_eq!(stats.current_size, model.len());
    }

    // Under LRU, filling past capacity evicts the least recently read key.
    #[test]
    fn prop_lru_evicts_least_recent(reads in prop::collection::vec(0usize..TEST_MAX_ENTRIES, 0..20)) {
        let (store, _clock) = store_with_clock(EvictionPolicy::Lru, None);
        let mut recency: Vec<usize> = (0..TEST_MAX_ENTRIES).collect();

        for i in 0..TEST_MAX_ENTRIES {
            store.set(&format!("k{i}"), json!(i), Expiry::Never, TagSet::new()).unwrap();
        }
        for i in reads {
            store.get(&format!("k{i}"));
            recency.retain(|&k| k != i);
            recency.push(i);
        }

        store.set("overflow", json!(0), Expiry::Never, TagSet::new()).unwrap();

        let victim = format!("k{}", recency[0]);
        prop_assert!(!store.exists(&victim));
        prop_assert_eq!(store.len(), TEST_MAX_ENTRIES);
        prop_assert!(store.exists("overflow"));
    }
}

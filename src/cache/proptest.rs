//! Property-Based Tests for the LRU Engine
//!
//! Drives the engine with random add/get sequences and checks it against a
//! plain vector model of the recency list.
//!
//! # Test Properties
//!
//! 1. **Budget**: used bytes never exceed the budget after an operation
//! 2. **Order**: the engine's recency order matches the model exactly
//! 3. **Accounting**: used bytes equal the sum of live entry sizes
//! 4. **Read-through**: a group backed by a tiny cache still returns the
//!    source value for every key, whatever was evicted in between

#![cfg(test)]

use std::num::NonZeroU64;

use proptest::prelude::*;

use super::lru::LruCache;
use crate::group::{GetterFn, GroupRegistry};

#[derive(Debug, Clone)]
enum Op {
    Add(String, String),
    Get(String),
}

/// Small key space so operations collide often.
fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e", "f", "gg", "hhh"]).prop_map(String::from)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (key_strategy(), "[a-z]{0,12}").prop_map(|(k, v)| Op::Add(k, v)),
        key_strategy().prop_map(Op::Get),
    ]
}

/// Reference model: entries ordered least to most recently used.
#[derive(Default)]
struct Model {
    entries: Vec<(String, usize)>,
}

impl Model {
    fn used(&self) -> u64 {
        self.entries.iter().map(|(k, v)| (k.len() + v) as u64).sum()
    }

    fn touch(&mut self, key: &str) -> Option<usize> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        let entry = self.entries.remove(idx);
        let size = entry.1;
        self.entries.push(entry);
        Some(size)
    }

    fn add(&mut self, key: &str, size: usize, budget: u64) {
        if self.touch(key).is_some() {
            if let Some(last) = self.entries.last_mut() {
                last.1 = size;
            }
        } else {
            self.entries.push((key.to_string(), size));
        }
        while self.used() > budget && !self.entries.is_empty() {
            self.entries.remove(0);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_used_bytes_within_budget(
        budget in 1u64..64,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut lru: LruCache<String> = LruCache::new(NonZeroU64::new(budget).unwrap());

        for op in ops {
            match op {
                Op::Add(k, v) => lru.add(&k, v),
                Op::Get(k) => { lru.get(&k); }
            }
            prop_assert!(lru.used_bytes() <= budget);
        }
    }

    #[test]
    fn prop_matches_reference_model(
        budget in 1u64..64,
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut lru: LruCache<String> = LruCache::new(NonZeroU64::new(budget).unwrap());
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Add(k, v) => {
                    model.add(&k, v.len(), budget);
                    lru.add(&k, v);
                }
                Op::Get(k) => {
                    let expected = model.touch(&k);
                    let actual = lru.get(&k).map(String::len);
                    prop_assert_eq!(actual, expected);
                }
            }

            let keys: Vec<&str> = lru.keys().collect();
            let model_keys: Vec<&str> = model.entries.iter().map(|(k, _)| k.as_str()).collect();
            prop_assert_eq!(keys, model_keys);
            prop_assert_eq!(lru.used_bytes(), model.used());
        }
    }

    #[test]
    fn prop_group_reads_through_evictions(
        budget in 1u64..32,
        keys in prop::collection::vec(key_strategy(), 1..100),
    ) {
        let registry = GroupRegistry::new();
        let group = registry
            .new_group(
                "prop",
                budget,
                GetterFn(|key: &str| -> anyhow::Result<Vec<u8>> {
                    Ok(key.repeat(3).into_bytes())
                }),
            )
            .unwrap();

        for key in keys {
            let value = tokio_test::block_on(group.get(&key)).unwrap();
            prop_assert_eq!(value.to_string(), key.repeat(3));
            prop_assert!(group.cache_stats().bytes <= budget);
        }
    }
}

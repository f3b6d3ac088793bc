// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hash map aliases used across the engine
//!
//! - `FxHashMap`/`FxHashSet` for short-lived per-query scratch (grouping,
//!   join membership sets)
//! - `AHashMap` for long-lived index postings (fixed seeds, stable across runs)
//! - `DashMap` for caches shared between threads

use ahash::{AHashMap, RandomState};
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub use rustc_hash::{FxHashMap, FxHashSet};

/// Type alias for FxHash's BuildHasher
pub type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Concurrent map keyed by FxHash
pub type ConcurrentMap<K, V> = DashMap<K, V, FxBuildHasher>;

/// Hash map for index postings
pub type IndexMap<K, V> = AHashMap<K, V>;

/// Fixed ahash seeds so that index iteration order is reproducible
const INDEX_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Create an empty index posting map
#[inline]
pub fn new_index_map<K, V>() -> IndexMap<K, V> {
    let state = RandomState::with_seeds(INDEX_SEEDS[0], INDEX_SEEDS[1], INDEX_SEEDS[2], INDEX_SEEDS[3]);
    AHashMap::with_hasher(state)
}

/// Create an empty concurrent map
#[inline]
pub fn new_concurrent_map<K: Eq + std::hash::Hash, V>() -> ConcurrentMap<K, V> {
    DashMap::with_hasher(FxBuildHasher::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_index_map_basic() {
        let mut map: IndexMap<i64, &str> = new_index_map();
        map.insert(1, "one");
        map.insert(-1, "minus one");
        assert_eq!(map.get(&1), Some(&"one"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_concurrent_map_multithreaded() {
        let map: Arc<ConcurrentMap<u64, u64>> = Arc::new(new_concurrent_map());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..100 {
                        map.insert(t * 100 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), 400);
    }
}

//! Symbol dictionary: string values of symbol columns <-> dense i32 codes.
//!
//! Codes are what the column layer persists, so the two reserved sentinels
//! live in the coded domain: [`VALUE_IS_NULL`] for a null value and
//! [`VALUE_NOT_FOUND`] for a failed lookup. Committed keys are dense,
//! 0-based and assigned in insertion order.
//!
//! The table is single-writer: the one writer owning the backing journal
//! mutates it, concurrent readers need an external snapshot mechanism.
//! There is no internal locking.

pub mod kv_index;
mod store;

use std::collections::HashMap;

use crate::error::{JournalError, Result};
use crate::hash::{bounded_hash, ceil_pow2};
use kv_index::KvIndex;
use store::SymbolStore;

/// Lookup miss. Never a valid key.
pub const VALUE_NOT_FOUND: i32 = -2;
/// Code reserved for null values. Never a valid key.
pub const VALUE_IS_NULL: i32 = -1;

/// Fraction of the expected distinct count used for hash bucket sizing.
/// Chains stay short for low/medium-cardinality columns without paying
/// for one bucket per value.
const BUCKET_LOAD_FACTOR_DIV: usize = 5;

/// Bidirectional value <-> key dictionary for one symbol column.
pub struct SymbolTable {
    column: String,
    bucket_count: usize,
    store: SymbolStore,
    index: KvIndex,
    /// Committed value count. Lookups never surface keys at or beyond
    /// this watermark even if the store holds them (crash rollback).
    size: usize,
    no_cache: bool,
    value_cache: HashMap<String, i32>,
    key_cache: Vec<Option<String>>,
}

impl SymbolTable {
    /// `distinct_count_hint` is the expected distinct value count for the
    /// column; bucket count is ~20% of it, rounded to a power of two.
    pub fn new(column: impl Into<String>, distinct_count_hint: usize, no_cache: bool) -> Self {
        let bucket_count = ceil_pow2((distinct_count_hint / BUCKET_LOAD_FACTOR_DIV).max(2));
        SymbolTable {
            column: column.into(),
            bucket_count,
            store: SymbolStore::new(),
            index: KvIndex::new(bucket_count),
            size: 0,
            no_cache,
            value_cache: HashMap::new(),
            key_cache: Vec::new(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Committed value count.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Intern `value`, returning its existing key or assigning the next
    /// sequential one. Idempotent.
    pub fn put(&mut self, value: &str) -> i32 {
        let key = self.get_quick(Some(value));
        if key != VALUE_NOT_FOUND {
            return key;
        }

        let key = self.store.append(value);
        self.index
            .add(bounded_hash(value, self.bucket_count), key as u64);
        self.size += 1;
        self.cache_pair(key, value);
        key
    }

    /// Key for `value`; [`VALUE_IS_NULL`] for `None`, [`VALUE_NOT_FOUND`]
    /// on a miss.
    pub fn get_quick(&mut self, value: Option<&str>) -> i32 {
        let value = match value {
            None => return VALUE_IS_NULL,
            Some(v) => v,
        };

        if !self.no_cache {
            if let Some(&key) = self.value_cache.get(value) {
                return key;
            }
        }

        self.probe(value)
    }

    /// Strict lookup: a miss is an error naming the column.
    pub fn get(&mut self, value: &str) -> Result<i32> {
        match self.get_quick(Some(value)) {
            VALUE_NOT_FOUND => Err(JournalError::InvalidSymbolValue {
                column: self.column.clone(),
                value: value.to_string(),
            }),
            key => Ok(key),
        }
    }

    pub fn value_exists(&mut self, value: &str) -> bool {
        self.get_quick(Some(value)) != VALUE_NOT_FOUND
    }

    /// Value for a committed key. `Ok(None)` for the null sentinel;
    /// any other key outside `[0, size)` is an error.
    pub fn value(&mut self, key: i32) -> Result<Option<&str>> {
        if key == VALUE_IS_NULL {
            return Ok(None);
        }
        if key < 0 || key as usize >= self.size {
            return Err(JournalError::InvalidSymbolKey(key));
        }

        if self.no_cache {
            return Ok(self.store.str_at(key));
        }

        let k = key as usize;
        if self.key_cache.len() <= k {
            self.key_cache.resize(k + 1, None);
        }
        if self.key_cache[k].is_none() {
            self.key_cache[k] = self.store.str_at(key).map(str::to_owned);
        }
        Ok(self.key_cache[k].as_deref())
    }

    /// Committed `(key, value)` pairs in key order.
    pub fn entries(&self) -> impl Iterator<Item = (i32, &str)> + '_ {
        (0..self.size as i32).filter_map(move |key| self.store.str_at(key).map(|v| (key, v)))
    }

    /// Warm both caches from the store.
    pub fn pre_load(&mut self) {
        if self.no_cache {
            return;
        }
        self.key_cache.resize(self.size, None);
        for key in 0..self.size as i32 {
            if let Some(value) = self.store.str_at(key) {
                let owned = value.to_string();
                self.value_cache.entry(owned.clone()).or_insert(key);
                self.key_cache[key as usize] = Some(owned);
            }
        }
    }

    /// Roll back to `size` committed values. Keys >= `size` become
    /// unresolvable. Caches are cleared unconditionally and repopulate
    /// lazily.
    pub fn truncate(&mut self, size: usize) {
        if self.size <= size {
            return;
        }
        self.store.truncate(size);
        self.index.truncate(size as u64);
        self.clear_cache();
        self.size = size;
        tracing::debug!(column = self.column.as_str(), size, "symbol table truncated");
    }

    /// Adopt the store length as the committed size after replayed
    /// appends.
    pub fn align_size(&mut self) {
        self.size = self.store.len();
    }

    /// Re-synchronize to a durably committed watermark after a crash or
    /// rollback: store, index and caches all roll back so no key beyond
    /// `size` is ever visible.
    pub fn apply_tx(&mut self, size: usize) {
        let size = size.min(self.store.len());
        self.store.truncate(size);
        self.index.truncate(size as u64);
        self.clear_cache();
        self.size = size;
        tracing::debug!(column = self.column.as_str(), size, "symbol table tx applied");
    }

    fn probe(&mut self, value: &str) -> i32 {
        let bucket = bounded_hash(value, self.bucket_count);
        if !self.index.contains(bucket) {
            return VALUE_NOT_FOUND;
        }

        let mut found = VALUE_NOT_FOUND;
        for candidate in self.index.cursor(bucket) {
            let key = candidate as i32;
            // stale index entries past the watermark are not matches
            if (key as usize) < self.size && self.store.matches(key, value) {
                found = key;
                break;
            }
        }

        if found != VALUE_NOT_FOUND {
            self.cache_pair(found, value);
        }
        found
    }

    fn cache_pair(&mut self, key: i32, value: &str) {
        if self.no_cache {
            return;
        }
        self.value_cache.insert(value.to_string(), key);
        let k = key as usize;
        if self.key_cache.len() <= k {
            self.key_cache.resize(k + 1, None);
        }
        self.key_cache[k] = Some(value.to_string());
    }

    fn clear_cache(&mut self) {
        self.value_cache.clear();
        self.key_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_assigns_sequential_keys() {
        let mut tab = SymbolTable::new("sym", 128, false);
        assert_eq!(tab.put("eurusd"), 0);
        assert_eq!(tab.put("gbpusd"), 1);
        assert_eq!(tab.put("usdjpy"), 2);
        assert_eq!(tab.size(), 3);
    }

    #[test]
    fn test_put_idempotent() {
        let mut tab = SymbolTable::new("sym", 128, false);
        assert_eq!(tab.put("eurusd"), 0);
        assert_eq!(tab.put("gbpusd"), 1);
        assert_eq!(tab.put("eurusd"), 0);
        assert_eq!(tab.size(), 2);
    }

    #[test]
    fn test_get_and_value_roundtrip() {
        let mut tab = SymbolTable::new("sym", 16, false);
        let values = ["a", "bb", "ccc", "dddd"];
        for v in values {
            tab.put(v);
        }
        for (i, v) in values.iter().enumerate() {
            assert_eq!(tab.get(v).unwrap(), i as i32);
            assert_eq!(tab.value(i as i32).unwrap(), Some(*v));
        }
    }

    #[test]
    fn test_null_and_miss_sentinels() {
        let mut tab = SymbolTable::new("sym", 16, false);
        tab.put("x");
        assert_eq!(tab.get_quick(None), VALUE_IS_NULL);
        assert_eq!(tab.get_quick(Some("missing")), VALUE_NOT_FOUND);
        assert_ne!(VALUE_IS_NULL, VALUE_NOT_FOUND);
        assert_eq!(tab.value(VALUE_IS_NULL).unwrap(), None);
    }

    #[test]
    fn test_get_miss_is_error() {
        let mut tab = SymbolTable::new("side", 16, false);
        let err = tab.get("missing").unwrap_err();
        assert!(
            err.to_string().contains("Invalid value 'missing' for symbol side"),
            "{}",
            err
        );
    }

    #[test]
    fn test_value_out_of_range_is_error() {
        let mut tab = SymbolTable::new("sym", 16, false);
        tab.put("a");
        assert!(tab.value(1).is_err());
        assert!(tab.value(-5).is_err());
        assert!(tab.value(0).is_ok());
    }

    #[test]
    fn test_truncate_rollback() {
        let mut tab = SymbolTable::new("sym", 16, false);
        for v in ["a", "b", "c", "d"] {
            tab.put(v);
        }

        tab.truncate(2);
        assert_eq!(tab.size(), 2);
        assert_eq!(tab.get_quick(Some("c")), VALUE_NOT_FOUND);
        assert_eq!(tab.get_quick(Some("d")), VALUE_NOT_FOUND);
        assert!(tab.value(2).is_err());
        assert_eq!(tab.value(0).unwrap(), Some("a"));
        assert_eq!(tab.get_quick(Some("b")), 1);

        // keys freed by truncation are reassigned
        assert_eq!(tab.put("e"), 2);
        assert_eq!(tab.value(2).unwrap(), Some("e"));
    }

    #[test]
    fn test_apply_tx_hides_uncommitted_tail() {
        let mut tab = SymbolTable::new("sym", 16, false);
        for v in ["a", "b", "c"] {
            tab.put(v);
        }

        // crash recovery: only the first write was durable
        tab.apply_tx(1);
        assert_eq!(tab.size(), 1);
        assert_eq!(tab.get_quick(Some("b")), VALUE_NOT_FOUND);
        assert!(tab.value(1).is_err());
        assert_eq!(tab.value(0).unwrap(), Some("a"));
    }

    #[test]
    fn test_align_size_adopts_replayed_appends() {
        let mut tab = SymbolTable::new("sym", 16, false);
        tab.put("a");
        tab.put("b");
        tab.truncate(0);
        tab.put("x");
        tab.align_size();
        assert_eq!(tab.size(), 1);
        assert_eq!(tab.value(0).unwrap(), Some("x"));
    }

    #[test]
    fn test_no_cache_mode() {
        let mut tab = SymbolTable::new("sym", 16, true);
        assert_eq!(tab.put("a"), 0);
        assert_eq!(tab.put("a"), 0);
        assert_eq!(tab.get_quick(Some("a")), 0);
        assert_eq!(tab.value(0).unwrap(), Some("a"));
    }

    #[test]
    fn test_entries_iteration() {
        let mut tab = SymbolTable::new("sym", 16, false);
        tab.put("a");
        tab.put("b");
        let all: Vec<(i32, String)> =
            tab.entries().map(|(k, v)| (k, v.to_string())).collect();
        assert_eq!(all, vec![(0, "a".to_string()), (1, "b".to_string())]);
    }

    #[test]
    fn test_pre_load() {
        let mut tab = SymbolTable::new("sym", 16, false);
        tab.put("a");
        tab.put("b");
        tab.truncate(2); // no-op, caches intact
        tab.pre_load();
        assert_eq!(tab.get_quick(Some("b")), 1);
    }

    #[test]
    fn test_collisions_resolve_by_comparison() {
        // two buckets force collisions; correctness must not depend on
        // hash spread
        let mut tab = SymbolTable::new("sym", 2, false);
        let values: Vec<String> = (0..64).map(|i| format!("v{}", i)).collect();
        for v in &values {
            tab.put(v);
        }
        for (i, v) in values.iter().enumerate() {
            assert_eq!(tab.get_quick(Some(v)), i as i32);
        }
    }
}

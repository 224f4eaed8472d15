//! Set-associative cache keyed by query text.
//!
//! Memoizes compiled plans on the query-compilation hot path. Entries
//! group into power-of-two rows of `blocks` ways by key hash; within a
//! row, the most recent insert occupies slot 0 and the last slot's
//! occupant is evicted on overflow. The bounded row scan trades perfect
//! LRU for O(blocks) cost and no allocation on lookups.

use crate::hash::{bounded_hash, ceil_pow2};

const MIN_BLOCKS: usize = 2;

/// Fixed-capacity text-keyed cache of `rows x blocks` slots.
pub struct AssociativeCache<V> {
    keys: Vec<Option<String>>,
    values: Vec<Option<V>>,
    rows: usize,
    blocks: usize,
    bshift: u32,
}

impl<V> AssociativeCache<V> {
    /// Capacity is `ceil_pow2(rows)` rows of `ceil_pow2(max(2, blocks))`
    /// ways each.
    pub fn new(blocks: usize, rows: usize) -> Self {
        let blocks = ceil_pow2(blocks.max(MIN_BLOCKS));
        let rows = ceil_pow2(rows);
        let size = rows * blocks;
        AssociativeCache {
            keys: (0..size).map(|_| None).collect(),
            values: (0..size).map(|_| None).collect(),
            rows,
            blocks,
            bshift: blocks.trailing_zeros(),
        }
    }

    /// Value for `key` without touching entry order.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.find(key).and_then(|i| self.values[i].as_ref())
    }

    /// Take the value for `key`, leaving the key slot in place so a
    /// subsequent `put` of the same key reuses its row position.
    pub fn poll(&mut self, key: &str) -> Option<V> {
        self.find(key).and_then(|i| self.values[i].take())
    }

    /// Insert at slot 0 of the key's row, shifting the row down. The
    /// last slot's occupant is evicted (its value dropped) and its key
    /// returned for caller cleanup.
    pub fn put(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        let key = key.into();
        let lo = self.lo(&key);
        let hi = lo + self.blocks;

        let evicted_key = self.keys[hi - 1].take();
        self.values[hi - 1] = None;
        self.keys[lo..hi].rotate_right(1);
        self.values[lo..hi].rotate_right(1);
        self.keys[lo] = Some(key);
        self.values[lo] = Some(value);
        evicted_key
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        for slot in &mut self.keys {
            *slot = None;
        }
        for slot in &mut self.values {
            *slot = None;
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        let lo = self.lo(key);
        for i in lo..lo + self.blocks {
            match &self.keys[i] {
                // rows fill from slot 0; a vacant slot ends the scan
                None => return None,
                Some(k) if k == key => return Some(i),
                Some(_) => {}
            }
        }
        None
    }

    fn lo(&self, key: &str) -> usize {
        bounded_hash(key, self.rows) << self.bshift
    }
}

//! Chained hash index: bounded bucket -> values in insertion order.
//!
//! Shared shape between the symbol dictionary (bucket -> dictionary keys)
//! and in-memory column row indexes (bucket -> row offsets). Collisions
//! are resolved by the caller comparing stored values directly; the index
//! itself never re-hashes.

/// Bucketed multi-map of `u64` values with insertion-order chains.
#[derive(Debug)]
pub struct KvIndex {
    buckets: Vec<Vec<u64>>,
}

impl KvIndex {
    /// `bucket_count` must be a power of two (see
    /// [`ceil_pow2`](crate::hash::ceil_pow2)).
    pub fn new(bucket_count: usize) -> Self {
        debug_assert!(bucket_count.is_power_of_two());
        KvIndex {
            buckets: vec![Vec::new(); bucket_count],
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn add(&mut self, bucket: usize, value: u64) {
        self.buckets[bucket].push(value);
    }

    pub fn contains(&self, bucket: usize) -> bool {
        self.buckets.get(bucket).is_some_and(|b| !b.is_empty())
    }

    /// Iterate the chain for `bucket` in insertion order. An out-of-range
    /// bucket yields an empty cursor.
    pub fn cursor(&self, bucket: usize) -> impl Iterator<Item = u64> + '_ {
        self.buckets
            .get(bucket)
            .map(|b| b.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Drop every indexed value >= `watermark` from all chains. Rollback
    /// support: value order within surviving chains is preserved.
    pub fn truncate(&mut self, watermark: u64) {
        for bucket in &mut self.buckets {
            bucket.retain(|&v| v < watermark);
        }
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}

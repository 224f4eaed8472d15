//! Hash/lambda semi-join head operator.
//!
//! Evaluates an inner record source once per execution into a
//! de-duplicated key set, then walks the target column's hash index per
//! slice: for each key, the first index-order hit whose stored value
//! equals the key (and passes the optional residual filter) is kept —
//! exactly one row per key. Index order follows hash-index insertion
//! order, which for out-of-order writes is not necessarily chronological
//! order; callers wanting strict "latest by" semantics must write the
//! index in timestamp order.

use std::collections::HashSet;

use crate::error::{JournalError, Result};
use crate::hash::bounded_hash;
use crate::ops::{
    row_id, Datum, PartitionSlice, RecordSource, RowCursor, RowFilter, RowSource, StorageFacade,
    VecRowCursor,
};
use crate::schema::JournalMetadata;

/// Semi-join head over one indexed text column.
pub struct KvIndexLambdaHeadRowSource {
    column: String,
    record_source: Box<dyn RecordSource>,
    record_source_column: usize,
    filter: Option<Box<dyn RowFilter>>,
    column_index: usize,
    buckets: usize,
    /// De-duplicated keys in first-seen order, with their bucket hashes.
    keys: Vec<String>,
    hashes: Vec<usize>,
}

impl KvIndexLambdaHeadRowSource {
    pub fn new(
        column: impl Into<String>,
        record_source: Box<dyn RecordSource>,
        record_source_column: usize,
        filter: Option<Box<dyn RowFilter>>,
    ) -> Self {
        KvIndexLambdaHeadRowSource {
            column: column.into(),
            record_source,
            record_source_column,
            filter,
            column_index: 0,
            buckets: 0,
            keys: Vec::new(),
            hashes: Vec::new(),
        }
    }
}

impl RowSource for KvIndexLambdaHeadRowSource {
    fn configure(&mut self, metadata: &JournalMetadata) -> Result<()> {
        self.column_index = metadata.column_index_required(&self.column)?;
        self.buckets = metadata.column(self.column_index).distinct_count_hint;
        if self.buckets < 2 || !self.buckets.is_power_of_two() {
            return Err(JournalError::configuration(format!(
                "Column {} has no usable index bucket hint",
                self.column
            )));
        }
        Ok(())
    }

    fn prepare(&mut self, facade: &mut dyn StorageFacade) -> Result<()> {
        if let Some(filter) = self.filter.as_mut() {
            filter.prepare(facade)?;
        }

        self.keys.clear();
        self.hashes.clear();
        self.record_source.prepare(facade)?;

        let mut seen: HashSet<String> = HashSet::new();
        while let Some(record) = self.record_source.next_record()? {
            let key = match record.get(self.record_source_column)? {
                Datum::Str(s) => s,
                Datum::Null => continue,
                other => {
                    return Err(JournalError::configuration(format!(
                        "Lambda key column must be text, got {:?}",
                        other
                    )))
                }
            };
            if seen.insert(key.clone()) {
                self.hashes.push(bounded_hash(&key, self.buckets));
                self.keys.push(key);
            }
        }
        Ok(())
    }

    fn prepare_cursor<'a>(
        &'a mut self,
        slice: &PartitionSlice<'a>,
    ) -> Result<Box<dyn RowCursor + 'a>> {
        let partition = slice.partition;
        let index = partition.hash_index(self.column_index)?;
        let hi = if slice.calc_hi {
            partition.size()
        } else {
            slice.hi + 1
        };

        let mut rows = Vec::new();
        for (i, key) in self.keys.iter().enumerate() {
            for offset in index.cursor(self.hashes[i]) {
                if offset < slice.lo || offset >= hi {
                    continue;
                }
                if partition.str_at(self.column_index, offset)? != key.as_str() {
                    continue;
                }
                let accepted = match self.filter.as_mut() {
                    Some(filter) => filter.accept(partition, offset)?,
                    None => true,
                };
                if accepted {
                    rows.push(row_id(partition.partition_index(), offset));
                    break;
                }
            }
        }

        rows.sort_unstable();
        Ok(Box::new(VecRowCursor::new(rows)))
    }

    fn reset(&mut self) {
        self.keys.clear();
        self.hashes.clear();
        self.record_source.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{HashIndexView, Partition, Record, RowId};
    use crate::schema::JournalStructure;
    use crate::symbol::kv_index::KvIndex;

    struct MemPartition {
        strings: Vec<Option<String>>,
        index: KvIndex,
    }

    impl MemPartition {
        /// Rows at given offsets, indexed into `buckets` hash buckets in
        /// offset order.
        fn with_rows(buckets: usize, rows: &[(u64, &str)]) -> Self {
            let max = rows.iter().map(|&(o, _)| o).max().unwrap_or(0) as usize;
            let mut strings = vec![None; max + 1];
            let mut index = KvIndex::new(buckets);
            for &(offset, value) in rows {
                strings[offset as usize] = Some(value.to_string());
                index.add(bounded_hash(value, buckets), offset);
            }
            MemPartition { strings, index }
        }
    }

    impl Partition for MemPartition {
        fn partition_index(&self) -> u32 {
            0
        }

        fn size(&self) -> u64 {
            self.strings.len() as u64
        }

        fn str_at(&self, _column: usize, offset: u64) -> Result<&str> {
            self.strings
                .get(offset as usize)
                .and_then(|s| s.as_deref())
                .ok_or_else(|| JournalError::storage(format!("no row at offset {}", offset)))
        }

        fn hash_index(&self, _column: usize) -> Result<&dyn HashIndexView> {
            Ok(&self.index)
        }
    }

    struct KeyRecord {
        values: Vec<Datum>,
    }

    impl Record for KeyRecord {
        fn row_id(&self) -> RowId {
            0
        }

        fn get(&self, column: usize) -> Result<Datum> {
            Ok(self.values[column].clone())
        }
    }

    struct VecRecordSource {
        records: Vec<KeyRecord>,
        pos: usize,
    }

    impl VecRecordSource {
        fn of_keys(keys: &[&str]) -> Box<dyn RecordSource> {
            Box::new(VecRecordSource {
                records: keys
                    .iter()
                    .map(|k| KeyRecord {
                        values: vec![Datum::Str(k.to_string())],
                    })
                    .collect(),
                pos: 0,
            })
        }
    }

    impl RecordSource for VecRecordSource {
        fn prepare(&mut self, _facade: &mut dyn StorageFacade) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn next_record(&mut self) -> Result<Option<&dyn Record>> {
            match self.records.get(self.pos) {
                Some(record) => {
                    self.pos += 1;
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        }

        fn reset(&mut self) {
            self.pos = 0;
        }
    }

    struct NullFacade;

    impl StorageFacade for NullFacade {
        fn symbol_table(&mut self, _column: usize) -> Option<&mut crate::symbol::SymbolTable> {
            None
        }
    }

    /// Filter rejecting a fixed set of offsets.
    struct RejectOffsets(Vec<u64>);

    impl RowFilter for RejectOffsets {
        fn prepare(&mut self, _facade: &mut dyn StorageFacade) -> Result<()> {
            Ok(())
        }

        fn accept(&mut self, _partition: &dyn Partition, offset: u64) -> Result<bool> {
            Ok(!self.0.contains(&offset))
        }
    }

    fn metadata() -> JournalMetadata {
        JournalStructure::new("quotes")
            .sym("s")
            .unwrap()
            .value_count_hint(4)
            .done()
            .build()
            .unwrap()
    }

    fn collect(
        source: &mut KvIndexLambdaHeadRowSource,
        partition: &MemPartition,
        lo: u64,
        hi: u64,
        calc_hi: bool,
    ) -> Vec<RowId> {
        let slice = PartitionSlice {
            partition,
            lo,
            hi,
            calc_hi,
        };
        let mut cursor = source.prepare_cursor(&slice).unwrap();
        let mut out = Vec::new();
        while let Some(id) = cursor.next_id().unwrap() {
            out.push(id);
        }
        out
    }

    #[test]
    fn test_one_row_per_key_first_index_hit() {
        let partition = MemPartition::with_rows(4, &[(10, "a"), (20, "b"), (30, "a")]);
        let mut source =
            KvIndexLambdaHeadRowSource::new("s", VecRecordSource::of_keys(&["a"]), 0, None);
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        let rows = collect(&mut source, &partition, 0, 0, true);
        // exactly one of {10, 30}: the first index-order hit
        assert_eq!(rows, vec![10]);
    }

    #[test]
    fn test_multiple_keys_sorted_ascending() {
        let partition = MemPartition::with_rows(4, &[(20, "b"), (10, "a"), (30, "a")]);
        let mut source =
            KvIndexLambdaHeadRowSource::new("s", VecRecordSource::of_keys(&["b", "a"]), 0, None);
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        let rows = collect(&mut source, &partition, 0, 0, true);
        assert_eq!(rows, vec![10, 20]);
    }

    #[test]
    fn test_index_insertion_order_wins_over_offset_order() {
        // out-of-order write: offset 30 was indexed before offset 10
        let partition = MemPartition::with_rows(4, &[(30, "a"), (10, "a")]);
        let mut source =
            KvIndexLambdaHeadRowSource::new("s", VecRecordSource::of_keys(&["a"]), 0, None);
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        assert_eq!(collect(&mut source, &partition, 0, 0, true), vec![30]);
    }

    #[test]
    fn test_duplicate_inner_keys_deduplicated() {
        let partition = MemPartition::with_rows(4, &[(10, "a"), (30, "a")]);
        let mut source = KvIndexLambdaHeadRowSource::new(
            "s",
            VecRecordSource::of_keys(&["a", "a", "a"]),
            0,
            None,
        );
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        assert_eq!(collect(&mut source, &partition, 0, 0, true), vec![10]);
    }

    #[test]
    fn test_residual_filter_moves_to_next_hit() {
        let partition = MemPartition::with_rows(4, &[(10, "a"), (20, "b"), (30, "a")]);
        let mut source = KvIndexLambdaHeadRowSource::new(
            "s",
            VecRecordSource::of_keys(&["a"]),
            0,
            Some(Box::new(RejectOffsets(vec![10]))),
        );
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        assert_eq!(collect(&mut source, &partition, 0, 0, true), vec![30]);
    }

    #[test]
    fn test_slice_bounds_respected() {
        let partition = MemPartition::with_rows(4, &[(10, "a"), (20, "b"), (30, "a")]);
        let mut source = KvIndexLambdaHeadRowSource::new(
            "s",
            VecRecordSource::of_keys(&["a", "b"]),
            0,
            None,
        );
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        // lo excludes offset 10
        assert_eq!(collect(&mut source, &partition, 15, 0, true), vec![20, 30]);
        // explicit hi is inclusive, excludes 20 and 30
        assert_eq!(collect(&mut source, &partition, 0, 15, false), vec![10]);
        // explicit hi keeps 20
        assert_eq!(collect(&mut source, &partition, 0, 20, false), vec![10, 20]);
    }

    #[test]
    fn test_missing_key_yields_nothing() {
        let partition = MemPartition::with_rows(4, &[(10, "a")]);
        let mut source =
            KvIndexLambdaHeadRowSource::new("s", VecRecordSource::of_keys(&["z"]), 0, None);
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();

        assert!(collect(&mut source, &partition, 0, 0, true).is_empty());
    }

    #[test]
    fn test_configure_unresolved_column_is_eager() {
        let mut source =
            KvIndexLambdaHeadRowSource::new("nope", VecRecordSource::of_keys(&["a"]), 0, None);
        let err = source.configure(&metadata()).unwrap_err();
        assert!(err.to_string().contains("Invalid column: nope"), "{}", err);
    }

    #[test]
    fn test_reset_then_prepare_reuses_source() {
        let partition = MemPartition::with_rows(4, &[(10, "a"), (20, "b")]);
        let mut source = KvIndexLambdaHeadRowSource::new(
            "s",
            VecRecordSource::of_keys(&["a", "b"]),
            0,
            None,
        );
        source.configure(&metadata()).unwrap();
        source.prepare(&mut NullFacade).unwrap();
        assert_eq!(collect(&mut source, &partition, 0, 0, true), vec![10, 20]);

        source.reset();
        source.prepare(&mut NullFacade).unwrap();
        assert_eq!(collect(&mut source, &partition, 0, 0, true), vec![10, 20]);
    }
}

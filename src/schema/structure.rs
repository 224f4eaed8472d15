//! Fluent journal structure builder and frozen metadata.
//!
//! `JournalStructure` accumulates column definitions; `build()` validates
//! them and derives the storage sizing hints (distinct-count buckets, page
//! bit hints) into an immutable `JournalMetadata`. Duplicate column names
//! are rejected when the column is defined, not at build time, so DDL
//! parsing fails on the offending definition.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{JournalError, Result};
use crate::hash::ceil_pow2;
use crate::schema::column::{ColumnMetadata, ColumnType, PartitionBy};

const DEFAULT_RECORD_COUNT_HINT: usize = 100_000;
const DEFAULT_AVG_SIZE: usize = 12;

/// Journal structure under construction.
#[derive(Debug)]
pub struct JournalStructure {
    name: String,
    columns: Vec<ColumnMetadata>,
    name_to_index: HashMap<String, usize>,
    timestamp_index: Option<usize>,
    partition_by: PartitionBy,
    record_count_hint: usize,
    tx_count_hint: Option<usize>,
}

impl JournalStructure {
    pub fn new(name: impl Into<String>) -> Self {
        JournalStructure {
            name: name.into(),
            columns: Vec::new(),
            name_to_index: HashMap::new(),
            timestamp_index: None,
            partition_by: PartitionBy::None,
            record_count_hint: DEFAULT_RECORD_COUNT_HINT,
            tx_count_hint: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn partition_by(mut self, partition: PartitionBy) -> Self {
        self.partition_by = partition;
        self
    }

    /// Expected total record count; drives default sizing hints.
    /// Zero is ignored.
    pub fn record_count_hint(mut self, hint: usize) -> Self {
        if hint > 0 {
            self.record_count_hint = hint;
        }
        self
    }

    pub fn tx_count_hint(mut self, hint: usize) -> Self {
        self.tx_count_hint = Some(hint);
        self
    }

    pub fn bool_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Bool)?;
        Ok(self)
    }

    pub fn byte_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Byte)?;
        Ok(self)
    }

    pub fn short_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Short)?;
        Ok(self)
    }

    pub fn long_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Long)?;
        Ok(self)
    }

    pub fn float_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Float)?;
        Ok(self)
    }

    pub fn double_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Double)?;
        Ok(self)
    }

    pub fn date_col(mut self, name: &str) -> Result<Self> {
        self.add_column(name, ColumnType::Date)?;
        Ok(self)
    }

    pub fn int_col(mut self, name: &str) -> Result<IntColumn> {
        let index = self.add_column(name, ColumnType::Int)?;
        Ok(IntColumn {
            structure: self,
            index,
        })
    }

    pub fn str_col(mut self, name: &str) -> Result<StrColumn> {
        let index = self.add_column(name, ColumnType::String)?;
        self.columns[index].avg_size = DEFAULT_AVG_SIZE;
        Ok(StrColumn {
            structure: self,
            index,
        })
    }

    pub fn sym(mut self, name: &str) -> Result<SymColumn> {
        let index = self.add_column(name, ColumnType::Symbol)?;
        Ok(SymColumn {
            structure: self,
            index,
        })
    }

    pub fn bin(mut self, name: &str) -> Result<BinColumn> {
        let index = self.add_column(name, ColumnType::Binary)?;
        self.columns[index].avg_size = DEFAULT_AVG_SIZE;
        Ok(BinColumn {
            structure: self,
            index,
        })
    }

    /// Add a date column and designate it as the journal timestamp.
    /// At most one timestamp column may exist.
    pub fn ts(mut self, name: &str) -> Result<Self> {
        if self.timestamp_index.is_some() {
            return Err(JournalError::configuration(format!(
                "Duplicate timestamp column: {}",
                name
            )));
        }
        let index = self.add_column(name, ColumnType::Date)?;
        self.timestamp_index = Some(index);
        Ok(self)
    }

    fn add_column(&mut self, name: &str, column_type: ColumnType) -> Result<usize> {
        if self.name_to_index.contains_key(name) {
            return Err(JournalError::configuration(format!(
                "Duplicate column: {}",
                name
            )));
        }
        let index = self.columns.len();
        self.columns.push(ColumnMetadata::new(name, column_type));
        self.name_to_index.insert(name.to_string(), index);
        Ok(index)
    }

    /// Validate the structure and derive storage sizing.
    pub fn build(self) -> Result<JournalMetadata> {
        let record_hint = self.record_count_hint;
        let tx_count_hint = self.tx_count_hint.unwrap_or(record_hint / 10);

        let mut columns = self.columns;
        for meta in &mut columns {
            if meta.indexed && meta.distinct_count_hint < 2 {
                meta.distinct_count_hint = ceil_pow2((record_hint / 100).max(2));
            }

            if meta.size == 0 && meta.avg_size == 0 {
                return Err(JournalError::configuration(format!(
                    "Invalid size for column {}.{}",
                    self.name, meta.name
                )));
            }

            // 20% of the expected record count approximates distinct
            // symbol cardinality when the caller gave no hint.
            if meta.distinct_count_hint < 1 && meta.column_type == ColumnType::Symbol {
                meta.distinct_count_hint = ceil_pow2((record_hint / 5).max(2));
            }

            match meta.column_type {
                ColumnType::String => {
                    meta.size = meta.avg_size + 4;
                    meta.bit_hint = bit_hint(meta.avg_size * 2, record_hint);
                    meta.index_bit_hint = bit_hint(8, record_hint);
                }
                ColumnType::Binary => {
                    meta.size = meta.avg_size;
                    meta.bit_hint = bit_hint(meta.avg_size, record_hint);
                    meta.index_bit_hint = bit_hint(8, record_hint);
                }
                _ => {
                    meta.bit_hint = bit_hint(meta.size, record_hint);
                }
            }
        }

        tracing::debug!(
            journal = self.name.as_str(),
            columns = columns.len(),
            "journal metadata built"
        );

        Ok(JournalMetadata {
            name: self.name,
            name_to_index: self.name_to_index,
            columns,
            timestamp_index: self.timestamp_index,
            partition_by: self.partition_by,
            record_count_hint: record_hint,
            tx_count_hint,
        })
    }
}

/// Int column under construction; may carry a hash index.
pub struct IntColumn {
    structure: JournalStructure,
    index: usize,
}

impl IntColumn {
    pub fn index(mut self) -> Self {
        self.structure.columns[self.index].indexed = true;
        self
    }

    /// Hash index bucket count hint. Rounded up to a power of two on build.
    pub fn buckets(mut self, count: usize) -> Self {
        self.structure.columns[self.index].distinct_count_hint = ceil_pow2(count.max(2));
        self
    }

    pub fn done(self) -> JournalStructure {
        self.structure
    }
}

/// Symbol column under construction.
pub struct SymColumn {
    structure: JournalStructure,
    index: usize,
}

impl SymColumn {
    pub fn index(mut self) -> Self {
        self.structure.columns[self.index].indexed = true;
        self
    }

    /// Expected distinct value count for the symbol dictionary.
    pub fn value_count_hint(mut self, count: usize) -> Self {
        self.structure.columns[self.index].distinct_count_hint = ceil_pow2(count.max(2));
        self
    }

    pub fn done(self) -> JournalStructure {
        self.structure
    }
}

/// String column under construction.
pub struct StrColumn {
    structure: JournalStructure,
    index: usize,
}

impl StrColumn {
    /// Average value length in bytes; sizes the variable-length store.
    pub fn avg_size(mut self, size: usize) -> Self {
        self.structure.columns[self.index].avg_size = size;
        self
    }

    pub fn done(self) -> JournalStructure {
        self.structure
    }
}

/// Binary column under construction.
pub struct BinColumn {
    structure: JournalStructure,
    index: usize,
}

impl BinColumn {
    pub fn avg_size(mut self, size: usize) -> Self {
        self.structure.columns[self.index].avg_size = size;
        self
    }

    pub fn done(self) -> JournalStructure {
        self.structure
    }
}

/// Immutable journal schema produced by [`JournalStructure::build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalMetadata {
    name: String,
    columns: Vec<ColumnMetadata>,
    name_to_index: HashMap<String, usize>,
    timestamp_index: Option<usize>,
    partition_by: PartitionBy,
    record_count_hint: usize,
    tx_count_hint: usize,
}

impl JournalMetadata {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &ColumnMetadata {
        &self.columns[index]
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.iter()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Like [`column_index`](Self::column_index) but failing with a
    /// `Configuration` error naming the column.
    pub fn column_index_required(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            JournalError::configuration(format!("Invalid column: {}", name))
        })
    }

    pub fn timestamp_index(&self) -> Option<usize> {
        self.timestamp_index
    }

    pub fn partition_by(&self) -> PartitionBy {
        self.partition_by
    }

    pub fn record_count_hint(&self) -> usize {
        self.record_count_hint
    }

    pub fn tx_count_hint(&self) -> usize {
        self.tx_count_hint
    }
}

/// Page size hint in bits for a column of `rec_size`-byte records.
///
/// Searches {1x, 3x} page multiples for the one closest to
/// `rec_size * rec_count` total bytes, capped at 2^30.
fn bit_hint(rec_size: usize, rec_count: usize) -> u32 {
    const MULTIPLIERS: [u64; 2] = [1, 3];

    let target = ((rec_size as u64) * (rec_count as u64)).max(1);
    let mut min_deviation = u64::MAX;
    let mut result_bits = 0;

    for m in MULTIPLIERS {
        let bits = (63 - (target / m).max(1).leading_zeros()).min(30);
        let actual = (1u64 << bits) * m;

        if target / actual > MULTIPLIERS[MULTIPLIERS.len() - 1] {
            return bits;
        }

        let deviation = if actual <= target {
            100 + (target % actual) * 100 / (1u64 << bits)
        } else {
            actual * 100 / target
        };

        if deviation < min_deviation {
            min_deviation = deviation;
            result_bits = bits;
        }
    }

    result_bits
}

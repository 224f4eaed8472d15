//! As-of join map: slave key -> latest row id, consumed at most once.
//!
//! The caller drives `put` in timestamp order, so last-write-wins by call
//! order realizes "most recent qualifying slave row". Each slave row
//! satisfies at most one master match per scan: `get` marks the slot
//! consumed and a second probe of the same key returns nothing until the
//! key is written again.

use std::collections::HashMap;

use crate::error::{JournalError, Result};
use crate::ops::{Datum, Record, RowId};
use crate::schema::JournalMetadata;

#[derive(Debug)]
struct Slot {
    row_id: RowId,
    consumed: bool,
}

/// Keyed map from slave key columns to `(row id, consumed)`.
#[derive(Debug)]
pub struct LastRowIdMap {
    master_key_columns: Vec<usize>,
    slave_key_columns: Vec<usize>,
    map: HashMap<Vec<Datum>, Slot>,
}

impl LastRowIdMap {
    /// Key column lists must match pairwise in count and type across the
    /// two schemas; anything else is a configuration error.
    pub fn new(
        master_metadata: &JournalMetadata,
        slave_metadata: &JournalMetadata,
        master_key_columns: &[&str],
        slave_key_columns: &[&str],
    ) -> Result<Self> {
        if master_key_columns.len() != slave_key_columns.len() {
            return Err(JournalError::configuration(format!(
                "Key column count mismatch: {} master vs {} slave",
                master_key_columns.len(),
                slave_key_columns.len()
            )));
        }

        let mut master_indexes = Vec::with_capacity(master_key_columns.len());
        let mut slave_indexes = Vec::with_capacity(slave_key_columns.len());

        for (master_name, slave_name) in master_key_columns.iter().zip(slave_key_columns) {
            let master_index = master_metadata.column_index_required(master_name)?;
            let slave_index = slave_metadata.column_index_required(slave_name)?;

            let master_type = master_metadata.column(master_index).column_type;
            let slave_type = slave_metadata.column(slave_index).column_type;
            if master_type != slave_type {
                return Err(JournalError::configuration(format!(
                    "Key column type mismatch: {} ({}) vs {} ({})",
                    master_name, master_type, slave_name, slave_type
                )));
            }

            master_indexes.push(master_index);
            slave_indexes.push(slave_index);
        }

        Ok(LastRowIdMap {
            master_key_columns: master_indexes,
            slave_key_columns: slave_indexes,
            map: HashMap::new(),
        })
    }

    /// Upsert the slave row id for its key and clear `consumed`.
    pub fn put(&mut self, slave: &dyn Record) -> Result<()> {
        let key = project(slave, &self.slave_key_columns)?;
        self.map.insert(
            key,
            Slot {
                row_id: slave.row_id(),
                consumed: false,
            },
        );
        Ok(())
    }

    /// Row id of the latest unconsumed slave row matching the master's
    /// key, marking it consumed.
    pub fn get(&mut self, master: &dyn Record) -> Result<Option<RowId>> {
        let key = project(master, &self.master_key_columns)?;
        match self.map.get_mut(&key) {
            Some(slot) if !slot.consumed => {
                slot.consumed = true;
                Ok(Some(slot.row_id))
            }
            _ => Ok(None),
        }
    }

    /// Clear per-scan state.
    pub fn reset(&mut self) {
        self.map.clear();
    }
}

fn project(record: &dyn Record, columns: &[usize]) -> Result<Vec<Datum>> {
    let mut key = Vec::with_capacity(columns.len());
    for &column in columns {
        key.push(record.get(column)?);
    }
    Ok(key)
}

//! K-way merge of ordered row-id streams.
//!
//! Unions N child sources that each produce ascending row ids for the
//! same slice, without materializing a full sort: a size-N heap always
//! holds one pending id per live child and refills from whichever child
//! just advanced. O(log N) per emitted id. Duplicates across children
//! are preserved.

use crate::error::Result;
use crate::ops::heap::IntLongPriorityQueue;
use crate::ops::{PartitionSlice, RowCursor, RowId, RowSource, StorageFacade};
use crate::schema::JournalMetadata;

/// Merging union of child row sources.
pub struct HeapMergingRowSource {
    sources: Vec<Box<dyn RowSource>>,
}

impl HeapMergingRowSource {
    pub fn new(sources: Vec<Box<dyn RowSource>>) -> Self {
        HeapMergingRowSource { sources }
    }
}

impl RowSource for HeapMergingRowSource {
    fn configure(&mut self, metadata: &JournalMetadata) -> Result<()> {
        for source in &mut self.sources {
            source.configure(metadata)?;
        }
        Ok(())
    }

    fn prepare(&mut self, facade: &mut dyn StorageFacade) -> Result<()> {
        for source in &mut self.sources {
            source.prepare(facade)?;
        }
        Ok(())
    }

    fn prepare_cursor<'a>(
        &'a mut self,
        slice: &PartitionSlice<'a>,
    ) -> Result<Box<dyn RowCursor + 'a>> {
        let mut cursors = Vec::with_capacity(self.sources.len());
        for source in self.sources.iter_mut() {
            cursors.push(source.prepare_cursor(slice)?);
        }

        let mut heap = IntLongPriorityQueue::new(cursors.len());
        for (index, cursor) in cursors.iter_mut().enumerate() {
            if let Some(id) = cursor.next_id()? {
                heap.push(index, id);
            }
        }

        Ok(Box::new(MergeCursor { cursors, heap }))
    }

    fn reset(&mut self) {
        for source in &mut self.sources {
            source.reset();
        }
    }
}

struct MergeCursor<'a> {
    cursors: Vec<Box<dyn RowCursor + 'a>>,
    heap: IntLongPriorityQueue,
}

impl RowCursor for MergeCursor<'_> {
    fn next_id(&mut self) -> Result<Option<RowId>> {
        let Some(index) = self.heap.peek_source() else {
            return Ok(None);
        };
        // refill from the child that owns the current minimum
        match self.cursors[index].next_id()? {
            Some(id) => Ok(self.heap.replace_top(index, id)),
            None => Ok(self.heap.pop()),
        }
    }
}

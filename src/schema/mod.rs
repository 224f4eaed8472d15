//! Journal schema: column types, metadata and the structure builder.
//!
//! A journal is an append-only, partitioned columnar table. Schemas are
//! assembled with the fluent [`JournalStructure`] builder and frozen into
//! an immutable [`JournalMetadata`] that the parser, the planner and the
//! row sources all share.

pub mod column;
pub mod structure;

pub use column::{ColumnMetadata, ColumnType, PartitionBy};
pub use structure::{JournalMetadata, JournalStructure};

//! Tempora — embedded, columnar, append-only time-series database:
//! the query compiler and row-source execution core.
//!
//! What lives here:
//! - `schema` — column metadata and the journal structure builder
//! - `symbol` — symbol dictionary (string <-> dense i32 codes) with
//!   crash-safe truncate/resync
//! - `cache` — set-associative plan cache keyed by query text
//! - `parser` — lexer + recursive-descent parser producing arena-pooled
//!   query models and expression trees
//! - `ops` — physical row-source operators: k-way merge, as-of join map,
//!   hash/lambda semi-join head
//!
//! Partition storage, replication and ingestion are external; the
//! operators reach them through the traits in [`ops`]. Everything is
//! single-threaded and pull-based: one query compiles and runs on one
//! thread, and callers cancel by not pulling.

pub mod cache;
pub mod error;
pub mod hash;
pub mod ops;
pub mod parser;
pub mod schema;
pub mod symbol;

pub use cache::AssociativeCache;
pub use error::{JournalError, Result};
pub use parser::{QueryParser, Statement};
pub use schema::{ColumnType, JournalMetadata, JournalStructure, PartitionBy};
pub use symbol::SymbolTable;

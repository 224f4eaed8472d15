//! Column types and per-column metadata.

use serde::{Deserialize, Serialize};

/// Logical column type. Closed set; the storage layer maps each to a fixed
/// or variable-length physical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Date,
    String,
    Symbol,
    Binary,
}

impl ColumnType {
    /// Fixed storage size in bytes, or `None` for variable-length types.
    /// Symbol columns store a 4-byte dictionary code.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ColumnType::Bool | ColumnType::Byte => Some(1),
            ColumnType::Short => Some(2),
            ColumnType::Int | ColumnType::Float | ColumnType::Symbol => Some(4),
            ColumnType::Long | ColumnType::Double | ColumnType::Date => Some(8),
            ColumnType::String | ColumnType::Binary => None,
        }
    }

    /// Resolve a DDL type token. Case-insensitive; `boolean` and `bool`
    /// are both accepted.
    pub fn parse(token: &str) -> Option<Self> {
        let t = token.to_ascii_lowercase();
        match t.as_str() {
            "bool" | "boolean" => Some(ColumnType::Bool),
            "byte" => Some(ColumnType::Byte),
            "short" => Some(ColumnType::Short),
            "int" => Some(ColumnType::Int),
            "long" => Some(ColumnType::Long),
            "float" => Some(ColumnType::Float),
            "double" => Some(ColumnType::Double),
            "date" => Some(ColumnType::Date),
            "string" => Some(ColumnType::String),
            "symbol" => Some(ColumnType::Symbol),
            "binary" => Some(ColumnType::Binary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Byte => "BYTE",
            ColumnType::Short => "SHORT",
            ColumnType::Int => "INT",
            ColumnType::Long => "LONG",
            ColumnType::Float => "FLOAT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Date => "DATE",
            ColumnType::String => "STRING",
            ColumnType::Symbol => "SYMBOL",
            ColumnType::Binary => "BINARY",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Journal partitioning policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionBy {
    #[default]
    None,
    Day,
    Month,
    Year,
}

impl PartitionBy {
    /// Resolve a `partition by` token. Case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        let t = token.to_ascii_lowercase();
        match t.as_str() {
            "none" => Some(PartitionBy::None),
            "day" => Some(PartitionBy::Day),
            "month" => Some(PartitionBy::Month),
            "year" => Some(PartitionBy::Year),
            _ => None,
        }
    }
}

/// Per-column metadata.
///
/// Exactly one of `size` / `avg_size` is positive for a valid column:
/// fixed-size types carry `size`, variable-length types carry `avg_size`
/// until [`build`](crate::schema::JournalStructure::build) derives the
/// effective record size. `bit_hint` / `index_bit_hint` size the storage
/// pages and affect layout only, never logical semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub column_type: ColumnType,
    pub size: usize,
    pub avg_size: usize,
    pub indexed: bool,
    /// Expected distinct value count. After `build` this is a power of
    /// two >= 2 for indexed and symbol columns and doubles as the hash
    /// index bucket count.
    pub distinct_count_hint: usize,
    pub bit_hint: u32,
    pub index_bit_hint: u32,
}

impl ColumnMetadata {
    pub(crate) fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnMetadata {
            name: name.into(),
            column_type,
            size: column_type.fixed_size().unwrap_or(0),
            avg_size: 0,
            indexed: false,
            distinct_count_hint: 0,
            bit_hint: 0,
            index_bit_hint: 0,
        }
    }
}

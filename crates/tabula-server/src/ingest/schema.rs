//! Schema inference from a header row
//!
//! Every upload becomes a flat table: a synthetic `row_ordinal` key followed
//! by one text column per distinct header, in header order. No type
//! inference is attempted.

use std::collections::HashSet;
use thiserror::Error;

/// Name of the synthetic primary-key column
pub const ROW_ORDINAL_COLUMN: &str = "row_ordinal";

/// Postgres truncates identifiers beyond this many bytes
pub const MAX_IDENTIFIER_BYTES: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Header row is empty; no columns can be derived")]
    NoColumns,

    #[error("Column '{0}' is reserved")]
    ReservedColumn(String),

    #[error("Column name '{name}' is {len} bytes, limit is {MAX_IDENTIFIER_BYTES}")]
    NameTooLong { name: String, len: usize },

    #[error("Column name at position {0} contains a NUL byte")]
    InvalidName(usize),

    #[error("Column name '{0}' appears twice after naming blank headers")]
    DuplicateColumn(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name in the backing table
    pub name: String,
    pub column_type: ColumnType,
    /// Header the values come from; `None` for the synthetic key
    pub source: Option<String>,
}

/// Runtime-constructed column set for one backing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// All columns, primary key first
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn primary_key(&self) -> &ColumnDef {
        &self.columns[0]
    }

    /// Columns populated from the source file, in header order
    pub fn data_columns(&self) -> &[ColumnDef] {
        &self.columns[1..]
    }

    /// Whether a parsed field key maps to a data column
    pub fn has_source(&self, header: &str) -> bool {
        self.data_columns()
            .iter()
            .any(|c| c.source.as_deref() == Some(header))
    }
}

/// Derive the table schema from the captured header list
///
/// Duplicate headers collapse into a single column at the first position.
/// Blank headers are named `column_<position>` (1-based).
pub fn infer_schema(headers: &[String]) -> Result<TableSchema, SchemaError> {
    if headers.is_empty() {
        return Err(SchemaError::NoColumns);
    }

    let mut columns = Vec::with_capacity(headers.len() + 1);
    columns.push(ColumnDef {
        name: ROW_ORDINAL_COLUMN.to_string(),
        column_type: ColumnType::BigInt,
        source: None,
    });

    let mut seen_sources = HashSet::new();
    let mut seen_names = HashSet::new();
    seen_names.insert(ROW_ORDINAL_COLUMN.to_string());

    for (idx, header) in headers.iter().enumerate() {
        if !seen_sources.insert(header.as_str()) {
            continue;
        }

        let position = idx + 1;
        if header.contains('\0') {
            return Err(SchemaError::InvalidName(position));
        }

        let name = if header.trim().is_empty() {
            format!("column_{position}")
        } else {
            header.clone()
        };

        if name == ROW_ORDINAL_COLUMN {
            return Err(SchemaError::ReservedColumn(name));
        }
        if name.len() > MAX_IDENTIFIER_BYTES {
            let len = name.len();
            return Err(SchemaError::NameTooLong { name, len });
        }
        if !seen_names.insert(name.clone()) {
            return Err(SchemaError::DuplicateColumn(name));
        }

        columns.push(ColumnDef {
            name,
            column_type: ColumnType::Text,
            source: Some(header.clone()),
        });
    }

    Ok(TableSchema { columns })
}

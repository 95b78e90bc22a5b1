//! Conversion of untyped SQLite rows into [`Record`]s.

use super::record::{FieldValue, Record};
use crate::{RegistryError, Result};
use chrono::DateTime;
use rusqlite::types::ValueRef;
use rusqlite::{Row, Rows, Statement};

/// How a declared column type steers conversion of stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Boolean,
    Timestamp,
    Other,
}

impl DeclaredType {
    pub fn from_decl(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return DeclaredType::Other;
        };
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            DeclaredType::Boolean
        } else if decl.contains("DATE") || decl.contains("TIME") {
            DeclaredType::Timestamp
        } else {
            DeclaredType::Other
        }
    }
}

/// Name and declared type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnShape {
    pub name: String,
    pub declared: DeclaredType,
}

impl ColumnShape {
    /// Read the result shape of a prepared statement.
    pub fn of(stmt: &Statement<'_>) -> Vec<ColumnShape> {
        stmt.columns()
            .iter()
            .map(|column| ColumnShape {
                name: column.name().to_string(),
                declared: DeclaredType::from_decl(column.decl_type()),
            })
            .collect()
    }
}

/// Convert one stored value.
pub fn to_field_value(value: ValueRef<'_>, declared: DeclaredType) -> Result<FieldValue> {
    Ok(match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => match declared {
            DeclaredType::Boolean => FieldValue::Bool(i != 0),
            DeclaredType::Timestamp => match DateTime::from_timestamp(i, 0) {
                Some(ts) => FieldValue::Text(ts.to_rfc3339()),
                None => FieldValue::Integer(i),
            },
            DeclaredType::Other => FieldValue::Integer(i),
        },
        ValueRef::Real(f) => FieldValue::Real(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| RegistryError::RowRead {
                message: format!("column is not valid UTF-8: {}", e),
            })?;
            FieldValue::Text(text.to_string())
        }
        ValueRef::Blob(bytes) => FieldValue::Text(hex::encode(bytes)),
    })
}

fn read_row(row: &Row<'_>, columns: &[ColumnShape]) -> Result<Record> {
    let mut record = Record::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = row.get_ref(idx).map_err(|e| RegistryError::RowRead {
            message: format!("column '{}': {}", column.name, e),
        })?;
        record.insert(column.name.clone(), to_field_value(value, column.declared)?);
    }
    Ok(record)
}

/// Drain a cursor into records.
///
/// All-or-nothing: the first bad row aborts and nothing is returned. The
/// cursor is consumed, so it is released on every exit path.
pub fn materialize(mut rows: Rows<'_>, columns: &[ColumnShape]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(read_row(row, columns)?);
    }
    Ok(records)
}

// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use entrova_etl_model::{Entity, Table, Value};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::EtlError;

/// Extraction contract. Returned tables match the entity's declared schema;
/// missing values arrive as `Value::Null`, never silently dropped.
pub trait Source {
    fn fetch(&self, entity: Entity) -> Result<Table, EtlError>;
}

/// Reads the operational SQLite database. Each extract is one prepared
/// `SELECT` over the entity's declared columns, ordered by the entity key so
/// downstream row order never depends on storage order.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    db_path: PathBuf,
}

impl SqliteSource {
    pub fn open(db_path: &Path) -> Result<Self, EtlError> {
        if !db_path.exists() {
            return Err(EtlError::Source(format!(
                "operational database not found: {}",
                db_path.display()
            )));
        }
        Ok(Self {
            db_path: db_path.to_path_buf(),
        })
    }
}

impl Source for SqliteSource {
    fn fetch(&self, entity: Entity) -> Result<Table, EtlError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| EtlError::Source(format!("open {}: {e}", self.db_path.display())))?;
        let schema = entity.schema();
        let names = schema.column_names();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            names.join(", "),
            entity.table_name(),
            entity.key_column()
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| EtlError::Source(format!("query {}: {e}", entity.table_name())))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| EtlError::Source(format!("query {}: {e}", entity.table_name())))?;

        let mut extracted: Vec<Vec<Value>> = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| EtlError::Source(format!("read {}: {e}", entity.table_name())))?
        {
            let mut cells = Vec::with_capacity(names.len());
            for (index, name) in names.iter().enumerate() {
                let cell = row.get_ref(index).map_err(|e| {
                    EtlError::Source(format!("read {}.{name}: {e}", entity.table_name()))
                })?;
                cells.push(decode_cell(cell, entity, name)?);
            }
            extracted.push(cells);
        }

        Table::from_rows(&names, extracted)
            .map_err(|e| EtlError::Source(format!("extract {}: {e}", entity.table_name())))
    }
}

/// Storage-class decoding only: TEXT stays a string for the clean stage's
/// declared coercions to handle.
fn decode_cell(cell: ValueRef<'_>, entity: Entity, column: &str) -> Result<Value, EtlError> {
    match cell {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(v) => Ok(Value::Int(v)),
        ValueRef::Real(v) => Ok(Value::Float(v)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Str(s.to_string()))
            .map_err(|_| {
                EtlError::Source(format!(
                    "schema mismatch in {}.{column}: non-utf8 text",
                    entity.table_name()
                ))
            }),
        ValueRef::Blob(_) => Err(EtlError::Source(format!(
            "schema mismatch in {}.{column}: blob storage is not supported",
            entity.table_name()
        ))),
    }
}

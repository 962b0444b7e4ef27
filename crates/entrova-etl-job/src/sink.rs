// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::Path;

use entrova_etl_model::{Table, Value};
use rusqlite::Connection;

use crate::EtlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Destination contents are fully replaced. The only mode this pipeline
    /// uses: outputs stay reproducible and idempotent.
    Overwrite,
    Append,
}

/// Persistence contract. `write` stages one destination; `commit` makes the
/// run's writes durable. Nothing is published until commit.
pub trait Sink {
    fn write(&mut self, table: &Table, destination: &str, mode: WriteMode)
        -> Result<(), EtlError>;

    fn commit(&mut self) -> Result<(), EtlError> {
        Ok(())
    }
}

/// CSV payload for a table: header row plus one record per row, nulls as
/// empty cells.
pub fn csv_bytes(table: &Table) -> Result<Vec<u8>, EtlError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .map_err(|e| EtlError::Sink(format!("csv header: {e}")))?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table.row(row).iter().map(Value::render).collect();
        writer
            .write_record(&record)
            .map_err(|e| EtlError::Sink(format!("csv row {row}: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::Sink(format!("csv flush: {e}")))
}

/// Production sink: `.csv` destinations are flat files, everything else is a
/// table in the analytics database. All analytics tables of one run share a
/// single transaction, committed only after the last destination is staged —
/// a failed load publishes nothing.
pub struct AnalyticsSink {
    conn: Connection,
}

impl AnalyticsSink {
    pub fn open(analytics_db: &Path) -> Result<Self, EtlError> {
        let conn = Connection::open(analytics_db)
            .map_err(|e| EtlError::Sink(format!("open {}: {e}", analytics_db.display())))?;
        conn.execute_batch("BEGIN")
            .map_err(|e| EtlError::Sink(format!("begin transaction: {e}")))?;
        Ok(Self { conn })
    }

    fn write_table(&mut self, table: &Table, destination: &str) -> Result<(), EtlError> {
        if destination.is_empty()
            || !destination
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(EtlError::Sink(format!(
                "invalid destination table name: {destination}"
            )));
        }

        let columns: Vec<String> = table
            .columns()
            .iter()
            .map(|column| format!("{} {}", column.name, storage_class(&column.values)))
            .collect();
        self.conn
            .execute_batch(&format!(
                "DROP TABLE IF EXISTS {destination};
                 CREATE TABLE {destination} ({});",
                columns.join(", ")
            ))
            .map_err(|e| EtlError::Sink(format!("recreate {destination}: {e}")))?;

        let placeholders: Vec<String> = (1..=table.column_count())
            .map(|i| format!("?{i}"))
            .collect();
        let mut stmt = self
            .conn
            .prepare(&format!(
                "INSERT INTO {destination} ({}) VALUES ({})",
                table.column_names().join(", "),
                placeholders.join(", ")
            ))
            .map_err(|e| EtlError::Sink(format!("insert into {destination}: {e}")))?;
        for row in 0..table.row_count() {
            let params: Vec<rusqlite::types::Value> =
                table.row(row).iter().map(sql_value).collect();
            stmt.execute(rusqlite::params_from_iter(params))
                .map_err(|e| EtlError::Sink(format!("insert into {destination}: {e}")))?;
        }
        Ok(())
    }
}

impl Sink for AnalyticsSink {
    fn write(
        &mut self,
        table: &Table,
        destination: &str,
        mode: WriteMode,
    ) -> Result<(), EtlError> {
        if destination.ends_with(".csv") {
            let payload = csv_bytes(table)?;
            match mode {
                WriteMode::Overwrite => fs::write(destination, payload)
                    .map_err(|e| EtlError::Sink(format!("write {destination}: {e}"))),
                WriteMode::Append => Err(EtlError::Sink(format!(
                    "append mode is not supported for {destination}"
                ))),
            }
        } else {
            match mode {
                WriteMode::Overwrite => self.write_table(table, destination),
                WriteMode::Append => Err(EtlError::Sink(format!(
                    "append mode is not supported for {destination}"
                ))),
            }
        }
    }

    fn commit(&mut self) -> Result<(), EtlError> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| EtlError::Sink(format!("commit: {e}")))
    }
}

fn storage_class(values: &[Value]) -> &'static str {
    if values.iter().any(|v| matches!(v, Value::Float(_))) {
        "REAL"
    } else if values
        .iter()
        .all(|v| matches!(v, Value::Int(_) | Value::Bool(_) | Value::Null))
    {
        "INTEGER"
    } else {
        "TEXT"
    }
}

fn sql_value(cell: &Value) -> rusqlite::types::Value {
    match cell {
        Value::Null => rusqlite::types::Value::Null,
        Value::Int(v) => rusqlite::types::Value::Integer(*v),
        Value::Float(v) => rusqlite::types::Value::Real(*v),
        Value::Bool(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::Str(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Date(v) => rusqlite::types::Value::Text(v.format("%Y-%m-%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{csv_bytes, AnalyticsSink, Sink, WriteMode};
    use entrova_etl_model::{Table, Value};
    use rusqlite::Connection;
    use tempfile::tempdir;

    fn summary_fixture() -> Table {
        Table::from_rows(
            &["signup_date", "signups"],
            vec![
                vec![Value::Str("2025-01-02".to_string()), Value::Int(2)],
                vec![Value::Null, Value::Int(1)],
            ],
        )
        .expect("fixture")
    }

    #[test]
    fn csv_payload_has_header_and_empty_null_cells() {
        let payload = csv_bytes(&summary_fixture()).expect("csv");
        let text = String::from_utf8(payload).expect("utf8");
        assert_eq!(text, "signup_date,signups\n2025-01-02,2\n,1\n");
    }

    #[test]
    fn committed_table_write_replaces_prior_contents() {
        let dir = tempdir().expect("tmp");
        let db = dir.path().join("analytics.db");

        for _ in 0..2 {
            let mut sink = AnalyticsSink::open(&db).expect("sink");
            sink.write(&summary_fixture(), "cumulative_signups", WriteMode::Overwrite)
                .expect("write");
            sink.commit().expect("commit");
        }

        let conn = Connection::open(&db).expect("open");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM cumulative_signups", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 2, "overwrite must not accumulate rows across runs");
    }

    #[test]
    fn uncommitted_write_publishes_nothing() {
        let dir = tempdir().expect("tmp");
        let db = dir.path().join("analytics.db");
        {
            let mut sink = AnalyticsSink::open(&db).expect("sink");
            sink.write(&summary_fixture(), "cumulative_signups", WriteMode::Overwrite)
                .expect("write");
            // dropped without commit
        }

        let conn = Connection::open(&db).expect("open");
        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='cumulative_signups'",
                [],
                |r| r.get(0),
            )
            .expect("sqlite_master");
        assert_eq!(table_count, 0, "rolled-back table must not exist");
    }

    #[test]
    fn hostile_destination_names_are_rejected() {
        let dir = tempdir().expect("tmp");
        let mut sink = AnalyticsSink::open(&dir.path().join("analytics.db")).expect("sink");
        let err = sink
            .write(&summary_fixture(), "signups; DROP TABLE x", WriteMode::Overwrite)
            .expect_err("bad name must fail");
        assert!(err.to_string().contains("invalid destination"), "err: {err}");
    }
}

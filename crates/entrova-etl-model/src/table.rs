// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{SchemaError, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Ordered set of named, equal-length columns. A zero-row table is valid and
/// flows through every stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, SchemaError> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        for (i, column) in columns.iter().enumerate() {
            if column.name.trim().is_empty() {
                return Err(SchemaError("column name must not be empty".to_string()));
            }
            if columns[..i].iter().any(|prior| prior.name == column.name) {
                return Err(SchemaError(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
            if column.values.len() != row_count {
                return Err(SchemaError(format!(
                    "column {} has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    row_count
                )));
            }
        }
        Ok(Self { columns })
    }

    /// A table with the given columns and no rows.
    pub fn empty(names: &[&str]) -> Result<Self, SchemaError> {
        Self::new(
            names
                .iter()
                .map(|name| Column::new(*name, Vec::new()))
                .collect(),
        )
    }

    pub fn from_rows(names: &[&str], rows: Vec<Vec<Value>>) -> Result<Self, SchemaError> {
        let mut columns: Vec<Column> = names
            .iter()
            .map(|name| Column::new(*name, Vec::with_capacity(rows.len())))
            .collect();
        for (row_index, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(SchemaError(format!(
                    "row {} has {} cells, expected {}",
                    row_index,
                    row.len(),
                    names.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.values.push(cell);
            }
        }
        Self::new(columns)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns
            .iter()
            .map(|c| c.values[index].clone())
            .collect()
    }

    /// Derived-column append: leaves `self` untouched and returns a new table
    /// with the extra column at the end.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self, SchemaError> {
        if values.len() != self.row_count() {
            return Err(SchemaError(format!(
                "derived column {} has {} rows, expected {}",
                name,
                values.len(),
                self.row_count()
            )));
        }
        let mut columns = self.columns.clone();
        columns.push(Column::new(name, values));
        Self::new(columns)
    }

    /// Same table with one column's cells replaced.
    pub fn with_replaced_column(&self, name: &str, values: Vec<Value>) -> Result<Self, SchemaError> {
        if values.len() != self.row_count() {
            return Err(SchemaError(format!(
                "replacement column {} has {} rows, expected {}",
                name,
                values.len(),
                self.row_count()
            )));
        }
        let mut columns = self.columns.clone();
        let slot = columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| SchemaError(format!("unknown column: {name}")))?;
        slot.values = values;
        Self::new(columns)
    }
}

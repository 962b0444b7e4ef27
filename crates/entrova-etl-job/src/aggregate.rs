// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use entrova_etl_model::{Column, Table, Value};

use crate::EtlError;

/// Orderable view of an aggregation-key cell. Null keys group under their own
/// key, ordered before every concrete key, rather than being dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Null,
    Date(NaiveDate),
    Int(i64),
    Str(String),
}

impl GroupKey {
    fn from_cell(cell: &Value, column: &str) -> Result<Self, EtlError> {
        match cell {
            Value::Null => Ok(Self::Null),
            Value::Date(d) => Ok(Self::Date(*d)),
            Value::Int(v) => Ok(Self::Int(*v)),
            Value::Str(v) => Ok(Self::Str(v.clone())),
            other => Err(EtlError::Validation(format!(
                "aggregation key column {column} holds {}, which cannot be grouped",
                other.type_name()
            ))),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Date(d) => Value::Date(d),
            Self::Int(v) => Value::Int(v),
            Self::Str(v) => Value::Str(v),
        }
    }
}

/// One reduction over a group. Every reduction carries an explicit output
/// name: downstream sinks expect those exact names, so renaming is part of
/// the contract, not a cosmetic choice.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduce {
    CountDistinct { column: String, output: String },
    Sum { column: String, output: String },
}

impl Reduce {
    fn output(&self) -> &str {
        match self {
            Self::CountDistinct { output, .. } | Self::Sum { output, .. } => output,
        }
    }

    fn input(&self) -> &str {
        match self {
            Self::CountDistinct { column, .. } | Self::Sum { column, .. } => column,
        }
    }
}

/// One summary row per distinct key value, sorted ascending by key. Groups of
/// any size are kept, including singletons.
pub fn group_by(table: &Table, key: &str, reductions: &[Reduce]) -> Result<Table, EtlError> {
    let key_column = table.column(key).ok_or_else(|| {
        EtlError::Validation(format!("aggregation names unknown key column {key}"))
    })?;
    for reduce in reductions {
        if !table.has_column(reduce.input()) {
            return Err(EtlError::Validation(format!(
                "aggregation names unknown column {}",
                reduce.input()
            )));
        }
    }

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for (row, cell) in key_column.values.iter().enumerate() {
        groups
            .entry(GroupKey::from_cell(cell, key)?)
            .or_default()
            .push(row);
    }

    let mut key_values = Vec::with_capacity(groups.len());
    let mut reduced: Vec<Vec<Value>> = vec![Vec::with_capacity(groups.len()); reductions.len()];
    for (group_key, rows) in groups {
        key_values.push(group_key.into_value());
        for (slot, reduce) in reduced.iter_mut().zip(reductions) {
            slot.push(apply_reduce(table, reduce, &rows)?);
        }
    }

    let mut columns = vec![Column::new(key, key_values)];
    for (slot, reduce) in reduced.into_iter().zip(reductions) {
        columns.push(Column::new(reduce.output(), slot));
    }
    Ok(Table::new(columns)?)
}

fn apply_reduce(table: &Table, reduce: &Reduce, rows: &[usize]) -> Result<Value, EtlError> {
    let column = table.column(reduce.input()).ok_or_else(|| {
        EtlError::Validation(format!(
            "aggregation names unknown column {}",
            reduce.input()
        ))
    })?;
    match reduce {
        Reduce::CountDistinct { .. } => {
            let mut seen: BTreeSet<String> = BTreeSet::new();
            for &row in rows {
                let cell = &column.values[row];
                if !cell.is_null() {
                    seen.insert(cell.render());
                }
            }
            Ok(Value::Int(seen.len() as i64))
        }
        Reduce::Sum { column: name, .. } => {
            let mut int_total: i64 = 0;
            let mut float_total = 0.0;
            let mut saw_float = false;
            for &row in rows {
                match &column.values[row] {
                    Value::Null => {}
                    Value::Int(v) => int_total += v,
                    Value::Float(v) => {
                        saw_float = true;
                        float_total += v;
                    }
                    other => {
                        return Err(EtlError::Validation(format!(
                            "column {name} holds {}, which cannot be summed",
                            other.type_name()
                        )))
                    }
                }
            }
            if saw_float {
                Ok(Value::Float(float_total + int_total as f64))
            } else {
                Ok(Value::Int(int_total))
            }
        }
    }
}

/// Running total over `source`, appended as `target`. The table must already
/// be sorted ascending on the aggregation key; that precondition is verified
/// here, never assumed from whatever order grouping happened to emit.
pub fn cumulative_sum(
    table: &Table,
    key: &str,
    source: &str,
    target: &str,
) -> Result<Table, EtlError> {
    let key_column = table.column(key).ok_or_else(|| {
        EtlError::Validation(format!("cumulative sum names unknown key column {key}"))
    })?;
    let mut previous: Option<GroupKey> = None;
    for cell in &key_column.values {
        let current = GroupKey::from_cell(cell, key)?;
        if let Some(prior) = &previous {
            if prior > &current {
                return Err(EtlError::Validation(format!(
                    "cumulative sum requires ascending sort on {key}"
                )));
            }
        }
        previous = Some(current);
    }

    let source_column = table.column(source).ok_or_else(|| {
        EtlError::Validation(format!("cumulative sum names unknown column {source}"))
    })?;
    let mut running: i64 = 0;
    let mut values = Vec::with_capacity(table.row_count());
    for cell in &source_column.values {
        match cell {
            Value::Null => {}
            Value::Int(v) => running += v,
            other => {
                return Err(EtlError::Validation(format!(
                    "column {source} holds {}, which cannot be accumulated",
                    other.type_name()
                )))
            }
        }
        values.push(Value::Int(running));
    }
    Ok(table.with_column(target, values)?)
}

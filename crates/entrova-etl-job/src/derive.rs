// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use entrova_etl_model::{Table, Value};

use crate::EtlError;

/// Whole days between the run's single reference date and each row's date.
/// A null date propagates null; it never raises.
pub fn days_since(
    table: &Table,
    date_column: &str,
    reference: NaiveDate,
    target: &str,
) -> Result<Table, EtlError> {
    let source = table.column(date_column).ok_or_else(|| {
        EtlError::Validation(format!("derive names unknown column {date_column}"))
    })?;
    let values = source
        .values
        .iter()
        .map(|cell| match cell {
            Value::Null => Ok(Value::Null),
            Value::Date(d) => Ok(Value::Int((reference - *d).num_days())),
            other => Err(EtlError::Validation(format!(
                "column {date_column} holds {}, expected a date",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<Value>, EtlError>>()?;
    Ok(table.with_column(target, values)?)
}

/// Fixed linear combination of numeric columns. Missing numeric inputs count
/// as zero, consistent with the clean stage's fill policy upstream.
pub fn weighted_score(
    table: &Table,
    terms: &[(&str, f64)],
    target: &str,
) -> Result<Table, EtlError> {
    let mut sources = Vec::with_capacity(terms.len());
    for (name, weight) in terms {
        let column = table.column(name).ok_or_else(|| {
            EtlError::Validation(format!("derive names unknown column {name}"))
        })?;
        sources.push((column, *weight));
    }

    let mut values = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let mut total = 0.0;
        for (column, weight) in &sources {
            let cell = &column.values[row];
            let term = match cell {
                Value::Null => 0.0,
                other => other.as_f64().ok_or_else(|| {
                    EtlError::Validation(format!(
                        "column {} holds {}, expected a number",
                        column.name,
                        cell.type_name()
                    ))
                })?,
            };
            total += term * weight;
        }
        values.push(Value::Float(total));
    }
    Ok(table.with_column(target, values)?)
}

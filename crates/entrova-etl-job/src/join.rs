// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use entrova_etl_model::{Column, Table, Value};

use crate::EtlError;

/// Hashable view of an entity identifier cell. `Null` keys have no view and
/// therefore never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Int(i64),
    Str(String),
}

fn join_key(cell: &Value, column: &str) -> Result<Option<JoinKey>, EtlError> {
    match cell {
        Value::Null => Ok(None),
        Value::Int(v) => Ok(Some(JoinKey::Int(*v))),
        Value::Str(v) => Ok(Some(JoinKey::Str(v.clone()))),
        other => Err(EtlError::Validation(format!(
            "join key column {column} holds {}, expected an identifier",
            other.type_name()
        ))),
    }
}

/// Left outer join on a shared entity identifier. Every left row is preserved
/// exactly once; right columns attach where the identifier matches and hold
/// `Null` where it does not. A duplicate right-side key is a hard error: this
/// pipeline's join keys are unique per joined table, and fanning out rows
/// would silently break every downstream row count.
pub fn left_join(left: &Table, right: &Table, key: &str) -> Result<Table, EtlError> {
    let left_key = left.column(key).ok_or_else(|| {
        EtlError::Validation(format!("left table has no join key column {key}"))
    })?;
    let right_key = right.column(key).ok_or_else(|| {
        EtlError::Validation(format!("right table has no join key column {key}"))
    })?;

    for column in right.columns() {
        if column.name != key && left.has_column(&column.name) {
            return Err(EtlError::Validation(format!(
                "join would duplicate column {}",
                column.name
            )));
        }
    }

    let mut index: HashMap<JoinKey, usize> = HashMap::with_capacity(right.row_count());
    for (row, cell) in right_key.values.iter().enumerate() {
        let Some(k) = join_key(cell, key)? else {
            continue;
        };
        if index.insert(k, row).is_some() {
            return Err(EtlError::Validation(format!(
                "duplicate join key {} in column {key}",
                cell.render()
            )));
        }
    }

    let attached: Vec<&Column> = right
        .columns()
        .iter()
        .filter(|column| column.name != key)
        .collect();

    let mut columns: Vec<Column> = left.columns().to_vec();
    for column in &attached {
        let mut values = Vec::with_capacity(left.row_count());
        for cell in &left_key.values {
            let matched = join_key(cell, key)?.and_then(|k| index.get(&k).copied());
            values.push(match matched {
                Some(row) => column.values[row].clone(),
                None => Value::Null,
            });
        }
        columns.push(Column::new(column.name.clone(), values));
    }

    Ok(Table::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::left_join;
    use entrova_etl_model::{Table, Value};

    fn left_fixture() -> Table {
        Table::from_rows(
            &["user_id", "signup_date"],
            vec![
                vec![Value::Int(1), Value::Str("2025-01-02".to_string())],
                vec![Value::Int(2), Value::Str("2025-01-03".to_string())],
                vec![Value::Null, Value::Str("2025-01-04".to_string())],
            ],
        )
        .expect("left fixture")
    }

    #[test]
    fn left_rows_are_preserved_and_misses_fill_null() {
        let right = Table::from_rows(
            &["user_id", "messages_sent"],
            vec![vec![Value::Int(1), Value::Int(7)]],
        )
        .expect("right fixture");

        let joined = left_join(&left_fixture(), &right, "user_id").expect("join");
        assert_eq!(joined.row_count(), 3);
        let messages = &joined.column("messages_sent").expect("attached").values;
        assert_eq!(messages, &vec![Value::Int(7), Value::Null, Value::Null]);
    }

    #[test]
    fn null_keys_never_match() {
        let right = Table::from_rows(
            &["user_id", "messages_sent"],
            vec![
                vec![Value::Int(9), Value::Int(1)],
                vec![Value::Null, Value::Int(2)],
            ],
        )
        .expect("right fixture");

        let joined = left_join(&left_fixture(), &right, "user_id").expect("join");
        // The left null-key row attaches nothing, and the right null-key row
        // is unreachable.
        let messages = &joined.column("messages_sent").expect("attached").values;
        assert_eq!(messages, &vec![Value::Null, Value::Null, Value::Null]);
    }

    #[test]
    fn duplicate_right_key_is_a_hard_error() {
        let right = Table::from_rows(
            &["user_id", "messages_sent"],
            vec![
                vec![Value::Int(1), Value::Int(1)],
                vec![Value::Int(1), Value::Int(2)],
            ],
        )
        .expect("right fixture");

        let err = left_join(&left_fixture(), &right, "user_id").expect_err("must not fan out");
        assert!(
            err.to_string().contains("duplicate join key"),
            "err: {err}"
        );
    }

    #[test]
    fn join_chain_keeps_base_row_count_at_every_step() {
        let sessions = Table::from_rows(
            &["user_id", "attended_demo"],
            vec![vec![Value::Int(2), Value::Int(1)]],
        )
        .expect("sessions");
        let engagement = Table::from_rows(
            &["user_id", "messages_sent"],
            vec![
                vec![Value::Int(1), Value::Int(4)],
                vec![Value::Int(2), Value::Int(6)],
            ],
        )
        .expect("engagement");

        let base = left_fixture();
        let step1 = left_join(&base, &engagement, "user_id").expect("step1");
        assert_eq!(step1.row_count(), base.row_count());
        let step2 = left_join(&step1, &sessions, "user_id").expect("step2");
        assert_eq!(step2.row_count(), base.row_count());
    }

    #[test]
    fn zero_row_left_table_joins_cleanly() {
        let empty = Table::empty(&["user_id"]).expect("empty");
        let right = Table::from_rows(
            &["user_id", "messages_sent"],
            vec![vec![Value::Int(1), Value::Int(2)]],
        )
        .expect("right");
        let joined = left_join(&empty, &right, "user_id").expect("join");
        assert_eq!(joined.row_count(), 0);
        assert!(joined.has_column("messages_sent"));
    }
}

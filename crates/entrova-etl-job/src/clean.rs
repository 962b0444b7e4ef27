// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use entrova_etl_model::{Entity, Table, Value};

use crate::EtlError;

/// One declared cleaning operation on a named column. Rules are applied in
/// declaration order, so fills run before the flag derivations that read them.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanRule {
    /// Replace `Null` with a declared default.
    FillMissing { column: String, default: Value },
    /// Parse raw string cells into dates; uncoercible values fail the run.
    CoerceDate { column: String },
    /// Parse raw string cells into integers; uncoercible values fail the run.
    CoerceInt { column: String },
    /// Map a count-like column to {0,1}: greater than zero means 1, else 0.
    /// When `target` equals `source` the column is normalized in place,
    /// otherwise the flag is appended as a new column.
    FlagFromCount { source: String, target: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanSpec {
    pub table: String,
    pub rules: Vec<CleanRule>,
}

/// The declared cleaning policies for the four operational extracts.
#[must_use]
pub fn clean_spec_for(entity: Entity) -> CleanSpec {
    let rules = match entity {
        Entity::Users => vec![
            CleanRule::CoerceDate {
                column: "signup_date".to_string(),
            },
            CleanRule::FillMissing {
                column: "country".to_string(),
                default: Value::Str("Unknown".to_string()),
            },
        ],
        Entity::Employers => vec![CleanRule::FillMissing {
            column: "industry".to_string(),
            default: Value::Str("Unknown".to_string()),
        }],
        Entity::DemoSessions => vec![
            CleanRule::CoerceDate {
                column: "session_date".to_string(),
            },
            CleanRule::FillMissing {
                column: "attended_demo".to_string(),
                default: Value::Int(0),
            },
            CleanRule::FlagFromCount {
                source: "attended_demo".to_string(),
                target: "attended_demo".to_string(),
            },
        ],
        Entity::Engagement => vec![
            CleanRule::FillMissing {
                column: "logins_last_30_days".to_string(),
                default: Value::Int(0),
            },
            CleanRule::FillMissing {
                column: "messages_sent".to_string(),
                default: Value::Int(0),
            },
            CleanRule::FillMissing {
                column: "profile_complete".to_string(),
                default: Value::Int(0),
            },
            CleanRule::FlagFromCount {
                source: "logins_last_30_days".to_string(),
                target: "active_user".to_string(),
            },
            CleanRule::FlagFromCount {
                source: "profile_complete".to_string(),
                target: "profile_complete".to_string(),
            },
        ],
    };
    CleanSpec {
        table: entity.table_name().to_string(),
        rules,
    }
}

pub fn clean_table(table: &Table, spec: &CleanSpec) -> Result<Table, EtlError> {
    let mut cleaned = table.clone();
    for rule in &spec.rules {
        cleaned = apply_rule(&cleaned, rule, &spec.table)?;
    }
    Ok(cleaned)
}

fn apply_rule(table: &Table, rule: &CleanRule, table_name: &str) -> Result<Table, EtlError> {
    match rule {
        CleanRule::FillMissing { column, default } => {
            let values = column_values(table, column, table_name)?
                .iter()
                .map(|cell| {
                    if cell.is_null() {
                        default.clone()
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            Ok(table.with_replaced_column(column, values)?)
        }
        CleanRule::CoerceDate { column } => {
            let values = column_values(table, column, table_name)?
                .iter()
                .map(|cell| coerce_date(cell, table_name, column))
                .collect::<Result<Vec<Value>, EtlError>>()?;
            Ok(table.with_replaced_column(column, values)?)
        }
        CleanRule::CoerceInt { column } => {
            let values = column_values(table, column, table_name)?
                .iter()
                .map(|cell| coerce_int(cell, table_name, column))
                .collect::<Result<Vec<Value>, EtlError>>()?;
            Ok(table.with_replaced_column(column, values)?)
        }
        CleanRule::FlagFromCount { source, target } => {
            let values = column_values(table, source, table_name)?
                .iter()
                .map(|cell| match cell {
                    Value::Null => Ok(Value::Int(0)),
                    Value::Int(v) => Ok(Value::Int(i64::from(*v > 0))),
                    Value::Float(v) => Ok(Value::Int(i64::from(*v > 0.0))),
                    Value::Bool(v) => Ok(Value::Int(i64::from(*v))),
                    other => Err(EtlError::Validation(format!(
                        "table {table_name} column {source}: cannot derive flag from {}",
                        other.type_name()
                    ))),
                })
                .collect::<Result<Vec<Value>, EtlError>>()?;
            if target == source {
                Ok(table.with_replaced_column(target, values)?)
            } else {
                Ok(table.with_column(target, values)?)
            }
        }
    }
}

fn column_values<'t>(
    table: &'t Table,
    column: &str,
    table_name: &str,
) -> Result<&'t [Value], EtlError> {
    table
        .column(column)
        .map(|c| c.values.as_slice())
        .ok_or_else(|| {
            EtlError::Validation(format!(
                "table {table_name}: clean rule names unknown column {column}"
            ))
        })
}

fn coerce_date(cell: &Value, table_name: &str, column: &str) -> Result<Value, EtlError> {
    match cell {
        Value::Null => Ok(Value::Null),
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::Str(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| {
                EtlError::Validation(format!(
                    "table {table_name} column {column}: cannot coerce '{raw}' to date"
                ))
            }),
        other => Err(EtlError::Validation(format!(
            "table {table_name} column {column}: cannot coerce {} to date",
            other.type_name()
        ))),
    }
}

fn coerce_int(cell: &Value, table_name: &str, column: &str) -> Result<Value, EtlError> {
    match cell {
        Value::Null => Ok(Value::Null),
        Value::Int(v) => Ok(Value::Int(*v)),
        Value::Str(raw) => raw.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EtlError::Validation(format!(
                "table {table_name} column {column}: cannot coerce '{raw}' to integer"
            ))
        }),
        other => Err(EtlError::Validation(format!(
            "table {table_name} column {column}: cannot coerce {} to integer",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_spec_for, clean_table, CleanRule, CleanSpec};
    use entrova_etl_model::{Entity, Table, Value};

    fn users_fixture() -> Table {
        Table::from_rows(
            &["user_id", "employer_id", "signup_date", "country"],
            vec![
                vec![
                    Value::Int(1),
                    Value::Int(10),
                    Value::Str("2025-01-02".to_string()),
                    Value::Str("DE".to_string()),
                ],
                vec![
                    Value::Int(2),
                    Value::Int(10),
                    Value::Str("2025-01-02".to_string()),
                    Value::Null,
                ],
                vec![
                    Value::Int(3),
                    Value::Null,
                    Value::Str("2025-01-05".to_string()),
                    Value::Str("FR".to_string()),
                ],
            ],
        )
        .expect("users fixture")
    }

    #[test]
    fn null_country_becomes_unknown_and_row_count_is_preserved() {
        let cleaned =
            clean_table(&users_fixture(), &clean_spec_for(Entity::Users)).expect("clean users");
        assert_eq!(cleaned.row_count(), 3);
        let countries = &cleaned.column("country").expect("country column").values;
        assert_eq!(countries[1], Value::Str("Unknown".to_string()));
        assert!(countries.iter().all(|v| !v.is_null()));
    }

    #[test]
    fn login_counts_derive_active_user_flags() {
        let engagement = Table::from_rows(
            &["user_id", "logins_last_30_days", "messages_sent", "profile_complete"],
            vec![
                vec![Value::Int(1), Value::Int(0), Value::Int(2), Value::Int(1)],
                vec![Value::Int(2), Value::Int(5), Value::Int(0), Value::Null],
                vec![Value::Int(3), Value::Null, Value::Null, Value::Int(3)],
            ],
        )
        .expect("engagement fixture");

        let cleaned =
            clean_table(&engagement, &clean_spec_for(Entity::Engagement)).expect("clean");
        let flags = &cleaned.column("active_user").expect("active_user").values;
        assert_eq!(flags, &vec![Value::Int(0), Value::Int(1), Value::Int(0)]);
        let profile = &cleaned
            .column("profile_complete")
            .expect("profile_complete")
            .values;
        assert_eq!(profile, &vec![Value::Int(1), Value::Int(0), Value::Int(1)]);
    }

    #[test]
    fn cleaned_columns_have_no_missing_values_left() {
        let cleaned =
            clean_table(&users_fixture(), &clean_spec_for(Entity::Users)).expect("clean users");
        for name in ["signup_date", "country"] {
            let column = cleaned.column(name).expect("column");
            assert!(
                column.values.iter().all(|v| !v.is_null()),
                "column {name} still has nulls"
            );
        }
    }

    #[test]
    fn uncoercible_date_fails_the_run() {
        let spec = CleanSpec {
            table: "users".to_string(),
            rules: vec![CleanRule::CoerceDate {
                column: "signup_date".to_string(),
            }],
        };
        let table = Table::from_rows(
            &["signup_date"],
            vec![vec![Value::Str("not-a-date".to_string())]],
        )
        .expect("table");
        let err = clean_table(&table, &spec).expect_err("bad date must fail");
        assert!(err.to_string().contains("signup_date"), "err: {err}");
    }

    #[test]
    fn numeric_strings_coerce_to_integers() {
        let spec = CleanSpec {
            table: "engagement".to_string(),
            rules: vec![CleanRule::CoerceInt {
                column: "messages_sent".to_string(),
            }],
        };
        let table = Table::from_rows(
            &["messages_sent"],
            vec![
                vec![Value::Str(" 12 ".to_string())],
                vec![Value::Int(3)],
                vec![Value::Null],
            ],
        )
        .expect("table");
        let cleaned = clean_table(&table, &spec).expect("clean");
        assert_eq!(
            cleaned.column("messages_sent").expect("column").values,
            vec![Value::Int(12), Value::Int(3), Value::Null]
        );

        let bad = Table::from_rows(
            &["messages_sent"],
            vec![vec![Value::Str("many".to_string())]],
        )
        .expect("table");
        clean_table(&bad, &spec).expect_err("non-numeric string must fail");
    }

    #[test]
    fn zero_row_table_cleans_without_error() {
        let empty = Table::empty(&["user_id", "employer_id", "signup_date", "country"])
            .expect("empty users");
        let cleaned = clean_table(&empty, &clean_spec_for(Entity::Users)).expect("clean empty");
        assert_eq!(cleaned.row_count(), 0);
    }
}

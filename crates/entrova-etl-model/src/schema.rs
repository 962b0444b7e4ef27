// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Declared semantic type of a column. Storage may deliver rawer shapes (date
/// strings, nullable counts); the clean stage coerces toward the declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Identifier,
    Date,
    Integer,
    Float,
    Categorical,
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self, SchemaError> {
        for (i, def) in columns.iter().enumerate() {
            if def.name.trim().is_empty() {
                return Err(SchemaError("column name must not be empty".to_string()));
            }
            if columns[..i].iter().any(|prior| prior.name == def.name) {
                return Err(SchemaError(format!("duplicate column name: {}", def.name)));
            }
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// The four operational tables of the Entrova store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Users,
    Employers,
    DemoSessions,
    Engagement,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Users,
        Entity::Employers,
        Entity::DemoSessions,
        Entity::Engagement,
    ];

    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Employers => "employers",
            Self::DemoSessions => "demo_sessions",
            Self::Engagement => "engagement",
        }
    }

    /// The entity-identifier column rows are addressed and joined by.
    #[must_use]
    pub const fn key_column(self) -> &'static str {
        match self {
            Self::Users | Self::DemoSessions | Self::Engagement => "user_id",
            Self::Employers => "employer_id",
        }
    }

    #[must_use]
    pub fn schema(self) -> Schema {
        let columns = match self {
            Self::Users => vec![
                col("user_id", ColumnType::Identifier, false),
                col("employer_id", ColumnType::Identifier, true),
                col("signup_date", ColumnType::Date, false),
                col("country", ColumnType::Categorical, true),
            ],
            Self::Employers => vec![
                col("employer_id", ColumnType::Identifier, false),
                col("company_name", ColumnType::Categorical, false),
                col("industry", ColumnType::Categorical, true),
            ],
            Self::DemoSessions => vec![
                col("user_id", ColumnType::Identifier, false),
                col("session_date", ColumnType::Date, false),
                col("attended_demo", ColumnType::Flag, true),
            ],
            Self::Engagement => vec![
                col("user_id", ColumnType::Identifier, false),
                col("logins_last_30_days", ColumnType::Integer, true),
                col("messages_sent", ColumnType::Integer, true),
                col("profile_complete", ColumnType::Flag, true),
            ],
        };
        Schema::new(columns).expect("entity schemas are statically well formed")
    }
}

fn col(name: &str, column_type: ColumnType, nullable: bool) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        column_type,
        nullable,
    }
}

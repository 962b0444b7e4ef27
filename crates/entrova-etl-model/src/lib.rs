// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod schema;
mod table;
mod value;

use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "entrova-etl-model";

pub use schema::{ColumnDef, ColumnType, Entity, Schema};
pub use table::{Column, Table};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError(pub String);

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SchemaError {}

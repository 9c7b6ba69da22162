//! Various create messages/structs.
use crate::expr::Expression;
use crate::scalar::DataType;

/// Behavior on create conflict.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Ignore and return ok.
    ///
    /// CREATE IF NOT EXIST
    Ignore,

    /// Replace the original entry.
    ///
    /// CREATE OR REPLACE
    Replace,

    /// Error on conflict.
    #[default]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSchemaInfo {
    pub name: String,
    pub owner: String,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone)]
pub struct CreateSequenceInfo {
    pub schema: String,
    pub name: String,
    pub start: Option<Expression>,
    pub increment: Option<Expression>,
    /// Falls back to the session's configured cache size.
    pub cache_size: Option<u64>,
    pub on_conflict: OnConflict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Values default to the next value of an implicit, table owned sequence.
    pub identity: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        ColumnDefinition {
            name: name.into(),
            datatype,
            nullable: true,
            primary_key: false,
            identity: false,
        }
    }

    /// BIGINT identity primary key column.
    pub fn identity(name: impl Into<String>) -> Self {
        ColumnDefinition {
            name: name.into(),
            datatype: DataType::Int64,
            nullable: false,
            primary_key: true,
            identity: true,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub on_conflict: OnConflict,
}

use std::sync::Arc;

use ridgedb_error::{DbError, ErrorKind, Result};

use super::ObjectKey;
use super::create::ColumnDefinition;
use super::sequence::Sequence;
use super::system_session::{CatalogObject, CatalogRecord, ColumnRecord, TableRecord};
use crate::scalar::DataType;
use crate::storage::memory::TableStorage;

#[derive(Debug)]
pub struct Column {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Sequence providing the default value.
    pub sequence: Option<Arc<Sequence>>,
}

#[derive(Debug)]
pub struct Table {
    key: ObjectKey,
    columns: Vec<Column>,
    storage: TableStorage,
}

impl Table {
    /// Create a table from column definitions.
    ///
    /// `sequences` holds the implicit sequence for each identity column, in
    /// column order.
    pub fn new(
        key: ObjectKey,
        definitions: &[ColumnDefinition],
        sequences: Vec<Arc<Sequence>>,
    ) -> Result<Self> {
        let mut sequences = sequences.into_iter();
        let mut columns = Vec::with_capacity(definitions.len());

        for def in definitions {
            if columns.iter().any(|c: &Column| c.name == def.name) {
                return Err(DbError::new_kind(
                    ErrorKind::DuplicateObject,
                    "Duplicate column name",
                )
                .with_field("table", &key)
                .with_field("column", &def.name));
            }

            let sequence = if def.identity {
                let seq = sequences.next().ok_or_else(|| {
                    DbError::new("Missing sequence for identity column")
                        .with_field("column", &def.name)
                })?;
                Some(seq)
            } else {
                None
            };

            columns.push(Column {
                name: def.name.clone(),
                datatype: def.datatype,
                nullable: def.nullable,
                primary_key: def.primary_key,
                sequence,
            });
        }

        if sequences.next().is_some() {
            return Err(DbError::new("More sequences than identity columns").with_field("table", &key));
        }

        Ok(Table {
            key,
            columns,
            storage: TableStorage::default(),
        })
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    /// Index of the column with the given name.
    pub fn resolve_column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                DbError::new_kind(ErrorKind::ObjectNotFound, "Column not found")
                    .with_field("table", &self.key)
                    .with_field("column", name)
            })
    }

    /// First column backed by a sequence.
    pub fn identity_column(&self) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.sequence.is_some())
    }

    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, c)| c.primary_key.then_some(idx))
            .collect()
    }

    /// Sequences owned by this table.
    pub fn owned_sequences(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.columns
            .iter()
            .filter_map(|c| c.sequence.as_ref())
            .filter(|s| s.belongs_to_table())
    }

    pub fn storage(&self) -> &TableStorage {
        &self.storage
    }
}

impl CatalogObject for Table {
    fn catalog_record(&self) -> CatalogRecord {
        CatalogRecord::Table(TableRecord {
            key: self.key.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnRecord {
                    name: c.name.clone(),
                    datatype: c.datatype,
                    nullable: c.nullable,
                    primary_key: c.primary_key,
                    sequence: c.sequence.as_ref().map(|s| s.name().to_string()),
                })
                .collect(),
        })
    }
}

use std::sync::Arc;

use super::CatalogMap;
use super::sequence::Sequence;
use super::system_session::{CatalogObject, CatalogRecord, SchemaRecord};
use super::table::Table;

#[derive(Debug)]
pub struct Schema {
    name: String,
    owner: String,
    pub(crate) tables: CatalogMap<Table>,
    pub(crate) sequences: CatalogMap<Sequence>,
}

impl Schema {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            owner: owner.into(),
            tables: CatalogMap::default(),
            sequences: CatalogMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.get_entry(name)
    }

    pub fn get_sequence(&self, name: &str) -> Option<Arc<Sequence>> {
        self.sequences.get_entry(name)
    }

    pub fn list_tables(&self) -> Vec<Arc<Table>> {
        self.tables.list_entries()
    }

    pub fn list_sequences(&self) -> Vec<Arc<Sequence>> {
        self.sequences.list_entries()
    }
}

impl CatalogObject for Schema {
    fn catalog_record(&self) -> CatalogRecord {
        CatalogRecord::Schema(SchemaRecord {
            name: self.name.clone(),
            owner: self.owner.clone(),
        })
    }
}

//! Catalog objects and the database that owns them.
pub mod create;
pub mod database;
pub mod drop;
pub mod rights;
pub mod schema;
pub mod sequence;
pub mod system_session;
pub mod table;

use std::fmt;
use std::sync::Arc;

use ridgedb_error::{DbError, ErrorKind, Result};
use scc::HashIndex;
use scc::ebr::Guard;
use serde::{Deserialize, Serialize};

use self::create::OnConflict;

/// Schema qualified name of a catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub schema: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Maps a name to some catalog entry.
#[derive(Debug)]
pub(crate) struct CatalogMap<T: 'static> {
    entries: HashIndex<String, Arc<T>>,
}

impl<T: 'static> Default for CatalogMap<T> {
    fn default() -> Self {
        CatalogMap {
            entries: HashIndex::new(),
        }
    }
}

impl<T: 'static> CatalogMap<T> {
    /// Insert an entry while obeying conflict rules.
    ///
    /// Returns the entry that ends up in the map, which is the existing entry
    /// for `OnConflict::Ignore`.
    pub fn create_entry(
        &self,
        name: &str,
        entry: Arc<T>,
        on_conflict: OnConflict,
    ) -> Result<Arc<T>> {
        use scc::hash_index::Entry;

        match (self.entries.entry(name.to_string()), on_conflict) {
            (Entry::Vacant(ent), _) => {
                ent.insert_entry(entry.clone());
                Ok(entry)
            }
            (Entry::Occupied(ent), OnConflict::Ignore) => Ok(ent.get().clone()),
            (Entry::Occupied(ent), OnConflict::Replace) => {
                ent.update(entry.clone());
                Ok(entry)
            }
            (Entry::Occupied(_), OnConflict::Error) => Err(DbError::new_kind(
                ErrorKind::DuplicateObject,
                format!("Duplicate entry name '{name}'"),
            )),
        }
    }

    pub fn get_entry(&self, name: &str) -> Option<Arc<T>> {
        let guard = Guard::new();
        self.entries.peek(name, &guard).cloned()
    }

    /// Remove an entry, returning it if it existed.
    pub fn drop_entry(&self, name: &str) -> Option<Arc<T>> {
        let ent = self.get_entry(name)?;
        if self.entries.remove(name) {
            Some(ent)
        } else {
            None
        }
    }

    pub fn list_entries(&self) -> Vec<Arc<T>> {
        let guard = Guard::new();
        self.entries.iter(&guard).map(|(_, v)| v.clone()).collect()
    }
}

//! The privileged session used to persist catalog changes.
//!
//! Catalog writes never go through a user transaction. Every write acquires
//! exclusive access to the system session, stages records, and commits them in
//! one step. A commit is visible to all sessions immediately and is not undone
//! by a later rollback of whatever user transaction triggered it.
use std::collections::BTreeMap;

use parking_lot::{Mutex, MutexGuard};
use ridgedb_error::{DbError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::ObjectKey;
use crate::scalar::DataType;

/// Persisted form of a catalog object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogRecord {
    User(UserRecord),
    Schema(SchemaRecord),
    Table(TableRecord),
    Sequence(SequenceRecord),
    Grant(GrantRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Name of the sequence providing default values.
    pub sequence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub key: ObjectKey,
    pub columns: Vec<ColumnRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub key: ObjectKey,
    pub start: i64,
    pub increment: i64,
    pub cache_size: u64,
    /// First value to issue when the sequence is recovered from this record.
    /// Every value issued before the record was written lies before it.
    pub base: i64,
    pub belongs_to_table: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub grantee: String,
    pub object: ObjectKey,
    pub rights: u8,
}

impl CatalogRecord {
    /// Key the record is stored under.
    pub fn storage_key(&self) -> String {
        match self {
            Self::User(user) => user_storage_key(&user.name),
            Self::Schema(schema) => schema_storage_key(&schema.name),
            Self::Table(table) => table_storage_key(&table.key),
            Self::Sequence(seq) => sequence_storage_key(&seq.key),
            Self::Grant(grant) => grant_storage_key(&grant.grantee, &grant.object),
        }
    }
}

pub fn user_storage_key(name: &str) -> String {
    format!("user:{name}")
}

pub fn schema_storage_key(name: &str) -> String {
    format!("schema:{name}")
}

pub fn table_storage_key(key: &ObjectKey) -> String {
    format!("table:{key}")
}

const SEQUENCE_KEY_PREFIX: &str = "sequence:";

pub fn sequence_storage_key(key: &ObjectKey) -> String {
    format!("{SEQUENCE_KEY_PREFIX}{key}")
}

pub fn grant_storage_key(grantee: &str, object: &ObjectKey) -> String {
    format!("grant:{grantee}:{object}")
}

/// An in-memory catalog object that can be persisted.
pub trait CatalogObject {
    fn catalog_record(&self) -> CatalogRecord;
}

#[derive(Debug, Default)]
struct CatalogStore {
    /// Incremented on every commit that changed at least one record.
    version: u64,
    /// Incremented on commits that changed catalog structure. Overwriting
    /// an existing sequence record only moves its counters and doesn't
    /// count.
    schema_version: u64,
    records: BTreeMap<String, String>,
}

#[derive(Debug)]
enum PendingWrite {
    Put { key: String, value: String },
    Delete { key: String },
}

/// Exclusive access to the system session.
///
/// Staged writes are applied on commit and discarded if the transaction is
/// dropped without committing.
#[derive(Debug)]
pub struct SystemTransaction<'a> {
    store: MutexGuard<'a, CatalogStore>,
    pending: Vec<PendingWrite>,
}

impl SystemTransaction<'_> {
    /// Stage the current state of a catalog object.
    pub fn update(&mut self, object: &dyn CatalogObject) -> Result<()> {
        self.write_record(object.catalog_record())
    }

    pub fn write_record(&mut self, record: CatalogRecord) -> Result<()> {
        let key = record.storage_key();
        let value = serde_json::to_string(&record)
            .context_fn(|| format!("Failed to serialize catalog record '{key}'"))?;
        trace!(%key, "staging catalog record");
        self.pending.push(PendingWrite::Put { key, value });
        Ok(())
    }

    /// Stage removal of a record.
    pub fn remove(&mut self, key: impl Into<String>) {
        self.pending.push(PendingWrite::Delete { key: key.into() });
    }

    /// Read a record as it would be seen after commit.
    pub fn read_record(&self, key: &str) -> Result<Option<CatalogRecord>> {
        for write in self.pending.iter().rev() {
            match write {
                PendingWrite::Put { key: k, value } if k == key => {
                    return decode_record(key, value).map(Some);
                }
                PendingWrite::Delete { key: k } if k == key => return Ok(None),
                _ => (),
            }
        }
        self.store
            .records
            .get(key)
            .map(|value| decode_record(key, value))
            .transpose()
    }

    fn commit(mut self) -> u64 {
        if !self.pending.is_empty() {
            let mut schema_changed = false;
            for write in self.pending.drain(..) {
                match write {
                    PendingWrite::Put { key, value } => {
                        let is_sequence = key.starts_with(SEQUENCE_KEY_PREFIX);
                        let existed = self.store.records.insert(key, value).is_some();
                        schema_changed |= !(is_sequence && existed);
                    }
                    PendingWrite::Delete { key } => {
                        self.store.records.remove(&key);
                        schema_changed = true;
                    }
                }
            }
            self.store.version += 1;
            if schema_changed {
                self.store.schema_version += 1;
            }
        }
        self.store.version
    }
}

fn decode_record(key: &str, value: &str) -> Result<CatalogRecord> {
    serde_json::from_str(value).context_fn(|| format!("Failed to decode catalog record '{key}'"))
}

/// Process wide privileged session for catalog mutation.
///
/// Obtained from the owning `Database`, there is exactly one per database.
#[derive(Debug, Default)]
pub struct SystemSession {
    store: Mutex<CatalogStore>,
}

impl SystemSession {
    /// Run `f` with exclusive access to the system session, then commit.
    ///
    /// This is the only way to write to the catalog store. If `f` errors,
    /// nothing staged by it is persisted. The lock is held for the duration of
    /// `f` so callers should only do the minimal amount of work inside.
    pub fn apply_and_commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SystemTransaction<'_>) -> Result<T>,
    {
        let mut tx = SystemTransaction {
            store: self.store.lock(),
            pending: Vec::new(),
        };

        let out = match f(&mut tx) {
            Ok(out) => out,
            Err(e) => {
                debug!(pending = tx.pending.len(), "discarding system session writes");
                return Err(e);
            }
        };

        let writes = tx.pending.len();
        let version = tx.commit();
        debug!(%version, %writes, "committed system session");

        Ok(out)
    }

    /// Current catalog version.
    pub fn version(&self) -> u64 {
        self.store.lock().version
    }

    /// Version of the catalog structure, unchanged by sequence counter writes.
    pub fn schema_version(&self) -> u64 {
        self.store.lock().schema_version
    }

    /// Read a committed record.
    pub fn read_record(&self, key: &str) -> Result<Option<CatalogRecord>> {
        let store = self.store.lock();
        store
            .records
            .get(key)
            .map(|value| decode_record(key, value))
            .transpose()
    }

    /// Storage keys of all committed records, in order.
    pub fn record_keys(&self) -> Vec<String> {
        self.store.lock().records.keys().cloned().collect()
    }
}

impl CatalogRecord {
    pub fn try_into_sequence(self) -> Result<SequenceRecord> {
        match self {
            Self::Sequence(seq) => Ok(seq),
            other => Err(DbError::new(format!(
                "Expected sequence record, got '{}'",
                other.storage_key()
            ))),
        }
    }
}

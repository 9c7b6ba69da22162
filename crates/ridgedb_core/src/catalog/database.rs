use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ridgedb_error::{DbError, ErrorKind, OptionExt, Result};
use tracing::{debug, info};

use super::create::{CreateSchemaInfo, OnConflict};
use super::rights::{Right, RightsTable, User};
use super::schema::Schema;
use super::sequence::Sequence;
use super::system_session::{
    CatalogObject,
    CatalogRecord,
    GrantRecord,
    SystemSession,
    SystemTransaction,
    grant_storage_key,
    sequence_storage_key,
    table_storage_key,
};
use super::table::Table;
use super::{CatalogMap, ObjectKey};
use crate::config::database::DatabaseConfig;
use crate::engine::session::Session;
use crate::expr::evaluator::{DefaultEvaluator, ExpressionEvaluator};

/// Process wide catalog registry.
///
/// Owns every schema, table and sequence plus the single system session
/// through which all catalog changes are persisted.
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    schemas: CatalogMap<Schema>,
    users: CatalogMap<User>,
    rights: RightsTable,
    system_session: SystemSession,
    evaluator: Arc<dyn ExpressionEvaluator>,
    next_transaction_id: AtomicU64,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Result<Arc<Self>> {
        Self::with_evaluator(config, Arc::new(DefaultEvaluator))
    }

    /// Create a database using a custom expression evaluator.
    pub fn with_evaluator(
        config: DatabaseConfig,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Result<Arc<Self>> {
        let db = Database {
            config,
            schemas: CatalogMap::default(),
            users: CatalogMap::default(),
            rights: RightsTable::default(),
            system_session: SystemSession::default(),
            evaluator,
            next_transaction_id: AtomicU64::new(1),
        };

        let admin = db.config.admin_user.clone();
        db.create_user(&admin, true)?;
        db.create_schema(&CreateSchemaInfo {
            name: db.config.default_schema.clone(),
            owner: admin,
            on_conflict: OnConflict::Error,
        })?;

        info!(name = %db.config.name, "opened database");

        Ok(Arc::new(db))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The privileged session all catalog writes go through.
    pub fn system_session(&self) -> &SystemSession {
        &self.system_session
    }

    pub fn rights(&self) -> &RightsTable {
        &self.rights
    }

    pub fn evaluator(&self) -> &Arc<dyn ExpressionEvaluator> {
        &self.evaluator
    }

    pub(crate) fn next_transaction_id(&self) -> u64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Open a session for `user`.
    pub fn new_session(self: &Arc<Self>, user: &str) -> Result<Session> {
        let user = self.require_user(user)?;
        Ok(Session::new(self.clone(), user))
    }

    pub fn create_user(&self, name: &str, admin: bool) -> Result<Arc<User>> {
        self.system_session.apply_and_commit(|tx| {
            let user = Arc::new(User::new(name, admin));
            self.update(tx, user.as_ref())?;
            self.users.create_entry(name, user, OnConflict::Error)
        })
    }

    pub fn get_user(&self, name: &str) -> Option<Arc<User>> {
        self.users.get_entry(name)
    }

    pub fn require_user(&self, name: &str) -> Result<Arc<User>> {
        self.get_user(name).ok_or_else(|| {
            DbError::new_kind(ErrorKind::ObjectNotFound, "User not found").with_field("user", name)
        })
    }

    pub fn admin_user(&self) -> Result<Arc<User>> {
        self.get_user(&self.config.admin_user)
            .required("admin user")
    }

    pub fn create_schema(&self, info: &CreateSchemaInfo) -> Result<Arc<Schema>> {
        self.system_session.apply_and_commit(|tx| {
            let schema = Arc::new(Schema::new(&info.name, &info.owner));
            self.update(tx, schema.as_ref())?;
            self.schemas
                .create_entry(&info.name, schema, info.on_conflict)
        })
    }

    pub fn get_schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get_entry(name)
    }

    pub fn require_schema(&self, name: &str) -> Result<Arc<Schema>> {
        self.get_schema(name).ok_or_else(|| {
            DbError::new_kind(ErrorKind::ObjectNotFound, "Schema not found")
                .with_field("schema", name)
        })
    }

    pub fn default_schema(&self) -> Result<Arc<Schema>> {
        self.require_schema(&self.config.default_schema)
    }

    pub fn get_table(&self, schema: &str, name: &str) -> Option<Arc<Table>> {
        self.get_schema(schema)?.get_table(name)
    }

    pub fn require_table(&self, schema: &str, name: &str) -> Result<Arc<Table>> {
        self.get_table(schema, name).ok_or_else(|| {
            DbError::new_kind(ErrorKind::ObjectNotFound, "Table not found")
                .with_field("table", ObjectKey::new(schema, name))
        })
    }

    pub fn get_sequence(&self, schema: &str, name: &str) -> Option<Arc<Sequence>> {
        self.get_schema(schema)?.get_sequence(name)
    }

    pub fn require_sequence(&self, schema: &str, name: &str) -> Result<Arc<Sequence>> {
        self.get_sequence(schema, name).ok_or_else(|| {
            DbError::new_kind(ErrorKind::SequenceNotFound, "Sequence not found")
                .with_field("sequence", ObjectKey::new(schema, name))
        })
    }

    /// Persist the current in-memory state of a catalog object.
    ///
    /// Requires exclusive access to the system session, which holding `tx`
    /// proves.
    pub fn update(&self, tx: &mut SystemTransaction<'_>, object: &dyn CatalogObject) -> Result<()> {
        tx.update(object)
    }

    /// Register a new sequence.
    pub fn create_sequence(
        &self,
        tx: &mut SystemTransaction<'_>,
        sequence: Sequence,
        on_conflict: OnConflict,
    ) -> Result<Arc<Sequence>> {
        let schema = self.require_schema(&sequence.key().schema)?;
        if on_conflict == OnConflict::Ignore {
            if let Some(existing) = schema.get_sequence(sequence.name()) {
                return Ok(existing);
            }
        }

        let sequence = Arc::new(sequence);
        self.update(tx, sequence.as_ref())?;
        let sequence = schema
            .sequences
            .create_entry(sequence.name(), sequence.clone(), on_conflict)?;
        debug!(sequence = %sequence.key(), "created sequence");
        Ok(sequence)
    }

    /// Register a new table along with the sequences backing its identity
    /// columns.
    pub fn create_table(
        &self,
        tx: &mut SystemTransaction<'_>,
        table: Table,
        on_conflict: OnConflict,
    ) -> Result<Arc<Table>> {
        let schema = self.require_schema(&table.key().schema)?;
        if let Some(existing) = schema.get_table(table.name()) {
            match on_conflict {
                OnConflict::Ignore => return Ok(existing),
                OnConflict::Replace => self.drop_table_entries(tx, &schema, &existing)?,
                OnConflict::Error => {
                    return Err(DbError::new_kind(
                        ErrorKind::DuplicateObject,
                        "Table already exists",
                    )
                    .with_field("table", table.key()));
                }
            }
        }

        for seq in table.owned_sequences() {
            self.update(tx, seq.as_ref())?;
        }
        self.update(tx, &table)?;

        // Catalog maps are only touched once every record has been staged.
        for seq in table.owned_sequences() {
            schema
                .sequences
                .create_entry(seq.name(), seq.clone(), OnConflict::Error)?;
        }
        let table = Arc::new(table);
        schema
            .tables
            .create_entry(table.name(), table.clone(), OnConflict::Replace)?;
        debug!(table = %table.key(), "created table");

        Ok(table)
    }

    /// Drop a table, its owned sequences and grants on it.
    ///
    /// Returns None if the table doesn't exist.
    pub fn drop_table(
        &self,
        tx: &mut SystemTransaction<'_>,
        schema: &str,
        name: &str,
    ) -> Result<Option<Arc<Table>>> {
        let schema = self.require_schema(schema)?;
        let table = match schema.get_table(name) {
            Some(table) => table,
            None => return Ok(None),
        };
        self.drop_table_entries(tx, &schema, &table)?;
        debug!(table = %table.key(), "dropped table");
        Ok(Some(table))
    }

    fn drop_table_entries(
        &self,
        tx: &mut SystemTransaction<'_>,
        schema: &Schema,
        table: &Table,
    ) -> Result<()> {
        tx.remove(table_storage_key(table.key()));
        for seq in table.owned_sequences() {
            tx.remove(sequence_storage_key(seq.key()));
            schema.sequences.drop_entry(seq.name());
        }
        for grantee in self.rights.remove_object(table.key()) {
            tx.remove(grant_storage_key(&grantee, table.key()));
        }
        schema.tables.drop_entry(table.name());
        Ok(())
    }

    /// Drop a standalone sequence.
    ///
    /// Sequences backing identity columns are dropped with their table.
    pub fn drop_sequence(
        &self,
        tx: &mut SystemTransaction<'_>,
        schema: &str,
        name: &str,
    ) -> Result<Option<Arc<Sequence>>> {
        let schema = self.require_schema(schema)?;
        let sequence = match schema.get_sequence(name) {
            Some(seq) => seq,
            None => return Ok(None),
        };
        if sequence.belongs_to_table() {
            return Err(DbError::new_kind(
                ErrorKind::InvalidState,
                "Sequence belongs to a table",
            )
            .with_field("sequence", sequence.key()));
        }
        tx.remove(sequence_storage_key(sequence.key()));
        schema.sequences.drop_entry(name);
        debug!(sequence = %sequence.key(), "dropped sequence");
        Ok(Some(sequence))
    }

    /// Grant or revoke rights and persist the resulting grant.
    pub fn set_rights(
        &self,
        tx: &mut SystemTransaction<'_>,
        grantee: &str,
        object: &ObjectKey,
        rights: Right,
        revoke: bool,
    ) -> Result<Right> {
        self.require_user(grantee)?;
        let held = if revoke {
            self.rights.revoke(grantee, object, rights)
        } else {
            self.rights.grant(grantee, object, rights)
        };

        if held.is_empty() {
            tx.remove(grant_storage_key(grantee, object));
        } else {
            tx.write_record(CatalogRecord::Grant(GrantRecord {
                grantee: grantee.to_string(),
                object: object.clone(),
                rights: held.bits(),
            }))?;
        }
        Ok(held)
    }

    /// Check that `user` holds `right` on `object`.
    ///
    /// Admins and the owner of the object's schema hold every right.
    pub fn check_right(&self, user: &User, object: &ObjectKey, right: Right) -> Result<()> {
        if let Some(schema) = self.get_schema(&object.schema) {
            if schema.owner() == user.name {
                return Ok(());
            }
        }
        self.rights.check_right(user, object, right)
    }

    /// Check that `user` may create or drop objects in `schema`.
    pub fn check_schema_owner(&self, user: &User, schema: &str) -> Result<()> {
        if user.admin {
            return Ok(());
        }
        let schema = self.require_schema(schema)?;
        if schema.owner() == user.name {
            return Ok(());
        }
        Err(DbError::new_kind(
            ErrorKind::PermissionDenied,
            "Not enough rights for schema",
        )
        .with_field("schema", schema.name())
        .with_field("user", &user.name))
    }

    /// Read a committed catalog record.
    pub fn persisted_record(&self, key: &str) -> Result<Option<CatalogRecord>> {
        self.system_session.read_record(key)
    }

    /// Catalog version, bumped by every system session commit that wrote
    /// something.
    pub fn catalog_version(&self) -> u64 {
        self.system_session.version()
    }

    /// Bumped only by catalog commits that change structure, not by
    /// sequence block reservations.
    pub fn schema_version(&self) -> u64 {
        self.system_session.schema_version()
    }

    /// Reset a sequence to its persisted state, as if the database had been
    /// restarted.
    pub fn reload_sequence(&self, schema: &str, name: &str) -> Result<Arc<Sequence>> {
        let sequence = self.require_sequence(schema, name)?;
        let record = self
            .persisted_record(&sequence_storage_key(sequence.key()))?
            .ok_or_else(|| {
                DbError::new_kind(ErrorKind::ObjectNotFound, "No persisted sequence record")
                    .with_field("sequence", sequence.key())
            })?
            .try_into_sequence()?;
        sequence.reload(&record)?;
        Ok(sequence)
    }
}

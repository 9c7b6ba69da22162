use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::ObjectKey;
use super::system_session::{CatalogObject, CatalogRecord, UserRecord};

/// Set of access rights on a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Right(u8);

impl Right {
    pub const NONE: Right = Right(0);
    pub const SELECT: Right = Right(1);
    pub const INSERT: Right = Right(2);
    pub const UPDATE: Right = Right(4);
    pub const DELETE: Right = Right(8);
    pub const ALL: Right = Right(1 | 2 | 4 | 8);

    pub const fn from_bits(bits: u8) -> Self {
        Right(bits & Self::ALL.0)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// If every right in `other` is also in `self`.
    pub const fn contains(&self, other: Right) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(&self, other: Right) -> Right {
        Right(self.0 | other.0)
    }

    pub const fn difference(&self, other: Right) -> Right {
        Right(self.0 & !other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return write!(f, "ALL");
        }
        let names = [
            (Self::SELECT, "SELECT"),
            (Self::INSERT, "INSERT"),
            (Self::UPDATE, "UPDATE"),
            (Self::DELETE, "DELETE"),
        ];
        let mut first = true;
        for (right, name) in names {
            if self.contains(right) {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "NONE")?;
        }
        Ok(())
    }
}

/// A database principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    /// Admins bypass all right checks.
    pub admin: bool,
}

impl User {
    pub fn new(name: impl Into<String>, admin: bool) -> Self {
        User {
            name: name.into(),
            admin,
        }
    }
}

impl CatalogObject for User {
    fn catalog_record(&self) -> CatalogRecord {
        CatalogRecord::User(UserRecord {
            name: self.name.clone(),
            admin: self.admin,
        })
    }
}

/// Rights granted to non-admin users.
#[derive(Debug, Default)]
pub struct RightsTable {
    grants: RwLock<HashMap<(String, ObjectKey), Right>>,
}

impl RightsTable {
    /// Add rights, returning the full set now held.
    pub fn grant(&self, grantee: &str, object: &ObjectKey, rights: Right) -> Right {
        let mut grants = self.grants.write();
        let ent = grants
            .entry((grantee.to_string(), object.clone()))
            .or_default();
        *ent = ent.union(rights);
        debug!(%grantee, %object, %rights, "granted rights");
        *ent
    }

    /// Remove rights, returning what remains.
    pub fn revoke(&self, grantee: &str, object: &ObjectKey, rights: Right) -> Right {
        let mut grants = self.grants.write();
        let key = (grantee.to_string(), object.clone());
        let remaining = match grants.get(&key) {
            Some(current) => current.difference(rights),
            None => return Right::NONE,
        };
        if remaining.is_empty() {
            grants.remove(&key);
        } else {
            grants.insert(key, remaining);
        }
        debug!(%grantee, %object, %rights, "revoked rights");
        remaining
    }

    pub fn rights_for(&self, grantee: &str, object: &ObjectKey) -> Right {
        self.grants
            .read()
            .get(&(grantee.to_string(), object.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Check that `user` holds `right` on `object`.
    pub fn check_right(&self, user: &User, object: &ObjectKey, right: Right) -> Result<()> {
        if user.admin {
            return Ok(());
        }
        if self.rights_for(&user.name, object).contains(right) {
            return Ok(());
        }
        Err(
            DbError::new_kind(ErrorKind::PermissionDenied, "Not enough rights for object")
                .with_field("object", object)
                .with_field("user", &user.name)
                .with_field("right", right),
        )
    }

    /// Drop all grants referencing `object`.
    pub fn remove_object(&self, object: &ObjectKey) -> Vec<String> {
        let mut grants = self.grants.write();
        let mut grantees = Vec::new();
        grants.retain(|(grantee, obj), _| {
            if obj == object {
                grantees.push(grantee.clone());
                false
            } else {
                true
            }
        });
        grantees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_display() {
        assert_eq!("ALL", Right::ALL.to_string());
        assert_eq!(
            "SELECT, UPDATE",
            Right::SELECT.union(Right::UPDATE).to_string()
        );
        assert_eq!("NONE", Right::NONE.to_string());
    }

    #[test]
    fn grant_and_revoke() {
        let table = RightsTable::default();
        let obj = ObjectKey::new("PUBLIC", "T");
        let user = User::new("BOB", false);

        let err = table.check_right(&user, &obj, Right::SELECT).unwrap_err();
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
        assert_eq!(Some("PUBLIC.T"), err.field("object"));

        table.grant("BOB", &obj, Right::SELECT);
        table.check_right(&user, &obj, Right::SELECT).unwrap();
        table.check_right(&user, &obj, Right::ALL).unwrap_err();

        table.grant("BOB", &obj, Right::ALL);
        table.check_right(&user, &obj, Right::ALL).unwrap();

        assert_eq!(
            Right::ALL.difference(Right::DELETE),
            table.revoke("BOB", &obj, Right::DELETE)
        );
        table.check_right(&user, &obj, Right::ALL).unwrap_err();
    }

    #[test]
    fn admin_bypasses() {
        let table = RightsTable::default();
        let obj = ObjectKey::new("PUBLIC", "T");
        table
            .check_right(&User::new("SA", true), &obj, Right::ALL)
            .unwrap();
    }

    #[test]
    fn remove_object_grants() {
        let table = RightsTable::default();
        let obj = ObjectKey::new("PUBLIC", "T");
        table.grant("BOB", &obj, Right::SELECT);
        table.grant("ALICE", &obj, Right::INSERT);

        let mut removed = table.remove_object(&obj);
        removed.sort();
        assert_eq!(vec!["ALICE".to_string(), "BOB".to_string()], removed);
        assert_eq!(Right::NONE, table.rights_for("BOB", &obj));
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ridgedb_error::{DbError, ErrorKind, Result};

/// Handle to a savepoint handed to the client.
///
/// A savepoint has either a name or an id, never both. The handle goes stale
/// once the savepoint is released, rolled back past, or its transaction ends.
#[derive(Debug, Clone)]
pub struct Savepoint {
    id: u64,
    name: Option<String>,
    valid: Arc<AtomicBool>,
}

impl Savepoint {
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    fn check_valid(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(invalid_savepoint(self));
        }
        Ok(())
    }

    /// Id of an unnamed savepoint.
    pub fn id(&self) -> Result<u64> {
        self.check_valid()?;
        if let Some(name) = &self.name {
            return Err(DbError::new_kind(ErrorKind::SavepointNamed, "Savepoint is named")
                .with_field("name", name));
        }
        Ok(self.id)
    }

    /// Name of a named savepoint.
    pub fn name(&self) -> Result<&str> {
        self.check_valid()?;
        match &self.name {
            Some(name) => Ok(name),
            None => Err(
                DbError::new_kind(ErrorKind::SavepointUnnamed, "Savepoint is unnamed")
                    .with_field("id", self.id),
            ),
        }
    }
}

fn invalid_savepoint(savepoint: &Savepoint) -> DbError {
    let err = DbError::new_kind(ErrorKind::SavepointInvalid, "Savepoint is invalid");
    match &savepoint.name {
        Some(name) => err.with_field("name", name),
        None => err.with_field("id", savepoint.id),
    }
}

#[derive(Debug)]
struct SavepointEntry {
    id: u64,
    name: Option<String>,
    /// Undo log position when the savepoint was set.
    position: usize,
    valid: Arc<AtomicBool>,
}

impl SavepointEntry {
    fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

/// Savepoints of the current transaction, oldest first.
#[derive(Debug, Default)]
pub(crate) struct SavepointStack {
    entries: Vec<SavepointEntry>,
    /// Next id. Ids are never reused within a session.
    next_id: u64,
}

impl SavepointStack {
    /// Push a savepoint at the given undo log position.
    ///
    /// A named savepoint replaces an existing one with the same name.
    pub fn push(&mut self, name: Option<&str>, position: usize) -> Savepoint {
        if let Some(name) = name {
            if let Some(idx) = self
                .entries
                .iter()
                .position(|e| e.name.as_deref() == Some(name))
            {
                self.entries.remove(idx).invalidate();
            }
        }

        let id = self.next_id;
        self.next_id += 1;

        let valid = Arc::new(AtomicBool::new(true));
        self.entries.push(SavepointEntry {
            id,
            name: name.map(str::to_string),
            position,
            valid: valid.clone(),
        });

        Savepoint {
            id,
            name: name.map(str::to_string),
            valid,
        }
    }

    fn find(&self, savepoint: &Savepoint) -> Result<usize> {
        if savepoint.is_valid() {
            if let Some(idx) = self
                .entries
                .iter()
                .position(|e| e.id == savepoint.id && Arc::ptr_eq(&e.valid, &savepoint.valid))
            {
                return Ok(idx);
            }
        }
        Err(invalid_savepoint(savepoint))
    }

    /// Remove the savepoint and every later one, returning the undo log
    /// position to roll back to.
    pub fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<usize> {
        let idx = self.find(savepoint)?;
        let position = self.entries[idx].position;
        for entry in self.entries.drain(idx..) {
            entry.invalidate();
        }
        Ok(position)
    }

    /// Remove exactly this savepoint.
    pub fn release(&mut self, savepoint: &Savepoint) -> Result<()> {
        let idx = self.find(savepoint)?;
        self.entries.remove(idx).invalidate();
        Ok(())
    }

    /// Invalidate all savepoints.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            entry.invalidate();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_are_not_reused() {
        let mut stack = SavepointStack::default();
        let a = stack.push(None, 0);
        let b = stack.push(None, 1);
        assert!(b.id().unwrap() > a.id().unwrap());

        stack.rollback_to(&a).unwrap();
        let c = stack.push(None, 0);
        assert!(c.id().unwrap() > b.id().unwrap());
    }

    #[test]
    fn accessors_are_exclusive() {
        let mut stack = SavepointStack::default();
        let named = stack.push(Some("S1"), 0);
        let unnamed = stack.push(None, 0);

        assert_eq!("S1", named.name().unwrap());
        assert_eq!(ErrorKind::SavepointNamed, named.id().unwrap_err().kind());
        assert_eq!(ErrorKind::SavepointUnnamed, unnamed.name().unwrap_err().kind());
        unnamed.id().unwrap();
    }

    #[test]
    fn rollback_truncates_including_target() {
        let mut stack = SavepointStack::default();
        let a = stack.push(None, 1);
        let b = stack.push(None, 2);
        let c = stack.push(None, 3);

        assert_eq!(2, stack.rollback_to(&b).unwrap());
        assert_eq!(1, stack.len());
        assert!(a.is_valid());
        assert!(!b.is_valid());
        assert!(!c.is_valid());

        let err = stack.release(&b).unwrap_err();
        assert_eq!(ErrorKind::SavepointInvalid, err.kind());
        let err = stack.rollback_to(&c).unwrap_err();
        assert_eq!(ErrorKind::SavepointInvalid, err.kind());
        assert_eq!(ErrorKind::SavepointInvalid, c.id().unwrap_err().kind());
    }

    #[test]
    fn release_removes_only_target() {
        let mut stack = SavepointStack::default();
        let a = stack.push(None, 1);
        let b = stack.push(None, 2);

        stack.release(&a).unwrap();
        assert!(!a.is_valid());
        assert!(b.is_valid());
        assert_eq!(2, stack.rollback_to(&b).unwrap());
    }

    #[test]
    fn same_name_replaces() {
        let mut stack = SavepointStack::default();
        let first = stack.push(Some("S"), 1);
        let second = stack.push(Some("S"), 2);
        assert!(!first.is_valid());
        assert_eq!(1, stack.len());
        assert_eq!(2, stack.rollback_to(&second).unwrap());
    }

    #[test]
    fn clear_invalidates() {
        let mut stack = SavepointStack::default();
        let a = stack.push(Some("A"), 0);
        stack.clear();
        assert!(!a.is_valid());
        assert_eq!(ErrorKind::SavepointInvalid, a.name().unwrap_err().kind());
    }
}

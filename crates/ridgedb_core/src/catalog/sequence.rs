//! Sequence catalog object.
//!
//! A sequence issues values from an in-memory counter. Only the high water
//! mark of a reserved block of `cache_size` values is persisted, and only when
//! the block runs out. Persisting always goes through the system session, so
//! issuing values is independent of any user transaction. A rolled back
//! insert never gives its value back.
use parking_lot::Mutex;
use ridgedb_error::{DbError, ErrorKind, Result};
use tracing::{debug, trace};

use super::ObjectKey;
use super::system_session::{CatalogObject, CatalogRecord, SequenceRecord, SystemSession};

pub const DEFAULT_CACHE_SIZE: u64 = 32;

#[derive(Debug)]
pub struct Sequence {
    key: ObjectKey,
    /// Implicit sequence backing an identity column.
    belongs_to_table: bool,
    state: Mutex<SequenceState>,
}

#[derive(Debug, Clone)]
struct SequenceState {
    /// Last issued value, None if nothing was issued since create or restart.
    last: Option<i64>,
    /// Value issued when `last` is None.
    base: i64,
    /// Start marker used by a plain restart.
    start: i64,
    increment: i64,
    cache_size: u64,
    /// Values left in the reserved block.
    remaining: u64,
    /// Persisted resume point. Never behind a value that's been issued.
    persisted_base: i64,
}

impl SequenceState {
    fn peek_next(&self) -> i64 {
        match self.last {
            Some(last) => last.wrapping_add(self.increment),
            None => self.base,
        }
    }

    /// End of the block starting at the next value.
    fn reservation_end(&self) -> i64 {
        let span = self.increment.wrapping_mul(self.cache_size as i64);
        self.peek_next().wrapping_add(span)
    }

    fn issue(&mut self) -> i64 {
        let v = self.peek_next();
        self.last = Some(v);
        self.remaining = self.remaining.saturating_sub(1);
        v
    }

    /// Drop the current reservation. The next issued value triggers a write.
    fn discard_reservation(&mut self) {
        self.remaining = 0;
        self.persisted_base = self.peek_next();
    }
}

/// Where an altered sequence continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceRestart {
    /// Continue from the start marker.
    Start,
    With(i64),
}

/// Evaluated clauses of an ALTER SEQUENCE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceAlter {
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub restart: Option<SequenceRestart>,
}

fn check_increment(increment: i64) -> Result<()> {
    if increment == 0 {
        return Err(DbError::new_kind(
            ErrorKind::InvalidIncrement,
            "Sequence increment cannot be zero",
        ));
    }
    Ok(())
}

impl Sequence {
    pub fn try_new(
        key: ObjectKey,
        start: i64,
        increment: i64,
        cache_size: u64,
        belongs_to_table: bool,
    ) -> Result<Self> {
        check_increment(increment).map_err(|e| e.with_field("sequence", &key))?;
        if cache_size == 0 {
            return Err(
                DbError::new_kind(ErrorKind::InvalidValue, "Sequence cache size cannot be zero")
                    .with_field("sequence", &key),
            );
        }

        Ok(Sequence {
            key,
            belongs_to_table,
            state: Mutex::new(SequenceState {
                last: None,
                base: start,
                start,
                increment,
                cache_size,
                remaining: 0,
                persisted_base: start,
            }),
        })
    }

    /// Drop the in-memory counter and resume from a persisted record, as
    /// happens on restart.
    ///
    /// Issuing resumes at the persisted high water mark. Values reserved but
    /// never issued are skipped.
    pub fn reload(&self, record: &SequenceRecord) -> Result<()> {
        if record.key != self.key {
            return Err(DbError::new("Sequence record does not match sequence")
                .with_field("sequence", &self.key)
                .with_field("record", &record.key));
        }
        check_increment(record.increment).map_err(|e| e.with_field("sequence", &self.key))?;

        *self.state.lock() = SequenceState {
            last: None,
            base: record.base,
            start: record.start,
            increment: record.increment,
            cache_size: record.cache_size.max(1),
            remaining: 0,
            persisted_base: record.base,
        };
        debug!(sequence = %self.key, base = %record.base, "reloaded sequence");
        Ok(())
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn belongs_to_table(&self) -> bool {
        self.belongs_to_table
    }

    pub fn increment(&self) -> i64 {
        self.state.lock().increment
    }

    pub fn start_value(&self) -> i64 {
        self.state.lock().start
    }

    pub fn cache_size(&self) -> u64 {
        self.state.lock().cache_size
    }

    /// Last issued value.
    ///
    /// Before the first `next_value` this is one increment before the value
    /// that will be issued.
    pub fn current_value(&self) -> i64 {
        let state = self.state.lock();
        match state.last {
            Some(last) => last,
            None => state.base.wrapping_sub(state.increment),
        }
    }

    /// Issue the next value.
    ///
    /// Exhausting the reserved block persists a new high water mark and
    /// commits the system session before the value is returned.
    pub fn next_value(&self, system: &SystemSession) -> Result<i64> {
        {
            let mut state = self.state.lock();
            if state.remaining > 0 {
                let v = state.issue();
                trace!(sequence = %self.key, value = %v, "issued sequence value");
                return Ok(v);
            }
        }

        system.apply_and_commit(|tx| {
            let mut state = self.state.lock();
            if state.remaining == 0 {
                // Another session may have reserved while we waited on the
                // system session.
                let mut reserved = state.clone();
                reserved.persisted_base = state.reservation_end();
                reserved.remaining = reserved.cache_size;
                tx.write_record(self.record_from_state(&reserved))?;

                debug!(
                    sequence = %self.key,
                    high_water = %reserved.persisted_base,
                    "reserved sequence values"
                );
                *state = reserved;
            }
            let v = state.issue();
            trace!(sequence = %self.key, value = %v, "issued sequence value");
            Ok(v)
        })
    }

    /// Apply an ALTER SEQUENCE through the system session.
    ///
    /// Changes are validated and staged against a copy of the state. The
    /// in-memory counter only moves once the record has been staged, so a
    /// rejected alter leaves both untouched.
    pub fn alter(&self, system: &SystemSession, changes: &SequenceAlter) -> Result<()> {
        if let Some(increment) = changes.increment {
            check_increment(increment).map_err(|e| e.with_field("sequence", &self.key))?;
        }

        system.apply_and_commit(|tx| {
            let mut state = self.state.lock();
            let mut next = state.clone();

            if let Some(increment) = changes.increment {
                next.increment = increment;
                next.discard_reservation();
            }
            // The start marker is not retroactive, only a later plain
            // restart uses it.
            if let Some(start) = changes.start {
                next.start = start;
            }
            if let Some(restart) = changes.restart {
                next.last = None;
                next.base = match restart {
                    SequenceRestart::Start => next.start,
                    SequenceRestart::With(value) => value,
                };
                next.discard_reservation();
            }

            tx.write_record(self.record_from_state(&next))?;
            debug!(sequence = %self.key, next = %next.peek_next(), "staged sequence alter");
            *state = next;
            Ok(())
        })
    }

    fn record_from_state(&self, state: &SequenceState) -> CatalogRecord {
        CatalogRecord::Sequence(SequenceRecord {
            key: self.key.clone(),
            start: state.start,
            increment: state.increment,
            cache_size: state.cache_size,
            base: state.persisted_base,
            belongs_to_table: self.belongs_to_table,
        })
    }
}

impl CatalogObject for Sequence {
    fn catalog_record(&self) -> CatalogRecord {
        let state = self.state.lock();
        self.record_from_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::catalog::system_session::sequence_storage_key;

    fn seq(start: i64, increment: i64, cache_size: u64) -> Sequence {
        Sequence::try_new(
            ObjectKey::new("PUBLIC", "SEQ"),
            start,
            increment,
            cache_size,
            false,
        )
        .unwrap()
    }

    fn persisted_base(sys: &SystemSession) -> i64 {
        sys.read_record(&sequence_storage_key(&ObjectKey::new("PUBLIC", "SEQ")))
            .unwrap()
            .unwrap()
            .try_into_sequence()
            .unwrap()
            .base
    }

    #[test]
    fn first_value_is_start() {
        let sys = SystemSession::default();
        let s = seq(1, 1, DEFAULT_CACHE_SIZE);
        assert_eq!(0, s.current_value());
        assert_eq!(1, s.next_value(&sys).unwrap());
        assert_eq!(2, s.next_value(&sys).unwrap());
        assert_eq!(2, s.current_value());
    }

    #[test]
    fn arithmetic_progression() {
        let sys = SystemSession::default();
        for increment in [1, 3, -2, 7] {
            let s = seq(10, increment, 4);
            let values: Vec<_> = (0..20).map(|_| s.next_value(&sys).unwrap()).collect();
            for pair in values.windows(2) {
                assert_eq!(increment, pair[1] - pair[0]);
            }
            assert_eq!(10, values[0]);
        }
    }

    fn alter(
        sys: &SystemSession,
        s: &Sequence,
        start: Option<i64>,
        increment: Option<i64>,
        restart: Option<SequenceRestart>,
    ) -> Result<()> {
        s.alter(
            sys,
            &SequenceAlter {
                start,
                increment,
                restart,
            },
        )
    }

    #[test]
    fn zero_increment_rejected() {
        let sys = SystemSession::default();
        let s = seq(1, 2, 4);
        s.next_value(&sys).unwrap();
        let version = sys.version();

        let err = alter(&sys, &s, None, Some(0), Some(SequenceRestart::With(50))).unwrap_err();
        assert_eq!(ErrorKind::InvalidIncrement, err.kind());
        assert_eq!(2, s.increment());
        assert_eq!(version, sys.version());
        assert_eq!(3, s.next_value(&sys).unwrap());

        let err = Sequence::try_new(ObjectKey::new("PUBLIC", "X"), 1, 0, 1, false).unwrap_err();
        assert_eq!(ErrorKind::InvalidIncrement, err.kind());
    }

    #[test]
    fn alter_increment_applies_to_future_values() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 4);
        assert_eq!(1, s.next_value(&sys).unwrap());
        assert_eq!(2, s.next_value(&sys).unwrap());
        alter(&sys, &s, None, Some(10), None).unwrap();
        assert_eq!(12, s.next_value(&sys).unwrap());
        assert_eq!(22, s.next_value(&sys).unwrap());
    }

    #[test]
    fn start_marker_is_not_retroactive() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 4);
        s.next_value(&sys).unwrap();
        alter(&sys, &s, Some(100), None, None).unwrap();
        assert_eq!(100, s.start_value());
        assert_eq!(2, s.next_value(&sys).unwrap());

        alter(&sys, &s, None, None, Some(SequenceRestart::Start)).unwrap();
        assert_eq!(100, s.next_value(&sys).unwrap());

        alter(&sys, &s, None, None, Some(SequenceRestart::With(5))).unwrap();
        assert_eq!(5, s.next_value(&sys).unwrap());
    }

    #[test]
    fn alter_record_matches_memory() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 4);
        s.next_value(&sys).unwrap();

        alter(&sys, &s, Some(7), Some(3), Some(SequenceRestart::Start)).unwrap();
        let record = sys
            .read_record(&sequence_storage_key(s.key()))
            .unwrap()
            .unwrap()
            .try_into_sequence()
            .unwrap();
        assert_eq!(7, record.start);
        assert_eq!(3, record.increment);
        assert_eq!(7, record.base);
        assert_eq!(4, s.current_value());
        assert_eq!(7, s.next_value(&sys).unwrap());
    }

    #[test]
    fn persists_only_when_block_exhausted() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 3);

        s.next_value(&sys).unwrap();
        assert_eq!(1, sys.version());
        assert_eq!(4, persisted_base(&sys));

        s.next_value(&sys).unwrap();
        s.next_value(&sys).unwrap();
        assert_eq!(1, sys.version());

        assert_eq!(4, s.next_value(&sys).unwrap());
        assert_eq!(2, sys.version());
        assert_eq!(7, persisted_base(&sys));
    }

    #[test]
    fn reload_never_reissues() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 5);
        let issued: Vec<_> = (0..7).map(|_| s.next_value(&sys).unwrap()).collect();

        let record = sys
            .read_record(&sequence_storage_key(s.key()))
            .unwrap()
            .unwrap()
            .try_into_sequence()
            .unwrap();
        s.reload(&record).unwrap();
        let next = s.next_value(&sys).unwrap();
        assert!(issued.iter().all(|v| *v < next));
        assert_eq!(11, next);
    }

    #[test]
    fn overflow_wraps() {
        let sys = SystemSession::default();
        let s = seq(i64::MAX, 1, 2);
        assert_eq!(i64::MAX, s.next_value(&sys).unwrap());
        assert_eq!(i64::MIN, s.next_value(&sys).unwrap());
    }

    #[test]
    fn concurrent_values_distinct() {
        let sys = SystemSession::default();
        let s = seq(1, 1, 4);

        let all: Vec<i64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..250)
                            .map(|_| s.next_value(&sys).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let distinct: HashSet<_> = all.iter().copied().collect();
        assert_eq!(1000, distinct.len());
        assert_eq!(1000, s.current_value());
    }
}

//! Session-scoped attendance dedup on top of the store.
//!
//! Guarantees at most one attendance record per student per calendar day.
//! The in-memory presence set short-circuits repeat detections within a
//! session; the store check covers earlier sessions the same day. The set
//! belongs to one calendar day and is cleared when a timestamp from a later
//! day arrives, so a session running past midnight marks people again. The
//! read-then-write pair is not atomic, so a single ledger must be the only
//! writer.

use crate::store::{AttendanceRecord, AttendanceStatus, AttendanceStore, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("student lookup for {name} failed: {source}")]
    Lookup { name: String, source: StoreError },
    #[error("attendance write for {name} failed: {source}")]
    Write { name: String, source: StoreError },
}

/// What [`AttendanceLedger::try_mark_present`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Already in this session's presence set; the store was not touched.
    AlreadyPresent,
    /// No student row has this name. Nothing written.
    UnknownStudent,
    /// A record for today already exists (e.g. from an earlier session).
    AlreadyRecorded { student_id: i64 },
    /// A new record was inserted and committed.
    Marked { student_id: i64, record_id: i64 },
}

pub struct AttendanceLedger<S> {
    store: S,
    present: HashSet<String>,
    /// Day the presence set refers to.
    day: Option<NaiveDate>,
}

impl<S: AttendanceStore> AttendanceLedger<S> {
    /// Start a session with an empty presence set.
    pub fn new(store: S) -> Self {
        Self {
            store,
            present: HashSet::new(),
            day: None,
        }
    }

    /// Record `name` as present on the calendar day of `timestamp`, at most
    /// once per day.
    ///
    /// On error the name is left out of the presence set, so the next
    /// detection retries.
    pub fn try_mark_present(
        &mut self,
        name: &str,
        timestamp: NaiveDateTime,
    ) -> Result<MarkOutcome, LedgerError> {
        let day = timestamp.date();
        if self.day != Some(day) {
            if !self.present.is_empty() {
                tracing::info!(%day, cleared = self.present.len(), "new day; presence reset");
            }
            self.present.clear();
            self.day = Some(day);
        }

        if self.present.contains(name) {
            return Ok(MarkOutcome::AlreadyPresent);
        }

        let lookup_err = |source| LedgerError::Lookup {
            name: name.to_string(),
            source,
        };

        let Some(student_id) = self.store.find_student_id(name).map_err(lookup_err)? else {
            tracing::warn!(name, "recognized face has no student record; skipping");
            return Ok(MarkOutcome::UnknownStudent);
        };

        if self
            .store
            .has_record_on(student_id, day)
            .map_err(lookup_err)?
        {
            tracing::info!(name, student_id, %day, "already recorded today");
            self.present.insert(name.to_string());
            return Ok(MarkOutcome::AlreadyRecorded { student_id });
        }

        let record = AttendanceRecord {
            student_id,
            timestamp,
            status: AttendanceStatus::Present,
        };
        let record_id = self
            .store
            .insert_record(&record)
            .map_err(|source| LedgerError::Write {
                name: name.to_string(),
                source,
            })?;

        self.present.insert(name.to_string());
        tracing::info!(
            name,
            student_id,
            record_id,
            time = %timestamp.format("%H:%M:%S"),
            "attendance marked"
        );
        Ok(MarkOutcome::Marked {
            student_id,
            record_id,
        })
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    /// Number of identities marked present this session.
    pub fn present_count(&self) -> usize {
        self.present.len()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// End the session, dropping the presence set.
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ReportRow, SqliteStore, TIMESTAMP_FORMAT};
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn sqlite_with(students: &[(&str, &str)]) -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        for (name, enrollment) in students {
            store.add_student(name, enrollment).unwrap();
        }
        store
    }

    fn rows_on(store: &SqliteStore, day: &str) -> Vec<ReportRow> {
        store
            .records_on(NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap())
            .unwrap()
    }

    /// Wraps a real store, counting calls and optionally failing inserts.
    struct ProbeStore {
        inner: SqliteStore,
        lookups: Cell<usize>,
        inserts: usize,
        failing_inserts: usize,
    }

    impl ProbeStore {
        fn new(inner: SqliteStore) -> Self {
            Self {
                inner,
                lookups: Cell::new(0),
                inserts: 0,
                failing_inserts: 0,
            }
        }
    }

    impl AttendanceStore for ProbeStore {
        fn find_student_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.find_student_id(name)
        }

        fn has_record_on(&self, student_id: i64, day: NaiveDate) -> Result<bool, StoreError> {
            self.inner.has_record_on(student_id, day)
        }

        fn insert_record(&mut self, record: &AttendanceRecord) -> Result<i64, StoreError> {
            self.inserts += 1;
            if self.failing_inserts > 0 {
                self.failing_inserts -= 1;
                return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.inner.insert_record(record)
        }

        fn records_on(&self, day: NaiveDate) -> Result<Vec<ReportRow>, StoreError> {
            self.inner.records_on(day)
        }
    }

    #[test]
    fn test_first_detection_writes_record() {
        let mut ledger = AttendanceLedger::new(sqlite_with(&[("Alice", "E001")]));
        let outcome = ledger
            .try_mark_present("Alice", at("2026-03-02 09:00:03"))
            .unwrap();
        assert!(matches!(outcome, MarkOutcome::Marked { .. }));
        assert!(ledger.is_present("Alice"));

        let rows = rows_on(ledger.store(), "2026-03-02");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2026-03-02 09:00:03");
        assert_eq!(rows[0].status, "Present");
    }

    #[test]
    fn test_repeat_detection_skips_store() {
        let mut ledger = AttendanceLedger::new(ProbeStore::new(sqlite_with(&[("Alice", "E001")])));
        ledger
            .try_mark_present("Alice", at("2026-03-02 09:00:03"))
            .unwrap();
        for second in 4..10 {
            let ts = at(&format!("2026-03-02 09:00:0{second}"));
            assert_eq!(
                ledger.try_mark_present("Alice", ts).unwrap(),
                MarkOutcome::AlreadyPresent
            );
        }
        assert_eq!(ledger.store().lookups.get(), 1);
        assert_eq!(ledger.store().inserts, 1);
    }

    #[test]
    fn test_earlier_session_same_day_is_respected() {
        let mut first = AttendanceLedger::new(sqlite_with(&[("Alice", "E001")]));
        first
            .try_mark_present("Alice", at("2026-03-02 08:00:00"))
            .unwrap();
        let store = first.into_store();

        let mut second = AttendanceLedger::new(ProbeStore::new(store));
        assert!(!second.is_present("Alice"));
        let outcome = second
            .try_mark_present("Alice", at("2026-03-02 13:30:00"))
            .unwrap();
        assert!(matches!(outcome, MarkOutcome::AlreadyRecorded { .. }));
        assert!(second.is_present("Alice"));
        assert_eq!(second.store().inserts, 0);
        assert_eq!(rows_on(&second.store().inner, "2026-03-02").len(), 1);
    }

    #[test]
    fn test_new_day_gets_new_record() {
        let mut ledger = AttendanceLedger::new(sqlite_with(&[("Alice", "E001")]));
        ledger
            .try_mark_present("Alice", at("2026-03-02 08:00:00"))
            .unwrap();
        let store = ledger.into_store();

        let mut next_day = AttendanceLedger::new(store);
        let outcome = next_day
            .try_mark_present("Alice", at("2026-03-03 08:00:00"))
            .unwrap();
        assert!(matches!(outcome, MarkOutcome::Marked { .. }));
        assert_eq!(rows_on(next_day.store(), "2026-03-03").len(), 1);
    }

    #[test]
    fn test_session_across_midnight_marks_new_day() {
        let mut ledger = AttendanceLedger::new(sqlite_with(&[("Alice", "E001")]));
        let before = ledger
            .try_mark_present("Alice", at("2026-03-02 23:59:59"))
            .unwrap();
        assert!(matches!(before, MarkOutcome::Marked { .. }));

        let after = ledger
            .try_mark_present("Alice", at("2026-03-03 00:00:05"))
            .unwrap();
        assert!(matches!(after, MarkOutcome::Marked { .. }));
        assert_eq!(
            ledger
                .try_mark_present("Alice", at("2026-03-03 00:00:09"))
                .unwrap(),
            MarkOutcome::AlreadyPresent
        );

        assert_eq!(rows_on(ledger.store(), "2026-03-02").len(), 1);
        assert_eq!(rows_on(ledger.store(), "2026-03-03").len(), 1);
        assert_eq!(ledger.present_count(), 1);
    }

    #[test]
    fn test_unknown_student_is_noop() {
        let mut ledger = AttendanceLedger::new(sqlite_with(&[("Alice", "E001")]));
        let outcome = ledger
            .try_mark_present("Carol", at("2026-03-02 09:00:00"))
            .unwrap();
        assert_eq!(outcome, MarkOutcome::UnknownStudent);
        assert!(!ledger.is_present("Carol"));
        assert!(rows_on(ledger.store(), "2026-03-02").is_empty());
    }

    #[test]
    fn test_failed_write_retries_on_next_detection() {
        let mut store = ProbeStore::new(sqlite_with(&[("Alice", "E001")]));
        store.failing_inserts = 1;
        let mut ledger = AttendanceLedger::new(store);

        let err = ledger
            .try_mark_present("Alice", at("2026-03-02 09:00:00"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Write { ref name, .. } if name == "Alice"));
        assert!(!ledger.is_present("Alice"));

        let outcome = ledger
            .try_mark_present("Alice", at("2026-03-02 09:00:01"))
            .unwrap();
        assert!(matches!(outcome, MarkOutcome::Marked { .. }));
        assert_eq!(ledger.store().inserts, 2);
        assert_eq!(rows_on(&ledger.store().inner, "2026-03-02").len(), 1);
    }

    #[test]
    fn test_lookup_failure_is_reported() {
        // No schema: every query fails.
        let store = SqliteStore::open_in_memory().unwrap();
        let mut ledger = AttendanceLedger::new(store);
        let err = ledger
            .try_mark_present("Alice", at("2026-03-02 09:00:00"))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Lookup { .. }));
        assert_eq!(ledger.present_count(), 0);
    }
}

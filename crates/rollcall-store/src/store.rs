//! SQLite-backed student and attendance tables.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Storage format for `attendance.timestamp`; `date(timestamp)` in SQLite
/// yields the calendar day.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    enrollment_number TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY,
    student_id INTEGER,
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL,
    FOREIGN KEY (student_id) REFERENCES students (id)
);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("a student with enrollment number {0} already exists")]
    DuplicateEnrollment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
        }
    }
}

/// A row of `students`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub enrollment_number: String,
}

/// A new row of `attendance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub student_id: i64,
    pub timestamp: NaiveDateTime,
    pub status: AttendanceStatus,
}

/// One line of the daily report: attendance joined with its student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub enrollment_number: String,
    pub timestamp: String,
    pub status: String,
}

/// The narrow set of store operations the attendance pipeline performs.
pub trait AttendanceStore {
    /// Look up a student id by exact name.
    fn find_student_id(&self, name: &str) -> Result<Option<i64>, StoreError>;

    /// Whether any attendance record exists for the student on `day`.
    fn has_record_on(&self, student_id: i64, day: NaiveDate) -> Result<bool, StoreError>;

    /// Insert and commit one record, returning its row id.
    fn insert_record(&mut self, record: &AttendanceRecord) -> Result<i64, StoreError>;

    /// All records on `day` joined with student details, oldest first.
    fn records_on(&self, day: NaiveDate) -> Result<Vec<ReportRow>, StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened attendance database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create `students` and `attendance` if they do not exist.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Register a student; enrollment numbers must be unique.
    pub fn add_student(&mut self, name: &str, enrollment_number: &str) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM students WHERE enrollment_number = ?1",
                params![enrollment_number],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicateEnrollment(enrollment_number.to_string()));
        }

        tx.execute(
            "INSERT INTO students (name, enrollment_number) VALUES (?1, ?2)",
            params![name, enrollment_number],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(id, name, enrollment_number, "student registered");
        Ok(id)
    }

    pub fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, enrollment_number FROM students ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Student {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    enrollment_number: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Release the connection, surfacing any close error.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}

impl AttendanceStore for SqliteStore {
    fn find_student_id(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM students WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn has_record_on(&self, student_id: i64, day: NaiveDate) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM attendance WHERE student_id = ?1 AND date(timestamp) = ?2",
                params![student_id, day.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_record(&mut self, record: &AttendanceRecord) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO attendance (student_id, timestamp, status) VALUES (?1, ?2, ?3)",
            params![
                record.student_id,
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.status.as_str(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    fn records_on(&self, day: NaiveDate) -> Result<Vec<ReportRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name, s.enrollment_number, a.timestamp, a.status
             FROM attendance a
             JOIN students s ON s.id = a.student_id
             WHERE date(a.timestamp) = ?1
             ORDER BY a.timestamp",
        )?;
        let rows = stmt
            .query_map(params![day.format(DATE_FORMAT).to_string()], |row| {
                Ok(ReportRow {
                    name: row.get(0)?,
                    enrollment_number: row.get(1)?,
                    timestamp: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let store = store();
        store.init_schema().unwrap();
    }

    #[test]
    fn test_add_and_find_student() {
        let mut store = store();
        let id = store.add_student("Alice", "E001").unwrap();
        assert_eq!(store.find_student_id("Alice").unwrap(), Some(id));
        assert_eq!(store.find_student_id("alice").unwrap(), None);
    }

    #[test]
    fn test_duplicate_enrollment_rejected() {
        let mut store = store();
        store.add_student("Alice", "E001").unwrap();
        let err = store.add_student("Alicia", "E001").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEnrollment(ref n) if n == "E001"));
        assert_eq!(store.list_students().unwrap().len(), 1);
    }

    #[test]
    fn test_has_record_on_is_day_scoped() {
        let mut store = store();
        let id = store.add_student("Alice", "E001").unwrap();
        store
            .insert_record(&AttendanceRecord {
                student_id: id,
                timestamp: at("2026-03-02 08:59:01"),
                status: AttendanceStatus::Present,
            })
            .unwrap();

        assert!(store.has_record_on(id, day("2026-03-02")).unwrap());
        assert!(!store.has_record_on(id, day("2026-03-03")).unwrap());
        assert!(!store.has_record_on(id + 1, day("2026-03-02")).unwrap());
    }

    #[test]
    fn test_records_on_joins_and_orders() {
        let mut store = store();
        let alice = store.add_student("Alice", "E001").unwrap();
        let bob = store.add_student("Bob", "E002").unwrap();
        for (student_id, ts) in [
            (bob, "2026-03-02 09:10:00"),
            (alice, "2026-03-02 08:55:00"),
            (alice, "2026-03-01 09:00:00"),
        ] {
            store
                .insert_record(&AttendanceRecord {
                    student_id,
                    timestamp: at(ts),
                    status: AttendanceStatus::Present,
                })
                .unwrap();
        }

        let rows = store.records_on(day("2026-03-02")).unwrap();
        assert_eq!(
            rows,
            vec![
                ReportRow {
                    name: "Alice".into(),
                    enrollment_number: "E001".into(),
                    timestamp: "2026-03-02 08:55:00".into(),
                    status: "Present".into(),
                },
                ReportRow {
                    name: "Bob".into(),
                    enrollment_number: "E002".into(),
                    timestamp: "2026-03-02 09:10:00".into(),
                    status: "Present".into(),
                },
            ]
        );
    }

    #[test]
    fn test_records_on_without_schema_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.records_on(day("2026-03-02")),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("attendance.db");
        let store = SqliteStore::open(&path).unwrap();
        store.init_schema().unwrap();
        store.close().unwrap();
        assert!(path.exists());
    }
}

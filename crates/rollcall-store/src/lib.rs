//! rollcall-store — Attendance persistence.
//!
//! The [`AttendanceLedger`] is the only write path to attendance records:
//! it keeps the per-session presence set and guarantees at most one record
//! per student per calendar day. The [`ReportExporter`] reads a day back out
//! as CSV.

pub mod ledger;
pub mod report;
pub mod store;

pub use ledger::{AttendanceLedger, LedgerError, MarkOutcome};
pub use report::{ExportError, ExportOutcome, ReportExporter};
pub use store::{
    AttendanceRecord, AttendanceStatus, AttendanceStore, ReportRow, SqliteStore, StoreError,
    Student, TIMESTAMP_FORMAT,
};

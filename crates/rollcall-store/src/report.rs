//! Daily attendance report as CSV.

use crate::store::{AttendanceStore, ReportRow, StoreError};
use chrono::NaiveDate;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const REPORT_HEADER: [&str; 4] = ["name", "enrollment_number", "timestamp", "status"];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("could not query attendance records: {0}")]
    Query(#[from] StoreError),
    #[error("could not write report {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    /// No records for the day; no file was created.
    NoRecords,
}

/// Writes `Attendance_Report_<YYYY-MM-DD>.csv` into a directory.
#[derive(Debug, Clone)]
pub struct ReportExporter {
    out_dir: PathBuf,
}

impl ReportExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Report path for `day`.
    pub fn report_path(&self, day: NaiveDate) -> PathBuf {
        self.out_dir
            .join(format!("Attendance_Report_{}.csv", day.format("%Y-%m-%d")))
    }

    /// Export all of `day`'s records, ordered by timestamp.
    pub fn export(
        &self,
        store: &impl AttendanceStore,
        day: NaiveDate,
    ) -> Result<ExportOutcome, ExportError> {
        let rows = store.records_on(day)?;
        if rows.is_empty() {
            tracing::info!(%day, "no attendance records for the day; report not written");
            return Ok(ExportOutcome::NoRecords);
        }

        let path = self.report_path(day);
        write_csv(&path, &rows).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), rows = rows.len(), "attendance report saved");
        Ok(ExportOutcome::Written {
            path,
            rows: rows.len(),
        })
    }
}

fn write_csv(path: &Path, rows: &[ReportRow]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = io::BufWriter::new(fs::File::create(path)?);
    write_record(&mut out, &REPORT_HEADER)?;
    for row in rows {
        write_record(
            &mut out,
            &[
                row.name.as_str(),
                row.enrollment_number.as_str(),
                row.timestamp.as_str(),
                row.status.as_str(),
            ],
        )?;
    }
    out.flush()
}

fn write_record(out: &mut impl Write, fields: &[&str]) -> io::Result<()> {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    writeln!(out, "{}", line.join(","))
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AttendanceRecord, AttendanceStatus, SqliteStore, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        let bob = store.add_student("Bob", "E002").unwrap();
        let ann = store.add_student("Smith, Ann", "E003").unwrap();
        for (student_id, ts) in [(bob, "2026-03-02 09:10:00"), (ann, "2026-03-02 08:45:12")] {
            store
                .insert_record(&AttendanceRecord {
                    student_id,
                    timestamp: NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).unwrap(),
                    status: AttendanceStatus::Present,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_report_name_embeds_date() {
        let exporter = ReportExporter::new("/var/reports");
        assert_eq!(
            exporter.report_path(day("2026-03-02")),
            PathBuf::from("/var/reports/Attendance_Report_2026-03-02.csv")
        );
    }

    #[test]
    fn test_export_writes_ordered_csv() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path());
        let outcome = exporter.export(&seeded(), day("2026-03-02")).unwrap();

        let path = exporter.report_path(day("2026-03-02"));
        assert_eq!(
            outcome,
            ExportOutcome::Written {
                path: path.clone(),
                rows: 2
            }
        );
        let csv = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            csv,
            "name,enrollment_number,timestamp,status\n\
             \"Smith, Ann\",E003,2026-03-02 08:45:12,Present\n\
             Bob,E002,2026-03-02 09:10:00,Present\n"
        );
    }

    #[test]
    fn test_export_empty_day_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ReportExporter::new(dir.path());
        let outcome = exporter.export(&seeded(), day("2026-03-03")).unwrap();
        assert_eq!(outcome, ExportOutcome::NoRecords);
        assert!(!exporter.report_path(day("2026-03-03")).exists());
    }

    #[test]
    fn test_export_query_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let err = ReportExporter::new(dir.path())
            .export(&store, day("2026-03-02"))
            .unwrap_err();
        assert!(matches!(err, ExportError::Query(_)));
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

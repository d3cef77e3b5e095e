//! The recognition-and-dedup loop.
//!
//! One thread reads a frame, optionally runs detection and matching on it,
//! renders it with the latest results, and checks for quit. Match results
//! change only on processed frames; frames in between are rendered with
//! the previous snapshot. Whatever ends the loop, the session report is
//! exported exactly once, since [`Pipeline::run`] consumes the pipeline.

use crate::sink::FrameSink;
use chrono::NaiveDateTime;
use rollcall_core::{
    FaceEncoder, FrameSampler, Gallery, Identity, MatchResult, Matcher, ScaleTransform,
    VoteMatcher,
};
use rollcall_hw::{Frame, FrameSource};
use rollcall_store::{AttendanceLedger, AttendanceStore, ExportOutcome, MarkOutcome, ReportExporter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wall-clock source for attendance timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    FrameBudgetReached,
    SourceEnded(String),
}

/// Result of the end-of-session export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Written { path: PathBuf, rows: usize },
    NoRecords,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_seen: u64,
    pub frames_processed: u64,
    /// New attendance records written this session.
    pub records_written: usize,
    /// Identities in the presence set at shutdown.
    pub present: usize,
    pub stop_reason: StopReason,
    pub report: ReportStatus,
}

/// Everything the loop needs besides its capabilities.
pub struct PipelineSettings {
    pub sampler: FrameSampler,
    pub transform: ScaleTransform,
    pub matcher: VoteMatcher,
    pub exporter: ReportExporter,
    pub max_frames: Option<u64>,
}

pub struct Pipeline<Src, Enc, St> {
    source: Src,
    encoder: Enc,
    gallery: Gallery,
    ledger: AttendanceLedger<St>,
    sink: Box<dyn FrameSink + Send>,
    clock: Box<dyn Clock + Send>,
    quit: Arc<AtomicBool>,
    settings: PipelineSettings,
    latest: Vec<MatchResult>,
    frames_processed: u64,
    records_written: usize,
}

impl<Src, Enc, St> Pipeline<Src, Enc, St>
where
    Src: FrameSource,
    Enc: FaceEncoder,
    St: AttendanceStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Src,
        encoder: Enc,
        gallery: Gallery,
        store: St,
        sink: Box<dyn FrameSink + Send>,
        clock: Box<dyn Clock + Send>,
        quit: Arc<AtomicBool>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            encoder,
            gallery,
            ledger: AttendanceLedger::new(store),
            sink,
            clock,
            quit,
            settings,
            latest: Vec::new(),
            frames_processed: 0,
            records_written: 0,
        }
    }

    /// Run until quit or end of stream, then export the day's report.
    ///
    /// Returns the session summary and the store, so the caller can close it.
    pub fn run(mut self) -> (SessionSummary, St) {
        tracing::info!(
            skip_interval = self.settings.sampler.skip_interval(),
            scale = self.settings.transform.factor(),
            tolerance = self.settings.matcher.tolerance(),
            gallery = self.gallery.len(),
            "pipeline running"
        );

        let stop_reason = loop {
            let frame = match self.source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to grab frame; ending session");
                    break StopReason::SourceEnded(e.to_string());
                }
            };

            if self.settings.sampler.tick() {
                self.process(&frame);
            }
            self.render(&frame);

            if self.quit.load(Ordering::Relaxed) {
                break StopReason::QuitRequested;
            }
            if let Some(budget) = self.settings.max_frames {
                if self.settings.sampler.frame_count() >= budget {
                    break StopReason::FrameBudgetReached;
                }
            }
        };

        self.shutdown(stop_reason)
    }

    fn process(&mut self, frame: &Frame) {
        self.frames_processed += 1;
        let small = self.settings.transform.downscale(&frame.image);

        let detections = match self.encoder.detect_and_encode(&small) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(
                    frame = self.settings.sampler.frame_count(),
                    error = %e,
                    "detection failed; keeping previous results"
                );
                return;
            }
        };

        let mut results = Vec::with_capacity(detections.len());
        for detection in detections {
            let identity = self.settings.matcher.identify(&detection.embedding, &self.gallery);
            if let Identity::Known(name) = &identity {
                self.mark_present(name);
            }
            results.push(MatchResult {
                bounding_box: self.settings.transform.to_display(
                    detection.bounding_box,
                    frame.width(),
                    frame.height(),
                ),
                identity,
            });
        }

        tracing::debug!(
            frame = self.settings.sampler.frame_count(),
            sequence = frame.sequence,
            faces = results.len(),
            "processed frame"
        );
        self.latest = results;
    }

    fn mark_present(&mut self, name: &str) {
        match self.ledger.try_mark_present(name, self.clock.now()) {
            Ok(MarkOutcome::Marked { .. }) => self.records_written += 1,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "attendance not recorded; will retry"),
        }
    }

    fn render(&mut self, frame: &Frame) {
        let status = format!(
            "Frame {} | Present: {}",
            self.settings.sampler.frame_count(),
            self.ledger.present_count()
        );
        if let Err(e) = self.sink.present(frame, &self.latest, &status) {
            tracing::warn!(error = %e, "display sink failed");
        }
    }

    fn shutdown(self, stop_reason: StopReason) -> (SessionSummary, St) {
        tracing::info!(reason = ?stop_reason, "session ended; generating final report");

        let day = self.clock.now().date();
        let report = match self.settings.exporter.export(self.ledger.store(), day) {
            Ok(ExportOutcome::Written { path, rows }) => ReportStatus::Written { path, rows },
            Ok(ExportOutcome::NoRecords) => ReportStatus::NoRecords,
            Err(e) => {
                tracing::error!(error = %e, "could not export attendance report");
                ReportStatus::Failed(e.to_string())
            }
        };

        let summary = SessionSummary {
            frames_seen: self.settings.sampler.frame_count(),
            frames_processed: self.frames_processed,
            records_written: self.records_written,
            present: self.ledger.present_count(),
            stop_reason,
            report,
        };
        // Source, encoder, and sink are released here; the store goes back
        // to the caller.
        (summary, self.ledger.into_store())
    }
}

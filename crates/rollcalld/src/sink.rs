//! Display sinks that receive every frame with the current overlay.

use crate::overlay::Overlay;
use rollcall_core::MatchResult;
use rollcall_hw::Frame;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to write snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Rendering surface for annotated frames.
pub trait FrameSink {
    fn present(
        &mut self,
        frame: &Frame,
        results: &[MatchResult],
        status: &str,
    ) -> Result<(), SinkError>;
}

/// Discards frames (headless operation).
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _: &Frame, _: &[MatchResult], _: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Overwrites a PNG with the annotated frame every `every` frames.
pub struct SnapshotSink {
    path: PathBuf,
    every: u64,
    overlay: Overlay,
    presented: u64,
}

impl SnapshotSink {
    pub fn new(path: PathBuf, every: u64, overlay: Overlay) -> Self {
        Self {
            path,
            every: every.max(1),
            overlay,
            presented: 0,
        }
    }
}

impl FrameSink for SnapshotSink {
    fn present(
        &mut self,
        frame: &Frame,
        results: &[MatchResult],
        status: &str,
    ) -> Result<(), SinkError> {
        self.presented += 1;
        if self.presented % self.every != 0 {
            return Ok(());
        }
        let annotated = self.overlay.annotate(&frame.image, results, status);
        annotated
            .save_with_format(&self.path, image::ImageFormat::Png)
            .map_err(|source| SinkError::Snapshot {
                path: self.path.clone(),
                source,
            })
    }
}

use crate::frame::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("end of stream")]
    EndOfStream,
    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// A sequence of frames produced on demand.
///
/// Any error ends the session: the pipeline treats a failed read as the
/// end of the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, FrameSourceError>;
}

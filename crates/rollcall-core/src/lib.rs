//! rollcall-core — Face gallery, identity matching, and frame sampling.
//!
//! Detection and embedding run through SCRFD and ArcFace on ONNX Runtime,
//! behind the [`FaceEncoder`] capability so the pipeline can be driven by
//! any encoder.

pub mod detector;
pub mod encoder;
pub mod gallery;
pub mod matcher;
pub mod recognizer;
pub mod sampling;
pub mod types;

use std::path::PathBuf;

pub use encoder::{EncoderError, FaceEncoder, OnnxFaceEncoder};
pub use gallery::{Gallery, GalleryError};
pub use matcher::{Matcher, VoteMatcher, DEFAULT_MATCH_TOLERANCE};
pub use sampling::{FrameSampler, SamplingError, ScaleTransform};
pub use types::{BoundingBox, Detection, Embedding, GalleryEntry, Identity, MatchResult};

/// SCRFD detection model file name.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/rollcall/models`, falling back
/// to `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
        .join("models")
}

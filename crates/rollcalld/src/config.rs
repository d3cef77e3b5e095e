use rollcall_core::matcher::DEFAULT_MATCH_TOLERANCE;
use rollcall_core::sampling::{DEFAULT_SCALE_FACTOR, DEFAULT_SKIP_INTERVAL};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key}={value} is not a valid value")]
    Invalid { key: &'static str, value: String },
}

/// Daemon configuration, loaded from `ROLLCALL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Gallery artifact produced by `rollcall gallery build`.
    pub gallery_path: PathBuf,
    /// SQLite database holding `students` and `attendance`.
    pub db_path: PathBuf,
    /// Where the end-of-session CSV report goes.
    pub report_dir: PathBuf,
    /// Run detection on every Nth frame.
    pub skip_interval: u32,
    /// Linear downscale applied before detection.
    pub scale_factor: f32,
    /// Maximum embedding distance that counts as a gallery match.
    pub match_tolerance: f32,
    /// If set, annotated frames are written here as PNG.
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_every: u64,
    /// TrueType font for on-frame labels; boxes only when unset.
    pub font_path: Option<PathBuf>,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = |key: &str| lookup(key).map(PathBuf::from);

        Ok(Self {
            camera_device: lookup("ROLLCALL_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            camera_width: parse(&lookup, "ROLLCALL_CAMERA_WIDTH", 640)?,
            camera_height: parse(&lookup, "ROLLCALL_CAMERA_HEIGHT", 480)?,
            model_dir: path("ROLLCALL_MODEL_DIR").unwrap_or_else(rollcall_core::default_model_dir),
            gallery_path: path("ROLLCALL_GALLERY_PATH")
                .unwrap_or_else(|| PathBuf::from("encodings.json")),
            db_path: path("ROLLCALL_DB_PATH").unwrap_or_else(|| PathBuf::from("attendance.db")),
            report_dir: path("ROLLCALL_REPORT_DIR").unwrap_or_else(|| PathBuf::from(".")),
            skip_interval: parse(&lookup, "ROLLCALL_SKIP_INTERVAL", DEFAULT_SKIP_INTERVAL)?,
            scale_factor: parse(&lookup, "ROLLCALL_SCALE_FACTOR", DEFAULT_SCALE_FACTOR)?,
            match_tolerance: parse(&lookup, "ROLLCALL_MATCH_TOLERANCE", DEFAULT_MATCH_TOLERANCE)?,
            snapshot_path: path("ROLLCALL_SNAPSHOT_PATH"),
            snapshot_every: parse(&lookup, "ROLLCALL_SNAPSHOT_EVERY", 15)?,
            font_path: path("ROLLCALL_FONT_PATH"),
            max_frames: parse_opt(&lookup, "ROLLCALL_MAX_FRAMES")?,
        })
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

use anyhow::{Context, Result};
use rollcall_core::{FrameSampler, Gallery, OnnxFaceEncoder, ScaleTransform, VoteMatcher};
use rollcall_hw::Camera;
use rollcall_store::{ReportExporter, SqliteStore};
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod overlay;
mod pipeline;
mod sink;

use config::Config;
use overlay::Overlay;
use pipeline::{
    Pipeline, PipelineSettings, ReportStatus, SessionSummary, StopReason, SystemClock,
};
use sink::{FrameSink, NullSink, SnapshotSink};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "rollcalld failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    tracing::info!("rollcalld starting");

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        camera = %config.camera_device,
        gallery = %config.gallery_path.display(),
        db = %config.db_path.display(),
        model_dir = %config.model_dir.display(),
        "configuration loaded"
    );

    let quit = Arc::new(AtomicBool::new(false));
    spawn_quit_listeners(quit.clone());

    // Camera and model handles stay on the blocking thread for their whole
    // lifetime.
    let summary = tokio::task::spawn_blocking(move || run_session(config, quit))
        .await
        .context("pipeline thread panicked")??;

    match &summary.stop_reason {
        StopReason::QuitRequested => tracing::info!("stopped on request"),
        StopReason::FrameBudgetReached => tracing::info!("frame budget reached"),
        StopReason::SourceEnded(reason) => tracing::warn!(%reason, "camera stream ended"),
    }
    match &summary.report {
        ReportStatus::Written { path, rows } => {
            tracing::info!(path = %path.display(), rows, "report written");
        }
        ReportStatus::NoRecords => tracing::info!("no attendance today; no report"),
        ReportStatus::Failed(reason) => tracing::error!(%reason, "report export failed"),
    }
    tracing::info!(
        frames = summary.frames_seen,
        processed = summary.frames_processed,
        marked = summary.records_written,
        present = summary.present,
        "rollcalld shutting down"
    );

    Ok(())
}

/// Startup, run, and teardown. Any startup failure aborts before the loop.
fn run_session(config: Config, quit: Arc<AtomicBool>) -> Result<SessionSummary> {
    let gallery = Gallery::load(&config.gallery_path).context("failed to load gallery")?;
    if gallery.is_empty() {
        tracing::warn!("gallery is empty; every face will be Unknown");
    }

    let sampler = FrameSampler::new(config.skip_interval).context("invalid skip interval")?;
    let transform = ScaleTransform::new(config.scale_factor).context("invalid scale factor")?;

    let encoder = OnnxFaceEncoder::load(&config.scrfd_model_path(), &config.arcface_model_path())
        .context("failed to load face models")?;

    let camera = Camera::open(&config.camera_device, config.camera_width, config.camera_height)
        .with_context(|| format!("could not open camera {}", config.camera_device))?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        "camera opened"
    );

    let store = SqliteStore::open(&config.db_path).context("failed to open database")?;
    store.init_schema().context("failed to initialize schema")?;

    let sink = build_sink(&config)?;

    let pipeline = Pipeline::new(
        camera,
        encoder,
        gallery,
        store,
        sink,
        Box::new(SystemClock),
        quit,
        PipelineSettings {
            sampler,
            transform,
            matcher: VoteMatcher::new(config.match_tolerance),
            exporter: ReportExporter::new(&config.report_dir),
            max_frames: config.max_frames,
        },
    );

    let (summary, store) = pipeline.run();
    if let Err(e) = store.close() {
        tracing::warn!(error = %e, "database did not close cleanly");
    }
    Ok(summary)
}

fn build_sink(config: &Config) -> Result<Box<dyn FrameSink + Send>> {
    let Some(path) = &config.snapshot_path else {
        tracing::info!("no snapshot path configured; running headless");
        return Ok(Box::new(NullSink));
    };

    let overlay = match &config.font_path {
        Some(font) => Overlay::with_font_file(font)
            .with_context(|| format!("failed to load font {}", font.display()))?,
        None => Overlay::new(),
    };
    tracing::info!(
        path = %path.display(),
        every = config.snapshot_every,
        "writing annotated snapshots"
    );
    Ok(Box::new(SnapshotSink::new(
        path.clone(),
        config.snapshot_every,
        overlay,
    )))
}

/// Ctrl-C, or a line reading `q` on stdin, requests a clean stop.
fn spawn_quit_listeners(quit: Arc<AtomicBool>) {
    let on_signal = quit.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            on_signal.store(true, Ordering::Relaxed);
        }
    });

    // Plain thread: a pending stdin read must not hold up runtime shutdown.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                tracing::info!("quit requested from console");
                quit.store(true, Ordering::Relaxed);
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_gallery_fails_before_opening_hardware() {
        let dir = tempfile::tempdir().unwrap();
        let gallery = dir.path().join("encodings.json");
        let db = dir.path().join("attendance.db");
        let config = Config::from_lookup(|key| match key {
            "ROLLCALL_GALLERY_PATH" => Some(gallery.display().to_string()),
            "ROLLCALL_DB_PATH" => Some(db.display().to_string()),
            "ROLLCALL_CAMERA_DEVICE" => Some("/dev/rollcall-missing".into()),
            _ => None,
        })
        .unwrap();

        let err = run_session(config, Arc::new(AtomicBool::new(false))).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("failed to load gallery"), "{message}");
        assert!(!db.exists());
    }
}

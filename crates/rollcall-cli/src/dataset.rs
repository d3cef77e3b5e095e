//! Gallery building from a directory of labelled face photos.

use anyhow::{Context, Result};
use rollcall_core::{FaceEncoder, Gallery, GalleryEntry};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A dataset image and the identity it enrolls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub encoded: usize,
    pub no_face: usize,
    pub unreadable: usize,
}

/// Identity name for a dataset file: everything before the first `.`.
pub fn identity_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Image files directly under `dir`, sorted by file name.
pub fn collect_samples(dir: &Path) -> Result<Vec<Sample>> {
    let mut samples = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("cannot read dataset directory {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || !has_image_extension(&path) {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "skipping non-UTF-8 file name");
            continue;
        };
        let name = identity_name(file_name);
        if name.is_empty() {
            tracing::warn!(path = %path.display(), "skipping file with empty identity name");
            continue;
        }
        samples.push(Sample {
            name: name.to_string(),
            path,
        });
    }
    samples.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(samples)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Encode each sample and keep the first face found in it.
pub fn build_gallery(
    encoder: &mut impl FaceEncoder,
    samples: &[Sample],
) -> Result<(Gallery, BuildStats)> {
    let mut entries = Vec::with_capacity(samples.len());
    let mut stats = BuildStats::default();

    for sample in samples {
        let image = match image::open(&sample.path) {
            Ok(image) => image.to_luma8(),
            Err(e) => {
                tracing::warn!(path = %sample.path.display(), error = %e, "cannot read image");
                stats.unreadable += 1;
                continue;
            }
        };

        let detections = encoder
            .detect_and_encode(&image)
            .with_context(|| format!("encoding {} failed", sample.path.display()))?;
        let Some(first) = detections.into_iter().next() else {
            tracing::warn!(path = %sample.path.display(), "no face found; skipping");
            stats.no_face += 1;
            continue;
        };

        tracing::info!(name = %sample.name, path = %sample.path.display(), "encoded");
        entries.push(GalleryEntry {
            identity_name: sample.name.clone(),
            embedding: first.embedding,
        });
        stats.encoded += 1;
    }

    Ok((Gallery::from_entries(entries)?, stats))
}

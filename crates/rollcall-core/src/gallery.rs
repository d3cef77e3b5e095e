//! Enrolled-face gallery and its on-disk artifact.
//!
//! The artifact is JSON with two index-aligned arrays:
//! `{"encodings": [[f32, ...], ...], "names": ["Alice", ...]}`.

use crate::types::{Embedding, GalleryEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery artifact not found: {0} — build one with `rollcall gallery build`")]
    NotFound(String),
    #[error("failed to read gallery artifact: {0}")]
    Io(#[from] io::Error),
    #[error("malformed gallery artifact: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("gallery has {encodings} encodings but {names} names")]
    LengthMismatch { encodings: usize, names: usize },
    #[error("encoding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GalleryArtifact {
    encodings: Vec<Vec<f32>>,
    names: Vec<String>,
}

/// Immutable set of enrolled samples, in artifact order.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    /// Build a gallery from entries, enforcing a single embedding dimension.
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Result<Self, GalleryError> {
        if let Some(first) = entries.first() {
            let expected = first.embedding.dim();
            for (index, entry) in entries.iter().enumerate() {
                if entry.embedding.dim() != expected {
                    return Err(GalleryError::DimensionMismatch {
                        index,
                        expected,
                        actual: entry.embedding.dim(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Load the gallery artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GalleryError> {
        let path = path.as_ref();
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GalleryError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let gallery = Self::from_json(&raw)?;

        tracing::info!(
            path = %path.display(),
            entries = gallery.len(),
            identities = gallery.identity_count(),
            "loaded gallery"
        );
        Ok(gallery)
    }

    fn from_json(raw: &[u8]) -> Result<Self, GalleryError> {
        let artifact: GalleryArtifact = serde_json::from_slice(raw)?;
        if artifact.encodings.len() != artifact.names.len() {
            return Err(GalleryError::LengthMismatch {
                encodings: artifact.encodings.len(),
                names: artifact.names.len(),
            });
        }

        let entries = artifact
            .names
            .into_iter()
            .zip(artifact.encodings)
            .map(|(identity_name, values)| GalleryEntry {
                identity_name,
                embedding: Embedding::new(values),
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Write the gallery as an artifact that [`Gallery::load`] accepts.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), GalleryError> {
        let artifact = GalleryArtifact {
            encodings: self
                .entries
                .iter()
                .map(|e| e.embedding.values.clone())
                .collect(),
            names: self
                .entries
                .iter()
                .map(|e| e.identity_name.clone())
                .collect(),
        };
        let json = serde_json::to_vec(&artifact)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct identity names.
    pub fn identity_count(&self) -> usize {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.identity_name.as_str())
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

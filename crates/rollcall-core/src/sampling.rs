//! Frame sampling and the processing/display coordinate transform.
//!
//! Only every Nth frame runs detection; every frame is rendered. Detection
//! runs on a downscaled copy and its boxes are mapped back with
//! [`ScaleTransform::to_display`].

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::GrayImage;
use thiserror::Error;

pub const DEFAULT_SKIP_INTERVAL: u32 = 3;
pub const DEFAULT_SCALE_FACTOR: f32 = 0.25;

#[derive(Error, Debug, PartialEq)]
pub enum SamplingError {
    #[error("skip interval must be at least 1, got {0}")]
    InvalidSkipInterval(u32),
    #[error("scale factor must be in (0, 1], got {0}")]
    InvalidScaleFactor(f32),
}

/// Decides which frames get full processing.
///
/// The counter is incremented before the test, so the first processed frame
/// is frame number `skip_interval` (1-based).
#[derive(Debug, Clone)]
pub struct FrameSampler {
    skip_interval: u32,
    frame_count: u64,
}

impl FrameSampler {
    pub fn new(skip_interval: u32) -> Result<Self, SamplingError> {
        if skip_interval == 0 {
            return Err(SamplingError::InvalidSkipInterval(skip_interval));
        }
        Ok(Self {
            skip_interval,
            frame_count: 0,
        })
    }

    /// Advance to the next frame; returns true if it should be processed.
    pub fn tick(&mut self) -> bool {
        self.frame_count += 1;
        self.frame_count % u64::from(self.skip_interval) == 0
    }

    /// Number of frames seen so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn skip_interval(&self) -> u32 {
        self.skip_interval
    }
}

/// Linear scale between display resolution and processing resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTransform {
    factor: f32,
}

impl ScaleTransform {
    pub fn new(factor: f32) -> Result<Self, SamplingError> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(SamplingError::InvalidScaleFactor(factor));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Processing-resolution size for a display-resolution frame (never zero).
    pub fn processing_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.factor).round() as u32).max(1);
        (scale(width), scale(height))
    }

    /// Downscale a display frame to processing resolution.
    pub fn downscale(&self, image: &GrayImage) -> GrayImage {
        if self.factor == 1.0 {
            return image.clone();
        }
        let (w, h) = self.processing_size(image.width(), image.height());
        imageops::resize(image, w, h, FilterType::Triangle)
    }

    /// Map a processing-resolution box to display resolution, clamped to the
    /// display frame.
    pub fn to_display(&self, bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
        let up = |v: u32, limit: u32| ((v as f32 / self.factor).round() as u32).min(limit);
        BoundingBox {
            top: up(bbox.top, height),
            right: up(bbox.right, width),
            bottom: up(bbox.bottom, height),
            left: up(bbox.left, width),
        }
    }
}

impl Default for ScaleTransform {
    fn default() -> Self {
        Self {
            factor: DEFAULT_SCALE_FACTOR,
        }
    }
}

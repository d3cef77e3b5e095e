//! The detect-and-encode capability.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Detection;
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Finds faces in an image and produces one embedding per face.
///
/// Boxes are in the pixel space of the image passed in.
pub trait FaceEncoder {
    fn detect_and_encode(&mut self, image: &GrayImage) -> Result<Vec<Detection>, EncoderError>;
}

/// SCRFD detection followed by ArcFace embedding.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, EncoderError> {
        Ok(Self {
            detector: FaceDetector::load(scrfd_path)?,
            recognizer: FaceRecognizer::load(arcface_path)?,
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn detect_and_encode(&mut self, image: &GrayImage) -> Result<Vec<Detection>, EncoderError> {
        let faces = self.detector.detect(image)?;
        tracing::debug!(faces = faces.len(), "detector pass");

        let mut detections = Vec::with_capacity(faces.len());
        for face in faces {
            match self.recognizer.extract(image, &face.bounding_box) {
                Ok(embedding) => detections.push(Detection {
                    bounding_box: face.bounding_box,
                    embedding,
                }),
                // Degenerate crops at the frame edge are dropped, not fatal.
                Err(RecognizerError::EmptyFace) => {
                    tracing::debug!(bbox = ?face.bounding_box, "skipping empty face crop");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(detections)
    }
}

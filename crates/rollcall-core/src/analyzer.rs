//! Detection/encoding backend seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding, PixelOrder};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection and embedding, as one collaborator.
///
/// Inputs must already be in [`pixel_order`](Self::pixel_order).
pub trait FaceAnalyzer {
    fn pixel_order(&self) -> PixelOrder;

    /// Locate faces, in the input image's pixel space.
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// One embedding per box, in box order. The result may be shorter than
    /// `boxes` when trailing faces cannot be encoded.
    fn encode_faces(
        &mut self,
        image: &RgbImage,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError>;
}

/// SCRFD detection plus ArcFace embedding, both on ONNX Runtime.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxAnalyzer {
    pub fn load(scrfd_path: &str, arcface_path: &str) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path)?;
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self {
            detector,
            recognizer,
        })
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn pixel_order(&self) -> PixelOrder {
        PixelOrder::Rgb
    }

    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError> {
        let mut embeddings = Vec::with_capacity(boxes.len());
        for (i, face) in boxes.iter().enumerate() {
            match self.recognizer.extract(image, face) {
                Ok(embedding) => embeddings.push(embedding),
                // Stop rather than skip so embeddings stay index-aligned with boxes.
                Err(RecognizerError::NoLandmarks) => {
                    tracing::debug!(index = i, total = boxes.len(), "face without landmarks, truncating");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(embeddings)
    }
}

//! The face model boundary: one image in, at most one descriptor out.

use crate::detector::{DetectorError, FaceDetector, SCRFD_DEFAULT_INPUT_SIZE, SCRFD_DEFAULT_SCORE_THRESHOLD};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::RgbImage;
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
    #[error("descriptor extraction failed: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Fixed detector settings applied to every image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Square detector input resolution.
    pub input_size: usize,
    /// Minimum detection score for a face to qualify.
    pub score_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_size: SCRFD_DEFAULT_INPUT_SIZE,
            score_threshold: SCRFD_DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Produces a descriptor for the primary face of an image.
///
/// Implementations are shared across concurrent requests and must be safe
/// for simultaneous calls.
pub trait FaceAnalyzer: Send + Sync {
    /// `Ok(None)` when no face clears the detection threshold. When several
    /// faces are present only the most confident one is described.
    fn primary_face(&self, image: &RgbImage) -> Result<Option<Embedding>, AnalyzerError>;
}

/// SCRFD + ArcFace running on ONNX Runtime.
pub struct OnnxFaceAnalyzer {
    detector: Mutex<FaceDetector>,
    recognizer: Mutex<FaceRecognizer>,
}

impl OnnxFaceAnalyzer {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path, config: DetectionConfig) -> Result<Self, AnalyzerError> {
        let detector_path = model_dir.join(crate::DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(crate::RECOGNIZER_MODEL_FILE);

        let detector = FaceDetector::load(
            &detector_path.to_string_lossy(),
            config.input_size,
            config.score_threshold,
        )?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
        })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn primary_face(&self, image: &RgbImage) -> Result<Option<Embedding>, AnalyzerError> {
        let faces = self.detector.lock().detect(image)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };

        tracing::debug!(
            confidence = face.confidence,
            candidates = faces.len(),
            "primary face selected"
        );

        let embedding = self.recognizer.lock().extract(image, face)?;
        Ok(Some(embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detection_config() {
        let config = DetectionConfig::default();
        assert_eq!(config.input_size, 320);
        assert_eq!(config.score_threshold, 0.5);
    }

    #[test]
    fn test_load_missing_models() {
        let err = OnnxFaceAnalyzer::load(Path::new("/nonexistent"), DetectionConfig::default()).err();
        assert!(matches!(
            err,
            Some(AnalyzerError::Detector(DetectorError::ModelNotFound(_)))
        ));
    }
}

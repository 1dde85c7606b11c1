//! facematch-core — Face descriptors, verdict math and the inference adapter.
//!
//! Uses SCRFD for face detection and ArcFace for descriptor extraction,
//! both running via ONNX Runtime for CPU inference. Everything the daemon
//! needs from the model goes through the [`FaceAnalyzer`] trait.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod normalize;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, DetectionConfig, FaceAnalyzer, OnnxFaceAnalyzer};
pub use normalize::NormalizedImage;
pub use types::{BoundingBox, Confidence, Embedding, Verdict, MATCH_THRESHOLD};

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Model directory used when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

use std::sync::Arc;
use std::time::Duration;

use facematch_core::{AnalyzerError, Embedding, FaceAnalyzer, NormalizedImage, Verdict};
use thiserror::Error;
use tokio::time::Instant;

use crate::acquire::{AcquireError, Acquirer, ImageSource};
use crate::config::Timeouts;
use crate::deadline::{Deadline, Expired};

/// Which of the two compared images an error or missing face refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("{label}: {source}")]
    Acquire {
        side: Side,
        label: &'static str,
        #[source]
        source: AcquireError,
    },
    #[error("face detection timed out after {0:?}")]
    DetectionTimeout(Duration),
    #[error("comparison timed out after {0:?}")]
    ComparisonTimeout(Duration),
    #[error("{label}: {source}")]
    Model {
        side: Side,
        label: &'static str,
        #[source]
        source: AnalyzerError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompareError {
    /// The image the failure is attributed to, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            CompareError::Acquire { side, .. } | CompareError::Model { side, .. } => Some(*side),
            _ => None,
        }
    }
}

/// Images that yielded no descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFace {
    First,
    Second,
    Both,
}

/// Non-error result of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome {
    Verdict(Verdict),
    /// Both images decoded but at least one had no face.
    NoFace { missing: MissingFace, message: String },
}

/// Runs one comparison: acquire both images, detect both faces, compare.
pub struct Comparator {
    analyzer: Arc<dyn FaceAnalyzer>,
    acquirer: Acquirer,
    timeouts: Timeouts,
}

impl Comparator {
    pub fn new(analyzer: Arc<dyn FaceAnalyzer>, acquirer: Acquirer, timeouts: Timeouts) -> Self {
        Self {
            analyzer,
            acquirer,
            timeouts,
        }
    }

    /// Compare the faces in `first` and `second` within the comparison budget.
    ///
    /// Running out of budget at any stage yields `ComparisonTimeout`, even if
    /// in-flight work would have finished later.
    pub async fn compare(
        &self,
        first: ImageSource,
        second: ImageSource,
    ) -> Result<ComparisonOutcome, CompareError> {
        let deadline = Deadline::after(self.timeouts.comparison);
        match deadline.bound(self.run(&first, &second, &deadline)).await {
            Ok(result) => result,
            Err(_) => Err(self.comparison_timeout()),
        }
    }

    async fn run(
        &self,
        first: &ImageSource,
        second: &ImageSource,
        deadline: &Deadline,
    ) -> Result<ComparisonOutcome, CompareError> {
        let started = Instant::now();

        let (image_a, image_b) = tokio::try_join!(
            self.acquire(Side::First, first, deadline),
            self.acquire(Side::Second, second, deadline),
        )?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            budget_left_ms = deadline.remaining().as_millis() as u64,
            first = ?(image_a.width(), image_a.height()),
            second = ?(image_b.width(), image_b.height()),
            "both images acquired"
        );

        let detections = async {
            tokio::join!(
                self.detect(Side::First, first.label(), image_a),
                self.detect(Side::Second, second.label(), image_b),
            )
        };
        let (face_a, face_b) = match deadline.stage(self.timeouts.detection, detections).await {
            Ok((a, b)) => (a?, b?),
            Err(Expired::Stage) => return Err(CompareError::DetectionTimeout(self.timeouts.detection)),
            Err(Expired::Overall) => return Err(self.comparison_timeout()),
        };
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            first_face = face_a.is_some(),
            second_face = face_b.is_some(),
            "detection complete"
        );

        let outcome = match (face_a, face_b) {
            (Some(a), Some(b)) => ComparisonOutcome::Verdict(Verdict::between(&a, &b)),
            (None, None) => ComparisonOutcome::NoFace {
                missing: MissingFace::Both,
                message: "No face detected in either image".into(),
            },
            (None, Some(_)) => ComparisonOutcome::NoFace {
                missing: MissingFace::First,
                message: format!("No face detected in {}", first.label()),
            },
            (Some(_), None) => ComparisonOutcome::NoFace {
                missing: MissingFace::Second,
                message: format!("No face detected in {}", second.label()),
            },
        };
        Ok(outcome)
    }

    async fn acquire(
        &self,
        side: Side,
        source: &ImageSource,
        deadline: &Deadline,
    ) -> Result<NormalizedImage, CompareError> {
        self.acquirer
            .acquire(source, deadline)
            .await
            .map_err(|err| match err {
                AcquireError::BudgetExhausted => self.comparison_timeout(),
                err => CompareError::Acquire {
                    side,
                    label: source.label(),
                    source: err,
                },
            })
    }

    /// Inference on the blocking pool. The image is moved in and dropped there.
    async fn detect(
        &self,
        side: Side,
        label: &'static str,
        image: NormalizedImage,
    ) -> Result<Option<Embedding>, CompareError> {
        let analyzer = Arc::clone(&self.analyzer);
        let task = tokio::task::spawn_blocking(move || analyzer.primary_face(image.as_rgb()));

        match task.await {
            Ok(Ok(descriptor)) => Ok(descriptor),
            Ok(Err(source)) => Err(CompareError::Model { side, label, source }),
            Err(join_err) => Err(CompareError::Internal(format!(
                "{label} detection task failed: {join_err}"
            ))),
        }
    }

    fn comparison_timeout(&self) -> CompareError {
        CompareError::ComparisonTimeout(self.timeouts.comparison)
    }
}

use serde::Serialize;

/// Distance below which two descriptors are considered the same identity.
///
/// Fixed at 0.5 for compatibility with existing callers. On L2-normalized
/// 512-d ArcFace descriptors this equals cosine similarity >= 0.875, which is
/// strict: genuine pairs with pose or lighting changes often land above it.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Distance below which a non-match is still reported with medium confidence.
pub const MEDIUM_CONFIDENCE_DISTANCE: f64 = 0.7;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face descriptor vector (512-dimensional for ArcFace).
///
/// Lives only for the duration of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two descriptors. Symmetric and non-negative.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// How much weight a caller should put on a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Definitive result of comparing two descriptors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_match: bool,
    pub distance: f64,
    /// 0–100, higher means more alike.
    pub similarity: f64,
    pub confidence: Confidence,
}

impl Verdict {
    pub fn from_distance(distance: f64) -> Self {
        let is_match = distance < MATCH_THRESHOLD;
        let confidence = if is_match {
            Confidence::High
        } else if distance < MEDIUM_CONFIDENCE_DISTANCE {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Self {
            is_match,
            distance,
            similarity: ((1.0 - distance) * 100.0).clamp(0.0, 100.0),
            confidence,
        }
    }

    /// Compare two descriptors.
    pub fn between(a: &Embedding, b: &Embedding) -> Self {
        Self::from_distance(f64::from(a.distance(b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Embedding::new(vec![0.3, 0.4, 0.5]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_embedding_identity_is_its_values() {
        let a = Embedding::new(vec![0.6, 0.8]);
        let b = Embedding::new(vec![0.6, 0.8]);
        assert_eq!(a, b);
        assert_eq!(Verdict::between(&a, &b), Verdict::from_distance(0.0));
    }

    #[test]
    fn test_distance_known_value() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Embedding::new(vec![0.1, -0.7, 0.2]);
        let b = Embedding::new(vec![-0.4, 0.3, 0.9]);
        assert_eq!(a.distance(&b), b.distance(&a));
        assert!(a.distance(&b) >= 0.0);
    }

    #[test]
    fn test_verdict_same_person() {
        let v = Verdict::from_distance(0.32);
        assert!(v.is_match);
        assert!((v.similarity - 68.0).abs() < 1e-9);
        assert_eq!(v.confidence, Confidence::High);
    }

    #[test]
    fn test_verdict_threshold_is_exclusive() {
        let v = Verdict::from_distance(MATCH_THRESHOLD);
        assert!(!v.is_match);
        assert_eq!(v.confidence, Confidence::Medium);
    }

    #[test]
    fn test_verdict_confidence_bands() {
        for step in 0..=300 {
            let d = step as f64 / 100.0;
            let v = Verdict::from_distance(d);
            assert_eq!(v.is_match, d < 0.5, "d = {d}");
            let expected = if d < 0.5 {
                Confidence::High
            } else if d < 0.7 {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            assert_eq!(v.confidence, expected, "d = {d}");
        }
    }

    #[test]
    fn test_similarity_clamped() {
        for step in 0..=300 {
            let d = step as f64 / 100.0;
            let v = Verdict::from_distance(d);
            assert!((0.0..=100.0).contains(&v.similarity), "d = {d}");
            let raw = (1.0 - d) * 100.0;
            assert!((v.similarity - raw.clamp(0.0, 100.0)).abs() < 1e-9);
        }
        assert_eq!(Verdict::from_distance(0.0).similarity, 100.0);
        assert_eq!(Verdict::from_distance(1.7).similarity, 0.0);
    }

    #[test]
    fn test_verdict_between_embeddings() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![0.0, 0.9]);
        let v = Verdict::between(&a, &b);
        assert!(!v.is_match);
        assert_eq!(v.confidence, Confidence::Low);
    }

    #[test]
    fn test_confidence_serializes_lowercase() {
        let json = serde_json::to_string(&Confidence::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}

use crate::FaceVector;

/// Cosine similarity between two face vectors.
///
/// Vectors of zero magnitude or of differing dimension have no meaningful
/// angle and score `0.0`. The result is clamped to `[-1, 1]` to absorb
/// rounding.
pub fn score(a: &FaceVector, b: &FaceVector) -> f32 {
    if a.dim() != b.dim() {
        return 0.0;
    }
    let denom = a.norm() * b.norm();
    if !(denom.is_finite() && denom > 0.0) {
        return 0.0;
    }
    (a.values.dot(&b.values) / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FaceVector {
        FaceVector::new(values.to_vec())
    }

    #[test]
    fn identical_vectors_score_one() {
        let a = v(&[0.3, -1.2, 4.0, 0.5]);
        assert!((score(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn symmetric() {
        let a = v(&[1.0, 2.0, 3.0]);
        let b = v(&[-2.0, 0.5, 1.0]);
        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn invariant_to_positive_rescaling() {
        let a = v(&[1.0, 2.0, 3.0]);
        let b = v(&[-2.0, 0.5, 1.0]);
        let a_scaled = v(&[7.5, 15.0, 22.5]);
        let b_scaled = v(&[-0.02, 0.005, 0.01]);
        assert!((score(&a, &b) - score(&a_scaled, &b)).abs() < 1e-6);
        assert!((score(&a, &b) - score(&a, &b_scaled)).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_and_opposite() {
        assert!(score(&v(&[1.0, 0.0]), &v(&[0.0, 1.0])).abs() < 1e-6);
        assert!((score(&v(&[1.0, 0.0]), &v(&[-3.0, 0.0])) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_magnitude_scores_zero() {
        let zero = v(&[0.0, 0.0, 0.0]);
        let a = v(&[1.0, 2.0, 3.0]);
        assert_eq!(score(&zero, &a), 0.0);
        assert_eq!(score(&a, &zero), 0.0);
        assert_eq!(score(&zero, &zero), 0.0);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(score(&v(&[1.0, 0.0]), &v(&[1.0, 0.0, 0.0])), 0.0);
    }
}

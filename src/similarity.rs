//! Similarity scoring between embeddings.

/// Cosine similarity over the first `min(a.len(), b.len())` components.
///
/// Embeddings produced by different schemes (model output vs. fallback)
/// may differ in length; the common prefix is compared rather than
/// refusing outright. Returns `0.0` for empty inputs, a zero denominator,
/// or any non-finite intermediate.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let n = a.len().min(b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..n {
        let (x, y) = (f64::from(a[i]), f64::from(b[i]));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let score = (dot / denom) as f32;
    if score.is_finite() { score } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_similarity_is_one() {
        let v = vec![0.3f32, -1.2, 4.5, 0.0, 2.2];
        let score = cosine(&v, &v);
        assert!((score - 1.0).abs() < 1e-6, "got {score}");
    }

    #[test]
    fn self_similarity_exact_for_integer_norms() {
        // 3-4-5 triangle: every intermediate is exact in floating point.
        let v = [3.0f32, 4.0];
        assert_eq!(cosine(&v, &v), 1.0);
    }

    #[test]
    fn symmetric() {
        let a = vec![1.0f32, 2.0, 3.0];
        let b = vec![-0.5f32, 0.25, 9.0];
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn empty_inputs_score_zero() {
        let v = vec![1.0f32, 2.0];
        assert_eq!(cosine(&[], &v), 0.0);
        assert_eq!(cosine(&v, &[]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let zero = vec![0.0f32; 8];
        let v = vec![1.0f32; 8];
        assert_eq!(cosine(&zero, &v), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        let a = [3.0f32, 4.0];
        let b = [-3.0f32, -4.0];
        assert_eq!(cosine(&a, &b), -1.0);
    }

    #[test]
    fn stays_within_unit_range() {
        let a = vec![0.9f32, 123.0, -4.0, 0.001];
        let b = vec![17.5f32, -2.0, 88.0, 3.3];
        let score = cosine(&a, &b);
        assert!((-1.0..=1.0).contains(&score), "got {score}");
    }

    #[test]
    fn truncates_to_shared_prefix() {
        // The longer vector's tail must not influence the score.
        let short = [3.0f32, 4.0];
        let long = [3.0f32, 4.0, 100.0, -55.0];
        assert_eq!(cosine(&short, &long), 1.0);
    }

    #[test]
    fn non_finite_input_maps_to_zero() {
        let a = [f32::NAN, 1.0];
        let b = [1.0f32, 1.0];
        assert_eq!(cosine(&a, &b), 0.0);
        let c = [f32::INFINITY, 1.0];
        assert_eq!(cosine(&c, &b), 0.0);
    }

    #[test]
    fn exact_four_fifths_score() {
        // dot = 20, norms = 5 and 5: score is exactly 0.8 in f64 and f32.
        let a = [3.0f32, 4.0];
        let b = [0.0f32, 5.0];
        assert_eq!(cosine(&a, &b), 0.8);
    }
}

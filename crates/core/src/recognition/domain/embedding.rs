/// Fixed-length numeric vector representing a face.
///
/// Immutable once produced by the encoder; identity comparison happens via
/// Euclidean distance in embedding space.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceEmbedding(Vec<f32>);

impl FaceEmbedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance to another embedding.
    ///
    /// Dimensions beyond the shorter vector are ignored; in practice all
    /// embeddings from one encoder share a length.
    pub fn euclidean_distance(&self, other: &FaceEmbedding) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = (*a as f64) - (*b as f64);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f32>> for FaceEmbedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_to_self_is_zero() {
        let e = FaceEmbedding::new(vec![0.1, 0.2, 0.3]);
        assert_relative_eq!(e.euclidean_distance(&e), 0.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = FaceEmbedding::new(vec![0.0, 0.0]);
        let b = FaceEmbedding::new(vec![3.0, 4.0]);
        assert_relative_eq!(a.euclidean_distance(&b), 5.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = FaceEmbedding::new(vec![0.5, -0.2, 0.9]);
        let b = FaceEmbedding::new(vec![-0.1, 0.4, 0.3]);
        assert_relative_eq!(a.euclidean_distance(&b), b.euclidean_distance(&a));
    }
}

//! Similarity measures and a brute-force nearest-neighbour index

use crate::error::{Result, RollupError};
use std::collections::BTreeSet;

/// Intersection over union; two empty sets score 0
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero vectors stay zero
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < 1e-8 || norm_b < 1e-8 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Exact k-NN over L2-normalised vectors, scored by dot product
#[derive(Debug, Clone)]
pub struct KnnIndex {
    vectors: Vec<Vec<f32>>,
    dim: usize,
}

impl KnnIndex {
    /// Normalises every vector; all must share one non-zero dimension
    pub fn build(mut vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        for v in vectors.iter_mut() {
            if v.len() != dim || dim == 0 {
                return Err(RollupError::InvalidDimension {
                    expected: dim,
                    actual: v.len(),
                });
            }
            l2_normalize(v);
        }
        Ok(Self { vectors, dim })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The `k` most similar other entries to `i`, best first
    pub fn neighbours(&self, i: usize, k: usize) -> Vec<(usize, f32)> {
        let Some(query) = self.vectors.get(i) else {
            return Vec::new();
        };
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, v)| (j, query.iter().zip(v).map(|(a, b)| a * b).sum()))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}

//! Pairwise similarity matrices and the combined distance metric.
//!
//! Text similarity is plain cosine similarity between description
//! embeddings. Theme similarity is weighted Jaccard over theme-score vectors.
//! The two are merged into one distance matrix:
//!
//! ```text
//! d(i, j) = text_weight * (1 - text_sim(i, j)) + theme_weight * (1 - theme_sim(i, j))
//! ```
//!
//! Theme overlap gets the larger weight by default because generic company
//! descriptions embed close together.

use cohort_core::config::SimilarityConfig;
use cohort_core::error::CohortError;

/// Dense square matrix of `f64`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    size: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    /// All-zero `size` x `size` matrix.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Build from row vectors. Fails unless every row has `rows.len()` entries.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, CohortError> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(CohortError::Clustering(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            data.extend(row);
        }
        Ok(Self { size, data })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.size + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.size + j] = value;
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.size..(i + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.size.max(1)).take(self.size)
    }

    /// Set `(i, j)` and `(j, i)` together.
    fn set_symmetric(&mut self, i: usize, j: usize, value: f64) {
        self.set(i, j, value);
        self.set(j, i, value);
    }
}

/// Cosine similarity in [-1, 1]. Zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Weighted Jaccard similarity: `sum(min) / sum(max)`.
///
/// Two all-zero vectors have similarity 0, not 1: records without recorded
/// themes share nothing.
pub fn weighted_jaccard(a: &[f64], b: &[f64]) -> f64 {
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        min_sum += x.min(*y);
        max_sum += x.max(*y);
    }
    if max_sum == 0.0 {
        0.0
    } else {
        min_sum / max_sum
    }
}

/// Pairwise cosine similarity between embeddings.
pub fn text_similarity_matrix(embeddings: &[Vec<f32>]) -> SquareMatrix {
    pairwise(embeddings.len(), |i, j| {
        cosine_similarity(&embeddings[i], &embeddings[j])
    })
}

/// Pairwise weighted-Jaccard similarity between theme vectors.
pub fn theme_similarity_matrix(vectors: &[Vec<f64>]) -> SquareMatrix {
    pairwise(vectors.len(), |i, j| weighted_jaccard(&vectors[i], &vectors[j]))
}

fn pairwise(n: usize, f: impl Fn(usize, usize) -> f64) -> SquareMatrix {
    let mut matrix = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in i..n {
            matrix.set_symmetric(i, j, f(i, j));
        }
    }
    matrix
}

/// Weighted combination of text and theme similarity into a distance.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedMetric {
    pub text_weight: f64,
    pub theme_weight: f64,
    /// Clamp text similarity into [0, 1] before use. Without clipping,
    /// opposed embeddings push the text term above `text_weight`.
    pub clip_negative_cosine: bool,
}

impl Default for CombinedMetric {
    fn default() -> Self {
        Self::from(&SimilarityConfig::default())
    }
}

impl From<&SimilarityConfig> for CombinedMetric {
    fn from(config: &SimilarityConfig) -> Self {
        Self {
            text_weight: config.text_weight,
            theme_weight: config.theme_weight,
            clip_negative_cosine: config.clip_negative_cosine,
        }
    }
}

impl CombinedMetric {
    /// Distance for one pair of similarities.
    pub fn distance(&self, text_sim: f64, theme_sim: f64) -> f64 {
        let text_sim = if self.clip_negative_cosine {
            text_sim.clamp(0.0, 1.0)
        } else {
            text_sim
        };
        self.text_weight * (1.0 - text_sim) + self.theme_weight * (1.0 - theme_sim)
    }

    /// Combined distance matrix. The diagonal is fixed at 0 even for records
    /// with an empty description or no themes.
    pub fn combine(
        &self,
        text: &SquareMatrix,
        theme: &SquareMatrix,
    ) -> Result<SquareMatrix, CohortError> {
        if text.size() != theme.size() {
            return Err(CohortError::Clustering(format!(
                "text matrix is {0}x{0} but theme matrix is {1}x{1}",
                text.size(),
                theme.size()
            )));
        }

        let n = text.size();
        let mut distances = SquareMatrix::zeros(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.distance(text.get(i, j), theme.get(i, j));
                distances.set_symmetric(i, j, d);
            }
        }
        Ok(distances)
    }
}

//! Seeded k-means partitioning over the combined distance matrix.
//!
//! Each row of the distance matrix is treated as a point in n-dimensional
//! space, so two records land together when their distance profiles to the
//! whole corpus agree. Initialisation is k-means++ drawn from a `StdRng`
//! seeded from config; identical input and seed always give identical labels.

use cohort_core::config::PartitionConfig;
use cohort_vector::similarity::SquareMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::InsightError;
use crate::types::Partition;

/// Lloyd's k-means with k-means++ seeding and seeded restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansPartitioner {
    pub num_clusters: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub restarts: usize,
    pub tolerance: f64,
}

impl Default for KMeansPartitioner {
    fn default() -> Self {
        Self::from(&PartitionConfig::default())
    }
}

impl From<&PartitionConfig> for KMeansPartitioner {
    fn from(config: &PartitionConfig) -> Self {
        Self {
            num_clusters: config.num_clusters,
            seed: config.seed,
            max_iterations: config.max_iterations,
            restarts: config.restarts,
            tolerance: config.tolerance,
        }
    }
}

impl KMeansPartitioner {
    /// Create a partitioner for `num_clusters` groups with the given seed.
    pub fn new(num_clusters: usize, seed: u64) -> Self {
        Self {
            num_clusters,
            seed,
            ..Self::default()
        }
    }

    /// Assign every row of `features` to one of K clusters.
    ///
    /// When the corpus has fewer records than K, K is reduced to the record
    /// count.
    pub fn partition(&self, features: &SquareMatrix) -> Result<Partition, InsightError> {
        if self.num_clusters == 0 {
            return Err(InsightError::Config(
                "number of clusters must be at least 1".to_string(),
            ));
        }
        let n = features.size();
        if n == 0 {
            return Err(InsightError::InsufficientData(
                "cannot partition an empty corpus".to_string(),
            ));
        }

        let k = self.num_clusters.min(n);
        if k < self.num_clusters {
            warn!(
                requested = self.num_clusters,
                records = n,
                "Fewer records than clusters; reducing k"
            );
        }

        let points: Vec<&[f64]> = features.rows().collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Partition> = None;

        for restart in 0..self.restarts.max(1) {
            let centroids = kmeans_plus_plus(&points, k, &mut rng);
            let run = self.lloyd(&points, centroids);
            debug!(restart, inertia = run.inertia, "k-means restart finished");
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        let best = best.ok_or_else(|| {
            InsightError::InvalidInput("k-means produced no result".to_string())
        })?;
        info!(
            records = n,
            k,
            clusters = best.members().len(),
            inertia = best.inertia,
            "Partitioning complete"
        );
        Ok(best)
    }

    fn lloyd(&self, points: &[&[f64]], mut centroids: Vec<Vec<f64>>) -> Partition {
        let k = centroids.len();
        let mut labels = assign(points, &centroids);

        for iteration in 0..self.max_iterations {
            let updated = recompute_centroids(points, &labels, &centroids);
            let shift: f64 = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new))
                .sum();
            centroids = updated;
            labels = assign(points, &centroids);
            if shift <= self.tolerance {
                debug!(iteration, shift, "k-means converged");
                break;
            }
        }

        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared_distance(p, &centroids[l]))
            .sum();

        Partition { labels, k, inertia }
    }
}

/// k-means++ seeding: first centre uniform, later centres drawn with
/// probability proportional to squared distance from the nearest chosen one.
fn kmeans_plus_plus(points: &[&[f64]], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);
    chosen.push(rng.random_range(0..n));

    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, points[chosen[0]]))
        .collect();

    while chosen.len() < k {
        let total: f64 = min_dist.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, &d) in min_dist.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                cumulative += d;
                pick = Some(i);
                if cumulative > target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        // Every remaining point coincides with a centre; take any unchosen one.
        let next = match next {
            Some(i) => i,
            None => {
                let remaining: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();
                remaining[rng.random_range(0..remaining.len())]
            }
        };

        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            let d = squared_distance(p, points[next]);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
        }
    }

    chosen.into_iter().map(|i| points[i].to_vec()).collect()
}

/// Nearest centroid per point; ties go to the lower label.
fn assign(points: &[&[f64]], centroids: &[Vec<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (c, centroid) in centroids.iter().enumerate() {
                let d = squared_distance(p, centroid);
                if d < best_dist {
                    best = c;
                    best_dist = d;
                }
            }
            best
        })
        .collect()
}

/// Mean of each cluster's points. An empty cluster keeps its old centroid.
fn recompute_centroids(
    points: &[&[f64]],
    labels: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let dim = previous.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];

    for (p, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (s, v) in sums[label].iter_mut().zip(p.iter()) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((mut sum, count), old)| {
            if count == 0 {
                return old.clone();
            }
            for v in sum.iter_mut() {
                *v /= count as f64;
            }
            sum
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

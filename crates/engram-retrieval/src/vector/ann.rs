//! Inverted-file (IVF) approximate index over episode vectors.
//!
//! K-means picks `lists` coarse centroids; each episode lands in the list
//! of its closest centroid. A query searches its closest lists.
//! Episodes appended after the build sit in an unindexed tail that every
//! query scans exactly, so a slightly stale index loses no recall. Once
//! the tail outgrows `stale_ratio` of the indexed count the index is
//! rebuilt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use engram_clustering::cosine_similarity;
use engram_core::errors::{ConsistencyError, EngramResult};
use engram_core::models::IndexKind;

const KMEANS_ITERATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    /// Episode positions per coarse list.
    lists: Vec<Vec<u32>>,
    /// Episodes `[0, indexed)` are covered by the lists.
    indexed: usize,
    dimensions: usize,
    built_at: DateTime<Utc>,
}

impl IvfIndex {
    /// Cluster `vectors` into at most `lists` lists. Returns `None` for an
    /// empty input or mixed dimensions.
    pub fn build(vectors: &[&[f32]], lists: usize) -> Option<Self> {
        let dimensions = vectors.first()?.len();
        if dimensions == 0 || vectors.iter().any(|v| v.len() != dimensions) {
            return None;
        }
        let k = lists.clamp(1, vectors.len());
        let (centroids, assignments) = kmeans(vectors, k);

        let mut buckets = vec![Vec::new(); centroids.len()];
        for (position, list) in assignments.into_iter().enumerate() {
            buckets[list].push(position as u32);
        }
        Some(Self {
            centroids,
            lists: buckets,
            indexed: vectors.len(),
            dimensions,
            built_at: Utc::now(),
        })
    }

    pub fn indexed(&self) -> usize {
        self.indexed
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// True when the corpus has grown past the index by more than
    /// `ratio` of the indexed count, or shrunk below it.
    pub fn is_stale(&self, corpus_len: usize, ratio: f64) -> bool {
        if corpus_len < self.indexed || self.indexed == 0 {
            return true;
        }
        let unindexed = (corpus_len - self.indexed) as f64;
        unindexed > ratio * self.indexed as f64
    }

    /// Candidate positions for `query`: members of the `lists` closest
    /// lists plus the unindexed tail up to `corpus_len`, ascending.
    pub fn candidates(&self, query: &[f32], lists: usize, corpus_len: usize) -> Vec<usize> {
        if query.len() != self.dimensions {
            return (0..corpus_len).collect();
        }
        let mut order: Vec<(usize, f64)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query, c)))
            .collect();
        order.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let mut out: Vec<usize> = order
            .iter()
            .take(lists.max(1))
            .flat_map(|(list, _)| self.lists[*list].iter().map(|&p| p as usize))
            .filter(|&p| p < corpus_len)
            .collect();
        out.extend(self.indexed.min(corpus_len)..corpus_len);
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn to_bytes(&self) -> EngramResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> EngramResult<Self> {
        let corrupt = |reason: String| ConsistencyError::CorruptIndex {
            index: IndexKind::Ann.as_str().to_string(),
            reason,
        };
        let index: Self = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        if index.centroids.len() != index.lists.len() {
            return Err(corrupt("list and centroid counts differ".into()).into());
        }
        let covered: usize = index.lists.iter().map(Vec::len).sum();
        if covered != index.indexed {
            return Err(corrupt(format!(
                "lists cover {covered} episodes, header says {}",
                index.indexed
            ))
            .into());
        }
        Ok(index)
    }
}

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| (*x as f64 / norm) as f32).collect()
    } else {
        v.to_vec()
    }
}

/// Farthest-point seeding: start from the first vector, then repeatedly
/// take the vector least similar to every center chosen so far.
fn seed_centers(vectors: &[&[f32]], k: usize) -> Vec<Vec<f32>> {
    let mut centers = vec![normalized(vectors[0])];
    let mut closest: Vec<f64> = vectors
        .iter()
        .map(|v| cosine_similarity(v, &centers[0]))
        .collect();
    while centers.len() < k {
        let far = closest
            .iter()
            .enumerate()
            .fold((0usize, f64::MAX), |best, (i, &s)| if s < best.1 { (i, s) } else { best })
            .0;
        let center = normalized(vectors[far]);
        for (c, v) in closest.iter_mut().zip(vectors) {
            *c = c.max(cosine_similarity(v, &center));
        }
        centers.push(center);
    }
    centers
}

/// Spherical k-means with deterministic seeding. Returns normalized
/// centers and each input's list.
fn kmeans(vectors: &[&[f32]], k: usize) -> (Vec<Vec<f32>>, Vec<usize>) {
    let n = vectors.len();
    let dims = vectors[0].len();
    let mut centers = seed_centers(vectors, k);
    let mut assignments = vec![0usize; n];

    for _ in 0..KMEANS_ITERATIONS {
        let mut changed = false;
        for (i, v) in vectors.iter().enumerate() {
            let best = centers
                .iter()
                .enumerate()
                .map(|(ci, c)| (ci, cosine_similarity(v, c)))
                .fold((0usize, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
                .0;
            if assignments[i] != best {
                assignments[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0f64; dims]; k];
        let mut counts = vec![0usize; k];
        for (i, v) in vectors.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(v.iter()) {
                *s += *x as f64;
            }
        }
        for (ci, sum) in sums.into_iter().enumerate() {
            if counts[ci] == 0 {
                continue;
            }
            let mean: Vec<f32> = sum.into_iter().map(|s| (s / counts[ci] as f64) as f32).collect();
            centers[ci] = normalized(&mean);
        }

        if !changed {
            break;
        }
    }
    (centers, assignments)
}

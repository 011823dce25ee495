//! Vector helpers: cosine similarity, centroids, softmax.

/// Cosine similarity between two vectors.
/// Returns 0.0 for mismatched, empty or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Component-wise mean of equally sized vectors.
pub fn mean_vector<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut sum: Vec<f64> = Vec::new();
    let mut n = 0usize;
    for v in vectors {
        if sum.is_empty() {
            sum = vec![0.0; v.len()];
        }
        for (s, x) in sum.iter_mut().zip(v) {
            *s += *x as f64;
        }
        n += 1;
    }
    if n == 0 {
        return Vec::new();
    }
    sum.into_iter().map(|s| (s / n as f64) as f32).collect()
}

/// Mean of the vectors scaled to unit length. Empty input gives an empty vector.
pub fn normalized_mean<'a>(vectors: impl IntoIterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut mean = mean_vector(vectors);
    let norm = mean.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for x in &mut mean {
            *x = (*x as f64 / norm) as f32;
        }
    }
    mean
}

/// Fold one more member into a running mean of `count` members.
pub fn running_mean(mean: &mut [f32], count: usize, next: &[f32]) {
    let n = (count + 1) as f32;
    for (m, x) in mean.iter_mut().zip(next) {
        *m += (x - *m) / n;
    }
}

/// Softmax share of each score at the given temperature.
pub fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let t = temperature.max(f64::EPSILON);
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| ((s - max) / t).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

//! Similarity search (C8)
//!
//! Cosine similarity over embedding vectors, k-nearest-neighbour lookup, and
//! near-duplicate detection. A brute-force path is always correct; an LSH
//! fast path (see [`lsh`]) is used once the index grows past a threshold.

pub mod lsh;

use crate::error::{MemoryError, Result};

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
///
/// A zero vector on either side yields `0.0` rather than `NaN`.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MemoryError::ShapeMismatch { a: a.len(), b: b.len() });
    }
    if a.is_empty() {
        return Err(MemoryError::Empty);
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// One neighbour result: the candidate's index in the input slice and its
/// similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub similarity: f32,
}

/// The `k` nearest neighbours of `query` among `candidates`, above
/// `threshold`, excluding any index in `exclude`, sorted by descending
/// similarity (ties broken by ascending index for determinism).
pub fn knn(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    threshold: f32,
    exclude: &[usize],
) -> Result<Vec<Neighbor>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        if exclude.contains(&index) {
            continue;
        }
        let similarity = cosine(query, candidate)?;
        if similarity >= threshold {
            scored.push(Neighbor { index, similarity });
        }
    }
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.index.cmp(&b.index))
    });
    scored.truncate(k);
    Ok(scored)
}

/// Mean similarity of `query` to its `k` nearest neighbours among
/// `candidates` (no threshold filter); `0.0` when `candidates` is empty.
pub fn avg_knn(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Result<f32> {
    if candidates.is_empty() {
        return Ok(0.0);
    }
    let neighbors = knn(query, candidates, k, f32::MIN, &[])?;
    if neighbors.is_empty() {
        return Ok(0.0);
    }
    let sum: f32 = neighbors.iter().map(|n| n.similarity).sum();
    Ok(sum / neighbors.len() as f32)
}

/// A pair of candidate indices whose similarity meets or exceeds a
/// duplicate-detection threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePair {
    pub a: usize,
    pub b: usize,
    pub similarity: f32,
}

/// All pairs within `vectors` with similarity `>= threshold`, brute force.
/// `O(n^2)`; callers should route to [`lsh`] above the configured size
/// threshold.
pub fn duplicates(vectors: &[Vec<f32>], threshold: f32) -> Result<Vec<DuplicatePair>> {
    let mut pairs = Vec::new();
    for i in 0..vectors.len() {
        for j in (i + 1)..vectors.len() {
            let similarity = cosine(&vectors[i], &vectors[j])?;
            if similarity >= threshold {
                pairs.push(DuplicatePair { a: i, b: j, similarity });
            }
        }
    }
    Ok(pairs)
}

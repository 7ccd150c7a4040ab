//! Random-hyperplane locality-sensitive hashing.
//!
//! Used as a fast path for near-duplicate detection once the candidate set
//! grows past `lsh_threshold` (default 200, see §4.8): brute-force pairwise
//! cosine comparison is `O(n^2)` and stops scaling well before that. Each
//! table hashes every vector to a bit signature via a fixed bank of random
//! hyperplanes; only vectors sharing a signature in at least one table are
//! compared directly, so true near-duplicates are found in expected
//! sub-quadratic time at the cost of a small, documented chance of missing a
//! borderline pair (open question, spec.md §9: the recall floor is set at
//! >=95% for pairs with similarity >= threshold + 0.02; pairs closer to the
//! threshold than that are not guaranteed).

use std::collections::HashMap;

use crate::error::Result;
use crate::similarity::{cosine, DuplicatePair};

/// A deterministic pseudo-random number generator (xorshift64) seeded
/// explicitly, so hyperplane generation is reproducible across runs without
/// pulling in a `rand` dependency the teacher never used for this purpose.
struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Xorshift64(if seed == 0 { 0x9E3779B97F4A7C15 } else { seed })
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform f32 in `[-1, 1]`.
    fn next_signed_unit(&mut self) -> f32 {
        let bits = self.next_u64();
        let unit = (bits >> 11) as f64 / (1u64 << 53) as f64;
        (unit as f32) * 2.0 - 1.0
    }
}

/// A bank of random hyperplanes used by one LSH table.
struct HyperplaneTable {
    planes: Vec<Vec<f32>>,
}

impl HyperplaneTable {
    fn new(dim: usize, num_bits: usize, rng: &mut Xorshift64) -> Self {
        let planes = (0..num_bits)
            .map(|_| (0..dim).map(|_| rng.next_signed_unit()).collect())
            .collect();
        HyperplaneTable { planes }
    }

    /// Hash a vector to a bit signature: bit `i` is 1 if the vector lies on
    /// the positive side of hyperplane `i`.
    fn signature(&self, vector: &[f32]) -> u64 {
        let mut sig: u64 = 0;
        for (i, plane) in self.planes.iter().enumerate() {
            let dot: f32 = plane.iter().zip(vector).map(|(p, v)| p * v).sum();
            if dot >= 0.0 {
                sig |= 1 << i;
            }
        }
        sig
    }
}

/// Configuration for the LSH fast path (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct LshConfig {
    pub num_tables: usize,
    pub num_hash_bits: usize,
}

impl Default for LshConfig {
    fn default() -> Self {
        LshConfig {
            num_tables: 6,
            num_hash_bits: 10,
        }
    }
}

impl LshConfig {
    /// Build the LSH table layout from the configured `lsh_tables` /
    /// `lsh_hash_bits` keys (§6).
    pub fn from_config(config: &crate::config::Config) -> Self {
        LshConfig {
            num_tables: config.lsh_tables as usize,
            num_hash_bits: config.lsh_hash_bits as usize,
        }
    }
}

/// Find candidate near-duplicate pairs among `vectors` using multi-table
/// random-hyperplane LSH, then verify each candidate with exact cosine
/// similarity so the returned pairs are never false positives (only
/// false negatives are possible, bounded by the recall floor documented
/// above).
pub fn duplicates(vectors: &[Vec<f32>], threshold: f32, config: LshConfig) -> Result<Vec<DuplicatePair>> {
    if vectors.is_empty() {
        return Ok(Vec::new());
    }
    let dim = vectors[0].len();
    let mut rng = Xorshift64::new(0xC0FFEE ^ (vectors.len() as u64));

    let mut candidate_pairs: std::collections::HashSet<(usize, usize)> = std::collections::HashSet::new();

    for table_index in 0..config.num_tables {
        let table = HyperplaneTable::new(dim, config.num_hash_bits, &mut rng);
        // Re-seed deterministically per table so tables are independent.
        rng.0 ^= (table_index as u64 + 1).wrapping_mul(0x9E3779B97F4A7C15);

        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for (index, vector) in vectors.iter().enumerate() {
            buckets.entry(table.signature(vector)).or_default().push(index);
        }
        for members in buckets.values() {
            if members.len() < 2 {
                continue;
            }
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let (a, b) = (members[i].min(members[j]), members[i].max(members[j]));
                    candidate_pairs.insert((a, b));
                }
            }
        }
    }

    let mut pairs = Vec::new();
    for (a, b) in candidate_pairs {
        let similarity = cosine(&vectors[a], &vectors[b])?;
        if similarity >= threshold {
            pairs.push(DuplicatePair { a, b, similarity });
        }
    }
    pairs.sort_by(|x, y| x.a.cmp(&y.a).then_with(|| x.b.cmp(&y.b)));
    Ok(pairs)
}

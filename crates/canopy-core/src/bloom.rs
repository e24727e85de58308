//! Bloom Index (component B) — O(1) membership probing with KB-scale storage.
//!
//! Sized per Bloom's 1970 formulas: `m = ceil(-n * ln(p) / ln(2)^2)` bits,
//! `k = ceil((m/n) * ln(2))` hash functions. At the defaults used for a
//! 10M-artifact repository (`p = 0.001`) this works out to roughly 18 MiB of
//! live bit array; the on-disk snapshot (`BloomFilter::save`) is
//! zstd-compressed and comes out around 2 MiB since the array is mostly
//! zero at typical load factors — compression is strictly an I/O-only
//! concern, the live `bit_array` is never compressed in memory.
//!
//! Hash positions come from MurmurHash3 (x86_32) seeded deterministically
//! per-slot: `seed_i = u32::from_be_bytes(sha256(format!("bloom{i}"))[..4])`,
//! matching the seed derivation the prior implementation used, so a filter
//! built from the same `(n, p)` always probes the same bit positions for the
//! same item.

use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Bloom filter sized for a fixed `(expected_items, false_positive_rate)`
/// pair. Guarantees zero false negatives: `contains` never returns `false`
/// for an item that was `insert`ed, though it may return `true` for an item
/// that never was (a false positive, bounded by `false_positive_rate`).
#[derive(Debug, Clone)]
pub struct BloomFilter {
    expected_items: u64,
    false_positive_rate: f64,
    size_bits: u64,
    num_hashes: u32,
    seeds: Vec<u32>,
    bit_array: Vec<u8>,
}

/// On-disk header; the bit array follows separately (zstd-compressed) so
/// the header stays tiny and human-diffable in a hex dump.
#[derive(Debug, Serialize, Deserialize)]
struct BloomHeader {
    expected_items: u64,
    false_positive_rate: f64,
    size_bits: u64,
    num_hashes: u32,
    seeds: Vec<u32>,
}

impl BloomFilter {
    /// Construct a new, empty filter sized for `expected_items` at
    /// `false_positive_rate`. Both bounds are advisory capacity planning,
    /// not hard limits — overfilling degrades the false-positive rate
    /// gracefully rather than erroring.
    pub fn new(expected_items: u64, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 0.5);

        let size_bits = (-(n * p.ln()) / (std::f64::consts::LN_2.powi(2))).ceil() as u64;
        let size_bits = size_bits.max(8);
        let num_hashes = (((size_bits as f64 / n) * std::f64::consts::LN_2).ceil() as u32).max(1);

        let seeds = (0..num_hashes)
            .map(|i| {
                let digest = Sha256::digest(format!("bloom{i}").as_bytes());
                u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
            })
            .collect();

        let size_bytes = ((size_bits + 7) / 8) as usize;

        BloomFilter {
            expected_items,
            false_positive_rate,
            size_bits,
            num_hashes,
            seeds,
            bit_array: vec![0u8; size_bytes],
        }
    }

    /// Bit positions an item maps to, one per hash seed.
    fn positions(&self, item: &str) -> impl Iterator<Item = u64> + '_ {
        let bytes = item.as_bytes();
        self.seeds
            .iter()
            .map(move |&seed| murmur3_32(bytes, seed) as u64 % self.size_bits)
    }

    pub fn insert(&mut self, item: &str) {
        let positions: Vec<u64> = self.positions(item).collect();
        for pos in positions {
            let byte_idx = (pos / 8) as usize;
            let bit_idx = (pos % 8) as u32;
            self.bit_array[byte_idx] |= 1 << bit_idx;
        }
    }

    pub fn insert_batch<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, items: I) {
        for item in items {
            self.insert(item.as_ref());
        }
    }

    /// `false` is a definite answer; `true` means "possibly present".
    pub fn contains(&self, item: &str) -> bool {
        self.positions(item).all(|pos| {
            let byte_idx = (pos / 8) as usize;
            let bit_idx = (pos % 8) as u32;
            (self.bit_array[byte_idx] & (1 << bit_idx)) != 0
        })
    }

    pub fn size_bits(&self) -> u64 {
        self.size_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn bit_count(&self) -> u64 {
        self.bit_array.iter().map(|b| b.count_ones() as u64).sum()
    }

    pub fn load_factor(&self) -> f64 {
        self.bit_count() as f64 / self.size_bits as f64
    }

    /// Estimated unique item count via the standard Bloom cardinality
    /// estimator: `n = -m/k * ln(1 - x/m)` where `x` is the set-bit count.
    pub fn estimate_count(&self) -> u64 {
        let k = self.num_hashes as f64;
        let m = self.size_bits as f64;
        let x = self.bit_count() as f64;

        if x == 0.0 {
            return 0;
        }
        if x >= m {
            return self.expected_items;
        }

        (-(m / k) * (1.0 - x / m).ln()) as u64
    }

    fn assert_compatible(&self, other: &BloomFilter) -> CoreResult<()> {
        if self.size_bits != other.size_bits || self.seeds != other.seeds {
            return Err(CoreError::Validation(
                "cannot combine bloom filters with different (m, k, seeds)".into(),
            ));
        }
        Ok(())
    }

    /// Bitwise OR of two filters with identical configuration.
    pub fn union(&self, other: &BloomFilter) -> CoreResult<BloomFilter> {
        self.assert_compatible(other)?;
        let bit_array = self
            .bit_array
            .iter()
            .zip(other.bit_array.iter())
            .map(|(a, b)| a | b)
            .collect();
        Ok(BloomFilter {
            bit_array,
            ..self.clone()
        })
    }

    /// Bitwise AND of two filters with identical configuration.
    pub fn intersection(&self, other: &BloomFilter) -> CoreResult<BloomFilter> {
        self.assert_compatible(other)?;
        let bit_array = self
            .bit_array
            .iter()
            .zip(other.bit_array.iter())
            .map(|(a, b)| a & b)
            .collect();
        Ok(BloomFilter {
            bit_array,
            ..self.clone()
        })
    }

    /// Persist to `path` as a bincode-encoded header followed by a
    /// zstd-compressed bit array.
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let header = BloomHeader {
            expected_items: self.expected_items,
            false_positive_rate: self.false_positive_rate,
            size_bits: self.size_bits,
            num_hashes: self.num_hashes,
            seeds: self.seeds.clone(),
        };
        let header_bytes = bincode::serialize(&header)
            .map_err(|e| CoreError::Store(format!("failed to encode bloom header: {e}")))?;
        let compressed = zstd::encode_all(self.bit_array.as_slice(), 3)
            .map_err(|e| CoreError::Store(format!("failed to compress bloom bit array: {e}")))?;

        let mut file = std::fs::File::create(path.as_ref())
            .map_err(|e| CoreError::Store(format!("failed to create bloom snapshot: {e}")))?;
        file.write_all(&(header_bytes.len() as u64).to_le_bytes())
            .and_then(|_| file.write_all(&header_bytes))
            .and_then(|_| file.write_all(&compressed))
            .map_err(|e| CoreError::Store(format!("failed to write bloom snapshot: {e}")))
    }

    /// Load a snapshot written by `save`. Returns `CoreError::Corruption`
    /// when the file cannot be decoded — this is one of the two fatal error
    /// paths the core contract allows (spec §7).
    pub fn load(path: impl AsRef<Path>) -> CoreResult<BloomFilter> {
        let mut file = std::fs::File::open(path.as_ref())
            .map_err(|e| CoreError::Store(format!("failed to open bloom snapshot: {e}")))?;

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)
            .map_err(|e| CoreError::Corruption(format!("truncated bloom snapshot header: {e}")))?;
        let header_len = u64::from_le_bytes(len_bytes) as usize;

        let mut header_bytes = vec![0u8; header_len];
        file.read_exact(&mut header_bytes)
            .map_err(|e| CoreError::Corruption(format!("truncated bloom snapshot: {e}")))?;
        let header: BloomHeader = bincode::deserialize(&header_bytes)
            .map_err(|e| CoreError::Corruption(format!("invalid bloom snapshot header: {e}")))?;

        let mut compressed = Vec::new();
        file.read_to_end(&mut compressed)
            .map_err(|e| CoreError::Corruption(format!("truncated bloom bit array: {e}")))?;
        let bit_array = zstd::decode_all(compressed.as_slice())
            .map_err(|e| CoreError::Corruption(format!("invalid bloom bit array: {e}")))?;

        let expected_bytes = ((header.size_bits + 7) / 8) as usize;
        if bit_array.len() != expected_bytes {
            return Err(CoreError::Corruption(format!(
                "bloom bit array has {} bytes, expected {}",
                bit_array.len(),
                expected_bytes
            )));
        }

        Ok(BloomFilter {
            expected_items: header.expected_items,
            false_positive_rate: header.false_positive_rate,
            size_bits: header.size_bits,
            num_hashes: header.num_hashes,
            seeds: header.seeds,
            bit_array,
        })
    }
}

/// MurmurHash3 (x86, 32-bit). Chosen for the same reasons the prior
/// implementation picked `mmh3`: fast, well-distributed, no cryptographic
/// overhead needed for bit-position selection.
fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut hash = seed;
    let chunks = data.chunks_exact(4);
    let remainder = chunks.remainder();

    for chunk in chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        hash ^= k;
        hash = hash.rotate_left(13);
        hash = hash.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let mut k1: u32 = 0;
    match remainder.len() {
        3 => {
            k1 ^= (remainder[2] as u32) << 16;
            k1 ^= (remainder[1] as u32) << 8;
            k1 ^= remainder[0] as u32;
        }
        2 => {
            k1 ^= (remainder[1] as u32) << 8;
            k1 ^= remainder[0] as u32;
        }
        1 => {
            k1 ^= remainder[0] as u32;
        }
        _ => {}
    }
    if !remainder.is_empty() {
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        hash ^= k1;
    }

    hash ^= data.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85ebca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2ae35);
    hash ^= hash >> 16;
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_false_negatives_for_inserted_items() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        let items: Vec<String> = (0..500).map(|i| format!("artifact-{i}")).collect();
        bloom.insert_batch(&items);
        for item in &items {
            assert!(bloom.contains(item), "false negative for {item}");
        }
    }

    #[test]
    fn absent_item_is_usually_reported_absent() {
        let mut bloom = BloomFilter::new(1000, 0.001);
        bloom.insert("present");
        assert!(!bloom.contains("definitely-not-here"));
    }

    #[test]
    fn sizing_matches_bloom_1970_formula() {
        let bloom = BloomFilter::new(1_000_000, 0.001);
        // m = ceil(-n ln(p) / ln(2)^2) ≈ 14_377_588 for n=1e6, p=1e-3
        assert!(bloom.size_bits() > 14_000_000 && bloom.size_bits() < 14_500_000);
        assert!(bloom.num_hashes() >= 9 && bloom.num_hashes() <= 11);
    }

    #[test]
    fn union_and_intersection_require_matching_config() {
        let a = BloomFilter::new(100, 0.01);
        let b = BloomFilter::new(200, 0.01);
        assert!(a.union(&b).is_err());
        assert!(a.intersection(&b).is_err());
    }

    #[test]
    fn union_contains_items_from_either_input() {
        let mut a = BloomFilter::new(100, 0.01);
        let mut b = BloomFilter::new(100, 0.01);
        a.insert("from-a");
        b.insert("from-b");
        let u = a.union(&b).unwrap();
        assert!(u.contains("from-a"));
        assert!(u.contains("from-b"));
    }

    #[test]
    fn intersection_only_contains_shared_bits() {
        let mut a = BloomFilter::new(100, 0.01);
        let mut b = BloomFilter::new(100, 0.01);
        a.insert("shared");
        a.insert("only-a");
        b.insert("shared");
        let i = a.intersection(&b).unwrap();
        assert!(i.contains("shared"));
    }

    #[test]
    fn estimate_count_is_in_the_right_ballpark() {
        let mut bloom = BloomFilter::new(10_000, 0.001);
        for i in 0..5000 {
            bloom.insert(&format!("item-{i}"));
        }
        let estimate = bloom.estimate_count();
        assert!(estimate > 4000 && estimate < 6000, "estimate was {estimate}");
    }

    #[test]
    fn save_and_load_round_trip_preserves_membership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bloom.snap");

        let mut bloom = BloomFilter::new(1000, 0.01);
        let items: Vec<String> = (0..200).map(|i| format!("artifact-{i}")).collect();
        bloom.insert_batch(&items);
        bloom.save(&path).unwrap();

        let loaded = BloomFilter::load(&path).unwrap();
        for item in &items {
            assert!(loaded.contains(item));
        }
        assert_eq!(loaded.size_bits(), bloom.size_bits());
        assert_eq!(loaded.num_hashes(), bloom.num_hashes());
    }

    #[test]
    fn load_rejects_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bloom.snap");
        std::fs::write(&path, b"not a bloom snapshot").unwrap();
        assert!(BloomFilter::load(&path).is_err());
    }
}

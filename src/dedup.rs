//! Content-addressed deduplication index for m/z arrays.
//!
//! Two tiers back the adaptive write mode:
//!
//! 1. a recency cache of bounded capacity, keyed by exact array content,
//!    giving O(1) reuse for the arrays seen most recently;
//! 2. an unbounded fingerprint index mapping a coarse content summary to the
//!    locations of every array ever written in the session.
//!
//! The fingerprint is deliberately collision-prone: it shortlists candidates,
//! and the session performs a byte-exact comparison against the ibd before
//! trusting any of them. Eviction from the recency cache therefore only
//! raises lookup cost, never breaks correctness.

use std::collections::{HashMap, VecDeque};

use crate::ibd::ArrayLocation;

/// Recency-cache capacity used when the caller does not override it
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Coarse summary of array content: a CRC32 over the little-endian bit
/// pattern, the value sum, and the element count.
///
/// Computed from explicit bytes rather than a runtime `Hasher` so the same
/// array always fingerprints identically across processes and runs.
/// Fingerprint equality must never be treated as content equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    hash: u32,
    sum_bits: u64,
    len: u64,
}

impl Fingerprint {
    #[cfg(test)]
    pub(crate) fn synthetic(hash: u32, sum_bits: u64, len: u64) -> Self {
        Self { hash, sum_bits, len }
    }
}

/// Compute the dedup fingerprint of an array
pub fn fingerprint(values: &[f64]) -> Fingerprint {
    let mut crc = flate2::Crc::new();
    let mut sum = 0.0f64;
    for &v in values {
        crc.update(&v.to_le_bytes());
        sum += v;
    }
    Fingerprint {
        hash: crc.sum(),
        sum_bits: sum.to_bits(),
        len: values.len() as u64,
    }
}

/// Exact-content key: the bit pattern of every element, in order
fn key_of(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

/// Session-scoped dedup state for the m/z axis
pub struct DedupCache {
    capacity: usize,
    recent: HashMap<Vec<u64>, ArrayLocation>,
    order: VecDeque<Vec<u64>>,
    buckets: HashMap<Fingerprint, Vec<ArrayLocation>>,
    distinct_written: usize,
}

impl DedupCache {
    /// Create a cache whose recency tier holds at most `capacity` arrays
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: HashMap::new(),
            order: VecDeque::new(),
            buckets: HashMap::new(),
            distinct_written: 0,
        }
    }

    /// Fast path: exact-content hit in the recency tier.
    ///
    /// A hit marks the array most-recently-used.
    pub fn lookup_recent(&mut self, values: &[f64]) -> Option<ArrayLocation> {
        let key = key_of(values);
        let location = *self.recent.get(&key)?;
        self.touch(&key);
        Some(location)
    }

    /// Locations previously written under this fingerprint, oldest first.
    ///
    /// Callers must verify each candidate element-for-element against the
    /// stored bytes before reusing it.
    pub fn candidates(&self, fp: Fingerprint) -> &[ArrayLocation] {
        self.buckets.get(&fp).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Re-admit a fingerprint-verified array into the recency tier
    pub fn promote(&mut self, values: &[f64], location: ArrayLocation) {
        self.insert_recent(key_of(values), location);
    }

    /// Register a freshly written array in both tiers
    pub fn record_write(&mut self, fp: Fingerprint, values: &[f64], location: ArrayLocation) {
        self.buckets.entry(fp).or_default().push(location);
        self.insert_recent(key_of(values), location);
        self.distinct_written += 1;
    }

    /// Number of distinct arrays physically written through this cache.
    ///
    /// Drives finalize-time mode-label resolution for auto sessions and is
    /// immune to eviction, unlike the recency tier's length.
    pub fn distinct_written(&self) -> usize {
        self.distinct_written
    }

    /// Number of arrays currently in the recency tier
    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    #[cfg(test)]
    pub(crate) fn inject_candidate(&mut self, fp: Fingerprint, location: ArrayLocation) {
        self.buckets.entry(fp).or_default().push(location);
    }

    fn insert_recent(&mut self, key: Vec<u64>, location: ArrayLocation) {
        if self.recent.insert(key.clone(), location).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.recent.remove(&oldest);
            }
        }
    }

    fn touch(&mut self, key: &[u64]) {
        // Capacity is small, so the linear scan is cheaper than keeping a
        // secondary index.
        if let Some(at) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(at) {
                self.order.push_back(k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u64) -> ArrayLocation {
        ArrayLocation {
            offset,
            element_count: 2,
            encoded_byte_length: 16,
        }
    }

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = [100.0, 200.0, 300.0];
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_ne!(fingerprint(&a), fingerprint(&[100.0, 200.0, 300.5]));
        // Same sum and length, different order: only the CRC separates them.
        assert_ne!(fingerprint(&[1.0, 3.0]), fingerprint(&[3.0, 1.0]));
    }

    #[test]
    fn recent_hit_returns_the_recorded_location() {
        let mut cache = DedupCache::new(4);
        let a = [1.0, 2.0];
        cache.record_write(fingerprint(&a), &a, loc(16));
        assert_eq!(cache.lookup_recent(&a), Some(loc(16)));
        assert_eq!(cache.lookup_recent(&[1.0, 2.5]), None);
    }

    #[test]
    fn eviction_drops_the_oldest_but_keeps_the_fingerprint_bucket() {
        let mut cache = DedupCache::new(2);
        let arrays = [[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        for (i, a) in arrays.iter().enumerate() {
            cache.record_write(fingerprint(a), a, loc(16 + 16 * i as u64));
        }
        assert_eq!(cache.recent_len(), 2);
        // First array fell out of the recency tier...
        assert_eq!(cache.lookup_recent(&arrays[0]), None);
        // ...but its fingerprint bucket still points at the written copy.
        assert_eq!(cache.candidates(fingerprint(&arrays[0])), &[loc(16)]);
        assert_eq!(cache.distinct_written(), 3);
    }

    #[test]
    fn touching_an_entry_protects_it_from_eviction() {
        let mut cache = DedupCache::new(2);
        let a = [1.0];
        let b = [2.0];
        let c = [3.0];
        cache.record_write(fingerprint(&a), &a, loc(16));
        cache.record_write(fingerprint(&b), &b, loc(24));
        // Re-use `a`, making `b` the oldest.
        assert!(cache.lookup_recent(&a).is_some());
        cache.record_write(fingerprint(&c), &c, loc(32));
        assert!(cache.lookup_recent(&a).is_some());
        assert_eq!(cache.lookup_recent(&b), None);
    }

    #[test]
    fn colliding_fingerprints_share_a_bucket_without_merging() {
        let mut cache = DedupCache::new(4);
        let fp = Fingerprint::synthetic(0xDEAD_BEEF, 42, 2);
        let a = [1.0, 2.0];
        let b = [2.0, 1.0];
        cache.record_write(fp, &a, loc(16));
        cache.record_write(fp, &b, loc(32));

        // Both locations survive as distinct candidates under the shared
        // fingerprint; exact comparison is the caller's job.
        assert_eq!(cache.candidates(fp), &[loc(16), loc(32)]);
        // The exact-content tier never confuses the two.
        assert_eq!(cache.lookup_recent(&a), Some(loc(16)));
        assert_eq!(cache.lookup_recent(&b), Some(loc(32)));
        assert_eq!(cache.distinct_written(), 2);
    }

    #[test]
    fn promote_reinstates_an_evicted_array() {
        let mut cache = DedupCache::new(1);
        let a = [1.0];
        let b = [2.0];
        cache.record_write(fingerprint(&a), &a, loc(16));
        cache.record_write(fingerprint(&b), &b, loc(24));
        assert_eq!(cache.lookup_recent(&a), None);
        cache.promote(&a, loc(16));
        assert_eq!(cache.lookup_recent(&a), Some(loc(16)));
        // Promotion is not a write.
        assert_eq!(cache.distinct_written(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut cache = DedupCache::new(0);
        let a = [5.0];
        cache.record_write(fingerprint(&a), &a, loc(16));
        assert_eq!(cache.lookup_recent(&a), Some(loc(16)));
    }
}

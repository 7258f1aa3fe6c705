//! Lazily sharded array of atomic words.
//!
//! The directory is sized once from an upper bound on the number of
//! entries; shards are allocated on first write. Readers never lock:
//! `OnceLock::get` is an acquire load, and the writer initializes a shard
//! before any published count can point into it.

use std::sync::atomic::AtomicU64;
use std::sync::OnceLock;

/// Preferred shard size: 4096 words (32 KiB).
const SHARD_BITS: u32 = 12;

/// Directory length above which shards grow instead.
const DIRECTORY_BITS: u32 = 16;

pub(crate) struct AtomicSlab {
    shard_bits: u32,
    shard_mask: usize,
    shards: Box<[OnceLock<Box<[AtomicU64]>>]>,
}

impl AtomicSlab {
    /// Directory able to address `capacity` words.
    pub(crate) fn new(capacity: usize) -> Self {
        let bits = ceil_log2(capacity.max(1));
        let shard_bits = bits
            .saturating_sub(DIRECTORY_BITS)
            .max(SHARD_BITS)
            .min(bits);
        let shard_len = 1usize << shard_bits;
        let directory_len = capacity.max(1).div_ceil(shard_len);
        Self {
            shard_bits,
            shard_mask: shard_len - 1,
            shards: (0..directory_len).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Addressable words (directory length times shard length).
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.shards.len() << self.shard_bits
    }

    pub(crate) fn shard_len(&self) -> usize {
        1 << self.shard_bits
    }

    pub(crate) fn allocated_shards(&self) -> usize {
        self.shards.iter().filter(|s| s.get().is_some()).count()
    }

    /// Reader access. `None` if the index was never written.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<&AtomicU64> {
        let shard = self.shards.get(index >> self.shard_bits)?.get()?;
        shard.get(index & self.shard_mask)
    }

    /// Writer access: allocates the shard holding `index` if needed.
    ///
    /// Returns the word and whether a shard was allocated, or `None` when
    /// the index lies outside the directory.
    pub(crate) fn get_or_alloc(&self, index: usize) -> Option<(&AtomicU64, bool)> {
        let cell = self.shards.get(index >> self.shard_bits)?;
        let fresh = cell.get().is_none();
        let shard = cell.get_or_init(|| {
            (0..self.shard_len())
                .map(|_| AtomicU64::new(0))
                .collect()
        });
        Some((&shard[index & self.shard_mask], fresh))
    }
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_small_slab_uses_small_shard() {
        let slab = AtomicSlab::new(3);
        assert_eq!(slab.shard_len(), 4);
        assert_eq!(slab.capacity(), 4);
        assert_eq!(slab.allocated_shards(), 0);
    }

    #[test]
    fn test_lazy_allocation() {
        let slab = AtomicSlab::new(10_000);
        assert_eq!(slab.shard_len(), 4096);
        assert_eq!(slab.capacity(), 3 * 4096);
        assert!(slab.get(5000).is_none());

        let (word, fresh) = slab.get_or_alloc(5000).unwrap();
        assert!(fresh);
        word.store(77, Ordering::Relaxed);

        let (_, fresh) = slab.get_or_alloc(5001).unwrap();
        assert!(!fresh);
        assert_eq!(slab.allocated_shards(), 1);
        assert_eq!(slab.get(5000).unwrap().load(Ordering::Relaxed), 77);
        assert!(slab.get(0).is_none());
    }

    #[test]
    fn test_out_of_directory() {
        let slab = AtomicSlab::new(8);
        assert!(slab.get_or_alloc(slab.capacity()).is_none());
        assert!(slab.get(1 << 40).is_none());
    }

    #[test]
    fn test_huge_capacity_grows_shards() {
        let slab = AtomicSlab::new(1 << 30);
        assert_eq!(slab.shard_len(), 1 << 14);
        assert_eq!(slab.capacity(), 1 << 30);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4096), 12);
        assert_eq!(ceil_log2(4097), 13);
    }
}

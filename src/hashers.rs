use std::hash::{BuildHasher, Hasher};

use foldhash::fast::FixedState;

use crate::farmhash::fingerprint64;

/// A hash over a whole byte slice, with no per-instance state.
pub trait StatelessBytesHasher {
    const NAME: &'static str;

    fn hash(bytes: &[u8]) -> u64;
}

pub struct FarmFingerprint;

impl StatelessBytesHasher for FarmFingerprint {
    const NAME: &'static str = "FarmHash Fingerprint64";

    #[inline(always)]
    fn hash(bytes: &[u8]) -> u64 {
        fingerprint64(bytes)
    }
}

/// foldhash with a fixed seed. Fast, but not stable across foldhash releases,
/// so only useful as a baseline.
pub struct FoldHash;

const FOLDHASH_SEED: u64 = 0;

impl StatelessBytesHasher for FoldHash {
    const NAME: &'static str = "FoldHash (fixed seed)";

    #[inline(always)]
    fn hash(bytes: &[u8]) -> u64 {
        let mut hasher = FixedState::with_seed(FOLDHASH_SEED).build_hasher();
        hasher.write(bytes);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farm_fingerprint_is_fingerprint64() {
        assert_eq!(FarmFingerprint::hash(b"hello"), 0xb48be5a931380ce8);
    }

    #[test]
    fn foldhash_is_stable_within_a_build() {
        assert_eq!(FoldHash::hash(b"abc123"), FoldHash::hash(b"abc123"));
        assert_ne!(FoldHash::hash(b"abc123"), FoldHash::hash(b"abc124"));
    }
}

//! Maps identifiers to experiment buckets.
//!
//! Mirrors the warehouse expression
//! `MOD(ABS(FARM_FINGERPRINT(CONCAT(id, tag, salt))), 100)`.

use crate::farmhash::fingerprint64;

pub const DEFAULT_EXPERIMENT_TAG: &str = "test:1";
pub const DEFAULT_SALT: &str = "salt-2025";
pub const NUM_BUCKETS: u32 = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BucketError {
    #[error("bucket count must be at least 1")]
    ZeroBuckets,
}

/// Two's-complement magnitude of `value`, as the warehouse computes `ABS`.
///
/// `i64::MIN` has no positive counterpart: negating it wraps back to itself,
/// so the result is `2^63`. This is kept as is because downstream assignments
/// already depend on it.
#[inline(always)]
pub fn abs_as_unsigned(value: i64) -> u64 {
    let bits = value as u64;
    if value >= 0 { bits } else { (!bits).wrapping_add(1) }
}

/// Reduces a fingerprint to a bucket in `[0, num_buckets)`.
///
/// Panics if `num_buckets` is zero; [`BucketMapper`] rules that out up front.
#[inline(always)]
pub fn bucket_from_fingerprint(fingerprint: u64, num_buckets: u32) -> u32 {
    (abs_as_unsigned(fingerprint as i64) % num_buckets as u64) as u32
}

/// Bucket in `[0, 100)` for `identifier` under the given experiment tag and salt.
pub fn bucket_of(identifier: &str, experiment_tag: &str, salt: &str) -> u32 {
    let mut payload = Vec::with_capacity(identifier.len() + experiment_tag.len() + salt.len());
    write_payload(&mut payload, identifier, experiment_tag, salt);
    bucket_from_fingerprint(fingerprint64(&payload), NUM_BUCKETS)
}

#[inline(always)]
fn write_payload(payload: &mut Vec<u8>, identifier: &str, experiment_tag: &str, salt: &str) {
    payload.clear();
    payload.extend_from_slice(identifier.as_bytes());
    payload.extend_from_slice(experiment_tag.as_bytes());
    payload.extend_from_slice(salt.as_bytes());
}

/// A fixed experiment tag, salt and bucket count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketMapper {
    experiment_tag: String,
    salt: String,
    num_buckets: u32,
}

impl BucketMapper {
    pub fn new(
        experiment_tag: impl Into<String>,
        salt: impl Into<String>,
        num_buckets: u32,
    ) -> Result<Self, BucketError> {
        if num_buckets == 0 {
            return Err(BucketError::ZeroBuckets);
        }
        Ok(Self {
            experiment_tag: experiment_tag.into(),
            salt: salt.into(),
            num_buckets,
        })
    }

    pub fn experiment_tag(&self) -> &str {
        &self.experiment_tag
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    pub fn fingerprint(&self, identifier: &str) -> u64 {
        let mut payload = Vec::new();
        self.fingerprint_with(&mut payload, identifier)
    }

    pub fn bucket(&self, identifier: &str) -> u32 {
        bucket_from_fingerprint(self.fingerprint(identifier), self.num_buckets)
    }

    /// Like [`BucketMapper::bucket`], reusing `payload` as scratch space.
    pub fn bucket_with(&self, payload: &mut Vec<u8>, identifier: &str) -> u32 {
        bucket_from_fingerprint(self.fingerprint_with(payload, identifier), self.num_buckets)
    }

    fn fingerprint_with(&self, payload: &mut Vec<u8>, identifier: &str) -> u64 {
        write_payload(payload, identifier, &self.experiment_tag, &self.salt);
        fingerprint64(payload)
    }
}

impl Default for BucketMapper {
    fn default() -> Self {
        Self {
            experiment_tag: DEFAULT_EXPERIMENT_TAG.to_string(),
            salt: DEFAULT_SALT.to_string(),
            num_buckets: NUM_BUCKETS,
        }
    }
}

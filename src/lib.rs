//! Deterministic FarmHash fingerprints and the percentage buckets derived
//! from them.

pub mod accuracy;
pub mod bucket;
pub mod farmhash;
pub mod hashers;

pub use bucket::{BucketMapper, bucket_of};
pub use farmhash::fingerprint64;

//! FarmHash `Fingerprint64` (the farmhashna variant).
//!
//! The output must match other implementations bit for bit (BigQuery's
//! `FARM_FINGERPRINT` among them), so none of the constants or rotation
//! amounts below are tunable. All arithmetic wraps modulo 2^64 and every
//! right shift is a logical shift on `u64`.

pub const K0: u64 = 0xc3a5c85c97cb3127;
pub const K1: u64 = 0xb492b66fbe98f273;
pub const K2: u64 = 0x9ae16a3b2f90404f;
pub const KMUL: u64 = 0x9ddfea08eb382d69;

const SEED: u64 = 81;
const STRIDE: usize = 64;

/// Which mixing routine handles an input of a given length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthClass {
    /// 0..=16 bytes.
    Short,
    /// 17..=32 bytes.
    Pair32,
    /// 33..=64 bytes.
    Pair64,
    /// 65 bytes and up, processed in 64-byte strides.
    Chunked,
}

impl LengthClass {
    #[inline(always)]
    pub fn of(len: usize) -> Self {
        match len {
            0..=16 => LengthClass::Short,
            17..=32 => LengthClass::Pair32,
            33..=64 => LengthClass::Pair64,
            _ => LengthClass::Chunked,
        }
    }
}

/// Fingerprints `s`. Deterministic across hosts and calls.
pub fn fingerprint64(s: &[u8]) -> u64 {
    match LengthClass::of(s.len()) {
        LengthClass::Short => hash_len_0_to_16(s),
        LengthClass::Pair32 => hash_len_17_to_32(s),
        LengthClass::Pair64 => hash_len_33_to_64(s),
        LengthClass::Chunked => hash_chunked(s),
    }
}

pub fn fingerprint64_str(s: &str) -> u64 {
    fingerprint64(s.as_bytes())
}

/// `hash_len16` specialised to `KMUL`.
#[inline(always)]
pub fn hash_128_to_64(u: u64, v: u64) -> u64 {
    hash_len16(u, v, KMUL)
}

// Reads past the end of `s` panic: that is a dispatch bug, never bad input.
#[inline(always)]
fn fetch64(s: &[u8], i: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&s[i..i + 8]);
    u64::from_le_bytes(word)
}

#[inline(always)]
fn fetch32(s: &[u8], i: usize) -> u64 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&s[i..i + 4]);
    u32::from_le_bytes(word) as u64
}

#[inline(always)]
fn shift_mix(value: u64) -> u64 {
    value ^ (value >> 47)
}

#[inline(always)]
fn hash_len16(u: u64, v: u64, mul: u64) -> u64 {
    let mut a = (u ^ v).wrapping_mul(mul);
    a ^= a >> 47;
    let mut b = (v ^ a).wrapping_mul(mul);
    b ^= b >> 47;
    b.wrapping_mul(mul)
}

#[inline(always)]
fn len_mul(len: usize) -> u64 {
    K2.wrapping_add((len as u64).wrapping_mul(2))
}

fn hash_len_0_to_16(s: &[u8]) -> u64 {
    let len = s.len();
    if len >= 8 {
        let mul = len_mul(len);
        let a = fetch64(s, 0).wrapping_add(K2);
        let b = fetch64(s, len - 8);
        let c = b.rotate_right(37).wrapping_mul(mul).wrapping_add(a);
        let d = a.rotate_right(25).wrapping_add(b).wrapping_mul(mul);
        return hash_len16(c, d, mul);
    }
    if len >= 4 {
        let mul = len_mul(len);
        let a = fetch32(s, 0);
        let b = fetch32(s, len - 4);
        return hash_len16((len as u64).wrapping_add(a << 3), b, mul);
    }
    if len > 0 {
        let a = s[0] as u32;
        let b = s[len >> 1] as u32;
        let c = s[len - 1] as u32;
        let y = a + (b << 8);
        let z = len as u32 + (c << 2);
        return shift_mix((y as u64).wrapping_mul(K2) ^ (z as u64).wrapping_mul(K0))
            .wrapping_mul(K2);
    }
    K2
}

fn hash_len_17_to_32(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = len_mul(len);
    let a = fetch64(s, 0).wrapping_mul(K1);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 8).wrapping_mul(mul);
    let d = fetch64(s, len - 16).wrapping_mul(K2);
    hash_len16(
        a.wrapping_add(b)
            .rotate_right(43)
            .wrapping_add(c.rotate_right(30))
            .wrapping_add(d),
        a.wrapping_add(b.wrapping_add(K2).rotate_right(18))
            .wrapping_add(c),
        mul,
    )
}

fn hash_len_33_to_64(s: &[u8]) -> u64 {
    let len = s.len();
    let mul = len_mul(len);
    let a = fetch64(s, 0).wrapping_mul(K2);
    let b = fetch64(s, 8);
    let c = fetch64(s, len - 8).wrapping_mul(mul);
    let d = fetch64(s, len - 16).wrapping_mul(K2);
    let y = a
        .wrapping_add(b)
        .rotate_right(43)
        .wrapping_add(c.rotate_right(30))
        .wrapping_add(d);
    let z = hash_len16(
        y,
        a.wrapping_add(b.wrapping_add(K2).rotate_right(18))
            .wrapping_add(c),
        mul,
    );
    let e = fetch64(s, 16).wrapping_mul(mul);
    let f = fetch64(s, 24);
    let g = y.wrapping_add(fetch64(s, len - 32)).wrapping_mul(mul);
    let h = z.wrapping_add(fetch64(s, len - 24)).wrapping_mul(mul);
    hash_len16(
        e.wrapping_add(f)
            .rotate_right(43)
            .wrapping_add(g.rotate_right(30))
            .wrapping_add(h),
        e.wrapping_add(f.wrapping_add(a).rotate_right(18))
            .wrapping_add(g),
        mul,
    )
}

/// Mixes the 32 bytes at `s[offset..offset + 32]` into the seed pair `(a, b)`.
#[inline(always)]
fn weak_hash_len32_with_seeds(s: &[u8], offset: usize, mut a: u64, mut b: u64) -> (u64, u64) {
    let w = fetch64(s, offset);
    let x = fetch64(s, offset + 8);
    let y = fetch64(s, offset + 16);
    let z = fetch64(s, offset + 24);
    a = a.wrapping_add(w);
    b = b.wrapping_add(a).wrapping_add(z).rotate_right(21);
    let c = a;
    a = a.wrapping_add(x).wrapping_add(y);
    b = b.wrapping_add(a.rotate_right(44));
    (a.wrapping_add(z), b.wrapping_add(c))
}

/// Running state of the chunked routine.
struct Accumulator {
    x: u64,
    y: u64,
    z: u64,
    v: (u64, u64),
    w: (u64, u64),
}

impl Accumulator {
    fn new(s: &[u8]) -> Self {
        let y = SEED.wrapping_mul(K1).wrapping_add(113);
        let z = shift_mix(y.wrapping_mul(K2).wrapping_add(113)).wrapping_mul(K2);
        Self {
            x: SEED.wrapping_mul(K2).wrapping_add(fetch64(s, 0)),
            y,
            z,
            v: (0, 0),
            w: (0, 0),
        }
    }

    /// One 64-byte stride at `offset`. Full strides use `mul = K1, weight = 1`;
    /// the tail stride uses the adjusted multiplier and `weight = 9`.
    #[inline(always)]
    fn stride(&mut self, s: &[u8], offset: usize, mul: u64, weight: u64) {
        self.x = self
            .x
            .wrapping_add(self.y)
            .wrapping_add(self.v.0)
            .wrapping_add(fetch64(s, offset + 8))
            .rotate_right(37)
            .wrapping_mul(mul);
        self.y = self
            .y
            .wrapping_add(self.v.1)
            .wrapping_add(fetch64(s, offset + 48))
            .rotate_right(42)
            .wrapping_mul(mul);
        self.x ^= self.w.1.wrapping_mul(weight);
        self.y = self
            .y
            .wrapping_add(self.v.0.wrapping_mul(weight))
            .wrapping_add(fetch64(s, offset + 40));
        self.z = self
            .z
            .wrapping_add(self.w.0)
            .rotate_right(33)
            .wrapping_mul(mul);
        self.v = weak_hash_len32_with_seeds(
            s,
            offset,
            self.v.1.wrapping_mul(mul),
            self.x.wrapping_add(self.w.0),
        );
        self.w = weak_hash_len32_with_seeds(
            s,
            offset + 32,
            self.z.wrapping_add(self.w.1),
            self.y.wrapping_add(fetch64(s, offset + 16)),
        );
        std::mem::swap(&mut self.x, &mut self.z);
    }
}

fn hash_chunked(s: &[u8]) -> u64 {
    let len = s.len();
    let mut acc = Accumulator::new(s);

    // Every full stride except the one holding the final byte.
    let end = ((len - 1) / STRIDE) * STRIDE;
    let mut offset = 0;
    while offset < end {
        acc.stride(s, offset, K1, 1);
        offset += STRIDE;
    }

    // The tail stride is the last 64 bytes, overlapping earlier ones when
    // `len` is not a multiple of 64.
    let last64 = len - STRIDE;
    let mul = K1.wrapping_add((acc.z & 0xff) << 1);
    acc.w.0 = acc.w.0.wrapping_add(((len - 1) & 63) as u64);
    acc.v.0 = acc.v.0.wrapping_add(acc.w.0);
    acc.w.0 = acc.w.0.wrapping_add(acc.v.0);
    acc.stride(s, last64, mul, 9);

    hash_len16(
        hash_len16(acc.v.0, acc.w.0, mul)
            .wrapping_add(shift_mix(acc.y).wrapping_mul(K0))
            .wrapping_add(acc.z),
        hash_len16(acc.v.1, acc.w.1, mul).wrapping_add(acc.x),
        mul,
    )
}

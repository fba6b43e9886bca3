//! Gap (delta) encoding of ascending prime runs

use super::varint;
use crate::error::{Error, Result};

/// Gaps between consecutive primes: `[p1-p0, p2-p1, ...]`.
///
/// The input must be strictly ascending; fewer than two primes yield no gaps.
pub fn gaps_from_primes(primes: &[u64]) -> Vec<u64> {
    primes
        .windows(2)
        .map(|pair| {
            debug_assert!(pair[1] > pair[0], "primes must be strictly ascending");
            pair[1] - pair[0]
        })
        .collect()
}

/// Rebuild a prime run from its first prime and the gaps that follow it.
pub fn primes_from_start(start_prime: u64, gaps: &[u64]) -> Vec<u64> {
    let mut primes = Vec::with_capacity(gaps.len() + 1);
    let mut current = start_prime;
    primes.push(current);

    for &gap in gaps {
        current += gap;
        primes.push(current);
    }

    primes
}

/// Concatenate the varint encodings of `gaps`.
pub fn compress(gaps: &[u64]) -> Vec<u8> {
    // Almost every prime gap below 2^64 fits in one or two bytes
    let mut block = Vec::with_capacity(gaps.len() + gaps.len() / 8);
    for &gap in gaps {
        varint::encode_into(&mut block, gap);
    }
    block
}

/// Decode every gap in `block`.
///
/// A partial varint at the end of the block is a `MalformedEncoding` error.
pub fn decompress(block: &[u8]) -> Result<Vec<u64>> {
    let mut gaps = Vec::with_capacity(block.len());
    let mut offset = 0;

    while offset < block.len() {
        let (gap, next) = varint::decode(block, offset)?;
        gaps.push(gap);
        offset = next;
    }

    Ok(gaps)
}

/// Decode `block` and require exactly `expected` gaps.
pub fn decompress_exact(block: &[u8], expected: usize) -> Result<Vec<u64>> {
    let gaps = decompress(block)?;
    if gaps.len() != expected {
        return Err(Error::MalformedEncoding(format!(
            "expected {} gaps, block holds {}",
            expected,
            gaps.len()
        )));
    }
    Ok(gaps)
}

/// Space used by a compressed run compared to plain `u64` storage
#[derive(Debug, Clone)]
pub struct CompressionStats {
    pub prime_count: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub ratio: f64,
}

impl CompressionStats {
    pub fn new(prime_count: u64, compressed_size: u64) -> Self {
        let original_size = prime_count * 8;
        let ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            1.0
        };
        Self {
            prime_count,
            original_size,
            compressed_size,
            ratio,
        }
    }

    /// Calculate space saved (percentage)
    pub fn space_saved_percent(&self) -> f64 {
        (1.0 - self.ratio) * 100.0
    }

    pub fn bytes_per_prime(&self) -> f64 {
        if self.prime_count == 0 {
            0.0
        } else {
            self.compressed_size as f64 / self.prime_count as f64
        }
    }
}

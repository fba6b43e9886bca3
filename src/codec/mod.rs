//! Prime sequence codecs
//!
//! Primes are never stored directly. A segment keeps its first prime and the
//! gaps to each following prime, and every gap is written as a varint:
//!
//! ```text
//! primes:  [2, 3, 5, 7, 11]
//! gaps:       [1, 2, 2, 4]          (gaps_from_primes)
//! bytes:      [01 02 02 04]         (compress)
//! ```
//!
//! Gaps below 128 take one byte, so a prime costs roughly one byte on disk
//! instead of eight.

pub mod delta;
pub mod varint;

pub use delta::{
    compress, decompress, decompress_exact, gaps_from_primes, primes_from_start,
    CompressionStats,
};
pub use varint::{decode, encode, encode_into, encoded_len, MAX_VARINT_LEN};

//! Immutable prime segments
//!
//! # Record payload
//!
//! ```text
//! +------------+-------------+-----------+-------------+--------------+------------+-------------------+
//! | segment_id | start_index | end_index | start_prime | segment_size | deltas_len | compressed_deltas |
//! |  u64 LE    |   u64 LE    |  u64 LE   |   u64 LE    |    u64 LE    |   u32 LE   |  deltas_len bytes |
//! +------------+-------------+-----------+-------------+--------------+------------+-------------------+
//! ```

use crate::codec::{compress, decompress_exact, gaps_from_primes, primes_from_start};
use crate::error::{Error, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Fixed-width part of an encoded segment payload
pub const SEGMENT_HEADER_LEN: usize = 5 * 8 + 4;

/// Boundary metadata of a segment (everything but the gap block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub segment_id: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub start_prime: u64,
    pub segment_size: u64,
    pub compressed_len: u64,
}

impl SegmentInfo {
    pub fn contains(&self, index: u64) -> bool {
        self.start_index <= index && index <= self.end_index
    }

    /// Parse the fixed-width header at the front of a payload.
    ///
    /// Only boundary fields are read; the gap block is not touched.
    pub fn decode_header(header: &[u8]) -> Result<Self> {
        if header.len() < SEGMENT_HEADER_LEN {
            return Err(Error::MalformedEncoding(format!(
                "segment header too short: {} bytes",
                header.len()
            )));
        }

        let mut buf = header;
        let info = Self {
            segment_id: buf.get_u64_le(),
            start_index: buf.get_u64_le(),
            end_index: buf.get_u64_le(),
            start_prime: buf.get_u64_le(),
            segment_size: buf.get_u64_le(),
            compressed_len: buf.get_u32_le() as u64,
        };
        info.validate()?;
        Ok(info)
    }

    /// Check the declared range against the declared size.
    pub fn validate(&self) -> Result<()> {
        if self.start_index == 0 || self.segment_size == 0 {
            return Err(Error::MalformedEncoding(format!(
                "segment {} has an empty or zero-based range",
                self.segment_id
            )));
        }
        if self.end_index.checked_sub(self.start_index).map(|span| span + 1)
            != Some(self.segment_size)
        {
            return Err(Error::MalformedEncoding(format!(
                "segment {} declares size {} for range [{}, {}]",
                self.segment_id, self.segment_size, self.start_index, self.end_index
            )));
        }
        Ok(())
    }

    /// Bytes of the full payload this header describes
    pub fn payload_len(&self) -> u64 {
        SEGMENT_HEADER_LEN as u64 + self.compressed_len
    }
}

/// One immutable, contiguous run of primes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub segment_id: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub start_prime: u64,
    pub segment_size: u64,
    /// Varint-encoded gaps, `segment_size - 1` of them
    pub compressed_deltas: Vec<u8>,
}

impl Segment {
    /// Compress an ascending run of primes whose first element sits at `start_index`.
    pub fn from_primes(segment_id: u64, start_index: u64, primes: &[u64]) -> Result<Self> {
        let (&start_prime, _) = primes.split_first().ok_or_else(|| {
            Error::GenerationFailure(format!("segment {} has no primes", segment_id))
        })?;
        if start_index == 0 {
            return Err(Error::GenerationFailure(
                "prime indices start at 1".to_string(),
            ));
        }
        if let Some(pair) = primes.windows(2).find(|pair| pair[1] <= pair[0]) {
            return Err(Error::GenerationFailure(format!(
                "segment {} is not strictly ascending ({} then {})",
                segment_id, pair[0], pair[1]
            )));
        }

        let segment_size = primes.len() as u64;
        Ok(Self {
            segment_id,
            start_index,
            end_index: start_index + segment_size - 1,
            start_prime,
            segment_size,
            compressed_deltas: compress(&gaps_from_primes(primes)),
        })
    }

    pub fn info(&self) -> SegmentInfo {
        SegmentInfo {
            segment_id: self.segment_id,
            start_index: self.start_index,
            end_index: self.end_index,
            start_prime: self.start_prime,
            segment_size: self.segment_size,
            compressed_len: self.compressed_deltas.len() as u64,
        }
    }

    pub fn contains(&self, index: u64) -> bool {
        self.start_index <= index && index <= self.end_index
    }

    /// Decode the gap block, checking it against the declared size.
    pub fn gaps(&self) -> Result<Vec<u64>> {
        let expected = self.segment_size.saturating_sub(1) as usize;
        decompress_exact(&self.compressed_deltas, expected)
    }

    /// Reconstruct every prime in `[start_index, end_index]`.
    pub fn primes(&self) -> Result<Vec<u64>> {
        Ok(primes_from_start(self.start_prime, &self.gaps()?))
    }

    /// Last prime of the segment (needs a full decode).
    pub fn last_prime(&self) -> Result<u64> {
        Ok(self.start_prime + self.gaps()?.iter().sum::<u64>())
    }

    /// Check the internal shape of the record.
    pub fn validate(&self) -> Result<()> {
        self.info().validate()
    }

    /// Serialize to the on-disk payload layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SEGMENT_HEADER_LEN + self.compressed_deltas.len());
        buf.put_u64_le(self.segment_id);
        buf.put_u64_le(self.start_index);
        buf.put_u64_le(self.end_index);
        buf.put_u64_le(self.start_prime);
        buf.put_u64_le(self.segment_size);
        buf.put_u32_le(self.compressed_deltas.len() as u32);
        buf.put_slice(&self.compressed_deltas);
        buf
    }

    /// Parse and validate an on-disk payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let info = SegmentInfo::decode_header(payload)?;
        let deltas = &payload[SEGMENT_HEADER_LEN..];
        if deltas.len() as u64 != info.compressed_len {
            return Err(Error::MalformedEncoding(format!(
                "segment {} declares {} delta bytes, payload holds {}",
                info.segment_id,
                info.compressed_len,
                deltas.len()
            )));
        }

        Ok(Self {
            segment_id: info.segment_id,
            start_index: info.start_index,
            end_index: info.end_index,
            start_prime: info.start_prime,
            segment_size: info.segment_size,
            compressed_deltas: deltas.to_vec(),
        })
    }
}

/// Check that `next` continues the segment sequence after `last`.
///
/// The first segment must have id 0 and start at index 1.
pub fn check_continuation(last: Option<&SegmentInfo>, next: &Segment) -> Result<()> {
    check_info_continuation(last, &next.info())
}

/// `check_continuation` on boundary metadata alone.
pub fn check_info_continuation(last: Option<&SegmentInfo>, next: &SegmentInfo) -> Result<()> {
    let (expected_id, expected_start) = match last {
        Some(last) => (last.segment_id + 1, last.end_index + 1),
        None => (0, 1),
    };

    if next.segment_id != expected_id {
        return Err(Error::GenerationFailure(format!(
            "expected segment id {}, got {}",
            expected_id, next.segment_id
        )));
    }
    if next.start_index != expected_start {
        return Err(Error::GenerationFailure(format!(
            "segment {} starts at index {}, expected {}",
            next.segment_id, next.start_index, expected_start
        )));
    }
    next.validate()
        .map_err(|e| Error::GenerationFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primes() -> Result<()> {
        let segment = Segment::from_primes(0, 1, &[2, 3, 5, 7, 11])?;
        assert_eq!(segment.start_index, 1);
        assert_eq!(segment.end_index, 5);
        assert_eq!(segment.start_prime, 2);
        assert_eq!(segment.segment_size, 5);
        assert_eq!(segment.compressed_deltas, vec![1, 2, 2, 4]);
        assert_eq!(segment.primes()?, vec![2, 3, 5, 7, 11]);
        assert_eq!(segment.last_prime()?, 11);
        assert!(segment.contains(1) && segment.contains(5));
        assert!(!segment.contains(0) && !segment.contains(6));
        Ok(())
    }

    #[test]
    fn test_single_prime_segment() -> Result<()> {
        let segment = Segment::from_primes(3, 10, &[29])?;
        assert_eq!(segment.end_index, 10);
        assert!(segment.compressed_deltas.is_empty());
        assert_eq!(segment.primes()?, vec![29]);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            Segment::from_primes(0, 1, &[]),
            Err(Error::GenerationFailure(_))
        ));
        assert!(matches!(
            Segment::from_primes(0, 0, &[2, 3]),
            Err(Error::GenerationFailure(_))
        ));
        assert!(matches!(
            Segment::from_primes(0, 1, &[2, 5, 3]),
            Err(Error::GenerationFailure(_))
        ));
    }

    #[test]
    fn test_encode_decode() -> Result<()> {
        let segment = Segment::from_primes(4, 101, &[547, 557, 563, 569, 571])?;
        let payload = segment.encode();
        assert_eq!(payload.len(), SEGMENT_HEADER_LEN + 4);
        assert_eq!(Segment::decode(&payload)?, segment);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_truncation_and_bad_shape() -> Result<()> {
        let segment = Segment::from_primes(0, 1, &[2, 3, 5, 7])?;
        let payload = segment.encode();

        assert!(matches!(
            Segment::decode(&payload[..10]),
            Err(Error::MalformedEncoding(_))
        ));
        assert!(matches!(
            Segment::decode(&payload[..payload.len() - 1]),
            Err(Error::MalformedEncoding(_))
        ));

        let mut wrong_size = segment.clone();
        wrong_size.segment_size = 9;
        assert!(matches!(
            Segment::decode(&wrong_size.encode()),
            Err(Error::MalformedEncoding(_))
        ));
        Ok(())
    }

    #[test]
    fn test_header_only_decode() -> Result<()> {
        let segment = Segment::from_primes(2, 201, &[1229, 1231, 1237, 1249])?;
        let mut payload = segment.encode();
        // Damage the gap block; the header still parses
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;

        let info = SegmentInfo::decode_header(&payload[..SEGMENT_HEADER_LEN])?;
        assert_eq!(info, segment.info());
        assert_eq!(info.payload_len(), payload.len() as u64);

        assert!(matches!(
            SegmentInfo::decode_header(&payload[..20]),
            Err(Error::MalformedEncoding(_))
        ));
        Ok(())
    }

    #[test]
    fn test_gap_count_must_match_size() {
        let mut segment = Segment::from_primes(0, 1, &[2, 3, 5, 7]).unwrap();
        segment.compressed_deltas.push(2);
        assert!(matches!(segment.primes(), Err(Error::MalformedEncoding(_))));
    }

    #[test]
    fn test_check_continuation() -> Result<()> {
        let first = Segment::from_primes(0, 1, &[2, 3, 5])?;
        check_continuation(None, &first)?;

        let second = Segment::from_primes(1, 4, &[7, 11])?;
        check_continuation(Some(&first.info()), &second)?;

        let gap = Segment::from_primes(1, 5, &[11, 13])?;
        assert!(matches!(
            check_continuation(Some(&first.info()), &gap),
            Err(Error::GenerationFailure(_))
        ));

        let reused_id = Segment::from_primes(0, 4, &[7, 11])?;
        assert!(matches!(
            check_continuation(Some(&first.info()), &reused_id),
            Err(Error::GenerationFailure(_))
        ));

        let not_first = Segment::from_primes(0, 2, &[3])?;
        assert!(check_continuation(None, &not_first).is_err());
        Ok(())
    }
}

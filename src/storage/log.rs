//! Append-only segment log
//!
//! Segments are appended to a single file, one checksummed record each:
//!
//! ```text
//! +-----------+------------------+-----------+
//! |length:u32 | segment payload  |crc32:u32  |
//! +-----------+------------------+-----------+
//! | 4 bytes   | variable length  | 4 bytes   |
//! +-----------+------------------+-----------+
//! ```
//!
//! Recovery: on open the file is scanned front to back to rebuild the
//! in-memory boundary index. Only the length prefix and the fixed header of
//! each record are read; gap blocks are skipped. The last record is read in
//! full and checksummed: if it is torn (short length, short payload or bad
//! checksum) it is ignored and cut off by the next append.
//!
//! Checksums of earlier records are verified when a lookup reads them, so a
//! damaged gap block fails only the lookups that land in its segment.
//!
//! Visibility: a segment enters the index only after its record has been
//! written and synced, so readers never observe a partial segment.

use super::segment::{
    check_continuation, check_info_continuation, Segment, SegmentInfo, SEGMENT_HEADER_LEN,
};
use crate::error::{Error, Result};
use crc::{Crc, CRC_32_ISCSI};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Length prefix plus trailing checksum
const RECORD_OVERHEAD: u64 = 8;

pub const LOG_FILE_NAME: &str = "segments.log";

/// Location of one committed segment inside the log
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    info: SegmentInfo,
    /// File offset of the payload (after the length prefix)
    offset: u64,
    len: u32,
}

struct Writer {
    file: File,
    /// End of the last complete record
    valid_len: u64,
}

/// Segment log with an in-memory boundary index
pub struct SegmentLog {
    path: PathBuf,
    writer: Mutex<Writer>,
    /// Positional reads only, shared by concurrent lookups
    reader: File,
    /// Sorted by construction: ids and index ranges only grow
    index: RwLock<Vec<IndexEntry>>,
}

impl SegmentLog {
    /// Create or open the log inside `base_path`
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path).map_err(|e| {
            Error::StorageUnavailable(format!("Failed to create store dir {:?}: {}", base_path, e))
        })?;

        let path = base_path.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                Error::StorageUnavailable(format!("Failed to open segment log {:?}: {}", path, e))
            })?;

        let (entries, valid_len) = scan(&file, 0, None)?;
        let reader = File::open(&path)
            .map_err(|e| Error::StorageUnavailable(format!("Failed to open log reader: {}", e)))?;

        info!(
            path = ?path,
            segments = entries.len(),
            bytes = valid_len,
            "Segment log recovered"
        );

        Ok(Self {
            path,
            writer: Mutex::new(Writer { file, valid_len }),
            reader,
            index: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the next segment and make it visible.
    pub fn append(&self, segment: &Segment) -> Result<SegmentInfo> {
        let mut writer = self.writer.lock();

        let last = self.index.read().last().map(|entry| entry.info);
        check_continuation(last.as_ref(), segment)?;

        let payload = segment.encode();
        let len = u32::try_from(payload.len()).map_err(|_| {
            Error::GenerationFailure(format!(
                "segment {} payload of {} bytes exceeds record limit",
                segment.segment_id,
                payload.len()
            ))
        })?;

        let mut record = Vec::with_capacity(payload.len() + RECORD_OVERHEAD as usize);
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&CRC32.checksum(&payload).to_le_bytes());

        let file_len = writer.file.metadata()?.len();
        if file_len != writer.valid_len {
            warn!(
                file_len,
                valid_len = writer.valid_len,
                "Discarding torn tail of segment log"
            );
            writer.file.set_len(writer.valid_len)?;
        }

        let offset = writer.valid_len;
        writer.file.seek(SeekFrom::Start(offset))?;
        writer.file.write_all(&record)?;
        writer.file.sync_data()?;
        writer.valid_len = offset + record.len() as u64;

        let info = segment.info();
        self.index.write().push(IndexEntry {
            info,
            offset: offset + 4,
            len,
        });

        debug!(
            segment_id = info.segment_id,
            start_index = info.start_index,
            end_index = info.end_index,
            compressed_len = info.compressed_len,
            "Appended segment"
        );
        Ok(info)
    }

    /// Scan for records appended by another writer since the last scan.
    pub fn refresh(&self) -> Result<usize> {
        let mut writer = self.writer.lock();
        let last = self.index.read().last().map(|entry| entry.info);

        let (entries, valid_len) = scan(&writer.file, writer.valid_len, last)?;
        writer.valid_len = valid_len;

        let count = entries.len();
        if count > 0 {
            self.index.write().extend(entries);
            debug!(new_segments = count, "Refreshed segment log");
        }
        Ok(count)
    }

    /// Segment whose range contains `index`, by binary search over boundaries.
    pub fn find(&self, index: u64) -> Result<Segment> {
        let entry = self.locate(index)?;
        self.read_entry(&entry)
    }

    /// Boundary metadata of the segment containing `index`, without disk I/O.
    pub fn find_info(&self, index: u64) -> Result<SegmentInfo> {
        Ok(self.locate(index)?.info)
    }

    fn locate(&self, index: u64) -> Result<IndexEntry> {
        let entries = self.index.read();
        let position = entries.partition_point(|entry| entry.info.end_index < index);
        match entries.get(position) {
            Some(entry) if entry.info.contains(index) => Ok(*entry),
            _ => Err(Error::NotFound(index)),
        }
    }

    pub fn last(&self) -> Result<Option<Segment>> {
        let entry = self.index.read().last().copied();
        entry.map(|entry| self.read_entry(&entry)).transpose()
    }

    pub fn infos(&self) -> Vec<SegmentInfo> {
        self.index.read().iter().map(|entry| entry.info).collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Highest committed prime index (0 when empty)
    pub fn max_index(&self) -> u64 {
        self.index.read().last().map_or(0, |entry| entry.info.end_index)
    }

    /// Bytes of complete records in the log
    pub fn size_bytes(&self) -> u64 {
        self.writer.lock().valid_len
    }

    fn read_entry(&self, entry: &IndexEntry) -> Result<Segment> {
        let mut buf = vec![0u8; entry.len as usize + 4];
        read_exact_at(&self.reader, &mut buf, entry.offset)?;

        let (payload, crc_bytes) = buf.split_at(entry.len as usize);
        let stored = <[u8; 4]>::try_from(crc_bytes)
            .map(u32::from_le_bytes)
            .map_err(|e| Error::MalformedEncoding(format!("bad checksum field: {}", e)))?;
        if stored != CRC32.checksum(payload) {
            return Err(Error::MalformedEncoding(format!(
                "checksum mismatch for segment {}",
                entry.info.segment_id
            )));
        }

        Segment::decode(payload)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "segment log ended inside a record",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Index records from `from` onward.
///
/// Returns the new index entries and the offset just past the last complete
/// record.
fn scan(
    file: &File,
    from: u64,
    mut last: Option<SegmentInfo>,
) -> Result<(Vec<IndexEntry>, u64)> {
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(from))?;

    let mut entries = Vec::new();
    let mut position = from;

    while position < file_len {
        let remaining = file_len - position;
        if remaining < RECORD_OVERHEAD {
            warn!(position, remaining, "Ignoring torn record header");
            break;
        }

        let mut len_bytes = [0u8; 4];
        reader.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as u64;
        if remaining < len + RECORD_OVERHEAD {
            warn!(position, len, remaining, "Ignoring torn segment record");
            break;
        }

        let record_end = position + len + RECORD_OVERHEAD;
        let info = if record_end == file_len {
            // Last record: the only place a torn write can hide
            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload)?;
            let mut crc_bytes = [0u8; 4];
            reader.read_exact(&mut crc_bytes)?;
            if u32::from_le_bytes(crc_bytes) != CRC32.checksum(&payload) {
                warn!(position, "Ignoring trailing record with bad checksum");
                break;
            }
            Segment::decode(&payload)?.info()
        } else {
            if len < SEGMENT_HEADER_LEN as u64 {
                return Err(Error::MalformedEncoding(format!(
                    "segment record at byte {} is shorter than its header",
                    position
                )));
            }
            let mut header = [0u8; SEGMENT_HEADER_LEN];
            reader.read_exact(&mut header)?;
            let info = SegmentInfo::decode_header(&header)?;
            if info.payload_len() != len {
                return Err(Error::MalformedEncoding(format!(
                    "segment record at byte {} holds {} bytes, header declares {}",
                    position,
                    len,
                    info.payload_len()
                )));
            }
            // Skip the gap block and checksum
            reader.seek_relative((len - SEGMENT_HEADER_LEN as u64 + 4) as i64)?;
            info
        };

        check_info_continuation(last.as_ref(), &info).map_err(|e| {
            Error::MalformedEncoding(format!(
                "segment log out of sequence at byte {}: {}",
                position, e
            ))
        })?;

        entries.push(IndexEntry {
            info,
            offset: position + 4,
            len: len as u32,
        });
        last = Some(info);
        position = record_end;
    }

    Ok((entries, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::SegmentedSieve;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    /// Append the first `count` primes in segments of `segment_size`
    fn fill(log: &SegmentLog, count: usize, segment_size: usize) -> Result<()> {
        let primes: Vec<u64> = SegmentedSieve::new(1024).take(count).collect();
        for (id, chunk) in primes.chunks(segment_size).enumerate() {
            let start_index = (id * segment_size) as u64 + 1;
            log.append(&Segment::from_primes(id as u64, start_index, chunk)?)?;
        }
        Ok(())
    }

    #[test]
    fn test_append_and_find() -> Result<()> {
        let dir = temp_dir("segment_log_find");
        let log = SegmentLog::open(&dir)?;
        assert!(log.is_empty());
        assert!(matches!(log.find(1), Err(Error::NotFound(1))));

        fill(&log, 250, 100)?;
        assert_eq!(log.len(), 3);
        assert_eq!(log.max_index(), 250);

        let segment = log.find(1)?;
        assert_eq!(segment.segment_id, 0);
        let segment = log.find(100)?;
        assert_eq!(segment.segment_id, 0);
        let segment = log.find(101)?;
        assert_eq!(segment.segment_id, 1);
        assert_eq!(segment.start_prime, 547);
        let segment = log.find(250)?;
        assert_eq!(segment.segment_id, 2);
        assert_eq!(segment.segment_size, 50);

        assert!(matches!(log.find(0), Err(Error::NotFound(0))));
        assert!(matches!(log.find(251), Err(Error::NotFound(251))));

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_rejects_out_of_sequence() -> Result<()> {
        let dir = temp_dir("segment_log_sequence");
        let log = SegmentLog::open(&dir)?;
        fill(&log, 10, 10)?;

        let overlapping = Segment::from_primes(1, 10, &[29, 31])?;
        assert!(matches!(
            log.append(&overlapping),
            Err(Error::GenerationFailure(_))
        ));
        assert_eq!(log.len(), 1);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_recovery_after_reopen() -> Result<()> {
        let dir = temp_dir("segment_log_reopen");
        {
            let log = SegmentLog::open(&dir)?;
            fill(&log, 1000, 300)?;
        }

        let log = SegmentLog::open(&dir)?;
        assert_eq!(log.len(), 4);
        assert_eq!(log.max_index(), 1000);
        let last = log.last()?.expect("last segment");
        assert_eq!(last.last_prime()?, 7919);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_torn_tail_is_ignored_then_truncated() -> Result<()> {
        let dir = temp_dir("segment_log_torn");
        let valid_len = {
            let log = SegmentLog::open(&dir)?;
            fill(&log, 20, 10)?;
            log.size_bytes()
        };

        // Half-written record: length prefix promising more than is there
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(dir.join(LOG_FILE_NAME))?;
            file.write_all(&[200, 0, 0, 0, 1, 2, 3])?;
        }

        let log = SegmentLog::open(&dir)?;
        assert_eq!(log.len(), 2);
        assert_eq!(log.size_bytes(), valid_len);

        let primes: Vec<u64> = SegmentedSieve::new(64).skip(20).take(5).collect();
        log.append(&Segment::from_primes(2, 21, &primes)?)?;
        assert_eq!(log.find(25)?.segment_id, 2);
        drop(log);

        let reopened = SegmentLog::open(&dir)?;
        assert_eq!(reopened.len(), 3);
        assert_eq!(reopened.max_index(), 25);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_damaged_gap_block_is_isolated() -> Result<()> {
        let dir = temp_dir("segment_log_damaged");
        let damaged_at = {
            let log = SegmentLog::open(&dir)?;
            fill(&log, 30, 10)?;
            // Last byte of segment 1's gap block
            let entry = log.locate(11)?;
            entry.offset + entry.len as u64 - 1
        };

        {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(dir.join(LOG_FILE_NAME))?;
            let mut byte = [0u8; 1];
            file.seek(SeekFrom::Start(damaged_at))?;
            file.read_exact(&mut byte)?;
            file.seek(SeekFrom::Start(damaged_at))?;
            file.write_all(&[byte[0] ^ 0x01])?;
        }

        let log = SegmentLog::open(&dir)?;
        assert_eq!(log.len(), 3);
        assert_eq!(log.find(10)?.segment_id, 0);
        assert_eq!(log.find(21)?.segment_id, 2);
        assert_eq!(log.find_info(15)?.segment_id, 1);
        assert!(matches!(log.find(15), Err(Error::MalformedEncoding(_))));

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_concurrent_reads() -> Result<()> {
        let dir = temp_dir("segment_log_concurrent");
        let log = SegmentLog::open(&dir)?;
        fill(&log, 500, 50)?;
        let expected: Vec<u64> = SegmentedSieve::new(1024).take(500).collect();

        std::thread::scope(|scope| {
            for worker in 0..4u64 {
                let log = &log;
                let expected = &expected;
                scope.spawn(move || {
                    for index in (1 + worker..=500).step_by(7) {
                        let segment = log.find(index).unwrap();
                        let primes = segment.primes().unwrap();
                        let offset = (index - segment.start_index) as usize;
                        assert_eq!(primes[offset], expected[index as usize - 1]);
                    }
                });
            }
        });

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_refresh_sees_other_writer() -> Result<()> {
        let dir = temp_dir("segment_log_refresh");
        let writer = SegmentLog::open(&dir)?;
        let reader = SegmentLog::open(&dir)?;

        fill(&writer, 30, 10)?;
        assert!(matches!(reader.find(15), Err(Error::NotFound(15))));

        assert_eq!(reader.refresh()?, 3);
        assert_eq!(reader.find(15)?.segment_id, 1);
        assert_eq!(reader.refresh()?, 0);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}

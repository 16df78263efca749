//! Write-ahead log - the `<path>.log` file.
//!
//! # File Layout
//! ```text
//! ┌──────────────┬─────────────────────────┬─────────────────────────┬─────┐
//! │ running (4B) │ size │ crc │ data ...   │ size │ crc │ data ...   │ ... │
//! └──────────────┴─────────────────────────┴─────────────────────────┴─────┘
//! ```
//! Each frame carries the CRC32 of its own data. The header holds a running
//! CRC32 over the bytes of every frame in order, so a frame whose header
//! update never reached disk is recognised as a bad tail and cut off.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crc32fast::Hasher;
use parking_lot::Mutex;

use crate::common::{Error, Result};

const HEADER_SIZE: u64 = 4;
const FRAME_HEADER_SIZE: usize = 8;

/// Fold one frame into the running checksum.
fn fold_checksum(running: u32, frame: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(running);
    hasher.update(frame);
    hasher.finalize()
}

fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + data.len());
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

/// Decode the frame starting at `pos`, returning its data range.
///
/// `None` for an incomplete frame or one whose checksum does not match.
fn decode_frame(bytes: &[u8], pos: usize) -> Option<std::ops::Range<usize>> {
    let header = bytes.get(pos..pos + FRAME_HEADER_SIZE)?;
    let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let start = pos + FRAME_HEADER_SIZE;
    let data = bytes.get(start..start.checked_add(size)?)?;
    (crc32fast::hash(data) == crc).then_some(start..start + size)
}

struct WalInner {
    file: File,
    running: u32,
    /// Length of the valid part of the file.
    len: u64,
    /// Position of the next frame `next` returns.
    cursor: u64,
}

/// Append-only checksummed log.
///
/// `log` is durable when it returns. `next`/`rewind` walk the frames
/// forward; the cursor is independent of appends.
pub struct Wal {
    inner: Mutex<WalInner>,
}

impl Wal {
    /// Create an empty log.
    ///
    /// # Errors
    /// `Error::FileExists` if the file is already there.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&0u32.to_le_bytes())?;
        file.sync_all()?;

        Ok(Self {
            inner: Mutex::new(WalInner {
                file,
                running: 0,
                len: HEADER_SIZE,
                cursor: HEADER_SIZE,
            }),
        })
    }

    /// Open an existing log, validating it and cutting off a bad tail.
    ///
    /// The longest run of intact frames whose running checksum equals the
    /// header is kept; everything after it is truncated.
    ///
    /// # Errors
    /// - `Error::FileNotFound` if the file is missing
    /// - `Error::BadLogFile` if the header is short or no prefix matches it
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE as usize {
            return Err(Error::BadLogFile(format!(
                "{} bytes, shorter than the header",
                bytes.len()
            )));
        }
        let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

        let mut running = 0u32;
        let mut pos = HEADER_SIZE as usize;
        let mut valid_end = (header == running).then_some(pos);
        while let Some(data) = decode_frame(&bytes, pos) {
            running = fold_checksum(running, &bytes[pos..data.end]);
            pos = data.end;
            if running == header {
                valid_end = Some(pos);
            }
        }

        let Some(valid_end) = valid_end else {
            return Err(Error::BadLogFile(format!(
                "running checksum {header:#010x} matches no prefix"
            )));
        };

        if valid_end < bytes.len() {
            tracing::warn!(
                kept = valid_end,
                dropped = bytes.len() - valid_end,
                "truncating bad log tail"
            );
            file.set_len(valid_end as u64)?;
            file.sync_all()?;
        }

        Ok(Self {
            inner: Mutex::new(WalInner {
                file,
                running: header,
                len: valid_end as u64,
                cursor: HEADER_SIZE,
            }),
        })
    }

    /// Append a record and make it durable.
    ///
    /// The frame is synced before the header that covers it, so a crash in
    /// between leaves a bad tail rather than a header with no frame.
    pub fn log(&self, data: &[u8]) -> Result<()> {
        let frame = encode_frame(data);
        let mut inner = self.inner.lock();

        let end = inner.len;
        inner.file.seek(SeekFrom::Start(end))?;
        inner.file.write_all(&frame)?;
        inner.file.sync_data()?;

        let running = fold_checksum(inner.running, &frame);
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.write_all(&running.to_le_bytes())?;
        inner.file.sync_data()?;

        inner.running = running;
        inner.len = end + frame.len() as u64;
        Ok(())
    }

    /// Data of the next record, or `None` at the end of the log.
    pub fn next(&self) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let pos = inner.cursor;
        if pos + FRAME_HEADER_SIZE as u64 > inner.len {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        inner.file.seek(SeekFrom::Start(pos))?;
        inner.file.read_exact(&mut header)?;
        let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let end = pos + FRAME_HEADER_SIZE as u64 + size;
        if end > inner.len {
            return Ok(None);
        }
        let mut data = vec![0u8; size as usize];
        inner.file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != crc {
            return Err(Error::BadLogFile(format!("frame at {pos} fails its checksum")));
        }

        inner.cursor = end;
        Ok(Some(data))
    }

    /// Move the read cursor back to the first record.
    pub fn rewind(&self) {
        self.inner.lock().cursor = HEADER_SIZE;
    }

    /// Size of the valid log in bytes, header included.
    pub fn len(&self) -> u64 {
        self.inner.lock().len
    }

    /// True if the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    fn collect(wal: &Wal) -> Vec<Vec<u8>> {
        wal.rewind();
        let mut records = Vec::new();
        while let Some(data) = wal.next().unwrap() {
            records.push(data);
        }
        records
    }

    #[test]
    fn test_log_and_iterate() {
        let dir = tempdir().unwrap();
        let wal = Wal::create(dir.path().join("t.log")).unwrap();
        assert!(wal.is_empty());

        wal.log(b"first").unwrap();
        wal.log(b"").unwrap();
        wal.log(b"third").unwrap();

        assert_eq!(collect(&wal), vec![b"first".to_vec(), vec![], b"third".to_vec()]);
        // Rewind starts over.
        assert_eq!(collect(&wal).len(), 3);
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        {
            let wal = Wal::create(&path).unwrap();
            wal.log(b"a").unwrap();
            wal.log(b"bb").unwrap();
        }

        let wal = Wal::open(&path).unwrap();
        assert_eq!(collect(&wal), vec![b"a".to_vec(), b"bb".to_vec()]);

        wal.log(b"ccc").unwrap();
        assert_eq!(collect(&wal).len(), 3);
    }

    #[test]
    fn test_garbage_tail_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        let good_len;
        {
            let wal = Wal::create(&path).unwrap();
            wal.log(b"kept").unwrap();
            good_len = wal.len();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xFF, 0x00, 0x12]).unwrap();
        drop(file);

        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.len(), good_len);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
        assert_eq!(collect(&wal), vec![b"kept".to_vec()]);
    }

    #[test]
    fn test_frame_without_header_update_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        {
            let wal = Wal::create(&path).unwrap();
            wal.log(b"committed").unwrap();
        }
        // An intact frame whose header update was lost in a crash.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&encode_frame(b"lost")).unwrap();
        drop(file);

        let wal = Wal::open(&path).unwrap();
        assert_eq!(collect(&wal), vec![b"committed".to_vec()]);
    }

    #[test]
    fn test_bad_header_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        {
            let wal = Wal::create(&path).unwrap();
            wal.log(b"record").unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(Wal::open(&path), Err(Error::BadLogFile(_))));
    }

    #[test]
    fn test_short_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.log");
        fs::write(&path, [0u8; 2]).unwrap();

        let err = Wal::open(&path).err().unwrap();
        assert!(err.is_fatal());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_records_survive_reopen_with_tail(
            records in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..16),
            tail in proptest::collection::vec(any::<u8>(), 0..24),
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("p.log");
            {
                let wal = Wal::create(&path).unwrap();
                for record in &records {
                    wal.log(record).unwrap();
                }
            }
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&tail).unwrap();
            drop(file);

            let wal = Wal::open(&path).unwrap();
            prop_assert_eq!(collect(&wal), records);
        }
    }
}

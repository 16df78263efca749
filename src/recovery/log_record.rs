//! Physical log records.
//!
//! ```text
//! insert: [0][xid:8][pgno:4][offset:2][raw]
//! update: [1][xid:8][uid:8][old raw][new raw]
//! ```
//! Old and new images of an update always have the same length, so each is
//! half of what follows the uid.

use crate::common::{uid_to_address, Error, PageId, Result, Uid};

const TYPE_INSERT: u8 = 0;
const TYPE_UPDATE: u8 = 1;

const INSERT_HEADER: usize = 1 + 8 + 4 + 2;
const UPDATE_HEADER: usize = 1 + 8 + 8;

/// A decoded log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Insert {
        xid: u64,
        page_id: PageId,
        offset: u16,
        raw: Vec<u8>,
    },
    Update {
        xid: u64,
        uid: Uid,
        old_raw: Vec<u8>,
        new_raw: Vec<u8>,
    },
}

impl LogRecord {
    /// Encode an insert of `raw` at (`page_id`, `offset`).
    pub fn encode_insert(xid: u64, page_id: PageId, offset: u16, raw: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INSERT_HEADER + raw.len());
        buf.push(TYPE_INSERT);
        buf.extend_from_slice(&xid.to_le_bytes());
        buf.extend_from_slice(&page_id.0.to_le_bytes());
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(raw);
        buf
    }

    /// Encode an in-place update of the item at `uid`.
    pub fn encode_update(xid: u64, uid: Uid, old_raw: &[u8], new_raw: &[u8]) -> Vec<u8> {
        debug_assert_eq!(old_raw.len(), new_raw.len());
        let mut buf = Vec::with_capacity(UPDATE_HEADER + old_raw.len() + new_raw.len());
        buf.push(TYPE_UPDATE);
        buf.extend_from_slice(&xid.to_le_bytes());
        buf.extend_from_slice(&uid.to_le_bytes());
        buf.extend_from_slice(old_raw);
        buf.extend_from_slice(new_raw);
        buf
    }

    /// Decode a record read back from the log.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.first() {
            Some(&TYPE_INSERT) if bytes.len() >= INSERT_HEADER => Ok(LogRecord::Insert {
                xid: read_u64(bytes, 1),
                page_id: PageId::new(u32::from_le_bytes([
                    bytes[9], bytes[10], bytes[11], bytes[12],
                ])),
                offset: u16::from_le_bytes([bytes[13], bytes[14]]),
                raw: bytes[INSERT_HEADER..].to_vec(),
            }),
            Some(&TYPE_UPDATE)
                if bytes.len() >= UPDATE_HEADER && (bytes.len() - UPDATE_HEADER) % 2 == 0 =>
            {
                let half = (bytes.len() - UPDATE_HEADER) / 2;
                let images = &bytes[UPDATE_HEADER..];
                Ok(LogRecord::Update {
                    xid: read_u64(bytes, 1),
                    uid: read_u64(bytes, 9),
                    old_raw: images[..half].to_vec(),
                    new_raw: images[half..].to_vec(),
                })
            }
            _ => Err(Error::Corrupted(format!(
                "malformed log record of {} bytes",
                bytes.len()
            ))),
        }
    }

    pub fn xid(&self) -> u64 {
        match self {
            LogRecord::Insert { xid, .. } | LogRecord::Update { xid, .. } => *xid,
        }
    }

    /// Page the record writes to.
    pub fn page_id(&self) -> PageId {
        match self {
            LogRecord::Insert { page_id, .. } => *page_id,
            LogRecord::Update { uid, .. } => uid_to_address(*uid).0,
        }
    }
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

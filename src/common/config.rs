//! Configuration constants and open-time options for EmberDB.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Size of a page in bytes (8KB).
///
/// Every data item must fit in a single page, so this also bounds the
/// largest record the engine accepts (see [`MAX_FREE_SPACE`]).
pub const PAGE_SIZE: usize = 8192;

/// Bytes reserved at the start of every data page for the free-space offset.
pub const DATA_PAGE_HEADER: usize = 2;

/// Largest number of bytes a single data page can hold.
pub const MAX_FREE_SPACE: usize = PAGE_SIZE - DATA_PAGE_HEADER;

/// Default memory budget for the page cache (64MB).
pub const DEFAULT_MEMORY: u64 = 64 * MB;

/// The page cache never gets fewer frames than this, whatever the budget.
pub const MIN_CACHE_PAGES: usize = 16;

pub const KB: u64 = 1 << 10;
pub const MB: u64 = 1 << 20;
pub const GB: u64 = 1 << 30;

/// Share of cache capacity (in percent) given to the young segment.
pub const YOUNG_SEGMENT_PERCENT: usize = 30;

/// Hits an entry must exceed in the young segment before it is promoted.
pub const PROMOTION_AGE: u32 = 10;

/// Number of free-space buckets in the page index.
pub const FREE_SPACE_INTERVALS: usize = 40;

/// Half the key capacity of a B+Tree node; a node splits once it holds
/// twice this many keys.
pub const BTREE_BALANCE: usize = 32;

/// How many times an insert asks the free-space index before giving up.
pub const INSERT_RETRIES: usize = 5;

/// Suffix of the transaction ledger file.
pub const XID_SUFFIX: &str = ".xid";
/// Suffix of the write-ahead log.
pub const LOG_SUFFIX: &str = ".log";
/// Suffix of the page file.
pub const DB_SUFFIX: &str = ".db";
/// Suffix of the boot file.
pub const BOOT_SUFFIX: &str = ".bt";
/// Suffix of the boot file while an update is in flight.
pub const BOOT_TMP_SUFFIX: &str = ".bt_tmp";

/// Append `suffix` to a database path prefix (`/data/mydb` + `.log`).
pub fn file_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Options accepted by [`Database::open`](crate::Database::open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbOptions {
    /// Memory budget in bytes; bounds the page cache.
    pub memory: u64,
}

impl DbOptions {
    /// Options with an explicit memory budget.
    pub fn with_memory(memory: u64) -> Self {
        Self { memory }
    }

    /// Number of frames the page cache may hold under this budget.
    pub fn page_cache_capacity(&self) -> usize {
        let pages = (self.memory / PAGE_SIZE as u64) as usize;
        pages.max(MIN_CACHE_PAGES)
    }

    /// Number of data items that may stay resident.
    ///
    /// Each resident item pins its page, so this is kept at half the page
    /// cache to leave room for direct page users.
    pub fn item_cache_capacity(&self) -> usize {
        self.page_cache_capacity() / 2
    }
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY,
        }
    }
}

/// Parse a memory size such as `64MB`, `512KB` or `1GB`.
///
/// An empty string yields [`DEFAULT_MEMORY`].
pub fn parse_memory(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DEFAULT_MEMORY);
    }
    if input.len() < 3 || !input.is_char_boundary(input.len() - 2) {
        return Err(Error::InvalidMemory(input.to_string()));
    }

    let (number, unit) = input.split_at(input.len() - 2);
    let number: u64 = number
        .trim()
        .parse()
        .map_err(|_| Error::InvalidMemory(input.to_string()))?;

    let scale = match unit.to_ascii_uppercase().as_str() {
        "KB" => KB,
        "MB" => MB,
        "GB" => GB,
        _ => return Err(Error::InvalidMemory(input.to_string())),
    };

    number
        .checked_mul(scale)
        .ok_or_else(|| Error::InvalidMemory(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 8192);
        assert_eq!(MAX_FREE_SPACE, 8190);
    }

    #[test]
    fn test_parse_memory_units() {
        assert_eq!(parse_memory("64MB").unwrap(), 64 * MB);
        assert_eq!(parse_memory("512KB").unwrap(), 512 * KB);
        assert_eq!(parse_memory("2GB").unwrap(), 2 * GB);
        assert_eq!(parse_memory("8mb").unwrap(), 8 * MB);
        assert_eq!(parse_memory("").unwrap(), DEFAULT_MEMORY);
    }

    #[test]
    fn test_parse_memory_rejects_garbage() {
        assert!(matches!(parse_memory("64"), Err(Error::InvalidMemory(_))));
        assert!(matches!(parse_memory("64TB"), Err(Error::InvalidMemory(_))));
        assert!(matches!(parse_memory("xxMB"), Err(Error::InvalidMemory(_))));
        assert!(parse_memory("MB").is_err());
    }

    #[test]
    fn test_file_path_appends_suffix() {
        let prefix = Path::new("/tmp/my.db.v1");
        assert_eq!(file_path(prefix, LOG_SUFFIX), PathBuf::from("/tmp/my.db.v1.log"));
    }

    #[test]
    fn test_cache_capacities() {
        let opts = DbOptions::with_memory(MB);
        assert_eq!(opts.page_cache_capacity(), 128);
        assert_eq!(opts.item_cache_capacity(), 64);

        let tiny = DbOptions::with_memory(KB);
        assert_eq!(tiny.page_cache_capacity(), MIN_CACHE_PAGES);
    }
}

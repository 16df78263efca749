//! Page numbers.

use std::fmt;

/// Number of a page in the page file.
///
/// Numbering starts at 1: page `N` sits at byte `(N - 1) × PAGE_SIZE`.
/// Page 1 holds the shutdown check; data pages follow. A number, once
/// handed out, is only reused if recovery truncates the page away.
///
/// # Example
/// ```
/// use emberdb::PageId;
///
/// let page_id = PageId::new(3);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.file_offset(8192), 2 * 8192);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Zero is never a page number; used as "none".
    pub const INVALID: PageId = PageId(0);

    /// The shutdown-check page.
    pub const ONE: PageId = PageId(1);

    #[inline]
    pub fn new(pgno: u32) -> Self {
        PageId(pgno)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    /// Where the page starts in the page file.
    #[inline]
    pub fn file_offset(&self, page_size: usize) -> u64 {
        debug_assert!(self.is_valid());
        u64::from(self.0 - 1) * page_size as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => f.write_str("#none"),
            pgno => write!(f, "#{pgno}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(!PageId::INVALID.is_valid());
        assert!(PageId::ONE.is_valid());
        assert_eq!(PageId::new(1), PageId::ONE);
    }

    #[test]
    fn test_file_offset_is_one_based() {
        assert_eq!(PageId::ONE.file_offset(8192), 0);
        assert_eq!(PageId::new(3).file_offset(8192), 2 * 8192);
    }

    #[test]
    fn test_display() {
        assert_eq!(PageId::new(42).to_string(), "#42");
        assert_eq!(PageId::INVALID.to_string(), "#none");
    }
}

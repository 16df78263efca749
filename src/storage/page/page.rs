//! Page - one `PAGE_SIZE` block of the page file.
//!
//! A [`Page`] carries no header of its own. How the bytes are read depends
//! on where the page sits: page 1 through [`page_one`](super::page_one),
//! every later page through [`data_page`](super::data_page).

use crate::common::config::PAGE_SIZE;

/// Raw page image, aligned for direct I/O.
///
/// Not `Clone` outside tests: copying a page should be spelled out.
///
/// # Example
/// ```
/// use emberdb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.write_u16(0, 2);
/// assert_eq!(page.read_u16(0), 2);
/// assert_eq!(page.as_slice()[..2], [2, 0]);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// All-zero page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Page starting with `bytes`, zero-filled after them.
    ///
    /// # Panics
    /// If `bytes` does not fit in a page.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= PAGE_SIZE, "page image larger than a page");
        let mut page = Self::new();
        page.write_at(0, bytes);
        page
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Little-endian `u16` at `offset`.
    #[inline]
    pub fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    #[inline]
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.write_at(offset, &value.to_le_bytes());
    }

    /// Overwrite `bytes.len()` bytes starting at `offset`.
    #[inline]
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Page::from_bytes(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
        assert!(Page::new().as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_from_bytes_zero_fills() {
        let page = Page::from_bytes(&[1, 2, 3]);
        assert_eq!(&page.as_slice()[..4], &[1, 2, 3, 0]);
    }

    #[test]
    fn test_u16_is_little_endian() {
        let mut page = Page::new();
        page.write_u16(10, 0xBEEF);
        assert_eq!(page.read_u16(10), 0xBEEF);
        assert_eq!(&page.as_slice()[10..12], &[0xEF, 0xBE]);
    }

    #[test]
    #[should_panic(expected = "larger than a page")]
    fn test_from_bytes_rejects_oversize() {
        Page::from_bytes(&vec![0u8; PAGE_SIZE + 1]);
    }
}

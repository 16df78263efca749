//! Logical record addresses.
//!
//! A uid packs the page number into the high 32 bits and the in-page
//! offset into the low 16 bits.

use crate::common::PageId;

/// Logical address of a data item.
pub type Uid = u64;

/// Pack a page number and offset into a uid.
#[inline]
pub fn address_to_uid(page_id: PageId, offset: u16) -> Uid {
    ((page_id.0 as u64) << 32) | offset as u64
}

/// Split a uid back into its page number and offset.
#[inline]
pub fn uid_to_address(uid: Uid) -> (PageId, u16) {
    let page_id = PageId::new((uid >> 32) as u32);
    let offset = (uid & 0xFFFF) as u16;
    (page_id, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_packing() {
        let uid = address_to_uid(PageId::new(7), 1234);
        assert_eq!(uid, (7u64 << 32) | 1234);
        assert_eq!(uid_to_address(uid), (PageId::new(7), 1234));
    }

    #[test]
    fn test_uid_extremes() {
        let uid = address_to_uid(PageId::new(u32::MAX), u16::MAX);
        assert_eq!(uid_to_address(uid), (PageId::new(u32::MAX), u16::MAX));
    }
}

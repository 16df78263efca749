//! Data page layout.
//!
//! Every page except page 1 stores records packed from the front:
//!
//! ```text
//! ┌────────────┬──────────┬──────────┬─────┬────────────────────┐
//! │ FSO (2B)   │ record 0 │ record 1 │ ... │ free space         │
//! └────────────┴──────────┴──────────┴─────┴────────────────────┘
//!  0           2                           FSO              PAGE_SIZE
//! ```
//!
//! The free-space offset (FSO) points at the first unused byte. Records are
//! only ever appended; deletion is a flag inside the record itself.

use crate::common::config::{DATA_PAGE_HEADER, PAGE_SIZE};

use super::Page;

const OFFSET_FSO: usize = 0;

/// Build the image of a fresh, empty data page.
pub fn init_raw() -> Page {
    let mut page = Page::new();
    set_fso(&mut page, DATA_PAGE_HEADER as u16);
    page
}

/// Current free-space offset.
#[inline]
pub fn fso(page: &Page) -> u16 {
    page.read_u16(OFFSET_FSO)
}

#[inline]
fn set_fso(page: &mut Page, fso: u16) {
    page.write_u16(OFFSET_FSO, fso);
}

/// Bytes still available at the end of the page.
#[inline]
pub fn free_space(page: &Page) -> usize {
    PAGE_SIZE - fso(page) as usize
}

/// Append `raw` at the free-space offset and return the offset it landed at.
///
/// The caller must have checked that the record fits.
pub fn insert(page: &mut Page, raw: &[u8]) -> u16 {
    let offset = fso(page);
    page.write_at(offset as usize, raw);
    set_fso(page, offset + raw.len() as u16);
    offset
}

/// Replay an insert at a known offset, growing the FSO if needed.
///
/// Used by recovery, where the page may or may not already contain the
/// record; applying it twice is harmless.
pub fn recover_insert(page: &mut Page, raw: &[u8], offset: u16) {
    page.write_at(offset as usize, raw);
    let end = offset + raw.len() as u16;
    if end > fso(page) {
        set_fso(page, end);
    }
}

/// Replay an in-place update at a known offset.
pub fn recover_update(page: &mut Page, raw: &[u8], offset: u16) {
    page.write_at(offset as usize, raw);
}

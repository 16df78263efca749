//! Page one - the validity-check page.
//!
//! Page 1 carries an 8-byte nonce at offset 100 and a copy slot right after
//! it. Opening the database writes a fresh random nonce, so the two slots
//! differ while the database is open; a clean close copies the nonce into
//! the copy slot. Finding them different at open time means the previous
//! process never closed, and recovery must run.

use rand::RngCore;

use super::Page;

const OFFSET_VC: usize = 100;
const LEN_VC: usize = 8;

/// Build the image of page 1 for a new database (marked open).
pub fn init_raw() -> Page {
    let mut page = Page::new();
    set_vc_open(&mut page);
    page
}

/// Stamp a fresh nonce: the database is now open.
pub fn set_vc_open(page: &mut Page) {
    let mut nonce = [0u8; LEN_VC];
    rand::thread_rng().fill_bytes(&mut nonce);
    page.write_at(OFFSET_VC, &nonce);
}

/// Copy the nonce into the copy slot: the database closed cleanly.
pub fn set_vc_close(page: &mut Page) {
    page.as_mut_slice()
        .copy_within(OFFSET_VC..OFFSET_VC + LEN_VC, OFFSET_VC + LEN_VC);
}

/// True if the last shutdown was clean.
pub fn check_vc(page: &Page) -> bool {
    let data = page.as_slice();
    data[OFFSET_VC..OFFSET_VC + LEN_VC] == data[OFFSET_VC + LEN_VC..OFFSET_VC + 2 * LEN_VC]
}

//! RAII guard for page references.
//!
//! A [`PageGuard`] keeps a page resident in the [`PageStore`] and returns
//! the reference when dropped, flushing the page first if it was modified.

use std::ops::Deref;
use std::sync::Arc;

use super::frame::Frame;
use super::page_store::PageStore;

/// A referenced page.
///
/// Derefs to the [`Frame`], which gives locked access to the page bytes.
///
/// # Example
/// ```ignore
/// let guard = store.get_page(PageId::new(2))?;
/// let fso = data_page::fso(&guard.page());
/// // guard drops here, reference released
/// ```
pub struct PageGuard<'a> {
    store: &'a PageStore,
    frame: Arc<Frame>,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(store: &'a PageStore, frame: Arc<Frame>) -> Self {
        Self { store, frame }
    }

    /// The shared frame, for holders that outlive this guard.
    pub fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }
}

impl Deref for PageGuard<'_> {
    type Target = Frame;

    #[inline]
    fn deref(&self) -> &Frame {
        &self.frame
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release(&self.frame) {
            tracing::error!(page = %self.frame.page_id(), error = %e, "failed to flush page on release");
        }
    }
}

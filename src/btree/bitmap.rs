//! Optional summary-indexing hook (§4.3.9 / Design Notes "Bitmap hooks").
//!
//! The reference exposes three function pointers (`updateBitmap`, `inBitmap`,
//! `buildBitmap`) used by an application-level bucket index layered on top of
//! the tree. The core never consults them on its descent path; they are
//! surfaced here purely as an optional capability a caller may attach.
//! Supplying none is the default and changes no observable behavior.

use crate::types::PageId;

/// Called once per flushed leaf, after the leaf has been written but before
/// `updateIndex` propagates the separator.
pub trait BitmapHooks {
    fn on_leaf_flushed(&mut self, min_key: &[u8], max_key: &[u8], page_num: PageId);
}

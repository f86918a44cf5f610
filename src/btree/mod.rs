//! The tree engine: a sequential, append-only, copy-on-write B+-tree.
//!
//! Supports only the operations the design allows:
//! - `put`: append a record (keys strictly increasing)
//! - `get`: point lookup
//! - `flush`: force the write buffer out early
//! - `range`: in-order scan over a key interval
//!
//! There is no `delete` and no in-place update; both are explicit non-goals.

pub mod bitmap;
mod iter;
mod tree;

pub use bitmap::BitmapHooks;
pub use iter::RangeIter;
pub use tree::SeqBTree;

//! Page buffer: a fixed-size pool of page slots with root-pinned,
//! round-robin eviction (§4.2).

mod active_path;
mod pool;

pub use active_path::ActivePath;
pub use pool::{BufferStats, PageBuffer};

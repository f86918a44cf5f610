//! # seqbtree
//!
//! A sequential, append-only, copy-on-write B+-tree index for
//! resource-constrained devices.
//!
//! Keys must be inserted in strictly increasing order. There is no delete,
//! no in-place update, no concurrency, and no crash recovery: a physical
//! page, once written, is never rewritten or reclaimed. In exchange the
//! write path is a handful of sequential page appends and the read path
//! needs only a small, fixed number of buffer slots regardless of tree
//! size.
//!
//! ## Architecture
//!
//! - **Storage layer** (`storage`): moves page-sized byte blocks to and
//!   from a medium. Knows nothing about page contents.
//! - **Page layer** (`page`): the fixed-stride record/key/child-pointer
//!   layout inside a page, and the small role-flagged header.
//! - **Buffer layer** (`buffer`): a fixed-size slot pool with deterministic,
//!   root-pinned eviction, and the active path the tree uses to patch up
//!   stale child pointers left behind by that eviction.
//! - **Tree layer** (`btree`): `put`/`get`/`flush`/`range` over the above.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use seqbtree::{Db, Config};
//!
//! let mut db = Db::open(Config::memory(4, 4).num_pages(8))?;
//! db.put(b"key1", b"val1")?;
//! db.flush()?;
//! assert_eq!(db.get(b"key1")?, Some(b"val1".to_vec()));
//! # Ok::<(), seqbtree::Error>(())
//! ```

pub mod btree;
pub mod buffer;
pub mod error;
pub mod page;
pub mod storage;
pub mod types;

pub use btree::{BitmapHooks, RangeIter, SeqBTree};
pub use buffer::BufferStats;
pub use error::{Error, Result};
pub use storage::{FileStore, MemoryStore, PageStore};
pub use types::{BTreeConfig, PageId, PageRole, Parameters};

use std::path::{Path, PathBuf};

/// Where a `Db`'s pages live.
#[derive(Debug, Clone)]
pub enum StorageKind {
    File { path: PathBuf, sync_on_write: bool },
    Memory,
}

/// Top-level configuration: storage choice, buffer pool size, and tree
/// shape. Mirrors the reference's `Config`/`BTreeConfig` split — shape
/// parameters live in `btree_config`, everything about where bytes land
/// lives here.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageKind,
    pub num_pages: usize,
    pub btree_config: BTreeConfig,
}

impl Config {
    /// A file-backed database at `path`, with a buffer pool of `num_pages`
    /// slots (minimum 2: the write buffer and the root).
    pub fn file(path: impl AsRef<Path>, num_pages: usize) -> Self {
        Self {
            storage: StorageKind::File {
                path: path.as_ref().to_path_buf(),
                sync_on_write: false,
            },
            num_pages,
            btree_config: BTreeConfig::default(),
        }
    }

    /// An in-memory database, useful for tests and short-lived indices.
    pub fn memory(num_pages: usize) -> Self {
        Self {
            storage: StorageKind::Memory,
            num_pages,
            btree_config: BTreeConfig::default(),
        }
    }

    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        if let StorageKind::File { sync_on_write, .. } = &mut self.storage {
            *sync_on_write = enabled;
        }
        self
    }

    pub fn btree_config(mut self, config: BTreeConfig) -> Self {
        self.btree_config = config;
        self
    }
}

/// The primary public handle: a `Config`-built tree over a type-erased
/// storage back-end, so callers don't have to name `SeqBTree<S>`'s storage
/// parameter just to hold a database.
pub struct Db {
    tree: SeqBTree<Box<dyn PageStore>>,
}

impl Db {
    pub fn open(config: Config) -> Result<Self> {
        let storage: Box<dyn PageStore> = match config.storage {
            StorageKind::File { path, sync_on_write } => Box::new(FileStore::new(path, sync_on_write)),
            StorageKind::Memory => Box::new(MemoryStore::new()),
        };
        let tree = SeqBTree::new(config.btree_config, storage, config.num_pages)?;
        Ok(Self { tree })
    }

    /// Append a key-value pair. Keys must strictly exceed every key
    /// inserted so far.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        self.tree.put(key, data)
    }

    /// Look up a key. Only sees keys whose leaf has been flushed; call
    /// [`Db::flush`] first for read-your-writes.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.tree.layout().data_size];
        if self.tree.get(key, &mut buf)? {
            Ok(Some(buf))
        } else {
            Ok(None)
        }
    }

    /// Force the write buffer out to a durable page even if it isn't full.
    /// A no-op if there is nothing buffered.
    pub fn flush(&mut self) -> Result<()> {
        self.tree.flush()
    }

    /// Collect every key-value pair in `[min_key, max_key]`, in order.
    pub fn range(&mut self, min_key: &[u8], max_key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        let mut iter = self.tree.range(min_key, max_key)?;
        while let Some(pair) = iter.next()? {
            out.push(pair);
        }
        Ok(out)
    }

    pub fn stats(&self) -> BufferStats {
        self.tree.stats()
    }

    /// The physical page ids visited while resolving `key`, for debugging.
    pub fn debug_trace_get(&mut self, key: &[u8]) -> Result<Vec<PageId>> {
        self.tree.debug_trace_get(key)
    }

    /// A compact JSON snapshot of tree shape and buffer activity.
    pub fn export_summary(&self) -> serde_json::Value {
        self.tree.export_summary()
    }

    pub fn levels(&self) -> usize {
        self.tree.levels()
    }

    pub fn set_bitmap_hooks(&mut self, hooks: Box<dyn BitmapHooks>) {
        self.tree.set_bitmap_hooks(hooks);
    }
}

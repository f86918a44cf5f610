//! The tree engine: propagates leaf flushes up the active path (§4.3.3),
//! resolves child pointers through it on descent (§4.3.5), and exposes
//! `put`/`get`/`flush` as the only mutating and reading operations. There is
//! no delete: the design is append-only and a stored key is never removed or
//! overwritten once its leaf has been flushed.

use std::cmp::Ordering;

use crate::btree::bitmap::BitmapHooks;
use crate::buffer::{ActivePath, BufferStats, PageBuffer};
use crate::error::{Error, Result};
use crate::page::{self, PageLayout};
use crate::storage::PageStore;
use crate::types::{BTreeConfig, CompareKey, PageId, PageRole, MAX_LEVEL};

/// The write buffer always lives in slot 0: every leaf record lands there
/// before a flush moves it to a durable physical page, and slot 0 also
/// doubles as scratch space while `updateIndex` builds interior pages.
const WRITE_SLOT: usize = 0;

pub struct SeqBTree<S: PageStore> {
    layout: PageLayout,
    compare_key: CompareKey,
    active_path: ActivePath,
    buffer: PageBuffer<S>,
    last_key: Option<Vec<u8>>,
    bitmap_hooks: Option<Box<dyn BitmapHooks>>,
}

impl<S: PageStore> SeqBTree<S> {
    /// Build a fresh tree over `storage`, with `num_pages` buffer slots.
    /// There is no "open an existing tree" path: the design is append-only
    /// and has no recovery story (§5 Non-goals), so every tree starts empty.
    pub fn new(config: BTreeConfig, storage: S, num_pages: usize) -> Result<Self> {
        let layout = PageLayout::new(&config);
        if layout.max_leaf < 1 || layout.max_interior < 1 {
            return Err(Error::buffer_config(format!(
                "page_size {} is too small for key_size {} / data_size {} (max_leaf={}, max_interior={})",
                config.page_size, config.key_size, config.data_size, layout.max_leaf, layout.max_interior
            )));
        }
        let mut buffer = PageBuffer::new(config.page_size, num_pages, storage)?;

        buffer.init_buffer_page(WRITE_SLOT);
        page::set_role(buffer.slot_mut(WRITE_SLOT), PageRole::Root(0));
        let root_id = buffer.write_page(WRITE_SLOT)?;
        let active_path = ActivePath::new(root_id);

        buffer.init_buffer_page(WRITE_SLOT);
        page::set_role(buffer.slot_mut(WRITE_SLOT), PageRole::Leaf(0));

        Ok(Self {
            layout,
            compare_key: config.compare_key,
            active_path,
            buffer,
            last_key: None,
            bitmap_hooks: None,
        })
    }

    /// Attach an optional summary-indexing hook. See [`BitmapHooks`].
    pub fn set_bitmap_hooks(&mut self, hooks: Box<dyn BitmapHooks>) {
        self.bitmap_hooks = Some(hooks);
    }

    pub fn levels(&self) -> usize {
        self.active_path.levels()
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    fn validate_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.layout.key_size {
            return Err(Error::WrongKeySize {
                expected: self.layout.key_size,
                actual: key.len(),
            });
        }
        Ok(())
    }

    fn validate_data(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.layout.data_size {
            return Err(Error::WrongDataSize {
                expected: self.layout.data_size,
                actual: data.len(),
            });
        }
        Ok(())
    }

    /// Append a record to the write buffer, flushing it to a durable page
    /// first if it is already at capacity (§4.3.2).
    ///
    /// Keys must be supplied in strictly increasing order; the design has no
    /// mechanism for updating or reordering a key once written.
    pub fn put(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        self.validate_key(key)?;
        self.validate_data(data)?;
        if let Some(last) = &self.last_key {
            if self.compare(key, last) != Ordering::Greater {
                return Err(Error::OutOfOrder);
            }
        }

        let count = page::role(self.buffer.slot(WRITE_SLOT)).count() as usize;
        if count >= self.layout.max_leaf {
            self.flush_write_buffer(key)?;
        }

        let count = page::role(self.buffer.slot(WRITE_SLOT)).count() as usize;
        self.layout
            .write_leaf_record(self.buffer.slot_mut(WRITE_SLOT), count, key, data);
        page::inc_count(self.buffer.slot_mut(WRITE_SLOT));
        self.last_key = Some(key.to_vec());
        Ok(())
    }

    /// Force the write buffer out to a durable page even if it isn't full
    /// (§4.3.7). A no-op when the buffer is empty, so repeated calls are
    /// idempotent.
    pub fn flush(&mut self) -> Result<()> {
        let count = page::role(self.buffer.slot(WRITE_SLOT)).count() as usize;
        if count == 0 {
            return Ok(());
        }
        let max_key = self
            .layout
            .leaf_key(self.buffer.slot(WRITE_SLOT), count - 1)
            .to_vec();
        let separator = increment_key(&max_key);
        self.flush_write_buffer(&separator)
    }

    /// Write the buffer out as a new physical leaf and propagate the
    /// separator up the active path. `deepest_key` is the value stored as
    /// the separator if this flush causes a brand new deepest-level interior
    /// node to be created: the incoming key on a full-buffer `put`, or
    /// `max_key + 1` on an explicit `flush`.
    fn flush_write_buffer(&mut self, deepest_key: &[u8]) -> Result<()> {
        let min_key = self.layout.leaf_key(self.buffer.slot(WRITE_SLOT), 0).to_vec();
        let max_key = {
            let count = page::role(self.buffer.slot(WRITE_SLOT)).count() as usize;
            self.layout
                .leaf_key(self.buffer.slot(WRITE_SLOT), count - 1)
                .to_vec()
        };
        let page_num = self.buffer.write_page(WRITE_SLOT)?;

        if let Some(hooks) = self.bitmap_hooks.as_mut() {
            hooks.on_leaf_flushed(&min_key, &max_key, page_num);
        }

        self.update_index(&min_key, deepest_key, page_num)?;

        self.buffer.init_buffer_page(WRITE_SLOT);
        page::set_role(self.buffer.slot_mut(WRITE_SLOT), PageRole::Leaf(0));
        Ok(())
    }

    /// Walk the active path bottom-up, absorbing `page_num` as a new child
    /// pointer (and `min_key`/`key` as its separator) into the first node
    /// that has room, splitting every full node along the way and growing
    /// the tree by a level if even the root is full (§4.3.3).
    fn update_index(&mut self, min_key: &[u8], key: &[u8], mut page_num: PageId) -> Result<()> {
        let mut prev_page_num: Option<PageId> = None;
        let mut level = self.active_path.levels() as isize - 1;

        while level >= 0 {
            let lvl = level as usize;
            let node_id = self.active_path.get(lvl);
            let slot = self.load_page(node_id, false)?;
            let count = page::role(self.buffer.slot(slot)).count() as usize;
            let is_deepest = lvl == self.active_path.levels() - 1;
            let full = count > self.layout.max_interior
                || (!is_deepest && count >= self.layout.max_interior);

            if full {
                if !is_deepest {
                    let prev = prev_page_num
                        .expect("a non-deepest full node always follows a node rewrite");
                    self.layout
                        .write_interior_child(self.buffer.slot_mut(slot), count, prev);
                    let rewritten = self.buffer.write_page(slot)?;
                    self.active_path.set(lvl, rewritten);
                }

                self.buffer.init_buffer_page(WRITE_SLOT);
                page::set_role(self.buffer.slot_mut(WRITE_SLOT), PageRole::Interior(0));
                if is_deepest {
                    self.layout
                        .write_interior_key(self.buffer.slot_mut(WRITE_SLOT), 0, key);
                    page::set_count(self.buffer.slot_mut(WRITE_SLOT), 1);
                }
                self.layout
                    .write_interior_child(self.buffer.slot_mut(WRITE_SLOT), 0, page_num);

                let new_id = self.buffer.write_page(WRITE_SLOT)?;
                prev_page_num = Some(self.active_path.get(lvl));
                self.active_path.set(lvl, new_id);
                page_num = new_id;
                level -= 1;
                continue;
            }

            if is_deepest {
                self.layout
                    .write_interior_key(self.buffer.slot_mut(slot), count, key);
            } else {
                self.layout
                    .write_interior_key(self.buffer.slot_mut(slot), count, min_key);
            }

            if lvl == 0 && self.active_path.levels() > 1 {
                if let Some(prev) = prev_page_num {
                    if count > 0 {
                        self.layout
                            .write_interior_child(self.buffer.slot_mut(slot), count, prev);
                    }
                }
                self.layout
                    .write_interior_child(self.buffer.slot_mut(slot), count + 1, page_num);
            } else {
                let mut child_idx = count;
                if let Some(prev) = prev_page_num {
                    self.layout
                        .write_interior_child(self.buffer.slot_mut(slot), child_idx, prev);
                    child_idx += 1;
                }
                self.layout
                    .write_interior_child(self.buffer.slot_mut(slot), child_idx, page_num);
            }

            page::inc_count(self.buffer.slot_mut(slot));
            let new_id = self.buffer.write_page(slot)?;
            self.active_path.set(lvl, new_id);
            return Ok(());
        }

        // Every level including the root was full: grow the tree.
        let prev = prev_page_num.expect("root overflow always follows a node rewrite");
        if self.active_path.levels() + 1 > MAX_LEVEL {
            return Err(Error::OutOfTreeCapacity {
                max: MAX_LEVEL as u8,
            });
        }

        self.buffer.init_buffer_page(WRITE_SLOT);
        self.layout
            .write_interior_key(self.buffer.slot_mut(WRITE_SLOT), 0, min_key);
        self.layout
            .write_interior_child(self.buffer.slot_mut(WRITE_SLOT), 0, prev);
        self.layout.write_interior_child(
            self.buffer.slot_mut(WRITE_SLOT),
            1,
            self.active_path.get(0),
        );
        page::set_role(self.buffer.slot_mut(WRITE_SLOT), PageRole::Root(1));

        let new_root = self.buffer.write_page(WRITE_SLOT)?;
        self.active_path.grow(new_root);
        Ok(())
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.compare_key)(a, b)
    }

    /// Binary search an interior node's separator keys. Ties descend right:
    /// the returned index is the child that would hold `key` if it is
    /// already present as a separator.
    pub(crate) fn search_interior(&self, page: &[u8], key: &[u8], count: usize) -> usize {
        let mut first = 0usize;
        let mut last = count.min(self.layout.max_interior);
        while first < last {
            let mid = first + (last - first) / 2;
            match self.compare(key, self.layout.interior_key(page, mid)) {
                Ordering::Equal => {
                    last = mid + 1;
                    break;
                }
                Ordering::Less => last = mid,
                Ordering::Greater => first = mid + 1,
            }
        }
        last
    }

    /// Binary search a leaf's records. On a miss, `range` selects whether the
    /// insertion position is returned (for iterator positioning) or `None`
    /// (for a point lookup).
    pub(crate) fn search_leaf(
        &self,
        page: &[u8],
        key: &[u8],
        count: usize,
        range: bool,
    ) -> Option<usize> {
        let mut first = 0usize;
        let mut last = count;
        while first < last {
            let mid = first + (last - first) / 2;
            match self.compare(key, self.layout.leaf_key(page, mid)) {
                Ordering::Equal => return Some(mid),
                Ordering::Less => last = mid,
                Ordering::Greater => first = mid + 1,
            }
        }
        if range {
            Some(first)
        } else {
            None
        }
    }

    /// Resolve the child pointer at `child_idx` in a node read from
    /// `node_id` at `level`. The trailing pointer of any node still on the
    /// active path is stale the instant a deeper split happens; this is the
    /// one place that remaps it to the path's current idea of that child
    /// (§4.3.5).
    pub(crate) fn get_child_page_id(
        &self,
        page: &[u8],
        node_id: PageId,
        level: usize,
        child_idx: usize,
        count: usize,
    ) -> Option<PageId> {
        if child_idx == count
            && level + 1 < self.active_path.levels()
            && node_id == self.active_path.get(level)
        {
            return Some(self.active_path.get(level + 1));
        }
        let raw = self.layout.interior_child_raw(page, child_idx);
        if raw == 0 && child_idx == count {
            return None;
        }
        Some(PageId::new(raw))
    }

    /// Descend from the root to the leaf that would hold `key` and copy its
    /// data into `data` if present.
    ///
    /// This never looks at the write buffer: a key only becomes visible to
    /// `get` once its leaf has actually been flushed (§4.3.6). Callers that
    /// need read-your-writes must `flush` first.
    pub fn get(&mut self, key: &[u8], data: &mut [u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.validate_data(data)?;

        let leaf_id = match self.descend(key)? {
            Some(id) => id,
            None => return Ok(false),
        };

        let slot = self.load_page(leaf_id, true)?;
        let page_bytes = self.buffer.slot(slot);
        let count = page::role(page_bytes).count() as usize;
        match self.search_leaf(page_bytes, key, count, false) {
            Some(idx) => {
                data.copy_from_slice(self.layout.leaf_data(page_bytes, idx));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Descend to the leaf that would hold `key`, returning `None` if the
    /// active path has no resolvable child along the way.
    fn descend(&mut self, key: &[u8]) -> Result<Option<PageId>> {
        let mut node_id = self.active_path.get(0);
        let levels = self.active_path.levels();
        for level in 0..levels {
            let slot = self.load_page(node_id, false)?;
            let page_bytes = self.buffer.slot(slot);
            let count = page::role(page_bytes).count() as usize;
            let child_idx = self.search_interior(page_bytes, key, count);
            match self.get_child_page_id(page_bytes, node_id, level, child_idx, count) {
                Some(next) => node_id = next,
                None => return Ok(None),
            }
        }
        Ok(Some(node_id))
    }

    /// Retrace `get`'s descent, returning every page id visited along the
    /// way, for diagnostics (§6.2 `debug_trace_get`).
    pub fn debug_trace_get(&mut self, key: &[u8]) -> Result<Vec<PageId>> {
        self.validate_key(key)?;
        let mut trail = Vec::with_capacity(self.active_path.levels() + 1);
        let mut node_id = self.active_path.get(0);
        let levels = self.active_path.levels();
        trail.push(node_id);
        for level in 0..levels {
            let slot = self.load_page(node_id, false)?;
            let page_bytes = self.buffer.slot(slot);
            let count = page::role(page_bytes).count() as usize;
            let child_idx = self.search_interior(page_bytes, key, count);
            match self.get_child_page_id(page_bytes, node_id, level, child_idx, count) {
                Some(next) => {
                    node_id = next;
                    trail.push(node_id);
                }
                None => break,
            }
        }
        Ok(trail)
    }

    /// A compact JSON snapshot of tree shape and buffer activity, suitable
    /// for logging or an operator dashboard (§10.3).
    pub fn export_summary(&self) -> serde_json::Value {
        let stats = self.buffer.stats();
        serde_json::json!({
            "levels": self.active_path.levels(),
            "key_size": self.layout.key_size,
            "data_size": self.layout.data_size,
            "max_leaf_records": self.layout.max_leaf,
            "max_interior_records": self.layout.max_interior,
            "buffer_reads": stats.reads,
            "buffer_writes": stats.writes,
            "buffer_hits": stats.buffer_hits,
        })
    }

    /// Begin an in-order scan over `[min_key, max_key]` (§4.3.8).
    pub fn range<'a>(
        &'a mut self,
        min_key: &[u8],
        max_key: &[u8],
    ) -> Result<super::iter::RangeIter<'a, S>> {
        self.validate_key(min_key)?;
        self.validate_key(max_key)?;
        super::iter::RangeIter::new(self, min_key.to_vec(), max_key.to_vec())
    }

    /// Load a page into a buffer slot through the eviction policy, writing
    /// back whatever it displaces, then check that what came back is a page
    /// of the expected kind and not past its layout's fan-out. Used by both
    /// `get`/`descend` above and the range iterator, which needs the same
    /// active-path-aware access but can't borrow `buffer` and `active_path`
    /// as two separate `&mut` method calls from outside this module.
    pub(crate) fn load_page(&mut self, id: PageId, expect_leaf: bool) -> Result<usize> {
        let slot = self.buffer.read_page(id, &mut self.active_path)?;
        let role = page::role(self.buffer.slot(slot));
        let (kind_ok, max) = if expect_leaf {
            (role.is_leaf(), self.layout.max_leaf)
        } else {
            (role.is_interior(), self.layout.max_interior)
        };
        if !kind_ok {
            return Err(Error::corruption(format!(
                "page {id} decoded as {role:?}, expected a {} page",
                if expect_leaf { "leaf" } else { "interior" }
            )));
        }
        if role.count() as usize > max {
            return Err(Error::corruption(format!(
                "page {id} count {} exceeds this layout's max of {max}",
                role.count()
            )));
        }
        Ok(slot)
    }

    pub(crate) fn slot(&self, idx: usize) -> &[u8] {
        self.buffer.slot(idx)
    }

    pub(crate) fn active_path_levels(&self) -> usize {
        self.active_path.levels()
    }

    pub(crate) fn active_path_get(&self, level: usize) -> PageId {
        self.active_path.get(level)
    }

    pub(crate) fn compare_pub(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.compare(a, b)
    }
}

/// Big-endian unsigned increment used for the synthetic separator an
/// explicit `flush` stores above the buffer's actual maximum key, since
/// there is no next insert to supply one. Saturates (returns the all-zero
/// input unchanged) if every byte is already `0xFF`; at that point the key
/// space is exhausted and no key can legally exceed it anyway.
fn increment_key(key: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    for byte in out.iter_mut().rev() {
        if *byte == 0xFF {
            *byte = 0;
        } else {
            *byte += 1;
            return out;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn test_tree(num_pages: usize) -> SeqBTree<MemoryStore> {
        let config = BTreeConfig::new(4, 4).with_page_size(70);
        SeqBTree::new(config, MemoryStore::new(), num_pages).unwrap()
    }

    fn key(n: u32) -> [u8; 4] {
        n.to_be_bytes()
    }

    #[test]
    fn empty_tree_misses_everything() {
        let mut tree = test_tree(4);
        let mut data = [0u8; 4];
        assert!(!tree.get(&key(1), &mut data).unwrap());
    }

    #[test]
    fn get_before_flush_is_invisible() {
        let mut tree = test_tree(4);
        tree.put(&key(1), &key(100)).unwrap();
        let mut data = [0u8; 4];
        assert!(!tree.get(&key(1), &mut data).unwrap());

        tree.flush().unwrap();
        assert!(tree.get(&key(1), &mut data).unwrap());
        assert_eq!(data, key(100));
    }

    #[test]
    fn flush_on_empty_buffer_is_a_no_op() {
        let mut tree = test_tree(4);
        tree.flush().unwrap();
        let writes_before = tree.stats().writes;
        tree.flush().unwrap();
        assert_eq!(tree.stats().writes, writes_before, "redundant flush must not write a page");
        let mut data = [0u8; 4];
        assert!(!tree.get(&key(1), &mut data).unwrap());
    }

    #[test]
    fn construction_rejects_a_page_size_too_small_for_any_record() {
        // page_size 10 leaves no room for even one 8-byte leaf record after
        // the 6-byte header, so max_leaf would come out to 0.
        let config = BTreeConfig::new(4, 4).with_page_size(10);
        assert!(matches!(
            SeqBTree::new(config, MemoryStore::new(), 4),
            Err(Error::BufferConfig(_))
        ));
    }

    #[test]
    fn corrupt_root_count_is_rejected_instead_of_silently_read() {
        let config = BTreeConfig::new(4, 4).with_page_size(70);
        let layout = PageLayout::new(&config);
        // Root is always physical page 0; force it back with a count far
        // past this layout's max_interior on every read.
        let bogus = PageRole::Root((layout.max_interior + 10) as u16).encode();
        let storage = CorruptHeaderStore {
            inner: MemoryStore::new(),
            target_page: 0,
            bogus_count: bogus,
        };
        let mut tree = SeqBTree::new(config, storage, 4).unwrap();
        let mut data = [0u8; 4];
        assert!(matches!(tree.get(&key(1), &mut data), Err(Error::Corruption(_))));
    }

    /// A `PageStore` wrapper that corrupts one page's header count field on
    /// every read, to exercise the structural sanity check in `load_page`.
    struct CorruptHeaderStore {
        inner: MemoryStore,
        target_page: u32,
        bogus_count: u16,
    }

    impl crate::storage::PageStore for CorruptHeaderStore {
        fn init(&mut self) -> Result<()> {
            self.inner.init()
        }

        fn read_page(&mut self, page_num: u32, page_size: u16, dst: &mut [u8]) -> Result<()> {
            self.inner.read_page(page_num, page_size, dst)?;
            if page_num == self.target_page {
                dst[4..6].copy_from_slice(&self.bogus_count.to_le_bytes());
            }
            Ok(())
        }

        fn write_page(&mut self, page_num: u32, page_size: u16, src: &[u8]) -> Result<()> {
            self.inner.write_page(page_num, page_size, src)
        }

        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
    }

    #[test]
    fn round_trips_many_keys_through_repeated_splits() {
        let mut tree = test_tree(4);
        for i in 0..500u32 {
            tree.put(&key(i), &key(i * 10)).unwrap();
        }
        tree.flush().unwrap();

        let mut data = [0u8; 4];
        for i in 0..500u32 {
            assert!(tree.get(&key(i), &mut data).unwrap(), "missing key {i}");
            assert_eq!(data, key(i * 10));
        }
        assert!(!tree.get(&key(999), &mut data).unwrap());
    }

    #[test]
    fn out_of_order_put_is_rejected() {
        let mut tree = test_tree(4);
        tree.put(&key(5), &key(50)).unwrap();
        assert!(matches!(tree.put(&key(5), &key(50)), Err(Error::OutOfOrder)));
        assert!(matches!(tree.put(&key(3), &key(30)), Err(Error::OutOfOrder)));
    }

    #[test]
    fn wrong_sized_key_is_rejected() {
        let mut tree = test_tree(4);
        assert!(matches!(
            tree.put(&[1, 2], &key(1)),
            Err(Error::WrongKeySize { .. })
        ));
    }

    #[test]
    fn tree_grows_levels_under_sustained_inserts() {
        let mut tree = test_tree(4);
        for i in 0..2000u32 {
            tree.put(&key(i), &key(i)).unwrap();
        }
        assert!(tree.levels() > 1);
    }

    #[test]
    fn small_buffer_pool_still_round_trips() {
        // Only 2 slots: write buffer and the one slot eviction ever touches.
        let mut tree = test_tree(2);
        for i in 0..200u32 {
            tree.put(&key(i), &key(i)).unwrap();
        }
        tree.flush().unwrap();

        let mut data = [0u8; 4];
        for i in 0..200u32 {
            assert!(tree.get(&key(i), &mut data).unwrap(), "missing key {i}");
        }
    }

    #[test]
    fn increment_key_carries() {
        assert_eq!(increment_key(&[0, 0, 0, 1]), vec![0, 0, 0, 2]);
        assert_eq!(increment_key(&[0, 0, 0, 0xFF]), vec![0, 0, 1, 0]);
        assert_eq!(increment_key(&[0xFF, 0xFF]), vec![0, 0]);
    }
}

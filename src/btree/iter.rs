//! Range iteration over the active path (§4.3.8).
//!
//! Unlike a conventional B-tree cursor, which can just hold a leaf pointer
//! and re-descend from a stable root on exhaustion, this iterator has to
//! track its own copy of the path it descended through: the tree's active
//! path keeps moving underneath it as splits happen (deliberately not
//! possible here, since a `RangeIter` borrows the tree mutably for its
//! whole lifetime and no `put` can interleave with it, but the bookkeeping
//! mirrors what a non-exclusive reader would need).

use std::cmp::Ordering;

use crate::error::Result;
use crate::page;
use crate::storage::PageStore;
use crate::types::{PageId, MAX_LEVEL};

use super::tree::SeqBTree;

pub struct RangeIter<'a, S: PageStore> {
    tree: &'a mut SeqBTree<S>,
    active_iter_path: [PageId; MAX_LEVEL],
    last_iter_rec: [usize; MAX_LEVEL + 1],
    min_key: Vec<u8>,
    max_key: Vec<u8>,
    current_leaf: Option<PageId>,
}

impl<'a, S: PageStore> RangeIter<'a, S> {
    pub(crate) fn new(tree: &'a mut SeqBTree<S>, min_key: Vec<u8>, max_key: Vec<u8>) -> Result<Self> {
        let (active_iter_path, last_iter_rec, current_leaf) = init_path(tree, &min_key)?;
        Ok(Self {
            tree,
            active_iter_path,
            last_iter_rec,
            min_key,
            max_key,
            current_leaf,
        })
    }

    /// Advance to the next key/value pair in `[min_key, max_key]`, or `None`
    /// once the range is exhausted.
    pub fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let leaf_id = match self.current_leaf {
                Some(id) => id,
                None => return Ok(None),
            };

            let levels = self.tree.active_path_levels();
            let slot = self.tree.load_page(leaf_id, true)?;
            let count = page::role(self.tree.slot(slot)).count() as usize;

            if self.last_iter_rec[levels] >= count {
                if !self.ascend_and_redescend()? {
                    self.current_leaf = None;
                    return Ok(None);
                }
                continue;
            }

            let idx = self.last_iter_rec[levels];
            self.last_iter_rec[levels] += 1;

            let layout = *self.tree.layout();
            let page_bytes = self.tree.slot(slot);
            let candidate_key = layout.leaf_key(page_bytes, idx).to_vec();

            if self.tree.compare_pub(&candidate_key, &self.min_key) == Ordering::Less {
                continue;
            }
            if self.tree.compare_pub(&candidate_key, &self.max_key) == Ordering::Greater {
                self.current_leaf = None;
                return Ok(None);
            }

            let data = layout.leaf_data(page_bytes, idx).to_vec();
            return Ok(Some((candidate_key, data)));
        }
    }

    /// Walk the recorded path upward looking for a level with an unvisited
    /// child, then re-descend its leftmost remaining subtree. Returns
    /// `false` if no level has room left, meaning the scan is exhausted.
    fn ascend_and_redescend(&mut self) -> Result<bool> {
        let levels = self.tree.active_path_levels();
        let mut start_level = None;

        for level in (0..levels).rev() {
            let node_id = self.active_iter_path[level];
            let slot = self.tree.load_page(node_id, false)?;
            let count = page::role(self.tree.slot(slot)).count() as usize;
            let is_deepest = level == levels - 1;
            let effective_count = if is_deepest {
                count.saturating_sub(1)
            } else {
                count
            };
            if self.last_iter_rec[level] < effective_count {
                start_level = Some(level);
                break;
            }
        }

        let start_level = match start_level {
            Some(l) => l,
            None => return Ok(false),
        };

        self.last_iter_rec[start_level] += 1;
        let node_id = self.active_iter_path[start_level];
        let slot = self.tree.load_page(node_id, false)?;
        let page_bytes = self.tree.slot(slot);
        let count = page::role(page_bytes).count() as usize;
        let child_idx = self.last_iter_rec[start_level];
        let mut next_id = match self
            .tree
            .get_child_page_id(page_bytes, node_id, start_level, child_idx, count)
        {
            Some(id) => id,
            None => return Ok(false),
        };

        for level in (start_level + 1)..levels {
            self.active_iter_path[level] = next_id;
            self.last_iter_rec[level] = 0;
            let slot = self.tree.load_page(next_id, false)?;
            let page_bytes = self.tree.slot(slot);
            let count = page::role(page_bytes).count() as usize;
            next_id = match self.tree.get_child_page_id(page_bytes, next_id, level, 0, count) {
                Some(id) => id,
                None => return Ok(false),
            };
        }

        self.last_iter_rec[levels] = 0;
        self.current_leaf = Some(next_id);
        Ok(true)
    }
}

/// Descend from the root towards `min_key`, recording the path taken and
/// each level's search index so the iterator can resume from exactly where
/// it left off when it ascends back out of a leaf.
fn init_path<S: PageStore>(
    tree: &mut SeqBTree<S>,
    min_key: &[u8],
) -> Result<([PageId; MAX_LEVEL], [usize; MAX_LEVEL + 1], Option<PageId>)> {
    let levels = tree.active_path_levels();
    let mut active_iter_path = [PageId::INVALID; MAX_LEVEL];
    let mut last_iter_rec = [0usize; MAX_LEVEL + 1];
    let mut node_id = tree.active_path_get(0);
    let mut resolved = true;

    for level in 0..levels {
        active_iter_path[level] = node_id;
        let slot = tree.load_page(node_id, false)?;
        let page_bytes = tree.slot(slot);
        let count = page::role(page_bytes).count() as usize;
        let child_idx = tree.search_interior(page_bytes, min_key, count);
        last_iter_rec[level] = child_idx;
        match tree.get_child_page_id(page_bytes, node_id, level, child_idx, count) {
            Some(next) => node_id = next,
            None => {
                resolved = false;
                break;
            }
        }
    }

    if !resolved {
        return Ok((active_iter_path, last_iter_rec, None));
    }

    let slot = tree.load_page(node_id, true)?;
    let page_bytes = tree.slot(slot);
    let count = page::role(page_bytes).count() as usize;
    let pos = tree
        .search_leaf(page_bytes, min_key, count, true)
        .unwrap_or(count);
    last_iter_rec[levels] = pos;

    Ok((active_iter_path, last_iter_rec, Some(node_id)))
}

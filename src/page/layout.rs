//! Typed, bounds-checked accessors for the fixed-stride record and
//! child-pointer arrays inside a page.
//!
//! The reference computes these as raw byte offsets and reinterprets;
//! centralizing the arithmetic here means every call site names the record
//! or pointer it wants instead of repeating offset math (Design Notes,
//! "Pointer-arithmetic offsets").

use super::header::HEADER_SIZE;
use crate::types::{BTreeConfig, PageId, PAGE_ID_SIZE};

/// Derived sizes and fan-out for a given tree configuration. Computed once
/// at construction and threaded through every page access.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout {
    pub key_size: usize,
    pub data_size: usize,
    pub record_size: usize,
    pub header_size: usize,
    pub page_size: usize,
    /// Maximum records a leaf can hold.
    pub max_leaf: usize,
    /// Maximum separator keys an interior node can hold (its fan-out is
    /// `max_interior + 1` child pointers).
    pub max_interior: usize,
}

impl PageLayout {
    pub fn new(config: &BTreeConfig) -> Self {
        let key_size = config.key_size as usize;
        let data_size = config.data_size as usize;
        let record_size = key_size + data_size;
        let page_size = config.page_size as usize;
        let header_size = HEADER_SIZE;

        let max_leaf = (page_size - header_size) / record_size;
        let max_interior = (page_size - header_size - PAGE_ID_SIZE) / (key_size + PAGE_ID_SIZE);

        Self {
            key_size,
            data_size,
            record_size,
            header_size,
            page_size,
            max_leaf,
            max_interior,
        }
    }

    fn leaf_record_offset(&self, i: usize) -> usize {
        self.header_size + i * self.record_size
    }

    pub fn leaf_key<'a>(&self, page: &'a [u8], i: usize) -> &'a [u8] {
        let off = self.leaf_record_offset(i);
        &page[off..off + self.key_size]
    }

    pub fn leaf_data<'a>(&self, page: &'a [u8], i: usize) -> &'a [u8] {
        let off = self.leaf_record_offset(i) + self.key_size;
        &page[off..off + self.data_size]
    }

    pub fn write_leaf_record(&self, page: &mut [u8], i: usize, key: &[u8], data: &[u8]) {
        let off = self.leaf_record_offset(i);
        page[off..off + self.key_size].copy_from_slice(key);
        page[off + self.key_size..off + self.record_size].copy_from_slice(data);
    }

    fn interior_key_offset(&self, i: usize) -> usize {
        self.header_size + i * self.key_size
    }

    fn interior_child_offset(&self, i: usize) -> usize {
        self.header_size + self.key_size * self.max_interior + i * PAGE_ID_SIZE
    }

    pub fn interior_key<'a>(&self, page: &'a [u8], i: usize) -> &'a [u8] {
        let off = self.interior_key_offset(i);
        &page[off..off + self.key_size]
    }

    pub fn write_interior_key(&self, page: &mut [u8], i: usize, key: &[u8]) {
        let off = self.interior_key_offset(i);
        page[off..off + self.key_size].copy_from_slice(key);
    }

    /// Raw stored child pointer, before any active-path remap is applied.
    pub fn interior_child_raw(&self, page: &[u8], i: usize) -> u32 {
        let off = self.interior_child_offset(i);
        u32::from_le_bytes(page[off..off + PAGE_ID_SIZE].try_into().unwrap())
    }

    pub fn write_interior_child(&self, page: &mut [u8], i: usize, id: PageId) {
        let off = self.interior_child_offset(i);
        page[off..off + PAGE_ID_SIZE].copy_from_slice(&id.value().to_le_bytes());
    }
}

//! Memory-backed storage: a single growable, zero-initialized byte vector.

use super::PageStore;
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MemoryStore {
    bytes: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageStore for MemoryStore {
    fn init(&mut self) -> Result<()> {
        self.bytes.clear();
        Ok(())
    }

    fn read_page(&mut self, page_num: u32, page_size: u16, dst: &mut [u8]) -> Result<()> {
        let offset = page_num as usize * page_size as usize;
        let end = offset + page_size as usize;
        if end > self.bytes.len() {
            return Err(Error::invalid_operation(format!(
                "read past end of memory store: page {page_num} not yet written"
            )));
        }
        dst.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    fn write_page(&mut self, page_num: u32, page_size: u16, src: &[u8]) -> Result<()> {
        let offset = page_num as usize * page_size as usize;
        let end = offset + page_size as usize;
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(src);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back() {
        let mut store = MemoryStore::new();
        store.init().unwrap();

        let page_size = 16u16;
        let src = vec![9u8; page_size as usize];
        store.write_page(2, page_size, &src).unwrap();

        let mut dst = vec![0u8; page_size as usize];
        store.read_page(2, page_size, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn reading_unwritten_page_fails() {
        let mut store = MemoryStore::new();
        store.init().unwrap();
        let mut dst = vec![0u8; 16];
        assert!(store.read_page(0, 16, &mut dst).is_err());
    }
}

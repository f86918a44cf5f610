//! File-backed storage: positional I/O on a single file.

use super::PageStore;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct FileStore {
    path: PathBuf,
    file: Option<File>,
    sync_on_write: bool,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>, sync_on_write: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            sync_on_write,
        }
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("storage not initialized"))
    }
}

impl PageStore for FileStore {
    fn init(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    fn read_page(&mut self, page_num: u32, page_size: u16, dst: &mut [u8]) -> Result<()> {
        let offset = page_num as u64 * page_size as u64;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(dst)?;
        Ok(())
    }

    fn write_page(&mut self, page_num: u32, page_size: u16, src: &[u8]) -> Result<()> {
        let offset = page_num as u64 * page_size as u64;
        let sync = self.sync_on_write;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(src)?;
        if sync {
            file.sync_data()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_back() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("pages.db"), false);
        store.init()?;

        let page_size = 64u16;
        let mut src = vec![0u8; page_size as usize];
        src[0..5].copy_from_slice(b"hello");
        store.write_page(3, page_size, &src)?;

        let mut dst = vec![0u8; page_size as usize];
        store.read_page(3, page_size, &mut dst)?;
        assert_eq!(&dst[0..5], b"hello");

        store.close()?;
        Ok(())
    }

    #[test]
    fn write_extends_medium() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("pages.db"), false);
        store.init()?;

        let page_size = 32u16;
        let src = vec![7u8; page_size as usize];
        // Writing far past the current end must zero-extend the gap.
        store.write_page(5, page_size, &src)?;

        let mut dst = vec![0u8; page_size as usize];
        store.read_page(0, page_size, &mut dst)?;
        assert!(dst.iter().all(|&b| b == 0));

        Ok(())
    }
}

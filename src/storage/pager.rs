//! The pager: offset arithmetic and uniform page I/O over a single file with
//! a fixed-size meta block at offset zero. No caching, no coalescing — every
//! operation here is a single seek-then-read/write, exactly one page at a
//! time. A byte-buffer cache, if ever wanted, belongs in a layer above this
//! one; the pager's contract stays synchronous and single-page.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use log::{debug, trace};

use crate::error::{TreeError, TreeResult};

pub struct Pager {
    file: File,
    page_size: usize,
    meta_size: usize,
    page_count: u32,
}

impl Pager {
    /// Open an already-created file handle. If the file is empty, writes
    /// `meta_size` zero bytes as a meta placeholder. Otherwise validates
    /// that `(file_len - meta_size) mod page_size == 0`.
    pub fn open(mut file: File, page_size: usize, meta_size: usize) -> TreeResult<Self> {
        let file_len = file.metadata()?.len();

        if file_len == 0 {
            debug!("pager: initializing empty file with {meta_size}-byte meta block");
            file.write_all(&vec![0u8; meta_size])?;
            file.flush()?;
            return Ok(Pager { file, page_size, meta_size, page_count: 0 });
        }

        if file_len < meta_size as u64 {
            return Err(TreeError::UnevenLength);
        }
        let body_len = file_len - meta_size as u64;
        if body_len % page_size as u64 != 0 {
            return Err(TreeError::UnevenLength);
        }
        let page_count = (body_len / page_size as u64) as u32;
        debug!("pager: opened existing file with {page_count} pages");
        Ok(Pager { file, page_size, meta_size, page_count })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_offset(&self, index: i32) -> TreeResult<u64> {
        if index < 0 || index as u32 >= self.page_count {
            return Err(TreeError::OutOfBounds { index, count: self.page_count });
        }
        Ok(self.meta_size as u64 + index as u64 * self.page_size as u64)
    }

    fn seek_to(&mut self, offset: u64) -> TreeResult<()> {
        let reached = self.file.seek(SeekFrom::Start(offset))?;
        if reached != offset {
            return Err(TreeError::SeekOffsetError { expected: offset, actual: reached });
        }
        Ok(())
    }

    /// Read the meta block.
    pub fn read_meta(&mut self) -> TreeResult<Vec<u8>> {
        self.seek_to(0)?;
        let mut buf = vec![0u8; self.meta_size];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite the meta block. `data` must be exactly `meta_size` bytes.
    pub fn write_meta(&mut self, data: &[u8]) -> TreeResult<()> {
        if data.len() != self.meta_size {
            return Err(TreeError::MetaSizeInvalid { expected: self.meta_size, actual: data.len() });
        }
        self.seek_to(0)?;
        self.file.write_all(data)?;
        Ok(())
    }

    /// Read page `index`.
    pub fn read(&mut self, index: i32) -> TreeResult<Vec<u8>> {
        let offset = self.page_offset(index)?;
        self.seek_to(offset)?;
        let mut buf = vec![0u8; self.page_size];
        self.file.read_exact(&mut buf)?;
        trace!("pager: read page {index}");
        Ok(buf)
    }

    /// Overwrite page `index`. `data` must be exactly `page_size` bytes.
    pub fn write(&mut self, data: &[u8], index: i32) -> TreeResult<()> {
        if data.len() != self.page_size {
            return Err(TreeError::PageSizeInvalid { expected: self.page_size, actual: data.len() });
        }
        let offset = self.page_offset(index)?;
        self.seek_to(offset)?;
        self.file.write_all(data)?;
        trace!("pager: wrote page {index}");
        Ok(())
    }

    /// Append a new page at the end of the file. `data` must be exactly
    /// `page_size` bytes. Returns the new page's index.
    pub fn append(&mut self, data: &[u8]) -> TreeResult<i32> {
        if data.len() != self.page_size {
            return Err(TreeError::PageSizeInvalid { expected: self.page_size, actual: data.len() });
        }
        let offset = self.meta_size as u64 + self.page_count as u64 * self.page_size as u64;
        self.seek_to(offset)?;
        let written = self.file.write(data)?;
        if written != data.len() {
            return Err(TreeError::WriteFailed { expected: data.len(), actual: written });
        }
        let index = self.page_count as i32;
        self.page_count += 1;
        debug!("pager: appended page {index}, page count now {}", self.page_count);
        Ok(index)
    }

    pub fn flush(&mut self) -> TreeResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Iterate every page in ascending index order.
    pub fn iter(&mut self) -> PagerIter<'_> {
        PagerIter { pager: self, next: 0 }
    }
}

pub struct PagerIter<'a> {
    pager: &'a mut Pager,
    next: i32,
}

impl<'a> Iterator for PagerIter<'a> {
    type Item = TreeResult<(i32, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next as u32 >= self.pager.page_count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.pager.read(index).map(|data| (index, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_pager(page_size: usize, meta_size: usize) -> (Pager, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        let pager = Pager::open(file, page_size, meta_size).unwrap();
        (pager, tmp)
    }

    #[test]
    fn new_file_gets_zeroed_meta_and_no_pages() {
        let (mut pager, _tmp) = open_pager(16, 8);
        assert_eq!(pager.page_count(), 0);
        assert_eq!(pager.read_meta().unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn append_then_read_round_trips() {
        let (mut pager, _tmp) = open_pager(16, 8);
        let data = vec![7u8; 16];
        let idx = pager.append(&data).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(pager.read(idx).unwrap(), data);
        assert_eq!(pager.page_count(), 1);
    }

    #[test]
    fn out_of_bounds_read_errors() {
        let (mut pager, _tmp) = open_pager(16, 8);
        let err = pager.read(0).unwrap_err();
        assert!(matches!(err, TreeError::OutOfBounds { .. }));
    }

    #[test]
    fn wrong_size_write_errors() {
        let (mut pager, _tmp) = open_pager(16, 8);
        pager.append(&vec![0u8; 16]).unwrap();
        let err = pager.write(&vec![0u8; 4], 0).unwrap_err();
        assert!(matches!(err, TreeError::PageSizeInvalid { .. }));
    }

    #[test]
    fn meta_round_trips() {
        let (mut pager, _tmp) = open_pager(16, 8);
        pager.write_meta(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(pager.read_meta().unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn reopen_uneven_length_errors() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let mut f = tmp.reopen().unwrap();
            f.write_all(&vec![0u8; 8 + 15]).unwrap(); // 15 is not a multiple of 16
        }
        let file = tmp.reopen().unwrap();
        let err = Pager::open(file, 16, 8).unwrap_err();
        assert!(matches!(err, TreeError::UnevenLength));
    }
}

//! # Pager
//!
//! The pager manages page-granular I/O between the database file and a
//! fixed-capacity in-memory cache. Pages load lazily on first access and are
//! written back only on [`Pager::flush`] / [`Pager::flush_all`]; there is no
//! eviction.
//!
//! ## Contract
//!
//! - `open` creates the file if absent and fails with [`DbError::Corrupt`]
//!   when the file length is not an exact multiple of the page size.
//! - `page` / `page_mut` are idempotent and lazy: a miss allocates a zeroed
//!   buffer and, when the page falls inside the persisted range, fills it
//!   from disk. Accessing a page beyond the tracked count extends the count;
//!   accessing one at or beyond [`MAX_PAGES`] is [`DbError::PageOutOfBounds`].
//! - `allocate` hands out the current page count as a fresh, zeroed page
//!   (append-only growth); the caller initializes its contents. At capacity
//!   it fails with [`DbError::TableFull`].
//! - `flush` writes the full page buffer at its file offset; flushing a page
//!   that was never loaded is [`DbError::FlushUnloadedPage`].
//!
//! Growth is append-only and there is no free list: pages are never reclaimed
//! because the engine does not support deletion.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};
use tracing::trace;

use super::{PageBuf, PageNo, MAX_PAGES, PAGE_SIZE};
use crate::error::DbError;

/// Owns the backing file and a fixed-capacity cache of raw pages.
#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Pages persisted on disk when the file was opened.
    file_pages: u32,
    /// Tracked page count; grows as pages beyond the persisted range are
    /// accessed.
    page_count: u32,
    cache: Vec<Option<Box<PageBuf>>>,
}

impl Pager {
    /// Opens the database file, creating it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file {}", path.display()))?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(DbError::Corrupt {
                len,
                page_size: PAGE_SIZE,
            }
            .into());
        }
        let file_pages = (len / PAGE_SIZE as u64) as u32;

        let mut cache = Vec::with_capacity(MAX_PAGES);
        cache.resize_with(MAX_PAGES, || None);

        Ok(Self {
            file,
            file_pages,
            page_count: file_pages,
            cache,
        })
    }

    /// Number of pages currently tracked (persisted or cached).
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Returns a read-only view of page `page_no`, loading it on demand.
    pub fn page(&mut self, page_no: PageNo) -> Result<&PageBuf> {
        self.ensure_loaded(page_no)?;
        match self.cache[page_no as usize].as_deref() {
            Some(page) => Ok(page),
            None => eyre::bail!("page {page_no} missing from cache after load"),
        }
    }

    /// Returns a mutable view of page `page_no`, loading it on demand.
    pub fn page_mut(&mut self, page_no: PageNo) -> Result<&mut PageBuf> {
        self.ensure_loaded(page_no)?;
        match self.cache[page_no as usize].as_deref_mut() {
            Some(page) => Ok(page),
            None => eyre::bail!("page {page_no} missing from cache after load"),
        }
    }

    /// Hands out the next unused page number as a fresh, zeroed page.
    ///
    /// The caller is responsible for initializing the page contents before
    /// linking it into the tree.
    pub fn allocate(&mut self) -> Result<PageNo> {
        let page_no = self.page_count;
        if page_no as usize >= MAX_PAGES {
            return Err(DbError::TableFull(MAX_PAGES as u32).into());
        }
        self.ensure_loaded(page_no)?;
        trace!(page = page_no, "allocated page");
        Ok(page_no)
    }

    /// Writes the full buffer for page `page_no` back to its file offset.
    pub fn flush(&mut self, page_no: PageNo) -> Result<()> {
        ensure!(
            (page_no as usize) < MAX_PAGES,
            DbError::PageOutOfBounds {
                page: page_no,
                capacity: MAX_PAGES as u32,
            }
        );
        let page = match self.cache[page_no as usize].as_deref() {
            Some(page) => page,
            None => return Err(DbError::FlushUnloadedPage(page_no).into()),
        };
        trace!(page = page_no, "flushing page");
        self.file
            .seek(SeekFrom::Start(page_no as u64 * PAGE_SIZE as u64))?;
        self.file
            .write_all(page)
            .wrap_err_with(|| format!("failed to write page {page_no}"))?;
        if page_no >= self.file_pages {
            self.file_pages = page_no + 1;
        }
        Ok(())
    }

    /// Flushes every cached page and syncs the file. Called on close.
    pub fn flush_all(&mut self) -> Result<()> {
        for page_no in 0..self.page_count {
            if self.cache[page_no as usize].is_some() {
                self.flush(page_no)?;
            }
        }
        self.file.sync_all()?;
        Ok(())
    }

    fn ensure_loaded(&mut self, page_no: PageNo) -> Result<()> {
        if page_no as usize >= MAX_PAGES {
            return Err(DbError::PageOutOfBounds {
                page: page_no,
                capacity: MAX_PAGES as u32,
            }
            .into());
        }

        if self.cache[page_no as usize].is_none() {
            let mut buf = Box::new([0u8; PAGE_SIZE]);
            if page_no < self.file_pages {
                trace!(page = page_no, "reading page from disk");
                self.file
                    .seek(SeekFrom::Start(page_no as u64 * PAGE_SIZE as u64))?;
                self.file
                    .read_exact(&mut buf[..])
                    .wrap_err_with(|| format!("failed to read page {page_no}"))?;
            }
            self.cache[page_no as usize] = Some(buf);
        }

        if page_no >= self.page_count {
            self.page_count = page_no + 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn open_creates_empty_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fresh.db");

        let pager = Pager::open(&path)?;

        assert_eq!(pager.page_count(), 0);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn open_rejects_partial_page_file() -> Result<()> {
        let file = NamedTempFile::new()?;
        std::fs::write(file.path(), vec![0u8; PAGE_SIZE + 17])?;

        let result = Pager::open(file.path());

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::Corrupt { .. })
        ));
        Ok(())
    }

    #[test]
    fn page_is_lazy_and_idempotent() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut pager = Pager::open(file.path())?;

        let page = pager.page_mut(0)?;
        page[0] = 0xAB;

        assert_eq!(pager.page(0)?[0], 0xAB);
        assert_eq!(pager.page_count(), 1);
        Ok(())
    }

    #[test]
    fn page_out_of_bounds() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut pager = Pager::open(file.path())?;

        let err = pager.page(MAX_PAGES as u32).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::PageOutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn allocate_is_append_only() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut pager = Pager::open(file.path())?;

        assert_eq!(pager.allocate()?, 0);
        assert_eq!(pager.allocate()?, 1);
        assert_eq!(pager.page_count(), 2);
        Ok(())
    }

    #[test]
    fn allocate_at_capacity_is_table_full() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut pager = Pager::open(file.path())?;
        for _ in 0..MAX_PAGES {
            pager.allocate()?;
        }

        let err = pager.allocate().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::TableFull(_))
        ));
        Ok(())
    }

    #[test]
    fn flush_of_unloaded_page_is_an_error() -> Result<()> {
        let file = NamedTempFile::new()?;
        let mut pager = Pager::open(file.path())?;
        pager.page(2)?;

        let err = pager.flush(1).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::FlushUnloadedPage(1))
        ));
        Ok(())
    }

    #[test]
    fn flushed_pages_survive_reopen() -> Result<()> {
        let file = NamedTempFile::new()?;
        {
            let mut pager = Pager::open(file.path())?;
            pager.page_mut(0)?[42] = 7;
            pager.page_mut(1)?[42] = 9;
            pager.flush_all()?;
        }

        let mut pager = Pager::open(file.path())?;

        assert_eq!(pager.page_count(), 2);
        assert_eq!(pager.page(0)?[42], 7);
        assert_eq!(pager.page(1)?[42], 9);
        Ok(())
    }
}

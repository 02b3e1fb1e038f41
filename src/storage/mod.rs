//! # Storage Module
//!
//! The storage layer owns the backing file and the in-memory page cache. No
//! other component touches the file directly: the B-tree obtains raw pages
//! from the [`Pager`] by page number and interprets them through the node
//! codec.
//!
//! ## Page Model
//!
//! All I/O happens in fixed 4096-byte pages. A page number is a `u32` index
//! into the file (`offset = page_no * PAGE_SIZE`). The cache holds at most
//! [`MAX_PAGES`] pages and never evicts; entries are released when the pager
//! is dropped. This is acceptable because the total page capacity is small
//! and fixed, which also caps the database file at `MAX_PAGES * PAGE_SIZE`
//! bytes.
//!
//! ## The "no page" sentinel
//!
//! Parent and next-leaf links inside node headers need a null value, but
//! page 0 is a real address (the root). [`NO_PAGE`] (`u32::MAX`) is the
//! explicit sentinel; codec accessors surface these links as
//! `Option<PageNo>` so the ambiguity cannot leak into tree logic.

mod pager;

pub use pager::Pager;

/// Fixed page size, the unit of disk I/O and caching.
pub const PAGE_SIZE: usize = 4096;

/// Total addressable pages; caps the database file at 400 KiB.
pub const MAX_PAGES: usize = 100;

/// A page number, indexing a fixed-size page within the database file.
pub type PageNo = u32;

/// A raw in-memory page buffer.
pub type PageBuf = [u8; PAGE_SIZE];

/// On-disk sentinel for "no page" in parent and next-leaf links.
pub const NO_PAGE: PageNo = u32::MAX;

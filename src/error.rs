//! Caller-visible error taxonomy.
//!
//! Internal propagation uses `eyre::Result` throughout; the conditions a
//! caller is expected to branch on are carried as a typed [`DbError`] inside
//! the report, recoverable via `err.downcast_ref::<DbError>()`:
//!
//! - storage faults (corrupt file, page out of bounds, flush of an unloaded
//!   page) are distinct results rather than process-fatal conditions, so the
//!   engine is usable as a library;
//! - capacity exhaustion and duplicate keys are ordinary insert failures;
//! - logical usage errors (reading through an exhausted cursor) get their
//!   own kind instead of a panic.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DbError {
    /// The file length is not an exact multiple of the page size.
    #[error("database file is corrupt: length {len} is not a multiple of {page_size}-byte pages")]
    Corrupt { len: u64, page_size: usize },

    /// A page number at or beyond the maximum page capacity was requested.
    #[error("page number {page} out of bounds (capacity {capacity})")]
    PageOutOfBounds { page: u32, capacity: u32 },

    /// A page that was never loaded into the cache was flushed.
    #[error("tried to flush page {0}, which was never loaded")]
    FlushUnloadedPage(u32),

    /// A split needed a new page but every page number is already in use.
    #[error("table is full: all {0} pages are in use")]
    TableFull(u32),

    /// The key being inserted already exists in the tree.
    #[error("duplicate key {0}")]
    DuplicateKey(u32),

    /// A row field exceeds its column bound.
    #[error("{field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    /// A cursor past the last record was read or advanced.
    #[error("cursor is at end of table")]
    CursorAtEnd,
}

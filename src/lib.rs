//! # rowdb - Single-File Embedded Row Storage
//!
//! rowdb is a single-file, single-table persistent storage engine: a paged
//! file manager plus a disk-backed B-tree that stores fixed-size records
//! keyed by a 32-bit unsigned integer. It is the storage core a simple
//! SQL-like front end would sit on top of.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Table (open/insert/scan)      │
//! ├─────────────────────────────────────┤
//! │  B-Tree (find/insert/split/promote)  │
//! ├─────────────────────────────────────┤
//! │   Node Codec (leaf/interior layout)  │
//! ├─────────────────────────────────────┤
//! │     Pager (page cache + file I/O)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! - [`storage`]: the pager, a fixed-capacity cache of 4KB pages over one file
//! - [`btree`]: node codecs as zero-copy page views, tree algorithms, cursor
//! - [`row`]: fixed-width record serialization (id, username, email)
//! - [`table`]: the tree's identity (root page + pager) and the public API
//!
//! ## On-Disk Format
//!
//! The database is a flat file of 4096-byte pages. Page 0 is always the root
//! node. Each page is a leaf or interior B-tree node with a common 16-byte
//! header; there is no file-level header beyond the requirement that the file
//! length is an exact multiple of the page size.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rowdb::{Row, Table};
//!
//! let mut table = Table::open("./users.db")?;
//! table.insert(&Row::new(1, "alice", "alice@example.com")?)?;
//! for row in table.scan()? {
//!     println!("({} {} {})", row.id, row.username(), row.email());
//! }
//! table.close()?;
//! ```
//!
//! ## Concurrency Model
//!
//! Single-threaded and synchronous. One `Table`/`Pager` pair per database
//! file, exclusive single-process access, no file locking. Every operation
//! runs to completion before the next is issued.

pub mod btree;
pub mod error;
pub mod row;
pub mod storage;
pub mod table;

pub use btree::{BTree, Cursor};
pub use error::DbError;
pub use row::Row;
pub use storage::Pager;
pub use table::{Constants, Table};

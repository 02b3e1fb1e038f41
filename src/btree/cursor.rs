//! # Cursor
//!
//! A cursor is a transient position into the tree's leaf chain: the page
//! number of a leaf and a cell index within it. It supports ordered forward
//! iteration and marks the insertion point returned by a key search.
//!
//! Cursors hold a position, never a lock: any insert may split the leaf a
//! cursor points into, so a cursor must not be reused across an operation
//! that can restructure the tree. Re-acquire it with
//! [`BTree::find`](super::BTree::find) or [`BTree::start`](super::BTree::start)
//! after a mutation.

use crate::storage::PageNo;

/// A stable (page, cell) position in the leaf chain.
///
/// The access methods live on [`BTree`](super::BTree), which owns the pager
/// borrow; the cursor itself is plain data and is cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// The leaf page this cursor points into.
    pub page_no: PageNo,
    /// Cell index within the leaf; equals the cell count when the cursor
    /// sits past the last cell (the insertion point for a new maximum key).
    pub cell_index: u32,
    /// Set once iteration has consumed the final record of the final leaf.
    pub end_of_table: bool,
}

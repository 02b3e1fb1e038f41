//! # Leaf Node Codec
//!
//! Leaf nodes hold the actual records. Cells are fixed-size (key + serialized
//! row), stored as a sorted, contiguous, gap-free array directly after the
//! node header, so a cell's address is pure stride arithmetic.
//!
//! ## Page Layout
//!
//! ```text
//! +----------------------+
//! | NodeHeader (16B)     |  kind = Leaf, next_leaf in the shared link slot
//! +----------------------+
//! | Cell 0 (295B)        |  key: u32 LE | row: 291 bytes
//! | Cell 1 (295B)        |
//! | ...                  |
//! +----------------------+
//! | unused (4080 % 295)  |
//! +----------------------+
//! ```
//!
//! With 4096-byte pages, 13 cells fit: `(4096 - 16) / 295`.
//!
//! ## Split Counts
//!
//! A full leaf plus the incoming cell makes `LEAF_MAX_CELLS + 1` cells; a
//! split leaves the lower half (including any remainder) in the old page and
//! moves the upper half to the new right sibling.
//!
//! The views borrow a page buffer handed out by the pager: [`LeafNode`] for
//! reads, [`LeafNodeMut`] for in-place mutation. Neither does any I/O.

use eyre::{ensure, Result};

use super::node::{NodeHeader, NodeKind, NODE_HEADER_SIZE};
use crate::row::ROW_SIZE;
use crate::storage::{PageNo, PAGE_SIZE};

/// Key prefix size within a leaf cell.
pub const LEAF_KEY_SIZE: usize = 4;

/// Full leaf cell stride: key + serialized row.
pub const LEAF_CELL_SIZE: usize = LEAF_KEY_SIZE + ROW_SIZE;

/// Cells that fit in one leaf page.
pub const LEAF_MAX_CELLS: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / LEAF_CELL_SIZE;

/// Cells moved to the new right sibling on a split.
pub const LEAF_RIGHT_SPLIT_COUNT: usize = (LEAF_MAX_CELLS + 1) / 2;

/// Cells kept in the old (left) page on a split; holds any remainder.
pub const LEAF_LEFT_SPLIT_COUNT: usize = LEAF_MAX_CELLS + 1 - LEAF_RIGHT_SPLIT_COUNT;

/// Outcome of a key search within one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// The key exists at this cell index.
    Found(usize),
    /// The key is absent; this is the index of the first cell with a key
    /// greater than the target (the insertion point), possibly equal to the
    /// cell count.
    NotFound(usize),
}

impl SearchResult {
    pub fn index(self) -> usize {
        match self {
            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
        }
    }
}

fn cell_offset(index: usize) -> usize {
    NODE_HEADER_SIZE + index * LEAF_CELL_SIZE
}

fn key_at_raw(data: &[u8], index: usize) -> u32 {
    let off = cell_offset(index);
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn find_key_raw(data: &[u8], count: usize, key: u32) -> SearchResult {
    let mut lo = 0usize;
    let mut hi = count;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_key = key_at_raw(data, mid);
        match key.cmp(&mid_key) {
            std::cmp::Ordering::Equal => return SearchResult::Found(mid),
            std::cmp::Ordering::Less => hi = mid,
            std::cmp::Ordering::Greater => lo = mid + 1,
        }
    }
    SearchResult::NotFound(lo)
}

/// Read-only view of a page as a leaf node.
#[derive(Debug)]
pub struct LeafNode<'a> {
    data: &'a [u8],
}

/// Mutable view of a page as a leaf node.
pub struct LeafNodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> LeafNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Leaf,
            "expected leaf page, got {:?}",
            header.kind()
        );
        Ok(Self { data })
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(self.data).expect("validated in from_page")
    }

    pub fn cell_count(&self) -> usize {
        self.header().cell_count() as usize
    }

    pub fn is_root(&self) -> bool {
        self.header().is_root()
    }

    pub fn parent(&self) -> Option<PageNo> {
        self.header().parent()
    }

    pub fn next_leaf(&self) -> Option<PageNo> {
        self.header().next_leaf()
    }

    pub fn key_at(&self, index: usize) -> Result<u32> {
        ensure!(
            index < self.cell_count(),
            "cell index {} out of bounds (cell_count={})",
            index,
            self.cell_count()
        );
        Ok(key_at_raw(self.data, index))
    }

    /// The serialized row region of a cell: a view into the page, not a copy.
    pub fn row_bytes_at(&self, index: usize) -> Result<&'a [u8]> {
        ensure!(
            index < self.cell_count(),
            "cell index {} out of bounds (cell_count={})",
            index,
            self.cell_count()
        );
        let off = cell_offset(index) + LEAF_KEY_SIZE;
        Ok(&self.data[off..off + ROW_SIZE])
    }

    /// Binary search for the first cell with key >= target.
    pub fn find_key(&self, key: u32) -> SearchResult {
        find_key_raw(self.data, self.cell_count(), key)
    }

    /// The key of the last cell.
    pub fn max_key(&self) -> Result<u32> {
        let count = self.cell_count();
        ensure!(count > 0, "empty leaf has no max key");
        Ok(key_at_raw(self.data, count - 1))
    }
}

impl<'a> LeafNodeMut<'a> {
    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Leaf,
            "expected leaf page, got {:?}",
            header.kind()
        );
        Ok(Self { data })
    }

    /// Initializes a fresh page as an empty leaf.
    pub fn init(data: &'a mut [u8], is_root: bool) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        NodeHeader::init(data, NodeKind::Leaf, is_root)?;
        Ok(Self { data })
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        NodeHeader::from_bytes_mut(self.data).expect("validated in from_page")
    }

    pub fn cell_count(&self) -> usize {
        NodeHeader::from_bytes(self.data)
            .expect("validated in from_page")
            .cell_count() as usize
    }

    pub fn set_cell_count(&mut self, count: usize) {
        self.header_mut().set_cell_count(count as u32);
    }

    pub fn set_next_leaf(&mut self, page: Option<PageNo>) {
        self.header_mut().set_next_leaf(page);
    }

    pub fn set_parent(&mut self, page: Option<PageNo>) {
        self.header_mut().set_parent(page);
    }

    /// Overwrites cell `index` without touching the cell count.
    ///
    /// Used when rebuilding a page during a split; `index` may address any
    /// slot up to the page capacity.
    pub fn write_cell(&mut self, index: usize, key: u32, row_bytes: &[u8]) -> Result<()> {
        ensure!(
            index < LEAF_MAX_CELLS,
            "cell index {} beyond leaf capacity {}",
            index,
            LEAF_MAX_CELLS
        );
        ensure!(
            row_bytes.len() == ROW_SIZE,
            "row payload is {} bytes, expected {}",
            row_bytes.len(),
            ROW_SIZE
        );
        let off = cell_offset(index);
        self.data[off..off + LEAF_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        self.data[off + LEAF_KEY_SIZE..off + LEAF_CELL_SIZE].copy_from_slice(row_bytes);
        Ok(())
    }

    /// Inserts a cell at `index`, shifting subsequent cells one slot right
    /// to keep the array gap-free and sorted.
    pub fn insert_cell_at(&mut self, index: usize, key: u32, row_bytes: &[u8]) -> Result<()> {
        let count = self.cell_count();
        ensure!(
            count < LEAF_MAX_CELLS,
            "leaf is full ({count} cells); caller must split"
        );
        ensure!(
            index <= count,
            "insert index {index} out of bounds (cell_count={count})"
        );
        if index < count {
            self.data
                .copy_within(cell_offset(index)..cell_offset(count), cell_offset(index + 1));
        }
        self.write_cell(index, key, row_bytes)?;
        self.set_cell_count(count + 1);
        Ok(())
    }
}

//! # Interior Node Codec
//!
//! Interior nodes route searches. Each cell pairs a child page pointer with
//! the maximum key of that child's subtree; the header's right-child pointer
//! holds the subtree with keys greater than every stored key.
//!
//! ## Page Layout
//!
//! ```text
//! +----------------------+
//! | NodeHeader (16B)     |  kind = Interior, right_child in the link slot
//! +----------------------+
//! | Cell 0 (8B)          |  child: u32 LE | key: u32 LE
//! | Cell 1 (8B)          |
//! | ...                  |
//! +----------------------+
//! ```
//!
//! ## Navigation
//!
//! For a search key K, descend into the child of the first cell whose key is
//! >= K; when K exceeds every stored key, descend into the right child. Ties
//! route into the equal cell's child, since a stored key equals that child's
//! maximum.
//!
//! [`INTERIOR_MAX_CELLS`] is a small fixed constant rather than a value
//! derived from page capacity: the tiny fan-out keeps split and promotion
//! paths exercised by modest data sets. Raising it only changes how soon
//! interior nodes split.

use eyre::{ensure, Result};

use super::node::{NodeHeader, NodeKind, NODE_HEADER_SIZE};
use crate::storage::{PageNo, PAGE_SIZE};

const CHILD_SIZE: usize = 4;
const KEY_SIZE: usize = 4;

/// Interior cell stride: child pointer + key.
pub const INTERIOR_CELL_SIZE: usize = CHILD_SIZE + KEY_SIZE;

/// Maximum stored (child, key) cells per interior node. A tunable constant,
/// deliberately small; not derived from page capacity.
pub const INTERIOR_MAX_CELLS: usize = 3;

fn cell_offset(index: usize) -> usize {
    NODE_HEADER_SIZE + index * INTERIOR_CELL_SIZE
}

fn child_at_raw(data: &[u8], index: usize) -> u32 {
    let off = cell_offset(index);
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn key_at_raw(data: &[u8], index: usize) -> u32 {
    let off = cell_offset(index) + CHILD_SIZE;
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Read-only view of a page as an interior node.
#[derive(Debug)]
pub struct InteriorNode<'a> {
    data: &'a [u8],
}

/// Mutable view of a page as an interior node.
pub struct InteriorNodeMut<'a> {
    data: &'a mut [u8],
}

impl<'a> InteriorNode<'a> {
    pub fn from_page(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Interior,
            "expected interior page, got {:?}",
            header.kind()
        );
        Ok(Self { data })
    }

    fn header(&self) -> &NodeHeader {
        NodeHeader::from_bytes(self.data).expect("validated in from_page")
    }

    /// Number of stored (child, key) cells; the right child is separate.
    pub fn cell_count(&self) -> usize {
        self.header().cell_count() as usize
    }

    pub fn is_root(&self) -> bool {
        self.header().is_root()
    }

    pub fn parent(&self) -> Option<PageNo> {
        self.header().parent()
    }

    pub fn right_child(&self) -> Option<PageNo> {
        self.header().right_child()
    }

    pub fn child_at(&self, index: usize) -> Result<PageNo> {
        ensure!(
            index < self.cell_count(),
            "cell index {} out of bounds (cell_count={})",
            index,
            self.cell_count()
        );
        Ok(child_at_raw(self.data, index))
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

    /// Binary search for the index of the first stored key >= target;
    /// returns the cell count when the target exceeds every stored key
    /// (meaning: descend into the right child).
    pub fn find_child_index(&self, key: u32) -> usize {
        let mut lo = 0usize;
        let mut hi = self.cell_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if key_at_raw(self.data, mid) >= key {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }
}

impl<'a> InteriorNodeMut<'a> {
    pub fn from_page(data: &'a mut [u8]) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.kind() == NodeKind::Interior,
            "expected interior page, got {:?}",
            header.kind()
        );
        Ok(Self { data })
    }

    /// Initializes a fresh page as an empty interior node.
    pub fn init(data: &'a mut [u8], is_root: bool) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        NodeHeader::init(data, NodeKind::Interior, is_root)?;
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

    pub fn set_right_child(&mut self, page: Option<PageNo>) {
        self.header_mut().set_right_child(page);
    }

    pub fn set_parent(&mut self, page: Option<PageNo>) {
        self.header_mut().set_parent(page);
    }

    /// Overwrites cell `index` without touching the cell count.
    pub fn write_cell(&mut self, index: usize, child: PageNo, key: u32) -> Result<()> {
        ensure!(
            index < INTERIOR_MAX_CELLS,
            "cell index {} beyond interior capacity {}",
            index,
            INTERIOR_MAX_CELLS
        );
        let off = cell_offset(index);
        self.data[off..off + CHILD_SIZE].copy_from_slice(&child.to_le_bytes());
        self.data[off + CHILD_SIZE..off + INTERIOR_CELL_SIZE].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// Rewrites the key of an existing cell (max-key propagation).
    pub fn set_key_at(&mut self, index: usize, key: u32) -> Result<()> {
        ensure!(
            index < self.cell_count(),
            "cell index {} out of bounds (cell_count={})",
            index,
            self.cell_count()
        );
        let off = cell_offset(index) + CHILD_SIZE;
        self.data[off..off + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        Ok(())
    }

    /// Inserts a (child, key) cell at `index`, shifting subsequent cells
    /// one slot right.
    pub fn insert_cell_at(&mut self, index: usize, child: PageNo, key: u32) -> Result<()> {
        let count = self.cell_count();
        ensure!(
            count < INTERIOR_MAX_CELLS,
            "interior node is full ({count} cells); caller must split"
        );
        ensure!(
            index <= count,
            "insert index {index} out of bounds (cell_count={count})"
        );
        if index < count {
            self.data
                .copy_within(cell_offset(index)..cell_offset(count), cell_offset(index + 1));
        }
        self.write_cell(index, child, key)?;
        self.set_cell_count(count + 1);
        Ok(())
    }
}

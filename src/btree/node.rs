//! # Common Node Header
//!
//! Every B-tree page begins with this 16-byte header. The `zerocopy` derives
//! allow reading it in place from a page buffer without copying.
//!
//! ## Layout (16 bytes)
//!
//! ```text
//! Offset  Size  Field        Description
//! ------  ----  -----------  -----------------------------------------
//! 0       1     kind         1 = interior, 2 = leaf
//! 1       1     is_root      0 or 1
//! 2       2     reserved
//! 4       4     parent       parent page number, NO_PAGE = none
//! 8       4     cell_count   cells in a leaf / keys in an interior node
//! 12      4     right_child  interior: rightmost child page
//!                            leaf: next leaf page (aliased accessors)
//! ```
//!
//! The `right_child` slot is shared between the two node kinds the same way
//! the cell area is: an interior node uses it for the subtree holding keys
//! greater than every stored key, a leaf uses it as the forward pointer to
//! the next leaf in key order.
//!
//! Parent and next-leaf links use [`NO_PAGE`] as an explicit sentinel and
//! are surfaced as `Option<PageNo>`; page 0 is unambiguously the root.

use eyre::{ensure, Result};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::storage::{PageNo, NO_PAGE};

/// Size of the common node header at the start of every page.
pub const NODE_HEADER_SIZE: usize = 16;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Unknown = 0,
    Interior = 1,
    Leaf = 2,
}

impl NodeKind {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => NodeKind::Interior,
            2 => NodeKind::Leaf,
            _ => NodeKind::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    kind: u8,
    is_root: u8,
    reserved: [u8; 2],
    parent: U32<LittleEndian>,
    cell_count: U32<LittleEndian>,
    right_child: U32<LittleEndian>,
}

impl NodeHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );
        Self::ref_from_bytes(&data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );
        Self::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    /// Initializes a fresh header in place, clearing all links.
    pub fn init(data: &mut [u8], kind: NodeKind, is_root: bool) -> Result<&mut Self> {
        let header = Self::from_bytes_mut(data)?;
        header.kind = kind as u8;
        header.is_root = is_root as u8;
        header.reserved = [0; 2];
        header.parent = U32::new(NO_PAGE);
        header.cell_count = U32::new(0);
        header.right_child = U32::new(NO_PAGE);
        Ok(header)
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::from_byte(self.kind)
    }

    pub fn is_root(&self) -> bool {
        self.is_root != 0
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.is_root = is_root as u8;
    }

    pub fn parent(&self) -> Option<PageNo> {
        page_link(self.parent.get())
    }

    pub fn set_parent(&mut self, parent: Option<PageNo>) {
        self.parent = U32::new(parent.unwrap_or(NO_PAGE));
    }

    pub fn cell_count(&self) -> u32 {
        self.cell_count.get()
    }

    pub fn set_cell_count(&mut self, count: u32) {
        self.cell_count = U32::new(count);
    }

    pub fn right_child(&self) -> Option<PageNo> {
        page_link(self.right_child.get())
    }

    pub fn set_right_child(&mut self, page: Option<PageNo>) {
        self.right_child = U32::new(page.unwrap_or(NO_PAGE));
    }

    pub fn next_leaf(&self) -> Option<PageNo> {
        self.right_child()
    }

    pub fn set_next_leaf(&mut self, page: Option<PageNo>) {
        self.set_right_child(page);
    }
}

fn page_link(raw: u32) -> Option<PageNo> {
    if raw == NO_PAGE {
        None
    } else {
        Some(raw)
    }
}

/// Reads the node kind tag of a page.
pub fn node_kind(page: &[u8]) -> Result<NodeKind> {
    Ok(NodeHeader::from_bytes(page)?.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PAGE_SIZE;

    #[test]
    fn header_size_is_16_bytes() {
        assert_eq!(size_of::<NodeHeader>(), NODE_HEADER_SIZE);
    }

    #[test]
    fn init_clears_links() -> Result<()> {
        let mut page = [0xFFu8; PAGE_SIZE];

        let header = NodeHeader::init(&mut page, NodeKind::Leaf, true)?;

        assert_eq!(header.kind(), NodeKind::Leaf);
        assert!(header.is_root());
        assert_eq!(header.parent(), None);
        assert_eq!(header.cell_count(), 0);
        assert_eq!(header.next_leaf(), None);
        Ok(())
    }

    #[test]
    fn page_zero_is_a_valid_link() -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        let header = NodeHeader::init(&mut page, NodeKind::Leaf, false)?;

        header.set_parent(Some(0));
        assert_eq!(header.parent(), Some(0));

        header.set_parent(None);
        assert_eq!(header.parent(), None);
        Ok(())
    }

    #[test]
    fn right_child_and_next_leaf_alias() -> Result<()> {
        let mut page = [0u8; PAGE_SIZE];
        let header = NodeHeader::init(&mut page, NodeKind::Interior, false)?;

        header.set_right_child(Some(12345));
        assert_eq!(header.next_leaf(), Some(12345));

        header.set_next_leaf(Some(678));
        assert_eq!(header.right_child(), Some(678));
        Ok(())
    }

    #[test]
    fn node_kind_from_byte() {
        assert_eq!(NodeKind::from_byte(0), NodeKind::Unknown);
        assert_eq!(NodeKind::from_byte(1), NodeKind::Interior);
        assert_eq!(NodeKind::from_byte(2), NodeKind::Leaf);
        assert_eq!(NodeKind::from_byte(0xFF), NodeKind::Unknown);
    }
}

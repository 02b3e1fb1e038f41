//! # B-Tree Index Implementation
//!
//! This module implements the disk-backed B-tree underneath the table: node
//! codecs that interpret raw pages as leaf or interior nodes, the tree
//! algorithms (point find, insert, node splits, root promotion, max-key
//! propagation), and the cursor used to iterate records in key order.
//!
//! ## Node Types
//!
//! - **Leaf nodes** store the actual (key, row) cells in sorted order and
//!   are linked via a next-leaf pointer for ordered scans.
//! - **Interior nodes** store (child pointer, key) cells where the key is
//!   the maximum key in that child's subtree, plus a right-child pointer
//!   holding the subtree with keys greater than every stored key.
//!
//! ## Page Layout
//!
//! Every node occupies exactly one 4096-byte page and begins with a common
//! 16-byte header ([`node::NodeHeader`]). Cells follow the header as a
//! contiguous, gap-free, sorted array with a fixed stride; cell addresses
//! are header size + index × cell size.
//!
//! ```text
//! +--------------------+
//! | NodeHeader (16B)   |  kind, is_root, parent, cell_count, right/next
//! +--------------------+
//! | Cell 0             |  leaf: key u32 + row (295B total)
//! | Cell 1             |  interior: child u32 + key u32 (8B total)
//! | ...                |
//! +--------------------+
//! | unused             |
//! +--------------------+
//! ```
//!
//! ## Pointer-Free Navigation
//!
//! Child, parent and sibling links are raw page numbers, never in-memory
//! references: nodes are disk-resident and re-fetched from the pager by
//! number on every access. Node views ([`LeafNode`], [`InteriorNode`] and
//! their `Mut` pairs) borrow a page buffer and never outlive the operation
//! that obtained it.

pub mod cursor;
pub mod interior;
pub mod leaf;
pub mod node;
pub mod tree;

pub use cursor::Cursor;
pub use interior::{InteriorNode, InteriorNodeMut, INTERIOR_CELL_SIZE, INTERIOR_MAX_CELLS};
pub use leaf::{
    LeafNode, LeafNodeMut, SearchResult, LEAF_CELL_SIZE, LEAF_LEFT_SPLIT_COUNT, LEAF_MAX_CELLS,
    LEAF_RIGHT_SPLIT_COUNT,
};
pub use node::{node_kind, NodeHeader, NodeKind, NODE_HEADER_SIZE};
pub use tree::BTree;

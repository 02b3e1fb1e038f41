//! # B-Tree Algorithms
//!
//! [`BTree`] operates on pages obtained from the pager and coordinates
//! through the leaf/interior codecs. The tree holds no state of its own
//! beyond the root page number; every node is re-fetched by page number on
//! each access, so no in-memory reference outlives the operation that
//! obtained it.
//!
//! ## Search
//!
//! `find` descends from the root: interior nodes are binary-searched for the
//! first stored key >= target (ties route into the equal child, whose stored
//! key is its subtree maximum), falling through to the right child when the
//! target exceeds every stored key. The leaf is binary-searched the same
//! way; the resulting cell index equals the cell count when the leaf is
//! exhausted, which doubles as the insertion point for a new maximum key.
//!
//! ## Insert and Splits
//!
//! `insert` rejects duplicates, then either shift-inserts into the target
//! leaf or splits it: the lower half of the merged cells (including any
//! remainder) stays in the old page, the upper half moves to a new right
//! sibling, and the leaf chain is relinked. A split of the root promotes:
//! the old root's content is copied out to a fresh left-child page and
//! page 0 is rewritten as a new interior root over the two halves, so the
//! root page number never changes for the life of the file. A split below
//! the root updates the parent's stored key for the shrunk child and inserts
//! the new sibling, which may recursively split interior nodes the same
//! redistribute-and-promote way, the middle key moving up one level.
//!
//! Splits rebuild pages from a stack snapshot of the old page rather than
//! holding two cache borrows at once; the pager stays the single owner of
//! every live page buffer.

use eyre::{ensure, eyre, Result};
use smallvec::SmallVec;
use std::fmt::Write as _;
use tracing::debug;

use super::cursor::Cursor;
use super::interior::{InteriorNode, InteriorNodeMut, INTERIOR_MAX_CELLS};
use super::leaf::{
    LeafNode, LeafNodeMut, LEAF_LEFT_SPLIT_COUNT, LEAF_MAX_CELLS, LEAF_RIGHT_SPLIT_COUNT,
};
use super::node::{node_kind, NodeHeader, NodeKind};
use crate::error::DbError;
use crate::row::{Row, ROW_SIZE};
use crate::storage::{PageBuf, PageNo, Pager, MAX_PAGES};

/// The B-tree algorithms over a borrowed pager.
///
/// Cheap to construct per operation; the root page number is the only state.
pub struct BTree<'p> {
    pager: &'p mut Pager,
    root_page: PageNo,
}

impl<'p> BTree<'p> {
    pub fn new(pager: &'p mut Pager, root_page: PageNo) -> Self {
        Self { pager, root_page }
    }

    /// Descends to the leaf position for `key`: the first cell with a key
    /// >= target, or the leaf's cell count when no such cell exists.
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let mut page_no = self.root_page;
        loop {
            let page = self.pager.page(page_no)?;
            match node_kind(page)? {
                NodeKind::Leaf => {
                    let leaf = LeafNode::from_page(page)?;
                    let index = leaf.find_key(key).index();
                    let end_of_table = index >= leaf.cell_count() && leaf.next_leaf().is_none();
                    return Ok(Cursor {
                        page_no,
                        cell_index: index as u32,
                        end_of_table,
                    });
                }
                NodeKind::Interior => {
                    let node = InteriorNode::from_page(page)?;
                    let index = node.find_child_index(key);
                    page_no = if index < node.cell_count() {
                        node.child_at(index)?
                    } else {
                        node.right_child()
                            .ok_or_else(|| eyre!("interior page {page_no} has no right child"))?
                    };
                }
                NodeKind::Unknown => {
                    eyre::bail!("page {page_no} is not an initialized node")
                }
            }
        }
    }

    /// Positions at the first record in key order; end-of-table when the
    /// tree is empty.
    pub fn start(&mut self) -> Result<Cursor> {
        self.find(0)
    }

    /// Moves the cursor to the next record, following the leaf chain.
    /// Returns `false` once the final record has been consumed; advancing an
    /// already-exhausted cursor is a usage error.
    pub fn advance(&mut self, cursor: &mut Cursor) -> Result<bool> {
        if cursor.end_of_table {
            return Err(DbError::CursorAtEnd.into());
        }
        cursor.cell_index += 1;

        let page = self.pager.page(cursor.page_no)?;
        let leaf = LeafNode::from_page(page)?;
        if (cursor.cell_index as usize) < leaf.cell_count() {
            return Ok(true);
        }
        match leaf.next_leaf() {
            Some(next) => {
                cursor.page_no = next;
                cursor.cell_index = 0;
                Ok(true)
            }
            None => {
                cursor.end_of_table = true;
                Ok(false)
            }
        }
    }

    /// The key under the cursor, or `None` when the cursor sits past the
    /// last cell of its leaf.
    pub fn peek_key(&mut self, cursor: &Cursor) -> Result<Option<u32>> {
        let page = self.pager.page(cursor.page_no)?;
        let leaf = LeafNode::from_page(page)?;
        if (cursor.cell_index as usize) < leaf.cell_count() {
            Ok(Some(leaf.key_at(cursor.cell_index as usize)?))
        } else {
            Ok(None)
        }
    }

    /// The serialized row under the cursor: a view into the page.
    pub fn row_bytes(&mut self, cursor: &Cursor) -> Result<&[u8]> {
        if cursor.end_of_table {
            return Err(DbError::CursorAtEnd.into());
        }
        let page = self.pager.page(cursor.page_no)?;
        let leaf = LeafNode::from_page(page)?;
        if (cursor.cell_index as usize) >= leaf.cell_count() {
            return Err(DbError::CursorAtEnd.into());
        }
        leaf.row_bytes_at(cursor.cell_index as usize)
    }

    /// The decoded row under the cursor.
    pub fn row(&mut self, cursor: &Cursor) -> Result<Row> {
        Row::deserialize(self.row_bytes(cursor)?)
    }

    /// Inserts a record, rejecting duplicates with [`DbError::DuplicateKey`]
    /// and growing the tree through splits as needed. Capacity exhaustion
    /// surfaces as [`DbError::TableFull`]; the tree is left unchanged on any
    /// failure.
    pub fn insert(&mut self, key: u32, row: &Row) -> Result<()> {
        let cursor = self.find(key)?;

        let (cell_count, has_room) = {
            let page = self.pager.page(cursor.page_no)?;
            let leaf = LeafNode::from_page(page)?;
            if (cursor.cell_index as usize) < leaf.cell_count()
                && leaf.key_at(cursor.cell_index as usize)? == key
            {
                return Err(DbError::DuplicateKey(key).into());
            }
            (leaf.cell_count(), leaf.cell_count() < LEAF_MAX_CELLS)
        };
        debug_assert!(cursor.cell_index as usize <= cell_count);

        if has_room {
            let mut row_buf = [0u8; ROW_SIZE];
            row.serialize(&mut row_buf)?;
            let page = self.pager.page_mut(cursor.page_no)?;
            let mut leaf = LeafNodeMut::from_page(page)?;
            leaf.insert_cell_at(cursor.cell_index as usize, key, &row_buf)?;
            Ok(())
        } else {
            self.ensure_split_capacity(cursor.page_no)?;
            self.leaf_split_and_insert(&cursor, key, row)
        }
    }

    /// Verifies up front that the pager can supply every page the split
    /// cascade from `leaf_page` may allocate: one sibling per full node on
    /// the ancestor chain, plus one when the chain ends in a root promotion.
    /// An allocation failure mid-split would leave the tree half-rewritten,
    /// so capacity must be rejected while the tree is still untouched.
    fn ensure_split_capacity(&mut self, leaf_page: PageNo) -> Result<()> {
        // The splitting leaf always needs a sibling.
        let mut needed: u32 = 1;
        let mut page_no = leaf_page;
        loop {
            let header = NodeHeader::from_bytes(self.pager.page(page_no)?)?;
            if header.is_root() {
                // Promotion copies the old root out to a fresh left child.
                needed += 1;
                break;
            }
            let parent = header
                .parent()
                .ok_or_else(|| eyre!("non-root page {page_no} has no parent pointer"))?;
            let parent_node = InteriorNode::from_page(self.pager.page(parent)?)?;
            if parent_node.cell_count() < INTERIOR_MAX_CELLS {
                break;
            }
            needed += 1;
            page_no = parent;
        }
        let free = MAX_PAGES as u32 - self.pager.page_count();
        if needed > free {
            return Err(DbError::TableFull(MAX_PAGES as u32).into());
        }
        Ok(())
    }

    /// Maximum key of the subtree rooted at `page_no`: a leaf's last key,
    /// reached through right-child pointers.
    pub fn max_key(&mut self, mut page_no: PageNo) -> Result<u32> {
        loop {
            let page = self.pager.page(page_no)?;
            match node_kind(page)? {
                NodeKind::Leaf => return LeafNode::from_page(page)?.max_key(),
                NodeKind::Interior => {
                    page_no = InteriorNode::from_page(page)?
                        .right_child()
                        .ok_or_else(|| eyre!("interior page {page_no} has no right child"))?;
                }
                NodeKind::Unknown => {
                    eyre::bail!("page {page_no} is not an initialized node")
                }
            }
        }
    }

    /// Splits a full leaf around an incoming cell. The merged sequence of
    /// existing cells plus the new one is redistributed: lower half
    /// (with any remainder) into the old page, upper half into a freshly
    /// allocated right sibling.
    fn leaf_split_and_insert(&mut self, cursor: &Cursor, key: u32, row: &Row) -> Result<()> {
        let old_page = cursor.page_no;
        let snapshot: PageBuf = *self.pager.page(old_page)?;
        let old_leaf = LeafNode::from_page(&snapshot)?;
        let old_max = old_leaf.max_key()?;
        let old_next = old_leaf.next_leaf();
        let old_parent = old_leaf.parent();
        let was_root = old_leaf.is_root();

        let mut row_buf = [0u8; ROW_SIZE];
        row.serialize(&mut row_buf)?;

        let new_page = self.pager.allocate()?;
        debug!(old_page, new_page, key, "splitting leaf");

        let insert_index = cursor.cell_index as usize;

        {
            let page = self.pager.page_mut(new_page)?;
            let mut new_leaf = LeafNodeMut::init(page, false)?;
            for i in LEAF_LEFT_SPLIT_COUNT..=LEAF_MAX_CELLS {
                let (k, r) = merged_cell(&old_leaf, insert_index, key, &row_buf, i)?;
                new_leaf.write_cell(i - LEAF_LEFT_SPLIT_COUNT, k, r)?;
            }
            new_leaf.set_cell_count(LEAF_RIGHT_SPLIT_COUNT);
            new_leaf.set_next_leaf(old_next);
            new_leaf.set_parent(old_parent);
        }
        {
            let page = self.pager.page_mut(old_page)?;
            let mut left_leaf = LeafNodeMut::from_page(page)?;
            for i in 0..LEAF_LEFT_SPLIT_COUNT {
                let (k, r) = merged_cell(&old_leaf, insert_index, key, &row_buf, i)?;
                left_leaf.write_cell(i, k, r)?;
            }
            left_leaf.set_cell_count(LEAF_LEFT_SPLIT_COUNT);
            left_leaf.set_next_leaf(Some(new_page));
        }

        if was_root {
            self.create_new_root(new_page)
        } else {
            let parent = old_parent
                .ok_or_else(|| eyre!("non-root leaf {old_page} has no parent pointer"))?;
            let new_left_max = self.max_key(old_page)?;
            self.update_key(parent, old_max, new_left_max)?;
            self.interior_insert(parent, new_page)
        }
    }

    /// Root promotion: copies the old root's content into a freshly
    /// allocated left-child page and rewrites the root page in place as an
    /// interior node over (left, right). The root page number never changes.
    fn create_new_root(&mut self, right_child_page: PageNo) -> Result<()> {
        let snapshot: PageBuf = *self.pager.page(self.root_page)?;
        let root_kind = node_kind(&snapshot)?;
        let left_page = self.pager.allocate()?;
        debug!(
            root = self.root_page,
            left_page, right_child_page, "promoting root"
        );

        if root_kind == NodeKind::Interior {
            // An interior split hands over its right sibling uninitialized.
            let page = self.pager.page_mut(right_child_page)?;
            InteriorNodeMut::init(page, false)?;
        }

        {
            let page = self.pager.page_mut(left_page)?;
            *page = snapshot;
            let header = NodeHeader::from_bytes_mut(page)?;
            header.set_root(false);
        }

        if root_kind == NodeKind::Interior {
            // The copied node's children still point at the root page.
            let old_root = InteriorNode::from_page(&snapshot)?;
            let mut children: SmallVec<[PageNo; INTERIOR_MAX_CELLS + 1]> = SmallVec::new();
            for i in 0..old_root.cell_count() {
                children.push(old_root.child_at(i)?);
            }
            if let Some(right) = old_root.right_child() {
                children.push(right);
            }
            for child in children {
                self.set_parent(child, left_page)?;
            }
        }

        let left_max = self.max_key(left_page)?;
        {
            let page = self.pager.page_mut(self.root_page)?;
            let mut root = InteriorNodeMut::init(page, true)?;
            root.write_cell(0, left_page, left_max)?;
            root.set_cell_count(1);
            root.set_right_child(Some(right_child_page));
        }
        self.set_parent(left_page, self.root_page)?;
        self.set_parent(right_child_page, self.root_page)?;
        Ok(())
    }

    /// Adds a new child under an interior node, keyed by the child's subtree
    /// maximum; splits the node when it is already at capacity.
    fn interior_insert(&mut self, parent_page: PageNo, child_page: PageNo) -> Result<()> {
        let child_max = self.max_key(child_page)?;

        let (cell_count, right_child) = {
            let node = InteriorNode::from_page(self.pager.page(parent_page)?)?;
            (node.cell_count(), node.right_child())
        };

        if cell_count >= INTERIOR_MAX_CELLS {
            return self.interior_split_and_insert(parent_page, child_page);
        }

        let Some(right_child) = right_child else {
            // Mid-split state: the node lost its right child and adopts this
            // one directly.
            let page = self.pager.page_mut(parent_page)?;
            InteriorNodeMut::from_page(page)?.set_right_child(Some(child_page));
            return self.set_parent(child_page, parent_page);
        };

        let right_max = self.max_key(right_child)?;
        if child_max > right_max {
            // The new child becomes the right child; the old right child
            // moves into the cell array.
            let page = self.pager.page_mut(parent_page)?;
            let mut node = InteriorNodeMut::from_page(page)?;
            node.write_cell(cell_count, right_child, right_max)?;
            node.set_cell_count(cell_count + 1);
            node.set_right_child(Some(child_page));
        } else {
            let index = InteriorNode::from_page(self.pager.page(parent_page)?)?
                .find_child_index(child_max);
            let page = self.pager.page_mut(parent_page)?;
            InteriorNodeMut::from_page(page)?.insert_cell_at(index, child_page, child_max)?;
        }
        self.set_parent(child_page, parent_page)
    }

    /// Splits a full interior node while adopting one more child. The upper
    /// cells and the right child move to a new sibling, the last remaining
    /// cell's child is promoted to the old node's right child (its key moves
    /// up one level via the parent's rewritten max), and the incoming child
    /// lands on whichever side its keys belong.
    fn interior_split_and_insert(&mut self, parent_page: PageNo, child_page: PageNo) -> Result<()> {
        let mut old_page = parent_page;
        let old_max = self.max_key(old_page)?;
        let child_max = self.max_key(child_page)?;

        let splitting_root = NodeHeader::from_bytes(self.pager.page(old_page)?)?.is_root();

        let new_page = self.pager.allocate()?;
        debug!(old_page, new_page, splitting_root, "splitting interior node");

        let parent_of_split;
        if splitting_root {
            // The promotion copies the old root out to a new left child and
            // adopts `new_page` (still uninitialized) as the right child;
            // continue the split inside the copy.
            self.create_new_root(new_page)?;
            parent_of_split = self.root_page;
            old_page =
                InteriorNode::from_page(self.pager.page(self.root_page)?)?.child_at(0)?;
        } else {
            parent_of_split = NodeHeader::from_bytes(self.pager.page(old_page)?)?
                .parent()
                .ok_or_else(|| eyre!("non-root interior page {old_page} has no parent"))?;
            let page = self.pager.page_mut(new_page)?;
            InteriorNodeMut::init(page, false)?;
        }

        // Move the old right child over first, then the upper cells.
        let old_right = InteriorNode::from_page(self.pager.page(old_page)?)?
            .right_child()
            .ok_or_else(|| eyre!("interior page {old_page} has no right child"))?;
        {
            let page = self.pager.page_mut(old_page)?;
            InteriorNodeMut::from_page(page)?.set_right_child(None);
        }
        self.interior_insert(new_page, old_right)?;

        for i in ((INTERIOR_MAX_CELLS / 2 + 1)..INTERIOR_MAX_CELLS).rev() {
            let moved_child =
                InteriorNode::from_page(self.pager.page(old_page)?)?.child_at(i)?;
            {
                let page = self.pager.page_mut(old_page)?;
                InteriorNodeMut::from_page(page)?.set_cell_count(i);
            }
            self.interior_insert(new_page, moved_child)?;
        }

        // The last remaining cell's child becomes the old node's right
        // child; its key is the one that moves up a level.
        {
            let node = InteriorNode::from_page(self.pager.page(old_page)?)?;
            let count = node.cell_count();
            ensure!(count > 0, "interior split drained page {old_page}");
            let promoted = node.child_at(count - 1)?;
            let page = self.pager.page_mut(old_page)?;
            let mut node = InteriorNodeMut::from_page(page)?;
            node.set_right_child(Some(promoted));
            node.set_cell_count(count - 1);
        }

        let max_after_split = self.max_key(old_page)?;
        let destination = if child_max < max_after_split {
            old_page
        } else {
            new_page
        };
        self.interior_insert(destination, child_page)?;

        let old_new_max = self.max_key(old_page)?;
        self.update_key(parent_of_split, old_max, old_new_max)?;

        if !splitting_root {
            self.interior_insert(parent_of_split, new_page)?;
        }
        Ok(())
    }

    /// Max-key propagation: rewrites the parent's stored key for a child
    /// whose maximum changed. A key that belonged to the right child has no
    /// stored entry to rewrite.
    fn update_key(&mut self, page_no: PageNo, old_key: u32, new_key: u32) -> Result<()> {
        let index =
            InteriorNode::from_page(self.pager.page(page_no)?)?.find_child_index(old_key);
        let page = self.pager.page_mut(page_no)?;
        let mut node = InteriorNodeMut::from_page(page)?;
        if index < node.cell_count() {
            node.set_key_at(index, new_key)?;
        }
        Ok(())
    }

    fn set_parent(&mut self, page_no: PageNo, parent: PageNo) -> Result<()> {
        let page = self.pager.page_mut(page_no)?;
        NodeHeader::from_bytes_mut(page)?.set_parent(Some(parent));
        Ok(())
    }

    /// Depth-first tree printout: node kinds, cell counts and keys, indented
    /// by depth. Read-only debug introspection.
    pub fn dump(&mut self) -> Result<String> {
        let mut out = String::new();
        self.dump_node(self.root_page, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&mut self, page_no: PageNo, depth: usize, out: &mut String) -> Result<()> {
        let page = self.pager.page(page_no)?;
        match node_kind(page)? {
            NodeKind::Leaf => {
                let leaf = LeafNode::from_page(page)?;
                let count = leaf.cell_count();
                let mut keys: SmallVec<[u32; LEAF_MAX_CELLS]> = SmallVec::new();
                for i in 0..count {
                    keys.push(leaf.key_at(i)?);
                }
                indent(out, depth);
                writeln!(out, "- leaf (size {count})")?;
                for key in keys {
                    indent(out, depth + 1);
                    writeln!(out, "- {key}")?;
                }
            }
            NodeKind::Interior => {
                let node = InteriorNode::from_page(page)?;
                let count = node.cell_count();
                let mut cells: SmallVec<[(PageNo, u32); INTERIOR_MAX_CELLS]> = SmallVec::new();
                for i in 0..count {
                    cells.push((node.child_at(i)?, node.key_at(i)?));
                }
                let right = node.right_child();
                indent(out, depth);
                writeln!(out, "- internal (size {count})")?;
                for (child, key) in cells {
                    self.dump_node(child, depth + 1, out)?;
                    indent(out, depth + 1);
                    writeln!(out, "- key {key}")?;
                }
                if let Some(right) = right {
                    self.dump_node(right, depth + 1, out)?;
                }
            }
            NodeKind::Unknown => {
                eyre::bail!("page {page_no} is not an initialized node")
            }
        }
        Ok(())
    }
}

/// Cell `i` of the merged, post-insert cell sequence of a splitting leaf:
/// the old cells with the incoming (key, row) spliced in at `insert_index`.
fn merged_cell<'a>(
    old_leaf: &LeafNode<'a>,
    insert_index: usize,
    key: u32,
    row_buf: &'a [u8],
    i: usize,
) -> Result<(u32, &'a [u8])> {
    match i.cmp(&insert_index) {
        std::cmp::Ordering::Less => Ok((old_leaf.key_at(i)?, old_leaf.row_bytes_at(i)?)),
        std::cmp::Ordering::Equal => Ok((key, row_buf)),
        std::cmp::Ordering::Greater => {
            Ok((old_leaf.key_at(i - 1)?, old_leaf.row_bytes_at(i - 1)?))
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

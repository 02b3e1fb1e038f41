//! # Table
//!
//! The public face of the engine: one table per file, rows keyed by id. A
//! [`Table`] owns the pager and the tree's identity (the root page number,
//! always page 0) and hands every operation to a per-call [`BTree`] over a
//! borrowed pager.
//!
//! Opening a zero-length file initializes page 0 as an empty root leaf;
//! opening an existing file picks up whatever tree the last flush persisted.
//! Durability is explicit: [`Table::close`] flushes every cached page, and
//! dropping an unclosed table flushes as a last resort.

use std::fmt;
use std::path::Path;

use eyre::Result;
use tracing::error;

use crate::btree::{
    BTree, Cursor, LeafNodeMut, INTERIOR_CELL_SIZE, INTERIOR_MAX_CELLS, LEAF_CELL_SIZE,
    LEAF_MAX_CELLS, NODE_HEADER_SIZE,
};
use crate::row::{Row, ROW_SIZE};
use crate::storage::{PageNo, Pager, PAGE_SIZE};

/// The page number of the tree root. Fixed for the life of the file; root
/// splits copy the old root out rather than moving the root.
const ROOT_PAGE: PageNo = 0;

/// A single-file table of fixed-width rows keyed by id.
#[derive(Debug)]
pub struct Table {
    pager: Pager,
    root_page: PageNo,
    closed: bool,
}

impl Table {
    /// Opens (or creates) the database file at `path`. A fresh file gets
    /// page 0 initialized as an empty root leaf.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut pager = Pager::open(path)?;
        if pager.page_count() == 0 {
            let page = pager.page_mut(ROOT_PAGE)?;
            LeafNodeMut::init(page, true)?;
        }
        Ok(Self {
            pager,
            root_page: ROOT_PAGE,
            closed: false,
        })
    }

    fn tree(&mut self) -> BTree<'_> {
        BTree::new(&mut self.pager, self.root_page)
    }

    /// Inserts a row keyed by its id. Fails with [`DbError::DuplicateKey`]
    /// when the id is already present and [`DbError::TableFull`] when the
    /// file is at page capacity.
    pub fn insert(&mut self, row: &Row) -> Result<()> {
        self.tree().insert(row.id, row)
    }

    /// Looks up a row by id.
    pub fn get(&mut self, id: u32) -> Result<Option<Row>> {
        let mut tree = self.tree();
        let cursor = tree.find(id)?;
        if tree.peek_key(&cursor)? == Some(id) {
            Ok(Some(tree.row(&cursor)?))
        } else {
            Ok(None)
        }
    }

    /// All rows in ascending id order.
    pub fn scan(&mut self) -> Result<Vec<Row>> {
        let mut tree = self.tree();
        let mut rows = Vec::new();
        let mut cursor = tree.start()?;
        while !cursor.end_of_table {
            rows.push(tree.row(&cursor)?);
            if !tree.advance(&mut cursor)? {
                break;
            }
        }
        Ok(rows)
    }

    /// Positions a cursor at the first row in id order.
    pub fn start(&mut self) -> Result<Cursor> {
        self.tree().start()
    }

    /// Advances a cursor to the next row; `false` once the table is
    /// exhausted.
    pub fn advance(&mut self, cursor: &mut Cursor) -> Result<bool> {
        self.tree().advance(cursor)
    }

    /// The row under a cursor.
    pub fn row_at(&mut self, cursor: &Cursor) -> Result<Row> {
        self.tree().row(cursor)
    }

    /// The tree's layout constants.
    pub fn constants(&self) -> Constants {
        Constants::default()
    }

    /// Indented depth-first printout of the tree structure.
    pub fn dump_tree(&mut self) -> Result<String> {
        self.tree().dump()
    }

    /// Flushes every cached page to disk and releases the table.
    pub fn close(mut self) -> Result<()> {
        self.pager.flush_all()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.pager.flush_all() {
                error!(?err, "failed to flush table on drop");
            }
        }
    }
}

/// Layout constants of the on-disk format, for debug introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constants {
    pub page_size: usize,
    pub row_size: usize,
    pub node_header_size: usize,
    pub leaf_cell_size: usize,
    pub leaf_max_cells: usize,
    pub interior_cell_size: usize,
    pub interior_max_cells: usize,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            row_size: ROW_SIZE,
            node_header_size: NODE_HEADER_SIZE,
            leaf_cell_size: LEAF_CELL_SIZE,
            leaf_max_cells: LEAF_MAX_CELLS,
            interior_cell_size: INTERIOR_CELL_SIZE,
            interior_max_cells: INTERIOR_MAX_CELLS,
        }
    }
}

impl fmt::Display for Constants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PAGE_SIZE: {}", self.page_size)?;
        writeln!(f, "ROW_SIZE: {}", self.row_size)?;
        writeln!(f, "NODE_HEADER_SIZE: {}", self.node_header_size)?;
        writeln!(f, "LEAF_CELL_SIZE: {}", self.leaf_cell_size)?;
        writeln!(f, "LEAF_MAX_CELLS: {}", self.leaf_max_cells)?;
        writeln!(f, "INTERIOR_CELL_SIZE: {}", self.interior_cell_size)?;
        write!(f, "INTERIOR_MAX_CELLS: {}", self.interior_max_cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use tempfile::tempdir;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()
    }

    #[test]
    fn insert_and_get() -> Result<()> {
        let dir = tempdir()?;
        let mut table = Table::open(dir.path().join("users.db"))?;

        table.insert(&row(3))?;
        table.insert(&row(1))?;
        table.insert(&row(2))?;

        let found = table.get(2)?.unwrap();
        assert_eq!(found.username(), "user2");
        assert_eq!(found.email(), "user2@example.com");
        assert_eq!(table.get(4)?, None);
        Ok(())
    }

    #[test]
    fn scan_returns_rows_in_id_order() -> Result<()> {
        let dir = tempdir()?;
        let mut table = Table::open(dir.path().join("users.db"))?;
        for id in [5, 3, 9, 1, 7] {
            table.insert(&row(id))?;
        }

        let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();

        assert_eq!(ids, vec![1, 3, 5, 7, 9]);
        Ok(())
    }

    #[test]
    fn duplicate_id_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let mut table = Table::open(dir.path().join("users.db"))?;
        table.insert(&row(1))?;

        let err = table.insert(&row(1)).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::DuplicateKey(1))
        ));
        Ok(())
    }

    #[test]
    fn close_persists_and_reopen_reads_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("users.db");
        {
            let mut table = Table::open(&path)?;
            for id in 1..=20 {
                table.insert(&row(id))?;
            }
            table.close()?;
        }

        let mut table = Table::open(&path)?;
        let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        assert_eq!(table.get(13)?.unwrap().username(), "user13");
        Ok(())
    }

    #[test]
    fn drop_without_close_still_persists() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("users.db");
        {
            let mut table = Table::open(&path)?;
            table.insert(&row(42))?;
        }

        let mut table = Table::open(&path)?;
        assert_eq!(table.get(42)?.unwrap().id, 42);
        Ok(())
    }

    #[test]
    fn cursor_walks_the_table() -> Result<()> {
        let dir = tempdir()?;
        let mut table = Table::open(dir.path().join("users.db"))?;
        for id in 1..=3 {
            table.insert(&row(id))?;
        }

        let mut cursor = table.start()?;
        let mut ids = Vec::new();
        while !cursor.end_of_table {
            ids.push(table.row_at(&cursor)?.id);
            if !table.advance(&mut cursor)? {
                break;
            }
        }
        assert_eq!(ids, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn constants_display_lists_the_layout() {
        let text = Constants::default().to_string();

        assert!(text.contains("PAGE_SIZE: 4096"));
        assert!(text.contains("ROW_SIZE: 291"));
        assert!(text.contains("LEAF_CELL_SIZE: 295"));
        assert!(text.contains("LEAF_MAX_CELLS: 13"));
    }

    #[test]
    fn dump_tree_on_a_small_table() -> Result<()> {
        let dir = tempdir()?;
        let mut table = Table::open(dir.path().join("users.db"))?;
        for id in 1..=3 {
            table.insert(&row(id))?;
        }

        let dump = table.dump_tree()?;

        assert_eq!(dump, "- leaf (size 3)\n  - 1\n  - 2\n  - 3\n");
        Ok(())
    }
}

//! # Persistence Test Suite
//!
//! End-to-end scenarios across a close/reopen boundary: everything written
//! before a flush must come back identically, including trees that have
//! split across multiple pages.

use eyre::Result;
use tempfile::tempdir;

use rowdb::{DbError, Row, Table};

fn row(id: u32) -> Row {
    Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()
}

#[test]
fn single_row_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    {
        let mut table = Table::open(&path)?;
        table.insert(&Row::new(1, "alice", "alice@example.com")?)?;
        table.close()?;
    }

    let mut table = Table::open(&path)?;
    let found = table.get(1)?.unwrap();
    assert_eq!(found.username(), "alice");
    assert_eq!(found.email(), "alice@example.com");
    Ok(())
}

#[test]
fn multi_page_tree_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");

    // 250 keys visited in a scrambled order (77 is invertible mod the
    // prime 251, so i * 77 mod 251 permutes 1..=250).
    let keys: Vec<u32> = (1..=250u32).map(|i| i * 77 % 251).collect();
    {
        let mut table = Table::open(&path)?;
        for &key in &keys {
            table.insert(&row(key))?;
        }
        table.close()?;
    }

    let mut table = Table::open(&path)?;
    let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    assert_eq!(table.get(173)?.unwrap().username(), "user173");
    assert_eq!(table.get(251)?, None);
    Ok(())
}

#[test]
fn inserts_after_reopen_extend_the_same_tree() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    {
        let mut table = Table::open(&path)?;
        for id in (2..=100).step_by(2) {
            table.insert(&row(id))?;
        }
        table.close()?;
    }

    let mut table = Table::open(&path)?;
    for id in (1..=99).step_by(2) {
        table.insert(&row(id))?;
    }
    let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
    assert_eq!(ids, (1..=100).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn duplicate_check_spans_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    {
        let mut table = Table::open(&path)?;
        table.insert(&row(7))?;
        table.close()?;
    }

    let mut table = Table::open(&path)?;
    let err = table.insert(&row(7)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::DuplicateKey(7))
    ));
    Ok(())
}

#[test]
fn opening_a_truncated_file_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("test.db");
    std::fs::write(&path, vec![0u8; 100])?;

    let err = Table::open(&path).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::Corrupt { len: 100, .. })
    ));
    Ok(())
}

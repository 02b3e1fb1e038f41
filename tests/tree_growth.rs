//! # Tree Growth Test Suite
//!
//! Structural scenarios: the exact shape after the first split, ordering
//! across deep trees built from adversarial insert orders, boundary key
//! values, and capacity exhaustion.

use eyre::Result;
use std::fmt::Write as _;
use tempfile::tempdir;

use rowdb::{DbError, Row, Table};

fn row(id: u32) -> Row {
    Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()
}

#[test]
fn first_split_produces_two_balanced_leaves() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;

    // One more than a leaf holds (13 cells).
    for id in 1..=14 {
        table.insert(&row(id))?;
    }

    let mut expected = String::new();
    writeln!(expected, "- internal (size 1)")?;
    writeln!(expected, "  - leaf (size 7)")?;
    for key in 1..=7 {
        writeln!(expected, "    - {key}")?;
    }
    writeln!(expected, "  - key 7")?;
    writeln!(expected, "  - leaf (size 7)")?;
    for key in 8..=14 {
        writeln!(expected, "    - {key}")?;
    }
    assert_eq!(table.dump_tree()?, expected);
    Ok(())
}

#[test]
fn interleaved_inserts_build_an_ordered_deep_tree() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;

    // Low/high pairs closing toward the middle exercise splits at both
    // ends of the key space.
    for i in 0..100u32 {
        table.insert(&row(1 + i))?;
        table.insert(&row(1000 - i))?;
    }

    let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
    let mut expected: Vec<u32> = (1..=100).collect();
    expected.extend(901..=1000);
    assert_eq!(ids, expected);

    let dump = table.dump_tree()?;
    assert!(dump.matches("- internal").count() > 1);
    Ok(())
}

#[test]
fn boundary_key_values_are_ordinary_keys() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;

    table.insert(&row(u32::MAX))?;
    table.insert(&row(0))?;
    table.insert(&row(1))?;

    let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 1, u32::MAX]);
    assert_eq!(table.get(u32::MAX)?.unwrap().id, u32::MAX);
    Ok(())
}

#[test]
fn point_lookups_across_a_deep_tree() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;
    for id in (1..=300).rev() {
        table.insert(&row(id))?;
    }

    for id in [1, 7, 8, 150, 299, 300] {
        assert_eq!(table.get(id)?.unwrap().id, id, "lookup of {id}");
    }
    assert_eq!(table.get(0)?, None);
    assert_eq!(table.get(301)?, None);
    Ok(())
}

#[test]
fn page_capacity_exhaustion_surfaces_as_table_full() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;

    let mut inserted = 0u32;
    let err = loop {
        match table.insert(&row(inserted + 1)) {
            Ok(()) => inserted += 1,
            Err(err) => break err,
        }
    };

    assert!(matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::TableFull(_))
    ));
    // 100 pages of 13-cell leaves minus interior overhead.
    assert!(inserted > 400, "only {inserted} rows fit");
    Ok(())
}

#[test]
fn capacity_failure_leaves_committed_rows_intact() -> Result<()> {
    let dir = tempdir()?;
    let mut table = Table::open(dir.path().join("test.db"))?;

    // A scattered insert order (29 is invertible mod the prime 2003) so the
    // split that hits capacity lands under an already-full interior node.
    let mut inserted = Vec::new();
    let mut rejected = None;
    for i in 0u32..2003 {
        let key = i * 29 % 2003;
        match table.insert(&row(key)) {
            Ok(()) => inserted.push(key),
            Err(err) => {
                assert!(matches!(
                    err.downcast_ref::<DbError>(),
                    Some(DbError::TableFull(_))
                ));
                rejected = Some(key);
                break;
            }
        }
    }
    let rejected = rejected.expect("table never filled up");

    // The failed insert must not have half-applied.
    assert_eq!(table.get(rejected)?, None);

    let mut expected = inserted.clone();
    expected.sort_unstable();
    let ids: Vec<u32> = table.scan()?.iter().map(|r| r.id).collect();
    assert_eq!(ids, expected);

    for &key in &inserted {
        assert_eq!(table.get(key)?.map(|r| r.id), Some(key), "lookup of {key}");
    }
    Ok(())
}

//! # Fixed-Width Row Serialization
//!
//! A row is the record stored in leaf cells: a 32-bit id plus two bounded
//! text columns. Serialization is a fixed byte layout with no padding and no
//! variable-length encoding, so every cell has the same size and cell
//! addresses are pure stride arithmetic.
//!
//! ## Layout (291 bytes)
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------
//! 0       4     id        u32, little-endian
//! 4       32    username  UTF-8, NUL-padded
//! 36      255   email     UTF-8, NUL-padded
//! ```
//!
//! Field lengths are validated at construction, so a `Row` always fits its
//! serialized form exactly.

use eyre::{ensure, Result, WrapErr};

use crate::error::DbError;

/// Maximum username length in bytes.
pub const USERNAME_MAX: usize = 32;

/// Maximum email length in bytes.
pub const EMAIL_MAX: usize = 255;

const ID_SIZE: usize = 4;
const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_MAX;

/// Serialized row size: 4 + 32 + 255.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_MAX + EMAIL_MAX;

/// A fixed-width record: (id, username, email).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    username: String,
    email: String,
}

impl Row {
    /// Builds a row, rejecting fields over their column bound with
    /// [`DbError::FieldTooLong`].
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let email = email.into();
        if username.len() > USERNAME_MAX {
            return Err(DbError::FieldTooLong {
                field: "username",
                max: USERNAME_MAX,
            }
            .into());
        }
        if email.len() > EMAIL_MAX {
            return Err(DbError::FieldTooLong {
                field: "email",
                max: EMAIL_MAX,
            }
            .into());
        }
        Ok(Self {
            id,
            username,
            email,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Writes the fixed layout into `out`, NUL-padding the text columns.
    pub fn serialize(&self, out: &mut [u8]) -> Result<()> {
        ensure!(
            out.len() >= ROW_SIZE,
            "buffer too small for row: {} < {}",
            out.len(),
            ROW_SIZE
        );
        out[..ROW_SIZE].fill(0);
        out[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        out[USERNAME_OFFSET..USERNAME_OFFSET + self.username.len()]
            .copy_from_slice(self.username.as_bytes());
        out[EMAIL_OFFSET..EMAIL_OFFSET + self.email.len()].copy_from_slice(self.email.as_bytes());
        Ok(())
    }

    /// Reads a row back from its fixed layout.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        ensure!(
            data.len() >= ROW_SIZE,
            "buffer too small for row: {} < {}",
            data.len(),
            ROW_SIZE
        );
        let id = u32::from_le_bytes([
            data[ID_OFFSET],
            data[ID_OFFSET + 1],
            data[ID_OFFSET + 2],
            data[ID_OFFSET + 3],
        ]);
        let username = read_padded(&data[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_MAX])
            .wrap_err("invalid utf-8 in username")?;
        let email = read_padded(&data[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_MAX])
            .wrap_err("invalid utf-8 in email")?;
        Ok(Self {
            id,
            username,
            email,
        })
    }
}

fn read_padded(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end])?;
    Ok(text.to_owned())
}

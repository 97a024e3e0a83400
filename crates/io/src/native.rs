//! Native record stream.
//!
//! One record per cell, in table order, `~`-terminated, fields separated by
//! single spaces:
//!
//! ```text
//! <col> <row> [=]<expression text>~
//! ```
//!
//! A leading `=` in the contents field marks a committed formula; everything
//! else reloads as a literal. The `~` terminator makes the stream
//! self-framing; a missing final separator is tolerated on load.

use std::io::{self, Read, Write};

use thiserror::Error;

use lazygrid_engine::pos::Pos;
use lazygrid_engine::sheet::Sheet;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read sheet stream")]
    Io(#[from] io::Error),
    #[error("malformed record {index}: {reason}")]
    BadRecord { index: usize, reason: &'static str },
}

pub fn save(sheet: &Sheet, out: &mut impl Write) -> io::Result<()> {
    for (pos, cell) in sheet.cells() {
        write!(out, "{} {} ", pos.col, pos.row)?;
        if cell.is_formula() {
            out.write_all(b"=")?;
        }
        out.write_all(cell.expr_text().as_bytes())?;
        out.write_all(b"~")?;
    }
    Ok(())
}

/// Parse a record stream into a fresh sheet.
///
/// The sheet is built from scratch and returned only if every record loads,
/// so a bad stream can never leave a caller with a half-loaded state.
pub fn load(input: &mut impl Read) -> Result<Sheet, LoadError> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;

    let mut sheet = Sheet::new();
    let mut records = text.split('~').enumerate().peekable();
    while let Some((index, record)) = records.next() {
        if record.is_empty() && records.peek().is_none() {
            // The optional final separator leaves one empty fragment.
            break;
        }

        let mut fields = record.splitn(3, ' ');
        let col = fields
            .next()
            .and_then(|f| f.parse::<i64>().ok())
            .ok_or(LoadError::BadRecord {
                index,
                reason: "missing column",
            })?;
        let row = fields
            .next()
            .and_then(|f| f.parse::<i64>().ok())
            .ok_or(LoadError::BadRecord {
                index,
                reason: "missing row",
            })?;
        let contents = fields.next().ok_or(LoadError::BadRecord {
            index,
            reason: "missing contents",
        })?;

        if col < 1 || row < 0 {
            return Err(LoadError::BadRecord {
                index,
                reason: "position out of range",
            });
        }
        if !sheet.set_cell(Pos::new(col, row), contents) {
            return Err(LoadError::BadRecord {
                index,
                reason: "rejected cell contents",
            });
        }
    }

    Ok(sheet)
}

//! JSON export of evaluated cell values.
//!
//! Array-of-arrays of display strings, trailing empty cells and rows
//! trimmed. Export only; the native record stream is the round-trip format.

use std::io::Write;

use thiserror::Error;

use lazygrid_engine::pos::Pos;
use lazygrid_engine::sheet::Sheet;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write JSON export")]
    Json(#[from] serde_json::Error),
}

pub fn export(sheet: &Sheet, out: &mut impl Write) -> Result<(), ExportError> {
    let mut rows: Vec<Vec<String>> = Vec::new();

    if let Some((max_col, max_row)) = sheet.extent() {
        let mut last_non_empty_row = 0;
        for row in 0..=max_row {
            let mut record: Vec<String> = Vec::new();
            let mut last_non_empty_col = 0;
            for col in 1..=max_col {
                let value = sheet.get_value(Pos::new(col, row)).to_string();
                if !value.is_empty() {
                    last_non_empty_col = col;
                    last_non_empty_row = row + 1;
                }
                record.push(value);
            }
            // Trim trailing empty cells
            record.truncate(last_non_empty_col as usize);
            rows.push(record);
        }
        // Trim trailing empty rows
        rows.truncate(last_non_empty_row as usize);
    }

    serde_json::to_writer_pretty(out, &rows)?;
    Ok(())
}

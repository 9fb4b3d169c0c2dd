//! XLSX loading. Normalizes the first worksheet into a plain cell table plus
//! its merged-cell ranges so the schedule importer can stay free of any
//! spreadsheet-library types.

use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};

use super::schedule_import::ImportError;

/// A merged cell range, 0-based with exclusive ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetMerge {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

/// One worksheet: trimmed cell text plus merge ranges, both addressed from
/// the sheet's used-area origin.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub cells: Vec<Vec<Option<String>>>,
    pub merges: Vec<SheetMerge>,
}

pub fn load_xlsx(path: &Path) -> Result<SheetTable, ImportError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| ImportError::Spreadsheet(e.to_string()))?;
    workbook
        .load_merged_regions()
        .map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

    let (origin_row, origin_col) = range.start().unwrap_or((0, 0));

    let cells = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    // Merge ranges are sheet-absolute and end-inclusive; rebase them onto the
    // used-area origin with exclusive ends.
    let merges = workbook
        .merged_regions()
        .iter()
        .filter(|(name, _, _)| name == &sheet_name)
        .map(|(_, _, dimensions)| SheetMerge {
            start_row: dimensions.start.0.saturating_sub(origin_row) as usize,
            end_row: (dimensions.end.0 + 1).saturating_sub(origin_row) as usize,
            start_col: dimensions.start.1.saturating_sub(origin_col) as usize,
            end_col: (dimensions.end.1 + 1).saturating_sub(origin_col) as usize,
        })
        .collect();

    Ok(SheetTable { cells, merges })
}

/// Normalize one cell to trimmed text. Time-valued cells (native Excel times
/// or day fractions) come back as `HH:MM` so the timeline parser sees the
/// same shape regardless of how the sheet was authored.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Bool(_) | Data::Error(_) => None,
        Data::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(value) => Some(value.to_string()),
        Data::Float(value) => {
            if (0.0..1.0).contains(value) {
                let minutes = (value * 24.0 * 60.0).round() as u32;
                Some(format!("{:02}:{:02}", minutes / 60, minutes % 60))
            } else {
                Some(format!("{}", value))
            }
        }
        Data::DateTime(excel_dt) => excel_dt
            .as_datetime()
            .map(|dt| dt.format("%H:%M").to_string()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cells_between_zero_and_one_render_as_times() {
        assert_eq!(cell_text(&Data::Float(0.5)), Some("12:00".to_string()));
        assert_eq!(
            cell_text(&Data::Float(10.0 / 24.0)),
            Some("10:00".to_string())
        );
        assert_eq!(cell_text(&Data::Float(144.0)), Some("144".to_string()));
    }

    #[test]
    fn string_cells_are_trimmed_and_emptied() {
        assert_eq!(
            cell_text(&Data::String("  Main Hall  ".to_string())),
            Some("Main Hall".to_string())
        );
        assert_eq!(cell_text(&Data::String("   ".to_string())), None);
        assert_eq!(cell_text(&Data::Empty), None);
    }
}

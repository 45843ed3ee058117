//! Fixed row offsets inside every backing table.

use serde::{Deserialize, Serialize};

use crate::region::{CellRegion, TableId};

/// Row count of a freshly added Sheets tab. Formatting past it is rejected.
pub const NEW_TABLE_ROWS: u32 = 1000;

/// Row 0 is left free for a title. The header sits on `header_row` and data
/// rows follow directly below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub header_row: u32,
    /// Rows below the header that receive body formatting at provisioning.
    pub body_rows: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            header_row: 1,
            body_rows: 998,
        }
    }
}

impl SheetLayout {
    pub fn header_region(&self, table_id: TableId, width: u32) -> CellRegion {
        CellRegion::row(table_id, self.header_row, 0..width)
    }

    /// Rejects layouts whose header or body rows fall outside a new table.
    pub fn check(&self) -> Result<(), String> {
        let first_body = self
            .header_row
            .checked_add(1)
            .filter(|row| *row < NEW_TABLE_ROWS)
            .ok_or_else(|| {
                format!(
                    "header_row {} leaves no data rows in a {}-row table",
                    self.header_row, NEW_TABLE_ROWS
                )
            })?;
        match first_body.checked_add(self.body_rows) {
            Some(end) if end <= NEW_TABLE_ROWS => Ok(()),
            _ => Err(format!(
                "header_row {} with body_rows {} runs past row {} of a new table",
                self.header_row, self.body_rows, NEW_TABLE_ROWS
            )),
        }
    }

    pub fn first_body_row(&self) -> u32 {
        self.header_row.saturating_add(1)
    }

    /// Body rows, clipped to the grid of a new table.
    pub fn body_region(&self, table_id: TableId, width: u32) -> CellRegion {
        let start = self.first_body_row();
        let end = start
            .saturating_add(self.body_rows)
            .min(NEW_TABLE_ROWS.max(start));
        CellRegion::new(table_id, start..end, 0..width)
    }

    /// Region styled when the store cannot say where an append landed.
    pub fn fallback_region(&self, table_id: TableId, width: u32) -> CellRegion {
        CellRegion::row(table_id, self.first_body_row(), 0..width)
    }
}

//! Cell addressing: table handles, rectangular regions, A1 notation.
//!
//! Regions are zero-based and half-open on both axes. A1 strings are only
//! produced for the wire and parsed back as a fallback when a store reports
//! the written range as text instead of structured indices.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Opaque handle of a backing table (a Sheets `sheetId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub i64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a backing table lives. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLocator {
    pub workbook_id: String,
    pub table_id: TableId,
    pub table_name: String,
}

/// A rectangular area of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRegion {
    pub table_id: TableId,
    pub row_start: u32,
    pub row_end: u32,
    pub col_start: u32,
    pub col_end: u32,
}

impl CellRegion {
    pub fn new(table_id: TableId, rows: Range<u32>, cols: Range<u32>) -> Self {
        Self {
            table_id,
            row_start: rows.start,
            row_end: rows.end,
            col_start: cols.start,
            col_end: cols.end,
        }
    }

    /// A single-row region.
    pub fn row(table_id: TableId, row: u32, cols: Range<u32>) -> Self {
        Self::new(table_id, row..row.saturating_add(1), cols)
    }

    pub fn rows(&self) -> Range<u32> {
        self.row_start..self.row_end
    }

    pub fn cols(&self) -> Range<u32> {
        self.col_start..self.col_end
    }

    pub fn height(&self) -> u32 {
        self.row_end.saturating_sub(self.row_start)
    }

    pub fn width(&self) -> u32 {
        self.col_end.saturating_sub(self.col_start)
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    pub fn is_single_row(&self) -> bool {
        self.height() == 1 && self.width() > 0
    }

    /// Same rows, narrowed to `cols`.
    pub fn with_cols(&self, cols: Range<u32>) -> Self {
        Self::new(self.table_id, self.rows(), cols)
    }

    pub fn overlaps(&self, other: &CellRegion) -> bool {
        self.table_id == other.table_id
            && !self.is_empty()
            && !other.is_empty()
            && self.row_start < other.row_end
            && other.row_start < self.row_end
            && self.col_start < other.col_end
            && other.col_start < self.col_end
    }

    /// A1 notation with a quoted table title, e.g. `'alice'!A3:D3`.
    pub fn to_a1(&self, table_name: &str) -> String {
        let first = format!("{}{}", column_letters(self.col_start), self.display_row());
        let last = format!(
            "{}{}",
            column_letters(self.col_end.saturating_sub(1).max(self.col_start)),
            self.row_end.max(self.display_row())
        );
        format!("{}!{}:{}", quote_table_name(table_name), first, last)
    }

    /// 1-based row number of the first row, as a spreadsheet user sees it.
    pub fn display_row(&self) -> u32 {
        self.row_start.saturating_add(1)
    }
}

/// Column index to letters: 0 → `A`, 25 → `Z`, 26 → `AA`.
pub fn column_letters(col: u32) -> String {
    let mut n = col as u64 + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Letters to column index, case-insensitive. `None` for empty or non-letters.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u64;
        if n > u32::MAX as u64 {
            return None;
        }
    }
    Some((n - 1) as u32)
}

/// Quote a table title for A1 notation; embedded quotes are doubled.
pub fn quote_table_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Column span starting at `row_start` with no lower bound, e.g. `'alice'!A2:D`.
///
/// Used as the search range for append-to-end primitives.
pub fn a1_open_rows(table_name: &str, row_start: u32, cols: Range<u32>) -> String {
    format!(
        "{}!{}{}:{}",
        quote_table_name(table_name),
        column_letters(cols.start),
        row_start.saturating_add(1),
        column_letters(cols.end.saturating_sub(1).max(cols.start)),
    )
}

/// Row and column bounds recovered from an A1 range string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Bounds {
    pub table_name: Option<String>,
    pub rows: Range<u32>,
    pub cols: Range<u32>,
}

/// Parse `'title'!A3:D3`, `title!A3:D3`, `A3:D3` or a single cell `A3`.
///
/// Both corners must carry a column and a row; open-ended ranges like `A2:D`
/// do not identify a written region and yield `None`.
pub fn parse_a1_range(input: &str) -> Option<A1Bounds> {
    let input = input.trim();
    let (table_name, range) = split_table_name(input)?;

    let mut parts = range.split(':');
    let first = parse_cell_ref(parts.next()?)?;
    let second = match parts.next() {
        Some(part) => parse_cell_ref(part)?,
        None => first,
    };
    if parts.next().is_some() {
        return None;
    }

    let (r0, r1) = (first.0.min(second.0), first.0.max(second.0));
    let (c0, c1) = (first.1.min(second.1), first.1.max(second.1));
    Some(A1Bounds {
        table_name,
        rows: r0..r1 + 1,
        cols: c0..c1 + 1,
    })
}

fn split_table_name(input: &str) -> Option<(Option<String>, &str)> {
    if let Some(rest) = input.strip_prefix('\'') {
        // Quoted title: '' is an escaped quote, a lone ' closes it.
        let bytes = rest.as_bytes();
        let mut name = String::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    name.push('\'');
                    i += 2;
                    continue;
                }
                let after = &rest[i + 1..];
                return after.strip_prefix('!').map(|r| (Some(name), r));
            }
            let ch = rest[i..].chars().next()?;
            name.push(ch);
            i += ch.len_utf8();
        }
        return None;
    }

    match input.rfind('!') {
        Some(idx) => Some((Some(input[..idx].to_string()), &input[idx + 1..])),
        None => Some((None, input)),
    }
}

/// `$B$12` → (row 11, col 1).
fn parse_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let cell = cell.trim().replace('$', "");
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    let col = column_index(letters)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

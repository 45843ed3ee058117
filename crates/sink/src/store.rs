//! The external tabular store seam.
//!
//! Everything the sink needs from a spreadsheet backend, as blocking calls.
//! Implementations own their timeouts; the sink never retries.

use serde::{Deserialize, Serialize};

use crate::region::{CellRegion, TableId};
use crate::style::FormatOp;

/// A table as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub id: TableId,
    pub name: String,
}

/// Result of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Created. Some backends do not echo the id back.
    Created(Option<TableId>),
    /// The name was already taken (usually by a concurrent request).
    AlreadyExists,
}

/// What the store reports after an append.
///
/// `region` is the structured form. `range_label` is the display form
/// (e.g. `'alice'!A3:B3`) that some backends return instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendAck {
    pub region: Option<CellRegion>,
    pub range_label: Option<String>,
}

impl AppendAck {
    pub fn structured(region: CellRegion) -> Self {
        Self { region: Some(region), range_label: None }
    }

    pub fn labelled(label: impl Into<String>) -> Self {
        Self { region: None, range_label: Some(label.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("table not found: {0}")]
    TableNotFound(String),
}

impl StoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Primitives of a remote workbook.
///
/// `append_rows` must be atomic per call: two concurrent appends to the same
/// table never land on the same row. `batch_format` applies all ops in one
/// round trip.
pub trait TabularStore: Send + Sync {
    /// Identifier of the workbook all tables live in.
    fn workbook_id(&self) -> &str;

    fn list_tables(&self) -> Result<Vec<TableEntry>, StoreError>;

    fn create_table(&self, name: &str) -> Result<CreateOutcome, StoreError>;

    /// Cell text inside `region`. Trailing empty rows and cells may be omitted.
    fn read_range(&self, table_name: &str, region: &CellRegion)
        -> Result<Vec<Vec<String>>, StoreError>;

    fn write_range(
        &self,
        table_name: &str,
        region: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError>;

    /// Append `rows` after the data found from `target` downward, within
    /// `target`'s columns.
    fn append_rows(
        &self,
        table_name: &str,
        target: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<AppendAck, StoreError>;

    fn batch_format(&self, ops: &[FormatOp]) -> Result<(), StoreError>;
}

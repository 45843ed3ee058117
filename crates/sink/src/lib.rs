//! `sheetsink`: per-key tabular sink for spreadsheet workbooks.
//!
//! Pure engine crate: takes a record and a schema, makes sure the destination
//! table exists with a header, appends the row and styles it. The workbook is
//! reached only through the [`TabularStore`] trait. No HTTP, no async.
//!
//! Nothing is cached between submits. Concurrent submits for the same table
//! rely on the store for name uniqueness and atomic appends.

pub mod appender;
pub mod error;
pub mod facade;
pub mod layout;
pub mod locator;
pub mod memory;
pub mod provisioner;
pub mod region;
pub mod schema;
pub mod store;
pub mod style;

pub use appender::{append, AppendOutcome, RegionSource};
pub use error::{ErrorKind, SchemaError, SinkError};
pub use facade::{AppendedRecord, TabularSink};
pub use layout::SheetLayout;
pub use locator::locate;
pub use memory::MemoryStore;
pub use provisioner::{ensure_header, provision, HeaderState};
pub use region::{CellRegion, TableId, TableLocator};
pub use schema::{ColumnClass, FieldSpec, SchemaRegistry, SubmissionSchema};
pub use store::{AppendAck, CreateOutcome, StoreError, TableEntry, TabularStore};
pub use style::{apply_style, Color, FormatOp, StyleRole, StyleTemplate};

//! Table lookup by name.

use crate::error::SinkError;
use crate::region::TableLocator;
use crate::store::TabularStore;

/// Find `table_name` in the workbook as it is right now.
///
/// Exact, case-sensitive match. Every call lists the workbook again; other
/// requests and people editing the sheet may have created or deleted tabs.
pub fn locate(store: &dyn TabularStore, table_name: &str) -> Result<Option<TableLocator>, SinkError> {
    let tables = store
        .list_tables()
        .map_err(SinkError::backend("list tables"))?;

    Ok(tables
        .into_iter()
        .find(|t| t.name == table_name)
        .map(|t| TableLocator {
            workbook_id: store.workbook_id().to_string(),
            table_id: t.id,
            table_name: t.name,
        }))
}

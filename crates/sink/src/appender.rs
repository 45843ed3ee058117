//! Row appends through the store's atomic append primitive.
//!
//! The row position is never computed client-side. The store picks it, and
//! its acknowledgment tells us where the row went: structured region first,
//! then the display range string, then the first body row as a last resort.

use serde::Serialize;

use crate::error::SinkError;
use crate::layout::SheetLayout;
use crate::region::{parse_a1_range, CellRegion, TableLocator};
use crate::store::{AppendAck, TabularStore};

/// Where an appended region came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    /// Taken from the store's acknowledgment.
    Reported,
    /// The acknowledgment was unusable; this is the first body row.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub region: CellRegion,
    pub source: RegionSource,
}

/// Append one row of `values` below the header of `locator`'s table.
///
/// Not retried: after a timeout nobody knows whether the row landed.
pub fn append(
    store: &dyn TabularStore,
    locator: &TableLocator,
    values: &[String],
    layout: &SheetLayout,
) -> Result<AppendOutcome, SinkError> {
    let width = values.len() as u32;
    let target = layout.header_region(locator.table_id, width);

    let ack = store
        .append_rows(&locator.table_name, &target, &[values.to_vec()])
        .map_err(SinkError::backend("append row"))?;

    match resolve_written_region(&ack, locator, width, layout.first_body_row()) {
        Some(region) => Ok(AppendOutcome {
            region,
            source: RegionSource::Reported,
        }),
        None => {
            let err = SinkError::AmbiguousAppendPosition {
                table: locator.table_name.clone(),
            };
            log::warn!("{} (ack: {:?}); styling first body row instead", err, ack);
            Ok(AppendOutcome {
                region: layout.fallback_region(locator.table_id, width),
                source: RegionSource::Fallback,
            })
        }
    }
}

/// The single row an acknowledgment identifies, or `None` if it is missing,
/// names another table, spans several rows or lands above `min_row`.
pub fn resolve_written_region(
    ack: &AppendAck,
    locator: &TableLocator,
    width: u32,
    min_row: u32,
) -> Option<CellRegion> {
    if let Some(region) = ack.region {
        return (region.table_id == locator.table_id
            && region.height() == 1
            && region.row_start >= min_row)
            .then(|| CellRegion::row(locator.table_id, region.row_start, region.col_start..region.col_start + width));
    }

    let bounds = parse_a1_range(ack.range_label.as_deref()?)?;
    if let Some(name) = &bounds.table_name {
        if name != &locator.table_name {
            return None;
        }
    }
    if bounds.rows.len() != 1 || bounds.rows.start < min_row {
        return None;
    }
    Some(CellRegion::row(
        locator.table_id,
        bounds.rows.start,
        bounds.cols.start..bounds.cols.start + width,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{AckMode, MemoryStore, StoreCall};
    use crate::region::TableId;
    use crate::store::StoreError;

    fn locator(id: i64, name: &str) -> TableLocator {
        TableLocator {
            workbook_id: "wb".into(),
            table_id: TableId(id),
            table_name: name.into(),
        }
    }

    #[test]
    fn test_resolve_structured() {
        let loc = locator(4, "alice");
        let ack = AppendAck::structured(CellRegion::row(TableId(4), 5, 0..2));
        assert_eq!(
            resolve_written_region(&ack, &loc, 2, 2),
            Some(CellRegion::row(TableId(4), 5, 0..2))
        );

        let other_table = AppendAck::structured(CellRegion::row(TableId(9), 5, 0..2));
        assert_eq!(resolve_written_region(&other_table, &loc, 2, 2), None);

        let header_row = AppendAck::structured(CellRegion::row(TableId(4), 1, 0..2));
        assert_eq!(resolve_written_region(&header_row, &loc, 2, 2), None);
    }

    #[test]
    fn test_resolve_label() {
        let loc = locator(4, "alice smith");
        let ack = AppendAck::labelled("'alice smith'!A3:B3");
        assert_eq!(
            resolve_written_region(&ack, &loc, 2, 2),
            Some(CellRegion::row(TableId(4), 2, 0..2))
        );
        assert_eq!(resolve_written_region(&AppendAck::labelled("bob!A3:B3"), &loc, 2, 2), None);
        assert_eq!(resolve_written_region(&AppendAck::labelled("A3:B4"), &loc, 2, 2), None);
        assert_eq!(resolve_written_region(&AppendAck::labelled("garbage"), &loc, 2, 2), None);
        assert_eq!(resolve_written_region(&AppendAck::default(), &loc, 2, 2), None);
    }

    #[test]
    fn test_append_reports_region() {
        let store = MemoryStore::new("wb");
        let id = store.insert_table("alice");
        store.set_cell("alice", 1, 0, "Age");
        let loc = locator(id.0, "alice");

        let values = vec!["34".to_string(), "great".to_string()];
        let first = append(&store, &loc, &values, &SheetLayout::default()).unwrap();
        let second = append(&store, &loc, &values, &SheetLayout::default()).unwrap();
        assert_eq!(first.source, RegionSource::Reported);
        assert_eq!(first.region.display_row(), 3);
        assert_eq!(second.region.display_row(), 4);
    }

    #[test]
    fn test_append_falls_back_on_malformed_ack() {
        let store = MemoryStore::new("wb");
        let id = store.insert_table("alice");
        store.set_cell("alice", 1, 0, "Age");
        store.set_cell("alice", 2, 0, "1");
        store.set_ack_mode(AckMode::Malformed);
        let loc = locator(id.0, "alice");

        let outcome = append(&store, &loc, &["2".to_string()], &SheetLayout::default()).unwrap();
        assert_eq!(outcome.source, RegionSource::Fallback);
        assert_eq!(outcome.region, CellRegion::row(id, 2, 0..1));
        // The data itself still landed below the existing row.
        assert_eq!(store.rows("alice").unwrap()[3], vec!["2"]);
    }

    #[test]
    fn test_append_backend_failure() {
        let store = MemoryStore::new("wb");
        let id = store.insert_table("alice");
        store.fail_next(StoreCall::AppendRows, StoreError::Timeout("30s".into()));
        let err = append(&store, &locator(id.0, "alice"), &["x".to_string()], &SheetLayout::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.timed_out());
    }
}

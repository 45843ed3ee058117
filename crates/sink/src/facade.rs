//! `TabularSink`: locate → provision → append → style, as one submit.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::appender::{append, RegionSource};
use crate::error::SinkError;
use crate::layout::SheetLayout;
use crate::locator::locate;
use crate::provisioner::{ensure_header, provision, HeaderState};
use crate::region::{CellRegion, TableLocator};
use crate::schema::{validate_table_name, SubmissionSchema};
use crate::store::TabularStore;
use crate::style::{apply_style, StyleRole, StyleTemplate};

/// A submitted row, as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppendedRecord {
    pub locator: TableLocator,
    pub region: CellRegion,
    pub values: Vec<String>,
    pub source: RegionSource,
    /// This request created the table or wrote its header.
    pub provisioned: bool,
    /// The appended-row styling batch was accepted.
    pub styled: bool,
}

impl AppendedRecord {
    /// 1-based row number.
    pub fn display_row(&self) -> u32 {
        self.region.display_row()
    }

    pub fn range_a1(&self) -> String {
        self.region.to_a1(&self.locator.table_name)
    }
}

/// Writes records into per-key tables of one workbook.
///
/// Holds no per-table state: every submit re-reads the workbook. Safe to
/// share across threads; concurrent submits coordinate only through the
/// store's name uniqueness and atomic append.
pub struct TabularSink {
    store: Arc<dyn TabularStore>,
    template: Arc<StyleTemplate>,
    layout: SheetLayout,
}

impl TabularSink {
    pub fn new(store: Arc<dyn TabularStore>, template: StyleTemplate) -> Self {
        Self {
            store,
            template: Arc::new(template),
            layout: SheetLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn template(&self) -> &StyleTemplate {
        &self.template
    }

    pub fn workbook_id(&self) -> &str {
        self.store.workbook_id()
    }

    /// Submit a named-field record. The table name comes from the schema's
    /// `table_key` field.
    pub fn submit_record(
        &self,
        schema: &SubmissionSchema,
        fields: &Map<String, Value>,
    ) -> Result<AppendedRecord, SinkError> {
        let table_name = schema.table_name_for(fields)?;
        let values = schema.align(fields)?;
        self.submit(&table_name, schema, values)
    }

    /// Append `values` (in schema field order) to `table_name`, provisioning
    /// the table first if it does not exist.
    ///
    /// A failure after provisioning leaves the table in place; nothing is
    /// rolled back.
    pub fn submit(
        &self,
        table_name: &str,
        schema: &SubmissionSchema,
        values: Vec<String>,
    ) -> Result<AppendedRecord, SinkError> {
        if values.len() != schema.fields.len() {
            return Err(SinkError::SchemaMismatch {
                schema: schema.name.clone(),
                reason: format!(
                    "expected {} values, got {}",
                    schema.fields.len(),
                    values.len()
                ),
            });
        }
        let table_name = validate_table_name(&schema.name, table_name)?;
        let store = self.store.as_ref();

        let (locator, provisioned) = match locate(store, &table_name)? {
            // A blank header is written before any append.
            Some(locator) => {
                let state = ensure_header(store, &locator, schema, &self.template, &self.layout)?;
                if state == HeaderState::Written {
                    log::info!("repaired header of table '{}'", table_name);
                }
                (locator, state == HeaderState::Written)
            }
            None => (
                provision(store, &table_name, schema, &self.template, &self.layout)?,
                true,
            ),
        };

        let outcome = append(store, &locator, &values, &self.layout)?;

        let ops = apply_style(
            &outcome.region,
            &schema.column_classes(),
            &self.template,
            StyleRole::AppendedRow,
        );
        let styled = match store.batch_format(&ops) {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "row {} of '{}' written but left unstyled: {}",
                    outcome.region.display_row(),
                    table_name,
                    e
                );
                false
            }
        };

        log::debug!(
            "appended {} to '{}' ({:?})",
            outcome.region.to_a1(&table_name),
            table_name,
            outcome.source
        );

        Ok(AppendedRecord {
            locator,
            region: outcome.region,
            values,
            source: outcome.source,
            provisioned,
            styled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{AckMode, MemoryStore, StoreCall};
    use crate::store::StoreError;
    use serde_json::json;

    fn sink(store: &Arc<MemoryStore>) -> TabularSink {
        TabularSink::new(store.clone(), StyleTemplate::default())
    }

    fn record(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_submit_record_user_export() {
        let store = Arc::new(MemoryStore::new("sheet-123"));
        let sink = sink(&store);
        let schema = SubmissionSchema::user_export();

        let rec = sink
            .submit_record(
                &schema,
                &record(json!({"username": "alice", "email": "a@x.io", "value1": "v1", "value2": 2})),
            )
            .unwrap();

        assert!(rec.provisioned);
        assert!(rec.styled);
        assert_eq!(rec.source, RegionSource::Reported);
        assert_eq!(rec.locator.workbook_id, "sheet-123");
        assert_eq!(rec.range_a1(), "'alice'!A3:D3");
        assert_eq!(
            store.rows("alice").unwrap()[1..],
            [
                vec!["Username", "Email", "Value1", "Value2"],
                vec!["alice", "a@x.io", "v1", "2"],
            ]
        );
    }

    #[test]
    fn test_submit_rejects_wrong_width() {
        let store = Arc::new(MemoryStore::new("wb"));
        let err = sink(&store)
            .submit("alice", &SubmissionSchema::user_export(), vec!["only".into()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(store.table_names().is_empty());
    }

    #[test]
    fn test_schema_mismatch_writes_nothing() {
        let store = Arc::new(MemoryStore::new("wb"));
        let err = sink(&store)
            .submit_record(&SubmissionSchema::user_export(), &record(json!({"username": "alice"})))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(store.call_count(StoreCall::ListTables), 0);
    }

    #[test]
    fn test_unstyled_row_still_succeeds() {
        let store = Arc::new(MemoryStore::new("wb"));
        let sink = sink(&store);
        let schema = SubmissionSchema::user_export();
        let values: Vec<String> = ["bob", "b@x.io", "1", "2"].iter().map(|s| s.to_string()).collect();
        sink.submit("bob", &schema, values.clone()).unwrap();

        store.fail_next(StoreCall::BatchFormat, StoreError::Http { status: 429, message: "quota".into() });
        let rec = sink.submit("bob", &schema, values).unwrap();
        assert!(!rec.styled);
        assert!(!rec.provisioned);
        assert_eq!(rec.display_row(), 4);
    }

    #[test]
    fn test_header_repaired_on_existing_table() {
        let store = Arc::new(MemoryStore::new("wb"));
        store.insert_table("carol");
        let sink = sink(&store);
        let schema = SubmissionSchema::user_export();
        let values: Vec<String> = ["carol", "c@x.io", "", ""].iter().map(|s| s.to_string()).collect();

        let rec = sink.submit("carol", &schema, values).unwrap();
        assert!(rec.provisioned);
        assert_eq!(store.rows("carol").unwrap()[1][0], "Username");
        assert_eq!(rec.display_row(), 3);
    }

    #[test]
    fn test_unheadered_table_never_takes_data_on_header_row() {
        let store = Arc::new(MemoryStore::new("wb"));
        store.insert_table("alice");
        let sink = sink(&store);
        let schema = SubmissionSchema::user_export();
        let values: Vec<String> = ["alice", "a@x", "1", "2"].iter().map(|s| s.to_string()).collect();

        let rec = sink.submit("alice", &schema, values.clone()).unwrap();
        assert_eq!(rec.source, RegionSource::Reported);
        assert_eq!(rec.display_row(), 3);
        let rows = store.rows("alice").unwrap();
        assert_eq!(rows[1], vec!["Username", "Email", "Value1", "Value2"]);
        assert_eq!(rows[2], values);
        assert_eq!(store.call_count(StoreCall::ReadRange), 1);
    }

    #[test]
    fn test_missing_ack_falls_back() {
        let store = Arc::new(MemoryStore::new("wb"));
        store.set_ack_mode(AckMode::Missing);
        let rec = sink(&store)
            .submit_record(
                &SubmissionSchema::user_export(),
                &record(json!({"username": "erin", "email": "e", "value1": "", "value2": ""})),
            )
            .unwrap();
        assert_eq!(rec.source, RegionSource::Fallback);
        assert_eq!(rec.display_row(), 3);
    }
}

//! Table provisioning: create, re-locate, header, initial styling.
//!
//! Every step tolerates a concurrent provisioner racing on the same name.
//! The header is only written when the header row is blank or holds a
//! prefix of the expected labels; different labels are never overwritten.

use crate::error::SinkError;
use crate::layout::SheetLayout;
use crate::locator::locate;
use crate::region::TableLocator;
use crate::schema::SubmissionSchema;
use crate::store::{CreateOutcome, StoreError, TabularStore};
use crate::style::{apply_style, StyleRole, StyleTemplate};

/// What `ensure_header` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    /// The expected labels were already there.
    Present,
    /// The header was blank or incomplete and has been written.
    Written,
}

/// Create `table_name` (or adopt the one a concurrent request created) and
/// make sure it carries the schema's header.
pub fn provision(
    store: &dyn TabularStore,
    table_name: &str,
    schema: &SubmissionSchema,
    template: &StyleTemplate,
    layout: &SheetLayout,
) -> Result<TableLocator, SinkError> {
    match store
        .create_table(table_name)
        .map_err(SinkError::backend("create table"))?
    {
        CreateOutcome::Created(_) => log::info!("created table '{}'", table_name),
        CreateOutcome::AlreadyExists => {
            log::info!("table '{}' already exists, adopting it", table_name)
        }
    }

    // Create responses do not reliably carry the id; look it up.
    let locator = locate(store, table_name)?.ok_or_else(|| SinkError::BackendUnavailable {
        operation: "locate created table",
        source: StoreError::TableNotFound(table_name.to_string()),
    })?;

    ensure_header(store, &locator, schema, template, layout)?;
    Ok(locator)
}

/// Check the header row and write it if it is blank or incomplete.
///
/// After a write, header and body styling go out as one batch. A failed
/// styling batch is logged and does not fail provisioning.
pub fn ensure_header(
    store: &dyn TabularStore,
    locator: &TableLocator,
    schema: &SubmissionSchema,
    template: &StyleTemplate,
    layout: &SheetLayout,
) -> Result<HeaderState, SinkError> {
    let labels = schema.labels();
    let header = layout.header_region(locator.table_id, schema.width());

    let existing = store
        .read_range(&locator.table_name, &header)
        .map_err(SinkError::backend("read header"))?;

    match check_header(existing.first().map(Vec::as_slice).unwrap_or(&[]), &labels) {
        HeaderCheck::Matches => return Ok(HeaderState::Present),
        HeaderCheck::Conflict(reason) => {
            return Err(SinkError::PartialProvision {
                table: locator.table_name.clone(),
                reason,
                source: None,
            });
        }
        HeaderCheck::Blank => {}
        HeaderCheck::Incomplete => {
            log::warn!("table '{}' has an incomplete header, completing it", locator.table_name);
        }
    }

    store
        .write_range(&locator.table_name, &header, &[labels])
        .map_err(|source| SinkError::PartialProvision {
            table: locator.table_name.clone(),
            reason: "header write failed".to_string(),
            source: Some(source),
        })?;
    log::info!("wrote header for table '{}'", locator.table_name);

    let classes = schema.column_classes();
    let body = layout.body_region(locator.table_id, schema.width());
    let mut ops = apply_style(&header, &classes, template, StyleRole::Header);
    ops.extend(apply_style(&body, &classes, template, StyleRole::BodyDefault));
    if let Err(e) = store.batch_format(&ops) {
        log::warn!("styling table '{}' failed, continuing unstyled: {}", locator.table_name, e);
    }

    Ok(HeaderState::Written)
}

#[derive(Debug, PartialEq, Eq)]
enum HeaderCheck {
    Blank,
    Matches,
    /// Some cells empty, every filled cell holds its expected label.
    Incomplete,
    Conflict(String),
}

fn check_header(cells: &[String], labels: &[String]) -> HeaderCheck {
    let mut filled = 0;
    for (i, label) in labels.iter().enumerate() {
        let cell = cells.get(i).map(|c| c.trim()).unwrap_or("");
        if cell.is_empty() {
            continue;
        }
        if cell != label {
            return HeaderCheck::Conflict(format!(
                "header column {} is '{}', expected '{}'",
                i + 1,
                cell,
                label
            ));
        }
        filled += 1;
    }
    match filled {
        0 => HeaderCheck::Blank,
        n if n == labels.len() => HeaderCheck::Matches,
        _ => HeaderCheck::Incomplete,
    }
}

//! In-process `TabularStore`.
//!
//! Behaves like a Sheets workbook where it matters to the sink: names are
//! unique, appends land after the last non-empty row of the target columns,
//! and every call is atomic under one lock. Used by the `memory` backend and
//! throughout the tests, with failure injection and acknowledgment modes.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::region::{CellRegion, TableId};
use crate::store::{AppendAck, CreateOutcome, StoreError, TableEntry, TabularStore};
use crate::style::FormatOp;

/// Store primitive, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    ListTables,
    CreateTable,
    ReadRange,
    WriteRange,
    AppendRows,
    BatchFormat,
}

/// How `append_rows` acknowledges a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Structured region.
    #[default]
    Structured,
    /// A1 display string only, like the Sheets API.
    RangeLabel,
    /// Nothing at all.
    Missing,
    /// A range string that does not parse.
    Malformed,
}

#[derive(Debug)]
struct Table {
    id: TableId,
    name: String,
    cells: Vec<Vec<String>>,
}

impl Table {
    fn set(&mut self, row: u32, col: u32, value: &str) {
        let (row, col) = (row as usize, col as usize);
        if self.cells.len() <= row {
            self.cells.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.cells[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();
    }

    fn get(&self, row: u32, col: u32) -> &str {
        self.cells
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Last row at or below `from` with any text in `cols`.
    fn last_filled_row(&self, from: u32, cols: &std::ops::Range<u32>) -> Option<u32> {
        (from..self.cells.len() as u32)
            .rev()
            .find(|&row| cols.clone().any(|col| !self.get(row, col).is_empty()))
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Vec<Table>,
    next_id: i64,
    failures: HashMap<StoreCall, VecDeque<StoreError>>,
    calls: HashMap<StoreCall, usize>,
    format_log: bool,
    format_ops: Vec<FormatOp>,
    ack_mode: AckMode,
    hide_created_ids: bool,
}

impl State {
    fn enter(&mut self, call: StoreCall) -> Result<(), StoreError> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> Result<&Table, StoreError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, StoreError> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    fn add_table(&mut self, name: &str) -> TableId {
        // Sheets ids are arbitrary; keep them clearly distinct from row numbers.
        self.next_id += 1;
        let id = TableId(1000 + self.next_id);
        self.tables.push(Table {
            id,
            name: name.to_string(),
            cells: Vec::new(),
        });
        id
    }
}

pub struct MemoryStore {
    workbook_id: String,
    latency: Option<Duration>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(workbook_id: &str) -> Self {
        Self {
            workbook_id: workbook_id.to_string(),
            latency: None,
            state: Mutex::new(State {
                format_log: true,
                ..State::default()
            }),
        }
    }

    /// Keep a copy of every applied format op. On by default.
    pub fn with_format_log(mut self, keep: bool) -> Self {
        self.state.get_mut().format_log = keep;
        self
    }

    /// Sleep before every call, outside the lock, so concurrent callers interleave.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `call` with `err`. Queued per call kind.
    pub fn fail_next(&self, call: StoreCall, err: StoreError) {
        self.state.lock().failures.entry(call).or_default().push_back(err);
    }

    pub fn set_ack_mode(&self, mode: AckMode) {
        self.state.lock().ack_mode = mode;
    }

    /// Make `create_table` return `Created(None)`.
    pub fn hide_created_ids(&self, hide: bool) {
        self.state.lock().hide_created_ids = hide;
    }

    /// Add a table directly, as if someone created it by hand.
    pub fn insert_table(&self, name: &str) -> TableId {
        let mut state = self.state.lock();
        if let Ok(table) = state.table(name) {
            return table.id;
        }
        state.add_table(name)
    }

    pub fn delete_table(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.tables.len();
        state.tables.retain(|t| t.name != name);
        state.tables.len() != before
    }

    /// Edit a cell directly. No-op for an unknown table.
    pub fn set_cell(&self, table: &str, row: u32, col: u32, value: &str) {
        if let Ok(table) = self.state.lock().table_mut(table) {
            table.set(row, col, value);
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.state.lock().table(name).ok().map(|t| t.id)
    }

    /// Table contents with trailing empty cells and rows dropped.
    pub fn rows(&self, name: &str) -> Option<Vec<Vec<String>>> {
        let state = self.state.lock();
        let table = state.table(name).ok()?;
        let mut rows: Vec<Vec<String>> = table.cells.iter().map(|r| trim_row(r)).collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Some(rows)
    }

    /// Every format op applied so far, in order. Empty when the log is off.
    pub fn format_ops(&self) -> Vec<FormatOp> {
        self.state.lock().format_ops.clone()
    }

    pub fn call_count(&self, call: StoreCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

fn trim_row(row: &[String]) -> Vec<String> {
    let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    row[..len].to_vec()
}

fn op_table(op: &FormatOp) -> TableId {
    match op {
        FormatOp::ColumnWidth { table_id, .. } => *table_id,
        FormatOp::CellStyle { region, .. } | FormatOp::Borders { region, .. } => region.table_id,
    }
}

impl TabularStore for MemoryStore {
    fn workbook_id(&self) -> &str {
        &self.workbook_id
    }

    fn list_tables(&self) -> Result<Vec<TableEntry>, StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::ListTables)?;
        Ok(state
            .tables
            .iter()
            .map(|t| TableEntry { id: t.id, name: t.name.clone() })
            .collect())
    }

    fn create_table(&self, name: &str) -> Result<CreateOutcome, StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::CreateTable)?;
        if state.table(name).is_ok() {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let id = state.add_table(name);
        Ok(CreateOutcome::Created((!state.hide_created_ids).then_some(id)))
    }

    fn read_range(
        &self,
        table_name: &str,
        region: &CellRegion,
    ) -> Result<Vec<Vec<String>>, StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::ReadRange)?;
        let table = state.table(table_name)?;
        let mut rows: Vec<Vec<String>> = region
            .rows()
            .map(|row| {
                let cells: Vec<String> = region.cols().map(|col| table.get(row, col).to_string()).collect();
                trim_row(&cells)
            })
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Ok(rows)
    }

    fn write_range(
        &self,
        table_name: &str,
        region: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::WriteRange)?;
        let table = state.table_mut(table_name)?;
        for (r, values) in rows.iter().enumerate() {
            for (c, value) in values.iter().enumerate() {
                table.set(region.row_start + r as u32, region.col_start + c as u32, value);
            }
        }
        Ok(())
    }

    fn append_rows(
        &self,
        table_name: &str,
        target: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<AppendAck, StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::AppendRows)?;
        let ack_mode = state.ack_mode;
        let table = state.table_mut(table_name)?;

        let start = table
            .last_filled_row(target.row_start, &target.cols())
            .map_or(target.row_start, |row| row + 1);
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        for (r, values) in rows.iter().enumerate() {
            for (c, value) in values.iter().enumerate() {
                table.set(start + r as u32, target.col_start + c as u32, value);
            }
        }

        let written = CellRegion::new(
            table.id,
            start..start + rows.len() as u32,
            target.col_start..target.col_start + width,
        );
        Ok(match ack_mode {
            AckMode::Structured => AppendAck::structured(written),
            AckMode::RangeLabel => AppendAck::labelled(written.to_a1(&table.name)),
            AckMode::Missing => AppendAck::default(),
            AckMode::Malformed => AppendAck::labelled(format!("{}!#REF", table.name)),
        })
    }

    fn batch_format(&self, ops: &[FormatOp]) -> Result<(), StoreError> {
        self.pause();
        let mut state = self.state.lock();
        state.enter(StoreCall::BatchFormat)?;
        // Sheets rejects the whole batch if any request names a missing sheet.
        if let Some(missing) = ops
            .iter()
            .map(op_table)
            .find(|id| !state.tables.iter().any(|t| t.id == *id))
        {
            return Err(StoreError::Http {
                status: 400,
                message: format!("No grid with id: {}", missing),
            });
        }
        if state.format_log {
            state.format_ops.extend_from_slice(ops);
        }
        Ok(())
    }
}

//! Google Sheets v4 HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). One spreadsheet per
//! client; every call carries a fresh-enough bearer token and the configured
//! timeout. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use sheetsink::region::{a1_open_rows, CellRegion, TableId};
use sheetsink::store::{AppendAck, CreateOutcome, StoreError, TableEntry, TabularStore};
use sheetsink::FormatOp;

use crate::auth::TokenSource;
use crate::requests::format_requests;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for Sheets operations.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// Key file missing, unreadable or malformed
    #[error("credentials: {0}")]
    Credentials(String),
    /// Token exchange failed
    #[error("auth: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout: {0}")]
    Timeout(String),
    /// Non-2xx response; `message` is the API's error message when it sent one
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid API base URL: {0}")]
    BaseUrl(String),
}

impl SheetsError {
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SheetsError::Timeout(e.to_string())
        } else {
            SheetsError::Network(e.to_string())
        }
    }

    fn is_already_exists(&self) -> bool {
        matches!(self, SheetsError::Http { status: 400, message } if message.contains("already exists"))
    }
}

impl From<SheetsError> for StoreError {
    fn from(e: SheetsError) -> Self {
        match e {
            SheetsError::Timeout(msg) => StoreError::Timeout(msg),
            SheetsError::Network(msg) => StoreError::Network(msg),
            SheetsError::Http { status: 401 | 403, message } => StoreError::Auth(message),
            SheetsError::Http { status, message } => StoreError::Http { status, message },
            SheetsError::Parse(msg) => StoreError::Parse(msg),
            SheetsError::Credentials(msg) | SheetsError::Auth(msg) => StoreError::Auth(msg),
            SheetsError::BaseUrl(msg) => StoreError::Network(msg),
        }
    }
}

/// A sheet (tab) of the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
}

/// Sheets API client (blocking), bound to one spreadsheet.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: Url,
    spreadsheet_id: String,
    auth: Arc<dyn TokenSource>,
}

impl SheetsClient {
    pub fn new(
        spreadsheet_id: &str,
        auth: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, SheetsError> {
        Self::with_base_url(spreadsheet_id, auth, timeout, DEFAULT_API_BASE)
    }

    /// Client against a different API host (tests, proxies).
    pub fn with_base_url(
        spreadsheet_id: &str,
        auth: Arc<dyn TokenSource>,
        timeout: Duration,
        api_base: &str,
    ) -> Result<Self, SheetsError> {
        let api_base = Url::parse(api_base).map_err(|e| SheetsError::BaseUrl(e.to_string()))?;
        if api_base.cannot_be_a_base() {
            return Err(SheetsError::BaseUrl(api_base.to_string()));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sheetsink/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SheetsError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// All sheets, in tab order.
    pub fn list_sheets(&self) -> Result<Vec<SheetInfo>, SheetsError> {
        let mut url = self.url(&[self.spreadsheet_id.as_str()]);
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: SpreadsheetMeta = parse(self.send(self.http.get(url))?)?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| SheetInfo {
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
            })
            .collect())
    }

    /// Add a sheet titled `title`. A duplicate title is reported as
    /// `AlreadyExists`, not as an error.
    pub fn add_sheet(&self, title: &str) -> Result<CreateOutcome, SheetsError> {
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        match self.batch_update_raw(&body) {
            Ok(reply) => {
                let id = reply["replies"][0]["addSheet"]["properties"]["sheetId"]
                    .as_i64()
                    .map(TableId);
                Ok(CreateOutcome::Created(id))
            }
            Err(e) if e.is_already_exists() => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }

    /// Cell values of `range` as display strings.
    pub fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", range]);
        let values: ValueRange = parse(self.send(self.http.get(url))?)?;
        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    pub fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", range]);
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": rows });
        self.send(self.http.put(url).json(&body))?;
        Ok(())
    }

    /// `values.append` with inserted rows. Returns the API's `updatedRange`.
    pub fn append_values(&self, range: &str, rows: &[Vec<String>]) -> Result<Option<String>, SheetsError> {
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", format!("{}:append", range).as_str()]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = json!({ "majorDimension": "ROWS", "values": rows });
        let response: AppendResponse = parse(self.send(self.http.post(url).json(&body))?)?;
        Ok(response.updates.and_then(|u| u.updated_range))
    }

    /// Send `requests` as one `batchUpdate`.
    pub fn batch_update(&self, requests: Vec<Value>) -> Result<Value, SheetsError> {
        self.batch_update_raw(&json!({ "requests": requests }))
    }

    // ========================================================================
    // HTTP helpers
    // ========================================================================

    fn batch_update_raw(&self, body: &Value) -> Result<Value, SheetsError> {
        let url = self.url(&[format!("{}:batchUpdate", self.spreadsheet_id).as_str()]);
        parse(self.send(self.http.post(url).json(body))?)
    }

    /// `{api_base}/v4/spreadsheets/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        // cannot_be_a_base was rejected in the constructor
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v4").push("spreadsheets").extend(segments);
        }
        url
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, SheetsError> {
        let token = self.auth.access_token(&self.http)?;
        let request = request.bearer_auth(token);
        let response = request.send().map_err(SheetsError::from_transport)?;

        let status = response.status().as_u16();
        log::debug!("{} {}", status, response.url().path());
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SheetsError::Http {
                status,
                message: api_error_message(&body),
            });
        }

        Ok(response)
    }
}

fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, SheetsError> {
    response.json().map_err(|e| {
        if e.is_timeout() {
            SheetsError::Timeout(e.to_string())
        } else {
            SheetsError::Parse(e.to_string())
        }
    })
}

/// `error.message` from a Google API error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl TabularStore for SheetsClient {
    fn workbook_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn list_tables(&self) -> Result<Vec<TableEntry>, StoreError> {
        Ok(self
            .list_sheets()?
            .into_iter()
            .map(|s| TableEntry {
                id: TableId(s.sheet_id),
                name: s.title,
            })
            .collect())
    }

    fn create_table(&self, name: &str) -> Result<CreateOutcome, StoreError> {
        Ok(self.add_sheet(name)?)
    }

    fn read_range(&self, table_name: &str, region: &CellRegion) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.get_values(&region.to_a1(table_name))?)
    }

    fn write_range(
        &self,
        table_name: &str,
        region: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<(), StoreError> {
        Ok(self.update_values(&region.to_a1(table_name), rows)?)
    }

    fn append_rows(
        &self,
        table_name: &str,
        target: &CellRegion,
        rows: &[Vec<String>],
    ) -> Result<AppendAck, StoreError> {
        let range = a1_open_rows(table_name, target.row_start, target.cols());
        let updated = self.append_values(&range, rows)?;
        Ok(AppendAck {
            region: None,
            range_label: updated,
        })
    }

    fn batch_format(&self, ops: &[FormatOp]) -> Result<(), StoreError> {
        let requests = format_requests(ops);
        if requests.is_empty() {
            return Ok(());
        }
        self.batch_update(requests)?;
        Ok(())
    }
}

//! Google Sheets binding for `sheetsink`.
//!
//! Implements [`sheetsink::TabularStore`] on top of the Sheets v4 REST API:
//! list sheets, add sheet, read/write/append values, batch formatting.
//! Authenticates as a service account (JWT bearer) or with a static token.
//!
//! Blocking. No retries. No caching of sheet metadata.

mod auth;
mod client;
mod requests;

pub use auth::{ServiceAccount, ServiceAccountKey, StaticToken, TokenSource, SPREADSHEETS_SCOPE};
pub use client::{SheetInfo, SheetsClient, SheetsError, DEFAULT_API_BASE, DEFAULT_TIMEOUT};
pub use requests::format_requests;

//! sheetsink intake protocol, v1 frozen wire format
//!
//! JSON bodies exchanged with the HTTP intake. The success and failure
//! messages are the ones existing survey front-ends already match on.
//!
//! # Protocol Version
//!
//! This is **protocol v1**. The wire format is frozen. Changes require:
//! 1. Version bump in PROTOCOL_VERSION
//! 2. New golden vectors in `crates/protocol/tests/golden/`
//!
//! # Shapes
//!
//! | Endpoint                  | Request                | Response                          |
//! |---------------------------|------------------------|-----------------------------------|
//! | `POST /export-user-data`  | flat object of scalars | `SubmitResponse` / `ErrorResponse` |
//! | `POST /submit/{schema}`   | flat object of scalars | `SubmitResponse` / `ErrorResponse` |
//! | `GET /health`             | (none)                 | `HealthResponse`                  |

use serde::{Deserialize, Serialize};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

pub const EXPORT_SUCCESS_MESSAGE: &str = "Data exported successfully.";
pub const EXPORT_FAILURE_MESSAGE: &str = "Failed to export data.";
pub const HEALTH_AVAILABLE: &str = "available";

/// A submission body: named scalar fields, one of which names the table.
pub type RecordFields = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Success
// =============================================================================

/// How the reported row was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// The spreadsheet said where the row went.
    Reported,
    /// The spreadsheet's answer was unusable; `row` is the first data row.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    /// Destination tab
    pub table: String,
    /// A1 range of the written row, e.g. `'alice'!A3:D3`
    pub range: String,
    /// 1-based row number
    pub row: u32,
    pub position: Position,
}

impl SubmitResponse {
    pub fn exported(table: impl Into<String>, range: impl Into<String>, row: u32, position: Position) -> Self {
        Self {
            message: EXPORT_SUCCESS_MESSAGE.to_string(),
            table: table.into(),
            range: range.into(),
            row,
            position,
        }
    }
}

// =============================================================================
// Failure
// =============================================================================

/// Classified failure. Raw backend errors never appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BackendUnavailable,
    SchemaMismatch,
    AmbiguousAppendPosition,
    PartialProvision,
    UnknownSchema,
    InvalidBody,
    Internal,
}

impl ErrorCode {
    /// HTTP status the intake answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::SchemaMismatch | ErrorCode::InvalidBody => 400,
            ErrorCode::UnknownSchema => 404,
            ErrorCode::BackendUnavailable
            | ErrorCode::AmbiguousAppendPosition
            | ErrorCode::PartialProvision
            | ErrorCode::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorCode,
}

impl ErrorResponse {
    pub fn new(kind: ErrorCode) -> Self {
        Self {
            error: EXPORT_FAILURE_MESSAGE.to_string(),
            kind,
        }
    }
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn available(version: impl Into<String>) -> Self {
        Self {
            status: HEALTH_AVAILABLE.to_string(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCode::SchemaMismatch.http_status(), 400);
        assert_eq!(ErrorCode::InvalidBody.http_status(), 400);
        assert_eq!(ErrorCode::UnknownSchema.http_status(), 404);
        assert_eq!(ErrorCode::BackendUnavailable.http_status(), 500);
        assert_eq!(ErrorCode::PartialProvision.http_status(), 500);
    }

    #[test]
    fn test_error_body_is_generic() {
        let body = serde_json::to_value(ErrorResponse::new(ErrorCode::BackendUnavailable)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "Failed to export data.", "kind": "backend_unavailable" })
        );
    }
}

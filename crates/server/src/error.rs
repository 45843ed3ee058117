use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sheetsink::{ErrorKind, SinkError};
use sheetsink_config::ConfigError;
use sheetsink_protocol::{ErrorCode, ErrorResponse};
use sheetsink_sheets_client::SheetsError;

/// Failure of a single intake request.
///
/// Rendered as the generic export failure body; the detail only goes to
/// the log.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Sink(err) => error_code(err.kind()),
            AppError::UnknownSchema(_) => ErrorCode::UnknownSchema,
            AppError::InvalidBody(_) => ErrorCode::InvalidBody,
            AppError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Wire code for an engine failure class.
pub fn error_code(kind: ErrorKind) -> ErrorCode {
    match kind {
        ErrorKind::BackendUnavailable => ErrorCode::BackendUnavailable,
        ErrorKind::SchemaMismatch => ErrorCode::SchemaMismatch,
        ErrorKind::AmbiguousAppendPosition => ErrorCode::AmbiguousAppendPosition,
        ErrorKind::PartialProvision => ErrorCode::PartialProvision,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            AppError::Sink(err) if err.timed_out() => {
                tracing::error!(kind = ?code, "export failed, outcome unknown (timed out): {}", err)
            }
            _ if status.is_client_error() => tracing::warn!(kind = ?code, "rejected submission: {}", self),
            _ => tracing::error!(kind = ?code, "export failed: {}", self),
        }

        (status, Json(ErrorResponse::new(code))).into_response()
    }
}

/// Startup failures of the binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("missing setting {0}")]
    MissingSetting(&'static str),

    #[error("cannot set up Sheets client: {0}")]
    Sheets(#[from] SheetsError),

    #[error("invalid CORS origin '{0}'")]
    CorsOrigin(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

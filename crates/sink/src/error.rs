//! Classified failures at the sink boundary.

use std::fmt;

use serde::Serialize;

use crate::store::StoreError;

/// The four failure classes callers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    SchemaMismatch,
    AmbiguousAppendPosition,
    PartialProvision,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backend_unavailable",
            Self::SchemaMismatch => "schema_mismatch",
            Self::AmbiguousAppendPosition => "ambiguous_append_position",
            Self::PartialProvision => "partial_provision",
        }
    }

    /// True when the caller sent something wrong (as opposed to a server-side failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::SchemaMismatch)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// An outbound call to the store did not complete.
    #[error("backend unavailable during {operation}: {source}")]
    BackendUnavailable {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The inbound record does not line up with the schema.
    #[error("record does not match schema '{schema}': {reason}")]
    SchemaMismatch { schema: String, reason: String },

    /// The append acknowledgment did not identify the written row.
    /// Recovered inside the appender; only surfaces in logs.
    #[error("append to '{table}' was acknowledged without a usable position")]
    AmbiguousAppendPosition { table: String },

    /// The table exists but its header is missing, conflicting, or failed to write.
    #[error("table '{table}' is partially provisioned: {reason}")]
    PartialProvision {
        table: String,
        reason: String,
        #[source]
        source: Option<StoreError>,
    },
}

impl SinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::AmbiguousAppendPosition { .. } => ErrorKind::AmbiguousAppendPosition,
            Self::PartialProvision { .. } => ErrorKind::PartialProvision,
        }
    }

    /// The store call timed out, so whether it landed is unknown.
    pub fn timed_out(&self) -> bool {
        match self {
            Self::BackendUnavailable { source, .. } => source.is_timeout(),
            Self::PartialProvision { source: Some(source), .. } => source.is_timeout(),
            _ => false,
        }
    }

    pub(crate) fn mismatch(schema: &str, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            schema: schema.to_string(),
            reason: reason.into(),
        }
    }

    /// Adapter for `map_err` on store calls.
    pub(crate) fn backend(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::BackendUnavailable { operation, source }
    }
}

/// Problems with a schema definition itself (configuration-time).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema name must not be empty")]
    EmptyName,
    #[error("schema '{0}' has no fields")]
    NoFields(String),
    #[error("schema '{schema}' repeats field key '{key}'")]
    DuplicateField { schema: String, key: String },
    #[error("schema '{schema}' has a field with an empty key")]
    EmptyFieldKey { schema: String },
    #[error("schema '{0}' has an empty table_key")]
    EmptyTableKey(String),
    #[error("schema '{0}' is registered twice")]
    DuplicateSchema(String),
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_snake_case() {
        assert_eq!(ErrorKind::BackendUnavailable.as_str(), "backend_unavailable");
        assert_eq!(
            serde_json::to_value(ErrorKind::PartialProvision).unwrap(),
            serde_json::json!("partial_provision")
        );
    }

    #[test]
    fn test_timed_out_follows_source() {
        let err = SinkError::BackendUnavailable {
            operation: "append row",
            source: StoreError::Timeout("30s elapsed".into()),
        };
        assert!(err.timed_out());
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);

        let err = SinkError::mismatch("user-export", "missing field 'email'");
        assert!(!err.timed_out());
        assert!(err.kind().is_client_error());
    }
}

use std::path::PathBuf;

use sheetsink::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: '{value}' ({reason})")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

// Service settings
// Loaded from --config, $SHEETSINK_CONFIG or ~/.config/sheetsink/sheetsink.toml,
// then overridden by environment variables.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetsink::{SchemaRegistry, SheetLayout, StyleTemplate, SubmissionSchema};

use crate::error::ConfigError;
use crate::style::StyleSettings;

pub const CONFIG_ENV: &str = "SHEETSINK_CONFIG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

/// Where rows are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Google Sheets
    #[default]
    Google,
    /// In-process workbook, lost on exit (local runs)
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Google => write!(f, "google"),
            Backend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "sheets" => Ok(Backend::Google),
            "memory" => Ok(Backend::Memory),
            other => Err(format!("unknown backend '{}', expected google or memory", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub backend: Backend,
    pub spreadsheet_id: Option<String>,
    /// Service-account JSON key
    pub credentials_file: Option<PathBuf>,
    /// Pre-minted bearer token; used instead of the key file when set
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub api_base: String,
    pub request_timeout_secs: u64,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Google,
            spreadsheet_id: None,
            credentials_file: None,
            access_token: None,
            api_base: "https://sheets.googleapis.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SheetsSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    /// Zero-based header row; row 0 stays free for a title
    pub header_row: u32,
    /// Rows below the header pre-formatted at provisioning
    pub body_rows: u32,
    /// Schema used by POST /export-user-data
    pub default_schema: String,
}

impl Default for SinkSettings {
    fn default() -> Self {
        let layout = SheetLayout::default();
        Self {
            header_row: layout.header_row,
            body_rows: layout.body_rows,
            default_schema: "user-export".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub sheets: SheetsSettings,
    pub sink: SinkSettings,
    pub schemas: Vec<SubmissionSchema>,
    pub style: StyleSettings,
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sheetsink").join("sheetsink.toml"))
    }

    /// Resolve the file, parse it, then apply environment overrides.
    ///
    /// `explicit` (the `--config` flag) and `$SHEETSINK_CONFIG` must exist.
    /// A missing file at the default location means built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    log::debug!("no settings file, using defaults");
                    Self::default()
                }
            },
        };
        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Environment variables win over the file. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(id) = get("SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(path) = get("SERVICE_ACCOUNT_KEY_FILE") {
            self.sheets.credentials_file = Some(PathBuf::from(path));
        }
        if let Some(token) = get("SHEETSINK_ACCESS_TOKEN") {
            self.sheets.access_token = Some(token);
        }
        if let Some(port) = get("PORT") {
            self.server.port = port.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
                var: "PORT",
                value: port.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(bind) = get("SHEETSINK_BIND") {
            self.server.bind = bind;
        }
        if let Some(backend) = get("SHEETSINK_BACKEND") {
            self.sheets.backend = backend.parse().map_err(|reason| ConfigError::Env {
                var: "SHEETSINK_BACKEND",
                value: backend.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        if self.sheets.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("sheets.request_timeout_secs must not be 0".into()));
        }
        if self.sheets.backend == Backend::Google {
            if self.sheets.spreadsheet_id.as_deref().map_or(true, |s| s.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "google backend needs sheets.spreadsheet_id (or SPREADSHEET_ID)".into(),
                ));
            }
            if self.sheets.credentials_file.is_none() && self.sheets.access_token.is_none() {
                return Err(ConfigError::Invalid(
                    "google backend needs sheets.credentials_file (or SERVICE_ACCOUNT_KEY_FILE)".into(),
                ));
            }
        }
        self.layout()
            .check()
            .map_err(|msg| ConfigError::Invalid(format!("sink: {}", msg)))?;
        self.registry()?;
        Ok(())
    }

    /// Configured schemas plus the built-in `user-export` (unless redefined).
    pub fn registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let mut schemas = self.schemas.clone();
        let builtin = SubmissionSchema::user_export();
        if !schemas.iter().any(|s| s.name == builtin.name) {
            schemas.push(builtin);
        }

        let default_name = &self.sink.default_schema;
        let index = schemas
            .iter()
            .position(|s| &s.name == default_name)
            .ok_or_else(|| sheetsink::SchemaError::UnknownSchema(default_name.clone()))?;
        let mut registry = SchemaRegistry::new(schemas.remove(index))?;
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    pub fn style_template(&self) -> StyleTemplate {
        self.style.apply(StyleTemplate::default())
    }

    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            header_row: self.sink.header_row,
            body_rows: self.sink.body_rows,
        }
    }
}

/// Load `.env` from the working directory, if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("ignoring .env: {}", e),
    }
}

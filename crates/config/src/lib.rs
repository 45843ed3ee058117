//! Settings for the sheetsink service.
//!
//! One TOML file plus environment overrides (`.env` honored). Produces the
//! schema registry, style template and sheet layout the sink runs with.

pub mod error;
pub mod settings;
pub mod style;

pub use error::ConfigError;
pub use settings::{
    load_dotenv, Backend, ServerSettings, Settings, SheetsSettings, SinkSettings, CONFIG_ENV,
};
pub use style::StyleSettings;

//! HTTP intake for sheetsink.
//!
//! Accepts flat JSON survey submissions and hands them to a [`TabularSink`]
//! on the blocking pool. The wire shapes live in `sheetsink-protocol`.
//!
//! [`TabularSink`]: sheetsink::TabularSink

pub mod app;
pub mod backend;
pub mod error;

pub use app::{cors_layer, router, serve, shutdown_signal, AppState};
pub use backend::build_store;
pub use error::{AppError, ServerError};

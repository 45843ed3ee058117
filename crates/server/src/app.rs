//! Router, handlers and the serve loop.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use sheetsink::{RegionSource, SchemaRegistry, SubmissionSchema, TabularSink};
use sheetsink_protocol::{HealthResponse, Position, RecordFields, SubmitResponse};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, ServerError};

#[derive(Clone)]
pub struct AppState {
    pub sink: Arc<TabularSink>,
    pub registry: Arc<SchemaRegistry>,
}

impl AppState {
    pub fn new(sink: TabularSink, registry: SchemaRegistry) -> Self {
        Self {
            sink: Arc::new(sink),
            registry: Arc::new(registry),
        }
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/export-user-data", post(export_user_data))
        .route("/submit/{schema}", post(submit_named))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive when `origins` is empty, otherwise an exact allow-list.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|_| ServerError::CorsOrigin(o.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::available(env!("CARGO_PKG_VERSION")))
}

async fn export_user_data(
    State(state): State<AppState>,
    payload: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let schema = state.registry.default_schema();
    submit(state, schema, payload).await
}

async fn submit_named(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let schema = state
        .registry
        .get(&name)
        .ok_or(AppError::UnknownSchema(name))?;
    submit(state, schema, payload).await
}

async fn submit(
    state: AppState,
    schema: Arc<SubmissionSchema>,
    payload: Result<Json<RecordFields>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(fields) = payload.map_err(|rejection| AppError::InvalidBody(rejection.body_text()))?;

    let sink = Arc::clone(&state.sink);
    let record = tokio::task::spawn_blocking(move || sink.submit_record(&schema, &fields))
        .await
        .map_err(|e| AppError::Internal(format!("submit task failed: {}", e)))??;

    let position = match record.source {
        RegionSource::Reported => Position::Reported,
        RegionSource::Fallback => Position::Fallback,
    };
    let range = record.range_a1();
    tracing::info!(
        table = %record.locator.table_name,
        provisioned = record.provisioned,
        styled = record.styled,
        "exported row to {}",
        range
    );
    Ok(Json(SubmitResponse::exported(
        record.locator.table_name.clone(),
        range,
        record.display_row(),
        position,
    )))
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(bind: &str, port: u16, app: Router) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

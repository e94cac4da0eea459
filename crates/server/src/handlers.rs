//! HTTP route handlers.
//!
//! Bodies are read as raw bytes and decoded here so that malformed JSON is
//! reported with this service's error shape rather than axum's.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use logshard_core::{
    parse_purge_date, Cell, Error, FamilyResolver, IngestionPipeline, LogEvent, QueryRouter,
    RetentionPurger, ShardRegistry,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub router: Arc<QueryRouter>,
    pub purger: Arc<RetentionPurger>,
}

impl AppState {
    /// Builds the engine components over `registry`.
    pub fn new(registry: Arc<ShardRegistry>, purger: RetentionPurger) -> Self {
        Self {
            pipeline: Arc::new(IngestionPipeline::new(registry.clone())),
            router: Arc::new(QueryRouter::new(FamilyResolver::new(registry))),
            purger: Arc::new(purger),
        }
    }
}

/// Body of `PUT /api/log`.
#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub family: String,
    pub schema: BTreeMap<String, String>,
    pub logs: Vec<LogEvent>,
}

/// Body of `PUT /api/query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql_query: String,
}

/// Body of `PUT /api/purge`.
#[derive(Debug, Deserialize)]
pub struct PurgeRequest {
    pub family: String,
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: Vec<Vec<Cell>>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub message: String,
    pub deleted: u64,
}

/// Handle PUT /api/log
pub async fn handle_log(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: LogRequest = serde_json::from_slice(&body)?;
    state
        .pipeline
        .ingest(&request.family, &request.schema, &request.logs)
        .await?;
    Ok(Json(MessageResponse {
        message: "OK".to_string(),
    }))
}

/// Handle PUT /api/query
///
/// A query the router cannot attribute to a table is reported as not found,
/// like a query naming an unknown table.
pub async fn handle_query(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<QueryResponse>), ApiError> {
    let request: QueryRequest = serde_json::from_slice(&body)?;
    let result = state
        .router
        .query(&request.sql_query)
        .await
        .map_err(|err| match err {
            Error::MalformedQuery(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            other => other.into(),
        })?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueryResponse {
            result: result.rows,
        }),
    ))
}

/// Handle PUT /api/purge
pub async fn handle_purge(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PurgeResponse>), ApiError> {
    let request: PurgeRequest = serde_json::from_slice(&body)?;
    let before = parse_purge_date(&request.date)?;
    let deleted = state.purger.purge_family(&request.family, before).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(PurgeResponse {
            message: format!(
                "Purged records of the {} family older than {}",
                request.family.trim(),
                request.date.trim()
            ),
            deleted,
        }),
    ))
}

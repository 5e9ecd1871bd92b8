//! Log viewer HTTP API handlers
//!
//! - `GET /endpoints` lists endpoint names that have stored calls
//! - `GET /logs?endpoint=<name>&day=<json>&page=<n>` returns one page of calls
//!
//! Both are mounted under the configured base path by the server.

use crate::error::AppError;
use crate::observability::{Day, LogResponse, LogStore, QueryService};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

/// Shared state for the log viewer API
#[derive(Clone)]
pub struct LogViewerState {
    pub queries: QueryService,
}

impl LogViewerState {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self {
            queries: QueryService::new(store),
        }
    }
}

/// Raw query parameters for the logs API
///
/// Kept as strings so each problem maps to its own 400 reason.
#[derive(Debug, Default)]
pub struct LogQueryParams {
    pub endpoint: Option<String>,

    /// JSON `{"day": 18, "month": 2, "year": 2023}`
    pub day: Option<String>,

    /// Zero-based page index
    pub page: Option<String>,
}

impl LogQueryParams {
    /// Collect from raw pairs; the first occurrence of a repeated key wins
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "endpoint" => &mut params.endpoint,
                "day" => &mut params.day,
                "page" => &mut params.page,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }
}

/// Routes without base path, auth or CORS; the server adds those
pub fn routes(state: LogViewerState) -> Router {
    Router::new()
        .route("/endpoints", get(list_endpoints))
        .route("/logs", get(get_logs))
        .with_state(state)
}

/// GET /endpoints - Distinct endpoint names
pub async fn list_endpoints(State(state): State<LogViewerState>) -> Result<Json<Vec<String>>, AppError> {
    let endpoints = state.queries.list_endpoints().await?;
    Ok(Json(endpoints))
}

/// GET /logs - One page of an endpoint's calls on a given day
///
/// Example: GET /logs?endpoint=amar&day={"day":18,"month":2,"year":2023}&page=0
pub async fn get_logs(
    State(state): State<LogViewerState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<LogResponse>, AppError> {
    let Query(pairs) = query.map_err(|e| {
        tracing::debug!(error = %e, "Rejected unreadable query string");
        AppError::MissingParameter
    })?;
    let (endpoint, day, page) = parse_params(LogQueryParams::from_pairs(pairs))?;

    let response = state.queries.query(&endpoint, day, page).await?;

    Ok(Json(response))
}

/// Validate raw parameters in the order: presence, page, day
fn parse_params(params: LogQueryParams) -> Result<(String, Day, usize), AppError> {
    let (Some(endpoint), Some(day), Some(page)) = (params.endpoint, params.day, params.page) else {
        return Err(AppError::MissingParameter);
    };

    let page: usize = page.trim().parse().map_err(|_| AppError::MalformedPage)?;

    let day: Day = serde_json::from_str(&day).map_err(|e| {
        tracing::debug!(error = %e, day = %day, "Rejected malformed day parameter");
        AppError::MalformedDay
    })?;
    if day.bounds_millis().is_none() {
        return Err(AppError::MalformedDay);
    }

    Ok((endpoint, day, page))
}

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::error::Error;
use crate::igdb::query::{self, Query};
use crate::server::server::AppState;
use crate::utils::constants::ENDPOINT_GAMES;

/// Route-scoped failure: always `500 {error, details}`.
#[derive(Debug)]
pub struct ApiError {
    context: &'static str,
    error: Error,
}

impl ApiError {
    fn new(context: &'static str, error: Error) -> Self {
        Self { context, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("{}: {}", self.context, self.error);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.context, "details": self.error.to_string() })),
        )
            .into_response()
    }
}

type RouteResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Diagnostic: hand out the current bearer token.
pub async fn token(State(state): State<AppState>) -> RouteResult {
    let token = state
        .igdb
        .tokens()
        .get_valid_token()
        .await
        .map_err(|e| ApiError::new("Failed to fetch token", e))?;
    Ok(Json(json!({ "access_token": token.value })))
}

pub async fn games(State(state): State<AppState>) -> RouteResult {
    relay(&state, "games", "Failed to fetch games", query::games()).await
}

pub async fn search_games(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> RouteResult {
    let input = params.query.unwrap_or_default();
    match query::search_games(&input) {
        Some(search) => relay(&state, "searchGames", "Failed to search games", search).await,
        None => {
            debug!("blank search query, skipping upstream");
            Ok(Json(json!([])))
        }
    }
}

pub async fn top_daily(State(state): State<AppState>) -> RouteResult {
    relay(&state, "topDaily", "Failed to fetch topDaily", query::top_daily()).await
}

pub async fn top_this_year(State(state): State<AppState>) -> RouteResult {
    let query = query::top_this_year(state.clock.now());
    relay(&state, "topThisYear", "Failed to fetch topThisYear", query).await
}

pub async fn anticipated(State(state): State<AppState>) -> RouteResult {
    let query = query::anticipated(state.clock.now());
    relay(&state, "anticipated", "Failed to fetch anticipated", query).await
}

/// Single record by id, `{}` when the upstream has none. A non-numeric id is
/// reported like any other failure (500).
pub async fn game(State(state): State<AppState>, Path(id): Path<String>) -> RouteResult {
    const CONTEXT: &str = "Failed to fetch game";
    let id: u64 = id.trim().parse().map_err(|_| {
        ApiError::new(CONTEXT, Error::UpstreamRequest(format!("invalid game id '{}'", id)))
    })?;

    let Json(found) = relay(&state, "game", CONTEXT, query::game_details(id)).await?;
    let record = match found {
        Value::Array(items) => items.into_iter().next().unwrap_or_else(|| json!({})),
        other => other,
    };
    Ok(Json(record))
}

async fn relay(state: &AppState, route: &str, context: &'static str, query: Query) -> RouteResult {
    state
        .igdb
        .query(route, ENDPOINT_GAMES, &query)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(context, e))
}

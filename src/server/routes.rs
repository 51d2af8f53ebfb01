use crate::domain::model::LookupQuery;
use crate::server::envelope::{LookupResponse, StatsResponse};
use crate::server::AppState;
use crate::utils::error::{LookupError, Result};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub word: Option<String>,
    pub force: Option<String>,
    pub history: Option<String>,
}

impl SearchParams {
    fn word(&self) -> Result<&str> {
        self.word
            .as_deref()
            .ok_or_else(|| LookupError::validation("missing query parameter: word"))
    }
}

/// 0/1 旗標，也接受 true/false
fn parse_flag(name: &str, value: Option<&str>) -> Result<bool> {
    match value.map(str::trim) {
        None | Some("") | Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(other) if other.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) if other.eq_ignore_ascii_case("true") => Ok(true),
        Some(other) => Err(LookupError::validation(format!(
            "{} must be 0 or 1, got '{}'",
            name, other
        ))),
    }
}

async fn run_lookup(state: &AppState, query: Result<LookupQuery>) -> Json<LookupResponse> {
    let outcome = match query {
        Ok(query) => state.service.lookup(&query).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => Json(LookupResponse::success(&outcome)),
        Err(e) => {
            tracing::warn!("Lookup failed [{}]: {}", e.kind(), e);
            Json(LookupResponse::failure(&e))
        }
    }
}

fn entity_query(params: &SearchParams) -> Result<LookupQuery> {
    Ok(LookupQuery::by_entity(params.word()?)
        .with_force(parse_flag("force", params.force.as_deref())?)
        .with_history(parse_flag("history", params.history.as_deref())?))
}

fn domain_query(params: &SearchParams) -> Result<LookupQuery> {
    Ok(LookupQuery::by_domain(params.word()?)
        .with_force(parse_flag("force", params.force.as_deref())?)
        .with_history(parse_flag("history", params.history.as_deref())?))
}

/// GET /icp/company/search
pub async fn search_company(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<LookupResponse> {
    run_lookup(&state, entity_query(&params)).await
}

/// GET /icp/company/search/history
pub async fn search_company_history(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<LookupResponse> {
    let query = params
        .word()
        .map(|word| LookupQuery::by_entity(word).with_history(true));
    run_lookup(&state, query).await
}

/// GET /icp/search
pub async fn search_domain(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<LookupResponse> {
    run_lookup(&state, domain_query(&params)).await
}

/// GET /icp/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    match state.service.stats().await {
        Ok(stats) => Json(StatsResponse::success(stats)),
        Err(e) => {
            tracing::error!("Reading cache statistics failed: {}", e);
            Json(StatsResponse::failure(&e))
        }
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

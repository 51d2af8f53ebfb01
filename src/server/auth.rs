use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use subtle::ConstantTimeEq;

pub const AUTH_HEADER: &str = "AuthKey";

/// 檢查 `AuthKey` 標頭，不符就在進到查詢前擋下
pub async fn require_auth_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let rejection = match request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        None => Some("missing AuthKey header"),
        Some(key) if matches_key(key, &state.auth_key) => None,
        Some(_) => Some("invalid AuthKey header"),
    };

    match rejection {
        Some(message) => {
            tracing::warn!("Rejected {}: {}", request.uri().path(), message);
            unauthorized(message)
        }
        None => next.run(request).await,
    }
}

/// 固定時間比對
fn matches_key(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": message })),
    )
        .into_response()
}

//! Public rate limit check endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use rihlah_domain::{ActionType, format_retry_delay};

use crate::dto::{CheckRateLimitRequest, CheckRateLimitResponse, RateLimitDeniedResponse};
use crate::error::{ApiError, ErrorResponse};
use crate::state::AppState;

pub async fn check_rate_limit_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CheckRateLimitRequest>>,
) -> Response {
    let Json(request) = body.unwrap_or_default();

    let Some(action_type) = request.action_type.filter(|value| !value.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("action_type is required")),
        )
            .into_response();
    };

    let action_type = match action_type.parse::<ActionType>() {
        Ok(action_type) => action_type,
        Err(error) => return ApiError(error).into_response(),
    };

    let rule = state.rate_limit_service.rule_for(action_type);
    let rule = match rule.with_overrides(request.max_attempts, request.window_minutes) {
        Ok(rule) => rule,
        Err(error) => return ApiError(error).into_response(),
    };

    let identifier = client_identifier(&headers);
    let decision = match state
        .rate_limit_service
        .check_rate_limit(&rule, &identifier)
        .await
    {
        Ok(decision) => decision,
        Err(error) => return ApiError(error).into_response(),
    };

    if !decision.allowed {
        tracing::info!(
            identifier,
            action_type = action_type.as_str(),
            retry_in = format_retry_delay(decision.reset_at, Utc::now()),
            "rate limit exceeded"
        );
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitDeniedResponse::new(decision.reset_at)),
        )
            .into_response();
    }

    Json(CheckRateLimitResponse::from(decision)).into_response()
}

/// Derives the caller key from proxy headers.
///
/// Prefers the first `x-forwarded-for` hop, then `x-real-ip`. Callers
/// without either share the `"unknown"` bucket.
fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_owned();
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests;

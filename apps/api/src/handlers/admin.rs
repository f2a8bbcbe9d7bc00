//! Admin endpoints for inspecting and clearing attempt counters.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use rihlah_domain::RateLimitRecordId;

use crate::dto::{ClearRateLimitsResponse, RateLimitRecordResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_rate_limits_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RateLimitRecordResponse>>> {
    let statuses = state.rate_limit_service.list_records().await?;

    Ok(Json(
        statuses
            .into_iter()
            .map(RateLimitRecordResponse::from)
            .collect(),
    ))
}

pub async fn reset_rate_limit_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .rate_limit_service
        .reset_record(RateLimitRecordId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_rate_limit_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .rate_limit_service
        .delete_record(RateLimitRecordId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_rate_limits_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<ClearRateLimitsResponse>> {
    let deleted = state.rate_limit_service.clear_all().await?;

    Ok(Json(ClearRateLimitsResponse { deleted }))
}

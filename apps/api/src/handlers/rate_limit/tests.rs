use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;

use rihlah_application::{RateLimitPolicy, RateLimitService};
use rihlah_infrastructure::InMemoryRateLimitRepository;

use super::{check_rate_limit_handler, client_identifier};
use crate::dto::CheckRateLimitRequest;
use crate::state::AppState;

fn state() -> AppState {
    AppState {
        rate_limit_service: RateLimitService::new(
            Arc::new(InMemoryRateLimitRepository::new()),
            RateLimitPolicy::default(),
        ),
        admin_token: "secret".to_owned(),
    }
}

fn forwarded_headers(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static(value));
    headers
}

fn login_request() -> CheckRateLimitRequest {
    CheckRateLimitRequest {
        action_type: Some("login".to_owned()),
        ..CheckRateLimitRequest::default()
    }
}

async fn body_json(response: Response) -> Value {
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("response body must be readable");
    };
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

#[test]
fn identifier_prefers_first_forwarded_hop() {
    let headers = forwarded_headers("203.0.113.9, 198.51.100.7, 10.0.0.1");

    assert_eq!(client_identifier(&headers), "203.0.113.9");
}

#[test]
fn identifier_falls_back_to_real_ip() {
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

    assert_eq!(client_identifier(&headers), "198.51.100.7");
}

#[test]
fn identifier_without_proxy_headers_is_unknown() {
    assert_eq!(client_identifier(&HeaderMap::new()), "unknown");

    let headers = forwarded_headers("  ");
    assert_eq!(client_identifier(&headers), "unknown");
}

#[tokio::test]
async fn missing_action_type_is_a_bad_request() {
    let response = check_rate_limit_handler(
        State(state()),
        forwarded_headers("203.0.113.9"),
        Some(Json(CheckRateLimitRequest::default())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "action_type is required"})
    );
}

#[tokio::test]
async fn absent_body_is_a_bad_request() {
    let response =
        check_rate_limit_handler(State(state()), forwarded_headers("203.0.113.9"), None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_action_type_is_rejected() {
    let request = CheckRateLimitRequest {
        action_type: Some("captcha".to_owned()),
        ..CheckRateLimitRequest::default()
    };

    let response = check_rate_limit_handler(
        State(state()),
        forwarded_headers("203.0.113.9"),
        Some(Json(request)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn allowance_shrinks_until_the_sixth_attempt_is_denied() {
    let state = state();

    for expected_remaining in (0..5).rev() {
        let response = check_rate_limit_handler(
            State(state.clone()),
            forwarded_headers("203.0.113.9"),
            Some(Json(login_request())),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["allowed"], Value::Bool(true));
        assert_eq!(body["remaining"], Value::from(expected_remaining));
    }

    let response = check_rate_limit_handler(
        State(state.clone()),
        forwarded_headers("203.0.113.9"),
        Some(Json(login_request())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        Value::from("Too many attempts. Please try again later.")
    );
    assert_eq!(body["remaining"], Value::from(0));
}

#[tokio::test]
async fn different_callers_do_not_share_a_counter() {
    let state = state();

    for _ in 0..5 {
        check_rate_limit_handler(
            State(state.clone()),
            forwarded_headers("203.0.113.9"),
            Some(Json(login_request())),
        )
        .await;
    }

    let response = check_rate_limit_handler(
        State(state.clone()),
        forwarded_headers("198.51.100.7"),
        Some(Json(login_request())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["remaining"], Value::from(4));
}

#[tokio::test]
async fn request_overrides_tighten_the_ceiling() {
    let state = state();

    let request = || CheckRateLimitRequest {
        action_type: Some("password_reset".to_owned()),
        max_attempts: Some(2),
        window_minutes: None,
    };

    for _ in 0..2 {
        let response = check_rate_limit_handler(
            State(state.clone()),
            forwarded_headers("203.0.113.9"),
            Some(Json(request())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = check_rate_limit_handler(
        State(state.clone()),
        forwarded_headers("203.0.113.9"),
        Some(Json(request())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

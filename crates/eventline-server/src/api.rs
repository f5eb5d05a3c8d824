//! HTTP handlers.

use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use eventline_core::ListenerStatus;
use serde_json::json;
use std::sync::Arc;

/// Response wrapper translating a listener outcome into HTTP.
#[derive(Debug)]
pub struct EventResponse(pub ListenerStatus);

impl EventResponse {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ListenerStatus::Unauthorized => StatusCode::UNAUTHORIZED,
            ListenerStatus::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ListenerStatus::BadRequest(_) => StatusCode::BAD_REQUEST,
            ListenerStatus::Ignored => StatusCode::NO_CONTENT,
            ListenerStatus::Accepted => StatusCode::OK,
            ListenerStatus::HandlerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EventResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self.0 {
            ListenerStatus::Unauthorized => "Invalid Authorization header".to_string(),
            ListenerStatus::ServiceUnavailable => {
                "Currently replaying historical events. Try again soon.".to_string()
            }
            ListenerStatus::BadRequest(detail) => format!("Missing or invalid request body: {detail}"),
            ListenerStatus::HandlerError(detail) => detail,
            ListenerStatus::Ignored => return status.into_response(),
            ListenerStatus::Accepted => return (status, Json(json!({ "status": "ok" }))).into_response(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// `POST /events`: one live event per request.
pub async fn receive_event(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> EventResponse {
    // A header that is not visible ASCII cannot match the token.
    let credential = headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());

    EventResponse(state.listener.handle(credential, &body).await)
}

/// `GET /status`: replay phase and high-water mark.
pub async fn status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let mut body = state.listener.gate().status_json();
    let now = chrono::Utc::now();
    body["startedAt"] = json!(state.started_at.to_rfc3339());
    body["uptimeSeconds"] = json!((now - state.started_at).num_seconds());
    Json(body)
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_status() {
        let cases = [
            (ListenerStatus::Unauthorized, 401),
            (ListenerStatus::ServiceUnavailable, 503),
            (ListenerStatus::BadRequest("x".into()), 400),
            (ListenerStatus::Ignored, 204),
            (ListenerStatus::Accepted, 200),
            (ListenerStatus::HandlerError("boom".into()), 500),
        ];
        for (status, code) in cases {
            assert_eq!(EventResponse(status).status_code().as_u16(), code);
        }
    }
}

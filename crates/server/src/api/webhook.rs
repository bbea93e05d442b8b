//! Plex webhook endpoint.
//!
//! Plex posts `multipart/form-data` with the event JSON in the `payload`
//! field (plus a thumbnail for some events). A raw JSON body is accepted
//! too, which is handy for manual testing.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use subfetch_core::WebhookBody;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::state::AppState;

/// Multipart field carrying the event JSON.
const PAYLOAD_FIELD: &str = "payload";

pub async fn receive(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", request_id = %request_id);

    async move {
        let payload = match read_payload(request).await {
            Ok(payload) => payload,
            Err(message) => {
                warn!(error = %message, "Unreadable webhook body");
                return (StatusCode::BAD_REQUEST, Json(WebhookBody::Error { message }))
                    .into_response();
            }
        };

        let response = state.webhooks().handle(&payload).await;
        let status = StatusCode::from_u16(response.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(response.body)).into_response()
    }
    .instrument(span)
    .await
}

/// Pull the event JSON out of either body format.
async fn read_payload(request: Request) -> Result<String, String> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| format!("Invalid multipart body: {}", e))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| format!("Invalid multipart body: {}", e))?
        {
            if field.name() == Some(PAYLOAD_FIELD) {
                return field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read payload field: {}", e));
            }
        }
        return Err("Missing payload field".to_string());
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| format!("Failed to read body: {}", e))?;
    String::from_utf8(body.to_vec()).map_err(|_| "Body is not valid UTF-8".to_string())
}

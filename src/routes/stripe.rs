use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, response::Response};
use tracing::{error, warn};

use crate::responses::JsonResponse;
use crate::state::AppState;

// POST /api/stripe/webhook
//
// Verify first, act second: nothing in the body is trusted until the
// signature checks out against the endpoint secret.
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let sig = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing Stripe-Signature").into_response(),
    };

    let event = match app_state.gateway.verify_webhook(&body, sig) {
        Ok(event) => event,
        Err(err) => {
            warn!(?err, "stripe webhook verification failed");
            return JsonResponse::bad_request("Invalid webhook").into_response();
        }
    };

    match app_state.settlement.handle_gateway_event(&event).await {
        // Acknowledge even events we ignore so Stripe stops redelivering.
        Ok(()) => Json(serde_json::json!({ "received": true })).into_response(),
        Err(err) => {
            error!(?err, event_id = %event.id, "webhook settlement failed");
            JsonResponse::server_error("Settlement failed").into_response()
        }
    }
}

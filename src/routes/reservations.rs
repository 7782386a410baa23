use axum::{extract::State, response::IntoResponse, response::Response, Json};
use tracing::error;

use crate::responses::JsonResponse;
use crate::routes::auth::claims::Role;
use crate::routes::auth::Identity;
use crate::services::reservation::{ReservationError, ReservationRequest};
use crate::state::AppState;

// POST /api/reservations
pub async fn create(
    State(app_state): State<AppState>,
    identity: Identity,
    Json(request): Json<ReservationRequest>,
) -> Response {
    if identity.role != Role::Procurer {
        return JsonResponse::forbidden("Only ticket buyers can reserve seats").into_response();
    }

    match app_state
        .reservations
        .create(identity.user_id, request)
        .await
    {
        Ok(outcome) => Json(serde_json::json!({
            "transaction_id": outcome.transaction.id,
            "reference": outcome.transaction.reference,
            "amount_cents": outcome.transaction.amount_cents,
            "checkout_url": outcome.checkout_url,
            "checkout_session_id": outcome.checkout_session_id,
        }))
        .into_response(),
        Err(ReservationError::Validation(msg)) => {
            JsonResponse::bad_request(&msg).into_response()
        }
        Err(ReservationError::PriceMismatch { .. }) => {
            JsonResponse::bad_request("Ticket prices have changed, please refresh and try again")
                .into_response()
        }
        Err(ReservationError::InsufficientSeats { .. }) => {
            JsonResponse::conflict("Not enough seats left in the selected category")
                .into_response()
        }
        Err(ReservationError::Gateway(err)) => {
            error!(?err, "checkout session creation failed");
            JsonResponse::bad_gateway("Payment provider is unavailable, please try again")
                .into_response()
        }
        Err(err @ (ReservationError::Storage(_) | ReservationError::ReferenceExhausted)) => {
            error!(?err, "reservation failed");
            JsonResponse::server_error("Could not create the reservation").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::inventory_repository::InventoryRepository;
    use crate::models::transaction::TransactionStatus;
    use crate::routes::test_support::{context, TEST_PRICE_CENTS};
    use crate::services::reservation::ReservationLine;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn request(
        ctx: &crate::routes::test_support::TestContext,
        quantity: i32,
        price: i64,
    ) -> ReservationRequest {
        ReservationRequest {
            event_date_id: ctx.event_date_id,
            lines: vec![ReservationLine {
                seat_category_id: ctx.seat_category_id,
                quantity,
                quoted_price_cents: price,
            }],
        }
    }

    fn identity(role: Role) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[tokio::test]
    async fn buyer_gets_checkout_url_and_unpaid_transaction() {
        let ctx = context();

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Procurer),
            Json(request(&ctx, 2, TEST_PRICE_CENTS)),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["amount_cents"], 9000);
        assert!(json["checkout_url"].as_str().is_some());
        assert!(json["reference"].as_str().unwrap().starts_with("TKT-"));

        let transactions = ctx.ledger.transactions.lock().unwrap();
        assert_eq!(transactions.len(), 1);
        assert!(transactions
            .values()
            .all(|t| t.status == TransactionStatus::Unpaid));
    }

    #[tokio::test]
    async fn organizers_cannot_reserve() {
        let ctx = context();

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Organizer),
            Json(request(&ctx, 1, TEST_PRICE_CENTS)),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(ctx.ledger.transactions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_quoted_price_is_rejected() {
        let ctx = context();

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Procurer),
            Json(request(&ctx, 1, TEST_PRICE_CENTS - 500)),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ctx.inventory
                .available(ctx.event_date_id, ctx.seat_category_id)
                .await
                .unwrap(),
            Some(10)
        );
    }

    #[tokio::test]
    async fn sold_out_category_is_a_conflict() {
        let ctx = context();

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Procurer),
            Json(request(&ctx, 11, TEST_PRICE_CENTS)),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn gateway_outage_maps_to_bad_gateway() {
        let ctx = context();
        *ctx.gateway.fail_next_session.lock().unwrap() = true;

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Procurer),
            Json(request(&ctx, 1, TEST_PRICE_CENTS)),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        // The unpaid transaction stays for the sweep to expire.
        assert_eq!(ctx.ledger.transactions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_request_is_a_bad_request() {
        let ctx = context();

        let resp = create(
            State(ctx.state.clone()),
            identity(Role::Procurer),
            Json(ReservationRequest {
                event_date_id: ctx.event_date_id,
                lines: vec![],
            }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

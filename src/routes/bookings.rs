use axum::{extract::State, response::IntoResponse, response::Response, Json};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::routes::auth::Identity;
use crate::services::settlement::CancellationError;
use crate::state::AppState;

// GET /api/bookings
pub async fn list(State(app_state): State<AppState>, identity: Identity) -> Response {
    match app_state.ledger.bookings_for_user(identity.user_id).await {
        Ok(bookings) => Json(bookings).into_response(),
        Err(err) => {
            error!(?err, "booking list query failed");
            JsonResponse::server_error("Could not load bookings").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub transaction_id: Uuid,
}

// POST /api/bookings/cancel
pub async fn cancel(
    State(app_state): State<AppState>,
    identity: Identity,
    Json(request): Json<CancelRequest>,
) -> Response {
    match app_state
        .settlement
        .cancel(request.transaction_id, identity.user_id)
        .await
    {
        Ok(()) => JsonResponse::success("Reservation cancelled").into_response(),
        Err(CancellationError::NotFound) => {
            JsonResponse::not_found("No such reservation").into_response()
        }
        Err(CancellationError::Forbidden) => {
            JsonResponse::forbidden("This reservation belongs to another account").into_response()
        }
        Err(CancellationError::AlreadySettled) => {
            JsonResponse::conflict("This reservation is no longer unpaid").into_response()
        }
        Err(CancellationError::Storage(err)) => {
            error!(?err, "cancellation failed");
            JsonResponse::server_error("Could not cancel the reservation").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::inventory_repository::InventoryRepository;
    use crate::db::ledger_repository::{LedgerRepository, NewBookingLine};
    use crate::models::transaction::TransactionStatus;
    use crate::routes::auth::claims::Role;
    use crate::routes::test_support::{bearer_for, context, TestContext, TEST_PRICE_CENTS};
    use axum::extract::FromRequestParts;
    use axum::http::{header, StatusCode};

    fn identity(user_id: Uuid) -> Identity {
        Identity {
            user_id,
            role: Role::Procurer,
        }
    }

    async fn seed_unpaid(ctx: &TestContext, user_id: Uuid, quantity: i32) -> Uuid {
        assert!(ctx
            .inventory
            .reserve(ctx.event_date_id, ctx.seat_category_id, quantity)
            .await
            .unwrap());
        let reference = format!("TKT-{}", Uuid::new_v4().simple());
        ctx.ledger
            .create_transaction_with_bookings(
                user_id,
                &reference,
                TEST_PRICE_CENTS * quantity as i64,
                &[NewBookingLine {
                    event_id: ctx.event_id,
                    seat_category_id: ctx.seat_category_id,
                    event_date_id: ctx.event_date_id,
                    quantity,
                    amount_cents: TEST_PRICE_CENTS * quantity as i64,
                }],
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn list_returns_only_own_bookings() {
        let ctx = context();
        let owner = Uuid::new_v4();
        seed_unpaid(&ctx, owner, 2).await;
        seed_unpaid(&ctx, Uuid::new_v4(), 1).await;

        let resp = list(State(ctx.state.clone()), identity(owner)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["quantity"], 2);
        assert_eq!(rows[0]["status"], "reserved");
    }

    #[tokio::test]
    async fn owner_can_cancel_unpaid_reservation() {
        let ctx = context();
        let owner = Uuid::new_v4();
        let id = seed_unpaid(&ctx, owner, 3).await;

        let resp = cancel(
            State(ctx.state.clone()),
            identity(owner),
            Json(CancelRequest { transaction_id: id }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            ctx.ledger.transaction_status(id),
            Some(TransactionStatus::Cancelled)
        );
        assert_eq!(
            ctx.inventory
                .available(ctx.event_date_id, ctx.seat_category_id)
                .await
                .unwrap(),
            Some(10)
        );
    }

    #[tokio::test]
    async fn cancelling_someone_elses_reservation_is_forbidden() {
        let ctx = context();
        let id = seed_unpaid(&ctx, Uuid::new_v4(), 1).await;

        let resp = cancel(
            State(ctx.state.clone()),
            identity(Uuid::new_v4()),
            Json(CancelRequest { transaction_id: id }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ctx.ledger.transaction_status(id),
            Some(TransactionStatus::Unpaid)
        );
    }

    #[tokio::test]
    async fn paid_reservations_cannot_be_cancelled() {
        let ctx = context();
        let owner = Uuid::new_v4();
        let id = seed_unpaid(&ctx, owner, 1).await;
        ctx.state.settlement.settle_paid(id).await.unwrap();

        let resp = cancel(
            State(ctx.state.clone()),
            identity(owner),
            Json(CancelRequest { transaction_id: id }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            ctx.ledger.transaction_status(id),
            Some(TransactionStatus::Paid)
        );
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let ctx = context();

        let resp = cancel(
            State(ctx.state.clone()),
            identity(Uuid::new_v4()),
            Json(CancelRequest {
                transaction_id: Uuid::new_v4(),
            }),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bearer_token_resolves_to_identity() {
        let ctx = context();
        let user_id = Uuid::new_v4();
        let token = bearer_for(&ctx.state, user_id, Role::Procurer);

        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let identity = Identity::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.role, Role::Procurer);
    }

    #[tokio::test]
    async fn missing_bearer_token_is_unauthorized() {
        let ctx = context();

        let request = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let rejection = Identity::from_request_parts(&mut parts, &ctx.state)
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }
}

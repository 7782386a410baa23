pub mod claims;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::responses::JsonResponse;
use crate::routes::auth::claims::Role;
use crate::utils::jwt::decode_jwt;
use crate::AppState;

/// The authenticated caller, extracted from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                JsonResponse::unauthorized("Missing bearer token").into_response()
            })?;

        let data = decode_jwt(
            token,
            &state.jwt_keys,
            &state.config.jwt_issuer,
            &state.config.jwt_audience,
        )
        .map_err(|_| JsonResponse::unauthorized("Invalid or expired token").into_response())?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| JsonResponse::unauthorized("Invalid subject claim").into_response())?;

        Ok(Identity {
            user_id,
            role: data.claims.role,
        })
    }
}

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::Caller;
use crate::error::ApiError;
use crate::models::AppState;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub caller: Caller,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let caller = state
                .identity
                .resolve(authz.token())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "identity lookup failed");
                    ApiError::internal()
                })?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext { caller })
        }
    }
}

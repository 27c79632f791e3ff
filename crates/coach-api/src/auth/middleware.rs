//! Axum용 JWT 인증 추출기.
//!
//! REST 핸들러에서 인증된 사용자 신원을 추출합니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::verifier::{AuthError, Identity};
use crate::{error::ApiErrorResponse, state::AppState};

/// 인증된 사용자 추출기.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(
///     AuthenticatedUser(identity): AuthenticatedUser,
/// ) -> impl IntoResponse {
///     format!("Authenticated user: {}", identity.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = if self.is_unauthorized() {
            "UNAUTHORIZED"
        } else {
            "AUTH_SERVICE_ERROR"
        };

        (status, Json(ApiErrorResponse::simple(code, self.client_message))).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Authorization 헤더에서 Bearer 토큰 추출
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(AuthError::missing_token)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::unauthorized("Invalid Authorization header format"))?;

        let identity = state.verifier.verify(token).await?;
        Ok(AuthenticatedUser(identity))
    }
}

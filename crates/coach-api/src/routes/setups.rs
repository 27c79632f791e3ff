//! 셋업 관리 endpoint.
//!
//! 추적 셋업 생성, 상태/노트 변경, 감지 시뮬레이션을 제공합니다.
//! 모든 엔드포인트는 JWT 인증이 필요하며, 요청자 소유 셋업만 다룹니다.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiErrorResponse, ApiResult};
use crate::repository::{NewDetectedSetup, NewTrackedSetup, TrackedSetupRecord};
use crate::services::{LifecycleError, SetupLifecycleService, TransitionRequest};
use crate::state::AppState;

// ================================================================================================
// Response Types
// ================================================================================================

/// 추적 셋업 생성 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackSetupResponse {
    /// 생성되었거나 기존에 존재하던 레코드
    pub setup: TrackedSetupRecord,
    /// 기존 레코드 반환 여부 (멱등 경로)
    pub duplicate: bool,
}

/// 상태 전이 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// 갱신된 레코드
    pub setup: TrackedSetupRecord,
    /// `setup_update` 발행 여부
    pub published: bool,
}

/// 감지 시뮬레이션 응답.
#[derive(Debug, Serialize, ToSchema)]
pub struct SimulateDetectionResponse {
    /// 감지 레코드 ID
    pub detected_setup_id: Uuid,
    /// 생성된 추적 셋업
    pub tracked_setup: TrackedSetupRecord,
}

// ================================================================================================
// Helpers
// ================================================================================================

/// 라이프사이클 서비스 핸들 (DB 미설정 시 503).
fn lifecycle_service(
    state: &AppState,
) -> Result<&Arc<SetupLifecycleService>, (StatusCode, Json<ApiErrorResponse>)> {
    state.lifecycle().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiErrorResponse::simple(
                "DB_UNAVAILABLE",
                "Database not available",
            )),
        )
    })
}

/// 라이프사이클 에러를 HTTP 응답으로 변환.
fn lifecycle_error(e: LifecycleError) -> (StatusCode, Json<ApiErrorResponse>) {
    match e {
        LifecycleError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse::simple(
                "SETUP_NOT_FOUND",
                format!("Setup not found: {}", id),
            )),
        ),
        LifecycleError::EmptyUpdate => (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::simple(
                "EMPTY_UPDATE",
                "No changes requested",
            )),
        ),
        LifecycleError::CorruptStatus(status) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::new(
                "CORRUPT_STATUS",
                format!("Stored setup status is invalid: {}", status),
            )),
        ),
        LifecycleError::Database(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::new("DB_ERROR", e.to_string())),
        ),
    }
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 추적 셋업 생성 (`source_opportunity_id` 기준 멱등).
#[utoipa::path(
    post,
    path = "/api/v1/setups/track",
    tag = "setups",
    request_body = NewTrackedSetup,
    responses(
        (status = 200, description = "생성 완료 또는 기존 레코드 반환", body = TrackSetupResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn track_setup(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(input): Json<NewTrackedSetup>,
) -> ApiResult<Json<TrackSetupResponse>> {
    info!(user_id = %identity.id, symbol = %input.symbol, "Track setup requested");

    let service = lifecycle_service(&state)?;
    let outcome = service
        .track(&identity.id, input)
        .await
        .map_err(lifecycle_error)?;

    Ok(Json(TrackSetupResponse {
        setup: outcome.record,
        duplicate: outcome.duplicate,
    }))
}

/// 셋업 상태/노트 변경.
///
/// 타인의 셋업은 존재 여부와 무관하게 404입니다.
#[utoipa::path(
    patch,
    path = "/api/v1/setups/{id}",
    tag = "setups",
    params(("id" = Uuid, Path, description = "추적 셋업 ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "변경 완료", body = TransitionResponse),
        (status = 400, description = "빈 요청", body = ApiErrorResponse),
        (status = 404, description = "셋업 없음", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn transition_setup(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<TransitionResponse>> {
    let service = lifecycle_service(&state)?;
    let outcome = service
        .transition(id, &identity.id, request)
        .await
        .map_err(lifecycle_error)?;

    Ok(Json(TransitionResponse {
        setup: outcome.record,
        published: outcome.published,
    }))
}

/// 감지 시뮬레이션.
///
/// 감지 레코드와 파생 추적 셋업을 쌍으로 생성하고 `setup_detected`를
/// 발행합니다.
#[utoipa::path(
    post,
    path = "/api/v1/internal/setups/simulate-detection",
    tag = "setups",
    request_body = NewDetectedSetup,
    responses(
        (status = 200, description = "시뮬레이션 완료", body = SimulateDetectionResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn simulate_detection(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    Json(input): Json<NewDetectedSetup>,
) -> ApiResult<Json<SimulateDetectionResponse>> {
    info!(user_id = %identity.id, symbol = %input.symbol, "Detection simulation requested");

    let service = lifecycle_service(&state)?;
    let outcome = service
        .simulate_detection(&identity.id, input)
        .await
        .map_err(lifecycle_error)?;

    Ok(Json(SimulateDetectionResponse {
        detected_setup_id: outcome.detected_setup_id,
        tracked_setup: outcome.tracked,
    }))
}

/// 셋업 라우터 생성.
pub fn setups_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/setups/track", post(track_setup))
        .route("/setups/{id}", patch(transition_setup))
        .route(
            "/internal/setups/simulate-detection",
            post(simulate_detection),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_status_mapping() {
        let (status, body) = lifecycle_error(LifecycleError::NotFound(Uuid::new_v4()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "SETUP_NOT_FOUND");

        let (status, body) = lifecycle_error(LifecycleError::EmptyUpdate);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "EMPTY_UPDATE");

        let (status, body) = lifecycle_error(LifecycleError::CorruptStatus("zzz".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "CORRUPT_STATUS");
    }
}

//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/setups/track` - 추적 셋업 생성 (멱등)
//! - `/api/v1/setups/{id}` - 셋업 상태/노트 변경
//! - `/api/v1/internal/setups/simulate-detection` - 감지 시뮬레이션

pub mod health;
pub mod setups;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use setups::{
    setups_router, SimulateDetectionResponse, TrackSetupResponse, TransitionResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1", setups_router())
}

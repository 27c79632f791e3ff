//! REST API 및 WebSocket 푸시 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (셋업 추적/전이/감지 시뮬레이션)
//! - 실시간 셋업 알림 WebSocket 게이트웨이
//! - 인프로세스 푸시 버스 및 연결 수용량 제어
//! - JWT 인증
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: JWT 인증 및 신원 검증
//! - [`websocket`]: 푸시 버스, 수용량 제어, 연결 게이트웨이
//! - [`repository`]: 셋업 영속화
//! - [`services`]: 라이프사이클 서비스 및 하트비트 발행기
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;

pub use auth::{AuthError, AuthenticatedUser, Claims, Identity, IdentityVerifier, JwtVerifier};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use routes::*;
pub use services::{start_heartbeat_publisher, SetupLifecycleService};
pub use state::AppState;
pub use websocket::{
    websocket_router, ClientMessage, ConnectionLimiter, PushBus, PushBusConfig, ServerMessage,
    WsError,
};

#[cfg(any(test, feature = "test-utils"))]
pub use state::test_support;

//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiErrorResponse;
use crate::repository::{DetectedSetupRecord, NewDetectedSetup, NewTrackedSetup, TrackedSetupRecord};
use crate::routes::{
    ComponentHealth, ComponentStatus, HealthResponse, SimulateDetectionResponse,
    TrackSetupResponse, TransitionResponse,
};
use crate::services::TransitionRequest;

/// Bearer 인증 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Coach API 문서.
///
/// 모든 엔드포인트와 스키마를 포함하는 OpenAPI 3.0 스펙입니다.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AI Coach Setup Alert API",
        version = "0.1.0",
        description = r#"
# 셋업 알림 푸시 파이프라인 REST API

추적 셋업 관리와 실시간 푸시 파이프라인의 REST 진입점입니다.

## 주요 기능

- **셋업 추적**: 감지된 기회를 추적 셋업으로 등록 (멱등)
- **상태 전이**: 활성/트리거/무효화/보관 상태 관리
- **감지 시뮬레이션**: 감지 + 추적 쌍 생성 및 푸시 이벤트 발행

## 인증

모든 `/api/v1` 엔드포인트는 JWT Bearer 토큰 인증이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.

## WebSocket

실시간 이벤트는 `GET /ws/setups?token=<jwt>` WebSocket으로 전달됩니다.
`{"type":"subscribe","channels":["setups:<user_id>"]}`로 자신의 채널을
구독하세요.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "setups", description = "셋업 관리 - 추적/전이/감지 시뮬레이션")
    ),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Setups =====
            TrackedSetupRecord,
            DetectedSetupRecord,
            NewTrackedSetup,
            NewDetectedSetup,
            TransitionRequest,
            TrackSetupResponse,
            TransitionResponse,
            SimulateDetectionResponse,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Setups =====
        crate::routes::setups::track_setup,
        crate::routes::setups::transition_setup,
        crate::routes::setups::simulate_detection,
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

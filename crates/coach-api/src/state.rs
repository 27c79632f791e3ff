//! 애플리케이션 상태.
//!
//! 라우터 전체에서 공유되는 서비스 핸들 모음. 전역 상태 없이 생성 후
//! `Arc`로 주입합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::auth::IdentityVerifier;
use crate::services::SetupLifecycleService;
use crate::websocket::{ConnectionLimiter, PushBus};

/// 공유 애플리케이션 상태.
pub struct AppState {
    /// 데이터베이스 풀 (미설정 시 영속화 기능 비활성)
    pub db_pool: Option<PgPool>,
    /// 푸시 버스
    pub push_bus: Arc<PushBus>,
    /// 연결 수용량 제한기
    pub limiter: Arc<ConnectionLimiter>,
    /// 신원 검증기
    pub verifier: Arc<dyn IdentityVerifier>,
    /// 셋업 라이프사이클 서비스 (DB 필요)
    pub lifecycle: Option<Arc<SetupLifecycleService>>,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
    /// 서버 버전
    pub version: String,
}

impl AppState {
    /// 새 상태 생성 (DB 없음).
    pub fn new(
        push_bus: Arc<PushBus>,
        limiter: Arc<ConnectionLimiter>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            db_pool: None,
            push_bus,
            limiter,
            verifier,
            lifecycle: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 데이터베이스 풀을 연결하고 라이프사이클 서비스를 구성합니다.
    #[must_use]
    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.lifecycle = Some(Arc::new(SetupLifecycleService::new(
            pool.clone(),
            self.push_bus.clone(),
        )));
        self.db_pool = Some(pool);
        self
    }

    /// 데이터베이스 연결 여부.
    pub fn has_db(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 라이프사이클 서비스 핸들 (미구성 시 None).
    pub fn lifecycle(&self) -> Option<&Arc<SetupLifecycleService>> {
        self.lifecycle.as_ref()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    //! 테스트용 상태 구성 헬퍼.

    use super::*;
    use crate::auth::JwtVerifier;
    use crate::websocket::PushBusConfig;

    /// 테스트 기본 시크릿.
    pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    /// DB 없는 테스트 상태를 생성합니다.
    pub fn create_test_state(max_connections: Option<usize>) -> Arc<AppState> {
        Arc::new(AppState::new(
            PushBus::new(PushBusConfig::default()),
            Arc::new(ConnectionLimiter::new(max_connections)),
            Arc::new(JwtVerifier::new(TEST_JWT_SECRET)),
        ))
    }

    /// 검증기를 교체한 테스트 상태를 생성합니다.
    pub fn create_test_state_with_verifier(
        max_connections: Option<usize>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Arc<AppState> {
        Arc::new(AppState::new(
            PushBus::new(PushBusConfig::default()),
            Arc::new(ConnectionLimiter::new(max_connections)),
            verifier,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::create_test_state;

    #[tokio::test]
    async fn test_state_without_db() {
        let state = create_test_state(Some(10));

        assert!(!state.has_db());
        assert!(state.lifecycle().is_none());
        assert_eq!(state.limiter.max_connections(), Some(10));
        assert!(!state.version.is_empty());
    }
}

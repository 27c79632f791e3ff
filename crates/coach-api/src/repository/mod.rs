//! 데이터베이스 리포지토리 모듈.
//!
//! 테이블별 정적 메서드 리포지토리. 모든 조회/갱신은 소유자(user_id)
//! 스코프를 쿼리 수준에서 강제합니다.

pub mod detected_setups;
pub mod tracked_setups;

pub use detected_setups::{DetectedSetupRecord, DetectedSetupRepository, NewDetectedSetup};
pub use tracked_setups::{
    NewTrackedSetup, SetupPushStats, TrackedSetupRecord, TrackedSetupRepository,
};

/// Postgres unique 제약 위반 여부.
///
/// 멱등 생성 경로에서 동시 삽입 경합을 식별하는 데 사용합니다.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

//! Tracked Setup Repository
//!
//! 추적 중인 셋업(`ai_coach_tracked_setups`) 관련 데이터베이스 연산을
//! 담당합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use coach_core::{SetupDirection, SetupStatus};

// ================================================================================================
// Types
// ================================================================================================

/// 추적 셋업 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TrackedSetupRecord {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub setup_type: String,
    /// 방향 문자열 (`bullish` / `bearish` / `neutral`)
    pub direction: String,
    /// 상태 문자열 (`active` / `triggered` / `invalidated` / `archived`)
    pub status: String,
    #[sqlx(default)]
    pub entry_price: Option<Decimal>,
    #[sqlx(default)]
    pub target_price: Option<Decimal>,
    #[sqlx(default)]
    pub stop_loss: Option<Decimal>,
    #[sqlx(default)]
    pub confidence: Option<Decimal>,
    /// 감지 기회 원본 ID (멱등 생성 키)
    #[sqlx(default)]
    pub source_opportunity_id: Option<Uuid>,
    #[sqlx(default)]
    pub notes: Option<String>,
    #[sqlx(default)]
    pub triggered_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub invalidated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedSetupRecord {
    /// 저장된 상태 문자열을 파싱합니다.
    pub fn parsed_status(&self) -> Result<SetupStatus, String> {
        self.status.parse()
    }
}

/// 새 추적 셋업 입력.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTrackedSetup {
    pub symbol: String,
    pub setup_type: String,
    pub direction: SetupDirection,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub target_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub confidence: Option<Decimal>,
    #[serde(default)]
    pub source_opportunity_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 하트비트용 활성 셋업 집계.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct SetupPushStats {
    pub active_setup_count: i64,
    pub unique_users: i64,
}

// ================================================================================================
// Repository
// ================================================================================================

/// Tracked Setup Repository
pub struct TrackedSetupRepository;

impl TrackedSetupRepository {
    /// 소유자 스코프로 셋업 조회.
    ///
    /// 다른 사용자의 셋업은 존재 여부와 무관하게 `None`입니다.
    pub async fn find_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<TrackedSetupRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, TrackedSetupRecord>(
            r#"
            SELECT * FROM ai_coach_tracked_setups
            WHERE id = $1 AND LOWER(user_id) = LOWER($2)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// 같은 감지 기회에서 생성된 활성 셋업 조회 (중복 감지).
    pub async fn find_active_by_source(
        pool: &PgPool,
        user_id: &str,
        source_opportunity_id: Uuid,
    ) -> Result<Option<TrackedSetupRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, TrackedSetupRecord>(
            r#"
            SELECT * FROM ai_coach_tracked_setups
            WHERE LOWER(user_id) = LOWER($1)
              AND source_opportunity_id = $2
              AND status = 'active'
            "#,
        )
        .bind(user_id)
        .bind(source_opportunity_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// 새 추적 셋업 생성 (상태 `active`).
    pub async fn insert_tracked(
        pool: &PgPool,
        user_id: &str,
        input: &NewTrackedSetup,
    ) -> Result<TrackedSetupRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, TrackedSetupRecord>(
            r#"
            INSERT INTO ai_coach_tracked_setups (
                user_id, symbol, setup_type, direction, status,
                entry_price, target_price, stop_loss, confidence,
                source_opportunity_id, notes
            )
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&input.symbol)
        .bind(&input.setup_type)
        .bind(input.direction.as_str())
        .bind(input.entry_price)
        .bind(input.target_price)
        .bind(input.stop_loss)
        .bind(input.confidence)
        .bind(input.source_opportunity_id)
        .bind(&input.notes)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// 상태 및 전이 타임스탬프 갱신.
    ///
    /// 두 타임스탬프 컬럼을 항상 함께 기록하여 이전 상태의 잔재를
    /// 남기지 않습니다.
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: SetupStatus,
        triggered_at: Option<DateTime<Utc>>,
        invalidated_at: Option<DateTime<Utc>>,
    ) -> Result<TrackedSetupRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, TrackedSetupRecord>(
            r#"
            UPDATE ai_coach_tracked_setups
            SET status = $2, triggered_at = $3, invalidated_at = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(triggered_at)
        .bind(invalidated_at)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// 노트 갱신.
    pub async fn update_notes(
        pool: &PgPool,
        id: Uuid,
        notes: &str,
    ) -> Result<TrackedSetupRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, TrackedSetupRecord>(
            r#"
            UPDATE ai_coach_tracked_setups
            SET notes = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(notes)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// 하트비트용 활성 셋업 집계.
    pub async fn active_stats(pool: &PgPool) -> Result<SetupPushStats, sqlx::Error> {
        let stats = sqlx::query_as::<_, SetupPushStats>(
            r#"
            SELECT
                COUNT(*) AS active_setup_count,
                COUNT(DISTINCT user_id) AS unique_users
            FROM ai_coach_tracked_setups
            WHERE status = 'active'
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_parsing() {
        let record = TrackedSetupRecord {
            id: Uuid::new_v4(),
            user_id: "user-123".to_string(),
            symbol: "AAPL".to_string(),
            setup_type: "breakout".to_string(),
            direction: "bullish".to_string(),
            status: "triggered".to_string(),
            entry_price: None,
            target_price: None,
            stop_loss: None,
            confidence: None,
            source_opportunity_id: None,
            notes: None,
            triggered_at: None,
            invalidated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(record.parsed_status().unwrap(), SetupStatus::Triggered);
    }

    #[test]
    fn test_record_corrupt_status() {
        let record = TrackedSetupRecord {
            id: Uuid::new_v4(),
            user_id: "user-123".to_string(),
            symbol: "AAPL".to_string(),
            setup_type: "breakout".to_string(),
            direction: "bullish".to_string(),
            status: "corrupted".to_string(),
            entry_price: None,
            target_price: None,
            stop_loss: None,
            confidence: None,
            source_opportunity_id: None,
            notes: None,
            triggered_at: None,
            invalidated_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(record.parsed_status().is_err());
    }

    #[test]
    fn test_new_tracked_setup_deserialization() {
        let json = r#"{
            "symbol": "AAPL",
            "setup_type": "breakout",
            "direction": "bullish",
            "target_price": "200.5"
        }"#;

        let input: NewTrackedSetup = serde_json::from_str(json).unwrap();
        assert_eq!(input.symbol, "AAPL");
        assert_eq!(input.direction, SetupDirection::Bullish);
        assert!(input.target_price.is_some());
        assert!(input.source_opportunity_id.is_none());
    }
}

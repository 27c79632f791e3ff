//! Detected Setup Repository
//!
//! 셋업 감지 레코드(`ai_coach_detected_setups`) 관련 데이터베이스 연산을
//! 담당합니다. 감지 레코드는 추적 셋업과 쌍으로 생성되며, 추적 셋업 생성이
//! 실패하면 보상 삭제로 쌍의 원자성을 유지합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use coach_core::SetupDirection;

// ================================================================================================
// Types
// ================================================================================================

/// 감지 셋업 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DetectedSetupRecord {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub setup_type: String,
    /// 방향 문자열 (`bullish` / `bearish` / `neutral`)
    pub direction: String,
    pub confidence: Decimal,
    #[sqlx(default)]
    pub entry_price: Option<Decimal>,
    #[sqlx(default)]
    pub target_price: Option<Decimal>,
    #[sqlx(default)]
    pub stop_loss: Option<Decimal>,
    #[sqlx(default)]
    pub current_price: Option<Decimal>,
    /// 감지 컨텍스트 (지표 스냅샷 등)
    #[sqlx(default)]
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
    pub detected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// 새 감지 셋업 입력.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewDetectedSetup {
    pub symbol: String,
    pub setup_type: String,
    pub direction: SetupDirection,
    pub confidence: Decimal,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub target_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
}

// ================================================================================================
// Repository
// ================================================================================================

/// Detected Setup Repository
pub struct DetectedSetupRepository;

impl DetectedSetupRepository {
    /// 감지 레코드 생성.
    pub async fn insert(
        pool: &PgPool,
        user_id: &str,
        input: &NewDetectedSetup,
    ) -> Result<DetectedSetupRecord, sqlx::Error> {
        let record = sqlx::query_as::<_, DetectedSetupRecord>(
            r#"
            INSERT INTO ai_coach_detected_setups (
                user_id, symbol, setup_type, direction, confidence,
                entry_price, target_price, stop_loss, current_price,
                metadata, detected_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&input.symbol)
        .bind(&input.setup_type)
        .bind(input.direction.as_str())
        .bind(input.confidence)
        .bind(input.entry_price)
        .bind(input.target_price)
        .bind(input.stop_loss)
        .bind(input.current_price)
        .bind(&input.metadata)
        .fetch_one(pool)
        .await?;

        Ok(record)
    }

    /// 감지 레코드 삭제 (보상 삭제 경로).
    ///
    /// # Returns
    ///
    /// 삭제된 행 수
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_coach_detected_setups WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

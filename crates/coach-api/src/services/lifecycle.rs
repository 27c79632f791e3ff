//! 셋업 라이프사이클 서비스.
//!
//! 상태 전이, 멱등 추적 생성, 감지 시뮬레이션을 담당합니다. 발행 규칙:
//! 실제 상태 변경은 정확히 한 번의 `setup_update`를 발행하고, 동일 상태
//! 재지정과 노트 전용 변경은 절대 발행하지 않습니다.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use coach_core::{transition_timestamps, SetupStatus, TransitionPlan, TransitionReason};

use crate::repository::{
    is_unique_violation, DetectedSetupRepository, NewDetectedSetup, NewTrackedSetup,
    TrackedSetupRecord, TrackedSetupRepository,
};
use crate::websocket::PushBus;

/// 라이프사이클 에러.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("셋업을 찾을 수 없습니다: {0}")]
    NotFound(Uuid),
    #[error("변경할 내용이 없습니다")]
    EmptyUpdate,
    #[error("저장된 셋업 상태가 손상되었습니다: {0}")]
    CorruptStatus(String),
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

/// 상태 전이 요청.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// 요청 상태 (없으면 노트 전용 변경)
    #[serde(default)]
    pub status: Option<SetupStatus>,
    /// 전이 사유 (없으면 `manual`)
    #[serde(default)]
    pub reason: Option<TransitionReason>,
    /// 평가 시점 가격
    #[serde(default)]
    pub current_price: Option<Decimal>,
    /// 노트
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransitionRequest {
    /// 아무 변경도 담지 않은 요청인지 확인.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.notes.is_none()
    }
}

/// 전이 결과.
#[derive(Debug)]
pub struct TransitionOutcome {
    /// 갱신된 레코드
    pub record: TrackedSetupRecord,
    /// `setup_update` 발행 여부
    pub published: bool,
}

/// 추적 생성 결과.
#[derive(Debug)]
pub struct TrackOutcome {
    /// 생성되었거나 기존에 존재하던 레코드
    pub record: TrackedSetupRecord,
    /// 기존 레코드 반환 여부 (멱등 경로)
    pub duplicate: bool,
}

/// 감지 시뮬레이션 결과.
#[derive(Debug)]
pub struct DetectionOutcome {
    /// 감지 레코드 ID
    pub detected_setup_id: Uuid,
    /// 생성된 추적 셋업
    pub tracked: TrackedSetupRecord,
}

/// 로드된 셋업과 전이 요청으로부터 수행할 변경을 결정합니다.
///
/// 상태 미지정(노트 전용 변경)과 동일 상태 재지정은 `NoChange`이며,
/// `NoChange`는 절대 발행하지 않습니다.
fn plan_for_request(current: SetupStatus, request: &TransitionRequest) -> TransitionPlan {
    match request.status {
        Some(requested) => TransitionPlan::plan(current, requested),
        None => TransitionPlan::NoChange,
    }
}

/// 감지 레코드로부터 파생되는 추적 셋업 입력을 만듭니다.
fn tracked_from_detection(detected_setup_id: Uuid, input: &NewDetectedSetup) -> NewTrackedSetup {
    NewTrackedSetup {
        symbol: input.symbol.clone(),
        setup_type: input.setup_type.clone(),
        direction: input.direction,
        entry_price: input.entry_price,
        target_price: input.target_price,
        stop_loss: input.stop_loss,
        confidence: Some(input.confidence),
        source_opportunity_id: Some(detected_setup_id),
        notes: Some("Auto-detected setup".to_string()),
    }
}

/// 셋업 라이프사이클 서비스.
pub struct SetupLifecycleService {
    pool: PgPool,
    bus: Arc<PushBus>,
}

impl SetupLifecycleService {
    pub fn new(pool: PgPool, bus: Arc<PushBus>) -> Self {
        Self { pool, bus }
    }

    /// 셋업 상태/노트 변경.
    ///
    /// 조회는 요청자 스코프로 수행되므로 타인의 셋업은 권한 에러가 아닌
    /// `NotFound`입니다. 노트는 상태와 독립적으로 영속화되며, 발행은
    /// 실제 상태 변경에서만 일어납니다.
    pub async fn transition(
        &self,
        setup_id: Uuid,
        requester_id: &str,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, LifecycleError> {
        if request.is_empty() {
            return Err(LifecycleError::EmptyUpdate);
        }

        let mut record = TrackedSetupRepository::find_for_user(&self.pool, setup_id, requester_id)
            .await?
            .ok_or(LifecycleError::NotFound(setup_id))?;

        let current = record
            .parsed_status()
            .map_err(LifecycleError::CorruptStatus)?;

        if let Some(notes) = &request.notes {
            record = TrackedSetupRepository::update_notes(&self.pool, record.id, notes).await?;
        }

        match plan_for_request(current, &request) {
            TransitionPlan::NoChange => Ok(TransitionOutcome {
                record,
                published: false,
            }),
            TransitionPlan::Change { previous, next } => {
                let (triggered_at, invalidated_at) = transition_timestamps(next, Utc::now());
                let record = TrackedSetupRepository::update_status(
                    &self.pool,
                    record.id,
                    next,
                    triggered_at,
                    invalidated_at,
                )
                .await?;

                let reason = request.reason.unwrap_or(TransitionReason::Manual);
                self.bus.publish_setup_update(
                    record.id,
                    &record.user_id,
                    &record.symbol,
                    &record.setup_type,
                    previous,
                    next,
                    request.current_price,
                    reason,
                );

                info!(
                    setup_id = %record.id,
                    user_id = %record.user_id,
                    previous = %previous,
                    status = %next,
                    %reason,
                    "Setup transitioned"
                );

                Ok(TransitionOutcome {
                    record,
                    published: true,
                })
            }
        }
    }

    /// 추적 셋업 생성 (`source_opportunity_id` 기준 멱등).
    ///
    /// 같은 기회에서 이미 생성된 활성 셋업이 있으면 에러 대신 기존
    /// 레코드를 `duplicate: true`로 반환합니다. 생성 자체는 이벤트를
    /// 발행하지 않습니다.
    pub async fn track(
        &self,
        requester_id: &str,
        input: NewTrackedSetup,
    ) -> Result<TrackOutcome, LifecycleError> {
        if let Some(source_id) = input.source_opportunity_id {
            if let Some(existing) =
                TrackedSetupRepository::find_active_by_source(&self.pool, requester_id, source_id)
                    .await?
            {
                return Ok(TrackOutcome {
                    record: existing,
                    duplicate: true,
                });
            }
        }

        match TrackedSetupRepository::insert_tracked(&self.pool, requester_id, &input).await {
            Ok(record) => Ok(TrackOutcome {
                record,
                duplicate: false,
            }),
            Err(e) if is_unique_violation(&e) => {
                // 동시 생성 경합 - 먼저 성공한 쪽의 레코드를 반환
                let source_id = input
                    .source_opportunity_id
                    .ok_or(LifecycleError::Database(e))?;
                let existing = TrackedSetupRepository::find_active_by_source(
                    &self.pool,
                    requester_id,
                    source_id,
                )
                .await?
                .ok_or(LifecycleError::NotFound(source_id))?;

                Ok(TrackOutcome {
                    record: existing,
                    duplicate: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 감지 시뮬레이션.
    ///
    /// 감지 레코드와 파생 추적 셋업을 쌍으로 생성합니다. 추적 셋업 생성이
    /// 실패하면 감지 레코드를 보상 삭제하여 고아 행을 남기지 않고, 성공
    /// 시에만 `setup_detected`를 발행합니다.
    pub async fn simulate_detection(
        &self,
        user_id: &str,
        input: NewDetectedSetup,
    ) -> Result<DetectionOutcome, LifecycleError> {
        let detected = DetectedSetupRepository::insert(&self.pool, user_id, &input).await?;

        let tracked_input = tracked_from_detection(detected.id, &input);
        let tracked =
            match TrackedSetupRepository::insert_tracked(&self.pool, user_id, &tracked_input).await
            {
                Ok(record) => record,
                Err(e) => {
                    // 보상 삭제 - 감지/추적 쌍은 호출자 관점에서 원자적
                    if let Err(delete_err) =
                        DetectedSetupRepository::delete(&self.pool, detected.id).await
                    {
                        warn!(
                            detected_setup_id = %detected.id,
                            error = %delete_err,
                            "Compensating delete of detected setup failed"
                        );
                    }
                    return Err(e.into());
                }
            };

        self.bus.publish_setup_detected(
            tracked.id,
            detected.id,
            user_id,
            &input.symbol,
            &input.setup_type,
            input.direction,
            input.confidence,
            input.current_price,
        );

        info!(
            detected_setup_id = %detected.id,
            tracked_setup_id = %tracked.id,
            user_id,
            symbol = %input.symbol,
            "Setup detection simulated"
        );

        Ok(DetectionOutcome {
            detected_setup_id: detected.id,
            tracked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::SetupDirection;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transition_request_empty_detection() {
        assert!(TransitionRequest::default().is_empty());

        let notes_only = TransitionRequest {
            notes: Some("memo".to_string()),
            ..Default::default()
        };
        assert!(!notes_only.is_empty());

        let status_only = TransitionRequest {
            status: Some(SetupStatus::Triggered),
            ..Default::default()
        };
        assert!(!status_only.is_empty());

        // reason/current_price만으로는 변경이 아님
        let reason_only = TransitionRequest {
            reason: Some(TransitionReason::TargetReached),
            current_price: Some(dec!(100)),
            ..Default::default()
        };
        assert!(reason_only.is_empty());
    }

    #[test]
    fn test_transition_request_deserialization() {
        let json = r#"{"status": "invalidated", "reason": "stop_loss_hit"}"#;
        let request: TransitionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.status, Some(SetupStatus::Invalidated));
        assert_eq!(request.reason, Some(TransitionReason::StopLossHit));
        assert!(request.notes.is_none());
    }

    #[test]
    fn test_plan_notes_only_never_publishes() {
        let request = TransitionRequest {
            notes: Some("memo".to_string()),
            ..Default::default()
        };

        for current in [
            SetupStatus::Active,
            SetupStatus::Triggered,
            SetupStatus::Invalidated,
            SetupStatus::Archived,
        ] {
            let plan = plan_for_request(current, &request);
            assert_eq!(plan, TransitionPlan::NoChange);
            assert!(!plan.publishes());
        }
    }

    #[test]
    fn test_plan_same_status_never_publishes() {
        let request = TransitionRequest {
            status: Some(SetupStatus::Triggered),
            notes: Some("still triggered".to_string()),
            ..Default::default()
        };

        assert!(!plan_for_request(SetupStatus::Triggered, &request).publishes());
    }

    #[test]
    fn test_plan_real_change_publishes() {
        let request = TransitionRequest {
            status: Some(SetupStatus::Triggered),
            ..Default::default()
        };

        let plan = plan_for_request(SetupStatus::Active, &request);
        assert_eq!(
            plan,
            TransitionPlan::Change {
                previous: SetupStatus::Active,
                next: SetupStatus::Triggered,
            }
        );
        assert!(plan.publishes());
    }

    #[test]
    fn test_tracked_from_detection_mapping() {
        let detected_id = Uuid::new_v4();
        let input = NewDetectedSetup {
            symbol: "NVDA".to_string(),
            setup_type: "breakout".to_string(),
            direction: SetupDirection::Bullish,
            confidence: dec!(0.91),
            entry_price: Some(dec!(120)),
            target_price: Some(dec!(135)),
            stop_loss: Some(dec!(112)),
            current_price: Some(dec!(121.5)),
            metadata: None,
        };

        let tracked = tracked_from_detection(detected_id, &input);

        assert_eq!(tracked.symbol, "NVDA");
        assert_eq!(tracked.direction, SetupDirection::Bullish);
        assert_eq!(tracked.confidence, Some(dec!(0.91)));
        assert_eq!(tracked.source_opportunity_id, Some(detected_id));
        assert_eq!(tracked.notes.as_deref(), Some("Auto-detected setup"));
    }
}

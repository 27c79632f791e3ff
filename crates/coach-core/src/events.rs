//! 푸시 이벤트 타입.
//!
//! 버스를 통해 WebSocket 게이트웨이로 전달되는 이벤트 정의.
//! 이벤트는 일시적입니다 - 저장되지 않고 재전송되지 않으며, 발행 시점에
//! 연결되어 있던 리스너에게만 전달됩니다.
//!
//! 와이어 필드명은 클라이언트 프로토콜을 따라 camelCase입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::setup::{SetupDirection, SetupStatus, TransitionReason};

/// 버스에서 전달되는 푸시 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// 주기적 하트비트 - 모든 연결에 무조건 전달
    Heartbeat(HeartbeatPayload),
    /// 셋업 상태 변경 - 소유자 채널 구독자에게만 전달
    SetupUpdate(SetupUpdatePayload),
    /// 새 셋업 감지 - 소유자 채널 구독자에게만 전달
    SetupDetected(SetupDetectedPayload),
}

impl PushEvent {
    /// 이벤트가 대상으로 하는 사용자 ID.
    ///
    /// 하트비트는 채널 대상이 없으므로 `None`입니다.
    pub fn target_user_id(&self) -> Option<&str> {
        match self {
            PushEvent::Heartbeat(_) => None,
            PushEvent::SetupUpdate(data) => Some(&data.user_id),
            PushEvent::SetupDetected(data) => Some(&data.user_id),
        }
    }
}

/// 하트비트 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    /// 생성 시각
    pub generated_at: DateTime<Utc>,
    /// 현재 활성 셋업 수
    pub active_setup_count: i64,
    /// 활성 셋업을 가진 고유 사용자 수
    pub unique_users: i64,
}

/// 셋업 상태 변경 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupUpdatePayload {
    /// 추적 셋업 ID
    pub setup_id: Uuid,
    /// 소유자 사용자 ID
    pub user_id: String,
    /// 심볼
    pub symbol: String,
    /// 셋업 유형 (예: "breakout", "pullback")
    pub setup_type: String,
    /// 이전 상태
    pub previous_status: SetupStatus,
    /// 새 상태
    pub status: SetupStatus,
    /// 평가 시점 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    /// 전이 사유
    pub reason: TransitionReason,
    /// 평가 시각
    pub evaluated_at: DateTime<Utc>,
}

/// 셋업 감지 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDetectedPayload {
    /// 생성된 추적 셋업 ID
    pub tracked_setup_id: Uuid,
    /// 감지 레코드 ID
    pub detected_setup_id: Uuid,
    /// 소유자 사용자 ID
    pub user_id: String,
    /// 심볼
    pub symbol: String,
    /// 셋업 유형
    pub setup_type: String,
    /// 방향
    pub direction: SetupDirection,
    /// 감지 신뢰도 (0.0 ~ 1.0)
    pub confidence: Decimal,
    /// 감지 시점 가격
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    /// 감지 시각
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_heartbeat_wire_format() {
        let event = PushEvent::Heartbeat(HeartbeatPayload {
            generated_at: Utc::now(),
            active_setup_count: 42,
            unique_users: 7,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"heartbeat""#));
        assert!(json.contains(r#""activeSetupCount":42"#));
        assert!(json.contains(r#""uniqueUsers":7"#));
        assert!(json.contains("generatedAt"));
    }

    #[test]
    fn test_setup_update_wire_format() {
        let event = PushEvent::SetupUpdate(SetupUpdatePayload {
            setup_id: Uuid::new_v4(),
            user_id: "user-123".to_string(),
            symbol: "AAPL".to_string(),
            setup_type: "breakout".to_string(),
            previous_status: SetupStatus::Active,
            status: SetupStatus::Triggered,
            current_price: Some(dec!(195.42)),
            reason: TransitionReason::TargetReached,
            evaluated_at: Utc::now(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"setup_update""#));
        assert!(json.contains(r#""previousStatus":"active""#));
        assert!(json.contains(r#""status":"triggered""#));
        assert!(json.contains(r#""reason":"target_reached""#));
        assert!(json.contains(r#""userId":"user-123""#));
    }

    #[test]
    fn test_setup_detected_omits_missing_price() {
        let event = PushEvent::SetupDetected(SetupDetectedPayload {
            tracked_setup_id: Uuid::new_v4(),
            detected_setup_id: Uuid::new_v4(),
            user_id: "user-123".to_string(),
            symbol: "TSLA".to_string(),
            setup_type: "pullback".to_string(),
            direction: SetupDirection::Bullish,
            confidence: dec!(0.82),
            current_price: None,
            detected_at: Utc::now(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"setup_detected""#));
        assert!(json.contains(r#""direction":"bullish""#));
        assert!(!json.contains("currentPrice"));
    }

    #[test]
    fn test_target_user_id() {
        let heartbeat = PushEvent::Heartbeat(HeartbeatPayload {
            generated_at: Utc::now(),
            active_setup_count: 0,
            unique_users: 0,
        });
        assert_eq!(heartbeat.target_user_id(), None);

        let update = PushEvent::SetupUpdate(SetupUpdatePayload {
            setup_id: Uuid::new_v4(),
            user_id: "USER-ABC".to_string(),
            symbol: "NVDA".to_string(),
            setup_type: "breakout".to_string(),
            previous_status: SetupStatus::Active,
            status: SetupStatus::Invalidated,
            current_price: None,
            reason: TransitionReason::StopLossHit,
            evaluated_at: Utc::now(),
        });
        assert_eq!(update.target_user_id(), Some("USER-ABC"));
    }
}

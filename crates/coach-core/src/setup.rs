//! 셋업 상태 및 상태 전이 규칙.
//!
//! 이 모듈은 추적 중인 셋업의 생명주기 타입을 정의합니다:
//! - `SetupStatus` - 셋업 상태 (활성, 트리거됨, 무효화됨, 보관됨)
//! - `SetupDirection` - 셋업 방향 (상승, 하락, 중립)
//! - `TransitionReason` - 상태 전이 사유
//! - `TransitionPlan` - 상태 전이 계획 (순수 상태 머신)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 셋업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum SetupStatus {
    /// 활성 - 조건 충족 여부를 감시 중
    Active,
    /// 트리거됨 - 목표 조건 도달
    Triggered,
    /// 무효화됨 - 손절 조건 도달 또는 무효 판정
    Invalidated,
    /// 보관됨 - 더 이상 평가하지 않음
    Archived,
}

impl SetupStatus {
    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupStatus::Active => "active",
            SetupStatus::Triggered => "triggered",
            SetupStatus::Invalidated => "invalidated",
            SetupStatus::Archived => "archived",
        }
    }

    /// 셋업이 여전히 평가 대상인지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(self, SetupStatus::Active)
    }
}

impl std::fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SetupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SetupStatus::Active),
            "triggered" => Ok(SetupStatus::Triggered),
            "invalidated" => Ok(SetupStatus::Invalidated),
            "archived" => Ok(SetupStatus::Archived),
            _ => Err(format!("Unknown setup status: {}", s)),
        }
    }
}

/// 셋업 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum SetupDirection {
    /// 상승 셋업
    Bullish,
    /// 하락 셋업
    Bearish,
    /// 중립 셋업
    Neutral,
}

impl SetupDirection {
    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupDirection::Bullish => "bullish",
            SetupDirection::Bearish => "bearish",
            SetupDirection::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SetupDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SetupDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullish" => Ok(SetupDirection::Bullish),
            "bearish" => Ok(SetupDirection::Bearish),
            "neutral" => Ok(SetupDirection::Neutral),
            _ => Err(format!("Unknown setup direction: {}", s)),
        }
    }
}

/// 상태 전이 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum TransitionReason {
    /// 목표가 도달
    TargetReached,
    /// 손절가 도달
    StopLossHit,
    /// 수동 변경 (REST API)
    Manual,
}

impl TransitionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionReason::TargetReached => "target_reached",
            TransitionReason::StopLossHit => "stop_loss_hit",
            TransitionReason::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==================== 상태 전이 계획 ====================

/// 상태 전이 계획.
///
/// 현재 상태와 요청된 상태로부터 수행할 변경을 결정하는 순수 상태 머신입니다.
/// 영속화나 이벤트 발행은 호출자의 책임입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// 요청 상태가 현재 상태와 동일 - 아무것도 변경하지 않고 발행하지 않음
    NoChange,
    /// 실제 상태 변경 - 타임스탬프 갱신 규칙 포함
    Change {
        /// 이전 상태
        previous: SetupStatus,
        /// 새 상태
        next: SetupStatus,
    },
}

impl TransitionPlan {
    /// 현재 상태에서 요청된 상태로의 전이를 계획합니다.
    ///
    /// 동일 상태 재지정은 `NoChange`로, 그 외에는 `Change`로 반환합니다.
    /// 모든 상태 간 전이가 허용됩니다 (수동 보정 경로 포함).
    pub fn plan(current: SetupStatus, requested: SetupStatus) -> Self {
        if current == requested {
            TransitionPlan::NoChange
        } else {
            TransitionPlan::Change {
                previous: current,
                next: requested,
            }
        }
    }

    /// 이 계획이 `setup_update` 이벤트 발행을 요구하는지 여부.
    pub fn publishes(&self) -> bool {
        matches!(self, TransitionPlan::Change { .. })
    }
}

/// 새 상태 진입 시 기록할 타임스탬프 쌍 `(triggered_at, invalidated_at)`.
///
/// 규칙:
/// - `triggered` 진입: `triggered_at = now`, `invalidated_at`은 비움
/// - `invalidated` 진입: `invalidated_at = now`, `triggered_at`은 비움
/// - `active` / `archived` 진입: 둘 다 비움
pub fn transition_timestamps(
    next: SetupStatus,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match next {
        SetupStatus::Triggered => (Some(now), None),
        SetupStatus::Invalidated => (None, Some(now)),
        SetupStatus::Active | SetupStatus::Archived => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SetupStatus::Active,
            SetupStatus::Triggered,
            SetupStatus::Invalidated,
            SetupStatus::Archived,
        ] {
            let parsed = SetupStatus::from_str(status.as_str()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_status_unknown() {
        assert!(SetupStatus::from_str("pending").is_err());
        assert!(SetupStatus::from_str("").is_err());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&SetupStatus::Invalidated).unwrap();
        assert_eq!(json, r#""invalidated""#);

        let status: SetupStatus = serde_json::from_str(r#""triggered""#).unwrap();
        assert_eq!(status, SetupStatus::Triggered);
    }

    #[test]
    fn test_direction_roundtrip() {
        for direction in [
            SetupDirection::Bullish,
            SetupDirection::Bearish,
            SetupDirection::Neutral,
        ] {
            let parsed = SetupDirection::from_str(direction.as_str()).unwrap();
            assert_eq!(parsed, direction);
        }
    }

    #[test]
    fn test_plan_same_status_is_no_change() {
        for status in [
            SetupStatus::Active,
            SetupStatus::Triggered,
            SetupStatus::Invalidated,
            SetupStatus::Archived,
        ] {
            let plan = TransitionPlan::plan(status, status);
            assert_eq!(plan, TransitionPlan::NoChange);
            assert!(!plan.publishes());
        }
    }

    #[test]
    fn test_plan_real_change_publishes() {
        let plan = TransitionPlan::plan(SetupStatus::Active, SetupStatus::Triggered);
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
    fn test_timestamps_triggered() {
        let now = Utc::now();
        let (triggered_at, invalidated_at) = transition_timestamps(SetupStatus::Triggered, now);
        assert_eq!(triggered_at, Some(now));
        assert_eq!(invalidated_at, None);
    }

    #[test]
    fn test_timestamps_invalidated() {
        let now = Utc::now();
        let (triggered_at, invalidated_at) = transition_timestamps(SetupStatus::Invalidated, now);
        assert_eq!(triggered_at, None);
        assert_eq!(invalidated_at, Some(now));
    }

    #[test]
    fn test_timestamps_cleared_on_active_and_archived() {
        let now = Utc::now();
        for status in [SetupStatus::Active, SetupStatus::Archived] {
            let (triggered_at, invalidated_at) = transition_timestamps(status, now);
            assert_eq!(triggered_at, None);
            assert_eq!(invalidated_at, None);
        }
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(TransitionReason::TargetReached.as_str(), "target_reached");
        assert_eq!(TransitionReason::StopLossHit.as_str(), "stop_loss_hit");
        assert_eq!(TransitionReason::Manual.as_str(), "manual");
    }
}

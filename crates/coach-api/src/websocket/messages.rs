//! WebSocket 메시지 타입.
//!
//! 클라이언트-서버 간 교환되는 메시지 정의. 클라이언트와 서버 메시지는
//! 닫힌 태그드 유니온이며, 알 수 없는 타입은 파싱 단계에서 거부됩니다.

use serde::{Deserialize, Serialize};

use coach_core::{HeartbeatPayload, SetupDetectedPayload, SetupUpdatePayload};

/// WebSocket close code 정의.
///
/// 4000번대는 애플리케이션 정의 코드입니다.
pub mod close_code {
    /// 인증 실패
    pub const UNAUTHORIZED: u16 = 4401;
    /// 서버 수용량 초과
    pub const CAPACITY: u16 = 4429;
}

/// WebSocket 에러.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("잘못된 메시지 형식: {0}")]
    InvalidMessage(String),
    #[error("직렬화 실패: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// ==================== 클라이언트 → 서버 메시지 ====================

/// 클라이언트에서 서버로 보내는 메시지.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 채널 구독
    Subscribe {
        /// 구독할 채널 목록
        channels: Vec<String>,
    },
}

impl ClientMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        serde_json::from_str(json).map_err(|e| WsError::InvalidMessage(e.to_string()))
    }
}

// ==================== 서버 → 클라이언트 메시지 ====================

/// 서버에서 클라이언트로 보내는 메시지.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 주기적 하트비트 (모든 연결)
    Heartbeat {
        /// 하트비트 페이로드
        payload: HeartbeatPayload,
    },
    /// 셋업 상태 변경 (구독 채널)
    SetupUpdate {
        /// 대상 채널
        channel: String,
        /// 이벤트 데이터
        data: SetupUpdatePayload,
    },
    /// 셋업 감지 (구독 채널)
    SetupDetected {
        /// 대상 채널
        channel: String,
        /// 이벤트 데이터
        data: SetupDetectedPayload,
    },
    /// 에러
    Error {
        /// 에러 메시지
        message: String,
    },
}

impl ServerMessage {
    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::from)
    }

    /// 에러 메시지 생성 헬퍼.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_client_message_subscribe() {
        let json = r#"{"type": "subscribe", "channels": ["setups:user-123"]}"#;
        let msg = ClientMessage::from_json(json).unwrap();

        match msg {
            ClientMessage::Subscribe { channels } => {
                assert_eq!(channels, vec!["setups:user-123"]);
            }
        }
    }

    #[test]
    fn test_client_message_unknown_type_rejected() {
        // unsubscribe는 프로토콜에 없음
        let json = r#"{"type": "unsubscribe", "channels": ["setups:user-123"]}"#;
        assert!(ClientMessage::from_json(json).is_err());

        let json = r#"{"type": "ping"}"#;
        assert!(ClientMessage::from_json(json).is_err());
    }

    #[test]
    fn test_client_message_invalid_json() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"channels": []}"#).is_err());
    }

    #[test]
    fn test_server_heartbeat_serialization() {
        let msg = ServerMessage::Heartbeat {
            payload: HeartbeatPayload {
                generated_at: Utc::now(),
                active_setup_count: 3,
                unique_users: 2,
            },
        };
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""type":"heartbeat""#));
        assert!(json.contains(r#""activeSetupCount":3"#));
    }

    #[test]
    fn test_server_error_message() {
        let msg = ServerMessage::error("Forbidden channel: setups:other-user");
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("Forbidden channel: setups:other-user"));
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(close_code::UNAUTHORIZED, 4401);
        assert_eq!(close_code::CAPACITY, 4429);
    }
}

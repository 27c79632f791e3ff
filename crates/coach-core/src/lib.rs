//! # Coach Core
//!
//! 셋업 알림 푸시 파이프라인의 핵심 도메인 모델을 제공합니다.
//!
//! 이 크레이트는 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 셋업 상태 및 상태 전이 규칙
//! - 푸시 이벤트 (하트비트, 셋업 업데이트, 셋업 감지)
//! - 구독 채널 문법 및 권한 검사

pub mod channel;
pub mod events;
pub mod setup;

pub use channel::*;
pub use events::*;
pub use setup::*;

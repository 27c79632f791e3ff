//! 서비스 모듈.
//!
//! 리포지토리와 푸시 버스를 묶는 도메인 서비스.

pub mod heartbeat;
pub mod lifecycle;

pub use heartbeat::{start_heartbeat_publisher, DEFAULT_HEARTBEAT_INTERVAL};
pub use lifecycle::{
    DetectionOutcome, LifecycleError, SetupLifecycleService, TrackOutcome, TransitionOutcome,
    TransitionRequest,
};

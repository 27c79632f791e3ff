//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! WebSocket 연결 및 푸시 파이프라인 메트릭을 수집하고 `/metrics`
//! 엔드포인트로 노출합니다.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 패닉
///
/// 레코더가 이미 설치되어 있으면 패닉합니다.
pub fn setup_metrics_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("히스토그램 버킷 설정 실패")
        .install_recorder()
        .expect("Prometheus 레코더 설치 실패")
}

// ============================================================================
// WebSocket 메트릭 헬퍼 함수
// ============================================================================

/// WebSocket 연결 수 증가.
pub fn increment_websocket_connections() {
    gauge!("websocket_connections_active").increment(1.0);
}

/// WebSocket 연결 수 감소.
pub fn decrement_websocket_connections() {
    gauge!("websocket_connections_active").decrement(1.0);
}

/// 수용량 초과로 거부된 연결 카운터 증가.
pub fn record_admission_rejected() {
    counter!("websocket_admissions_rejected_total").increment(1);
}

/// 인증 실패로 종료된 연결 카운터 증가.
pub fn record_auth_rejected() {
    counter!("websocket_auth_rejected_total").increment(1);
}

// ============================================================================
// 푸시 버스 메트릭 헬퍼 함수
// ============================================================================

/// 발행된 푸시 이벤트 카운터 증가.
pub fn record_event_published(kind: &str) {
    counter!("push_events_published_total", "kind" => kind.to_string()).increment(1);
}

/// 리스너 큐 포화로 유실된 프레임 카운터 증가.
pub fn record_frame_dropped() {
    counter!("push_frames_dropped_total").increment(1);
}

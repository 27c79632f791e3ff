//! 하트비트 발행기.
//!
//! 주기적으로 활성 셋업 집계를 조회해 버스에 하트비트를 발행하는 배경
//! 태스크입니다. 게이트웨이는 하트비트를 일반 버스 이벤트로만 취급하며,
//! 집계 조회 실패는 해당 비트를 건너뛸 뿐 다른 이벤트 전달에 영향을
//! 주지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::TrackedSetupRepository;
use crate::websocket::PushBus;

/// 기본 하트비트 주기.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// 하트비트 발행 태스크를 시작합니다.
///
/// # Arguments
///
/// * `pool` - 집계 조회용 데이터베이스 풀
/// * `bus` - 발행 대상 버스
/// * `interval` - 발행 주기
/// * `shutdown` - 종료 토큰
pub fn start_heartbeat_publisher(
    pool: PgPool,
    bus: Arc<PushBus>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Heartbeat publisher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Heartbeat publisher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match TrackedSetupRepository::active_stats(&pool).await {
                        Ok(stats) => {
                            debug!(
                                active_setup_count = stats.active_setup_count,
                                unique_users = stats.unique_users,
                                "Publishing heartbeat"
                            );
                            bus.publish_heartbeat(stats.active_setup_count, stats.unique_users);
                        }
                        Err(e) => {
                            // 집계 실패는 이번 비트만 건너뜀
                            warn!("Heartbeat stats query failed, skipping beat: {}", e);
                        }
                    }
                }
            }
        }
    })
}

//! 인프로세스 푸시 버스.
//!
//! 생산자(라이프사이클 서비스, 하트비트 발행기)와 리스너(WebSocket 연결)
//! 사이의 팬아웃 계층입니다. 단일 디스패처 태스크가 생산자 큐를 읽어
//! 리스너별 유한 큐로 복제합니다.
//!
//! 전달 보장은 at-most-once입니다. 백로그가 없으므로 구독 이전에 발행된
//! 이벤트는 전달되지 않습니다. 리스너 큐가 가득 차면 해당 리스너의 해당
//! 프레임만 유실되고 (drop-new), 다른 리스너 전달에는 영향이 없습니다.
//! 리스너 간 전달 순서는 보장하지 않으며, 리스너별 FIFO만 보장합니다.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use coach_core::{
    HeartbeatPayload, PushEvent, SetupDetectedPayload, SetupDirection, SetupStatus,
    SetupUpdatePayload, TransitionReason,
};

use crate::metrics::{record_event_published, record_frame_dropped};

/// 리스너 레지스트리 타입.
type ListenerMap = Arc<RwLock<HashMap<u64, mpsc::Sender<PushEvent>>>>;

/// 푸시 버스 설정.
#[derive(Debug, Clone)]
pub struct PushBusConfig {
    /// 생산자 큐 용량
    pub producer_capacity: usize,
    /// 리스너별 큐 용량
    pub listener_capacity: usize,
}

impl Default for PushBusConfig {
    fn default() -> Self {
        Self {
            producer_capacity: 256,
            listener_capacity: 64,
        }
    }
}

/// 인프로세스 푸시 버스.
///
/// 전역 상태가 아니며, 생성 후 필요한 곳에 핸들을 주입합니다.
pub struct PushBus {
    producer_tx: mpsc::Sender<PushEvent>,
    listeners: ListenerMap,
    next_id: AtomicU64,
    listener_capacity: usize,
    shutdown: CancellationToken,
}

impl PushBus {
    /// 버스를 생성하고 디스패처 태스크를 시작합니다.
    pub fn new(config: PushBusConfig) -> Arc<Self> {
        let (producer_tx, producer_rx) = mpsc::channel(config.producer_capacity);
        let listeners: ListenerMap = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        tokio::spawn(dispatch_loop(
            producer_rx,
            listeners.clone(),
            shutdown.clone(),
        ));

        Arc::new(Self {
            producer_tx,
            listeners,
            next_id: AtomicU64::new(0),
            listener_capacity: config.listener_capacity,
            shutdown,
        })
    }

    /// 새 리스너를 등록합니다.
    ///
    /// 반환된 구독이 드롭되면 리스너는 해지됩니다. 구독 이전에 발행된
    /// 이벤트는 수신하지 못합니다.
    pub fn subscribe(&self) -> BusSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.listener_capacity);

        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        trace!(listener_id = id, "Bus listener registered");

        BusSubscription {
            id,
            receiver: rx,
            listeners: self.listeners.clone(),
        }
    }

    /// 현재 등록된 리스너 수.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 이벤트를 발행합니다.
    ///
    /// 리스너가 없으면 무해한 no-op입니다. 생산자 큐가 가득 차도 생산자를
    /// 실패시키지 않고 경고 후 버립니다.
    pub fn publish(&self, event: PushEvent) {
        let kind = match &event {
            PushEvent::Heartbeat(_) => "heartbeat",
            PushEvent::SetupUpdate(_) => "setup_update",
            PushEvent::SetupDetected(_) => "setup_detected",
        };
        record_event_published(kind);

        if let Err(e) = self.producer_tx.try_send(event) {
            warn!(kind, error = %e, "Push bus producer queue rejected event");
        }
    }

    /// 하트비트 발행 헬퍼.
    pub fn publish_heartbeat(&self, active_setup_count: i64, unique_users: i64) {
        self.publish(PushEvent::Heartbeat(HeartbeatPayload {
            generated_at: Utc::now(),
            active_setup_count,
            unique_users,
        }));
    }

    /// 셋업 상태 변경 발행 헬퍼.
    #[allow(clippy::too_many_arguments)]
    pub fn publish_setup_update(
        &self,
        setup_id: Uuid,
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        setup_type: impl Into<String>,
        previous_status: SetupStatus,
        status: SetupStatus,
        current_price: Option<Decimal>,
        reason: TransitionReason,
    ) {
        self.publish(PushEvent::SetupUpdate(SetupUpdatePayload {
            setup_id,
            user_id: user_id.into(),
            symbol: symbol.into(),
            setup_type: setup_type.into(),
            previous_status,
            status,
            current_price,
            reason,
            evaluated_at: Utc::now(),
        }));
    }

    /// 셋업 감지 발행 헬퍼.
    #[allow(clippy::too_many_arguments)]
    pub fn publish_setup_detected(
        &self,
        tracked_setup_id: Uuid,
        detected_setup_id: Uuid,
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        setup_type: impl Into<String>,
        direction: SetupDirection,
        confidence: Decimal,
        current_price: Option<Decimal>,
    ) {
        self.publish(PushEvent::SetupDetected(SetupDetectedPayload {
            tracked_setup_id,
            detected_setup_id,
            user_id: user_id.into(),
            symbol: symbol.into(),
            setup_type: setup_type.into(),
            direction,
            confidence,
            current_price,
            detected_at: Utc::now(),
        }));
    }

    /// 디스패처를 중지합니다.
    ///
    /// 이후 발행되는 이벤트는 전달되지 않습니다.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// 버스 구독.
///
/// 드롭 시 리스너 레지스트리에서 해지됩니다.
pub struct BusSubscription {
    id: u64,
    receiver: mpsc::Receiver<PushEvent>,
    listeners: ListenerMap,
}

impl BusSubscription {
    /// 다음 이벤트를 수신합니다.
    ///
    /// 버스가 종료되면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.receiver.recv().await
    }

    /// 리스너 ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        trace!(listener_id = self.id, "Bus listener deregistered");
    }
}

/// 디스패처 루프.
///
/// 생산자 큐를 읽어 각 리스너 큐로 복제합니다. 리스너 하나의 실패
/// (큐 포화, 수신자 종료)는 해당 리스너에만 국한됩니다.
async fn dispatch_loop(
    mut producer_rx: mpsc::Receiver<PushEvent>,
    listeners: ListenerMap,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Push bus dispatcher stopped");
                return;
            }
            maybe = producer_rx.recv() => match maybe {
                Some(event) => event,
                None => {
                    debug!("Push bus producer queue closed");
                    return;
                }
            },
        };

        // 스냅샷 후 락 없이 전달 - 전달 중 구독/해지와 경합하지 않음
        let targets: Vec<(u64, mpsc::Sender<PushEvent>)> = {
            let guard = listeners.read().unwrap_or_else(PoisonError::into_inner);
            guard.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        for (listener_id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    record_frame_dropped();
                    warn!(listener_id, "Listener queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // 드롭 레이스 - 다음 이벤트 전에는 해지됨
                    debug!(listener_id, "Listener queue closed, skipping");
                }
            }
        }
    }
}

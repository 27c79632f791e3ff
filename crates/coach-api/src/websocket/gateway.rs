//! WebSocket 연결 게이트웨이.
//!
//! 연결 수용 → 인증 → 구독/전달 → 정리의 단방향 생명주기를 구현합니다.
//!
//! - 수용량 검사는 인증보다 먼저 수행되며, 거부 시 검증기는 호출되지
//!   않고 close code 4429로 즉시 종료합니다.
//! - 인증 실패 시 에러 프레임 하나를 보낸 뒤 close code 4401로
//!   종료합니다.
//! - 인증 이후 연결의 신원은 변경되지 않으며, 구독 집합은 명시적으로
//!   허가된 구독으로만 늘어납니다.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use coach_core::{authorize, normalize_channel, setup_channel, PushEvent};

use super::admission::AdmissionPermit;
use super::bus::BusSubscription;
use super::messages::{close_code, ClientMessage, ServerMessage};
use crate::auth::{AuthError, Identity, IdentityVerifier};
use crate::metrics::{
    decrement_websocket_connections, increment_websocket_connections, record_admission_rejected,
    record_auth_rejected,
};
use crate::state::AppState;

/// 연결당 구독 채널 상한.
const MAX_SUBSCRIPTIONS: usize = 10;

/// 연결당 발신 큐 용량 (에러 프레임 등 수신 태스크발 메시지).
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// 연결별 구독 집합.
type SubscriptionSet = Arc<RwLock<HashSet<String>>>;

/// WebSocket 업그레이드 쿼리.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT 토큰
    pub token: Option<String>,
}

/// WebSocket 라우터 생성.
///
/// # 엔드포인트
///
/// `GET /ws/setups?token=<jwt>` (상위에서 `/ws/setups`로 nest)
pub fn websocket_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(websocket_handler))
}

/// WebSocket 업그레이드 핸들러.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// 수용 + 인증 결과.
enum Admission {
    /// 수용량 초과 - 4429로 종료, 검증기 미호출
    AtCapacity,
    /// 인증 실패 - 에러 프레임 후 4401로 종료
    Unauthorized(AuthError),
    /// 연결 허용
    Open(Identity, AdmissionPermit),
}

/// 수용량 검사 후 인증을 수행합니다.
///
/// 수용량 검사가 먼저입니다. 거부된 연결에 대해서는 검증기를 호출하지
/// 않습니다.
async fn admit_and_authenticate(state: &AppState, token: Option<String>) -> Admission {
    let Some(permit) = state.limiter.try_admit() else {
        return Admission::AtCapacity;
    };

    match authenticate(state.verifier.as_ref(), token).await {
        Ok(identity) => Admission::Open(identity, permit),
        Err(e) => Admission::Unauthorized(e),
    }
}

/// 토큰을 검증합니다. 토큰 누락/공백은 검증기 호출 없이 실패합니다.
async fn authenticate(
    verifier: &dyn IdentityVerifier,
    token: Option<String>,
) -> Result<Identity, AuthError> {
    match token {
        Some(token) if !token.is_empty() => verifier.verify(&token).await,
        _ => Err(AuthError::missing_token()),
    }
}

/// WebSocket 연결 처리.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let (identity, permit) = match admit_and_authenticate(&state, token).await {
        Admission::AtCapacity => {
            record_admission_rejected();
            debug!("WebSocket rejected: server at capacity");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::CAPACITY,
                    reason: "Server at capacity".into(),
                })))
                .await;
            return;
        }
        Admission::Unauthorized(e) => {
            record_auth_rejected();
            warn!(status = e.status_code, "WebSocket auth failed: {}", e.client_message);
            if let Ok(json) = ServerMessage::error(&e.client_message).to_json() {
                let _ = socket.send(Message::Text(json.into())).await;
            }
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::UNAUTHORIZED,
                    reason: e.client_message.into(),
                })))
                .await;
            return;
        }
        Admission::Open(identity, permit) => (identity, permit),
    };

    let connection_id = uuid::Uuid::new_v4().to_string();
    info!(connection_id = %connection_id, user_id = %identity.id, "WebSocket connected");
    increment_websocket_connections();

    let subscriptions: SubscriptionSet = Arc::new(RwLock::new(HashSet::new()));
    let bus_subscription = state.push_bus.subscribe();

    // 수신 태스크가 보낼 에러 프레임용 발신 큐 (싱크는 전송 태스크 소유)
    let (out_tx, out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE_CAPACITY);

    let (sender, mut receiver) = socket.split();

    // 버스 이벤트 + 발신 큐 → 소켓 전송 태스크
    let send_subscriptions = subscriptions.clone();
    let mut send_task = tokio::spawn(send_loop(
        sender,
        bus_subscription,
        out_rx,
        send_subscriptions,
    ));

    // 클라이언트 메시지 수신 태스크
    let recv_identity = identity.clone();
    let recv_subscriptions = subscriptions.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_client_message(
                        &recv_connection_id,
                        msg,
                        &recv_identity,
                        &recv_subscriptions,
                        &out_tx,
                    )
                    .await
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(connection_id = %recv_connection_id, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    // 한쪽 태스크가 끝나면 다른 쪽을 중단
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    // 버스 구독은 전송 태스크와 함께 드롭되어 해지되고, 수용 슬롯은 여기서
    // 정확히 한 번 반환됨
    drop(permit);
    decrement_websocket_connections();
    info!(connection_id = %connection_id, user_id = %identity.id, "WebSocket disconnected");
}

/// 전송 루프.
///
/// 버스 이벤트를 구독 집합으로 필터링해 전달하고, 수신 태스크가 보낸
/// 메시지(에러 프레임)를 함께 전송합니다. 소스별 FIFO가 유지됩니다.
async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut bus_subscription: BusSubscription,
    mut out_rx: mpsc::Receiver<ServerMessage>,
    subscriptions: SubscriptionSet,
) {
    loop {
        let message = tokio::select! {
            maybe = bus_subscription.recv() => match maybe {
                Some(event) => match route_event(event, &subscriptions).await {
                    Some(message) => message,
                    None => continue,
                },
                // 버스 종료
                None => break,
            },
            maybe = out_rx.recv() => match maybe {
                Some(message) => message,
                // 수신 태스크 종료
                None => break,
            },
        };

        match message.to_json() {
            Ok(json) => {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to serialize server message: {}", e);
            }
        }
    }
}

/// 버스 이벤트를 이 연결에 전달할 메시지로 변환합니다.
///
/// 하트비트는 무조건, 셋업 이벤트는 소유자 채널을 구독 중일 때만
/// 전달합니다.
async fn route_event(event: PushEvent, subscriptions: &SubscriptionSet) -> Option<ServerMessage> {
    match event {
        PushEvent::Heartbeat(payload) => Some(ServerMessage::Heartbeat { payload }),
        PushEvent::SetupUpdate(data) => {
            let channel = setup_channel(&data.user_id);
            if subscriptions.read().await.contains(&channel) {
                Some(ServerMessage::SetupUpdate { channel, data })
            } else {
                None
            }
        }
        PushEvent::SetupDetected(data) => {
            let channel = setup_channel(&data.user_id);
            if subscriptions.read().await.contains(&channel) {
                Some(ServerMessage::SetupDetected { channel, data })
            } else {
                None
            }
        }
    }
}

/// 클라이언트 메시지 처리.
///
/// # Returns
///
/// `true`면 연결 유지, `false`면 연결 종료
async fn handle_client_message(
    connection_id: &str,
    msg: Message,
    identity: &Identity,
    subscriptions: &SubscriptionSet,
    out_tx: &mpsc::Sender<ServerMessage>,
) -> bool {
    match msg {
        Message::Text(text) => {
            match ClientMessage::from_json(&text) {
                Ok(ClientMessage::Subscribe { channels }) => {
                    for raw in channels {
                        handle_subscribe(connection_id, &raw, identity, subscriptions, out_tx)
                            .await;
                    }
                }
                Err(e) => {
                    debug!(connection_id, "Invalid client message: {}", e);
                    let _ = out_tx
                        .send(ServerMessage::error("Invalid message format"))
                        .await;
                }
            }
            true
        }
        Message::Binary(_) => {
            warn!(connection_id, "Binary messages not supported");
            true
        }
        Message::Ping(_) => true,
        Message::Pong(_) => true,
        Message::Close(_) => {
            debug!(connection_id, "Close message received");
            false
        }
    }
}

/// 채널 하나에 대한 구독 요청 처리.
///
/// 실패(잘못된 형식, 권한 없음, 상한 초과)는 에러 프레임으로 응답하며
/// 연결은 유지됩니다. 이미 구독 중인 채널은 무해한 no-op입니다.
async fn handle_subscribe(
    connection_id: &str,
    raw: &str,
    identity: &Identity,
    subscriptions: &SubscriptionSet,
    out_tx: &mpsc::Sender<ServerMessage>,
) {
    let Some(channel) = normalize_channel(raw) else {
        debug!(connection_id, channel = raw, "Invalid channel shape");
        let _ = out_tx
            .send(ServerMessage::error(format!("Invalid channel: {}", raw)))
            .await;
        return;
    };

    if !authorize(&identity.id, &channel) {
        warn!(connection_id, user_id = %identity.id, channel = %channel, "Forbidden channel subscription");
        let _ = out_tx
            .send(ServerMessage::error(format!(
                "Forbidden channel: {}",
                channel
            )))
            .await;
        return;
    }

    let mut guard = subscriptions.write().await;
    if guard.contains(&channel) {
        return;
    }
    if guard.len() >= MAX_SUBSCRIPTIONS {
        let _ = out_tx
            .send(ServerMessage::error(format!(
                "Maximum {} subscriptions allowed",
                MAX_SUBSCRIPTIONS
            )))
            .await;
        return;
    }

    guard.insert(channel.clone());
    debug!(connection_id, channel = %channel, "Channel subscribed");
}

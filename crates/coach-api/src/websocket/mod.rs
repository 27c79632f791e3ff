//! WebSocket 푸시 모듈.
//!
//! 연결 게이트웨이, 푸시 버스, 수용량 제어, 와이어 메시지 타입을 제공합니다.

pub mod admission;
pub mod bus;
pub mod gateway;
pub mod messages;

pub use admission::{AdmissionPermit, ConnectionLimiter};
pub use bus::{BusSubscription, PushBus, PushBusConfig};
pub use gateway::websocket_router;
pub use messages::{close_code, ClientMessage, ServerMessage, WsError};

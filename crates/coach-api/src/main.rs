//! Coach API 서버 실행 바이너리.
//!
//! 환경변수 설정을 읽고 REST API + WebSocket 푸시 서버를 기동합니다.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use coach_api::openapi::swagger_ui_router;
use coach_api::routes::create_api_router;
use coach_api::services::{start_heartbeat_publisher, DEFAULT_HEARTBEAT_INTERVAL};
use coach_api::state::AppState;
use coach_api::websocket::{websocket_router, ConnectionLimiter, PushBus, PushBusConfig};
use coach_api::{setup_metrics_recorder, JwtVerifier};

// ================================================================================================
// Configuration
// ================================================================================================

/// 서버 설정.
#[derive(Debug, Clone)]
struct ServerConfig {
    host: String,
    port: u16,
    /// WebSocket 동시 연결 상한 (None이면 무제한)
    max_ws_connections: Option<usize>,
    heartbeat_interval: Duration,
}

impl ServerConfig {
    /// 환경변수에서 설정을 로드합니다.
    ///
    /// 파싱 실패 시 기본값을 사용합니다 (서버 기동을 막지 않음).
    fn from_env() -> Self {
        let host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        // 미설정, 0, 파싱 불가는 모두 무제한으로 취급
        let max_ws_connections = std::env::var("WS_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0);

        let heartbeat_interval = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL);

        Self {
            host,
            port,
            max_ws_connections,
            heartbeat_interval,
        }
    }

    fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ================================================================================================
// Application State
// ================================================================================================

/// 애플리케이션 상태를 생성합니다.
///
/// DATABASE_URL이 없거나 연결에 실패해도 서버는 기동합니다.
/// 이 경우 셋업 관리 API는 503을 반환하고 하트비트는 생략됩니다.
async fn create_app_state(config: &ServerConfig) -> Arc<AppState> {
    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        warn!("JWT_SECRET not set, using insecure default (development only)");
        "coach-dev-secret-do-not-use-in-production".to_string()
    });

    let push_bus = PushBus::new(PushBusConfig::default());
    let limiter = Arc::new(ConnectionLimiter::new(config.max_ws_connections));
    let verifier = Arc::new(JwtVerifier::new(jwt_secret));

    match config.max_ws_connections {
        Some(n) => info!("WebSocket connection ceiling: {}", n),
        None => info!("WebSocket connection ceiling: unbounded"),
    }

    let state = AppState::new(push_bus, limiter, verifier);

    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            match PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&database_url)
                .await
            {
                Ok(pool) => match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
                    Ok(_) => {
                        info!("Database connection established");
                        Arc::new(state.with_db_pool(pool))
                    }
                    Err(e) => {
                        warn!("Database probe failed, continuing without database: {}", e);
                        Arc::new(state)
                    }
                },
                Err(e) => {
                    warn!("Database connection failed, continuing without database: {}", e);
                    Arc::new(state)
                }
            }
        }
        Err(_) => {
            warn!("DATABASE_URL not set, database features will be disabled");
            Arc::new(state)
        }
    }
}

// ================================================================================================
// Router
// ================================================================================================

/// CORS 레이어를 생성합니다.
///
/// CORS_ORIGINS 환경변수 (콤마 구분)로 허용 오리진을 제한합니다.
/// 미설정 시 모든 오리진을 허용합니다 (개발 편의).
fn cors_layer() -> CorsLayer {
    let origins = std::env::var("CORS_ORIGINS").ok().and_then(|v| {
        let parsed: Vec<_> = v
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        if parsed.is_empty() {
            None
        } else {
            Some(parsed)
        }
    });

    let allow_origin = match origins {
        Some(list) => AllowOrigin::list(list),
        None => {
            warn!("CORS_ORIGINS not set, allowing any origin");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .max_age(Duration::from_secs(3600))
}

/// Prometheus 메트릭 핸들러.
async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// 전체 라우터를 구성합니다.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    let app_router = create_api_router()
        .nest("/ws/setups", websocket_router())
        .with_state(state);

    Router::new()
        .merge(metrics_router)
        .merge(app_router)
        .merge(swagger_ui_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

// ================================================================================================
// OpenAPI Export
// ================================================================================================

/// `--export-openapi` 플래그 처리.
///
/// OpenAPI JSON 스펙을 stdout으로 출력하고 종료합니다.
fn handle_export_openapi() -> bool {
    let requested = std::env::args().any(|arg| arg == "--export-openapi")
        || std::env::var("EXPORT_OPENAPI").is_ok();
    if !requested {
        return false;
    }

    use utoipa::OpenApi;
    match coach_api::openapi::ApiDoc::openapi().to_pretty_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
    true
}

// ================================================================================================
// Entry Point
// ================================================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    if handle_export_openapi() {
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coach_api=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Starting Coach API server on {}", config.socket_addr());

    let metrics_handle = setup_metrics_recorder();

    let state = create_app_state(&config).await;

    let shutdown_token = CancellationToken::new();

    // 하트비트는 DB가 있어야 집계 가능
    let heartbeat_task = state.db_pool.clone().map(|pool| {
        info!(
            "Starting heartbeat publisher (interval: {:?})",
            config.heartbeat_interval
        );
        start_heartbeat_publisher(
            pool,
            state.push_bus.clone(),
            config.heartbeat_interval,
            shutdown_token.clone(),
        )
    });

    let app = create_router(state.clone(), metrics_handle);

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    info!("Listening on {}", config.socket_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    // 백그라운드 태스크 정리
    shutdown_token.cancel();
    state.push_bus.shutdown();

    if let Some(task) = heartbeat_task {
        if tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .is_err()
        {
            error!("Heartbeat publisher did not stop within 10s");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// 종료 시그널 대기 (Ctrl+C 또는 SIGTERM).
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    token.cancel();
}

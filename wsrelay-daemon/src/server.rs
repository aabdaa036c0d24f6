//! HTTP front end: chat page and WebSocket acceptance

use anyhow::{Context, Result};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::rejection::ExtensionRejection;
use axum::extract::ws::{close_code, Message as Frame, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use wsrelay_broadcaster::{BroadcastCoordinator, ConnectionId, ConnectionRegistry, Message};

use crate::config::RelayConfig;
use crate::sink::WsSink;

const CHAT_PAGE: &str = include_str!("../assets/chat.html");

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    pub coordinator: BroadcastCoordinator,
    page: Arc<str>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = BroadcastCoordinator::new(registry, config.fanout);
        let page = render_page(&config.ws_path).into();

        Self {
            config: Arc::new(config),
            coordinator,
            page,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.coordinator.registry()
    }
}

/// Chat page with the WebSocket route filled in
pub fn render_page(ws_path: &str) -> String {
    CHAT_PAGE.replace("{{WS_PATH}}", ws_path)
}

/// Routes for the chat page and the WebSocket endpoint.
///
/// The peer address is logged when the app is served with
/// `into_make_service_with_connect_info`; without it upgrades still succeed.
pub fn router(state: RelayState) -> Router {
    let page_path = state.config.page_path.clone();
    let ws_path = state.config.ws_path.clone();

    Router::new()
        .route(&page_path, get(chat_page))
        .route(&ws_path, get(ws_handler))
        .with_state(state)
}

/// Bound listener plus the router serving it
pub struct RelayServer {
    listener: TcpListener,
    state: RelayState,
}

impl RelayServer {
    /// Validate `config` and bind its listen address
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Self {
            listener,
            state: RelayState::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Relay server failed")
    }
}

async fn chat_page(State(state): State<RelayState>) -> Html<String> {
    Html(state.page.to_string())
}

async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    connect_info: Result<ConnectInfo<SocketAddr>, ExtensionRejection>,
    State(state): State<RelayState>,
) -> Response {
    let peer = connect_info.ok().map(|ConnectInfo(addr)| addr);
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(?peer, error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let config = Arc::clone(&state.config);
    ws.read_buffer_size(config.read_buffer_size)
        .write_buffer_size(config.write_buffer_size)
        .max_message_size(config.max_message_size)
        .on_failed_upgrade(move |e| warn!(?peer, error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Read loop for one client; owns the connection from upgrade to close
async fn handle_socket(socket: WebSocket, peer: Option<SocketAddr>, state: RelayState) {
    let id = ConnectionId::generate();
    let (sender, mut receiver) = socket.split();
    let sink = Arc::new(WsSink::new(id, sender));

    state.registry().add(id, sink.clone()).await;
    info!(%id, ?peer, "WebSocket connection accepted");

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(frame @ (Frame::Text(_) | Frame::Binary(_))) => {
                relay(&state, id, Message::from(frame.into_data())).await;
            }
            Ok(Frame::Close(frame)) => {
                match frame {
                    Some(frame) if frame.code != close_code::NORMAL => {
                        info!(
                            %id,
                            code = frame.code,
                            reason = frame.reason.as_str(),
                            "Client closed connection"
                        );
                    }
                    _ => debug!(%id, "Client closed connection"),
                }
                break;
            }
            // Pings are answered by the transport
            Ok(Frame::Ping(_)) | Ok(Frame::Pong(_)) => {}
            Err(e) => {
                warn!(%id, error = %e, "Read error");
                break;
            }
        }
    }

    state.registry().remove(id).await;
    sink.close().await;
}

async fn relay(state: &RelayState, id: ConnectionId, message: Message) {
    match message.as_text() {
        Some(text) => info!(%id, "{}", text),
        None => info!(%id, bytes = message.len(), "<binary message>"),
    }
    state.coordinator.broadcast(message).await;
}

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ChatConfig;
use crate::websocket::{ChatServer, ClientMessage, ConnectionHandle, ConnectionState, ServerMessage};
use crate::AppState;

/// WebSocket connection handler
/// This upgrades the HTTP connection to a WebSocket connection
pub async fn websocket_route(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> std::result::Result<HttpResponse, Error> {
    let peer_addr = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!("New WebSocket connection request from: {}", peer_addr);

    ws::start(
        WebSocketSession::new(state.chat.clone(), &state.config.chat, peer_addr),
        &req,
        stream,
    )
}

/// One actor per socket. Inbound frames become `ClientMessage` events for the
/// `ChatServer`; events the server routes to this connection arrive through
/// the outbound channel registered in the pool.
pub struct WebSocketSession {
    server: Arc<ChatServer>,
    handle: ConnectionHandle,
    state: ConnectionState,
    peer_addr: String,
    last_heartbeat: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WebSocketSession {
    pub fn new(server: Arc<ChatServer>, config: &ChatConfig, peer_addr: String) -> Self {
        Self {
            server,
            handle: ConnectionHandle::new(),
            state: ConnectionState::Unidentified,
            peer_addr,
            last_heartbeat: Instant::now(),
            heartbeat_interval: config.heartbeat_interval(),
            client_timeout: config.client_timeout(),
        }
    }

    fn handle_text(&mut self, text: &str, ctx: &mut <Self as Actor>::Context) {
        let event = match serde_json::from_str::<ClientMessage>(text) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to parse message from {}: {}", self.peer_addr, e);
                self.send_server_message(ctx, ServerMessage::Error {
                    code: "invalid_format".to_string(),
                    message: format!("Invalid message format: {}", e),
                });
                return;
            }
        };

        debug!(connection = %self.handle, "inbound event {:?}", event);

        let server = self.server.clone();
        let handle = self.handle;
        let state = self.state;

        // `wait` holds back further frames until this event is fully handled.
        ctx.wait(
            async move { server.dispatch(handle, state, event).await }
                .into_actor(self)
                .map(|dispatch, act, ctx| {
                    act.state = dispatch.state;
                    if let Some(reply) = dispatch.reply {
                        act.send_server_message(ctx, reply);
                    }
                }),
        );
    }

    /// Send a server message to the client
    fn send_server_message(&self, ctx: &mut <Self as Actor>::Context, msg: ServerMessage) {
        match serde_json::to_string(&msg) {
            Ok(json_str) => ctx.text(json_str),
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }

    /// Start the heartbeat process
    fn start_heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!("Heartbeat timeout for connection {} ({})", act.handle, act.peer_addr);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WebSocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("WebSocket connection established with {} (id: {})", self.peer_addr, self.handle);

        self.start_heartbeat(ctx);

        let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
        ctx.add_stream(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        }));

        let server = self.server.clone();
        let handle = self.handle;
        ctx.wait(
            async move { server.connect(handle, tx).await }
                .into_actor(self)
                .map(|state, act, _| act.state = state),
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("WebSocket connection closed with {} (id: {})", self.peer_addr, self.handle);
        self.state = ConnectionState::Closed;

        let server = self.server.clone();
        let handle = self.handle;
        actix_rt::spawn(async move {
            server.disconnect(handle).await;
        });
    }
}

/// Events routed to this connection by the core.
impl StreamHandler<ServerMessage> for WebSocketSession {
    fn handle(&mut self, msg: ServerMessage, ctx: &mut Self::Context) {
        self.send_server_message(ctx, msg);
    }
}

/// Implement the StreamHandler trait to process WebSocket messages
impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for WebSocketSession {
    fn handle(&mut self, msg: std::result::Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_text(&text, ctx);
            }
            Ok(ws::Message::Binary(bin)) => {
                info!("Received binary message from {} of {} bytes", self.peer_addr, bin.len());
                self.send_server_message(ctx, ServerMessage::Error {
                    code: "unsupported".to_string(),
                    message: "Binary messages are not supported".to_string(),
                });
            }
            Ok(ws::Message::Close(reason)) => {
                info!("WebSocket closed from {}: {:?}", self.peer_addr, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error handling WebSocket message from {}: {}", self.peer_addr, e);
                ctx.stop();
            }
        }
    }
}

/// WebSocket session actor for collaborative diagram editing
///
/// One actor per live connection. The actor registers itself with the
/// session registry on start and unregisters on stop; a disconnect at any
/// point frees its registry entry without touching other connections.
use crate::broadcaster::DeliveryHandler;
use crate::channel::{BroadcastTransport, ScopeHandler};
use crate::registry::{ConnectionId, EnvelopeMessage, SessionRegistry};
use actix::{Actor, ActorContext, AsyncContext, Handler, StreamHandler};
use actix_web_actors::ws;
use erd_studio_core::auth::AuthContext;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// WebSocket connection heartbeat interval (30 seconds)
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Client timeout (60 seconds - 2 missed heartbeats)
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// WebSocket session actor
pub struct CollabWebSocket {
    /// Collaboration scope the connection was opened against
    project_id: String,

    /// Client-chosen session id for echo suppression
    session_id: Option<String>,

    /// Authentication context resolved at upgrade time
    auth: AuthContext,

    /// Registry owning this connection for its lifetime
    registry: Arc<SessionRegistry>,

    /// Transport carrying the scope's events to this instance
    transport: Arc<dyn BroadcastTransport>,

    /// Fan-out handler registered for the scope
    delivery: Arc<DeliveryHandler>,

    /// Registry id, assigned on start
    conn_id: Option<ConnectionId>,

    /// Last heartbeat timestamp
    hb: Instant,
}

impl CollabWebSocket {
    pub fn new(
        project_id: String,
        session_id: Option<String>,
        auth: AuthContext,
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn BroadcastTransport>,
        delivery: Arc<DeliveryHandler>,
    ) -> Self {
        Self {
            project_id,
            session_id,
            auth,
            registry,
            transport,
            delivery,
            conn_id: None,
            hb: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    project_id = %act.project_id,
                    "WebSocket client heartbeat timeout, disconnecting"
                );
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }
}

impl Actor for CollabWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            project_id = %self.project_id,
            user_id = %self.auth.user_id,
            "WebSocket connection established"
        );

        self.start_heartbeat(ctx);

        let recipient = ctx.address().recipient();
        let conn_id = self.registry.register(
            &self.project_id,
            self.session_id.clone(),
            self.auth.clone(),
            recipient,
        );
        self.conn_id = Some(conn_id);

        // make sure this instance dispatches the scope's events
        let transport = self.transport.clone();
        let delivery: Arc<dyn ScopeHandler> = self.delivery.clone();
        let project_id = self.project_id.clone();
        actix::spawn(async move {
            if let Err(e) = transport.subscribe(&project_id, delivery).await {
                tracing::warn!(
                    project_id = %project_id,
                    error = %e,
                    "Scope subscription failed; cross-instance events will not arrive"
                );
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(conn_id) = self.conn_id.take() {
            self.registry.unregister(conn_id);
        }

        if self.registry.is_scope_empty(&self.project_id) {
            let transport = self.transport.clone();
            let project_id = self.project_id.clone();
            actix::spawn(async move {
                transport.unsubscribe(&project_id).await;
            });
        }

        tracing::info!(
            project_id = %self.project_id,
            user_id = %self.auth.user_id,
            "WebSocket connection closed"
        );
    }
}

/// Envelopes fanned out by the registry are written straight to the socket
impl Handler<EnvelopeMessage> for CollabWebSocket {
    type Result = ();

    fn handle(&mut self, msg: EnvelopeMessage, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

/// Messages clients may send upstream. The write path runs over HTTP use
/// cases, so the socket only carries liveness traffic.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Ping,
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for CollabWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    self.hb = Instant::now();
                    ctx.text(r#"{"type":"pong"}"#);
                }
                Err(_) => {
                    tracing::debug!(
                        project_id = %self.project_id,
                        "Ignoring unrecognized client message"
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                tracing::warn!("WebSocket continuation frames not supported");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::error!("WebSocket protocol error: {}", e);
                ctx.stop();
            }
        }
    }
}

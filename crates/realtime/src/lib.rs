/// ERD Studio Realtime Service
///
/// Real-time mutation broadcasting for collaborative diagram editing
///
/// Features:
/// - Scope-partitioned broadcast channel over Redis pub/sub (or an
///   in-process loopback for single-instance deployments)
/// - WebSocket connection registry with per-project fan-out
/// - Mutation-to-scope resolution over the containment hierarchy
/// - Echo suppression so the originating session is never re-notified
pub mod broadcaster;
pub mod channel;
pub mod clock;
pub mod envelope;
pub mod hierarchy;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod session;
pub mod websocket;

pub use broadcaster::{Broadcaster, DeliveryHandler};
pub use channel::{
    build_transport, BroadcastTransport, ChannelError, LocalBroadcast, RedisBroadcast,
    ScopeHandler,
};
pub use clock::EventClock;
pub use envelope::{MutationEvent, MutationPayload};
pub use hierarchy::{HierarchyConfig, HierarchyError, HttpSchemaHierarchy, SchemaHierarchy};
pub use registry::{Connection, ConnectionId, EnvelopeMessage, SessionRegistry};
pub use resolver::{MutationResolver, ResolveError, ScopeContext};
pub use server::{start_server, AppState};
pub use session::{store_session, StoreSessionResolver};
pub use websocket::CollabWebSocket;

/// Initialize tracing for the realtime service
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "erd_studio_realtime={},actix_web=info",
                    default_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

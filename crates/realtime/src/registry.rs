/// Connection registry for managing per-project WebSocket connections
///
/// Tracks live connections by collaboration scope and fans published
/// envelopes out to them, suppressing the echo to the originating session.
use actix::{Message as ActixMessage, Recipient};
use dashmap::DashMap;
use erd_studio_core::auth::AuthContext;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = Uuid;

/// Serialized envelope sent to a WebSocket session actor
#[derive(ActixMessage, Clone)]
#[rtype(result = "()")]
pub struct EnvelopeMessage(pub String);

/// A live connection and the context attached to it at upgrade time
#[derive(Clone)]
pub struct Connection {
    pub conn_id: ConnectionId,
    /// Collaboration scope the connection was opened against
    pub project_id: String,
    /// Client-chosen session id, used only for echo suppression
    pub session_id: Option<String>,
    /// Authentication context; never mutated after registration
    pub auth: AuthContext,
    /// Mailbox of the session actor
    pub recipient: Recipient<EnvelopeMessage>,
}

/// Registry for tracking active WebSocket connections
///
/// The per-scope map is the only mutable shared state in the subsystem.
/// DashMap shards by key, so unrelated projects never contend on one lock.
pub struct SessionRegistry {
    /// Map: project_id -> connections in that scope
    scope_connections: DashMap<String, Vec<Connection>>,

    /// Map: connection_id -> connection
    connections: DashMap<ConnectionId, Connection>,

    /// Envelopes handed to connection mailboxes since start
    messages_delivered: Arc<RwLock<u64>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            scope_connections: DashMap::new(),
            connections: DashMap::new(),
            messages_delivered: Arc::new(RwLock::new(0)),
        }
    }

    /// Register a new connection under a project scope.
    ///
    /// A connection belongs to exactly one scope for its whole life.
    pub fn register(
        &self,
        project_id: &str,
        session_id: Option<String>,
        auth: AuthContext,
        recipient: Recipient<EnvelopeMessage>,
    ) -> ConnectionId {
        let conn_id = Uuid::new_v4();

        let connection = Connection {
            conn_id,
            project_id: project_id.to_string(),
            session_id,
            auth,
            recipient,
        };

        self.connections.insert(conn_id, connection.clone());
        self.scope_connections
            .entry(project_id.to_string())
            .or_default()
            .push(connection);

        info!(
            conn_id = %conn_id,
            project_id = %project_id,
            "Registered WebSocket connection"
        );

        conn_id
    }

    /// Unregister a connection. Safe to call multiple times.
    pub fn unregister(&self, conn_id: ConnectionId) {
        if let Some((_, connection)) = self.connections.remove(&conn_id) {
            if let Some(mut conns) = self.scope_connections.get_mut(&connection.project_id) {
                conns.retain(|c| c.conn_id != conn_id);

                if conns.is_empty() {
                    drop(conns);
                    self.scope_connections.remove(&connection.project_id);
                }
            }

            info!(
                conn_id = %conn_id,
                project_id = %connection.project_id,
                "Unregistered WebSocket connection"
            );
        }
    }

    /// Snapshot of the connections registered under a scope. Safe to iterate
    /// while concurrent register/unregister happen.
    pub fn list_connections(&self, project_id: &str) -> Vec<Connection> {
        self.scope_connections
            .get(project_id)
            .map(|conns| conns.clone())
            .unwrap_or_default()
    }

    /// Whether a scope currently has no registered connections
    pub fn is_scope_empty(&self, project_id: &str) -> bool {
        self.scope_connections
            .get(project_id)
            .map(|conns| conns.is_empty())
            .unwrap_or(true)
    }

    /// Deliver a serialized envelope to every connection in the scope except
    /// the one matching the originating session. A connection whose mailbox
    /// is gone is unregistered; delivery continues to the rest.
    ///
    /// Returns the number of connections the envelope was handed to.
    pub fn deliver(&self, project_id: &str, origin_session: Option<&str>, payload: &str) -> usize {
        let connections = self.list_connections(project_id);
        let mut delivered = 0;

        for connection in connections {
            if let (Some(origin), Some(session)) = (origin_session, connection.session_id.as_deref())
            {
                if origin == session {
                    debug!(conn_id = %connection.conn_id, "Echo suppressed");
                    continue;
                }
            }

            match connection
                .recipient
                .try_send(EnvelopeMessage(payload.to_string()))
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        conn_id = %connection.conn_id,
                        error = %e,
                        "Dropping dead connection after failed delivery"
                    );
                    self.unregister(connection.conn_id);
                }
            }
        }

        *self.messages_delivered.write() += delivered as u64;

        debug!(
            project_id = %project_id,
            delivered = delivered,
            "Fanned out envelope"
        );

        delivered
    }

    /// Total number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of scopes with at least one connection
    pub fn active_scope_count(&self) -> usize {
        self.scope_connections.len()
    }

    /// Envelopes handed to connection mailboxes since start
    pub fn messages_delivered(&self) -> u64 {
        *self.messages_delivered.read()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

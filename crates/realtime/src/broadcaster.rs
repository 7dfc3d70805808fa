//! Broadcast orchestration
//!
//! [`Broadcaster`] sits on the publish side: it resolves a mutation to its
//! scope, builds the envelope, and publishes it through the transport.
//! Everything is best-effort relative to the write path that triggered it;
//! failures are logged and the broadcast is dropped, never surfaced.
//!
//! [`DeliveryHandler`] sits on the subscribe side of the same channel: each
//! instance registers it per scope, and it fans incoming envelopes out to
//! that instance's registry, suppressing the originator's echo.

use crate::channel::{BroadcastTransport, ScopeHandler};
use crate::clock::EventClock;
use crate::envelope::{MutationEvent, MutationPayload};
use crate::hierarchy::SchemaHierarchy;
use crate::registry::SessionRegistry;
use crate::resolver::{MutationResolver, ScopeContext};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Publishes mutation events to the scope-partitioned channel
pub struct Broadcaster {
    resolver: MutationResolver,
    transport: Arc<dyn BroadcastTransport>,
    clock: EventClock,
}

impl Broadcaster {
    pub fn new(
        hierarchy: Arc<dyn SchemaHierarchy>,
        transport: Arc<dyn BroadcastTransport>,
    ) -> Self {
        Self {
            resolver: MutationResolver::new(hierarchy),
            transport,
            clock: EventClock::new(),
        }
    }

    /// Fire-and-forget entry point for write paths: returns immediately,
    /// the broadcast proceeds on its own task.
    pub fn notify_tables_changed(
        self: &Arc<Self>,
        session_id: Option<String>,
        table_ids: BTreeSet<String>,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.broadcast_tables(session_id, table_ids).await;
        });
    }

    /// Fire-and-forget coarse notification for a schema-level change
    pub fn notify_schema_changed(self: &Arc<Self>, session_id: Option<String>, schema_id: String) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.broadcast_schema_changed(session_id, &schema_id).await;
        });
    }

    /// Fire-and-forget notification of a schema rename
    pub fn notify_schema_renamed(
        self: &Arc<Self>,
        session_id: Option<String>,
        schema_id: String,
        name: String,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.broadcast_schema_renamed(session_id, &schema_id, name)
                .await;
        });
    }

    /// Resolve the affected tables to their scope and publish one event
    pub async fn broadcast_tables(
        &self,
        session_id: Option<String>,
        table_ids: BTreeSet<String>,
    ) {
        let ctx = match self.resolver.resolve_tables(&table_ids).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Dropping broadcast: scope resolution failed");
                return;
            }
        };

        self.broadcast_with_context(&ctx, session_id, table_ids)
            .await;
    }

    /// Publish with a scope the caller already resolved (chained broadcasts)
    pub async fn broadcast_with_context(
        &self,
        ctx: &ScopeContext,
        session_id: Option<String>,
        table_ids: BTreeSet<String>,
    ) {
        let event = MutationEvent {
            payload: MutationPayload::ErdMutated {
                schema_id: ctx.schema_id.clone(),
                affected_table_ids: table_ids,
            },
            timestamp: self.clock.now_millis(),
            session_id,
        };

        self.publish(&ctx.project_id, &event).await;
    }

    /// Coarse event: the schema is known, no specific table list
    pub async fn broadcast_schema_changed(&self, session_id: Option<String>, schema_id: &str) {
        let ctx = match self.resolver.resolve_schema(schema_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Dropping broadcast: scope resolution failed");
                return;
            }
        };

        self.broadcast_with_context(&ctx, session_id, BTreeSet::new())
            .await;
    }

    /// Publish a schema rename to its project scope
    pub async fn broadcast_schema_renamed(
        &self,
        session_id: Option<String>,
        schema_id: &str,
        name: String,
    ) {
        let ctx = match self.resolver.resolve_schema(schema_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "Dropping broadcast: scope resolution failed");
                return;
            }
        };

        let event = MutationEvent {
            payload: MutationPayload::SchemaRenamed {
                schema_id: schema_id.to_string(),
                name,
            },
            timestamp: self.clock.now_millis(),
            session_id,
        };

        self.publish(&ctx.project_id, &event).await;
    }

    async fn publish(&self, project_id: &str, event: &MutationEvent) {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Dropping broadcast: envelope serialization failed");
                return;
            }
        };

        match self.transport.publish(project_id, &payload).await {
            Ok(()) => debug!(project_id = %project_id, "Published mutation event"),
            Err(e) => {
                warn!(error = %e, project_id = %project_id, "Dropping broadcast: transport publish failed");
            }
        }
    }
}

/// Subscribe-side counterpart: relays envelopes from the channel to this
/// instance's registered connections
pub struct DeliveryHandler {
    registry: Arc<SessionRegistry>,
}

impl DeliveryHandler {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ScopeHandler for DeliveryHandler {
    async fn on_message(&self, scope_id: &str, payload: &str) {
        let event: MutationEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(scope_id = %scope_id, error = %e, "Discarding undecodable envelope");
                return;
            }
        };

        self.registry
            .deliver(scope_id, event.session_id.as_deref(), payload);
    }
}

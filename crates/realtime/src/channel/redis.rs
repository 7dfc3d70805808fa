//! Redis pub/sub transport
//!
//! Publishes through the shared connection manager under a short timeout so
//! a degraded Redis never stalls the write path that triggered the
//! broadcast. A single background task holds the pattern subscription for
//! all scopes and reconnects with a fixed delay after connection loss.

use super::{channel_for, scope_from_channel, BroadcastTransport, ChannelError, ScopeHandler};
use async_trait::async_trait;
use dashmap::DashMap;
use erd_studio_core::config::RedisConfig;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Delay before re-establishing a lost subscription
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type HandlerMap = Arc<DashMap<String, Arc<dyn ScopeHandler>>>;

/// Cross-instance broadcast transport over Redis pub/sub
pub struct RedisBroadcast {
    manager: ConnectionManager,
    response_timeout: Duration,
    handlers: HandlerMap,
}

impl RedisBroadcast {
    /// Connect the publish path and start the subscription task
    ///
    /// # Errors
    ///
    /// Returns an error if the publish connection cannot be established;
    /// the subscription task itself retries forever and is not awaited here.
    pub async fn connect(config: &RedisConfig) -> Result<Self, ChannelError> {
        info!(url = %config.url, "Connecting broadcast transport");

        let client = Client::open(config.url.as_str())
            .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let manager = timeout(
            config.connection_timeout,
            ConnectionManager::new(client.clone()),
        )
        .await
        .map_err(|_| ChannelError::Connection("connection timed out".to_string()))?
        .map_err(|e| ChannelError::Connection(e.to_string()))?;

        let handlers: HandlerMap = Arc::new(DashMap::new());

        let listener_handlers = Arc::clone(&handlers);
        tokio::spawn(async move {
            Self::listen(client, listener_handlers).await;
        });

        Ok(Self {
            manager,
            response_timeout: config.response_timeout,
            handlers,
        })
    }

    /// Subscription loop: pattern-subscribe once, dispatch by exact scope id
    async fn listen(client: Client, handlers: HandlerMap) {
        loop {
            match Self::listen_once(&client, &handlers).await {
                Ok(()) => {
                    warn!("Broadcast subscription stream ended, reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, "Broadcast subscription lost, reconnecting");
                }
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn listen_once(client: &Client, handlers: &HandlerMap) -> redis::RedisResult<()> {
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.psubscribe(super::CHANNEL_PATTERN).await?;

        info!(pattern = %super::CHANNEL_PATTERN, "Broadcast subscription established");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel = msg.get_channel_name().to_string();
            let Some(scope_id) = scope_from_channel(&channel) else {
                continue;
            };

            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Discarding undecodable broadcast message");
                    continue;
                }
            };

            let handler = handlers.get(scope_id).map(|h| h.clone());
            match handler {
                Some(handler) => handler.on_message(scope_id, &payload).await,
                None => debug!(scope_id = %scope_id, "No local subscriber for scope"),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BroadcastTransport for RedisBroadcast {
    async fn publish(&self, scope_id: &str, payload: &str) -> Result<(), ChannelError> {
        let channel = channel_for(scope_id);
        let mut conn = self.manager.clone();

        let publish = conn.publish::<_, _, i64>(channel, payload);
        match timeout(self.response_timeout, publish).await {
            Ok(Ok(receivers)) => {
                debug!(scope_id = %scope_id, receivers = receivers, "Published mutation event");
                Ok(())
            }
            Ok(Err(e)) => Err(ChannelError::Publish {
                scope_id: scope_id.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ChannelError::Publish {
                scope_id: scope_id.to_string(),
                reason: format!("timed out after {:?}", self.response_timeout),
            }),
        }
    }

    async fn subscribe(
        &self,
        scope_id: &str,
        handler: Arc<dyn ScopeHandler>,
    ) -> Result<(), ChannelError> {
        // the pattern subscription already covers every scope; registering
        // the handler is all that is needed to start dispatching
        self.handlers.insert(scope_id.to_string(), handler);
        Ok(())
    }

    async fn unsubscribe(&self, scope_id: &str) {
        self.handlers.remove(scope_id);
    }
}

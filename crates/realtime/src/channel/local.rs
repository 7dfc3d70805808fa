//! In-process loopback transport
//!
//! Used with the in-process store provider: messages published on this
//! instance are dispatched to this instance's handlers and nowhere else.
//! Other instances deliberately do not see them; that is the provider's
//! documented tradeoff, not a defect.

use super::{BroadcastTransport, ChannelError, ScopeHandler};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Single-instance broadcast transport
#[derive(Default)]
pub struct LocalBroadcast {
    handlers: DashMap<String, Arc<dyn ScopeHandler>>,
}

impl LocalBroadcast {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BroadcastTransport for LocalBroadcast {
    async fn publish(&self, scope_id: &str, payload: &str) -> Result<(), ChannelError> {
        let handler = self.handlers.get(scope_id).map(|h| h.clone());

        match handler {
            Some(handler) => handler.on_message(scope_id, payload).await,
            // nobody on this instance cares about the scope; drop silently,
            // matching a publish with no subscribers on the shared transport
            None => debug!(scope_id = %scope_id, "No local subscriber for scope"),
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        scope_id: &str,
        handler: Arc<dyn ScopeHandler>,
    ) -> Result<(), ChannelError> {
        self.handlers.insert(scope_id.to_string(), handler);
        Ok(())
    }

    async fn unsubscribe(&self, scope_id: &str) {
        self.handlers.remove(scope_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ScopeHandler for Recorder {
        async fn on_message(&self, scope_id: &str, payload: &str) {
            self.seen
                .lock()
                .push((scope_id.to_string(), payload.to_string()));
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribed_scope_only() {
        let transport = LocalBroadcast::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });

        transport
            .subscribe("proj-1", recorder.clone())
            .await
            .unwrap();

        transport.publish("proj-1", "hello").await.unwrap();
        transport.publish("proj-2", "elsewhere").await.unwrap();

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("proj-1".to_string(), "hello".to_string()));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_dispatch() {
        let transport = LocalBroadcast::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });

        transport
            .subscribe("proj-1", recorder.clone())
            .await
            .unwrap();
        transport.unsubscribe("proj-1").await;
        transport.publish("proj-1", "hello").await.unwrap();

        assert!(recorder.seen.lock().is_empty());

        // unsubscribing an unknown scope is a no-op
        transport.unsubscribe("proj-unknown").await;
    }
}

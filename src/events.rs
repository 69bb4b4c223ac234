//! In-process pub/sub for node lifecycle events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::error;

use crate::error::Result;
use crate::membership::Node;

/// The lifecycle events a [`crate::core::ClusterCore`] emits.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// A node transitioned to (or was discovered as) ALIVE.
    NodeAlive(Node),
    /// A node transitioned to SUSPECT.
    NodeSuspect(Node),
    /// A node transitioned to DEAD.
    NodeDead(Node),
    /// A USER payload arrived, delivered to any subscriber of `"user"`.
    User {
        /// Name of the node that sent the payload.
        sender: String,
        /// Opaque payload bytes.
        data: Vec<u8>,
    },
}

impl ClusterEvent {
    fn name(&self) -> &'static str {
        match self {
            ClusterEvent::NodeAlive(_) => "node.alive",
            ClusterEvent::NodeSuspect(_) => "node.suspect",
            ClusterEvent::NodeDead(_) => "node.dead",
            ClusterEvent::User { .. } => "user",
        }
    }
}

/// A registered observer of cluster lifecycle events.
///
/// A handler that returns `Err` is logged and does not affect the
/// remaining handlers, nor membership state.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    async fn handle(&self, event: ClusterEvent) -> Result<()>;
}

/// Registry of event handlers keyed by event name, with `emit` fanning the
/// event out to every handler registered for it.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<&'static str, Vec<Arc<dyn EventHandler>>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for the given event's name (`"node.alive"`,
    /// `"node.suspect"`, `"node.dead"`).
    pub async fn on(&self, event_name: &'static str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .await
            .entry(event_name)
            .or_default()
            .push(handler);
    }

    /// Deregister every handler pointer-equal to `handler` for the given
    /// event name.
    pub async fn off(&self, event_name: &'static str, handler: &Arc<dyn EventHandler>) {
        if let Some(list) = self.handlers.write().await.get_mut(event_name) {
            list.retain(|existing| !Arc::ptr_eq(existing, handler));
        }
    }

    /// Invoke every handler registered for this event's name. Errors are
    /// logged and do not prevent the remaining handlers from running.
    pub async fn emit(&self, event: ClusterEvent) {
        let name = event.name();
        let handlers = self.handlers.read().await;
        let Some(list) = handlers.get(name) else {
            return;
        };
        for handler in list {
            if let Err(err) = handler.handle(event.clone()).await {
                error!(event = name, error = %err, "event handler returned an error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    fn sample_node(name: &str) -> Node {
        Node {
            name: name.into(),
            host: "127.0.0.1".to_string(),
            port: 7946,
            incarnation: 1,
            version: 1,
            metadata: Default::default(),
            status: crate::membership::NodeStatus::Alive,
            status_changed_at: SystemTime::now(),
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: ClusterEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: ClusterEvent) -> Result<()> {
            Err(crate::error::Error::Protocol("boom".into()))
        }
    }

    #[tokio::test]
    async fn emits_to_all_registered_handlers_for_matching_name() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.on("node.alive", Arc::new(CountingHandler(count.clone())))
            .await;
        bus.on("node.alive", Arc::new(CountingHandler(count.clone())))
            .await;
        bus.on("node.dead", Arc::new(CountingHandler(count.clone())))
            .await;

        bus.emit(ClusterEvent::NodeAlive(sample_node("a"))).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.on("node.suspect", Arc::new(FailingHandler)).await;
        bus.on("node.suspect", Arc::new(CountingHandler(count.clone())))
            .await;

        bus.emit(ClusterEvent::NodeSuspect(sample_node("a"))).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

use std::sync::Arc;

use tokio::sync::broadcast;

use tasklive_types::events::GatewayEvent;

/// Fans mutation events out to every connected channel.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events — all connected clients receive all events
    broadcast_tx: broadcast::Sender<GatewayEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients. Delivery is
    /// at-most-once per channel; with no channels open this is a no-op.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Number of currently open channels.
    pub fn channel_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklive_types::models::Task;
    use uuid::Uuid;

    #[tokio::test]
    async fn broadcast_reaches_every_channel() {
        let dispatcher = Dispatcher::new();

        // Two channels owned by different users
        let mut rx_a = dispatcher.subscribe();
        let mut rx_b = dispatcher.subscribe();

        let task = Task {
            id: Uuid::new_v4(),
            title: "x".into(),
            completed: false,
            owner_id: Uuid::new_v4(),
        };
        dispatcher.broadcast(GatewayEvent::TaskAdded(task.clone()));

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a, GatewayEvent::TaskAdded(task));
        assert_eq!(got_a, got_b);
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        dispatcher.broadcast(GatewayEvent::TaskDeleted { task_id: first });
        dispatcher.broadcast(GatewayEvent::TaskDeleted { task_id: second });

        assert_eq!(
            rx.recv().await.unwrap(),
            GatewayEvent::TaskDeleted { task_id: first }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            GatewayEvent::TaskDeleted { task_id: second }
        );
    }
}

use calma_shared::models::events::SlotActivityEvent;
use tokio::sync::broadcast;

/// In-process fan-out of slot activity to connected SSE subscribers.
/// Publishing never blocks: subscribers that lag simply miss events and
/// re-query the slot grid.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SlotActivityEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: SlotActivityEvent) {
        // Err means no live subscribers, which is fine.
        if let Err(err) = self.tx.send(event) {
            tracing::trace!("no subscribers for slot activity event: {}", err);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotActivityEvent> {
        self.tx.subscribe()
    }
}

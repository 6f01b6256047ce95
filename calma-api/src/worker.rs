use std::sync::Arc;

use calma_booking::HoldManager;
use calma_shared::models::events::ACTIVITY_EXPIRED;
use calma_store::EventBus;
use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::info;

use crate::holds::publish_activity;

/// Periodic TTL sweep, independent of request traffic. Abandoned checkouts
/// have no explicit signal; this is the only cleanup path. Racing a commit
/// is safe: the hold's terminal-state check makes the loser a no-op.
pub async fn start_expiry_sweep(holds: Arc<HoldManager>, bus: EventBus, interval_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(interval_seconds));
    info!("Hold expiry sweep started, every {}s", interval_seconds);

    loop {
        ticker.tick().await;
        let expired = holds.expire_sweep(Utc::now());
        if expired.is_empty() {
            continue;
        }
        info!("Expired {} holds", expired.len());
        for hold in &expired {
            publish_activity(&bus, ACTIVITY_EXPIRED, hold.id, &hold.items);
        }
    }
}

use std::sync::Arc;

use calma_catalog::ResourceType;
use calma_core::time::TimeWindow;
use calma_schedule::CommitmentSource;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::hold::HoldManager;
use crate::repository::InMemoryBookingStore;

/// Feeds the availability index from live state: pending unexpired holds
/// plus confirmed bookings, recomputed on every call so nothing can drift.
pub struct CommitmentFeed {
    holds: Arc<HoldManager>,
    bookings: Arc<InMemoryBookingStore>,
}

impl CommitmentFeed {
    pub fn new(holds: Arc<HoldManager>, bookings: Arc<InMemoryBookingStore>) -> Self {
        Self { holds, bookings }
    }

    /// Buffered occupancy windows of every live commitment, as
    /// `(staff_id, window, resource_ids, resource_units, start)` tuples.
    fn live_items(
        &self,
        now: DateTime<Utc>,
    ) -> Vec<(Uuid, TimeWindow, Vec<Uuid>, Vec<(ResourceType, i32)>)> {
        let mut items = Vec::new();
        for hold in self.holds.snapshot() {
            if hold.status != crate::models::HoldStatus::Pending || hold.is_expired(now) {
                continue;
            }
            for item in &hold.items {
                if let Ok(window) = TimeWindow::new(item.start_time, item.blocked_until) {
                    items.push((
                        item.staff_id,
                        window,
                        item.resource_ids.clone(),
                        item.resource_units.clone(),
                    ));
                }
            }
        }
        for booking in self.bookings.confirmed_snapshot() {
            for item in &booking.items {
                if let Ok(window) = TimeWindow::new(item.start_time, item.blocked_until) {
                    items.push((
                        item.staff_id,
                        window,
                        item.resource_ids.clone(),
                        item.resource_units.clone(),
                    ));
                }
            }
        }
        items
    }
}

impl CommitmentSource for CommitmentFeed {
    fn staff_commitments(
        &self,
        staff_id: Uuid,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Vec<TimeWindow> {
        self.live_items(now)
            .into_iter()
            .filter(|(id, w, _, _)| *id == staff_id && w.overlaps(window))
            .map(|(_, w, _, _)| w)
            .collect()
    }

    fn resource_units_committed(
        &self,
        resource_type: ResourceType,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> i32 {
        self.live_items(now)
            .into_iter()
            .filter(|(_, w, _, _)| w.overlaps(window))
            .flat_map(|(_, _, _, units)| units)
            .filter(|(rt, _)| *rt == resource_type)
            .map(|(_, units)| units)
            .sum()
    }

    fn staff_future_load(&self, staff_id: Uuid, from: DateTime<Utc>) -> usize {
        self.live_items(from)
            .into_iter()
            .filter(|(id, w, _, _)| *id == staff_id && w.start() >= from)
            .count()
    }

    fn staff_last_assignment(&self, staff_id: Uuid, until: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.live_items(until)
            .into_iter()
            .filter(|(id, w, _, _)| *id == staff_id && w.start() <= until)
            .map(|(_, w, _, _)| w.start())
            .max()
    }

    fn resource_future_load(&self, resource_id: Uuid, from: DateTime<Utc>) -> usize {
        self.live_items(from)
            .into_iter()
            .filter(|(_, w, ids, _)| w.start() >= from && ids.contains(&resource_id))
            .count()
    }
}

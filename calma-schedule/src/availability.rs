use std::sync::Arc;

use calma_catalog::{CatalogRegistry, ResourceType};
use calma_core::time::TimeWindow;
use calma_core::EngineResult;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Feed of live commitments (pending unexpired holds plus confirmed
/// bookings). Implemented by the booking-state crate so the index stays a
/// pure reader with no dependency on hold internals.
pub trait CommitmentSource: Send + Sync {
    /// Buffered occupancy windows for the staff member that overlap `window`.
    fn staff_commitments(
        &self,
        staff_id: Uuid,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Vec<TimeWindow>;

    /// Committed units of the resource type overlapping `window`.
    fn resource_units_committed(
        &self,
        resource_type: ResourceType,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> i32;

    /// Number of commitments starting at or after `from` for the staff
    /// member. Drives the least-loaded tie-break.
    fn staff_future_load(&self, staff_id: Uuid, from: DateTime<Utc>) -> usize;

    /// Start of the staff member's most recent commitment before `until`.
    /// Drives the least-recently-used slot annotation ordering.
    fn staff_last_assignment(&self, staff_id: Uuid, until: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Number of commitments starting at or after `from` that claim the
    /// concrete resource.
    fn resource_future_load(&self, resource_id: Uuid, from: DateTime<Utc>) -> usize;
}

/// Answers "is staff S / resource type T free during [t0, t1)?" against the
/// union of weekly working windows and live commitments. Pure reads,
/// recomputed on every call; nothing here caches capacity.
pub struct AvailabilityIndex {
    catalog: Arc<CatalogRegistry>,
    source: Arc<dyn CommitmentSource>,
}

impl Clone for AvailabilityIndex {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            source: Arc::clone(&self.source),
        }
    }
}

impl AvailabilityIndex {
    pub fn new(catalog: Arc<CatalogRegistry>, source: Arc<dyn CommitmentSource>) -> Self {
        Self { catalog, source }
    }

    pub fn catalog(&self) -> &Arc<CatalogRegistry> {
        &self.catalog
    }

    /// False for unknown or inactive staff and for windows outside working
    /// hours; a malformed window (`end <= start`) is the only error case.
    pub fn staff_free(
        &self,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let window = TimeWindow::new(start, end)?;
        let staff = match self.catalog.staff(staff_id) {
            Some(staff) if staff.is_active => staff,
            _ => return Ok(false),
        };
        if !staff.works_during(&window) {
            return Ok(false);
        }
        Ok(self
            .source
            .staff_commitments(staff_id, &window, now)
            .is_empty())
    }

    /// Declared active capacity of the type minus every overlapping
    /// held/booked unit, floored at zero. Unknown types simply have zero
    /// declared capacity.
    pub fn resource_capacity(
        &self,
        resource_type: ResourceType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<i32> {
        let window = TimeWindow::new(start, end)?;
        let total = self.catalog.total_capacity(resource_type);
        let committed = self
            .source
            .resource_units_committed(resource_type, &window, now);
        Ok((total - committed).max(0))
    }

    pub fn staff_load(&self, staff_id: Uuid, from: DateTime<Utc>) -> usize {
        self.source.staff_future_load(staff_id, from)
    }

    pub fn staff_last_assignment(
        &self,
        staff_id: Uuid,
        until: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.source.staff_last_assignment(staff_id, until)
    }

    pub fn resource_load(&self, resource_id: Uuid, from: DateTime<Utc>) -> usize {
        self.source.resource_future_load(resource_id, from)
    }
}

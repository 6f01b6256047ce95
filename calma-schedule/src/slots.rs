use calma_catalog::Service;
use calma_core::time::TimeWindow;
use calma_core::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::availability::AvailabilityIndex;
use crate::policy::SchedulingPolicy;

/// A candidate bookable window. Derived on demand from the availability
/// index, never persisted: the id only identifies the slot within one
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Capable free staff, least-recently-assigned first. Empty means the
    /// grid point is shown as unavailable rather than omitted.
    pub available_staff: Vec<Uuid>,
    /// Remaining capacity in persons across the service's resource
    /// requirements at this time.
    pub available_capacity: i32,
}

impl Slot {
    pub fn is_bookable(&self, quantity: i32) -> bool {
        !self.available_staff.is_empty() && self.available_capacity >= quantity
    }
}

/// Produces the lazy, finite, restartable sequence of candidate slots for
/// one service request. Dropping the iterator mid-way is cancellation; the
/// generation is a pure read with nothing to undo.
pub struct SlotGenerator {
    index: AvailabilityIndex,
    policy: SchedulingPolicy,
}

impl SlotGenerator {
    pub fn new(index: AvailabilityIndex, policy: SchedulingPolicy) -> Self {
        Self { index, policy }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Candidate slots for `service_id` over `[from, to)`, clamped to the
    /// lead-time and booking-horizon policy. Unknown or inactive services
    /// yield an empty sequence.
    pub fn slots(
        &self,
        service_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> EngineResult<SlotIter> {
        TimeWindow::new(from, to)?;
        let service = self
            .index
            .catalog()
            .service(service_id)
            .filter(|s| s.is_active);
        let first = self.policy.round_up_to_grid(from.max(self.policy.earliest_start(now)));
        let end = to.min(self.policy.horizon_end(now));
        tracing::debug!(%service_id, %first, %end, "generating candidate slots");
        Ok(SlotIter {
            index: self.index.clone(),
            policy: self.policy,
            service,
            cursor: first,
            end,
            now,
        })
    }
}

pub struct SlotIter {
    index: AvailabilityIndex,
    policy: SchedulingPolicy,
    service: Option<Service>,
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
}

impl Iterator for SlotIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let service = self.service.as_ref()?;
        if self.cursor >= self.end {
            return None;
        }
        let start = self.cursor;
        self.cursor += self.policy.granularity();

        let occupancy = service.occupancy_window(start).ok()?;

        let mut free_staff: Vec<(Option<DateTime<Utc>>, Uuid)> = Vec::new();
        for staff in self.index.catalog().capable_staff(service.id) {
            let free = self
                .index
                .staff_free(staff.id, occupancy.start(), occupancy.end(), self.now)
                .unwrap_or(false);
            if free {
                let last = self.index.staff_last_assignment(staff.id, self.now);
                free_staff.push((last, staff.id));
            }
        }
        free_staff.sort();
        let available_staff: Vec<Uuid> = free_staff.into_iter().map(|(_, id)| id).collect();

        // Staff-only services are bounded by the party-size policy, not by
        // any physical resource.
        let mut capacity = self.policy.max_party_size;
        for req in &service.requirements {
            let free_units = self
                .index
                .resource_capacity(req.resource_type, occupancy.start(), occupancy.end(), self.now)
                .unwrap_or(0);
            capacity = capacity.min(free_units / req.units_per_person);
        }

        Some(Slot {
            slot_id: Uuid::new_v4(),
            service_id: service.id,
            start_time: start,
            end_time: occupancy.end(),
            available_staff,
            available_capacity: capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::CommitmentSource;
    use calma_catalog::{
        AvailabilityWindow, CatalogRegistry, DayOfWeek, Resource, ResourceRequirement,
        ResourceType, Staff,
    };
    use chrono::{NaiveTime, TimeZone};
    use std::sync::Arc;

    struct QuietSource;

    impl CommitmentSource for QuietSource {
        fn staff_commitments(
            &self,
            _staff_id: Uuid,
            _window: &TimeWindow,
            _now: DateTime<Utc>,
        ) -> Vec<TimeWindow> {
            Vec::new()
        }

        fn resource_units_committed(
            &self,
            _resource_type: ResourceType,
            _window: &TimeWindow,
            _now: DateTime<Utc>,
        ) -> i32 {
            0
        }

        fn staff_future_load(&self, _staff_id: Uuid, _from: DateTime<Utc>) -> usize {
            0
        }

        fn staff_last_assignment(
            &self,
            _staff_id: Uuid,
            _until: DateTime<Utc>,
        ) -> Option<DateTime<Utc>> {
            None
        }

        fn resource_future_load(&self, _resource_id: Uuid, _from: DateTime<Utc>) -> usize {
            0
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // 2026-03-02 is a Monday
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn seeded_catalog() -> (Arc<CatalogRegistry>, Uuid) {
        let catalog = Arc::new(CatalogRegistry::new());
        let service = Service::new(
            "Relaxing massage".to_string(),
            30,
            0,
            8000,
            vec![ResourceRequirement {
                resource_type: ResourceType::Room,
                units_per_person: 1,
            }],
        );
        let service_id = service.id;
        catalog.upsert_service(service).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 1))
            .unwrap();
        catalog
            .upsert_resource(Resource::new("Room 2".to_string(), ResourceType::Room, 1))
            .unwrap();

        let mut staff = Staff::new("Noa".to_string(), vec!["massage".to_string()]);
        staff.service_ids.push(service_id);
        staff.windows.push(AvailabilityWindow {
            day: DayOfWeek::Monday,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            is_available: true,
        });
        catalog.upsert_staff(staff).unwrap();
        (catalog, service_id)
    }

    fn generator(catalog: Arc<CatalogRegistry>) -> SlotGenerator {
        let index = AvailabilityIndex::new(catalog, Arc::new(QuietSource));
        SlotGenerator::new(index, SchedulingPolicy::default())
    }

    #[test]
    fn test_grid_alignment_and_lead_time() {
        let (catalog, service_id) = seeded_catalog();
        let generator = generator(catalog);

        // now 08:50 + 30 min lead = 09:20, rounded up to 09:30.
        let slots: Vec<Slot> = generator
            .slots(service_id, at(8, 0), at(11, 0), at(8, 50))
            .unwrap()
            .collect();
        assert_eq!(slots[0].start_time, at(9, 30));
        // Every grid point up to (not including) 11:00.
        let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(
            starts,
            vec![at(9, 30), at(9, 45), at(10, 0), at(10, 15), at(10, 30), at(10, 45)]
        );
    }

    #[test]
    fn test_unavailable_grid_points_still_emitted() {
        let (catalog, service_id) = seeded_catalog();
        let generator = generator(catalog);

        // Staff works 09:00-12:00; a 13:00 grid point has no free staff but
        // must still appear so the grid stays stable across refreshes.
        let slots: Vec<Slot> = generator
            .slots(service_id, at(13, 0), at(13, 30), at(8, 0))
            .unwrap()
            .collect();
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.available_staff.is_empty()));
        assert!(slots.iter().all(|s| !s.is_bookable(1)));
        // Rooms are still free at that hour.
        assert!(slots.iter().all(|s| s.available_capacity == 2));
    }

    #[test]
    fn test_capacity_annotation_counts_persons() {
        let (catalog, service_id) = seeded_catalog();
        let generator = generator(catalog);
        let slot = generator
            .slots(service_id, at(10, 0), at(10, 15), at(8, 0))
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(slot.available_capacity, 2);
        assert!(slot.is_bookable(2));
        assert!(!slot.is_bookable(3));
    }

    #[test]
    fn test_unknown_service_yields_empty_sequence() {
        let (catalog, _) = seeded_catalog();
        let generator = generator(catalog);
        let count = generator
            .slots(Uuid::new_v4(), at(9, 0), at(12, 0), at(8, 0))
            .unwrap()
            .count();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_sequence_is_restartable() {
        let (catalog, service_id) = seeded_catalog();
        let generator = generator(catalog);

        let first_pass: Vec<_> = generator
            .slots(service_id, at(9, 0), at(11, 0), at(8, 0))
            .unwrap()
            .take(3)
            .map(|s| s.start_time)
            .collect();
        let second_pass: Vec<_> = generator
            .slots(service_id, at(9, 0), at(11, 0), at(8, 0))
            .unwrap()
            .take(3)
            .map(|s| s.start_time)
            .collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn test_horizon_bounds_the_sequence() {
        let (catalog, service_id) = seeded_catalog();
        let generator = generator(catalog);
        let now = at(8, 0);
        let far = now + chrono::Duration::days(365);
        let last = generator
            .slots(service_id, at(9, 0), far, now)
            .unwrap()
            .last()
            .unwrap();
        assert!(last.start_time < SchedulingPolicy::default().horizon_end(now));
    }
}

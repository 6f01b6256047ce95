use std::collections::HashMap;

use calma_core::time::TimeWindow;
use calma_core::{EngineError, EngineResult};
use calma_schedule::{AvailabilityIndex, SchedulingPolicy};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Composition, CompositionItem, SlotChoice};

/// Places the basket's selections back-to-back, choosing staff and resource
/// assignments that satisfy every step. Validation only: nothing is
/// reserved until the hold manager takes the result to the ledger.
pub struct SequentialComposer {
    index: AvailabilityIndex,
    policy: SchedulingPolicy,
}

impl SequentialComposer {
    pub fn new(index: AvailabilityIndex, policy: SchedulingPolicy) -> Self {
        Self { index, policy }
    }

    /// Re-validates every client-chosen window against the live index (the
    /// slots shown earlier may have gone stale) and produces one fully
    /// assigned composition, or the first failure with its selection index.
    pub fn compose(&self, choices: &[SlotChoice], now: DateTime<Utc>) -> EngineResult<Composition> {
        if choices.is_empty() {
            return Err(EngineError::Validation("empty selection basket".to_string()));
        }
        let mut ordered: Vec<SlotChoice> = choices.to_vec();
        ordered.sort_by_key(|c| c.selection.sequence_index);
        for pair in ordered.windows(2) {
            if pair[0].selection.sequence_index == pair[1].selection.sequence_index {
                return Err(EngineError::Validation(format!(
                    "duplicate sequence index {}",
                    pair[0].selection.sequence_index
                )));
            }
        }

        let catalog = self.index.catalog().clone();
        let mut items: Vec<CompositionItem> = Vec::with_capacity(ordered.len());
        let mut prev_end: Option<DateTime<Utc>> = None;
        let mut prev_staff: Option<Uuid> = None;
        // Chain-internal occupancy, invisible to the index until a hold
        // exists: per-staff blocked-until, per-type and per-resource usage.
        let mut staff_blocked_until: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        let mut type_usage: Vec<(calma_catalog::ResourceType, TimeWindow, i32)> = Vec::new();
        let mut resource_usage: Vec<(Uuid, TimeWindow, i32)> = Vec::new();

        for choice in &ordered {
            let idx = choice.selection.sequence_index;
            let quantity = choice.selection.quantity;
            self.policy.validate_party_size(quantity, idx)?;

            let service = catalog
                .service(choice.selection.service_id)
                .filter(|s| s.is_active)
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "selection {}: unknown or inactive service {}",
                        idx, choice.selection.service_id
                    ))
                })?;

            // Earliest feasible start: the chain never leaves a gap, but a
            // client may explicitly pick a later time for a later step.
            let start = match prev_end {
                Some(end) => choice.start_time.max(end),
                None => choice.start_time,
            };
            let bumped = start != choice.start_time;
            let service_window = service.service_window(start)?;
            let occupancy = service.occupancy_window(start)?;

            let staff_id = self.pick_staff(
                &service,
                &occupancy,
                prev_staff,
                &staff_blocked_until,
                now,
                idx,
                bumped,
            )?;

            let mut resource_ids: Vec<Uuid> = Vec::new();
            let mut resource_units: Vec<(calma_catalog::ResourceType, i32)> = Vec::new();
            for req in &service.requirements {
                let needed = quantity * req.units_per_person;
                let chain_used: i32 = type_usage
                    .iter()
                    .filter(|(rt, w, _)| *rt == req.resource_type && w.overlaps(&occupancy))
                    .map(|(_, _, units)| units)
                    .sum();
                let free = self
                    .index
                    .resource_capacity(req.resource_type, occupancy.start(), occupancy.end(), now)?
                    - chain_used;
                if free < needed {
                    return Err(EngineError::CapacityExceeded {
                        selection_index: idx,
                        requested: needed,
                        available: free.max(0),
                    });
                }
                let assigned = self.assign_resources(
                    req.resource_type,
                    needed,
                    &occupancy,
                    &resource_usage,
                    now,
                    idx,
                )?;
                for (id, units) in &assigned {
                    resource_ids.push(*id);
                    resource_usage.push((*id, occupancy, *units));
                }
                resource_units.push((req.resource_type, needed));
                type_usage.push((req.resource_type, occupancy, needed));
            }

            items.push(CompositionItem {
                selection: choice.selection,
                start_time: start,
                end_time: service_window.end(),
                blocked_until: occupancy.end(),
                staff_id,
                resource_ids,
                resource_units,
                price_cents: service.price_cents * quantity,
            });

            prev_end = Some(service_window.end());
            prev_staff = Some(staff_id);
            let blocked = staff_blocked_until.entry(staff_id).or_insert(occupancy.end());
            *blocked = (*blocked).max(occupancy.end());
        }

        let total_cents = items.iter().map(|item| item.price_cents).sum();
        Ok(Composition { items, total_cents })
    }

    /// Continuity first: reuse the previous step's staff when they are
    /// capable and can meet the window. Otherwise the least-loaded capable
    /// staff, ties broken by lowest id for determinism.
    #[allow(clippy::too_many_arguments)]
    fn pick_staff(
        &self,
        service: &calma_catalog::Service,
        occupancy: &TimeWindow,
        prev_staff: Option<Uuid>,
        staff_blocked_until: &HashMap<Uuid, DateTime<Utc>>,
        now: DateTime<Utc>,
        idx: usize,
        bumped: bool,
    ) -> EngineResult<Uuid> {
        let chain_blocked = |staff_id: Uuid| -> bool {
            staff_blocked_until
                .get(&staff_id)
                .map(|blocked_until| occupancy.start() < *blocked_until)
                .unwrap_or(false)
        };

        if let Some(staff_id) = prev_staff {
            let capable = self
                .index
                .catalog()
                .staff(staff_id)
                .map(|s| s.can_perform(service.id))
                .unwrap_or(false);
            if capable
                && !chain_blocked(staff_id)
                && self
                    .index
                    .staff_free(staff_id, occupancy.start(), occupancy.end(), now)?
            {
                return Ok(staff_id);
            }
        }

        let mut candidates: Vec<(usize, Uuid)> = Vec::new();
        let mut excluded_by_chain = 0usize;
        for staff in self.index.catalog().capable_staff(service.id) {
            if chain_blocked(staff.id) {
                excluded_by_chain += 1;
                continue;
            }
            if self
                .index
                .staff_free(staff.id, occupancy.start(), occupancy.end(), now)?
            {
                candidates.push((self.index.staff_load(staff.id, now), staff.id));
            }
        }
        candidates.sort();
        match candidates.first() {
            Some((_, staff_id)) => Ok(*staff_id),
            None => {
                let reason = format!(
                    "no capable staff free during [{}, {})",
                    occupancy.start(),
                    occupancy.end()
                );
                // A step that fails because of the chain itself (a forced
                // later start, or staff consumed by earlier steps) is a
                // sequencing failure; otherwise the displayed slot went
                // stale and the client must re-pick.
                if bumped || excluded_by_chain > 0 {
                    Err(EngineError::SequenceUnsatisfiable {
                        selection_index: idx,
                        reason,
                    })
                } else {
                    Err(EngineError::SlotNoLongerAvailable {
                        selection_index: idx,
                        reason,
                    })
                }
            }
        }
    }

    /// Spread `needed` units over concrete resources of the type, fewest
    /// future commitments first, ties by lowest id. Aggregate capacity was
    /// already checked; this only decides which assets serve the party.
    fn assign_resources(
        &self,
        resource_type: calma_catalog::ResourceType,
        needed: i32,
        occupancy: &TimeWindow,
        resource_usage: &[(Uuid, TimeWindow, i32)],
        now: DateTime<Utc>,
        idx: usize,
    ) -> EngineResult<Vec<(Uuid, i32)>> {
        let mut candidates = self.index.catalog().resources_of(resource_type);
        candidates.sort_by_key(|r| (self.index.resource_load(r.id, now), r.id));

        let mut assigned: Vec<(Uuid, i32)> = Vec::new();
        let mut remaining = needed;
        for resource in candidates {
            if remaining == 0 {
                break;
            }
            let chain_used: i32 = resource_usage
                .iter()
                .filter(|(id, w, _)| *id == resource.id && w.overlaps(occupancy))
                .map(|(_, _, units)| units)
                .sum();
            let free_units = (resource.capacity - chain_used).max(0);
            if free_units == 0 {
                continue;
            }
            let take = free_units.min(remaining);
            assigned.push((resource.id, take));
            remaining -= take;
        }
        if remaining > 0 {
            return Err(EngineError::CapacityExceeded {
                selection_index: idx,
                requested: needed,
                available: needed - remaining,
            });
        }
        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitments::CommitmentFeed;
    use crate::hold::HoldManager;
    use crate::ledger::CapacityLedger;
    use crate::models::ServiceSelection;
    use crate::repository::InMemoryBookingStore;
    use calma_catalog::{
        AvailabilityWindow, CatalogRegistry, DayOfWeek, Resource, ResourceRequirement,
        ResourceType, Service, Staff,
    };
    use chrono::{NaiveTime, TimeZone};
    use std::sync::Arc;

    struct Fixture {
        holds: Arc<HoldManager>,
        composer: SequentialComposer,
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // 2026-03-02 is a Monday
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn fixture(catalog: Arc<CatalogRegistry>) -> Fixture {
        let ledger = Arc::new(CapacityLedger::new());
        let holds = Arc::new(HoldManager::new(
            Arc::clone(&ledger),
            Arc::clone(&catalog),
            calma_schedule::SchedulingPolicy::default(),
            600,
        ));
        let store = Arc::new(InMemoryBookingStore::new());
        let feed = Arc::new(CommitmentFeed::new(Arc::clone(&holds), store));
        let index = AvailabilityIndex::new(catalog, feed);
        let composer = SequentialComposer::new(index, calma_schedule::SchedulingPolicy::default());
        Fixture { holds, composer }
    }

    fn room_service(name: &str, duration: i32, buffer: i32, price: i32) -> Service {
        Service::new(
            name.to_string(),
            duration,
            buffer,
            price,
            vec![ResourceRequirement {
                resource_type: ResourceType::Room,
                units_per_person: 1,
            }],
        )
    }

    fn open_staff(name: &str, service_ids: &[Uuid]) -> Staff {
        let mut staff = Staff::new(name.to_string(), vec!["massage".to_string()]);
        staff.service_ids.extend_from_slice(service_ids);
        staff.windows.push(AvailabilityWindow {
            day: DayOfWeek::Monday,
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            is_available: true,
        });
        staff
    }

    fn choice(service_id: Uuid, quantity: i32, idx: usize, start: DateTime<Utc>) -> SlotChoice {
        SlotChoice {
            selection: ServiceSelection {
                service_id,
                quantity,
                sequence_index: idx,
            },
            start_time: start,
        }
    }

    /// Two services back-to-back with one staff available throughout:
    /// [09:00-09:30, 09:30-10:15] on the same staff member.
    #[test]
    fn test_back_to_back_chain_on_single_staff() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let b = room_service("Massage 45", 45, 0, 11000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 1))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(9, 30))],
                at(8, 0),
            )
            .unwrap();

        assert_eq!(composition.items.len(), 2);
        assert_eq!(composition.items[0].start_time, at(9, 0));
        assert_eq!(composition.items[0].end_time, at(9, 30));
        assert_eq!(composition.items[1].start_time, at(9, 30));
        assert_eq!(composition.items[1].end_time, at(10, 15));
        assert_eq!(composition.items[0].staff_id, composition.items[1].staff_id);
        assert_eq!(composition.total_cents, 19000);
    }

    /// A second step chosen before the first one ends is pulled forward to
    /// start exactly at the previous end, never overlapping.
    #[test]
    fn test_overlapping_choice_is_bumped_to_chain_end() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let b = room_service("Facial", 30, 0, 7000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 2))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(9, 0))],
                at(8, 0),
            )
            .unwrap();
        assert_eq!(composition.items[1].start_time, at(9, 30));
    }

    /// An explicitly later re-pick for a later step is respected.
    #[test]
    fn test_explicit_later_start_is_kept() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let b = room_service("Facial", 30, 0, 7000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 1))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(11, 0))],
                at(8, 0),
            )
            .unwrap();
        assert_eq!(composition.items[1].start_time, at(11, 0));
    }

    /// The previous staff's buffer keeps them blocked, so the chain hands
    /// the next step to another capable staff member.
    #[test]
    fn test_buffer_forces_staff_switch() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Deep tissue", 30, 15, 9000);
        let b = room_service("Facial", 30, 0, 7000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 2))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        catalog.upsert_staff(open_staff("Mar", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(9, 30))],
                at(8, 0),
            )
            .unwrap();
        assert_ne!(composition.items[0].staff_id, composition.items[1].staff_id);
    }

    /// With a single capable staff member, the blocked buffer makes the
    /// later step unsatisfiable rather than a stale-slot failure.
    #[test]
    fn test_single_staff_buffer_is_sequence_unsatisfiable() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Deep tissue", 30, 15, 9000);
        let b = room_service("Facial", 30, 0, 7000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 2))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let err = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(9, 30))],
                at(8, 0),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SequenceUnsatisfiable {
                selection_index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_party_larger_than_capacity_is_rejected() {
        let catalog = Arc::new(CatalogRegistry::new());
        let ritual = Service::new(
            "Hammam ritual".to_string(),
            45,
            0,
            6500,
            vec![ResourceRequirement {
                resource_type: ResourceType::Hammam,
                units_per_person: 1,
            }],
        );
        let ritual_id = ritual.id;
        catalog.upsert_service(ritual).unwrap();
        catalog
            .upsert_resource(Resource::new("Hammam".to_string(), ResourceType::Hammam, 2))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[ritual_id])).unwrap();
        let f = fixture(catalog);

        let err = f
            .composer
            .compose(&[choice(ritual_id, 3, 0, at(10, 0))], at(8, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::CapacityExceeded {
                selection_index: 0,
                requested: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn test_party_size_policy_cap() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let a_id = a.id;
        catalog.upsert_service(a).unwrap();
        let f = fixture(catalog);

        let err = f
            .composer
            .compose(&[choice(a_id, 5, 0, at(9, 0))], at(8, 0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    /// A hold taken by another client between display and submission makes
    /// the re-validation fail as a stale slot.
    #[test]
    fn test_stale_slot_lost_to_other_client() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let a_id = a.id;
        catalog.upsert_service(a).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 1))
            .unwrap();
        let staff = open_staff("Sol", &[a_id]);
        let staff_id = staff.id;
        catalog.upsert_staff(staff).unwrap();
        let f = fixture(Arc::clone(&catalog));

        // Another client's composition wins the window first.
        let other = f
            .composer
            .compose(&[choice(a_id, 1, 0, at(10, 0))], at(8, 0))
            .unwrap();
        assert_eq!(other.items[0].staff_id, staff_id);
        f.holds
            .create_hold(other, "client-x".to_string(), at(8, 0))
            .unwrap();

        let err = f
            .composer
            .compose(&[choice(a_id, 1, 0, at(10, 0))], at(8, 5))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::SlotNoLongerAvailable {
                selection_index: 0,
                ..
            }
        ));
    }

    /// Continuity of care: the second step keeps the first step's staff
    /// even when another capable staff member is idle.
    #[test]
    fn test_continuity_preferred_over_rebalancing() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let b = room_service("Facial", 30, 0, 7000);
        let (a_id, b_id) = (a.id, b.id);
        catalog.upsert_service(a).unwrap();
        catalog.upsert_service(b).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 4))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id, b_id])).unwrap();
        catalog.upsert_staff(open_staff("Mar", &[a_id, b_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(b_id, 1, 1, at(9, 30))],
                at(8, 0),
            )
            .unwrap();
        assert_eq!(composition.items[0].staff_id, composition.items[1].staff_id);
    }

    /// Equal load resolves to the lowest staff id, so identical requests
    /// compose identically.
    #[test]
    fn test_deterministic_tie_break() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let a_id = a.id;
        catalog.upsert_service(a).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 2))
            .unwrap();
        let s1 = open_staff("Sol", &[a_id]);
        let s2 = open_staff("Mar", &[a_id]);
        let expected = s1.id.min(s2.id);
        catalog.upsert_staff(s1).unwrap();
        catalog.upsert_staff(s2).unwrap();
        let f = fixture(catalog);

        for _ in 0..3 {
            let composition = f
                .composer
                .compose(&[choice(a_id, 1, 0, at(9, 0))], at(8, 0))
                .unwrap();
            assert_eq!(composition.items[0].staff_id, expected);
        }
    }

    /// A two-person selection draws two rooms.
    #[test]
    fn test_party_of_two_gets_two_rooms() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let a_id = a.id;
        catalog.upsert_service(a).unwrap();
        catalog
            .upsert_resource(Resource::new("Room 1".to_string(), ResourceType::Room, 1))
            .unwrap();
        catalog
            .upsert_resource(Resource::new("Room 2".to_string(), ResourceType::Room, 1))
            .unwrap();
        catalog.upsert_staff(open_staff("Sol", &[a_id])).unwrap();
        let f = fixture(catalog);

        let composition = f
            .composer
            .compose(&[choice(a_id, 2, 0, at(9, 0))], at(8, 0))
            .unwrap();
        assert_eq!(composition.items[0].resource_ids.len(), 2);
        assert_eq!(composition.items[0].price_cents, 16000);
    }

    #[test]
    fn test_empty_basket_and_duplicate_indices() {
        let catalog = Arc::new(CatalogRegistry::new());
        let a = room_service("Massage 30", 30, 0, 8000);
        let a_id = a.id;
        catalog.upsert_service(a).unwrap();
        let f = fixture(catalog);

        assert!(matches!(
            f.composer.compose(&[], at(8, 0)),
            Err(EngineError::Validation(_))
        ));
        let err = f
            .composer
            .compose(
                &[choice(a_id, 1, 0, at(9, 0)), choice(a_id, 1, 0, at(9, 30))],
                at(8, 0),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}

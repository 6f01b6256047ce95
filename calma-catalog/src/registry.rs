use std::collections::HashMap;
use std::sync::RwLock;

use calma_core::{EngineError, EngineResult};
use uuid::Uuid;

use crate::model::{Resource, ResourceType, Service, Staff};

/// Read-mostly registry of reference data. Mutation happens through admin
/// management outside the booking hot path; lookups clone so readers never
/// hold the lock across engine calls.
pub struct CatalogRegistry {
    staff: RwLock<HashMap<Uuid, Staff>>,
    resources: RwLock<HashMap<Uuid, Resource>>,
    services: RwLock<HashMap<Uuid, Service>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self {
            staff: RwLock::new(HashMap::new()),
            resources: RwLock::new(HashMap::new()),
            services: RwLock::new(HashMap::new()),
        }
    }

    pub fn upsert_staff(&self, staff: Staff) -> EngineResult<()> {
        for w in &staff.windows {
            if w.end <= w.start {
                return Err(EngineError::Validation(format!(
                    "availability window ends at {} before it starts at {}",
                    w.end, w.start
                )));
            }
        }
        self.staff.write().unwrap().insert(staff.id, staff);
        Ok(())
    }

    pub fn upsert_resource(&self, resource: Resource) -> EngineResult<()> {
        if resource.capacity < 1 {
            return Err(EngineError::Validation(format!(
                "resource {} must have capacity >= 1",
                resource.name
            )));
        }
        self.resources.write().unwrap().insert(resource.id, resource);
        Ok(())
    }

    pub fn upsert_service(&self, service: Service) -> EngineResult<()> {
        if service.duration_minutes < 1 {
            return Err(EngineError::Validation(format!(
                "service {} must have duration >= 1 minute",
                service.name
            )));
        }
        if service.buffer_minutes < 0 {
            return Err(EngineError::Validation(format!(
                "service {} has negative buffer",
                service.name
            )));
        }
        for req in &service.requirements {
            if req.units_per_person < 1 {
                return Err(EngineError::Validation(format!(
                    "service {} requires less than one unit per person",
                    service.name
                )));
            }
        }
        self.services.write().unwrap().insert(service.id, service);
        Ok(())
    }

    pub fn staff(&self, id: Uuid) -> Option<Staff> {
        self.staff.read().unwrap().get(&id).cloned()
    }

    pub fn resource(&self, id: Uuid) -> Option<Resource> {
        self.resources.read().unwrap().get(&id).cloned()
    }

    pub fn service(&self, id: Uuid) -> Option<Service> {
        self.services.read().unwrap().get(&id).cloned()
    }

    /// Soft-deactivation only: historical bookings keep referencing the id.
    pub fn deactivate_staff(&self, id: Uuid) -> bool {
        match self.staff.write().unwrap().get_mut(&id) {
            Some(staff) => {
                staff.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn deactivate_resource(&self, id: Uuid) -> bool {
        match self.resources.write().unwrap().get_mut(&id) {
            Some(resource) => {
                resource.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn deactivate_service(&self, id: Uuid) -> bool {
        match self.services.write().unwrap().get_mut(&id) {
            Some(service) => {
                service.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Active staff able to perform the service, sorted by id for
    /// deterministic downstream tie-breaks.
    pub fn capable_staff(&self, service_id: Uuid) -> Vec<Staff> {
        let mut capable: Vec<Staff> = self
            .staff
            .read()
            .unwrap()
            .values()
            .filter(|s| s.is_active && s.can_perform(service_id))
            .cloned()
            .collect();
        capable.sort_by_key(|s| s.id);
        capable
    }

    /// Active resources of a type, sorted by id.
    pub fn resources_of(&self, resource_type: ResourceType) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self
            .resources
            .read()
            .unwrap()
            .values()
            .filter(|r| r.is_active && r.resource_type == resource_type)
            .cloned()
            .collect();
        resources.sort_by_key(|r| r.id);
        resources
    }

    /// Total declared capacity of active resources of a type.
    pub fn total_capacity(&self, resource_type: ResourceType) -> i32 {
        self.resources
            .read()
            .unwrap()
            .values()
            .filter(|r| r.is_active && r.resource_type == resource_type)
            .map(|r| r.capacity)
            .sum()
    }
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub mod model;
pub mod registry;

pub use model::{
    AvailabilityWindow, DayOfWeek, Resource, ResourceRequirement, ResourceType, Service, Staff,
};
pub use registry::CatalogRegistry;

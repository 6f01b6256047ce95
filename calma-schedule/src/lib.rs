pub mod availability;
pub mod policy;
pub mod slots;

pub use availability::{AvailabilityIndex, CommitmentSource};
pub use policy::SchedulingPolicy;
pub use slots::{Slot, SlotGenerator, SlotIter};

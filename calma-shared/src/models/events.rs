use uuid::Uuid;

pub const ACTIVITY_HELD: &str = "HELD";
pub const ACTIVITY_RELEASED: &str = "RELEASED";
pub const ACTIVITY_EXPIRED: &str = "EXPIRED";
pub const ACTIVITY_BOOKED: &str = "BOOKED";
pub const ACTIVITY_CANCELLED: &str = "CANCELLED";

/// Capacity movement on a service's time grid, broadcast so connected
/// clients can refresh the affected slots without polling.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SlotActivityEvent {
    pub kind: String,
    pub service_id: Uuid,
    pub hold_id: Uuid,
    pub start_time: i64,
    pub end_time: i64,
    pub quantity: i32,
    pub at: i64,
}

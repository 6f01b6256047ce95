use calma_catalog::ResourceType;
use calma_shared::pii::Masked;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::LedgerClaim;

/// One line item of the client's basket: a service booked for `quantity`
/// persons at position `sequence_index` in the back-to-back chain. A plain
/// value object; the engine holds no mutable session state for baskets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSelection {
    pub service_id: Uuid,
    pub quantity: i32,
    pub sequence_index: usize,
}

/// A selection paired with the start time the client picked from the slot
/// grid. The time is a hint until the composer re-validates it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotChoice {
    pub selection: ServiceSelection,
    pub start_time: DateTime<Utc>,
}

/// A fully assigned step of a validated composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionItem {
    pub selection: ServiceSelection,
    pub start_time: DateTime<Utc>,
    /// Service end: the next chained service starts exactly here.
    pub end_time: DateTime<Utc>,
    /// Staff and resources stay blocked until here (service end + buffer).
    pub blocked_until: DateTime<Utc>,
    pub staff_id: Uuid,
    pub resource_ids: Vec<Uuid>,
    /// Units claimed per resource type, for capacity accounting.
    pub resource_units: Vec<(ResourceType, i32)>,
    pub price_cents: i32,
}

/// The validated, fully assigned outcome of the sequential composer.
/// Nothing is reserved yet; the hold manager turns this into capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    pub items: Vec<CompositionItem>,
    pub total_cents: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    Pending,
    Committed,
    Expired,
    Released,
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HoldStatus::Pending => "PENDING",
            HoldStatus::Committed => "COMMITTED",
            HoldStatus::Expired => "EXPIRED",
            HoldStatus::Released => "RELEASED",
        };
        write!(f, "{}", label)
    }
}

/// A time-boxed soft reservation of capacity pending payment confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub client_id: String,
    pub items: Vec<CompositionItem>,
    /// The exact ledger claims this hold reserved, so release and expiry
    /// decrement the same buckets exactly once.
    pub claims: Vec<LedgerClaim>,
    pub total_cents: i32,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// Committed, expired and released are all terminal; nothing returns to
    /// pending.
    pub fn is_terminal(&self) -> bool {
        self.status != HoldStatus::Pending
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == HoldStatus::Pending && now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        };
        write!(f, "{}", label)
    }
}

/// Client contact details carried on the durable booking. Phone and email
/// are masked in Debug output so they never leak into logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: String,
    pub phone: Masked<String>,
    pub email: Option<Masked<String>>,
}

/// One delivered service within a booking, with the price snapshot taken at
/// commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingItem {
    pub id: Uuid,
    pub service_id: Uuid,
    pub quantity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub blocked_until: DateTime<Utc>,
    pub staff_id: Uuid,
    pub resource_ids: Vec<Uuid>,
    pub resource_units: Vec<(ResourceType, i32)>,
    pub price_cents: i32,
}

impl BookingItem {
    pub fn from_composition_item(item: &CompositionItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: item.selection.service_id,
            quantity: item.selection.quantity,
            start_time: item.start_time,
            end_time: item.end_time,
            blocked_until: item.blocked_until,
            staff_id: item.staff_id,
            resource_ids: item.resource_ids.clone(),
            resource_units: item.resource_units.clone(),
            price_cents: item.price_cents,
        }
    }
}

/// Snapshot of the cancellation terms in force when the booking was
/// committed; later policy edits never touch existing bookings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CancellationPolicy {
    pub free_cancellation_hours: i64,
    pub late_cancel_forfeits_guarantee: bool,
}

/// The durable result of a committed hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub client_id: String,
    pub contact: Option<ClientContact>,
    pub hold_id: Uuid,
    pub items: Vec<BookingItem>,
    pub total_cents: i32,
    pub guarantee_cents: i32,
    pub currency: String,
    pub policy: CancellationPolicy,
    pub claims: Vec<LedgerClaim>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn update_status(&mut self, new_status: BookingStatus, at: DateTime<Utc>) {
        self.status = new_status;
        self.updated_at = at;
    }

    /// Start of the earliest item, the reference point for the cancellation
    /// window.
    pub fn first_start(&self) -> Option<DateTime<Utc>> {
        self.items.iter().map(|item| item.start_time).min()
    }
}

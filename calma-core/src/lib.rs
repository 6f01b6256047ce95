pub mod payment;
pub mod time;

use uuid::Uuid;

/// Failure taxonomy shared by every engine crate. Each variant carries
/// enough detail for the caller to re-query fresh slots and let the client
/// choose again, never a bare "booking failed".
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    #[error("Capacity exceeded for selection {selection_index}: requested {requested}, available {available}")]
    CapacityExceeded {
        selection_index: usize,
        requested: i32,
        available: i32,
    },

    #[error("Slot no longer available for selection {selection_index}: {reason}")]
    SlotNoLongerAvailable {
        selection_index: usize,
        reason: String,
    },

    #[error("Sequence cannot be placed at selection {selection_index}: {reason}")]
    SequenceUnsatisfiable {
        selection_index: usize,
        reason: String,
    },

    #[error("Hold expired: {0}")]
    HoldExpired(Uuid),

    #[error("Hold not found: {0}")]
    HoldNotFound(Uuid),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

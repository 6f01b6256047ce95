pub mod commitments;
pub mod composer;
pub mod guarantee;
pub mod hold;
pub mod ledger;
pub mod manager;
pub mod models;
pub mod repository;

pub use commitments::CommitmentFeed;
pub use composer::SequentialComposer;
pub use guarantee::{GuaranteeOrchestrator, MockGuaranteeAdapter};
pub use hold::{HoldJournal, HoldManager, JournalRecord};
pub use ledger::{BucketKey, CapacityLedger, LedgerClaim};
pub use manager::{BookingManager, BookingRules, CancellationOutcome};
pub use models::{
    Booking, BookingItem, BookingStatus, ClientContact, Composition, CompositionItem, Hold,
    HoldStatus, ServiceSelection, SlotChoice,
};
pub use repository::{BookingRepository, InMemoryBookingStore};

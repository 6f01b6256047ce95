use std::sync::Arc;

use calma_booking::{
    BookingManager, BookingRepository, BookingRules, CapacityLedger, CommitmentFeed,
    GuaranteeOrchestrator, HoldManager, InMemoryBookingStore, MockGuaranteeAdapter,
    SequentialComposer,
};
use calma_catalog::CatalogRegistry;
use calma_schedule::{AvailabilityIndex, SchedulingPolicy, SlotGenerator};
use calma_store::app_config::{BusinessRules, Config};
use calma_store::{EventBus, FileHoldJournal};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogRegistry>,
    pub holds: Arc<HoldManager>,
    pub bookings: Arc<BookingManager>,
    pub generator: Arc<SlotGenerator>,
    pub composer: Arc<SequentialComposer>,
    pub guarantee: Arc<GuaranteeOrchestrator>,
    pub bus: EventBus,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    /// Wire the whole engine from configuration: journal replay, hold
    /// recovery, availability feed, composer and managers. Used by the
    /// binary and by the integration tests.
    pub fn build(config: &Config) -> anyhow::Result<Self> {
        let rules = &config.business_rules;
        let policy = SchedulingPolicy {
            slot_granularity_minutes: rules.slot_granularity_minutes,
            min_lead_minutes: rules.min_lead_minutes,
            advance_booking_days: rules.advance_booking_days,
            max_party_size: rules.max_party_size,
        };

        let catalog = Arc::new(CatalogRegistry::new());
        let ledger = Arc::new(CapacityLedger::new());

        // Replay before attaching the journal so recovery is not re-logged.
        let recovered = FileHoldJournal::replay(&config.journal.path)?;
        let journal = Arc::new(FileHoldJournal::open(&config.journal.path)?);
        let holds = Arc::new(
            HoldManager::new(
                Arc::clone(&ledger),
                Arc::clone(&catalog),
                policy,
                rules.hold_ttl_seconds,
            )
            .with_journal(journal),
        );
        holds.recover(recovered);

        let booking_store = Arc::new(InMemoryBookingStore::new());
        let feed = Arc::new(CommitmentFeed::new(
            Arc::clone(&holds),
            Arc::clone(&booking_store),
        ));
        let index = AvailabilityIndex::new(Arc::clone(&catalog), feed);
        let generator = Arc::new(SlotGenerator::new(index.clone(), policy));
        let composer = Arc::new(SequentialComposer::new(index, policy));

        let bookings = Arc::new(BookingManager::new(
            Arc::clone(&holds),
            Arc::clone(&booking_store) as Arc<dyn BookingRepository>,
            ledger,
            BookingRules {
                guarantee_percent: rules.guarantee_percent,
                free_cancellation_hours: rules.free_cancellation_hours,
                currency: rules.currency.clone(),
            },
        ));
        let guarantee = Arc::new(GuaranteeOrchestrator::new(Arc::new(MockGuaranteeAdapter)));

        Ok(Self {
            catalog,
            holds,
            bookings,
            generator,
            composer,
            guarantee,
            bus: EventBus::new(100),
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
            },
            business_rules: config.business_rules.clone(),
        })
    }
}

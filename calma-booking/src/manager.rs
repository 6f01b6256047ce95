use std::sync::Arc;

use calma_core::payment::ConfirmationToken;
use calma_core::{EngineError, EngineResult};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::hold::HoldManager;
use crate::ledger::CapacityLedger;
use crate::models::{
    Booking, BookingItem, BookingStatus, CancellationPolicy, ClientContact, Hold,
};
use crate::repository::BookingRepository;

/// Commercial terms applied when a hold becomes a booking.
#[derive(Debug, Clone)]
pub struct BookingRules {
    /// Share of the total taken as the no-show guarantee.
    pub guarantee_percent: f64,
    pub free_cancellation_hours: i64,
    pub currency: String,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            guarantee_percent: 0.3,
            free_cancellation_hours: 24,
            currency: "EUR".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub guarantee_refunded: bool,
}

/// Turns committed holds into durable bookings and drives the booking
/// lifecycle: `confirmed → {cancelled, completed, no_show}`.
pub struct BookingManager {
    holds: Arc<HoldManager>,
    repo: Arc<dyn BookingRepository>,
    ledger: Arc<CapacityLedger>,
    rules: BookingRules,
}

impl BookingManager {
    pub fn new(
        holds: Arc<HoldManager>,
        repo: Arc<dyn BookingRepository>,
        ledger: Arc<CapacityLedger>,
        rules: BookingRules,
    ) -> Self {
        Self {
            holds,
            repo,
            ledger,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub fn guarantee_amount(&self, total_cents: i32) -> i32 {
        (total_cents as f64 * self.rules.guarantee_percent).round() as i32
    }

    /// Commit a pending, unexpired hold once the payment collaborator has
    /// confirmed the guarantee. The hold's ledger increments stay in place;
    /// they now represent the booking.
    pub async fn commit(
        &self,
        hold_id: Uuid,
        confirmation: &ConfirmationToken,
        contact: Option<ClientContact>,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        if confirmation.hold_id != hold_id {
            return Err(EngineError::Validation(format!(
                "confirmation token was issued for hold {}, not {}",
                confirmation.hold_id, hold_id
            )));
        }
        let hold = self.holds.begin_commit(hold_id, now)?;
        let booking = self.materialize(&hold, contact, now);
        self.repo
            .save_booking(&booking)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        tracing::info!(booking_id = %booking.id, hold_id = %hold_id, "booking confirmed");
        Ok(booking)
    }

    fn materialize(&self, hold: &Hold, contact: Option<ClientContact>, now: DateTime<Utc>) -> Booking {
        let items: Vec<BookingItem> = hold
            .items
            .iter()
            .map(BookingItem::from_composition_item)
            .collect();
        Booking {
            id: Uuid::new_v4(),
            client_id: hold.client_id.clone(),
            contact,
            hold_id: hold.id,
            total_cents: hold.total_cents,
            guarantee_cents: self.guarantee_amount(hold.total_cents),
            currency: self.rules.currency.clone(),
            policy: CancellationPolicy {
                free_cancellation_hours: self.rules.free_cancellation_hours,
                late_cancel_forfeits_guarantee: true,
            },
            claims: hold.claims.clone(),
            items,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn get(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.repo
            .get_booking(booking_id)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?
            .ok_or(EngineError::BookingNotFound(booking_id))
    }

    pub async fn list_for_client(&self, client_id: &str) -> EngineResult<Vec<Booking>> {
        self.repo
            .list_bookings(client_id)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Cancel under the policy snapshot taken at commit time: inside the
    /// free window the guarantee is refunded, after it the guarantee is
    /// forfeited. Either way the capacity goes back to the ledger.
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<CancellationOutcome> {
        let mut booking = self.get(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                from: format!("{:?}", booking.status),
                to: "Cancelled".to_string(),
            });
        }
        let guarantee_refunded = match booking.first_start() {
            Some(start) => now + Duration::hours(booking.policy.free_cancellation_hours) <= start,
            None => true,
        };
        self.ledger.release_all(&booking.claims);
        booking.update_status(BookingStatus::Cancelled, now);
        self.repo
            .save_booking(&booking)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        tracing::info!(booking_id = %booking.id, guarantee_refunded, "booking cancelled");
        Ok(CancellationOutcome {
            booking,
            guarantee_refunded,
        })
    }

    pub async fn complete(&self, booking_id: Uuid, now: DateTime<Utc>) -> EngineResult<Booking> {
        self.transition(booking_id, BookingStatus::Completed, now).await
    }

    pub async fn mark_no_show(&self, booking_id: Uuid, now: DateTime<Utc>) -> EngineResult<Booking> {
        self.transition(booking_id, BookingStatus::NoShow, now).await
    }

    async fn transition(
        &self,
        booking_id: Uuid,
        to: BookingStatus,
        now: DateTime<Utc>,
    ) -> EngineResult<Booking> {
        let mut booking = self.get(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                from: format!("{:?}", booking.status),
                to: format!("{:?}", to),
            });
        }
        booking.update_status(to, now);
        self.repo
            .save_booking(&booking)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(booking)
    }
}

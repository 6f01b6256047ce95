use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use calma_catalog::CatalogRegistry;
use calma_core::time::TimeWindow;
use calma_core::{EngineError, EngineResult};
use calma_schedule::SchedulingPolicy;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{BucketKey, CapacityLedger, LedgerClaim};
use crate::models::{Composition, Hold, HoldStatus};

/// One line of the hold write-ahead log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JournalRecord {
    Created(Hold),
    Transitioned {
        hold_id: Uuid,
        status: HoldStatus,
        at: DateTime<Utc>,
    },
}

/// Sink for the write-ahead log. Appends are best-effort: a journal failure
/// must never fail the booking path, only crash recovery fidelity.
pub trait HoldJournal: Send + Sync {
    fn append(&self, record: &JournalRecord);
}

/// Owns the hold state machine: `pending → {committed, expired, released}`,
/// all three terminal. Every transition happens under the map's write lock,
/// which is what makes the release/sweep/commit races first-wins safe and
/// the capacity release exactly-once.
pub struct HoldManager {
    holds: RwLock<HashMap<Uuid, Hold>>,
    ledger: Arc<CapacityLedger>,
    catalog: Arc<CatalogRegistry>,
    policy: SchedulingPolicy,
    ttl: Duration,
    journal: Option<Arc<dyn HoldJournal>>,
}

impl HoldManager {
    pub fn new(
        ledger: Arc<CapacityLedger>,
        catalog: Arc<CatalogRegistry>,
        policy: SchedulingPolicy,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            holds: RwLock::new(HashMap::new()),
            ledger,
            catalog,
            policy,
            ttl: Duration::seconds(ttl_seconds as i64),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn HoldJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.ledger
    }

    fn record(&self, record: JournalRecord) {
        if let Some(journal) = &self.journal {
            journal.append(&record);
        }
    }

    /// Ledger claims implied by one composition item: one unit of the staff
    /// member and the needed resource units, for every granularity bucket
    /// the buffered window touches.
    fn claims_for(&self, item: &crate::models::CompositionItem) -> EngineResult<Vec<LedgerClaim>> {
        let occupancy = TimeWindow::new(item.start_time, item.blocked_until)?;
        let mut claims = Vec::new();
        for bucket_start in self.policy.buckets_spanning(&occupancy) {
            claims.push(LedgerClaim {
                key: BucketKey::Staff {
                    staff_id: item.staff_id,
                    bucket_start,
                },
                amount: 1,
                limit: 1,
            });
            for (resource_type, units) in &item.resource_units {
                claims.push(LedgerClaim {
                    key: BucketKey::Resource {
                        resource_type: *resource_type,
                        bucket_start,
                    },
                    amount: *units,
                    limit: self.catalog.total_capacity(*resource_type),
                });
            }
        }
        Ok(claims)
    }

    /// Reserve the composition's capacity all-or-nothing and start the TTL.
    /// A lost ledger race surfaces as `SlotNoLongerAvailable` for the item
    /// that collided, with every earlier item's claims rolled back.
    pub fn create_hold(
        &self,
        composition: Composition,
        client_id: String,
        now: DateTime<Utc>,
    ) -> EngineResult<Hold> {
        if composition.items.is_empty() {
            return Err(EngineError::Validation("empty composition".to_string()));
        }

        let mut reserved: Vec<LedgerClaim> = Vec::new();
        for item in &composition.items {
            let item_claims = self.claims_for(item)?;
            // A claim that could never fit is a capacity violation, not a
            // lost race; reject it before touching any bucket.
            if let Some(oversized) = item_claims.iter().find(|c| c.amount > c.limit) {
                self.ledger.release_all(&reserved);
                return Err(EngineError::CapacityExceeded {
                    selection_index: item.selection.sequence_index,
                    requested: oversized.amount,
                    available: oversized.limit,
                });
            }
            if let Err(err) = self.ledger.try_reserve_all(&item_claims) {
                self.ledger.release_all(&reserved);
                return Err(EngineError::SlotNoLongerAvailable {
                    selection_index: item.selection.sequence_index,
                    reason: err.to_string(),
                });
            }
            reserved.extend(item_claims);
        }

        let hold = Hold {
            id: Uuid::new_v4(),
            client_id,
            total_cents: composition.total_cents,
            items: composition.items,
            claims: reserved,
            status: HoldStatus::Pending,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.holds.write().unwrap().insert(hold.id, hold.clone());
        self.record(JournalRecord::Created(hold.clone()));
        tracing::debug!(hold_id = %hold.id, expires_at = %hold.expires_at, "hold created");
        Ok(hold)
    }

    pub fn get(&self, id: Uuid) -> Option<Hold> {
        self.holds.read().unwrap().get(&id).cloned()
    }

    /// Snapshot of every hold, for the availability feed and for admin
    /// inspection. Pure read.
    pub fn snapshot(&self) -> Vec<Hold> {
        self.holds.read().unwrap().values().cloned().collect()
    }

    /// Explicit client abandonment. Releases capacity exactly once;
    /// repeated calls (or racing the sweep) are no-ops, not errors.
    pub fn release_hold(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<Option<Hold>> {
        let mut holds = self.holds.write().unwrap();
        let hold = holds.get_mut(&id).ok_or(EngineError::HoldNotFound(id))?;
        if hold.is_terminal() {
            return Ok(None);
        }
        hold.status = HoldStatus::Released;
        self.ledger.release_all(&hold.claims);
        let released = hold.clone();
        drop(holds);
        self.record(JournalRecord::Transitioned {
            hold_id: id,
            status: HoldStatus::Released,
            at: now,
        });
        tracing::debug!(hold_id = %id, "hold released");
        Ok(Some(released))
    }

    /// Expire every pending hold past its TTL, releasing each one's claims
    /// exactly once. Idempotent: already-terminal holds are untouched, so
    /// the sweep can race a commit safely.
    pub fn expire_sweep(&self, now: DateTime<Utc>) -> Vec<Hold> {
        let mut expired = Vec::new();
        {
            let mut holds = self.holds.write().unwrap();
            for hold in holds.values_mut() {
                if hold.is_expired(now) {
                    hold.status = HoldStatus::Expired;
                    self.ledger.release_all(&hold.claims);
                    expired.push(hold.clone());
                }
            }
        }
        for hold in &expired {
            self.record(JournalRecord::Transitioned {
                hold_id: hold.id,
                status: HoldStatus::Expired,
                at: now,
            });
        }
        expired
    }

    /// Flip a pending, unexpired hold to committed and hand it to the
    /// booking manager. The ledger increments stay in place: they now back
    /// the booking instead of the hold.
    pub fn begin_commit(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<Hold> {
        let mut holds = self.holds.write().unwrap();
        let hold = holds.get_mut(&id).ok_or(EngineError::HoldNotFound(id))?;
        match hold.status {
            HoldStatus::Pending if now >= hold.expires_at => {
                hold.status = HoldStatus::Expired;
                self.ledger.release_all(&hold.claims);
                let hold_id = hold.id;
                drop(holds);
                self.record(JournalRecord::Transitioned {
                    hold_id,
                    status: HoldStatus::Expired,
                    at: now,
                });
                Err(EngineError::HoldExpired(id))
            }
            HoldStatus::Pending => {
                hold.status = HoldStatus::Committed;
                let committed = hold.clone();
                drop(holds);
                self.record(JournalRecord::Transitioned {
                    hold_id: id,
                    status: HoldStatus::Committed,
                    at: now,
                });
                Ok(committed)
            }
            HoldStatus::Expired => Err(EngineError::HoldExpired(id)),
            status => Err(EngineError::InvalidTransition {
                from: format!("{:?}", status),
                to: "Committed".to_string(),
            }),
        }
    }

    /// Rebuild pending holds from a journal replay after a crash,
    /// re-reserving their claims against the fresh ledger. Holds whose TTL
    /// elapsed while the process was down fall to the next sweep.
    pub fn recover(&self, pending: Vec<Hold>) {
        let mut holds = self.holds.write().unwrap();
        for hold in pending {
            if hold.status != HoldStatus::Pending {
                continue;
            }
            if let Err(err) = self.ledger.try_reserve_all(&hold.claims) {
                tracing::error!(hold_id = %hold.id, %err, "could not re-reserve recovered hold");
                continue;
            }
            tracing::info!(hold_id = %hold.id, "recovered pending hold");
            holds.insert(hold.id, hold);
        }
    }
}

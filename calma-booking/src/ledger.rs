use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use calma_catalog::ResourceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one atomic counter: a staff member or a resource type during
/// one granularity-aligned time bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BucketKey {
    Staff {
        staff_id: Uuid,
        bucket_start: DateTime<Utc>,
    },
    Resource {
        resource_type: ResourceType,
        bucket_start: DateTime<Utc>,
    },
}

/// One unit of work for the ledger: reserve `amount` in the bucket, which
/// admits at most `limit` concurrent units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerClaim {
    pub key: BucketKey,
    pub amount: i32,
    pub limit: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity { requested: i32, available: i32 },
}

struct CapacityBucket {
    total_capacity: i32,
    held_or_booked: AtomicI32,
}

impl CapacityBucket {
    fn new(total_capacity: i32) -> Self {
        Self {
            total_capacity,
            held_or_booked: AtomicI32::new(0),
        }
    }

    /// Compare-and-increment. Either the full amount lands or nothing
    /// changes; `held_or_booked <= total_capacity` holds at every point.
    fn try_reserve(&self, amount: i32) -> bool {
        let mut current = self.held_or_booked.load(Ordering::SeqCst);
        loop {
            if current + amount > self.total_capacity {
                return false;
            }
            match self.held_or_booked.compare_exchange(
                current,
                current + amount,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, amount: i32) {
        self.held_or_booked.fetch_sub(amount, Ordering::SeqCst);
    }

    fn held(&self) -> i32 {
        self.held_or_booked.load(Ordering::SeqCst)
    }
}

/// The shared atomic-counter primitive behind holds and bookings. There is
/// no global lock: contention is scoped to one bucket at a time, and the
/// map lock is only taken to locate or create buckets.
pub struct CapacityLedger {
    buckets: RwLock<HashMap<BucketKey, Arc<CapacityBucket>>>,
}

impl CapacityLedger {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn bucket_for(&self, claim: &LedgerClaim) -> Arc<CapacityBucket> {
        if let Some(bucket) = self.buckets.read().unwrap().get(&claim.key) {
            return Arc::clone(bucket);
        }
        let mut buckets = self.buckets.write().unwrap();
        Arc::clone(
            buckets
                .entry(claim.key)
                .or_insert_with(|| Arc::new(CapacityBucket::new(claim.limit))),
        )
    }

    /// Reserve every claim or none: a failed claim rolls back the ones
    /// already applied before the error is returned.
    pub fn try_reserve_all(&self, claims: &[LedgerClaim]) -> Result<(), LedgerError> {
        for (applied, claim) in claims.iter().enumerate() {
            let bucket = self.bucket_for(claim);
            if !bucket.try_reserve(claim.amount) {
                for rollback in &claims[..applied] {
                    self.bucket_for(rollback).release(rollback.amount);
                }
                return Err(LedgerError::InsufficientCapacity {
                    requested: claim.amount,
                    available: bucket.total_capacity - bucket.held(),
                });
            }
        }
        Ok(())
    }

    /// Decrement every claim. Callers own the exactly-once guarantee (the
    /// hold state machine); the ledger does not clamp, so a double release
    /// is visible as a negative count instead of silent overbooking room.
    pub fn release_all(&self, claims: &[LedgerClaim]) {
        for claim in claims {
            self.bucket_for(claim).release(claim.amount);
        }
    }

    pub fn held(&self, key: &BucketKey) -> i32 {
        self.buckets
            .read()
            .unwrap()
            .get(key)
            .map(|bucket| bucket.held())
            .unwrap_or(0)
    }
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bucket_at(h: u32) -> BucketKey {
        BucketKey::Resource {
            resource_type: ResourceType::Room,
            bucket_start: Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap(),
        }
    }

    fn claim(key: BucketKey, amount: i32, limit: i32) -> LedgerClaim {
        LedgerClaim { key, amount, limit }
    }

    #[test]
    fn test_reserve_release_lifecycle() {
        let ledger = CapacityLedger::new();
        let claims = vec![claim(bucket_at(9), 2, 3)];

        ledger.try_reserve_all(&claims).unwrap();
        assert_eq!(ledger.held(&bucket_at(9)), 2);

        ledger.try_reserve_all(&claims).unwrap_err();
        assert_eq!(ledger.held(&bucket_at(9)), 2);

        ledger.release_all(&claims);
        assert_eq!(ledger.held(&bucket_at(9)), 0);
    }

    #[test]
    fn test_failed_claim_rolls_back_applied_ones() {
        let ledger = CapacityLedger::new();
        let claims = vec![
            claim(bucket_at(9), 1, 1),
            claim(bucket_at(10), 3, 2), // over the limit
        ];
        let err = ledger.try_reserve_all(&claims).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCapacity {
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(ledger.held(&bucket_at(9)), 0);
        assert_eq!(ledger.held(&bucket_at(10)), 0);
    }

    #[test]
    fn test_concurrent_reserve_admits_exactly_one() {
        let ledger = Arc::new(CapacityLedger::new());
        let claims = vec![claim(bucket_at(14), 1, 1)];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            let claims = claims.clone();
            handles.push(std::thread::spawn(move || {
                ledger.try_reserve_all(&claims).is_ok()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(ledger.held(&bucket_at(14)), 1);
    }
}

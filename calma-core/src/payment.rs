use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof that the payment collaborator authorized the guarantee amount for a
/// hold. The engine never talks to a payment network directly; it only
/// accepts one of these as input to a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub token: String, // Provider's reference (e.g., grt_123)
    pub hold_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub authorized_at: DateTime<Utc>,
}

#[async_trait]
pub trait GuaranteeAdapter: Send + Sync {
    /// Authorize a partial payment hold against the client's card to
    /// discourage no-shows.
    async fn authorize_guarantee(
        &self,
        hold_id: Uuid,
        amount_cents: i32,
        currency: &str,
    ) -> Result<ConfirmationToken, Box<dyn std::error::Error + Send + Sync>>;

    /// Void a previously authorized guarantee (hold released or expired
    /// before commit).
    async fn void_guarantee(
        &self,
        token: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

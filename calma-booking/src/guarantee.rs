use std::sync::Arc;

use async_trait::async_trait;
use calma_core::payment::{ConfirmationToken, GuaranteeAdapter};
use chrono::Utc;
use uuid::Uuid;

/// Bridges the engine to the external payment collaborator between hold
/// creation and commit. The engine only ever sees the resulting token.
pub struct GuaranteeOrchestrator {
    adapter: Arc<dyn GuaranteeAdapter>,
}

impl GuaranteeOrchestrator {
    pub fn new(adapter: Arc<dyn GuaranteeAdapter>) -> Self {
        Self { adapter }
    }

    pub async fn authorize(
        &self,
        hold_id: Uuid,
        amount_cents: i32,
        currency: &str,
    ) -> Result<ConfirmationToken, Box<dyn std::error::Error + Send + Sync>> {
        // A different adapter could be selected here per currency/market.
        self.adapter
            .authorize_guarantee(hold_id, amount_cents, currency)
            .await
    }

    pub async fn void(
        &self,
        token: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.adapter.void_guarantee(token).await
    }
}

/// Local stand-in for the payment collaborator.
pub struct MockGuaranteeAdapter;

#[async_trait]
impl GuaranteeAdapter for MockGuaranteeAdapter {
    async fn authorize_guarantee(
        &self,
        hold_id: Uuid,
        amount_cents: i32,
        currency: &str,
    ) -> Result<ConfirmationToken, Box<dyn std::error::Error + Send + Sync>> {
        if amount_cents < 0 {
            return Err("negative guarantee amount".into());
        }
        Ok(ConfirmationToken {
            // Encode the hold in the token so the mock can "remember" it
            token: format!("mock_grt_{}", hold_id.simple()),
            hold_id,
            amount_cents,
            currency: currency.to_string(),
            authorized_at: Utc::now(),
        })
    }

    async fn void_guarantee(
        &self,
        _token: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_token_is_bound_to_hold() {
        let orchestrator = GuaranteeOrchestrator::new(Arc::new(MockGuaranteeAdapter));
        let hold_id = Uuid::new_v4();
        let token = orchestrator.authorize(hold_id, 2400, "EUR").await.unwrap();
        assert_eq!(token.hold_id, hold_id);
        assert_eq!(token.amount_cents, 2400);
        assert!(token.token.starts_with("mock_grt_"));
    }
}

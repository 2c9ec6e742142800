use async_trait::async_trait;
use serde::Serialize;

use crate::app_error::AppResult;

/// Customer record as known to the payment provider.
#[derive(Debug, Clone, Default)]
pub struct CustomerInfo {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub plan_code: String,
    pub customer_email: String,
    pub account_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub session_id: String,
    /// URL to redirect the user to
    pub checkout_url: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_customer(&self, customer_id: &str) -> AppResult<CustomerInfo>;

    async fn create_checkout_session(&self, request: CheckoutRequest) -> AppResult<CheckoutResult>;

    /// Verifies a webhook payload against the provider's signature header.
    fn verify_webhook_signature(&self, payload: &str, signature_header: &str) -> AppResult<()>;
}

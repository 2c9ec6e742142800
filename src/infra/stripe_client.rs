use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{InfraError, http_client::build_client};
use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        CheckoutRequest, CheckoutResult, CustomerInfo, PaymentProvider,
    },
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Accepted clock skew between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl StripeClient {
    pub fn new(secret_key: SecretString, webhook_secret: SecretString) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client()?,
            secret_key,
            webhook_secret,
        })
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {encoded}")
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read Stripe response: {e}")))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(AppError::Upstream(format!("Stripe API error: {status}")));
            }
            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::InvalidInput(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }
            return Err(AppError::Internal(format!("Stripe API error: {status}")));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Stripe response");
            AppError::Internal(format!("Failed to parse Stripe response: {e}"))
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn retrieve_customer(&self, customer_id: &str) -> AppResult<CustomerInfo> {
        let response = self
            .client
            .get(format!("{STRIPE_API_BASE}/customers/{customer_id}"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {e}")))?;

        let customer: StripeCustomer = self.handle_response(response).await?;
        Ok(CustomerInfo {
            id: customer.id,
            email: customer.email,
        })
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> AppResult<CheckoutResult> {
        let params: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("customer_email", request.customer_email),
            ("client_reference_id", request.account_id.clone()),
            ("metadata[plan_id]", request.plan_code.clone()),
            ("metadata[account_id]", request.account_id),
            ("subscription_data[metadata][plan_id]", request.plan_code),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
        ];

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .header("Authorization", self.auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {e}")))?;

        let session: StripeCheckoutSession = self.handle_response(response).await?;
        Ok(CheckoutResult {
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    fn verify_webhook_signature(&self, payload: &str, signature_header: &str) -> AppResult<()> {
        let secret = self.webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(AppError::Configuration("STRIPE_WEBHOOK_SECRET"));
        }
        verify_signature_at(
            payload,
            signature_header,
            secret,
            chrono::Utc::now().timestamp(),
        )
    }
}

// ========================================================================
// Webhook Signature Verification
// ========================================================================

/// Checks a `Stripe-Signature` header ("t=timestamp,v1=signature,...")
/// against HMAC-SHA256 of `"{t}.{payload}"`.
pub fn verify_signature_at(
    payload: &str,
    signature_header: &str,
    webhook_secret: &str,
    now: i64,
) -> AppResult<()> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::InvalidInput("Missing timestamp in signature".into()))?;
    if signatures.is_empty() {
        return Err(AppError::InvalidInput("Missing signature".into()));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !signatures.iter().any(|sig| constant_time_compare(sig, &expected)) {
        return Err(AppError::InvalidInput("Invalid signature".into()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid timestamp".into()))?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::InvalidInput("Timestamp outside tolerance".into()));
    }
    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
}

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_provider::{
        CheckoutRequest, CheckoutResult, CustomerInfo, PaymentProvider,
    },
};

/// The only `Stripe-Signature` value `StubPaymentProvider` accepts.
pub const VALID_TEST_SIGNATURE: &str = "t=1700000000,v1=valid";

/// Payment provider with a fixed customer directory.
#[derive(Default)]
pub struct StubPaymentProvider {
    customers: Mutex<HashMap<String, Option<String>>>,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    fail_lookups: AtomicBool,
}

impl StubPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, customer_id: &str, email: Option<&str>) {
        self.customers
            .lock()
            .unwrap()
            .insert(customer_id.to_string(), email.map(str::to_string));
    }

    /// Makes every customer lookup fail like a provider outage.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.checkouts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    async fn retrieve_customer(&self, customer_id: &str) -> AppResult<CustomerInfo> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("stripe unavailable".into()));
        }
        let customers = self.customers.lock().unwrap();
        let email = customers.get(customer_id).ok_or(AppError::NotFound)?;
        Ok(CustomerInfo {
            id: customer_id.to_string(),
            email: email.clone(),
        })
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> AppResult<CheckoutResult> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request);
        let session_id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutResult {
            checkout_url: Some(format!("https://checkout.example.test/{session_id}")),
            session_id,
        })
    }

    fn verify_webhook_signature(&self, _payload: &str, signature_header: &str) -> AppResult<()> {
        if signature_header == VALID_TEST_SIGNATURE {
            Ok(())
        } else {
            Err(AppError::InvalidInput("Invalid webhook signature".into()))
        }
    }
}

//! Subscription state driven by payment-provider events, plus checkout.
//!
//! Every update the reconciler writes is an absolute field assignment, so
//! redelivery of the same event converges to the same account state.
//! Ordering between events is not enforced: the last one applied wins.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_provider::{CheckoutRequest, CheckoutResult, PaymentProvider},
        use_cases::identity::{IdentityResolver, ResolvedAccount, normalize_email},
    },
    domain::entities::{
        account::{Account, AccountPatch},
        billing_event::{
            BillingEnvelope, BillingEvent, CheckoutSessionObject, InvoiceObject,
            SubscriptionObject,
        },
        plan::{BASELINE_PLAN, CheckoutPlan, FREE_PLAN},
        subscription_status::SubscriptionStatus,
    },
};

/// Provider price ids for each purchasable plan.
#[derive(Debug, Clone)]
pub struct PlanPrices {
    pub starter: String,
    pub professional: String,
    pub enterprise: String,
}

impl PlanPrices {
    pub fn price_for(&self, plan: CheckoutPlan) -> &str {
        match plan {
            CheckoutPlan::Starter => &self.starter,
            CheckoutPlan::Professional => &self.professional,
            CheckoutPlan::Enterprise => &self.enterprise,
        }
    }
}

/// What happened to a delivered event. Everything except an `Err` from
/// `reconcile` is acknowledged to the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Applied,
    Ignored,
    Dropped,
}

pub struct BillingUseCases {
    resolver: Arc<IdentityResolver>,
    payments: Option<Arc<dyn PaymentProvider>>,
    prices: PlanPrices,
    frontend_url: Url,
}

impl BillingUseCases {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        payments: Option<Arc<dyn PaymentProvider>>,
        prices: PlanPrices,
        frontend_url: Url,
    ) -> Self {
        Self {
            resolver,
            payments,
            prices,
            frontend_url,
        }
    }

    fn provider(&self) -> AppResult<&Arc<dyn PaymentProvider>> {
        self.payments
            .as_ref()
            .ok_or(AppError::Configuration("payment provider"))
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    pub async fn start_checkout(
        &self,
        account: &Account,
        plan: CheckoutPlan,
    ) -> AppResult<CheckoutResult> {
        let provider = self.provider()?;
        let mut success_url = self.frontend_url.clone();
        success_url.set_path("/billing/success");
        let mut cancel_url = self.frontend_url.clone();
        cancel_url.set_path("/billing/cancel");

        let result = provider
            .create_checkout_session(CheckoutRequest {
                price_id: self.prices.price_for(plan).to_string(),
                plan_code: plan.code().to_string(),
                customer_email: account.email.clone(),
                account_id: account.id.to_string(),
                success_url: success_url.to_string(),
                cancel_url: cancel_url.to_string(),
            })
            .await?;
        info!(plan = plan.code(), session_id = %result.session_id, "Checkout session created");
        Ok(result)
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Verifies, parses and applies one raw webhook delivery.
    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> AppResult<ReconcileOutcome> {
        self.provider()?
            .verify_webhook_signature(payload, signature_header)?;

        let envelope: BillingEnvelope = serde_json::from_str(payload)
            .map_err(|e| AppError::InvalidInput(format!("Malformed webhook payload: {e}")))?;
        let event = BillingEvent::from_envelope(&envelope).map_err(|e| {
            AppError::InvalidInput(format!("Malformed {} payload: {e}", envelope.event_type))
        })?;

        debug!(event_id = %envelope.id, event_type = event.kind(), "Webhook received");
        self.reconcile(event).await
    }

    #[instrument(skip(self, event), fields(event_type = event.kind()))]
    pub async fn reconcile(&self, event: BillingEvent) -> AppResult<ReconcileOutcome> {
        match event {
            BillingEvent::CheckoutCompleted(session) => self.on_checkout_completed(&session).await,
            BillingEvent::SubscriptionCreated(sub) | BillingEvent::SubscriptionUpdated(sub) => {
                self.on_subscription_changed(&sub).await
            }
            BillingEvent::SubscriptionDeleted(sub) => self.on_subscription_deleted(&sub).await,
            BillingEvent::InvoicePaid(invoice) => {
                debug!(invoice_id = %invoice.id, "Invoice paid, status follows subscription events");
                Ok(ReconcileOutcome::Ignored)
            }
            BillingEvent::InvoicePaymentFailed(invoice) => self.on_payment_failed(&invoice).await,
            BillingEvent::Unhandled(kind) => {
                info!(event_type = %kind, "Ignoring unhandled webhook event");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn on_checkout_completed(
        &self,
        session: &CheckoutSessionObject,
    ) -> AppResult<ReconcileOutcome> {
        let Some(email) = session.email() else {
            warn!(session_id = %session.id, "Checkout completed without customer email, dropping");
            return Ok(ReconcileOutcome::Dropped);
        };
        let Some(resolved) = self.account_for_email(email).await? else {
            return Ok(ReconcileOutcome::Dropped);
        };

        let patch = AccountPatch {
            stripe_customer_id: session.customer.clone(),
            stripe_subscription_id: session.subscription.clone(),
            subscription_plan: Some(session.plan().unwrap_or(BASELINE_PLAN).to_string()),
            subscription_status: Some(SubscriptionStatus::Trialing),
            ..Default::default()
        };
        self.apply(&resolved, &patch).await
    }

    async fn on_subscription_changed(&self, sub: &SubscriptionObject) -> AppResult<ReconcileOutcome> {
        let Some(resolved) = self.account_for_customer(&sub.customer).await? else {
            return Ok(ReconcileOutcome::Dropped);
        };

        let patch = AccountPatch {
            stripe_customer_id: Some(sub.customer.clone()),
            stripe_subscription_id: Some(sub.id.clone()),
            subscription_status: Some(SubscriptionStatus::from_stripe(&sub.status)),
            subscription_plan: sub.plan().map(str::to_string),
            current_period_end: Some(sub.current_period_end_at()),
            trial_ends_at: Some(sub.trial_end_at()),
            ..Default::default()
        };
        self.apply(&resolved, &patch).await
    }

    async fn on_subscription_deleted(&self, sub: &SubscriptionObject) -> AppResult<ReconcileOutcome> {
        let Some(resolved) = self.account_for_customer(&sub.customer).await? else {
            return Ok(ReconcileOutcome::Dropped);
        };

        let patch = AccountPatch {
            subscription_status: Some(SubscriptionStatus::Canceled),
            subscription_plan: Some(FREE_PLAN.to_string()),
            ..Default::default()
        };
        self.apply(&resolved, &patch).await
    }

    async fn on_payment_failed(&self, invoice: &InvoiceObject) -> AppResult<ReconcileOutcome> {
        let Some(customer) = invoice.customer.as_deref() else {
            warn!(invoice_id = %invoice.id, "Failed invoice without customer, dropping");
            return Ok(ReconcileOutcome::Dropped);
        };
        let Some(resolved) = self.account_for_customer(customer).await? else {
            return Ok(ReconcileOutcome::Dropped);
        };

        let patch = AccountPatch {
            subscription_status: Some(SubscriptionStatus::PastDue),
            ..Default::default()
        };
        self.apply(&resolved, &patch).await
    }

    async fn apply(
        &self,
        resolved: &ResolvedAccount,
        patch: &AccountPatch,
    ) -> AppResult<ReconcileOutcome> {
        match self.resolver.update(resolved, patch).await {
            Ok(account) => {
                info!(
                    account_id = %account.id,
                    status = ?account.subscription.status.map(|s| s.as_str()),
                    plan = ?account.subscription.plan,
                    "Subscription state updated"
                );
                Ok(ReconcileOutcome::Applied)
            }
            Err(AppError::NotFound) => {
                warn!(account_id = %resolved.account.id, "Account vanished before update, dropping");
                Ok(ReconcileOutcome::Dropped)
            }
            Err(e) => Err(e),
        }
    }

    /// Customer id to email at the provider, then email to account. A
    /// provider failure propagates so the event is redelivered.
    async fn account_for_customer(&self, customer_id: &str) -> AppResult<Option<ResolvedAccount>> {
        let customer = self
            .provider()?
            .retrieve_customer(customer_id)
            .await
            .map_err(|e| AppError::Upstream(format!("customer lookup failed: {e}")))?;
        let Some(email) = customer.email.filter(|e| !e.trim().is_empty()) else {
            warn!(customer_id, "Customer has no email, dropping event");
            return Ok(None);
        };
        self.account_for_email(&email).await
    }

    async fn account_for_email(&self, email: &str) -> AppResult<Option<ResolvedAccount>> {
        let resolved = self.resolver.find_by_email(&normalize_email(email)).await?;
        if resolved.is_none() {
            warn!(email, "No account for billing event, dropping");
        }
        Ok(resolved)
    }
}

//! Payment-provider lifecycle events.
//!
//! The provider delivers a JSON envelope `{ id, type, data: { object } }`.
//! `BillingEvent` is the closed set of kinds the reconciler acts on; every
//! other type string lands in `Unhandled` and is only logged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: BillingEnvelopeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingEnvelopeData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// Detailed customer info wins over the top-level email field.
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    pub fn plan(&self) -> Option<&str> {
        plan_from_metadata(&self.metadata)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SubscriptionObject {
    pub fn plan(&self) -> Option<&str> {
        plan_from_metadata(&self.metadata)
    }

    pub fn current_period_end_at(&self) -> Option<DateTime<Utc>> {
        self.current_period_end.and_then(timestamp_to_utc)
    }

    pub fn trial_end_at(&self) -> Option<DateTime<Utc>> {
        self.trial_end.and_then(timestamp_to_utc)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BillingEvent {
    CheckoutCompleted(CheckoutSessionObject),
    SubscriptionCreated(SubscriptionObject),
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionObject),
    InvoicePaid(InvoiceObject),
    InvoicePaymentFailed(InvoiceObject),
    Unhandled(String),
}

impl BillingEvent {
    pub fn from_envelope(envelope: &BillingEnvelope) -> Result<Self, serde_json::Error> {
        let object = envelope.data.object.clone();
        let event = match envelope.event_type.as_str() {
            "checkout.session.completed" => {
                BillingEvent::CheckoutCompleted(serde_json::from_value(object)?)
            }
            "customer.subscription.created" => {
                BillingEvent::SubscriptionCreated(serde_json::from_value(object)?)
            }
            "customer.subscription.updated" => {
                BillingEvent::SubscriptionUpdated(serde_json::from_value(object)?)
            }
            "customer.subscription.deleted" => {
                BillingEvent::SubscriptionDeleted(serde_json::from_value(object)?)
            }
            // Older API versions emit payment_succeeded for the same transition.
            "invoice.paid" | "invoice.payment_succeeded" => {
                BillingEvent::InvoicePaid(serde_json::from_value(object)?)
            }
            "invoice.payment_failed" => {
                BillingEvent::InvoicePaymentFailed(serde_json::from_value(object)?)
            }
            other => BillingEvent::Unhandled(other.to_string()),
        };
        Ok(event)
    }

    pub fn kind(&self) -> &str {
        match self {
            BillingEvent::CheckoutCompleted(_) => "checkout.session.completed",
            BillingEvent::SubscriptionCreated(_) => "customer.subscription.created",
            BillingEvent::SubscriptionUpdated(_) => "customer.subscription.updated",
            BillingEvent::SubscriptionDeleted(_) => "customer.subscription.deleted",
            BillingEvent::InvoicePaid(_) => "invoice.paid",
            BillingEvent::InvoicePaymentFailed(_) => "invoice.payment_failed",
            BillingEvent::Unhandled(kind) => kind,
        }
    }
}

fn plan_from_metadata(metadata: &HashMap<String, String>) -> Option<&str> {
    metadata
        .get("plan_id")
        .or_else(|| metadata.get("plan"))
        .map(String::as_str)
        .filter(|p| !p.is_empty())
}

pub fn timestamp_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

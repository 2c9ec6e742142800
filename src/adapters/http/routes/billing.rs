use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::http::{app_state::AppState, middleware::CurrentAccount},
    app_error::{AppError, AppResult},
    domain::entities::plan::CheckoutPlan,
    use_cases::billing::ReconcileOutcome,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/webhook", post(webhook))
}

#[derive(Deserialize)]
struct CheckoutPayload {
    plan: CheckoutPlan,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    session_id: String,
    url: Option<String>,
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<ReconcileOutcome>,
}

async fn checkout(
    State(app_state): State<AppState>,
    CurrentAccount(current): CurrentAccount,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<impl IntoResponse> {
    let session = app_state
        .billing_use_cases
        .start_checkout(current.account(), payload.plan)
        .await?;
    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.checkout_url,
    }))
}

/// Retryable failures answer 5xx so the provider redelivers; rejected
/// deliveries answer 4xx; anything else is acknowledged.
async fn webhook(State(app_state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match app_state
        .billing_use_cases
        .handle_webhook(&body, signature)
        .await
    {
        Ok(outcome) => Json(WebhookAck {
            received: true,
            outcome: Some(outcome),
        })
        .into_response(),
        Err(e) if e.is_retryable() => {
            tracing::error!(error = %e, retryable = true, "Webhook processing failed");
            e.into_response()
        }
        Err(e @ (AppError::InvalidInput(_) | AppError::Configuration(_))) => e.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, retryable = false, "Webhook acknowledged without effect");
            (
                StatusCode::OK,
                Json(WebhookAck {
                    received: true,
                    outcome: None,
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::{
        adapters::http::routes::auth,
        domain::entities::subscription_status::SubscriptionStatus,
        test_utils::{
            TestAppStateBuilder, UseCaseHarness, VALID_TEST_SIGNATURE, create_test_account,
        },
    };

    fn server(h: &UseCaseHarness) -> TestServer {
        let app_state = TestAppStateBuilder::new(h).build();
        let app = axum::Router::new()
            .nest("/auth", auth::router())
            .nest("/billing", router())
            .with_state(app_state);
        TestServer::new(app).unwrap()
    }

    fn subscription_updated(customer: &str, status: &str) -> String {
        json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1",
                "customer": customer,
                "status": status,
                "current_period_end": 1_900_000_000,
                "metadata": {}
            }}
        })
        .to_string()
    }

    #[tokio::test]
    async fn duplicate_past_due_delivery_converges() {
        let h = UseCaseHarness::new();
        let account = create_test_account(|a| a.email = "frank@example.com".into());
        h.durable.insert_account(account.clone());
        h.payments.add_customer("cus_1", Some("frank@example.com"));
        let server = server(&h);

        let payload = subscription_updated("cus_1", "past_due");
        for _ in 0..2 {
            server
                .post("/billing/webhook")
                .add_header("Stripe-Signature", VALID_TEST_SIGNATURE)
                .text(payload.clone())
                .await
                .assert_status_ok();
        }
        let stored = h.durable.get(account.id).unwrap();
        assert_eq!(stored.subscription.status, Some(SubscriptionStatus::PastDue));
    }

    #[tokio::test]
    async fn lookup_failure_asks_for_redelivery() {
        let h = UseCaseHarness::new();
        h.payments.fail_lookups(true);

        let response = server(&h)
            .post("/billing/webhook")
            .add_header("Stripe-Signature", VALID_TEST_SIGNATURE)
            .text(subscription_updated("cus_1", "active"))
            .await;
        assert!(response.status_code().is_server_error());
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let h = UseCaseHarness::new();
        let response = server(&h)
            .post("/billing/webhook")
            .add_header("Stripe-Signature", "t=1,v1=forged")
            .text(subscription_updated("cus_1", "active"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unresolvable_checkout_is_acknowledged() {
        let h = UseCaseHarness::new();
        let payload = json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "customer": "cus_9" } }
        })
        .to_string();

        let response = server(&h)
            .post("/billing/webhook")
            .add_header("Stripe-Signature", VALID_TEST_SIGNATURE)
            .text(payload)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["outcome"], "dropped");
    }

    #[tokio::test]
    async fn checkout_returns_provider_url() {
        let h = UseCaseHarness::new();
        h.durable
            .insert_account(create_test_account(|a| a.email = "gail@example.com".into()));
        let server = server(&h);
        let login: serde_json::Value = server
            .post("/auth/login")
            .json(&json!({ "email": "gail@example.com", "password": "secret123" }))
            .await
            .json();

        let response = server
            .post("/billing/checkout")
            .add_header(
                "Authorization",
                format!("Bearer {}", login["token"].as_str().unwrap()),
            )
            .json(&json!({ "plan": "professional" }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["url"].as_str().unwrap().starts_with("https://checkout.example.test/"));
        assert_eq!(h.payments.last_checkout().unwrap().price_id, "price_professional");
    }

    #[tokio::test]
    async fn checkout_without_provider_is_configuration_error() {
        let h = UseCaseHarness::without_payments();
        h.durable
            .insert_account(create_test_account(|a| a.email = "hal@example.com".into()));
        let server = server(&h);
        let login: serde_json::Value = server
            .post("/auth/login")
            .json(&json!({ "email": "hal@example.com", "password": "secret123" }))
            .await
            .json();

        let response = server
            .post("/billing/checkout")
            .add_header(
                "Authorization",
                format!("Bearer {}", login["token"].as_str().unwrap()),
            )
            .json(&json!({ "plan": "starter" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "CONFIGURATION_ERROR");
    }
}

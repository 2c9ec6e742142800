use async_trait::async_trait;
use tracing::warn;

use crate::{
    adapters::{email::resend::ResendEmailSender, sms::twilio::TwilioSmsSender},
    application::ports::notifier::Notifier,
};

/// Routes notifications to whichever transports are configured. A missing
/// transport or a failed send both report `false`.
pub struct NotificationDispatcher {
    email: Option<ResendEmailSender>,
    sms: Option<TwilioSmsSender>,
}

impl NotificationDispatcher {
    pub fn new(email: Option<ResendEmailSender>, sms: Option<TwilioSmsSender>) -> Self {
        if email.is_none() {
            warn!("RESEND_API_KEY not set, emails will not be delivered");
        }
        if sms.is_none() {
            warn!("Twilio credentials not set, SMS will not be delivered");
        }
        Self { email, sms }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> bool {
        let Some(email) = &self.email else {
            warn!(subject, "No email transport configured");
            return false;
        };
        match email.send(to, subject, html).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, subject, "Email delivery failed");
                false
            }
        }
    }

    async fn send_sms(&self, to: &str, body: &str) -> bool {
        let Some(sms) = &self.sms else {
            warn!("No SMS transport configured");
            return false;
        };
        match sms.send(to, body).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "SMS delivery failed");
                false
            }
        }
    }
}

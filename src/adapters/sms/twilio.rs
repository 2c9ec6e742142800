use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    app_error::{AppError, AppResult},
    infra::{InfraError, http_client::build_client},
};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Sends SMS through the Twilio Messages REST endpoint.
#[derive(Clone)]
pub struct TwilioSmsSender {
    client: Client,
    account_sid: String,
    auth_token: SecretString,
    from_number: String,
}

impl TwilioSmsSender {
    pub fn new(
        account_sid: String,
        auth_token: SecretString,
        from_number: String,
    ) -> Result<Self, InfraError> {
        Ok(Self {
            client: build_client()?,
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid)
    }

    pub async fn send(&self, to: &str, body: &str) -> AppResult<()> {
        self.client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Ok(())
    }
}

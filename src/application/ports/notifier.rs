use async_trait::async_trait;

/// Outbound notification transport.
///
/// Both methods report delivery as a plain bool. Callers log a `false` and
/// surface it as a "failed to send" outcome; nothing is retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> bool;
    async fn send_sms(&self, to: &str, body: &str) -> bool;
}

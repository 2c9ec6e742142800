use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::application::ports::notifier::Notifier;

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct SentSms {
    pub to: String,
    pub body: String,
}

/// Records delivered messages. Delivery can be switched off per channel to
/// simulate a transport outage; undelivered messages are not recorded.
pub struct RecordingNotifier {
    emails: Mutex<Vec<SentEmail>>,
    sms: Mutex<Vec<SentSms>>,
    email_ok: AtomicBool,
    sms_ok: AtomicBool,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            emails: Mutex::new(vec![]),
            sms: Mutex::new(vec![]),
            email_ok: AtomicBool::new(true),
            sms_ok: AtomicBool::new(true),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email_ok(&self, ok: bool) {
        self.email_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_sms_ok(&self, ok: bool) {
        self.sms_ok.store(ok, Ordering::SeqCst);
    }

    pub fn email_count(&self) -> usize {
        self.emails.lock().unwrap().len()
    }

    pub fn emails_to(&self, to: &str) -> Vec<SentEmail> {
        self.emails
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.to == to)
            .cloned()
            .collect()
    }

    pub fn sms_to(&self, to: &str) -> Vec<SentSms> {
        self.sms
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.to == to)
            .cloned()
            .collect()
    }

    /// Raw token from the most recent verification link sent to `to`.
    pub fn last_verification_token(&self, to: &str) -> Option<String> {
        self.emails_to(to).iter().rev().find_map(|email| {
            let start = email.html.find("token=")? + "token=".len();
            let token: String = email.html[start..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect();
            (!token.is_empty()).then_some(token)
        })
    }

    /// Six-digit code from the most recent SMS sent to `to`.
    pub fn last_reset_code(&self, to: &str) -> Option<String> {
        self.sms_to(to).iter().rev().find_map(|sms| {
            sms.body
                .split(|c: char| !c.is_ascii_digit())
                .find(|run| run.len() == 6)
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> bool {
        if !self.email_ok.load(Ordering::SeqCst) {
            return false;
        }
        self.emails.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        true
    }

    async fn send_sms(&self, to: &str, body: &str) -> bool {
        if !self.sms_ok.load(Ordering::SeqCst) {
            return false;
        }
        self.sms.lock().unwrap().push(SentSms {
            to: to.to_string(),
            body: body.to_string(),
        });
        true
    }
}

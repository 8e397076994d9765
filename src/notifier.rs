//! Delivery of login links to their owners.
//!
//! The server only knows the [`Notifier`] trait; the production implementation
//! hands messages to an HTTP mail relay.

use std::sync::Arc;

use chrono::Duration;
use reqwest::StatusCode;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::api::email::Email;

const LOGIN_SUBJECT: &str = "Login Link - Campus Elections";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Mail relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mail relay rejected the message with status {0}")]
    Rejected(StatusCode),
}

/// Something that can get a login link to a user.
#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `link` to `to`. The link stops working after `ttl`.
    async fn send_login_link(&self, to: &Email, link: &str, ttl: Duration)
        -> Result<(), NotifyError>;
}

/// The body of a login link email.
fn login_text(link: &str, ttl: Duration) -> String {
    format!(
        "Click this link to log in: {link}\n\n\
         This link will expire in {} minutes and can only be used once.",
        ttl.num_minutes()
    )
}

/// A message as accepted by the mail relay.
#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Sends mail by POSTing JSON to a relay service.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[rocket::async_trait]
impl Notifier for HttpMailer {
    async fn send_login_link(
        &self,
        to: &Email,
        link: &str,
        ttl: Duration,
    ) -> Result<(), NotifyError> {
        let mail = OutgoingMail {
            from: &self.from,
            to,
            subject: LOGIN_SUBJECT,
            text: login_text(link, ttl),
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&mail)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status()));
        }
        debug!("Mail relay accepted login link for {to}");
        Ok(())
    }
}

/// Configuration for the mail relay.
#[derive(Deserialize)]
struct MailConfig {
    // non-secrets
    mail_api_url: String,
    mail_from: String,
    // secrets
    mail_api_key: String,
}

/// A fairing that loads the mail relay config and places an
/// `Arc<dyn Notifier>` into managed state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Mail relay",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<MailConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mail relay config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let mailer = HttpMailer::new(config.mail_api_url, config.mail_api_key, config.mail_from);
        info!("Loaded mail relay config");

        // Manage the state.
        let notifier: Arc<dyn Notifier> = Arc::new(mailer);
        rocket = rocket.manage(notifier);
        Ok(rocket)
    }
}

/// Shared handle on the test notifier, as injected by `#[backend_test]`.
#[cfg(test)]
pub type Recorder = Arc<RecordingNotifier>;

/// A notifier that keeps every link instead of sending it, and can be told to fail.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(Email, String)>>,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingNotifier {
    /// The most recent link sent to the given address.
    pub fn last_link_for(&self, to: &Email) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(email, _)| email == to)
            .map(|(_, link)| link.clone())
    }

    /// Number of links delivered so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Make every subsequent delivery fail.
    pub fn fail(&self) {
        self.failing.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[rocket::async_trait]
impl Notifier for RecordingNotifier {
    async fn send_login_link(
        &self,
        to: &Email,
        link: &str,
        _ttl: Duration,
    ) -> Result<(), NotifyError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(NotifyError::Rejected(StatusCode::SERVICE_UNAVAILABLE));
        }
        self.sent.lock().unwrap().push((to.clone(), link.to_string()));
        Ok(())
    }
}

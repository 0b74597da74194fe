//! Outbound donor notifications.
//!
//! This module defines the `Notifier` trait to abstract message delivery,
//! enabling testability with mock implementations. Transport failure is
//! reported as `Ok(false)`, never a panic; callers log it and move on to
//! the next donor.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ResourceType;
use crate::error::Result;
use crate::routing::RouteInfo;

/// Build the message body sent to a donor for an emergency request.
///
/// Includes the route link and travel time when the route lookup produced
/// them; without a route the core demand line still goes out.
pub fn format_emergency_message(
    hospital_name: &str,
    resource_type: &ResourceType,
    units_needed: u32,
    route: Option<&RouteInfo>,
) -> String {
    let mut message = format!(
        "Urgent: Hospital {hospital_name} needs {units_needed} units of {resource_type}. \
         Please respond immediately."
    );
    if let Some(route) = route {
        message.push_str(&format!("\nFastest route: {}", route.maps_link));
        message.push_str(&format!(
            "\nEstimated travel time: {:.0} min",
            route.eta_minutes
        ));
    }
    message
}

/// Trait for delivering a notification to a single recipient.
///
/// # Example
/// ```ignore
/// let notifier = TwilioNotifier::new(sid, token, from_number);
/// let delivered = notifier.send("+15550100", "Urgent: ...", 10_000).await?;
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `body` to `contact`, giving up after `timeout_ms`.
    ///
    /// Returns `Ok(true)` when the transport accepted the message and
    /// `Ok(false)` when it did not. Implementations must not turn transport
    /// failure into an error that would abort a dispatch pass.
    async fn send(&self, contact: &str, body: &str, timeout_ms: u64) -> Result<bool>;
}

// ============================================================================
// Production Implementation using the Twilio REST API
// ============================================================================

/// WhatsApp notifier backed by the Twilio messages endpoint.
pub struct TwilioNotifier {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl TwilioNotifier {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid,
            auth_token,
            from_number,
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Override the API base URL (for tests against a local server).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    #[tracing::instrument(skip(self, body))]
    async fn send(&self, contact: &str, body: &str, timeout_ms: u64) -> Result<bool> {
        if contact.is_empty() {
            tracing::warn!("Refusing to send notification to empty contact");
            return Ok(false);
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let from = format!("whatsapp:{}", self.from_number);
        let to = format!("whatsapp:{contact}");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Body", body), ("From", from.as_str()), ("To", to.as_str())])
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    tracing::info!(contact = %contact, "Notification accepted by transport");
                    Ok(true)
                } else {
                    tracing::warn!(
                        contact = %contact,
                        status = status.as_u16(),
                        "Transport rejected notification"
                    );
                    Ok(false)
                }
            }
            Err(e) => {
                tracing::warn!(contact = %contact, error = %e, "Notification send failed");
                Ok(false)
            }
        }
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Record of a call made to the mock notifier.
#[derive(Debug, Clone)]
pub struct MockSend {
    pub contact: String,
    pub body: String,
    pub timeout_ms: u64,
}

/// Mock notifier for testing.
///
/// Records every send and succeeds by default; individual contacts can be
/// configured to fail delivery.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sends: Arc<Mutex<Vec<MockSend>>>,
    failing_contacts: Arc<Mutex<HashSet<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `contact` report delivery failure.
    pub fn fail_contact(&self, contact: &str) {
        self.failing_contacts.lock().insert(contact.to_string());
    }

    /// All sends attempted so far, in order.
    pub fn sends(&self) -> Vec<MockSend> {
        self.sends.lock().clone()
    }

    /// Number of sends attempted (including failed ones).
    pub fn send_count(&self) -> usize {
        self.sends.lock().len()
    }

    /// Contacts of all attempted sends, in order.
    pub fn contacts(&self) -> Vec<String> {
        self.sends.lock().iter().map(|s| s.contact.clone()).collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, contact: &str, body: &str, timeout_ms: u64) -> Result<bool> {
        self.sends.lock().push(MockSend {
            contact: contact.to_string(),
            body: body.to_string(),
            timeout_ms,
        });
        Ok(!self.failing_contacts.lock().contains(contact))
    }
}

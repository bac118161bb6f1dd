//! Counter-party notifications for accepted and rejected offers.
//!
//! Notifications are fire-and-forget: they run after the status change is
//! committed and a failure is only logged.

use std::time::Duration;

use partquote_core::{Offer, OfferAction, OfferStatus, Transition};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferEvent {
    pub event: &'static str,
    pub offer_id: Uuid,
    pub order_id: Uuid,
    pub status: OfferStatus,
}

impl OfferEvent {
    /// The event for a committed transition, or `None` when nobody needs
    /// to hear about it.
    #[must_use]
    pub fn for_transition(offer: &Offer, transition: &Transition) -> Option<Self> {
        if !transition.notifies_counterparty() {
            return None;
        }
        let event = match transition.action {
            OfferAction::Accept => "offer_accepted",
            OfferAction::Reject => "offer_rejected",
            _ => return None,
        };
        Some(Self {
            event,
            offer_id: offer.id,
            order_id: offer.order_id,
            status: transition.to,
        })
    }
}

pub trait Notifier: Send + Sync {
    /// Must not block; slow work belongs on a spawned task.
    fn notify(&self, event: OfferEvent);
}

/// Logs the event and does nothing else.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: OfferEvent) {
        tracing::info!(
            event = event.event,
            offer_id = %event.offer_id,
            order_id = %event.order_id,
            status = %event.status,
            "offer notification"
        );
    }
}

/// POSTs the event as JSON to a fixed URL on a detached task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: OfferEvent) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(offer_id = %event.offer_id, "webhook notification delivered");
                }
                Ok(resp) => {
                    tracing::warn!(
                        offer_id = %event.offer_id,
                        status = %resp.status(),
                        "webhook notification rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        offer_id = %event.offer_id,
                        error = %e,
                        "webhook notification failed"
                    );
                }
            }
        });
    }
}

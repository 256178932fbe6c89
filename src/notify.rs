//! Notification composition and dispatch for matched pairs.
//!
//! The dispatcher creates one [`Notification`] row per side of the pair
//! that has a contact usable on the configured channel, so a match can
//! produce zero, one, or two rows, never more. A failed transport attempt
//! is recorded as `sent = false` and logged; it never propagates, so a
//! flaky mail relay cannot break the matching pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::error::DeliveryError;
use crate::repo::NotificationRepository;
use crate::types::{Item, Notification, NotificationChannel};

/// Outbound delivery mechanism (mail relay, SMS gateway, ...).
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Default transport: records the outbound message in the log stream and
/// reports success. Useful for development and for deployments that only
/// want the notification rows.
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            recipient = %notification.recipient,
            channel = %notification.channel,
            "match notification"
        );
        Ok(())
    }
}

/// Composes and records match notifications.
///
/// At-most-once per pair is the orchestrator's contract: it only calls
/// [`NotificationDispatcher::dispatch`] when a match result row was newly
/// inserted, so retried or cross-triggered evaluations cannot re-notify.
pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    transport: Arc<dyn NotificationTransport>,
    channel: NotificationChannel,
}

impl NotificationDispatcher {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        transport: Arc<dyn NotificationTransport>,
        channel: NotificationChannel,
    ) -> Self {
        Self {
            repo,
            transport,
            channel,
        }
    }

    /// Notify both reporters about a matched pair. Returns the number of
    /// notification rows recorded.
    pub async fn dispatch(&self, lost: &Item, found: &Item) -> usize {
        let message = compose_message(lost, found);
        let mut recorded = 0;

        for side in [lost, found] {
            let Some(recipient) = resolve_recipient(side, self.channel) else {
                continue;
            };
            let mut notification = Notification {
                recipient,
                channel: self.channel,
                message: message.clone(),
                sent: false,
                sent_at: Utc::now(),
            };
            match self.transport.send(&notification).await {
                Ok(()) => notification.sent = true,
                Err(err) => {
                    warn!(
                        recipient = %notification.recipient,
                        lost = lost.id,
                        found = found.id,
                        error = %err,
                        "notification delivery failed; recording unsent"
                    );
                }
            }
            match self.repo.create(notification).await {
                Ok(()) => recorded += 1,
                Err(err) => {
                    warn!(
                        lost = lost.id,
                        found = found.id,
                        error = %err,
                        "failed to record notification"
                    );
                }
            }
        }
        recorded
    }
}

/// Message naming both items plus the found side's location and contact.
fn compose_message(lost: &Item, found: &Item) -> String {
    let location = found.location.as_deref().unwrap_or("not specified");
    let contact = found
        .contact
        .as_ref()
        .and_then(|c| c.email.as_deref().or(c.phone.as_deref()))
        .unwrap_or("not provided");
    format!(
        "Match found: lost item '{}' (id={}) may match found item '{}' (id={}).\n\
         Description: {}\nLocation: {}\nContact: {}",
        lost.name, lost.id, found.name, found.id, found.description, location, contact
    )
}

/// Contact string usable on the given channel, if the reporter left one.
fn resolve_recipient(item: &Item, channel: NotificationChannel) -> Option<String> {
    let contact = item.contact.as_ref()?;
    let value = match channel {
        NotificationChannel::Email => contact.email.as_deref(),
        NotificationChannel::Sms | NotificationChannel::WhatsApp => contact.phone.as_deref(),
    };
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

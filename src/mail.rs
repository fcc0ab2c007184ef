//! Simulated mail delivery.
//!
//! The original site never sent mail: verification codes were rendered
//! on-screen next to a "code sent to your inbox" banner. [`MailManager`]
//! keeps that contract. Messages land in an inspectable outbox for the
//! presentation layer to display and in the logs; nothing leaves the
//! process.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Mail templates list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    /// Carries the 6-digit code proving control of the registering address.
    VerificationCode,
}

/// One message the system pretended to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMail {
    pub template: Template,
    pub to: String,
    pub code: String,
    pub sent_at: DateTime<Utc>,
}

/// Outbox-only mail sender.
#[derive(Debug, Default)]
pub struct MailManager {
    outbox: Mutex<Vec<OutboundMail>>,
}

impl MailManager {
    /// Create a new [`MailManager`] with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outbound message instead of transmitting it.
    pub fn deliver(&self, template: Template, to: &str, code: &str) {
        tracing::info!(%to, ?template, "mail event recorded");
        tracing::debug!(code, "verification code issued");

        let mut outbox = self
            .outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        outbox.push(OutboundMail {
            template,
            to: to.to_owned(),
            code: code.to_owned(),
            sent_at: Utc::now(),
        });
    }

    /// Most recent message addressed to `to`, for on-screen display.
    pub fn last_for(&self, to: &str) -> Option<OutboundMail> {
        self.outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .cloned()
    }
}

//! # Notifications
//!
//! Operational events reported to the owner's chat channel. Each trigger
//! builds its own message; transports only decide where it goes.

use std::fmt::{self, Display};

use serde::Serialize;

use crate::models::{ContactMessage, DomainRecord};
use crate::traits::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewVisit,
    DatabaseError,
    NewDomain,
    DomainAllowed,
    ContactMessage,
    StreamError,
    TransportDown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    /// Whether the channel owner should be pinged
    pub mention: bool,
    /// Extra "label: value" lines appended under the text
    pub fields: Vec<(String, String)>,
}

impl Notification {
    pub fn new(kind: NotificationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            mention: false,
            fields: Vec::new(),
        }
    }

    pub fn mentioning(mut self) -> Self {
        self.mention = true;
        self
    }

    pub fn with_field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((label.into(), value.into()));
        self
    }

    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn new_visit(host: Option<&str>, referer: Option<&str>, client: &str) -> Self {
        let mut n = Self::new(NotificationKind::NewVisit, "*New Access*");
        if let Some(host) = host {
            n = n.with_field("Host", host);
        }
        if let Some(referer) = referer {
            n = n.with_field("Referer", referer);
        }
        n.with_field("Client", client)
    }

    pub fn database_error(error: &dyn Display) -> Self {
        Self::new(
            NotificationKind::DatabaseError,
            format!("Database access failed - {error}"),
        )
        .mentioning()
    }

    pub fn new_domain(record: &DomainRecord) -> Self {
        Self::new(NotificationKind::NewDomain, "NEW DOMAIN ADDED")
            .mentioning()
            .with_field("Domain", record.name.as_str())
            .with_field("To allow send", format!("allow {}", record.id))
            .with_field("Default allow value", record.allowed.to_string())
    }

    pub fn domain_allowed(record: &DomainRecord) -> Self {
        Self::new(
            NotificationKind::DomainAllowed,
            format!("Domain {} updated successfully!", record.name),
        )
    }

    pub fn contact(message: &ContactMessage) -> Self {
        Self::new(
            NotificationKind::ContactMessage,
            format!(
                "{} ({}) sent an email with the following text: {}",
                message.name, message.email, message.message
            ),
        )
        .mentioning()
    }

    pub fn stream_error(error: &dyn Display) -> Self {
        Self::new(
            NotificationKind::StreamError,
            format!("Live stream connection error: {error}"),
        )
        .mentioning()
    }

    pub fn transport_down() -> Self {
        Self::new(
            NotificationKind::TransportDown,
            "Viewer sockets are down. Send 'socket reconnect' to bring them back",
        )
        .mentioning()
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        for (label, value) in &self.fields {
            write!(f, "\n- {label}: {value}")?;
        }
        Ok(())
    }
}

/// Writes notifications to the log. Used when no chat webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(kind = ?notification.kind, "{notification}");
    }
}

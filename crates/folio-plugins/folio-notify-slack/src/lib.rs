//! # folio-notify-slack
//!
//! Posts notifications to a Slack incoming webhook.
//!
//! `notify` only enqueues; a background worker owns the HTTP client and
//! delivers in order. When the queue is full the newest notification is
//! dropped, so a slow or unreachable webhook can never stall a request.

use folio_core::notification::Notification;
use folio_core::traits::Notifier;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct SlackConfig {
    pub webhook_url: SecretString,
    pub channel: String,
    pub username: String,
    /// Prefix for messages that should ping someone, e.g. "@owner"
    pub mention: Option<String>,
    pub queue_capacity: usize,
}

#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: String,
    channel: &'a str,
    username: &'a str,
    link_names: u8,
}

pub struct SlackNotifier {
    queue: mpsc::Sender<Notification>,
}

impl SlackNotifier {
    /// Starts the delivery worker. The worker ends once every `SlackNotifier`
    /// handle is dropped and the queue has drained.
    pub fn spawn(config: SlackConfig) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(deliver(config, reqwest::Client::new(), rx));
        (Self { queue }, worker)
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, notification: Notification) {
        match self.queue.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                warn!(kind = ?n.kind, "notification queue full, dropping");
            }
            Err(TrySendError::Closed(n)) => {
                warn!(kind = ?n.kind, "notification worker gone, dropping");
            }
        }
    }
}

fn message<'a>(config: &'a SlackConfig, notification: &Notification) -> SlackMessage<'a> {
    let text = match (&config.mention, notification.mention) {
        (Some(who), true) => format!("{who} {notification}"),
        _ => notification.to_string(),
    };
    SlackMessage {
        text,
        channel: &config.channel,
        username: &config.username,
        link_names: 1,
    }
}

async fn deliver(
    config: SlackConfig,
    client: reqwest::Client,
    mut rx: mpsc::Receiver<Notification>,
) {
    while let Some(notification) = rx.recv().await {
        let body = message(&config, &notification);
        let result = client
            .post(config.webhook_url.expose_secret())
            .json(&body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => debug!(kind = ?notification.kind, "notification delivered"),
            Err(e) => warn!(kind = ?notification.kind, "notification delivery failed: {e}"),
        }
    }
    debug!("notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::notification::NotificationKind;

    fn config(mention: Option<&str>) -> SlackConfig {
        SlackConfig {
            webhook_url: SecretString::from("http://127.0.0.1:9/hook"),
            channel: "#portfolio".into(),
            username: "Portfolio".into(),
            mention: mention.map(str::to_string),
            queue_capacity: 1,
        }
    }

    #[test]
    fn mentions_are_prefixed_when_configured() {
        let cfg = config(Some("@owner"));
        let n = Notification::new(NotificationKind::StreamError, "stream broke").mentioning();

        let json = serde_json::to_value(message(&cfg, &n)).unwrap();
        assert_eq!(json["text"], "@owner stream broke");
        assert_eq!(json["channel"], "#portfolio");
        assert_eq!(json["username"], "Portfolio");
        assert_eq!(json["link_names"], 1);
    }

    #[test]
    fn plain_notifications_are_not_prefixed() {
        let cfg = config(Some("@owner"));
        let n = Notification::new(NotificationKind::DomainAllowed, "done");
        assert_eq!(message(&cfg, &n).text, "done");

        let cfg = config(None);
        let n = Notification::new(NotificationKind::StreamError, "broke").mentioning();
        assert_eq!(message(&cfg, &n).text, "broke");
    }

    #[test]
    fn full_queue_drops_the_newest() {
        let (queue, mut rx) = mpsc::channel(1);
        let notifier = SlackNotifier { queue };

        notifier.notify(Notification::new(NotificationKind::NewVisit, "first"));
        notifier.notify(Notification::new(NotificationKind::NewVisit, "second"));

        assert_eq!(rx.try_recv().unwrap().text, "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn notify_after_worker_exit_does_not_panic() {
        let (queue, rx) = mpsc::channel(1);
        drop(rx);
        SlackNotifier { queue }.notify(Notification::transport_down());
    }
}

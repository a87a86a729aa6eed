//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::models::{DomainRecord, OutgoingEmail, PortfolioEntry, RawTweet};
use crate::notification::Notification;

/// Live upstream events, ended by the source on disconnect.
pub type EventStream = BoxStream<'static, anyhow::Result<RawTweet>>;

/// Persistence contract for the referring-domain allow-list.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DomainRepo: Send + Sync {
    /// Looks a record up by its already-normalized name.
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<DomainRecord>>;

    /// Stores a new record. When a record with the same name already exists
    /// the stored one is returned instead, so callers always see the winner.
    async fn insert(&self, record: DomainRecord) -> anyhow::Result<DomainRecord>;

    /// Flags a record as allowed. Returns the record if one was updated.
    async fn allow(&self, id: Uuid) -> anyhow::Result<Option<DomainRecord>>;
}

/// Persistence contract for portfolio entries.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PortfolioRepo: Send + Sync {
    /// All entries, newest first.
    async fn list_portfolio(&self) -> anyhow::Result<Vec<PortfolioEntry>>;
}

/// A filtered real-time feed of upstream statuses.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Opens one subscription tracking the given terms.
    async fn connect(&self, track: &[String]) -> anyhow::Result<EventStream>;
}

/// One-shot search against the upstream API.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TweetSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> anyhow::Result<Vec<RawTweet>>;
}

/// Outbound email transport.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers to the configured owner address.
    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<()>;
}

/// Best-effort operational alerts.
///
/// Implementations must return immediately and never fail; delivery
/// happens in the background if at all.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

//! # Domain Models
//!
//! These structs represent the entities the portfolio server works with.
//! Persistent records use UUID v7 for time-ordered identification.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A referring website seen by the domain gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: Uuid,
    /// Normalized hostname (no scheme, port or leading "www.")
    pub name: String,
    pub allowed: bool,
}

impl DomainRecord {
    /// Builds the record for a domain seen for the first time.
    /// Search engines are let through by default, everything else waits for review.
    pub fn first_sight(name: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.to_string(),
            allowed: name.contains("google"),
        }
    }
}

/// A single portfolio item shown on the homepage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Author block of an upstream status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    pub name: String,
    pub screen_name: String,
    pub profile_image_url: String,
}

/// A status as delivered by the upstream streaming and search APIs.
/// Only the fields the relay uses are decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTweet {
    pub id_str: String,
    /// Absent on control messages (deletes, limits) mixed into the stream
    #[serde(default)]
    pub text: Option<String>,
    /// Upstream format, e.g. "Wed Oct 10 20:19:24 +0000 2018"
    pub created_at: String,
    pub user: RawUser,
}

/// A normalized status ready to be pushed to viewers.
///
/// Serialized with the field names the homepage script reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "name")]
    pub author_name: String,
    /// Screen name prefixed with "@"
    #[serde(rename = "username")]
    pub author_handle: String,
    #[serde(rename = "image")]
    pub author_image_url: String,
    #[serde(rename = "text")]
    pub body_text: String,
    #[serde(rename = "imageVisible")]
    pub image_visible: bool,
    /// Epoch milliseconds, 0 when the upstream date could not be parsed
    pub created_at: i64,
    /// The upstream date string, untouched
    #[serde(rename = "date")]
    pub created_at_raw: String,
    #[serde(rename = "tweeturl")]
    pub permalink: String,
}

/// Running counters of matched stream events, one per watch term.
///
/// The term set is fixed at construction so counters can be read
/// concurrently without locking.
#[derive(Debug)]
pub struct WatchList {
    total: AtomicU64,
    symbols: BTreeMap<String, AtomicU64>,
}

/// Point-in-time copy of a [`WatchList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchSnapshot {
    pub total: u64,
    pub symbols: BTreeMap<String, u64>,
}

impl WatchList {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            total: AtomicU64::new(0),
            symbols: terms
                .into_iter()
                .map(|t| (t.into(), AtomicU64::new(0)))
                .collect(),
        }
    }

    /// Watch terms, sorted.
    pub fn terms(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    /// Counts one matched event and bumps every term it mentions.
    pub fn record(&self, text: &str) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let lowered = text.to_lowercase();
        for (term, count) in &self.symbols {
            if lowered.contains(&term.to_lowercase()) {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn count(&self, term: &str) -> Option<u64> {
        self.symbols.get(term).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> WatchSnapshot {
        WatchSnapshot {
            total: self.total(),
            symbols: self
                .symbols
                .iter()
                .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// A contact-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// A rendered email handed to the [`Mailer`](crate::traits::Mailer).
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub reply_to: Option<String>,
}

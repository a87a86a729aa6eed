//! The application context shared by every handler.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::NaiveDate;
use folio_core::models::WatchList;
use folio_core::notification::Notification;
use folio_core::traits::{Mailer, Notifier, PortfolioRepo, TweetSearch};
use folio_core::{AccessTokens, DomainGate, RelayHandle, TweetNormalizer, ViewerRegistry};
use secrecy::SecretString;

use crate::error::ApiError;

/// Site-level settings the handlers read.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub owner_name: String,
    pub birth_date: NaiveDate,
    /// Anything but the development environment
    pub production: bool,
    /// History pulled by `/getFirstTweets`
    pub search_query: String,
    pub search_count: u32,
    pub mail_subject: String,
    pub public_dir: PathBuf,
    pub components_dir: PathBuf,
    pub static_max_age_secs: u64,
    pub canonical_www: bool,
}

pub struct AppState {
    pub site: SiteConfig,
    pub gate: DomainGate,
    pub portfolio: Arc<dyn PortfolioRepo>,
    pub tokens: AccessTokens,
    /// Shared with the chat integration posting to `/outwebook`
    pub outwebook_token: SecretString,
    /// While set, the homepage only serves the error page
    pub offline: AtomicBool,
    pub viewers: Arc<ViewerRegistry>,
    pub watch_list: Arc<WatchList>,
    pub relay: RelayHandle,
    pub normalizer: TweetNormalizer,
    pub search: Arc<dyn TweetSearch>,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Relaxed)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Development runs stay quiet in the chat channel.
    pub fn notify_in_production(&self, notification: Notification) {
        if self.site.production {
            self.notifier.notify(notification);
        }
    }

    pub fn page_error(&self, status: StatusCode, reason: impl Into<String>) -> ApiError {
        ApiError::Page {
            status,
            reason: reason.into(),
            production: self.site.production,
        }
    }
}

//! Turns upstream statuses into the events pushed to viewers.

use chrono::DateTime;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{RawTweet, StreamEvent};
use crate::traits::TweetSearch;

/// Upstream date format, e.g. "Wed Oct 10 20:19:24 +0000 2018".
const UPSTREAM_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Epoch milliseconds of an upstream date, 0 when it does not parse.
pub fn parse_created_at(raw: &str) -> i64 {
    DateTime::parse_from_str(raw, UPSTREAM_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.timestamp_millis())
        .unwrap_or_else(|e| {
            debug!("unparseable status date {raw:?}: {e}");
            0
        })
}

#[derive(Debug, Clone)]
pub struct TweetNormalizer {
    /// Screen name whose statuses never reach viewers
    ignored_account: String,
}

impl TweetNormalizer {
    pub fn new(ignored_account: impl Into<String>) -> Self {
        Self {
            ignored_account: ignored_account.into(),
        }
    }

    pub fn is_ignored(&self, tweet: &RawTweet) -> bool {
        tweet.user.screen_name.eq_ignore_ascii_case(&self.ignored_account)
    }

    /// Normalizes statuses in the order given, skipping the ignored account.
    pub fn process<I>(&self, tweets: I) -> Vec<StreamEvent>
    where
        I: IntoIterator<Item = RawTweet>,
    {
        tweets
            .into_iter()
            .filter(|t| !self.is_ignored(t))
            .map(normalize_tweet)
            .collect()
    }

    /// One-shot history pull: searches, sorts oldest first and normalizes.
    pub async fn fetch_recent(
        &self,
        search: &dyn TweetSearch,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<StreamEvent>> {
        let mut statuses = search
            .search(query, max_results)
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        statuses.sort_by_cached_key(|t| parse_created_at(&t.created_at));
        Ok(self.process(statuses))
    }
}

fn normalize_tweet(tweet: RawTweet) -> StreamEvent {
    let RawTweet {
        id_str,
        text,
        created_at,
        user,
    } = tweet;

    StreamEvent {
        author_name: user.name,
        author_handle: format!("@{}", user.screen_name),
        author_image_url: user.profile_image_url.replace("_normal", "_bigger"),
        body_text: text.unwrap_or_default(),
        image_visible: true,
        created_at: parse_created_at(&created_at),
        permalink: format!(
            "http://www.twitter.com/{}/status/{}",
            user.screen_name, id_str
        ),
        created_at_raw: created_at,
    }
}

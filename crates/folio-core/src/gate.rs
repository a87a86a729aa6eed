//! # Domain Gate
//!
//! Decides per referring hostname whether the portfolio is shown, and keeps
//! every hostname it has ever seen for manual review.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::DomainRecord;
use crate::notification::Notification;
use crate::traits::{DomainRepo, Notifier};

/// Reduces a referer URL (or bare host) to the hostname records are keyed by.
///
/// Scheme, path, port and any leading "www." are dropped and the result is
/// lowercased, so `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(url: &str) -> String {
    let url = url.trim();
    let host = if url.contains("://") {
        url.split('/').nth(2).unwrap_or_default()
    } else {
        url.split('/').next().unwrap_or_default()
    };
    let mut host = host.split(':').next().unwrap_or_default();
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub decision: Decision,
    /// None when the hostname was empty and nothing was looked up
    pub record: Option<DomainRecord>,
    /// True when this call created the record
    pub first_sight: bool,
}

impl GateOutcome {
    fn from_record(record: DomainRecord, first_sight: bool) -> Self {
        Self {
            decision: if record.allowed {
                Decision::Allow
            } else {
                Decision::Deny
            },
            record: Some(record),
            first_sight,
        }
    }
}

pub struct DomainGate {
    repo: Arc<dyn DomainRepo>,
    notifier: Arc<dyn Notifier>,
    /// Records already read from or written to the repo, by name.
    /// Refreshed by `allow`; stale entries only delay an approval.
    cache: DashMap<String, DomainRecord>,
}

impl DomainGate {
    pub fn new(repo: Arc<dyn DomainRepo>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repo,
            notifier,
            cache: DashMap::new(),
        }
    }

    /// Gate check for a raw `Referer` header value.
    pub async fn check_referer(&self, referer: &str) -> Result<GateOutcome> {
        self.check(&normalize(referer)).await
    }

    /// Gate check for an already-normalized hostname.
    pub async fn check(&self, name: &str) -> Result<GateOutcome> {
        if name.is_empty() {
            return Ok(GateOutcome {
                decision: Decision::Allow,
                record: None,
                first_sight: false,
            });
        }

        if let Some(record) = self.cache.get(name) {
            return Ok(GateOutcome::from_record(record.clone(), false));
        }

        let found = self
            .repo
            .find_by_name(name)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        let outcome = match found {
            Some(record) => GateOutcome::from_record(record, false),
            None => {
                let candidate = DomainRecord::first_sight(name);
                let stored = self
                    .repo
                    .insert(candidate.clone())
                    .await
                    .map_err(|e| AppError::Persistence(e.to_string()))?;

                // A concurrent request may have inserted the same name first.
                let first_sight = stored.id == candidate.id;
                if first_sight {
                    info!(domain = %stored.name, allowed = stored.allowed, "new referring domain");
                    self.notifier.notify(Notification::new_domain(&stored));
                }
                GateOutcome::from_record(stored, first_sight)
            }
        };

        if let Some(record) = &outcome.record {
            self.cache.insert(record.name.clone(), record.clone());
        }
        debug!(domain = name, decision = ?outcome.decision, "domain gate");
        Ok(outcome)
    }

    /// Approves a record. Returns whether a record was updated.
    pub async fn allow(&self, id: Uuid) -> Result<bool> {
        let updated = self
            .repo
            .allow(id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        match updated {
            Some(record) => {
                info!(domain = %record.name, "domain allowed");
                self.notifier.notify(Notification::domain_allowed(&record));
                self.cache.insert(record.name.clone(), record);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationKind;
    use crate::traits::{MockDomainRepo, MockNotifier};
    use mockall::predicate::eq;

    fn gate(repo: MockDomainRepo, notifier: MockNotifier) -> DomainGate {
        DomainGate::new(Arc::new(repo), Arc::new(notifier))
    }

    #[test]
    fn normalize_strips_scheme_port_path_and_www() {
        assert_eq!(normalize("http://www.example.com:8080/foo"), "example.com");
        assert_eq!(normalize("example.com/bar"), "example.com");
        assert_eq!(normalize("https://Blog.Example.org/a/b?c=d"), "blog.example.org");
        assert_eq!(normalize("www.example.com:443"), "example.com");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in [
            "http://www.example.com:8080/foo",
            "example.com/bar",
            "https://www.www.google.com/",
            "ftp://files.example.net",
            "",
        ] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn first_sight_of_google_is_allowed() {
        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name()
            .withf(|name| name == "google.com")
            .returning(|_| Ok(None));
        repo.expect_insert().returning(Ok);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.kind == NotificationKind::NewDomain)
            .times(1)
            .return_const(());

        let outcome = gate(repo, notifier).check("google.com").await.unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
        assert!(outcome.first_sight);
        assert!(outcome.record.unwrap().allowed);
    }

    #[tokio::test]
    async fn first_sight_of_unknown_domain_is_denied_and_reported() {
        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name().returning(|_| Ok(None));
        repo.expect_insert()
            .withf(|r| r.name == "random-blog.net" && !r.allowed)
            .returning(Ok);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| {
                n.kind == NotificationKind::NewDomain
                    && n.field("To allow send").is_some_and(|v| v.starts_with("allow "))
            })
            .times(1)
            .return_const(());

        let outcome = gate(repo, notifier)
            .check_referer("https://random-blog.net/post/1")
            .await
            .unwrap();
        assert_eq!(outcome.decision, Decision::Deny);
        let record = outcome.record.unwrap();
        assert_eq!(record.name, "random-blog.net");
        assert!(!record.allowed);
    }

    #[tokio::test]
    async fn losing_an_insert_race_does_not_report_twice() {
        let winner = DomainRecord::first_sight("example.com");
        let stored = winner.clone();

        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name().returning(|_| Ok(None));
        repo.expect_insert().returning(move |_| Ok(stored.clone()));

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        let outcome = gate(repo, notifier).check("example.com").await.unwrap();
        assert!(!outcome.first_sight);
        assert_eq!(outcome.record.unwrap().id, winner.id);
    }

    #[tokio::test]
    async fn known_records_are_served_from_cache() {
        let record = DomainRecord {
            allowed: true,
            ..DomainRecord::first_sight("example.com")
        };

        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name()
            .times(1)
            .returning(move |_| Ok(Some(record.clone())));

        let gate = gate(repo, MockNotifier::new());
        for _ in 0..3 {
            let outcome = gate.check("example.com").await.unwrap();
            assert_eq!(outcome.decision, Decision::Allow);
        }
    }

    #[tokio::test]
    async fn allow_flips_a_denied_domain() {
        let denied = DomainRecord::first_sight("random-blog.net");
        let id = denied.id;
        let approved = DomainRecord {
            allowed: true,
            ..denied.clone()
        };

        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name()
            .times(1)
            .returning(move |_| Ok(Some(denied.clone())));
        repo.expect_allow()
            .with(eq(id))
            .returning(move |_| Ok(Some(approved.clone())));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.kind == NotificationKind::DomainAllowed)
            .times(1)
            .return_const(());

        let gate = gate(repo, notifier);
        assert_eq!(gate.check("random-blog.net").await.unwrap().decision, Decision::Deny);
        assert!(gate.allow(id).await.unwrap());
        assert_eq!(gate.check("random-blog.net").await.unwrap().decision, Decision::Allow);
    }

    #[tokio::test]
    async fn allowing_an_unknown_id_is_silent() {
        let mut repo = MockDomainRepo::new();
        repo.expect_allow().returning(|_| Ok(None));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        assert!(!gate(repo, notifier).allow(Uuid::now_v7()).await.unwrap());
    }

    #[tokio::test]
    async fn empty_hostname_skips_the_lookup() {
        let outcome = gate(MockDomainRepo::new(), MockNotifier::new())
            .check_referer("http://")
            .await
            .unwrap();
        assert_eq!(outcome.decision, Decision::Allow);
        assert!(outcome.record.is_none());
    }

    #[tokio::test]
    async fn lookup_failures_surface_as_persistence_errors() {
        let mut repo = MockDomainRepo::new();
        repo.expect_find_by_name()
            .returning(|_| Err(anyhow::anyhow!("database is locked")));

        let err = gate(repo, MockNotifier::new())
            .check("example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
    }
}

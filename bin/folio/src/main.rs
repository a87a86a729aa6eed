//! # Folio Binary
//!
//! Assembles the portfolio server from its plugins, starts the live relay
//! and serves HTTP until Ctrl-C / SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use folio_api::{AppState, SiteConfig};
use folio_config::Settings;
use folio_core::models::{PortfolioEntry, WatchList};
use folio_core::traits::Notifier;
use folio_core::{
    AccessTokens, DomainGate, LiveRelay, LogNotifier, RelayCommand, RelayConfig,
    TweetNormalizer, ViewerRegistry,
};
use folio_db_sqlite::SqliteStore;
use folio_mail_http::{HttpMailer, MailConfig};
use folio_twitter::{Credentials, TwitterClient, TwitterConfig};
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "notify-slack")]
use folio_notify_slack::{SlackConfig, SlackNotifier};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("FOLIO_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load().context("loading configuration")?;
    info!(environment = ?settings.environment, "starting folio");

    // 1. Persistence
    let store = Arc::new(
        SqliteStore::connect(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await
        .context("opening database")?,
    );
    if let Some(path) = &settings.database.seed_file {
        seed(&store, path).await?;
    }

    // 2. Notifications
    let notifier = notifier(&settings);

    // 3. Upstream
    let twitter = TwitterClient::new(TwitterConfig {
        credentials: Credentials {
            consumer_key: settings.twitter.consumer_key.clone(),
            consumer_secret: settings.twitter.consumer_secret.clone(),
            access_token: settings.twitter.access_token_key.clone(),
            access_token_secret: settings.twitter.access_token_secret.clone(),
        },
        stream_url: settings.twitter.stream_url.clone(),
        search_url: settings.twitter.search_url.clone(),
        read_timeout: Duration::from_secs(settings.twitter.stream_read_timeout_secs),
    })
    .context("building upstream client")?;
    let twitter = Arc::new(twitter);

    // 4. Live relay
    let viewers = Arc::new(ViewerRegistry::new());
    let watch_list = Arc::new(WatchList::new(settings.twitter.watch_symbols.clone()));
    let normalizer = TweetNormalizer::new(settings.twitter.ignored_account.clone());
    let (relay, relay_handle, relay_commands) = LiveRelay::new(
        twitter.clone(),
        viewers.clone(),
        watch_list.clone(),
        normalizer.clone(),
        notifier.clone(),
        RelayConfig {
            reconnect_delay: Duration::from_secs(settings.twitter.reconnect_delay_secs),
            max_reconnect_delay: Duration::from_secs(settings.twitter.max_reconnect_delay_secs),
        },
    );
    let relay_task = tokio::spawn(relay.run(relay_commands));

    // 5. Application context
    let mail = &settings.mail;
    let state = Arc::new(AppState {
        site: SiteConfig {
            owner_name: settings.profile.owner_name.clone(),
            birth_date: settings.profile.birth_date,
            production: settings.environment.is_production(),
            search_query: settings.twitter.search_query.clone(),
            search_count: settings.twitter.search_count,
            mail_subject: mail.subject.clone(),
            public_dir: PathBuf::from(&settings.server.public_dir),
            components_dir: PathBuf::from(&settings.server.components_dir),
            static_max_age_secs: settings.server.static_max_age_secs,
            canonical_www: settings.server.canonical_www,
        },
        gate: DomainGate::new(store.clone(), notifier.clone()),
        portfolio: store,
        tokens: AccessTokens::new(settings.security.token_secret.expose_secret().as_bytes()),
        outwebook_token: settings.security.outwebook_token.clone(),
        offline: AtomicBool::new(false),
        viewers,
        watch_list,
        relay: relay_handle.clone(),
        normalizer,
        search: twitter,
        mailer: Arc::new(HttpMailer::new(MailConfig {
            api_url: mail.api_url.clone(),
            api_key: mail.api_key.clone(),
            sender_email: mail.sender_email.clone(),
            sender_name: mail.sender_name.clone(),
            recipient_email: mail.recipient_email.clone(),
        })),
        notifier,
    });

    // 6. HTTP
    let app = folio_api::router(state);
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("server.host / server.port do not form a socket address")?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("stopping relay");
    relay_handle.command(RelayCommand::Shutdown);
    if let Err(e) = relay_task.await {
        warn!("relay task ended abnormally: {e}");
    }

    info!("folio stopped");
    Ok(())
}

#[cfg(feature = "notify-slack")]
fn notifier(settings: &Settings) -> Arc<dyn Notifier> {
    let slack = &settings.slack;
    match &slack.webhook_url {
        Some(url) => {
            info!(channel = %slack.channel, "notifications go to slack");
            let (notifier, _worker) = SlackNotifier::spawn(SlackConfig {
                webhook_url: url.clone(),
                channel: slack.channel.clone(),
                username: slack.username.clone(),
                mention: slack.mention.clone(),
                queue_capacity: slack.queue_capacity,
            });
            Arc::new(notifier)
        }
        None => {
            info!("no slack webhook configured, notifications are logged");
            Arc::new(LogNotifier)
        }
    }
}

#[cfg(not(feature = "notify-slack"))]
fn notifier(settings: &Settings) -> Arc<dyn Notifier> {
    if settings.slack.webhook_url.is_some() {
        warn!("slack webhook configured but built without `notify-slack`");
    }
    Arc::new(LogNotifier)
}

async fn seed(store: &SqliteStore, path: &str) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {path}"))?;
    let entries: Vec<PortfolioEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parsing seed file {path}"))?;
    let added = store.seed_portfolio(&entries).await?;
    info!(path, added, total = entries.len(), "portfolio seeded");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received terminate signal"),
    }
}

//! # Live Stream Relay
//!
//! Holds one upstream subscription on the watch terms and pushes every
//! matching status to all connected viewers.
//!
//! ```text
//! DISCONNECTED ──> CONNECTING ──> STREAMING
//!      ^               ^              │ error / end of stream
//!      │               └── ERROR <────┘ (backoff)
//!      └── operator disconnect, shutdown
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::models::{RawTweet, WatchList};
use crate::notification::Notification;
use crate::traits::{Notifier, StreamSource};
use crate::tweets::TweetNormalizer;
use crate::viewers::{ViewerFrame, ViewerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    Disconnected,
    Connecting,
    Streaming,
    Error,
}

impl RelayState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Streaming,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

/// Operator commands, sent from the chat integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Drop the current subscription (if any) and subscribe again
    Reconnect,
    /// Drop the subscription and every viewer until `Reconnect`
    Disconnect,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Delay before the first reconnection attempt.
    pub reconnect_delay: Duration,
    /// Ceiling for the exponential backoff.
    pub max_reconnect_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(120),
        }
    }
}

/// Cloneable control side of a running relay.
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::Sender<RelayCommand>,
    state: Arc<AtomicU8>,
}

impl RelayHandle {
    /// Queues a command without waiting. Returns false if the relay is gone
    /// or already has commands pending.
    pub fn command(&self, cmd: RelayCommand) -> bool {
        self.commands.try_send(cmd).is_ok()
    }

    pub fn state(&self) -> RelayState {
        RelayState::from_u8(self.state.load(Ordering::Relaxed))
    }
}

enum SessionEnd {
    Reconnect,
    Disconnect,
    Shutdown,
    /// `received` is set once the session delivered at least one status.
    Failed { error: anyhow::Error, received: bool },
}

impl From<Option<RelayCommand>> for SessionEnd {
    fn from(cmd: Option<RelayCommand>) -> Self {
        match cmd {
            Some(RelayCommand::Reconnect) => Self::Reconnect,
            Some(RelayCommand::Disconnect) => Self::Disconnect,
            Some(RelayCommand::Shutdown) | None => Self::Shutdown,
        }
    }
}

pub struct LiveRelay {
    source: Arc<dyn StreamSource>,
    viewers: Arc<ViewerRegistry>,
    watch_list: Arc<WatchList>,
    normalizer: TweetNormalizer,
    notifier: Arc<dyn Notifier>,
    config: RelayConfig,
    state: Arc<AtomicU8>,
}

impl LiveRelay {
    pub fn new(
        source: Arc<dyn StreamSource>,
        viewers: Arc<ViewerRegistry>,
        watch_list: Arc<WatchList>,
        normalizer: TweetNormalizer,
        notifier: Arc<dyn Notifier>,
        config: RelayConfig,
    ) -> (Self, RelayHandle, mpsc::Receiver<RelayCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let state = Arc::new(AtomicU8::new(RelayState::Disconnected as u8));
        let relay = Self {
            source,
            viewers,
            watch_list,
            normalizer,
            notifier,
            config,
            state: state.clone(),
        };
        (relay, RelayHandle { commands: tx, state }, rx)
    }

    fn set_state(&self, state: RelayState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Counts and fans out one upstream status. Returns the number of
    /// viewers that accepted it.
    pub fn relay(&self, raw: RawTweet) -> usize {
        match raw.text.as_deref() {
            Some(text) if !text.is_empty() => self.watch_list.record(text),
            _ => return 0,
        }

        let events = self.normalizer.process([raw]);
        if events.is_empty() {
            return 0;
        }
        self.viewers.broadcast(&ViewerFrame::Data(events))
    }

    fn take_down_viewers(&self) {
        self.viewers.disconnect_all();
        self.notifier.notify(Notification::transport_down());
    }

    /// Runs until `Shutdown` or until every handle is dropped.
    pub async fn run(self, mut commands: mpsc::Receiver<RelayCommand>) {
        let initial = self.config.reconnect_delay;
        let mut delay = initial;
        let mut paused = false;

        loop {
            if paused {
                self.set_state(RelayState::Disconnected);
                match commands.recv().await {
                    Some(RelayCommand::Reconnect) => {
                        info!("live relay resuming");
                        paused = false;
                        delay = initial;
                    }
                    Some(RelayCommand::Disconnect) => {}
                    Some(RelayCommand::Shutdown) | None => break,
                }
                continue;
            }

            match self.session(&mut commands).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Reconnect => {
                    info!("live relay reconnecting on request");
                    delay = initial;
                }
                SessionEnd::Disconnect => {
                    info!("live relay disconnected on request");
                    self.take_down_viewers();
                    paused = true;
                }
                SessionEnd::Failed { error, received } => {
                    self.set_state(RelayState::Error);
                    // An upstream that accepts and then hangs up keeps backing off.
                    if received {
                        delay = initial;
                    }
                    warn!("live stream failed: {error:#}, reconnecting in {delay:?}");
                    self.notifier.notify(Notification::stream_error(&error));

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            delay = (delay * 2).min(self.config.max_reconnect_delay);
                        }
                        cmd = commands.recv() => match SessionEnd::from(cmd) {
                            SessionEnd::Shutdown => break,
                            SessionEnd::Disconnect => {
                                self.take_down_viewers();
                                paused = true;
                            }
                            _ => delay = initial,
                        }
                    }
                }
            }
        }

        self.set_state(RelayState::Disconnected);
        info!("live relay stopped");
    }

    async fn session(&self, commands: &mut mpsc::Receiver<RelayCommand>) -> SessionEnd {
        self.set_state(RelayState::Connecting);
        let track = self.watch_list.terms();

        let mut stream = tokio::select! {
            res = self.source.connect(&track) => match res {
                Ok(stream) => stream,
                Err(error) => return SessionEnd::Failed { error, received: false },
            },
            cmd = commands.recv() => return cmd.into(),
        };

        self.set_state(RelayState::Streaming);
        info!(terms = track.len(), "live relay streaming");
        let mut received = false;

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(raw)) => {
                        received = true;
                        self.relay(raw);
                    }
                    Some(Err(error)) => return SessionEnd::Failed { error, received },
                    None => {
                        return SessionEnd::Failed {
                            error: anyhow::anyhow!("upstream closed the stream"),
                            received,
                        }
                    }
                },
                cmd = commands.recv() => return cmd.into(),
            }
        }
    }
}

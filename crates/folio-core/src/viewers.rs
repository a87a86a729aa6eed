//! Registry of connected viewers.
//!
//! Each viewer owns a bounded outbound queue drained by its socket task.
//! Broadcasts serialize the frame once and never wait on a slow viewer.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::StreamEvent;

pub type ViewerId = Uuid;

/// Frames queued per viewer before new ones are dropped.
pub const VIEWER_CHANNEL_BUFFER_SIZE: usize = 64;

/// Messages pushed to viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ViewerFrame {
    Data(Vec<StreamEvent>),
}

/// Receiving half handed to the socket task of a new viewer.
pub struct ViewerHandle {
    pub id: ViewerId,
    pub rx: mpsc::Receiver<Arc<str>>,
}

#[derive(Default)]
pub struct ViewerRegistry {
    viewers: DashMap<ViewerId, mpsc::Sender<Arc<str>>>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> ViewerHandle {
        let (tx, rx) = mpsc::channel(VIEWER_CHANNEL_BUFFER_SIZE);
        let id = Uuid::new_v4();
        self.viewers.insert(id, tx);
        debug!("viewer {id} registered");
        ViewerHandle { id, rx }
    }

    pub fn unregister(&self, id: &ViewerId) {
        if self.viewers.remove(id).is_some() {
            debug!("viewer {id} unregistered");
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Sends a frame to every registered viewer. Returns how many accepted it.
    ///
    /// Full queues drop the frame; closed queues are pruned once the
    /// iteration is over.
    pub fn broadcast(&self, frame: &ViewerFrame) -> usize {
        if self.viewers.is_empty() {
            return 0;
        }

        let json: Arc<str> = match serde_json::to_string(frame) {
            Ok(j) => j.into(),
            Err(e) => {
                warn!("failed to serialize viewer frame: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        for entry in self.viewers.iter() {
            match entry.value().try_send(json.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("viewer {} is backpressured, frame dropped", entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*entry.key()),
            }
        }

        for id in stale {
            self.unregister(&id);
        }
        delivered
    }

    /// Drops every viewer queue, which ends their socket tasks.
    pub fn disconnect_all(&self) -> usize {
        let count = self.viewers.len();
        self.viewers.clear();
        info!("disconnected {count} viewers");
        count
    }
}

//! Operator commands posted by the chat integration's outgoing webhook.
//!
//! Commands are matched case-insensitively on the trigger word, then on the
//! full message text. Anything unrecognized is acknowledged and ignored.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use folio_core::{Notification, RelayCommand};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::Payload;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OutwebookForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub trigger_word: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    SocketReconnect,
    SocketDisconnect,
    Offline(bool),
    /// Raw id text, validated when applied
    Allow(String),
}

impl OperatorCommand {
    pub fn parse(trigger_word: &str, text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        match trigger_word.trim().to_lowercase().as_str() {
            "socket" => match text.as_str() {
                "socket reconnect" => Some(Self::SocketReconnect),
                "socket disconnect" => Some(Self::SocketDisconnect),
                _ => None,
            },
            // Only an explicit "offline no" brings the site back.
            "offline" => Some(Self::Offline(text != "offline no")),
            "allow" => Some(Self::Allow(text.replacen("allow ", "", 1).trim().to_string())),
            _ => None,
        }
    }
}

pub async fn outwebook(
    State(state): State<Arc<AppState>>,
    payload: Result<Payload<OutwebookForm>, Response>,
) -> Result<StatusCode, ApiError> {
    // An unreadable body carries no token, so it is refused like a wrong one.
    let form = payload.map(|Payload(form)| form).unwrap_or_else(|rejection| {
        debug!(status = %rejection.status(), "unreadable operator command");
        OutwebookForm::default()
    });
    let expected = state.outwebook_token.expose_secret();
    if form.token.is_empty() || form.token != expected {
        return Err(ApiError::Forbidden);
    }

    match OperatorCommand::parse(&form.trigger_word, &form.text) {
        Some(command) => apply(&state, command).await,
        None => info!(trigger = %form.trigger_word, "ignoring unknown operator command"),
    }
    Ok(StatusCode::OK)
}

async fn apply(state: &AppState, command: OperatorCommand) {
    info!(?command, "operator command");
    match command {
        OperatorCommand::SocketReconnect => {
            if !state.relay.command(RelayCommand::Reconnect) {
                warn!("relay did not accept reconnect");
            }
        }
        OperatorCommand::SocketDisconnect => {
            if !state.relay.command(RelayCommand::Disconnect) {
                warn!("relay did not accept disconnect");
            }
        }
        OperatorCommand::Offline(offline) => state.set_offline(offline),
        OperatorCommand::Allow(raw) => {
            let Ok(id) = Uuid::parse_str(&raw) else {
                warn!(id = %raw, "allow: not a record id");
                return;
            };
            match state.gate.allow(id).await {
                Ok(true) => {}
                Ok(false) => info!(%id, "allow: no such domain"),
                Err(e) => {
                    warn!(%id, "allow failed: {e}");
                    state.notify_in_production(Notification::database_error(&e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(
            OperatorCommand::parse("Socket", "SOCKET Reconnect"),
            Some(OperatorCommand::SocketReconnect)
        );
        assert_eq!(
            OperatorCommand::parse("socket", "socket disconnect"),
            Some(OperatorCommand::SocketDisconnect)
        );
        assert_eq!(OperatorCommand::parse("socket", "socket explode"), None);
    }

    #[test]
    fn offline_defaults_to_yes() {
        assert_eq!(
            OperatorCommand::parse("offline", "offline no"),
            Some(OperatorCommand::Offline(false))
        );
        assert_eq!(
            OperatorCommand::parse("offline", "offline yes"),
            Some(OperatorCommand::Offline(true))
        );
        assert_eq!(
            OperatorCommand::parse("OFFLINE", "offline maybe"),
            Some(OperatorCommand::Offline(true))
        );
    }

    #[test]
    fn allow_extracts_the_id() {
        let id = "0190e1c2-7d3a-7b8e-9f00-123456789abc";
        assert_eq!(
            OperatorCommand::parse("allow", &format!("allow {id}")),
            Some(OperatorCommand::Allow(id.to_string()))
        );
        assert_eq!(OperatorCommand::parse("dance", "dance now"), None);
    }
}

//! Endpoints the homepage script calls with the token it was served.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use folio_core::models::{ContactMessage, StreamEvent};
use folio_core::Notification;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::extract::{ClientIp, Payload};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct FirstTweets {
    pub success: bool,
    pub tweets: Vec<StreamEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

fn authorize(state: &AppState, token: &str, client: &str) -> Result<(), ApiError> {
    if state.tokens.verify(token, client) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Recent history for the live wall, oldest first.
pub async fn first_tweets(
    State(state): State<Arc<AppState>>,
    ClientIp(client): ClientIp,
    Payload(body): Payload<TokenBody>,
) -> Result<Json<FirstTweets>, ApiError> {
    authorize(&state, &body.token, &client)?;

    let tweets = state
        .normalizer
        .fetch_recent(
            state.search.as_ref(),
            &state.site.search_query,
            state.site.search_count,
        )
        .await
        .map_err(|e| {
            warn!("history search failed: {e}");
            ApiError::Upstream(e.to_string())
        })?;

    Ok(Json(FirstTweets {
        success: true,
        tweets,
    }))
}

/// Contact form: pings the owner, then mails the message.
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    ClientIp(client): ClientIp,
    Payload(form): Payload<ContactForm>,
) -> Result<Json<Value>, ApiError> {
    authorize(&state, &form.token, &client)?;

    let message = ContactMessage {
        name: form.name,
        email: form.email,
        message: form.message,
    };
    state.notifier.notify(Notification::contact(&message));

    let email = folio_ui::contact_email(&message, &state.site.mail_subject)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state.mailer.send(email).await.map_err(|e| {
        warn!("contact email not sent: {e}");
        ApiError::Forbidden
    })?;

    info!(from = %message.email, "contact email sent");
    Ok(Json(json!({ "success": true })))
}

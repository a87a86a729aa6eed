//! # Homepage
//!
//! Each request runs the same pipeline: offline check, token, visit
//! notification, referer gate, portfolio fetch, render.

use std::sync::Arc;

use askama::Template;
use axum::extract::State;
use axum::http::header::{HOST, REFERER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Html;
use chrono::Utc;
use folio_core::models::PortfolioEntry;
use folio_core::{Decision, Notification};
use folio_ui::{age_on, HomepageTemplate};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extract::ClientIp;
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub async fn homepage(
    State(state): State<Arc<AppState>>,
    ClientIp(client): ClientIp,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    if state.is_offline() {
        debug!("offline, refusing homepage");
        return Err(state.page_error(StatusCode::INTERNAL_SERVER_ERROR, "site offline"));
    }

    let token = state.tokens.issue(&client).map_err(|e| {
        warn!("token issue failed: {e}");
        state.page_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let host = header(&headers, HOST);
    let referer = header(&headers, REFERER);
    state.notify_in_production(Notification::new_visit(host, referer, &client));

    if let Some(referer) = referer {
        check_referer(&state, referer).await?;
    }

    let portfolio = load_portfolio(&state).await;
    let age = age_on(state.site.birth_date, Utc::now().date_naive());

    let page = HomepageTemplate::new(
        &state.site.owner_name,
        age,
        &portfolio,
        &token,
        state.site.production,
    );
    page.render().map(Html).map_err(|e| {
        warn!("homepage failed to render: {e}");
        state.page_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Denied referers get the error page. A gate that cannot reach its store
/// lets the visitor through.
async fn check_referer(state: &AppState, referer: &str) -> Result<(), ApiError> {
    match state.gate.check_referer(referer).await {
        Ok(outcome) if outcome.decision == Decision::Deny => {
            info!(referer, "referring domain denied");
            Err(state.page_error(StatusCode::INTERNAL_SERVER_ERROR, "domain denied"))
        }
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(referer, "domain gate unavailable, allowing: {e}");
            state.notify_in_production(Notification::database_error(&e));
            Ok(())
        }
    }
}

async fn load_portfolio(state: &AppState) -> Vec<PortfolioEntry> {
    match state.portfolio.list_portfolio().await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("portfolio unavailable, rendering empty: {e}");
            state.notify_in_production(Notification::database_error(&e));
            Vec::new()
        }
    }
}

/// Unmatched routes.
pub fn not_found(production: bool) -> axum::response::Response {
    crate::error::error_page(StatusCode::NOT_FOUND, production)
}

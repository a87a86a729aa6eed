//! # folio-api
//!
//! The HTTP surface of the portfolio server, built on axum.
//!
//! ```text
//! GET  /                 homepage (gated by referer)
//! POST /getFirstTweets   recent history for the live wall
//! POST /sendEmail        contact form
//! POST /outwebook        operator commands from chat
//! GET  /live             viewer WebSocket
//! GET  /health           status report
//! *                      static assets, else the 404 page
//! ```

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::handler::HandlerWithoutStateExt;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AppState, SiteConfig};

use handlers::{api, live, outwebook, pages};

/// Builds the complete application router.
pub fn router(state: Arc<AppState>) -> Router {
    let production = state.site.production;
    let canonical_www = production && state.site.canonical_www;
    let assets = assets(&state.site);

    let app = Router::new()
        .route("/", get(pages::homepage))
        .route("/getFirstTweets", post(api::first_tweets))
        .route("/sendEmail", post(api::send_email))
        .route("/outwebook", post(outwebook::outwebook))
        .route("/live", get(live::live))
        .route("/health", get(live::health))
        .with_state(state)
        .fallback_service(assets)
        .layer(CatchPanicLayer::custom(middleware::panic_page(production)))
        .layer(CompressionLayer::new());

    let app = if canonical_www {
        app.layer(axum::middleware::from_fn(middleware::redirect_to_www))
    } else {
        app
    };

    app.layer(TraceLayer::new_for_http())
}

/// Public files at the root and front-end packages under `/components`,
/// falling back to the 404 page.
fn assets(site: &SiteConfig) -> Router {
    let production = site.production;
    let not_found = move || async move { pages::not_found(production) };

    Router::new()
        .nest_service(
            "/components",
            ServeDir::new(&site.components_dir).fallback(not_found.into_service()),
        )
        .fallback_service(ServeDir::new(&site.public_dir).fallback(not_found.into_service()))
        .layer(axum::middleware::map_response_with_state(
            middleware::cache_control_value(site.static_max_age_secs),
            middleware::cache_successful,
        ))
}

//! Cross-cutting layers: canonical host, static caching, panics.

use std::any::Any;

use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, HOST, LOCATION};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::error_page;

/// Sends GETs for a bare host to its `www.` twin. Platform hostnames
/// (`*.herokuapp.com`) are left alone.
pub async fn redirect_to_www(req: Request, next: Next) -> Response {
    if req.method() == Method::GET {
        if let Some(target) = www_location(&req) {
            debug!(%target, "redirecting to canonical host");
            return (StatusCode::MOVED_PERMANENTLY, [(LOCATION, target)]).into_response();
        }
    }
    next.run(req).await
}

fn www_location(req: &Request) -> Option<String> {
    let host = req.headers().get(HOST)?.to_str().ok()?;
    if host.starts_with("www") || host.contains("herokuapp") {
        return None;
    }
    let scheme = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let path = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    Some(format!("{scheme}://www.{host}{path}"))
}

/// Adds the static-asset `Cache-Control` to successful responses.
pub async fn cache_successful(State(value): State<HeaderValue>, mut res: Response) -> Response {
    if res.status().is_success() && !res.headers().contains_key(CACHE_CONTROL) {
        res.headers_mut().insert(CACHE_CONTROL, value);
    }
    res
}

pub fn cache_control_value(max_age_secs: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("public, max-age={max_age_secs}"))
        .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=86400"))
}

/// Panic handler for `CatchPanicLayer`.
pub fn panic_page(production: bool) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |_| {
        tracing::error!("handler panicked");
        error_page(StatusCode::INTERNAL_SERVER_ERROR, production)
    }
}

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use folio_ui::ErrorTemplate;
use thiserror::Error;
use tracing::error;

/// Failures surfaced to HTTP clients.
///
/// XHR endpoints answer with a bare status; page requests get the error page.
/// Neither ever carries internal details.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("forbidden")]
    Forbidden,

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{reason}")]
    Page {
        status: StatusCode,
        reason: String,
        production: bool,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY.into_response(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            ApiError::Page {
                status, production, ..
            } => error_page(status, production),
        }
    }
}

/// Renders the error page for `status`.
pub fn error_page(status: StatusCode, production: bool) -> Response {
    let code = status.as_u16().to_string();
    match (ErrorTemplate {
        code: &code,
        production,
    })
    .render()
    {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("error page failed to render: {e}");
            status.into_response()
        }
    }
}

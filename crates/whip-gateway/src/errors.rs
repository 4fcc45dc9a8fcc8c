//! Gateway error types and wire-level classification.
//!
//! Synchronous failures (authorization, negotiation, request parsing) flow
//! through each handler's `Result` into a single [`IntoResponse`]
//! classification. Asynchronous failures (start timeout, session end) never
//! reach an HTTP response; they are delivered through the completion
//! callbacks and logs only.
//!
//! Classification policy:
//! - [`GatewayError::Upstream`] already carries a protocol status and is
//!   passed through verbatim.
//! - [`GatewayError::NotFound`] covers both "resource never existed" and
//!   "owning instance unreachable"; callers cannot distinguish the two.
//! - [`GatewayError::InvalidRestartRequest`] is the only client-input
//!   validation error on this surface.
//! - Everything else collapses to a bare 500 with an empty body so internal
//!   detail never leaks to publishers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::debug;

/// WHIP gateway error type.
///
/// `Clone` because the negotiation-phase error is both returned to the HTTP
/// caller and delivered to the session's ready callback.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The authorization collaborator rejected the stream key.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// SDP offer/answer exchange failed.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Unknown resource id, or no instance answered for it.
    #[error("ingress not found")]
    NotFound,

    /// Malformed ICE restart request (missing or empty credentials).
    #[error("invalid WHIP restart request")]
    InvalidRestartRequest,

    /// Transport-level error that already carries a protocol status code.
    #[error("{message}")]
    Upstream {
        /// HTTP status carried by the upstream error.
        status: u16,
        /// Message passed through to the client verbatim.
        message: String,
    },

    /// A bounded session phase exceeded its deadline.
    #[error("{phase} timed out")]
    Timeout {
        /// Which phase hit its budget ("negotiation" or "session start").
        phase: &'static str,
    },

    /// Cancelled by process shutdown.
    #[error("cancelled by shutdown")]
    Cancelled,

    /// Catch-all. Details appear in logs, never in responses.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Wire status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::InvalidRestartRequest => StatusCode::BAD_REQUEST,
            GatewayError::Authorization(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Negotiation(_)
            | GatewayError::Timeout { .. }
            | GatewayError::Cancelled
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body, where one is safe to send.
    ///
    /// Internal-class errors yield `None`: the client gets a bare status.
    #[must_use]
    pub fn client_body(&self) -> Option<String> {
        match self {
            GatewayError::Upstream { message, .. } => Some(message.clone()),
            GatewayError::NotFound => Some("ingress not found".to_string()),
            GatewayError::InvalidRestartRequest => {
                Some("invalid WHIP restart request".to_string())
            }
            GatewayError::Authorization(message) => Some(message.clone()),
            GatewayError::Negotiation(_)
            | GatewayError::Timeout { .. }
            | GatewayError::Cancelled
            | GatewayError::Internal(_) => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            debug!(target: "whip.server", error = %self, "whip request failed");
        }
        match self.client_body() {
            Some(body) => (status, body).into_response(),
            None => status.into_response(),
        }
    }
}

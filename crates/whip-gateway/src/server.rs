//! WHIP protocol endpoint layer.
//!
//! Maps the wire protocol onto the orchestrator and the RPC port:
//!
//! - `POST /{app}` and `POST /{app}/{stream_key}` create sessions locally
//!   (stream key from `Authorization` or the path; the path wins when both
//!   are routed).
//! - `DELETE`/`PATCH /{app}/{stream_key}/{resource_id}` are forwarded over
//!   affinity-routed RPC, since the resource may be owned by another
//!   instance.
//! - `OPTIONS` on all paths answers CORS preflights directly.
//!
//! Administrative operations (`close_handler`, relay association) are not on
//! the wire at all; the owning instance calls the orchestrator directly.

use crate::errors::GatewayError;
use crate::etag::etag_for;
use crate::orchestrator::SessionOrchestrator;
use crate::rpc::{HandlerRpcClient, IceRestartRequest, RpcError, TeardownRequest};
use crate::sdp::extract_ice_credentials;
use axum::{
    extract::{Path, State},
    http::{
        header::{self, HeaderName, HeaderValue},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{delete, post},
    Router,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Budget for affinity-routed RPC calls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Content type of SDP offers and answers.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Content type of trickle-ICE fragments.
pub const TRICKLE_CONTENT_TYPE: &str = "application/trickle-ice-sdpfrag";

const ACCEPT_POST: HeaderName = HeaderName::from_static("accept-post");

/// Shared endpoint state.
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub rpc_client: Arc<dyn HandlerRpcClient>,
}

/// The WHIP HTTP server.
pub struct WhipServer {
    state: GatewayState,
}

impl WhipServer {
    /// Create a server over an orchestrator and an RPC client.
    #[must_use]
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        rpc_client: Arc<dyn HandlerRpcClient>,
    ) -> Self {
        Self {
            state: GatewayState {
                orchestrator,
                rpc_client,
            },
        }
    }

    /// Build the protocol router. `health` carries the embedding service's
    /// passthrough handlers (health probes and the like) and is merged in
    /// unchanged.
    #[must_use]
    pub fn router(&self, health: Router) -> Router {
        Router::new()
            .route(
                "/:app",
                post(handle_create_bearer).options(handle_preflight_base),
            )
            .route(
                "/:app/:stream_key",
                post(handle_create_path_key).options(handle_preflight_base),
            )
            .route(
                "/:app/:stream_key/:resource_id",
                delete(handle_teardown)
                    .patch(handle_ice_restart)
                    .options(handle_preflight_resource),
            )
            .with_state(self.state.clone())
            .merge(health)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable bind address, a bind error, or a server
    /// error; all are internal-class.
    pub async fn serve(
        self,
        bind_address: &str,
        health: Router,
        cancel: CancellationToken,
    ) -> Result<(), GatewayError> {
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            GatewayError::Internal(format!("invalid bind address {bind_address}: {e}"))
        })?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Internal(format!("failed to bind {addr}: {e}")))?;

        info!(target: "whip.server", addr = %addr, "WHIP server listening");

        let router = self.router(health);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!(target: "whip.server", "WHIP server shutting down");
            })
            .await
            .map_err(|e| GatewayError::Internal(format!("WHIP server failed: {e}")))
    }
}

/// Stream key from an `Authorization` header. OBS sends the `Bearer` prefix
/// as expected, but some clients send the bare key.
fn stream_key_from_authorization(headers: &HeaderMap) -> String {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    bearer.strip_prefix("Bearer ").unwrap_or(bearer).to_string()
}

fn with_allow_origin(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn handle_create_bearer(
    State(state): State<GatewayState>,
    Path(app): Path<String>,
    headers: HeaderMap,
    offer: Bytes,
) -> Response {
    let stream_key = stream_key_from_authorization(&headers);
    handle_create(state, app, stream_key, &headers, offer).await
}

async fn handle_create_path_key(
    State(state): State<GatewayState>,
    Path((app, stream_key)): Path<(String, String)>,
    headers: HeaderMap,
    offer: Bytes,
) -> Response {
    handle_create(state, app, stream_key, &headers, offer).await
}

async fn handle_create(
    state: GatewayState,
    app: String,
    stream_key: String,
    headers: &HeaderMap,
    offer: Bytes,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    debug!(
        target: "whip.server",
        stream_key = %stream_key,
        user_agent = %user_agent,
        "new WHIP request"
    );

    let Ok(offer_str) = std::str::from_utf8(&offer) else {
        return GatewayError::Negotiation("offer is not valid UTF-8".to_string()).into_response();
    };

    match state.orchestrator.create_session(&stream_key, offer_str).await {
        Ok((resource_id, answer)) => (
            StatusCode::CREATED,
            [
                (header::CONTENT_TYPE, SDP_CONTENT_TYPE.to_string()),
                (
                    header::LOCATION,
                    format!("/{app}/{stream_key}/{resource_id}"),
                ),
                (header::ETAG, etag_for(&offer)),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
                (
                    header::ACCESS_CONTROL_EXPOSE_HEADERS,
                    "Location, ETag".to_string(),
                ),
            ],
            answer,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_teardown(
    State(state): State<GatewayState>,
    Path((_app, stream_key, resource_id)): Path<(String, String, String)>,
) -> Response {
    info!(
        target: "whip.server",
        resource_id = %resource_id,
        "handling WHIP delete request"
    );

    let request = TeardownRequest {
        resource_id: resource_id.clone(),
        stream_key,
    };

    let response = match state
        .rpc_client
        .teardown(&resource_id, request, RPC_TIMEOUT)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(RpcError::NoResponse) => GatewayError::NotFound.into_response(),
        Err(err) => GatewayError::from(err).into_response(),
    };
    with_allow_origin(response)
}

async fn handle_ice_restart(
    State(state): State<GatewayState>,
    Path((_app, stream_key, resource_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(
        target: "whip.server",
        resource_id = %resource_id,
        "handling ICE restart request"
    );

    let if_match = headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if if_match != "*" {
        // Trickle-ICE (incremental candidates) is not supported; only a full
        // restart against the wildcard tag is.
        info!(
            target: "whip.server",
            stream_key = %stream_key,
            resource_id = %resource_id,
            "WHIP client attempted Trickle-ICE"
        );
        return with_allow_origin(StatusCode::NO_CONTENT.into_response());
    }

    let Ok(body_str) = std::str::from_utf8(&body) else {
        return with_allow_origin(GatewayError::InvalidRestartRequest.into_response());
    };
    debug!(
        target: "whip.server",
        resource_id = %resource_id,
        body = %body_str,
        "ICE restart fragment received"
    );

    let credentials = match extract_ice_credentials(body_str) {
        Ok(credentials) => credentials,
        Err(err) => {
            info!(
                target: "whip.server",
                stream_key = %stream_key,
                resource_id = %resource_id,
                "ICE restart failed to extract ice-ufrag/ice-pwd"
            );
            return with_allow_origin(err.into_response());
        }
    };

    let request = IceRestartRequest {
        user_fragment: credentials.user_fragment,
        password: credentials.password,
        resource_id: resource_id.clone(),
        stream_key: stream_key.clone(),
    };

    let response = match state
        .rpc_client
        .ice_restart(&resource_id, request, RPC_TIMEOUT)
        .await
    {
        Ok(restarted) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, TRICKLE_CONTENT_TYPE.to_string()),
                (
                    header::ETAG,
                    etag_for(restarted.trickle_ice_sdpfrag.as_bytes()),
                ),
            ],
            restarted.trickle_ice_sdpfrag,
        )
            .into_response(),
        Err(RpcError::NoResponse) => {
            info!(
                target: "whip.server",
                stream_key = %stream_key,
                resource_id = %resource_id,
                "ICE restart failed, no such session"
            );
            GatewayError::NotFound.into_response()
        }
        Err(err) => {
            info!(
                target: "whip.server",
                stream_key = %stream_key,
                resource_id = %resource_id,
                error = %err,
                "ICE restart failed"
            );
            GatewayError::from(err).into_response()
        }
    };
    with_allow_origin(response)
}

async fn handle_preflight_base() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*".to_string()),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                "POST, OPTIONS".to_string(),
            ),
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                "Location, ETag".to_string(),
            ),
            (ACCEPT_POST, SDP_CONTENT_TYPE.to_string()),
        ],
        (),
    )
        .into_response()
}

async fn handle_preflight_resource() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*".to_string()),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                "PATCH, OPTIONS, DELETE".to_string(),
            ),
        ],
        (),
    )
        .into_response()
}

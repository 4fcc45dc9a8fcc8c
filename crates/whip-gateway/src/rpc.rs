//! Affinity-routed RPC client port.
//!
//! Teardown and ICE restart can arrive at any gateway instance, but only the
//! instance that owns a session can act on it. Both operations are forwarded
//! through this port with the resource id as the routing key so the wire
//! runtime delivers them to the owning instance. The runtime itself is
//! supplied by the embedding service.
//!
//! A distinguished [`RpcError::NoResponse`] marks "no instance answered for
//! this key"; callers remap it to [`GatewayError::NotFound`], since a client
//! cannot tell an unknown resource apart from an unreachable owner.

use crate::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Request to tear a published session down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownRequest {
    pub resource_id: String,
    pub stream_key: String,
}

/// Request to restart ICE with fresh client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceRestartRequest {
    pub user_fragment: String,
    pub password: String,
    pub resource_id: String,
    pub stream_key: String,
}

/// Response to an ICE restart: the server-side trickle fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceRestartResponse {
    pub trickle_ice_sdpfrag: String,
}

/// Errors surfaced by the RPC runtime.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// No instance answered for the routing key within the timeout.
    #[error("no response for routing key")]
    NoResponse,

    /// The owning instance answered with a protocol-level error.
    #[error("{message}")]
    Upstream {
        /// HTTP status the owning instance chose for this failure.
        status: u16,
        /// Message passed through to the client verbatim.
        message: String,
    },

    /// Transport failure below the protocol level.
    #[error("rpc transport error: {0}")]
    Transport(String),
}

impl From<RpcError> for GatewayError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::NoResponse => GatewayError::NotFound,
            RpcError::Upstream { status, message } => GatewayError::Upstream { status, message },
            RpcError::Transport(message) => GatewayError::Internal(message),
        }
    }
}

/// Client for protocol operations addressed to the instance owning a
/// resource id.
#[async_trait]
pub trait HandlerRpcClient: Send + Sync {
    /// Tear down the session named by `resource_id`.
    ///
    /// # Errors
    ///
    /// [`RpcError::NoResponse`] when no instance owns the resource.
    async fn teardown(
        &self,
        resource_id: &str,
        request: TeardownRequest,
        timeout: Duration,
    ) -> Result<(), RpcError>;

    /// Restart ICE for the session named by `resource_id`.
    ///
    /// # Errors
    ///
    /// [`RpcError::NoResponse`] when no instance owns the resource.
    async fn ice_restart(
        &self,
        resource_id: &str,
        request: IceRestartRequest,
        timeout: Duration,
    ) -> Result<IceRestartResponse, RpcError>;
}

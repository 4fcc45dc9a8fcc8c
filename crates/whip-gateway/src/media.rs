//! Media session ports.
//!
//! The gateway orchestrates session lifecycles but does not touch media:
//! track negotiation, the ICE/DTLS/SRTP pipeline and relaying live behind
//! [`MediaSession`], implemented by the embedding service. The same goes for
//! stream-key authorization ([`PublishAuthorizer`]), which resolves session
//! parameters and hands the gateway its two single-shot completion
//! callbacks.
//!
//! Every potentially blocking method receives a [`CancellationToken`]
//! derived from the gateway's root token, so process shutdown reaches into
//! any in-flight collaborator call.

use crate::errors::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Kind of media track carried by a publishing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Negotiated mime type per track kind, produced once all expected tracks
/// have arrived.
pub type MimeTypes = HashMap<TrackKind, String>;

/// Parameters resolved for an authorized publishing session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionParams {
    /// Stream this session publishes to.
    pub stream_id: String,
    /// Track kinds the publisher is expected to provide; the start phase
    /// blocks until all of them are present.
    pub expected_tracks: Vec<TrackKind>,
    /// Free-form attributes forwarded to the media layer untouched.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Sink for periodic media statistics.
///
/// Produced by the ready callback and attached to the session handler; the
/// gateway itself never records into it.
pub trait StatsSink: Send + Sync {
    /// Record a stats sample for one track kind.
    fn record(&self, kind: TrackKind, bytes_received: u64, packets_lost: u64);
}

/// Ready notification: fired exactly once per created session, on success
/// (with the negotiated mime types) or failure (with the error). May return
/// a stats sink to attach to the session.
pub type ReadyCallback =
    Box<dyn FnOnce(Option<MimeTypes>, Option<GatewayError>) -> Option<Box<dyn StatsSink>> + Send>;

/// End-of-session notification: fired at most once, and only for sessions
/// whose start phase succeeded.
pub type EndedCallback = Box<dyn FnOnce(Option<GatewayError>) + Send>;

/// Outcome of a successful authorization.
pub struct PublishGrant {
    /// Parameters for the media layer.
    pub params: SessionParams,
    /// Ready notification, if the collaborator wants one.
    pub on_ready: Option<ReadyCallback>,
    /// End-of-session notification, if the collaborator wants one.
    pub on_ended: Option<EndedCallback>,
}

/// Capability contract of one media session.
///
/// The registry holds sessions as `Arc<dyn MediaSession>`; their public
/// lifetime is defined by registration and removal, not by the reference
/// count.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Run the SDP offer/answer exchange and return the answer.
    async fn negotiate(
        &self,
        cancel: CancellationToken,
        params: &SessionParams,
        offer: &str,
    ) -> Result<String, GatewayError>;

    /// Block until all expected tracks are present; returns the negotiated
    /// mime type per track kind.
    async fn start(&self, cancel: CancellationToken) -> Result<MimeTypes, GatewayError>;

    /// Block until the session ends. Unbounded; cancelled only through the
    /// token on process shutdown.
    async fn wait_for_end(&self, cancel: CancellationToken) -> Result<(), GatewayError>;

    /// Attach a relay output for one track kind.
    fn associate_relay(
        &self,
        kind: TrackKind,
        token: &str,
        sink: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Result<(), GatewayError>;

    /// Detach the relay output for one track kind.
    fn dissociate_relay(&self, kind: TrackKind);

    /// Tear the session down immediately.
    fn close(&self);

    /// Attach the stats sink returned by the ready callback.
    fn attach_stats_sink(&self, sink: Box<dyn StatsSink>);
}

/// Creates a fresh, un-negotiated media session per accepted offer.
pub trait SessionFactory: Send + Sync {
    /// Instantiate a new session handler.
    fn create_session(&self) -> Arc<dyn MediaSession>;
}

/// Validates a stream key and resolves session parameters plus completion
/// callbacks.
///
/// The handler is passed along so the collaborator can register it for
/// affinity-routed protocol operations before the session goes live.
#[async_trait]
pub trait PublishAuthorizer: Send + Sync {
    /// Authorize a publish attempt.
    ///
    /// # Errors
    ///
    /// Any error aborts session creation before negotiation; nothing is
    /// registered and no callback is owed.
    async fn authorize(
        &self,
        stream_key: &str,
        resource_id: &str,
        handler: Arc<dyn MediaSession>,
    ) -> Result<PublishGrant, GatewayError>;
}

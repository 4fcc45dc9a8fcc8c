//! Session lifecycle orchestrator.
//!
//! Drives a publishing session from offer to termination:
//!
//! 1. Authorize the stream key (nothing is owed on failure).
//! 2. Negotiate the SDP answer under a bounded deadline; the answer is
//!    returned synchronously to the HTTP caller.
//! 3. In a spawned task: register the session, run the bounded start phase,
//!    fire the ready callback.
//! 4. In a second spawned task: block on end-of-session, remove the
//!    registration, fire the ended callback.
//!
//! Callback obligations are owned here, not by the endpoint layer: the ready
//! callback fires exactly once per session that passed authorization, the
//! ended callback at most once and only after a successful start. Both are
//! `FnOnce`, so a second invocation is unrepresentable.
//!
//! Registry cleanup precedes the callback on both asynchronous exit paths;
//! by the time a collaborator observes termination, concurrent lookups
//! already miss.

use crate::errors::GatewayError;
use crate::media::{
    EndedCallback, MediaSession, PublishAuthorizer, PublishGrant, ReadyCallback, SessionFactory,
    TrackKind,
};
use crate::registry::SessionRegistry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Budget for the SDP offer/answer exchange.
pub const SDP_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for all expected tracks to arrive after negotiation.
pub const SESSION_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of generated resource identifiers.
const RESOURCE_ID_PREFIX: &str = "wh";

fn new_resource_id() -> String {
    format!("{RESOURCE_ID_PREFIX}_{}", uuid::Uuid::new_v4().simple())
}

/// Orchestrates session lifecycles against the registry and the external
/// media/authorization collaborators.
pub struct SessionOrchestrator {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn SessionFactory>,
    authorizer: Arc<dyn PublishAuthorizer>,
    cancel: CancellationToken,
}

impl SessionOrchestrator {
    /// Create an orchestrator with its own root cancellation scope.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn SessionFactory>,
        authorizer: Arc<dyn PublishAuthorizer>,
    ) -> Self {
        Self {
            registry,
            factory,
            authorizer,
            cancel: CancellationToken::new(),
        }
    }

    /// Child token of the root cancellation scope, for servers and other
    /// tasks that should stop with the orchestrator.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Cancel every in-flight session phase. Bounded phases abort
    /// immediately; sessions blocked in wait-for-end unwind through their
    /// normal cleanup path.
    pub fn shutdown(&self) {
        info!(target: "whip.orchestrator", "shutting down, cancelling active sessions");
        self.cancel.cancel();
    }

    /// True when no sessions are registered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.registry.is_idle()
    }

    /// Create a session from an SDP offer.
    ///
    /// Returns the generated resource id and the SDP answer. The session is
    /// not yet registered when this returns; registration and the start
    /// phase continue in a background task.
    ///
    /// # Errors
    ///
    /// Authorization and negotiation failures (including the negotiation
    /// deadline) surface here. Later failures are observable only through
    /// the completion callbacks and logs.
    #[instrument(skip(self, offer), fields(stream_key = %stream_key))]
    pub async fn create_session(
        &self,
        stream_key: &str,
        offer: &str,
    ) -> Result<(String, String), GatewayError> {
        let resource_id = new_resource_id();
        let handler = self.factory.create_session();

        let PublishGrant {
            params,
            on_ready,
            on_ended,
        } = self
            .authorizer
            .authorize(stream_key, &resource_id, Arc::clone(&handler))
            .await?;

        let answer = match bounded(
            &self.cancel,
            SDP_RESPONSE_TIMEOUT,
            "negotiation",
            handler.negotiate(self.cancel.child_token(), &params, offer),
        )
        .await
        {
            Ok(answer) => answer,
            Err(err) => {
                warn!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    error = %err,
                    "negotiation failed"
                );
                metrics::counter!("whip_sessions_failed_total").increment(1);
                if let Some(ready) = on_ready {
                    let _ = ready(None, Some(err.clone()));
                }
                return Err(err);
            }
        };

        debug!(
            target: "whip.orchestrator",
            resource_id = %resource_id,
            "answer produced, launching session start"
        );

        spawn_start_phase(
            Arc::clone(&self.registry),
            self.cancel.clone(),
            resource_id.clone(),
            stream_key.to_string(),
            handler,
            on_ready,
            on_ended,
        );

        Ok((resource_id, answer))
    }

    /// Close a locally-owned session handler. No-op for unknown ids.
    pub fn close_handler(&self, resource_id: &str) {
        if let Some(handler) = self.registry.lookup(resource_id) {
            handler.close();
        }
    }

    /// Attach a relay output to a locally-owned session.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotFound`] when the resource id is not registered on
    /// this instance.
    pub fn associate_relay(
        &self,
        resource_id: &str,
        kind: TrackKind,
        token: &str,
        sink: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Result<(), GatewayError> {
        match self.registry.lookup(resource_id) {
            Some(handler) => handler.associate_relay(kind, token, sink),
            None => Err(GatewayError::NotFound),
        }
    }

    /// Detach a relay output from a locally-owned session. No-op for
    /// unknown ids.
    pub fn dissociate_relay(&self, resource_id: &str, kind: TrackKind) {
        if let Some(handler) = self.registry.lookup(resource_id) {
            handler.dissociate_relay(kind);
        }
    }
}

/// Race a bounded collaborator call against its budget and the root
/// cancellation scope.
async fn bounded<T>(
    cancel: &CancellationToken,
    budget: Duration,
    phase: &'static str,
    fut: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    tokio::select! {
        () = cancel.cancelled() => Err(GatewayError::Cancelled),
        res = tokio::time::timeout(budget, fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(GatewayError::Timeout { phase }),
        },
    }
}

/// Registration and the bounded start phase. Outlives the request task that
/// produced the answer.
fn spawn_start_phase(
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    resource_id: String,
    stream_key: String,
    handler: Arc<dyn MediaSession>,
    on_ready: Option<ReadyCallback>,
    on_ended: Option<EndedCallback>,
) {
    tokio::spawn(async move {
        // Registration strictly precedes the start call; administrative
        // operations can reach the session from here on.
        registry.register(&resource_id, Arc::clone(&handler));
        metrics::counter!("whip_sessions_created_total").increment(1);
        metrics::gauge!("whip_sessions_active").increment(1.0);

        let started = bounded(
            &cancel,
            SESSION_START_TIMEOUT,
            "session start",
            handler.start(cancel.child_token()),
        )
        .await;

        match started {
            Ok(mime_types) => {
                info!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    "all tracks ready"
                );
                if let Some(ready) = on_ready {
                    if let Some(sink) = ready(Some(mime_types), None) {
                        handler.attach_stats_sink(sink);
                    }
                }
                spawn_wait_phase(registry, cancel, resource_id, stream_key, handler, on_ended);
            }
            Err(err) => {
                // Removal first: concurrent lookups must miss before the
                // callback observes the failure. The session never started,
                // so the ended callback is not owed.
                if registry.remove(&resource_id) {
                    metrics::gauge!("whip_sessions_active").decrement(1.0);
                }
                metrics::counter!("whip_sessions_failed_total").increment(1);
                warn!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    stream_key = %stream_key,
                    error = %err,
                    "WHIP session failed to start"
                );
                if let Some(ready) = on_ready {
                    if let Some(sink) = ready(None, Some(err)) {
                        handler.attach_stats_sink(sink);
                    }
                }
            }
        }
    });
}

/// The unbounded wait-for-end phase, cancelled only by process shutdown.
fn spawn_wait_phase(
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    resource_id: String,
    stream_key: String,
    handler: Arc<dyn MediaSession>,
    on_ended: Option<EndedCallback>,
) {
    tokio::spawn(async move {
        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(GatewayError::Cancelled),
            res = handler.wait_for_end(cancel.child_token()) => res,
        };

        if registry.remove(&resource_id) {
            metrics::gauge!("whip_sessions_active").decrement(1.0);
        }
        metrics::counter!("whip_sessions_ended_total").increment(1);

        match &outcome {
            Ok(()) => {
                info!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    "WHIP session ended"
                );
            }
            Err(GatewayError::Cancelled) => {
                info!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    "WHIP session cancelled by shutdown"
                );
            }
            Err(err) => {
                warn!(
                    target: "whip.orchestrator",
                    resource_id = %resource_id,
                    stream_key = %stream_key,
                    error = %err,
                    "WHIP session failed"
                );
            }
        }

        if let Some(ended) = on_ended {
            ended(outcome.err());
        }
    });
}

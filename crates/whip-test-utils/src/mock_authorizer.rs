//! Mock publish authorizer with a callback invocation log.
//!
//! The log records every `authorize` call and, crucially, every invocation
//! of the ready/ended callbacks the mock hands to the orchestrator - tests
//! assert exactly-once delivery through it. Optional probes run at the
//! start of each callback so tests can observe gateway state (for example
//! registry contents) at the moment of delivery.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use whip_gateway::errors::GatewayError;
use whip_gateway::media::{
    EndedCallback, MediaSession, MimeTypes, PublishAuthorizer, PublishGrant, ReadyCallback,
    SessionParams,
};

use crate::mock_session::NullStatsSink;

/// One recorded ready-callback invocation.
#[derive(Clone)]
pub struct ReadyCall {
    pub mime_types: Option<MimeTypes>,
    pub error: Option<GatewayError>,
}

/// Journal of authorizer and callback activity.
#[derive(Default)]
pub struct AuthorizationLog {
    authorize_calls: Mutex<Vec<(String, String)>>,
    ready_calls: Mutex<Vec<ReadyCall>>,
    ended_calls: Mutex<Vec<Option<GatewayError>>>,
}

impl AuthorizationLog {
    /// `(stream_key, resource_id)` pairs seen by `authorize`.
    pub fn authorize_calls(&self) -> Vec<(String, String)> {
        self.authorize_calls.lock().unwrap().clone()
    }

    pub fn ready_calls(&self) -> Vec<ReadyCall> {
        self.ready_calls.lock().unwrap().clone()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_calls.lock().unwrap().len()
    }

    pub fn ended_calls(&self) -> Vec<Option<GatewayError>> {
        self.ended_calls.lock().unwrap().clone()
    }

    pub fn ended_count(&self) -> usize {
        self.ended_calls.lock().unwrap().len()
    }
}

type Probe = Arc<dyn Fn() + Send + Sync>;

/// Mock authorizer. Accepts or rejects every publish attempt and wires the
/// grant callbacks into its [`AuthorizationLog`].
pub struct MockAuthorizer {
    reject_with: Option<GatewayError>,
    params: SessionParams,
    omit_callbacks: bool,
    with_stats_sink: bool,
    ready_probe: Option<Probe>,
    ended_probe: Option<Probe>,
    log: Arc<AuthorizationLog>,
}

impl MockAuthorizer {
    /// Authorizer that accepts every stream key.
    pub fn accepting() -> Self {
        Self {
            reject_with: None,
            params: crate::fixtures::session_params(),
            omit_callbacks: false,
            with_stats_sink: false,
            ready_probe: None,
            ended_probe: None,
            log: Arc::new(AuthorizationLog::default()),
        }
    }

    /// Authorizer that rejects every stream key with the given error.
    pub fn rejecting(err: GatewayError) -> Self {
        Self {
            reject_with: Some(err),
            ..Self::accepting()
        }
    }

    /// Use specific session parameters in grants.
    pub fn with_params(mut self, params: SessionParams) -> Self {
        self.params = params;
        self
    }

    /// Grants carry no callbacks (collaborator declined notifications).
    pub fn without_callbacks(mut self) -> Self {
        self.omit_callbacks = true;
        self
    }

    /// The ready callback returns a stats sink on success.
    pub fn with_stats_sink(mut self) -> Self {
        self.with_stats_sink = true;
        self
    }

    /// Run `probe` at the start of every ready callback.
    pub fn with_ready_probe(mut self, probe: impl Fn() + Send + Sync + 'static) -> Self {
        self.ready_probe = Some(Arc::new(probe));
        self
    }

    /// Run `probe` at the start of every ended callback.
    pub fn with_ended_probe(mut self, probe: impl Fn() + Send + Sync + 'static) -> Self {
        self.ended_probe = Some(Arc::new(probe));
        self
    }

    /// Shared invocation log.
    pub fn log(&self) -> Arc<AuthorizationLog> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl PublishAuthorizer for MockAuthorizer {
    async fn authorize(
        &self,
        stream_key: &str,
        resource_id: &str,
        _handler: Arc<dyn MediaSession>,
    ) -> Result<PublishGrant, GatewayError> {
        if let Some(err) = &self.reject_with {
            return Err(err.clone());
        }

        self.log
            .authorize_calls
            .lock()
            .unwrap()
            .push((stream_key.to_string(), resource_id.to_string()));

        if self.omit_callbacks {
            return Ok(PublishGrant {
                params: self.params.clone(),
                on_ready: None,
                on_ended: None,
            });
        }

        let ready_log = Arc::clone(&self.log);
        let ready_probe = self.ready_probe.clone();
        let with_stats_sink = self.with_stats_sink;
        let on_ready: ReadyCallback = Box::new(move |mime_types, error| {
            if let Some(probe) = &ready_probe {
                probe();
            }
            let succeeded = error.is_none();
            ready_log
                .ready_calls
                .lock()
                .unwrap()
                .push(ReadyCall { mime_types, error });
            if with_stats_sink && succeeded {
                Some(Box::new(NullStatsSink))
            } else {
                None
            }
        });

        let ended_log = Arc::clone(&self.log);
        let ended_probe = self.ended_probe.clone();
        let on_ended: EndedCallback = Box::new(move |error: Option<GatewayError>| {
            if let Some(probe) = &ended_probe {
                probe();
            }
            ended_log.ended_calls.lock().unwrap().push(error);
        });

        Ok(PublishGrant {
            params: self.params.clone(),
            on_ready: Some(on_ready),
            on_ended: Some(on_ended),
        })
    }
}

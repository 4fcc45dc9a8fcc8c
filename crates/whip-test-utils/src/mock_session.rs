//! Scripted media session for gateway tests.
//!
//! Each phase (negotiate, start, wait-for-end) can be scripted to succeed,
//! fail, or hang forever (for deadline tests). Every interaction is
//! recorded so tests can assert on call counts, received parameters, relay
//! associations and stats attachment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use whip_gateway::errors::GatewayError;
use whip_gateway::media::{
    MediaSession, MimeTypes, SessionFactory, SessionParams, StatsSink, TrackKind,
};

/// Stats sink that ignores every sample.
pub struct NullStatsSink;

impl StatsSink for NullStatsSink {
    fn record(&self, _kind: TrackKind, _bytes_received: u64, _packets_lost: u64) {}
}

/// Mock media session with scripted phase outcomes.
pub struct MockMediaSession {
    negotiate_result: Result<String, GatewayError>,
    negotiate_hangs: bool,
    start_result: Result<MimeTypes, GatewayError>,
    start_hangs: bool,

    end_tx: Mutex<Option<oneshot::Sender<Result<(), GatewayError>>>>,
    end_rx: Mutex<Option<oneshot::Receiver<Result<(), GatewayError>>>>,

    negotiate_calls: AtomicUsize,
    start_calls: AtomicUsize,
    closed: AtomicBool,
    stats_attached: AtomicBool,
    relays: Mutex<HashMap<TrackKind, String>>,
    last_offer: Mutex<Option<String>>,
    last_params: Mutex<Option<SessionParams>>,
}

impl MockMediaSession {
    /// Builder with a successful default script (fixture answer, audio+video
    /// mime types).
    pub fn builder() -> MockMediaSessionBuilder {
        MockMediaSessionBuilder::default()
    }

    /// End the session from the test, as the media layer would.
    ///
    /// No-op if the session already ended or `wait_for_end` was never
    /// reached by the orchestrator and has since been cancelled.
    pub fn end_session(&self, result: Result<(), GatewayError>) {
        if let Some(tx) = self.end_tx.lock().unwrap().take() {
            let _ = tx.send(result);
        }
    }

    pub fn negotiate_call_count(&self) -> usize {
        self.negotiate_calls.load(Ordering::SeqCst)
    }

    pub fn start_call_count(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats_attached(&self) -> bool {
        self.stats_attached.load(Ordering::SeqCst)
    }

    /// Relay token currently associated for a track kind.
    pub fn relay_token(&self, kind: TrackKind) -> Option<String> {
        self.relays.lock().unwrap().get(&kind).cloned()
    }

    /// Offer received by the last negotiate call.
    pub fn last_offer(&self) -> Option<String> {
        self.last_offer.lock().unwrap().clone()
    }

    /// Params received by the last negotiate call.
    pub fn last_params(&self) -> Option<SessionParams> {
        self.last_params.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSession for MockMediaSession {
    async fn negotiate(
        &self,
        _cancel: CancellationToken,
        params: &SessionParams,
        offer: &str,
    ) -> Result<String, GatewayError> {
        self.negotiate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_offer.lock().unwrap() = Some(offer.to_string());
        *self.last_params.lock().unwrap() = Some(params.clone());
        if self.negotiate_hangs {
            std::future::pending::<()>().await;
        }
        self.negotiate_result.clone()
    }

    async fn start(&self, _cancel: CancellationToken) -> Result<MimeTypes, GatewayError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.start_hangs {
            std::future::pending::<()>().await;
        }
        self.start_result.clone()
    }

    async fn wait_for_end(&self, cancel: CancellationToken) -> Result<(), GatewayError> {
        let rx = self.end_rx.lock().unwrap().take();
        match rx {
            Some(rx) => tokio::select! {
                () = cancel.cancelled() => Err(GatewayError::Cancelled),
                res = rx => res.unwrap_or(Ok(())),
            },
            None => {
                // wait_for_end called twice; block until cancelled.
                cancel.cancelled().await;
                Err(GatewayError::Cancelled)
            }
        }
    }

    fn associate_relay(
        &self,
        kind: TrackKind,
        token: &str,
        _sink: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Result<(), GatewayError> {
        let mut relays = self.relays.lock().unwrap();
        if relays.contains_key(&kind) {
            return Err(GatewayError::Internal(format!(
                "relay already associated for {kind}"
            )));
        }
        relays.insert(kind, token.to_string());
        Ok(())
    }

    fn dissociate_relay(&self, kind: TrackKind) {
        self.relays.lock().unwrap().remove(&kind);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Closing ends the session, as the real media layer would.
        self.end_session(Ok(()));
    }

    fn attach_stats_sink(&self, _sink: Box<dyn StatsSink>) {
        self.stats_attached.store(true, Ordering::SeqCst);
    }
}

/// Builder for [`MockMediaSession`].
pub struct MockMediaSessionBuilder {
    negotiate_result: Result<String, GatewayError>,
    negotiate_hangs: bool,
    start_result: Result<MimeTypes, GatewayError>,
    start_hangs: bool,
}

impl Default for MockMediaSessionBuilder {
    fn default() -> Self {
        Self {
            negotiate_result: Ok(crate::fixtures::SDP_ANSWER.to_string()),
            negotiate_hangs: false,
            start_result: Ok(crate::fixtures::mime_types()),
            start_hangs: false,
        }
    }
}

impl MockMediaSessionBuilder {
    /// Script negotiate to return this answer.
    pub fn negotiate_ok(mut self, answer: impl Into<String>) -> Self {
        self.negotiate_result = Ok(answer.into());
        self
    }

    /// Script negotiate to fail.
    pub fn negotiate_err(mut self, err: GatewayError) -> Self {
        self.negotiate_result = Err(err);
        self
    }

    /// Script negotiate to hang past any deadline.
    pub fn negotiate_hangs(mut self) -> Self {
        self.negotiate_hangs = true;
        self
    }

    /// Script start to return these mime types.
    pub fn start_ok(mut self, mime_types: MimeTypes) -> Self {
        self.start_result = Ok(mime_types);
        self
    }

    /// Script start to fail.
    pub fn start_err(mut self, err: GatewayError) -> Self {
        self.start_result = Err(err);
        self
    }

    /// Script start to hang past any deadline.
    pub fn start_hangs(mut self) -> Self {
        self.start_hangs = true;
        self
    }

    /// Build the session.
    pub fn build(self) -> Arc<MockMediaSession> {
        let (end_tx, end_rx) = oneshot::channel();
        Arc::new(MockMediaSession {
            negotiate_result: self.negotiate_result,
            negotiate_hangs: self.negotiate_hangs,
            start_result: self.start_result,
            start_hangs: self.start_hangs,
            end_tx: Mutex::new(Some(end_tx)),
            end_rx: Mutex::new(Some(end_rx)),
            negotiate_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            stats_attached: AtomicBool::new(false),
            relays: Mutex::new(HashMap::new()),
            last_offer: Mutex::new(None),
            last_params: Mutex::new(None),
        })
    }
}

enum FactoryMode {
    /// Hand the same session out on every call.
    Fixed(Arc<MockMediaSession>),
    /// Build a fresh default-scripted session per call.
    Fresh,
}

/// Session factory recording every session it hands out.
pub struct MockSessionFactory {
    mode: FactoryMode,
    created: Mutex<Vec<Arc<MockMediaSession>>>,
}

impl MockSessionFactory {
    /// Factory that builds a fresh successful session per call.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: FactoryMode::Fresh,
            created: Mutex::new(Vec::new()),
        })
    }

    /// Factory that always returns the given session.
    pub fn returning(session: Arc<MockMediaSession>) -> Arc<Self> {
        Arc::new(Self {
            mode: FactoryMode::Fixed(session),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Sessions handed out so far, in creation order.
    pub fn created(&self) -> Vec<Arc<MockMediaSession>> {
        self.created.lock().unwrap().clone()
    }
}

impl SessionFactory for MockSessionFactory {
    fn create_session(&self) -> Arc<dyn MediaSession> {
        let session = match &self.mode {
            FactoryMode::Fixed(session) => Arc::clone(session),
            FactoryMode::Fresh => MockMediaSession::builder().build(),
        };
        self.created.lock().unwrap().push(Arc::clone(&session));
        session
    }
}

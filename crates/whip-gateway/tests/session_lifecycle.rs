//! Session lifecycle tests: callback discipline, registry visibility and
//! deadline behavior across every orchestrator exit path.
//!
//! Deadline tests run under paused tokio time; the runtime auto-advances
//! past the phase budgets, so no real seconds are spent.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use whip_gateway::errors::GatewayError;
use whip_gateway::media::TrackKind;
use whip_gateway::orchestrator::{SessionOrchestrator, SESSION_START_TIMEOUT};
use whip_gateway::registry::SessionRegistry;
use whip_test_utils::{
    fixtures, init_test_logging, MockAuthorizer, MockMediaSession, MockSessionFactory,
};

/// Poll until `cond` holds. Instant under paused time; bounded wall clock
/// otherwise.
async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn orchestrator_with(
    registry: &Arc<SessionRegistry>,
    session: &Arc<MockMediaSession>,
    authorizer: MockAuthorizer,
) -> Arc<SessionOrchestrator> {
    Arc::new(SessionOrchestrator::new(
        Arc::clone(registry),
        MockSessionFactory::returning(Arc::clone(session)),
        Arc::new(authorizer),
    ))
}

#[tokio::test]
async fn test_full_lifecycle_happy_path() {
    init_test_logging();
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");

    assert!(resource_id.starts_with("wh_"));
    assert_eq!(answer, fixtures::SDP_ANSWER);
    assert_eq!(session.last_offer().unwrap(), fixtures::SDP_OFFER);

    // The authorizer saw the same resource id the caller got.
    let authorize_calls = log.authorize_calls();
    assert_eq!(authorize_calls.len(), 1);
    assert_eq!(authorize_calls[0], ("abc".to_string(), resource_id.clone()));

    // Registration and the ready notification follow asynchronously.
    eventually(|| registry.lookup(&resource_id).is_some()).await;
    eventually(|| log.ready_count() == 1).await;

    let ready = log.ready_calls().remove(0);
    assert!(ready.error.is_none());
    assert_eq!(ready.mime_types.unwrap(), fixtures::mime_types());
    assert_eq!(log.ended_count(), 0);

    // End of session: removed from the registry, ended fired once.
    session.end_session(Ok(()));
    eventually(|| log.ended_count() == 1).await;
    assert!(log.ended_calls().remove(0).is_none());
    assert!(registry.lookup(&resource_id).is_none());
    assert!(registry.is_idle());

    // Exactly once, on both callbacks.
    assert_eq!(log.ready_count(), 1);
    assert_eq!(log.ended_count(), 1);
}

#[tokio::test]
async fn test_authorization_failure_owes_nothing() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer =
        MockAuthorizer::rejecting(GatewayError::Authorization("invalid stream key".to_string()));
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let result = orchestrator.create_session("bad", fixtures::SDP_OFFER).await;

    assert!(matches!(result, Err(GatewayError::Authorization(_))));
    assert!(registry.is_idle());
    assert_eq!(session.negotiate_call_count(), 0);
    // No callbacks were ever obtained, so none are owed.
    assert_eq!(log.ready_count(), 0);
    assert_eq!(log.ended_count(), 0);
}

#[tokio::test]
async fn test_negotiation_failure_is_synchronous() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder()
        .negotiate_err(GatewayError::Negotiation("no compatible codec".to_string()))
        .build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let result = orchestrator.create_session("abc", fixtures::SDP_OFFER).await;

    assert!(matches!(result, Err(GatewayError::Negotiation(_))));
    assert!(registry.is_idle());
    assert_eq!(session.start_call_count(), 0);

    // Ready fired exactly once, with the error; ended is not owed.
    assert_eq!(log.ready_count(), 1);
    let ready = log.ready_calls().remove(0);
    assert!(ready.mime_types.is_none());
    assert!(matches!(ready.error, Some(GatewayError::Negotiation(_))));
    assert_eq!(log.ended_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_negotiation_deadline() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().negotiate_hangs().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let result = orchestrator.create_session("abc", fixtures::SDP_OFFER).await;

    assert!(matches!(
        result,
        Err(GatewayError::Timeout { phase: "negotiation" })
    ));
    assert!(registry.is_idle());
    assert_eq!(log.ready_count(), 1);
    assert!(matches!(
        log.ready_calls().remove(0).error,
        Some(GatewayError::Timeout { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_registry_invisible_while_negotiating() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().negotiate_hangs().build();
    let orchestrator = orchestrator_with(&registry, &session, MockAuthorizer::accepting());

    let create = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.create_session("abc", fixtures::SDP_OFFER).await })
    };

    // Let the create task run up to the hanging negotiate call. The session
    // must not be observable before registration.
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(session.negotiate_call_count(), 1);
    assert!(registry.is_idle());

    // The hang eventually trips the negotiation deadline.
    let result = create.await.unwrap();
    assert!(matches!(result, Err(GatewayError::Timeout { .. })));
    assert!(registry.is_idle());
}

#[tokio::test]
async fn test_start_failure_removes_before_ready() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder()
        .start_err(GatewayError::Internal("track setup failed".to_string()))
        .build();

    let registry_at_ready = Arc::new(AtomicBool::new(false));
    let probe_registry = Arc::clone(&registry);
    let probe_flag = Arc::clone(&registry_at_ready);
    let authorizer = MockAuthorizer::accepting().with_ready_probe(move || {
        probe_flag.store(probe_registry.is_idle(), Ordering::SeqCst);
    });
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("negotiation should succeed");

    eventually(|| log.ready_count() == 1).await;

    let ready = log.ready_calls().remove(0);
    assert!(ready.mime_types.is_none());
    assert!(matches!(ready.error, Some(GatewayError::Internal(_))));

    // Cleanup preceded the callback: the registry was already empty when
    // ready observed the failure.
    assert!(registry_at_ready.load(Ordering::SeqCst));
    assert!(registry.lookup(&resource_id).is_none());

    // The session never started, so ended must never fire.
    session.end_session(Ok(()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(log.ended_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_deadline() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().start_hangs().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("negotiation should succeed");

    // Let the start task register and block, then burn the start budget.
    eventually(|| registry.lookup(&resource_id).is_some()).await;
    tokio::time::advance(SESSION_START_TIMEOUT).await;
    eventually(|| log.ready_count() == 1).await;

    assert!(matches!(
        log.ready_calls().remove(0).error,
        Some(GatewayError::Timeout { phase: "session start" })
    ));
    assert!(registry.lookup(&resource_id).is_none());
    assert_eq!(log.ended_count(), 0);
}

#[tokio::test]
async fn test_session_end_with_error_removes_before_ended() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();

    let registry_at_ended = Arc::new(AtomicBool::new(false));
    let probe_registry = Arc::clone(&registry);
    let probe_flag = Arc::clone(&registry_at_ended);
    let authorizer = MockAuthorizer::accepting().with_ended_probe(move || {
        probe_flag.store(probe_registry.is_idle(), Ordering::SeqCst);
    });
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");
    eventually(|| log.ready_count() == 1).await;

    session.end_session(Err(GatewayError::Internal("rtp timeout".to_string())));
    eventually(|| log.ended_count() == 1).await;

    assert!(matches!(
        log.ended_calls().remove(0),
        Some(GatewayError::Internal(_))
    ));
    assert!(registry_at_ended.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_grant_without_callbacks() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting().without_callbacks();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");

    eventually(|| registry.lookup(&resource_id).is_some()).await;
    session.end_session(Ok(()));
    eventually(|| registry.is_idle()).await;

    // Lifecycle ran to completion without any notification to deliver.
    assert_eq!(log.ready_count(), 0);
    assert_eq!(log.ended_count(), 0);
}

#[tokio::test]
async fn test_stats_sink_attached_on_success() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting().with_stats_sink();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");

    eventually(|| log.ready_count() == 1).await;
    assert!(session.stats_attached());
}

#[tokio::test]
async fn test_resource_ids_unique_across_creations() {
    let registry = Arc::new(SessionRegistry::new());
    let authorizer = MockAuthorizer::accepting();
    let orchestrator = Arc::new(SessionOrchestrator::new(
        Arc::clone(&registry),
        MockSessionFactory::new(),
        Arc::new(authorizer),
    ));

    let mut ids = HashSet::new();
    for _ in 0..50 {
        let (resource_id, _) = orchestrator
            .create_session("abc", fixtures::SDP_OFFER)
            .await
            .expect("create should succeed");
        ids.insert(resource_id);
    }

    assert_eq!(ids.len(), 50);
    eventually(|| registry.count() == 50).await;
}

#[tokio::test]
async fn test_shutdown_cancels_running_sessions() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");
    eventually(|| log.ready_count() == 1).await;
    assert!(registry.lookup(&resource_id).is_some());

    orchestrator.shutdown();

    eventually(|| log.ended_count() == 1).await;
    assert!(matches!(
        log.ended_calls().remove(0),
        Some(GatewayError::Cancelled)
    ));
    assert!(registry.is_idle());
}

#[tokio::test]
async fn test_close_handler_ends_session() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");
    eventually(|| log.ready_count() == 1).await;

    orchestrator.close_handler(&resource_id);
    assert!(session.was_closed());
    eventually(|| log.ended_count() == 1).await;
    assert!(registry.is_idle());

    // Unknown ids are a silent no-op.
    orchestrator.close_handler("wh_unknown");
}

#[tokio::test]
async fn test_relay_association_lifecycle() {
    let registry = Arc::new(SessionRegistry::new());
    let session = MockMediaSession::builder().build();
    let authorizer = MockAuthorizer::accepting();
    let log = authorizer.log();
    let orchestrator = orchestrator_with(&registry, &session, authorizer);

    // Before the session exists, association reports not-found. This also
    // covers the documented negotiation-to-registration window.
    let result = orchestrator.associate_relay(
        "wh_unknown",
        TrackKind::Audio,
        "token-1",
        Box::new(tokio::io::sink()),
    );
    assert!(matches!(result, Err(GatewayError::NotFound)));

    let (resource_id, _answer) = orchestrator
        .create_session("abc", fixtures::SDP_OFFER)
        .await
        .expect("create should succeed");
    eventually(|| registry.lookup(&resource_id).is_some()).await;
    eventually(|| log.ready_count() == 1).await;

    orchestrator
        .associate_relay(
            &resource_id,
            TrackKind::Audio,
            "token-1",
            Box::new(tokio::io::sink()),
        )
        .expect("association should succeed");
    assert_eq!(session.relay_token(TrackKind::Audio).unwrap(), "token-1");

    orchestrator.dissociate_relay(&resource_id, TrackKind::Audio);
    assert!(session.relay_token(TrackKind::Audio).is_none());

    // Dissociation of unknown ids is a silent no-op.
    orchestrator.dissociate_relay("wh_unknown", TrackKind::Video);
}

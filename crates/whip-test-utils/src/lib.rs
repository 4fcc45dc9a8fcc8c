//! # WHIP Gateway Test Utilities
//!
//! Mock collaborators and fixtures for testing the WHIP session gateway
//! without a media pipeline, an authorization backend or an RPC runtime.
//!
//! ## Modules
//!
//! - `mock_session` - scripted media session + session factory
//! - `mock_authorizer` - authorizer with callback invocation log
//! - `mock_rpc` - RPC client with a call journal
//! - `fixtures` - canned SDP offers, trickle fragments, session params
//!
//! ## Usage
//!
//! ```rust,ignore
//! use whip_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let session = MockMediaSession::builder()
//!         .negotiate_ok(fixtures::SDP_ANSWER)
//!         .start_ok(fixtures::mime_types())
//!         .build();
//!     let factory = MockSessionFactory::returning(Arc::clone(&session));
//!     let authorizer = MockAuthorizer::accepting();
//!     let log = authorizer.log();
//!
//!     // Drive the orchestrator, then assert on `log` and `session`.
//! }
//! ```

pub mod fixtures;
pub mod mock_authorizer;
pub mod mock_rpc;
pub mod mock_session;

pub use mock_authorizer::{AuthorizationLog, MockAuthorizer, ReadyCall};
pub use mock_rpc::{MockRpcClient, RpcCall};
pub use mock_session::{MockMediaSession, MockSessionFactory, NullStatsSink};

/// Initialize test logging once per process; safe to call from every test.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "whip_gateway=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

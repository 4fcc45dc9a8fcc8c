//! WHIP Session Gateway
//!
//! The HTTP front door for WebRTC publishing: accepts an SDP offer, creates
//! a media session, returns the SDP answer with a resource identifier, and
//! afterwards accepts teardown and ICE-restart operations addressed to that
//! resource - possibly arriving at a different gateway instance and routed
//! to the owner over affinity-keyed RPC.
//!
//! # Architecture
//!
//! ```text
//! HTTP request
//!   └── server (endpoint layer)
//!        ├── orchestrator ── registry          create / administrative path
//!        └── rpc client ──► owning instance    teardown / ICE restart path
//! ```
//!
//! The gateway is a library: the media pipeline ([`media::MediaSession`]),
//! stream-key authorization ([`media::PublishAuthorizer`]) and the RPC wire
//! runtime ([`rpc::HandlerRpcClient`]) are ports implemented by the
//! embedding service.
//!
//! # Session lifetime
//!
//! A session is publicly addressable exactly while it is in the registry:
//! from registration (after the answer has been produced) until removal
//! (start failure or end of session). Completion is reported through two
//! single-shot callbacks supplied at authorization time; the orchestrator
//! owns their exactly-once discipline.
//!
//! # Modules
//!
//! - [`server`] - axum endpoint layer (routes, headers, CORS)
//! - [`orchestrator`] - session lifecycle state machine
//! - [`registry`] - resource id -> live session map
//! - [`errors`] - error taxonomy and wire classification
//! - [`media`] / [`rpc`] - collaborator ports
//! - [`sdp`] - trickle-fragment credential extraction
//! - [`etag`] - CRC-32 entity tags
//! - [`config`] - environment configuration
//! - [`observability`] - health and drain probes

pub mod config;
pub mod errors;
pub mod etag;
pub mod media;
pub mod observability;
pub mod orchestrator;
pub mod registry;
pub mod rpc;
pub mod sdp;
pub mod server;

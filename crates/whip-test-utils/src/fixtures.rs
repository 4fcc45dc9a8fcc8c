//! Canned protocol payloads and session parameters.

use std::collections::HashMap;
use whip_gateway::media::{MimeTypes, SessionParams, TrackKind};

/// Minimal audio+video SDP offer, as a browser or OBS would send.
pub const SDP_OFFER: &str = "v=0\r\n\
    o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    a=group:BUNDLE 0 1\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=mid:0\r\n\
    a=sendonly\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
    a=mid:1\r\n\
    a=sendonly\r\n\
    a=rtpmap:96 H264/90000\r\n";

/// SDP answer the mock session returns for [`SDP_OFFER`].
pub const SDP_ANSWER: &str = "v=0\r\n\
    o=- 8052859502785229563 2 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    a=group:BUNDLE 0 1\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=mid:0\r\n\
    a=recvonly\r\n\
    a=rtpmap:111 opus/48000/2\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
    a=mid:1\r\n\
    a=recvonly\r\n\
    a=rtpmap:96 H264/90000\r\n";

/// Valid trickle-ICE restart fragment.
pub const TRICKLE_FRAGMENT: &str = "a=ice-ufrag:EsAw\r\n\
    a=ice-pwd:P2uYro0UCOQ4zxjKXaWCBui1\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=mid:0\r\n";

/// Restart fragment missing the password attribute.
pub const TRICKLE_FRAGMENT_NO_PWD: &str = "a=ice-ufrag:EsAw\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=mid:0\r\n";

/// Session parameters for an audio+video publish.
pub fn session_params() -> SessionParams {
    SessionParams {
        stream_id: "stream-test".to_string(),
        expected_tracks: vec![TrackKind::Audio, TrackKind::Video],
        attributes: HashMap::new(),
    }
}

/// Negotiated mime types for an audio+video publish.
pub fn mime_types() -> MimeTypes {
    MimeTypes::from([
        (TrackKind::Audio, "audio/opus".to_string()),
        (TrackKind::Video, "video/H264".to_string()),
    ])
}

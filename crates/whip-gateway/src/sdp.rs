//! Trickle-ICE fragment credential extraction.
//!
//! An ICE restart request carries a partial SDP document. The gateway needs
//! exactly two things from it: the new username fragment and password, which
//! it forwards to the owning instance. Candidate lines and everything else
//! in the fragment belong to the media layer and are ignored here; this is
//! deliberately not an SDP parser.

use crate::errors::GatewayError;

const ATTR_ICE_UFRAG: &str = "a=ice-ufrag:";
const ATTR_ICE_PWD: &str = "a=ice-pwd:";

/// ICE credentials extracted from a trickle fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCredentials {
    pub user_fragment: String,
    pub password: String,
}

/// Extract `ice-ufrag`/`ice-pwd` from a trickle-ICE SDP fragment.
///
/// The first occurrence of each attribute wins; fragments commonly repeat
/// identical credentials per media section.
///
/// # Errors
///
/// [`GatewayError::InvalidRestartRequest`] when either attribute is missing
/// or empty.
pub fn extract_ice_credentials(body: &str) -> Result<IceCredentials, GatewayError> {
    let mut user_fragment: Option<&str> = None;
    let mut password: Option<&str> = None;

    for line in body.lines() {
        let line = line.trim_end();
        if let Some(value) = line.strip_prefix(ATTR_ICE_UFRAG) {
            user_fragment.get_or_insert(value.trim());
        } else if let Some(value) = line.strip_prefix(ATTR_ICE_PWD) {
            password.get_or_insert(value.trim());
        }
    }

    match (user_fragment, password) {
        (Some(ufrag), Some(pwd)) if !ufrag.is_empty() && !pwd.is_empty() => Ok(IceCredentials {
            user_fragment: ufrag.to_string(),
            password: pwd.to_string(),
        }),
        _ => Err(GatewayError::InvalidRestartRequest),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const FRAGMENT: &str = "a=ice-ufrag:EsAw\r\n\
                            a=ice-pwd:P2uYro0UCOQ4zxjKXaWCBui1\r\n\
                            m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
                            a=mid:0\r\n\
                            a=candidate:1 1 UDP 2130706431 198.51.100.7 49203 typ host\r\n";

    #[test]
    fn test_extracts_credentials() {
        let creds = extract_ice_credentials(FRAGMENT).unwrap();
        assert_eq!(creds.user_fragment, "EsAw");
        assert_eq!(creds.password, "P2uYro0UCOQ4zxjKXaWCBui1");
    }

    #[test]
    fn test_candidates_are_ignored() {
        // Only credentials are part of the contract; candidate lines must
        // not affect extraction.
        let with = extract_ice_credentials(FRAGMENT).unwrap();
        let without = extract_ice_credentials(
            "a=ice-ufrag:EsAw\na=ice-pwd:P2uYro0UCOQ4zxjKXaWCBui1\n",
        )
        .unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let body = "a=ice-ufrag:first\n\
                    a=ice-pwd:pw\n\
                    m=video 9 UDP/TLS/RTP/SAVPF 96\n\
                    a=ice-ufrag:second\n";
        let creds = extract_ice_credentials(body).unwrap();
        assert_eq!(creds.user_fragment, "first");
    }

    #[test]
    fn test_missing_password_is_invalid() {
        let result = extract_ice_credentials("a=ice-ufrag:EsAw\n");
        assert!(matches!(result, Err(GatewayError::InvalidRestartRequest)));
    }

    #[test]
    fn test_empty_ufrag_is_invalid() {
        let result = extract_ice_credentials("a=ice-ufrag:\na=ice-pwd:secret\n");
        assert!(matches!(result, Err(GatewayError::InvalidRestartRequest)));
    }

    #[test]
    fn test_empty_body_is_invalid() {
        let result = extract_ice_credentials("");
        assert!(matches!(result, Err(GatewayError::InvalidRestartRequest)));
    }

    #[test]
    fn test_bare_lf_line_endings() {
        let creds = extract_ice_credentials("a=ice-ufrag:u1\na=ice-pwd:p1").unwrap();
        assert_eq!(creds.user_fragment, "u1");
        assert_eq!(creds.password, "p1");
    }
}

//! Gateway configuration.
//!
//! Loaded from environment variables; every field has a usable default so an
//! embedding service can run the gateway without any configuration.

use std::collections::HashMap;
use std::env;

/// Default WHIP protocol bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default gateway instance id prefix.
pub const DEFAULT_GATEWAY_ID_PREFIX: &str = "whip";

/// WHIP gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// WHIP protocol bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Unique identifier for this gateway instance, used in logs and
    /// heartbeats. Generated as `whip-{hostname}-{uuid8}` when unset.
    pub gateway_id: String,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let bind_address = vars
            .get("WHIP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("WHIP_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let gateway_id = vars.get("WHIP_GATEWAY_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_GATEWAY_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Config {
            bind_address,
            health_bind_address,
            gateway_id,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(&HashMap::new())
    }
}

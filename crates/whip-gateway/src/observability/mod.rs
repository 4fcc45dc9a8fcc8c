//! Observability surface: health and drain probes.

mod health;

pub use health::{health_router, HealthState};

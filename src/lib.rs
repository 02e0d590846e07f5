//! Clinic management backend: patients, appointments, payments,
//! clinical notes and a dashboard, behind cookie-based sessions.

pub mod api;
pub mod auth;
pub mod config;
pub mod csvout;
pub mod db;
pub mod invoicing;
pub mod mailer;
pub mod models;
pub mod orchestrator;
pub mod resolve;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    fmt().with_env_filter(filter).init();
}

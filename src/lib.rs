//! Brainalyze client core for an MRI tumor-analysis app.
//!
//! Screens sit on top of this crate: sign-in resolves a session context
//! once, an upload runs a single pass against the remote inference service,
//! the report screen loads one composed read into a merged view, and from
//! there the view feeds the PDF exporter and the scripted chat assistant.
//! All remote collaborators hide behind traits with mock implementations
//! for tests.

pub mod backend;
pub mod cancel;
pub mod chat;
pub mod config;
pub mod export;
pub mod models;
pub mod report;
pub mod session;
pub mod upload;

use tracing_subscriber::EnvFilter;

/// Initialize tracing. RUST_LOG wins when set.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

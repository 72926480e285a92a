use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Brainalyze";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default endpoint of the remote inference service (FastAPI-style backend).
pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000";
/// Default endpoint of the auth/data-store stack (Supabase-style).
pub const DEFAULT_SUPABASE_URL: &str = "http://127.0.0.1:54321";

/// Base URL of the remote inference service.
pub fn inference_url() -> String {
    std::env::var("BRAINALYZE_INFERENCE_URL")
        .unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string())
}

/// Base URL of the auth/data-store collaborator.
pub fn supabase_url() -> String {
    std::env::var("BRAINALYZE_SUPABASE_URL")
        .unwrap_or_else(|_| DEFAULT_SUPABASE_URL.to_string())
}

/// API key attached to auth and data-store calls (the anon key in a
/// Supabase-style deployment). `None` means calls go out without one.
pub fn supabase_key() -> Option<String> {
    std::env::var("BRAINALYZE_SUPABASE_KEY").ok()
}

/// Get the application data directory
/// ~/Brainalyze/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Brainalyze")
}

/// Get the directory exported PDF reports are written to
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "brainalyze=info"
}

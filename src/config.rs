use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Outcall";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend base URL env override.
pub const BACKEND_URL_ENV: &str = "OUTCALL_BACKEND_URL";

/// Default backend when the env var is unset (local dev stack).
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Get the application data directory
/// ~/Outcall/ on all platforms (user-visible, per design requirement)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Outcall")
}

/// Persisted client state file (session tokens, last selection, nav section).
/// Mirrors the browser localStorage keys of the original web dashboard.
pub fn local_store_path() -> PathBuf {
    app_data_dir().join("state.json")
}

/// Backend base URL: env override, else the local default.
pub fn backend_base_url() -> String {
    std::env::var(BACKEND_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,outcall_lib=debug".to_string()
}

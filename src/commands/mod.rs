//! Tauri IPC command surface.
//!
//! Commands are thin: validate input, call into the core, map errors to
//! strings for the webview. All state lives in the managed [`CoreState`].

pub mod auth;
pub mod calls;
pub mod nav;
pub mod patients;
pub mod upload;

/// Health check IPC command — verifies the core is running.
#[tauri::command]
pub fn health_check() -> String {
    tracing::debug!("Health check called");
    "ok".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_returns_ok() {
        assert_eq!(health_check(), "ok");
    }
}

pub mod api;
pub mod calls;
pub mod commands;
pub mod config;
pub mod core_state;
pub mod local_store;
pub mod models;
pub mod patients;
pub mod session;
pub mod upload;
pub mod view;

use std::sync::Arc;

use tauri::Manager;
use tracing_subscriber::EnvFilter;

use core_state::CoreState;

/// Bridges core events onto the Tauri event bus.
struct TauriEventSink(tauri::AppHandle);

impl core_state::EventSink for TauriEventSink {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        use tauri::Emitter;
        if let Err(e) = self.0.emit(event, payload) {
            tracing::warn!(event, error = %e, "Failed to emit event to webview");
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Outcall starting v{}", config::APP_VERSION);

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(Arc::new(CoreState::with_defaults()))
        .setup(|app| {
            let state: tauri::State<'_, Arc<CoreState>> = app.state();
            state.install_event_sink(Arc::new(TauriEventSink(app.handle().clone())));
            if state.restore_session().is_some() {
                tracing::info!("Previous session restored from disk");
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::health_check,
            commands::auth::login,
            commands::auth::logout,
            commands::auth::restore_session,
            commands::auth::current_user,
            commands::patients::get_patients,
            commands::patients::refresh_patients,
            commands::patients::patients_loading,
            commands::upload::upload_spreadsheet,
            commands::upload::list_uploads,
            commands::upload::select_upload,
            commands::upload::select_filename,
            commands::calls::trigger_call,
            commands::calls::trigger_batch_calls,
            commands::calls::active_calls,
            commands::calls::calling_in_progress,
            commands::nav::get_nav_section,
            commands::nav::set_nav_section,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

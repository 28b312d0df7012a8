//! Auth commands: login, logout, session restore, current user.

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::session::UserAccount;

/// Authenticate against the backend and persist the session.
#[tauri::command]
pub fn login(
    email: String,
    password: String,
    state: State<'_, Arc<CoreState>>,
) -> Result<UserAccount, String> {
    if email.trim().is_empty() {
        return Err("Email is required".into());
    }
    if password.is_empty() {
        return Err("Password is required".into());
    }

    state.login(email.trim(), &password).map_err(|e| e.to_string())
}

/// Full logout: cancels background workers, clears call tracking, drops
/// the session and every persisted session key.
#[tauri::command]
pub fn logout(state: State<'_, Arc<CoreState>>) -> Result<(), String> {
    state.logout().map_err(|e| e.to_string())
}

/// Rebuild the session from the persisted store, if one survives.
#[tauri::command]
pub fn restore_session(state: State<'_, Arc<CoreState>>) -> Option<UserAccount> {
    state.restore_session()
}

/// The logged-in user, when there is one.
#[tauri::command]
pub fn current_user(state: State<'_, Arc<CoreState>>) -> Option<UserAccount> {
    state.current_user()
}

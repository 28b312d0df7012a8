//! Navigation commands.

use std::sync::Arc;

use tauri::State;

use crate::core_state::CoreState;
use crate::view::NavSection;

/// The active section, as last set or restored from the store.
#[tauri::command]
pub fn get_nav_section(state: State<'_, Arc<CoreState>>) -> NavSection {
    state.view.nav()
}

/// Switch sections. Leaving the upload view cancels the auto-refresh
/// poller; tracked calls survive so re-entering can resume watching them.
#[tauri::command]
pub fn set_nav_section(
    section: NavSection,
    state: State<'_, Arc<CoreState>>,
) -> Result<(), String> {
    state.set_nav(section).map_err(|e| e.to_string())
}

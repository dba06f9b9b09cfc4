pub mod server;
pub mod api;
pub mod state;

pub use server::*;
pub use state::*;

use crate::config::ConfigManager;

/// Shared state for the local web surface. Read-only over the synced view.
#[derive(Clone)]
pub struct AppState {
    pub view: ViewState,
    pub config: ConfigManager,
}

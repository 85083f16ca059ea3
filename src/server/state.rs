//! Shared application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::logging::Logger;
use crate::storage::Storage;

pub struct AppState {
    pub storage: Storage,
    pub log: Logger,
}

pub type SharedState = Arc<Mutex<AppState>>;

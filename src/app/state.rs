//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{ArenaHandle, ArenaTask};
use crate::ws::protocol::ArenaInfo;

use super::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
    pub arena_info: Arc<ArenaInfo>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Build the state and the arena task that must be spawned to serve it
    pub fn new(config: Config) -> (Self, ArenaTask) {
        let config = Arc::new(config);

        let seed = config.arena_seed.unwrap_or_else(rand::random);
        let (arena_task, arena) = ArenaTask::new(config.arena.clone(), seed);

        let arena_info = Arc::new(ArenaInfo::from(&config.arena));

        let state = Self {
            config,
            arena,
            arena_info,
            sessions: Arc::new(SessionRegistry::new()),
        };

        (state, arena_task)
    }
}

//! Snapshot building for network transmission

use crate::ws::protocol::{GameEvent, ServerMsg};

use super::arena::ArenaState;

/// Builds outbound messages from arena state
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    /// Updates built so far
    updates_built: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates_built(&self) -> u64 {
        self.updates_built
    }

    /// Build a full-state update message
    pub fn build_update(&mut self, arena: &ArenaState, events: Vec<GameEvent>) -> ServerMsg {
        self.updates_built += 1;
        ServerMsg::Update {
            tick: arena.tick_count(),
            players: arena.snapshot(),
            events,
        }
    }

    /// Build a round clock message
    pub fn build_timer(&self, seconds_remaining: u32) -> ServerMsg {
        ServerMsg::Timer { seconds_remaining }
    }
}

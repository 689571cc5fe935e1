//! Registry of connected websocket sessions

use dashmap::DashMap;

use crate::game::CombatantId;
use crate::util::time::unix_millis;

/// Connection bookkeeping for one websocket
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub connected_at: u64,
}

/// Connected sessions, keyed by the combatant they control
pub struct SessionRegistry {
    sessions: DashMap<CombatantId, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn register(&self, id: CombatantId) {
        self.sessions.insert(
            id,
            SessionInfo {
                connected_at: unix_millis(),
            },
        );
    }

    /// Remove a session, returning how long it was connected in milliseconds
    pub fn unregister(&self, id: &CombatantId) -> Option<u64> {
        self.sessions
            .remove(id)
            .map(|(_, info)| unix_millis().saturating_sub(info.connected_at))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

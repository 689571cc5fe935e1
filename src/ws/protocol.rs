//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ArenaConfig;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Slingshot launch
    Shoot {
        /// Launch direction in radians
        angle: f64,
        /// Drag power, capped server-side
        power: f64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        /// Combatant id assigned to this connection
        id: Uuid,
        server_time: u64,
        arena: ArenaInfo,
    },

    /// Full arena state, sent after every physics tick and every round reset
    Update {
        /// Physics tick number
        tick: u64,
        /// All combatants keyed by id
        players: BTreeMap<Uuid, CombatantSnapshot>,
        /// Events that occurred during this tick
        events: Vec<GameEvent>,
    },

    /// Round clock, sent after every round tick
    Timer {
        seconds_remaining: u32,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },
}

/// Public arena tuning clients need for rendering and aiming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaInfo {
    pub arena_radius: f64,
    pub combatant_radius: f64,
    pub max_speed: f64,
    pub round_secs: u32,
    pub physics_tps: u32,
}

impl From<&ArenaConfig> for ArenaInfo {
    fn from(config: &ArenaConfig) -> Self {
        Self {
            arena_radius: config.arena_radius,
            combatant_radius: config.combatant_radius,
            max_speed: config.max_speed,
            round_secs: config.round_secs,
            physics_tps: config.physics_tps,
        }
    }
}

/// Combatant state in an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub id: Uuid,
    /// Position X, origin at arena center
    pub x: f64,
    /// Position Y, origin at arena center
    pub y: f64,
    /// Current velocity X (distance per tick)
    pub vel_x: f64,
    /// Current velocity Y (distance per tick)
    pub vel_y: f64,
    /// Accumulated damage multiplier (1.0 = 100%)
    pub multiplier: f64,
    /// False once rung out, until the next round
    pub alive: bool,
    /// Display color, opaque to the server
    pub color: String,
}

/// Game events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Two combatants collided
    Collision { a: Uuid, b: Uuid, force: f64 },

    /// Combatant left the arena
    RingOut { id: Uuid },

    /// Round clock expired and everyone respawned
    RoundReset,
}

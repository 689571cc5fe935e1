//! Arena simulation modules

pub mod arena;
pub mod clock;
pub mod combat;
pub mod physics;
pub mod runner;
pub mod snapshot;

pub use arena::CombatantId;
pub use runner::{ArenaHandle, ArenaTask};

/// Inbound event for the arena, applied between ticks in arrival order
#[derive(Debug, Clone)]
pub enum ArenaInput {
    Join { id: CombatantId },
    Leave { id: CombatantId },
    Shoot { id: CombatantId, angle: f64, power: f64 },
}

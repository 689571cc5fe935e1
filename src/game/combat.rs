//! Combat system - collision force and multiplier-scaled knockback

use crate::config::ArenaConfig;

/// Multiplier every combatant starts (and respawns) with
pub const BASE_MULTIPLIER: f64 = 1.0;

/// Combat system for resolving combatant impacts
pub struct CombatSystem;

impl CombatSystem {
    /// Force of an impact between two combatants moving at the given speeds
    pub fn collision_force(speed_a: f64, speed_b: f64, config: &ArenaConfig) -> f64 {
        (speed_a + speed_b) * config.force_scale + config.force_base
    }

    /// Multiplier after taking part in one more collision
    pub fn bump_multiplier(multiplier: f64, config: &ArenaConfig) -> f64 {
        multiplier + config.multiplier_step
    }

    /// Knockback magnitude applied to a combatant carrying `multiplier`
    pub fn knockback(force: f64, multiplier: f64) -> f64 {
        force * multiplier
    }

    /// Push a velocity along the contact axis by `knockback`.
    /// `direction` is -1.0 for the first combatant of a pair and 1.0 for the second.
    /// Returns (new_vel_x, new_vel_y)
    pub fn apply_knockback(
        vel_x: f64,
        vel_y: f64,
        axis: (f64, f64),
        knockback: f64,
        direction: f64,
    ) -> (f64, f64) {
        (
            vel_x + direction * axis.0 * knockback,
            vel_y + direction * axis.1 * knockback,
        )
    }
}

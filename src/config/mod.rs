//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,
    /// Arena tuning
    pub arena: ArenaConfig,
    /// Seed for the arena RNG (random when unset)
    pub arena_seed: Option<u64>,
}

/// Physical tuning of the knockout arena
#[derive(Clone, Debug, PartialEq)]
pub struct ArenaConfig {
    /// Ring-out radius measured from the arena center
    pub arena_radius: f64,
    /// Radius of every combatant
    pub combatant_radius: f64,
    /// Per-tick velocity decay (1.0 is frictionless ice)
    pub friction: f64,
    /// Cap on impulse power, keeps a single step from skipping the boundary
    pub max_speed: f64,
    /// Added to both multipliers for every colliding pair per tick
    pub multiplier_step: f64,
    /// Scale applied to the combined speed of a colliding pair
    pub force_scale: f64,
    /// Flat force added to every collision
    pub force_base: f64,
    /// Spawns land uniformly within +/- this distance of center on each axis
    pub spawn_spread: f64,
    /// Round clock duration in round ticks
    pub round_secs: u32,
    /// Physics ticks per second
    pub physics_tps: u32,
    /// Round clock ticks per second
    pub round_tps: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            arena_radius: 350.0,
            combatant_radius: 25.0,
            friction: 0.96,
            max_speed: 25.0,
            multiplier_step: 0.1,
            force_scale: 0.8,
            force_base: 2.0,
            spawn_spread: 100.0,
            round_secs: 15,
            physics_tps: 60,
            round_tps: 1,
        }
    }
}

impl ArenaConfig {
    /// Distance from center beyond which a combatant is rung out
    pub fn ring_out_distance(&self) -> f64 {
        self.arena_radius + self.combatant_radius
    }

    /// Reject tuning the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.arena_radius > 0.0) {
            return Err(ConfigError::InvalidArena("arena radius must be positive"));
        }
        if !(self.combatant_radius > 0.0) {
            return Err(ConfigError::InvalidArena("combatant radius must be positive"));
        }
        if !(self.friction > 0.0 && self.friction < 1.0) {
            return Err(ConfigError::InvalidArena("friction must be in (0, 1)"));
        }
        if !(self.max_speed > 0.0) {
            return Err(ConfigError::InvalidArena("max speed must be positive"));
        }
        if !(self.multiplier_step >= 0.0) {
            return Err(ConfigError::InvalidArena("multiplier step must not be negative"));
        }
        if !(self.spawn_spread >= 0.0) {
            return Err(ConfigError::InvalidArena("spawn spread must not be negative"));
        }
        if self.round_secs == 0 {
            return Err(ConfigError::InvalidArena("round duration must be at least 1"));
        }
        if self.physics_tps == 0 || self.round_tps == 0 {
            return Err(ConfigError::InvalidArena("tick rates must be at least 1"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        let defaults = ArenaConfig::default();
        let arena = ArenaConfig {
            arena_radius: parse_var(&lookup, "ARENA_RADIUS", defaults.arena_radius)?,
            combatant_radius: parse_var(&lookup, "PLAYER_RADIUS", defaults.combatant_radius)?,
            friction: parse_var(&lookup, "FRICTION", defaults.friction)?,
            max_speed: parse_var(&lookup, "MAX_SPEED", defaults.max_speed)?,
            multiplier_step: parse_var(&lookup, "MULTIPLIER_STEP", defaults.multiplier_step)?,
            spawn_spread: parse_var(&lookup, "SPAWN_SPREAD", defaults.spawn_spread)?,
            round_secs: parse_var(&lookup, "ROUND_SECS", defaults.round_secs)?,
            physics_tps: parse_var(&lookup, "PHYSICS_TPS", defaults.physics_tps)?,
            ..defaults
        };
        arena.validate()?;

        let arena_seed = match lookup("ARENA_SEED") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("ARENA_SEED"))?),
            None => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            arena,
            arena_seed,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid arena configuration: {0}")]
    InvalidArena(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

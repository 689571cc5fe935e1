//! Arena state and the authoritative physics/combat step

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ArenaConfig;
use crate::ws::protocol::{CombatantSnapshot, GameEvent};

use super::clock::RoundClock;
use super::combat::{CombatSystem, BASE_MULTIPLIER};
use super::physics::PhysicsSystem;

/// Combatant identifier, one per connection
pub type CombatantId = Uuid;

/// Combatant state in the arena (authoritative)
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    pub id: CombatantId,

    // Position and movement
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,

    // Combat
    pub multiplier: f64,
    pub alive: bool,

    pub color: String,
}

impl Combatant {
    pub fn speed(&self) -> f64 {
        PhysicsSystem::speed(self.vel_x, self.vel_y)
    }

    pub fn snapshot(&self) -> CombatantSnapshot {
        CombatantSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            vel_x: self.vel_x,
            vel_y: self.vel_y,
            multiplier: self.multiplier,
            alive: self.alive,
            color: self.color.clone(),
        }
    }

    fn respawn(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.multiplier = BASE_MULTIPLIER;
        self.alive = true;
    }
}

/// Outcome of a round tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTick {
    pub seconds_remaining: u32,
    pub reset: bool,
}

/// Arena state (owned by the arena task)
///
/// Combatants are kept in join order. Collision pairs are enumerated in that
/// order and resolved one after another, each pair seeing the positions and
/// velocities left by the pairs before it. A combatant touching several others
/// is pushed by each pair in turn within the same tick.
pub struct ArenaState {
    config: ArenaConfig,
    combatants: Vec<Combatant>,
    clock: RoundClock,
    tick: u64,
    rng: ChaCha8Rng,
}

impl ArenaState {
    pub fn new(config: ArenaConfig, seed: u64) -> Self {
        let clock = RoundClock::new(config.round_secs);
        Self {
            config,
            combatants: Vec::new(),
            clock,
            tick: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Physics ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Register a combatant at a fresh spawn point.
    /// Joining with an id already present replaces that record in place.
    pub fn join(&mut self, id: CombatantId) -> Combatant {
        let (x, y) = self.spawn_position();
        let hue = self.rng.gen_range(0.0..360.0_f64);
        let combatant = Combatant {
            id,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            multiplier: BASE_MULTIPLIER,
            alive: true,
            color: format!("hsl({:.0}, 100%, 50%)", hue),
        };

        match self.combatants.iter_mut().find(|c| c.id == id) {
            Some(existing) => *existing = combatant.clone(),
            None => self.combatants.push(combatant.clone()),
        }

        info!(
            combatant_id = %id,
            x = combatant.x,
            y = combatant.y,
            combatant_count = self.combatants.len(),
            "Combatant joined arena"
        );

        combatant
    }

    /// Remove a combatant. Unknown ids are ignored.
    pub fn leave(&mut self, id: &CombatantId) {
        let before = self.combatants.len();
        self.combatants.retain(|c| c.id != *id);

        if self.combatants.len() < before {
            info!(
                combatant_id = %id,
                combatant_count = self.combatants.len(),
                "Combatant left arena"
            );
        }
    }

    /// Launch a combatant. Ignored for unknown or rung-out combatants.
    pub fn apply_impulse(&mut self, id: &CombatantId, angle: f64, power: f64) {
        if !angle.is_finite() || power.is_nan() {
            debug!(combatant_id = %id, angle, power, "Ignoring non-finite impulse");
            return;
        }

        let max_speed = self.config.max_speed;
        match self.combatants.iter_mut().find(|c| c.id == *id) {
            Some(combatant) if combatant.alive => {
                let (vel_x, vel_y) = PhysicsSystem::launch_velocity(angle, power, max_speed);
                combatant.vel_x = vel_x;
                combatant.vel_y = vel_y;
            }
            Some(_) => {
                debug!(combatant_id = %id, "Ignoring impulse for rung-out combatant");
            }
            None => {
                debug!(combatant_id = %id, "Ignoring impulse for unknown combatant");
            }
        }
    }

    /// Advance the simulation by one physics tick
    pub fn tick(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.tick += 1;

        let friction = self.config.friction;
        let ring_out_distance = self.config.ring_out_distance();

        for combatant in self.combatants.iter_mut() {
            if !combatant.alive {
                continue;
            }

            let (x, y, vel_x, vel_y) = PhysicsSystem::integrate(
                combatant.x,
                combatant.y,
                combatant.vel_x,
                combatant.vel_y,
                friction,
            );
            combatant.x = x;
            combatant.y = y;
            combatant.vel_x = vel_x;
            combatant.vel_y = vel_y;

            if PhysicsSystem::is_ring_out(x, y, ring_out_distance) {
                combatant.alive = false;
                info!(
                    combatant_id = %combatant.id,
                    tick = self.tick,
                    multiplier = combatant.multiplier,
                    "Combatant rung out"
                );
                events.push(GameEvent::RingOut { id: combatant.id });
            }
        }

        events.extend(self.resolve_collisions());
        events
    }

    /// Resolve every overlapping pair of live combatants, sequentially in
    /// enumeration order
    pub fn resolve_collisions(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let radius = self.config.combatant_radius;

        for i in 0..self.combatants.len() {
            for j in (i + 1)..self.combatants.len() {
                let (head, tail) = self.combatants.split_at_mut(j);
                let p1 = &mut head[i];
                let p2 = &mut tail[0];

                if !p1.alive || !p2.alive {
                    continue;
                }

                let Some(contact) = PhysicsSystem::check_contact(p1.x, p1.y, p2.x, p2.y, radius)
                else {
                    continue;
                };

                let force = CombatSystem::collision_force(p1.speed(), p2.speed(), &self.config);

                p1.multiplier = CombatSystem::bump_multiplier(p1.multiplier, &self.config);
                p2.multiplier = CombatSystem::bump_multiplier(p2.multiplier, &self.config);

                let axis = contact.axis();
                let kb1 = CombatSystem::knockback(force, p1.multiplier);
                let kb2 = CombatSystem::knockback(force, p2.multiplier);
                (p1.vel_x, p1.vel_y) =
                    CombatSystem::apply_knockback(p1.vel_x, p1.vel_y, axis, kb1, -1.0);
                (p2.vel_x, p2.vel_y) =
                    CombatSystem::apply_knockback(p2.vel_x, p2.vel_y, axis, kb2, 1.0);

                let ((x1, y1), (x2, y2)) =
                    PhysicsSystem::separate(p1.x, p1.y, p2.x, p2.y, radius, &contact);
                p1.x = x1;
                p1.y = y1;
                p2.x = x2;
                p2.y = y2;

                events.push(GameEvent::Collision {
                    a: p1.id,
                    b: p2.id,
                    force,
                });
            }
        }

        events
    }

    /// Advance the round clock, soft-resetting every combatant on expiry
    pub fn round_tick(&mut self) -> RoundTick {
        let reset = self.clock.tick();
        if reset {
            self.soft_reset();
        }

        RoundTick {
            seconds_remaining: self.clock.remaining(),
            reset,
        }
    }

    /// Respawn every combatant in place without removing anyone
    pub fn soft_reset(&mut self) {
        for i in 0..self.combatants.len() {
            let (x, y) = self.spawn_position();
            self.combatants[i].respawn(x, y);
        }

        info!(
            combatant_count = self.combatants.len(),
            "Round over, arena reset"
        );
    }

    /// Full state keyed by combatant id
    pub fn snapshot(&self) -> BTreeMap<CombatantId, CombatantSnapshot> {
        self.combatants
            .iter()
            .map(|c| (c.id, c.snapshot()))
            .collect()
    }

    /// Random position near the arena center
    fn spawn_position(&mut self) -> (f64, f64) {
        let spread = self.config.spawn_spread;
        let x = self.rng.gen::<f64>() * 2.0 * spread - spread;
        let y = self.rng.gen::<f64>() * 2.0 * spread - spread;
        (x, y)
    }
}

#[cfg(test)]
impl ArenaState {
    pub fn get(&self, id: &CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == *id)
    }

    /// Combatants in enumeration (join) order
    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-4;

    fn arena() -> ArenaState {
        ArenaState::new(ArenaConfig::default(), 7)
    }

    fn place(arena: &mut ArenaState, id: CombatantId, x: f64, y: f64, vel_x: f64, vel_y: f64) {
        let combatant = arena
            .combatants
            .iter_mut()
            .find(|c| c.id == id)
            .expect("combatant present");
        combatant.x = x;
        combatant.y = y;
        combatant.vel_x = vel_x;
        combatant.vel_y = vel_y;
    }

    fn assert_fresh_spawn(combatant: &Combatant, spread: f64) {
        assert!(combatant.x.abs() <= spread && combatant.y.abs() <= spread);
        assert_eq!((combatant.vel_x, combatant.vel_y), (0.0, 0.0));
        assert_eq!(combatant.multiplier, BASE_MULTIPLIER);
        assert!(combatant.alive);
    }

    #[test]
    fn join_spawns_near_center_at_rest() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        let combatant = arena.join(id);

        assert_eq!(combatant.id, id);
        assert_fresh_spawn(&combatant, 100.0);
        assert!(combatant.color.starts_with("hsl("));
        assert_eq!(arena.get(&id), Some(&combatant));
    }

    #[test]
    fn same_seed_gives_same_spawns() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut a = arena();
        let mut b = arena();

        for id in &ids {
            assert_eq!(a.join(*id), b.join(*id));
        }
    }

    #[test]
    fn rejoin_replaces_record_in_place() {
        let mut arena = arena();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        arena.join(first);
        arena.join(second);
        place(&mut arena, first, 300.0, 0.0, 5.0, 0.0);
        arena.combatants[0].multiplier = 2.5;

        let rejoined = arena.join(first);

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.combatants[0].id, first);
        assert_fresh_spawn(&arena.combatants[0], 100.0);
        assert_eq!(arena.combatants[0], rejoined);
    }

    #[test]
    fn leave_is_idempotent() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        arena.join(id);

        arena.leave(&id);
        arena.leave(&id);
        arena.leave(&Uuid::new_v4());

        assert_eq!(arena.len(), 0);
        arena.tick();
        assert!(!arena.snapshot().contains_key(&id));
    }

    #[test]
    fn impulse_is_capped_at_max_speed() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        arena.join(id);

        arena.apply_impulse(&id, 0.0, 500.0);
        let combatant = arena.get(&id).unwrap();
        assert!((combatant.vel_x - 25.0).abs() < EPS);
        assert!(combatant.vel_y.abs() < EPS);

        arena.apply_impulse(&id, std::f64::consts::PI, 10.0);
        let combatant = arena.get(&id).unwrap();
        assert!((combatant.vel_x + 10.0).abs() < EPS);
    }

    #[test]
    fn impulse_ignored_for_unknown_dead_or_non_finite() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        arena.join(id);

        arena.apply_impulse(&Uuid::new_v4(), 0.0, 10.0);
        arena.apply_impulse(&id, f64::NAN, 10.0);
        arena.apply_impulse(&id, 0.0, f64::NAN);
        assert_eq!(arena.get(&id).unwrap().speed(), 0.0);

        arena.combatants[0].alive = false;
        arena.apply_impulse(&id, 0.0, 10.0);
        assert_eq!(arena.get(&id).unwrap().speed(), 0.0);
    }

    #[test]
    fn tick_integrates_then_applies_friction() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        arena.join(id);
        place(&mut arena, id, 0.0, 0.0, 10.0, -5.0);

        arena.tick();

        let combatant = arena.get(&id).unwrap();
        assert!((combatant.x - 10.0).abs() < EPS);
        assert!((combatant.y + 5.0).abs() < EPS);
        assert!((combatant.vel_x - 9.6).abs() < EPS);
        assert!((combatant.vel_y + 4.8).abs() < EPS);
        assert_eq!(arena.tick_count(), 1);
    }

    #[test]
    fn head_on_collision_bumps_multipliers_and_splits_pair() {
        let mut arena = arena();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        arena.join(a);
        arena.join(b);
        place(&mut arena, a, 0.0, 0.0, 0.0, 0.0);
        place(&mut arena, b, 10.0, 0.0, -5.0, 0.0);

        let events = arena.tick();

        let pa = arena.get(&a).unwrap();
        let pb = arena.get(&b).unwrap();
        assert!((pa.multiplier - 1.1).abs() < EPS);
        assert!((pb.multiplier - 1.1).abs() < EPS);
        assert!(pa.vel_x < 0.0 && pb.vel_x > 0.0);

        // B integrates to x=5 at speed 4.8, force = 4.8 * 0.8 + 2
        let force = 5.84;
        assert!((pa.vel_x + force * 1.1).abs() < EPS);
        assert!((pb.vel_x - (-4.8 + force * 1.1)).abs() < EPS);
        assert!(((pb.x - pa.x) - 50.0).abs() < EPS);

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GameEvent::Collision { a: ea, b: eb, .. } if ea == a && eb == b));
    }

    #[test]
    fn separated_pair_does_not_collide() {
        let mut arena = arena();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        arena.join(a);
        arena.join(b);
        place(&mut arena, a, -30.0, 0.0, 0.0, 0.0);
        place(&mut arena, b, 30.0, 0.0, 0.0, 0.0);

        assert!(arena.tick().is_empty());
        assert_eq!(arena.get(&a).unwrap().multiplier, BASE_MULTIPLIER);
        assert_eq!(arena.get(&b).unwrap().multiplier, BASE_MULTIPLIER);
    }

    #[test]
    fn three_way_overlap_counts_each_pair_once() {
        let mut arena = arena();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            arena.join(*id);
        }
        place(&mut arena, ids[0], 0.0, 0.0, 0.0, 0.0);
        place(&mut arena, ids[1], 10.0, 0.0, 0.0, 0.0);
        place(&mut arena, ids[2], 20.0, 0.0, 0.0, 0.0);

        let collisions = arena
            .resolve_collisions()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::Collision { .. }))
            .count();

        assert_eq!(collisions, 3);
        for id in &ids {
            assert!((arena.get(id).unwrap().multiplier - 1.2).abs() < EPS);
        }
    }

    #[test]
    fn pinned_pair_accumulates_every_tick_it_overlaps() {
        let mut arena = arena();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        arena.join(a);
        arena.join(b);

        for _ in 0..3 {
            place(&mut arena, a, 0.0, 0.0, 0.0, 0.0);
            place(&mut arena, b, 20.0, 0.0, 0.0, 0.0);
            arena.resolve_collisions();
        }

        assert!((arena.get(&a).unwrap().multiplier - 1.3).abs() < EPS);
        assert!((arena.get(&b).unwrap().multiplier - 1.3).abs() < EPS);
    }

    #[test]
    fn knockback_uses_own_multiplier() {
        let mut arena = arena();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        arena.join(a);
        arena.join(b);
        place(&mut arena, a, 0.0, 0.0, 0.0, 0.0);
        place(&mut arena, b, 30.0, 0.0, 0.0, 0.0);
        arena.combatants[1].multiplier = 2.0;

        arena.resolve_collisions();

        // Resting pair: force is the flat base of 2
        let pa = arena.get(&a).unwrap();
        let pb = arena.get(&b).unwrap();
        assert!((pa.vel_x + 2.0 * 1.1).abs() < EPS);
        assert!((pb.vel_x - 2.0 * 2.1).abs() < EPS);
    }

    #[test]
    fn rung_out_combatants_are_not_collided() {
        let mut arena = arena();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        arena.join(a);
        arena.join(b);
        place(&mut arena, a, 0.0, 0.0, 0.0, 0.0);
        place(&mut arena, b, 10.0, 0.0, 0.0, 0.0);
        arena.combatants[1].alive = false;

        assert!(arena.tick().is_empty());
        let pb = arena.get(&b).unwrap();
        assert_eq!(pb.multiplier, BASE_MULTIPLIER);
        assert_eq!((pb.x, pb.y), (10.0, 0.0));
    }

    #[test]
    fn sliding_off_the_edge_rings_out_for_good() {
        let mut arena = arena();
        let id = Uuid::new_v4();
        arena.join(id);
        place(&mut arena, id, 0.0, 0.0, 30.0, 0.0);
        let limit = arena.config().ring_out_distance();

        let mut rung_out_at = None;
        for tick in 1..=60 {
            let events = arena.tick();
            let combatant = arena.get(&id).unwrap();
            if rung_out_at.is_none() {
                // alive exactly until the tick the edge is crossed
                assert_eq!(combatant.alive, combatant.x <= limit);
                if !combatant.alive {
                    assert_eq!(events, vec![GameEvent::RingOut { id }]);
                    rung_out_at = Some(tick);
                }
            } else {
                assert!(!combatant.alive);
                assert!(events.is_empty());
            }
        }

        // 750 * (1 - 0.96^n) first exceeds 375 at n = 17
        assert_eq!(rung_out_at, Some(17));

        // An impulse cannot revive it
        arena.apply_impulse(&id, std::f64::consts::PI, 25.0);
        arena.tick();
        assert!(!arena.get(&id).unwrap().alive);
    }

    #[test]
    fn round_expiry_soft_resets_everyone() {
        let mut arena = arena();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            arena.join(*id);
        }
        place(&mut arena, ids[0], 400.0, 0.0, 3.0, 3.0);
        arena.combatants[0].alive = false;
        arena.combatants[1].multiplier = 1.7;
        place(&mut arena, ids[2], 0.0, 0.0, 12.0, -4.0);
        let colors: Vec<String> = arena.combatants().map(|c| c.color.clone()).collect();

        for remaining in (1..15).rev() {
            let round = arena.round_tick();
            assert_eq!(round, RoundTick { seconds_remaining: remaining, reset: false });
        }
        let round = arena.round_tick();
        assert_eq!(round, RoundTick { seconds_remaining: 15, reset: true });

        assert_eq!(arena.len(), 3);
        for (combatant, color) in arena.combatants().zip(colors) {
            assert_fresh_spawn(combatant, 100.0);
            assert_eq!(combatant.color, color);
        }
    }

    #[test]
    fn multipliers_never_decrease_between_resets() {
        let mut arena = arena();
        let ids: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            arena.join(*id);
        }
        let mut driver = ChaCha8Rng::seed_from_u64(99);

        for tick in 0..600 {
            if tick % 20 == 0 {
                for id in &ids {
                    let angle = driver.gen_range(0.0..std::f64::consts::TAU);
                    let power = driver.gen_range(0.0..40.0);
                    arena.apply_impulse(id, angle, power);
                }
            }

            let before: Vec<f64> = arena.combatants().map(|c| c.multiplier).collect();
            arena.tick();
            for (combatant, previous) in arena.combatants().zip(before) {
                assert!(combatant.multiplier >= previous);
                assert!(combatant.multiplier >= BASE_MULTIPLIER);
            }
        }
    }
}

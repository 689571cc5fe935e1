//! Arena task - owns the simulation and drives its two schedules

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ArenaConfig;
use crate::util::time::{tick_period, Timer};
use crate::ws::protocol::{GameEvent, ServerMsg};

use super::arena::ArenaState;
use super::snapshot::SnapshotBuilder;
use super::ArenaInput;

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    input_tx: mpsc::Sender<ArenaInput>,
    update_tx: broadcast::Sender<ServerMsg>,
    combatant_count: Arc<AtomicUsize>,
    round_remaining: Arc<AtomicU32>,
    updates_sent: Arc<AtomicU64>,
}

impl ArenaHandle {
    /// Queue an inbound event. Returns false once the arena has stopped.
    pub async fn send(&self, input: ArenaInput) -> bool {
        self.input_tx.send(input).await.is_ok()
    }

    /// Subscribe to outbound updates and timer ticks
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.update_tx.subscribe()
    }

    pub fn combatant_count(&self) -> usize {
        self.combatant_count.load(Ordering::Relaxed)
    }

    pub fn round_remaining(&self) -> u32 {
        self.round_remaining.load(Ordering::Relaxed)
    }

    /// Full-state updates broadcast since the arena started
    pub fn updates_sent(&self) -> u64 {
        self.updates_sent.load(Ordering::Relaxed)
    }
}

/// The authoritative arena
pub struct ArenaTask {
    state: ArenaState,
    input_rx: mpsc::Receiver<ArenaInput>,
    update_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    combatant_count: Arc<AtomicUsize>,
    round_remaining: Arc<AtomicU32>,
    updates_sent: Arc<AtomicU64>,
    physics_period: Duration,
    round_period: Duration,
}

impl ArenaTask {
    /// Create a new arena
    pub fn new(config: ArenaConfig, seed: u64) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (update_tx, _) = broadcast::channel(256);
        let combatant_count = Arc::new(AtomicUsize::new(0));
        let round_remaining = Arc::new(AtomicU32::new(config.round_secs));
        let updates_sent = Arc::new(AtomicU64::new(0));

        let handle = ArenaHandle {
            input_tx,
            update_tx: update_tx.clone(),
            combatant_count: combatant_count.clone(),
            round_remaining: round_remaining.clone(),
            updates_sent: updates_sent.clone(),
        };

        let task = Self {
            physics_period: tick_period(config.physics_tps),
            round_period: tick_period(config.round_tps),
            state: ArenaState::new(config, seed),
            input_rx,
            update_tx,
            snapshot_builder: SnapshotBuilder::new(),
            combatant_count,
            round_remaining,
            updates_sent,
        };

        (task, handle)
    }

    /// Run both schedules until every handle is dropped.
    ///
    /// Inbound events are applied one at a time between steps, so a physics
    /// step always sees a consistent combatant set.
    pub async fn run(mut self) {
        info!(
            physics_period_us = self.physics_period.as_micros() as u64,
            round_secs = self.state.config().round_secs,
            "Arena started"
        );

        let mut physics = interval(self.physics_period);
        physics.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut round = interval(self.round_period);
        round.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Both intervals fire immediately on first poll
        physics.tick().await;
        round.tick().await;

        loop {
            tokio::select! {
                biased;

                input = self.input_rx.recv() => match input {
                    Some(input) => self.apply_input(input),
                    None => break,
                },
                _ = physics.tick() => self.step_physics(),
                _ = round.tick() => self.step_round(),
            }
        }

        info!(
            updates = self.snapshot_builder.updates_built(),
            "Arena stopped"
        );
    }

    fn apply_input(&mut self, input: ArenaInput) {
        match input {
            ArenaInput::Join { id } => {
                self.state.join(id);
            }
            ArenaInput::Leave { id } => {
                self.state.leave(&id);
            }
            ArenaInput::Shoot { id, angle, power } => {
                self.state.apply_impulse(&id, angle, power);
            }
        }
        self.combatant_count
            .store(self.state.len(), Ordering::Relaxed);
    }

    /// Run one physics tick and broadcast the resulting state
    fn step_physics(&mut self) {
        let timer = Timer::new();
        let events = self.state.tick();
        let elapsed = timer.elapsed();

        if elapsed > self.physics_period {
            warn!(
                tick = self.state.tick_count(),
                elapsed_us = elapsed.as_micros() as u64,
                "Physics tick overran its period"
            );
        }

        self.broadcast_update(events);
    }

    /// Run one round tick, broadcasting the reset state first on expiry
    fn step_round(&mut self) {
        let round = self.state.round_tick();
        self.round_remaining
            .store(round.seconds_remaining, Ordering::Relaxed);

        if round.reset {
            self.broadcast_update(vec![GameEvent::RoundReset]);
        }

        let timer = self.snapshot_builder.build_timer(round.seconds_remaining);
        let _ = self.update_tx.send(timer);
    }

    fn broadcast_update(&mut self, events: Vec<GameEvent>) {
        if self.update_tx.receiver_count() == 0 {
            debug!(tick = self.state.tick_count(), "No observers, skipping update");
            return;
        }

        let update = self.snapshot_builder.build_update(&self.state, events);
        let _ = self.update_tx.send(update);
        self.updates_sent
            .store(self.snapshot_builder.updates_built(), Ordering::Relaxed);
    }
}

//! The simulation engine: owns the session state and drives it through the
//! three periodic timers.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - The [`GameState`] behind an `Arc`, mutated copy-on-write
//! - The [`EconomyConfig`] the session was built from
//! - A [`Scheduler`] with the main tick, price retarget, and price
//!   interpolation timers
//! - An [`EventBus`] for typed simulation events
//!
//! # Main tick
//!
//! Each main tick runs, in order:
//! 1. **Production** -- advance batches, decay profit displays
//! 2. **Settlement** -- resolve deliveries whose arrival time has passed
//! 3. **Dispatch** -- send idle agents out with stored output
//!
//! Events are delivered to listeners once the tick (or command) completes.
//! All mutation funnels through `&mut self`, so ticks and commands are
//! serialized by construction.

use crate::command::{self, Command, CommandOutcome, Rejection};
use crate::config::{ConfigError, EconomyConfig};
use crate::event::{Event, EventBus, EventKind, PassiveListener};
use crate::fixed::Millis;
use crate::id::BusinessId;
use crate::query::{BusinessSnapshot, snapshot_all, snapshot_business};
use crate::resource::ResourceValues;
use crate::sim::{AdvanceResult, Clock, Scheduler, StateHash, TimerKind};
use crate::state::GameState;
use crate::{dispatch, production, settlement};
use std::sync::Arc;

/// The core simulation engine.
#[derive(Debug)]
pub struct Engine {
    state: Arc<GameState>,
    config: EconomyConfig,
    values: ResourceValues,
    scheduler: Scheduler,

    /// Typed event bus for simulation events.
    pub event_bus: EventBus,

    /// Clock reading at the previous `pump`.
    last_pump: Option<Millis>,
}

impl Engine {
    /// Validate `config` and start a fresh, running session.
    pub fn new(config: EconomyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let values = ResourceValues::from_base_values(&config.base_values);
        let state = GameState::new_session(&config, &values);
        tracing::info!(
            target: "emporium::engine",
            coins = state.coins,
            seed = config.seed,
            tick_ms = config.schedule.tick_ms,
            "session started"
        );
        Ok(Self {
            state: Arc::new(state),
            scheduler: Scheduler::new(config.schedule),
            event_bus: EventBus::new(config.event_history),
            values,
            config,
            last_pump: None,
        })
    }

    /// Resume from an existing state, e.g. one restored by the snapshot codec.
    pub fn with_state(config: EconomyConfig, state: GameState) -> Result<Self, ConfigError> {
        let mut engine = Self::new(config)?;
        engine.state = Arc::new(state);
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    /// A shared handle to the current state. Never mutated after return.
    pub fn snapshot(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn values(&self) -> &ResourceValues {
        &self.values
    }

    pub fn coins(&self) -> i64 {
        self.state.coins
    }

    pub fn now_ms(&self) -> Millis {
        self.state.now_ms
    }

    pub fn is_bankrupt(&self) -> bool {
        self.state.is_bankrupt()
    }

    pub fn snapshot_business(&self, id: BusinessId) -> Option<BusinessSnapshot> {
        snapshot_business(&self.state, id)
    }

    pub fn snapshot_all_businesses(&self) -> Vec<BusinessSnapshot> {
        snapshot_all(&self.state)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Arm the timers. Accumulated partial periods are discarded.
    pub fn start(&mut self) {
        self.scheduler.start();
        self.last_pump = None;
        tracing::info!(target: "emporium::engine", now_ms = self.state.now_ms, "timers started");
    }

    /// Cancel the timers. `advance` and `pump` do nothing until `start`.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        tracing::info!(target: "emporium::engine", now_ms = self.state.now_ms, "timers stopped");
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Throw the session away and start over from the config. Listeners and
    /// suppression settings survive.
    pub fn restart(&mut self) {
        self.state = Arc::new(GameState::new_session(&self.config, &self.values));
        self.scheduler = Scheduler::new(self.config.schedule);
        self.event_bus.clear_all();
        self.last_pump = None;
        tracing::info!(target: "emporium::engine", coins = self.state.coins, "session restarted");
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance simulation time by `dt` milliseconds, firing every due timer
    /// in chronological order.
    pub fn advance(&mut self, dt: Millis) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if !self.scheduler.is_running() || dt == 0 {
            return result;
        }

        let start = self.state.now_ms;
        for fire in self.scheduler.advance(start, dt) {
            Arc::make_mut(&mut self.state).now_ms = fire.at_ms;
            match fire.kind {
                TimerKind::MainTick => {
                    self.run_main_tick();
                    result.ticks_run += 1;
                }
                TimerKind::PriceRetarget => {
                    self.run_retarget();
                    result.retargets_run += 1;
                }
                TimerKind::PriceInterpolate => {
                    Arc::make_mut(&mut self.state).market.interpolate();
                    result.interpolations_run += 1;
                }
            }
            self.event_bus.deliver();
        }

        Arc::make_mut(&mut self.state).now_ms = start.saturating_add(dt);
        result
    }

    /// Advance by the time elapsed on `clock` since the previous pump. The
    /// first pump after construction or `start` only records the reading.
    pub fn pump(&mut self, clock: &dyn Clock) -> AdvanceResult {
        let now = clock.now_ms();
        let result = match self.last_pump {
            Some(last) => self.advance(now.saturating_sub(last)),
            None => AdvanceResult::default(),
        };
        self.last_pump = Some(now);
        result
    }

    /// Run exactly one main tick at the current simulation time.
    pub fn step(&mut self) {
        self.run_main_tick();
        self.event_bus.deliver();
    }

    fn run_main_tick(&mut self) {
        let tick_ms = self.config.schedule.tick_ms;
        let state = Arc::make_mut(&mut self.state);
        state.tick += 1;
        production::run(state, tick_ms, &mut self.event_bus);
        settlement::run(state, &self.values, &mut self.event_bus);
        dispatch::run(state, &mut self.event_bus);
    }

    fn run_retarget(&mut self) {
        let state = Arc::make_mut(&mut self.state);
        state.market.retarget(&self.values, &mut state.rng);
        tracing::debug!(target: "emporium::market", now_ms = state.now_ms, "market retargeted");
        self.event_bus.emit(Event::MarketRetargeted {
            at_ms: state.now_ms,
        });
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply a collaborator command. The single update path for all
    /// mutations outside the tick.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome, Rejection> {
        let result = command::apply(&mut self.state, &self.config, &command, &mut self.event_bus);
        match &result {
            Ok(outcome) => tracing::info!(
                target: "emporium::command",
                ?outcome,
                coins = self.state.coins,
                "command applied"
            ),
            Err(reason) => tracing::debug!(
                target: "emporium::command",
                ?command,
                %reason,
                "command rejected"
            ),
        }
        self.event_bus.deliver();
        result
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    // -----------------------------------------------------------------------
    // Hashing
    // -----------------------------------------------------------------------

    /// Deterministic fingerprint of the whole state.
    pub fn state_hash(&self) -> u64 {
        hash_state(&self.state)
    }
}

/// FNV-1a over every field that affects future simulation.
pub fn hash_state(state: &GameState) -> u64 {
    let mut h = StateHash::new();
    h.write_i64(state.coins);
    h.write_u64(state.now_ms);
    h.write_u64(state.tick);
    h.write_u64(state.rng.state());
    h.write_u64(state.businesses.len() as u64);
    for b in &state.businesses {
        h.write_u32(b.id.0);
        h.write_u32(b.kind as u32);
        h.write_fixed64(b.position.x);
        h.write_fixed64(b.position.y);
        h.write_u32(b.incoming.current);
        h.write_u32(b.incoming.capacity);
        h.write_u32(b.outgoing.current);
        h.write_u32(b.outgoing.capacity);
        h.write_fixed64(b.processing_time);
        h.write_fixed64(b.progress);
        h.write_u32(b.level);
        h.write_i64(b.total_invested);
        for p in &b.pending {
            h.write_u32(p.source.0);
            h.write_u32(p.amount);
            h.write_u32(p.resource as u32);
        }
        for a in b.agents() {
            h.write_u32(a.id.0);
            h.write_u32(a.current_load);
            h.write_u32(u32::from(a.is_delivering));
        }
    }
    for (_, d) in state.deliveries_in_order() {
        h.write_u64(d.sequence);
        h.write_u32(d.agent.id.0);
        h.write_u32(d.amount);
        h.write_u64(d.expected_arrival_ms);
    }
    for (r, e) in state.market.iter() {
        h.write_u32(r as u32);
        h.write_fixed64(e.value);
        h.write_fixed64(e.target);
    }
    h.finish()
}

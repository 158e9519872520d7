//! Timers, clocks, and state hashing.
//!
//! The engine runs three independent periodic actions: the main tick, the
//! market retarget, and the market interpolation. A [`Scheduler`] owns one
//! accumulator per timer (the same carry-the-remainder scheme as a fixed
//! timestep loop) and reports which timers fire, in chronological order, for
//! a given slice of elapsed time. Time is injected through a [`Clock`], never
//! read from the environment by the simulation itself.

use crate::config::ConfigError;
use crate::fixed::{Fixed64, Millis};
use std::cell::Cell;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Timer schedule
// ---------------------------------------------------------------------------

/// Periods of the three simulation timers, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TimerSchedule {
    /// Production, settlement, and dispatch.
    pub tick_ms: Millis,
    /// Market target refresh.
    pub retarget_ms: Millis,
    /// Market value interpolation.
    pub interpolate_ms: Millis,
}

impl Default for TimerSchedule {
    fn default() -> Self {
        Self {
            tick_ms: 400,
            retarget_ms: 15_000,
            interpolate_ms: 400,
        }
    }
}

impl TimerSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (timer, period) in [
            ("tick", self.tick_ms),
            ("retarget", self.retarget_ms),
            ("interpolate", self.interpolate_ms),
        ] {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { timer });
            }
        }
        Ok(())
    }

    pub fn period(&self, kind: TimerKind) -> Millis {
        match kind {
            TimerKind::MainTick => self.tick_ms,
            TimerKind::PriceRetarget => self.retarget_ms,
            TimerKind::PriceInterpolate => self.interpolate_ms,
        }
    }
}

/// Which periodic action a timer drives. Declaration order breaks ties
/// between timers due at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    MainTick,
    PriceRetarget,
    PriceInterpolate,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [
        TimerKind::MainTick,
        TimerKind::PriceRetarget,
        TimerKind::PriceInterpolate,
    ];
}

/// A single timer firing produced by [`Scheduler::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire {
    pub kind: TimerKind,
    /// Absolute simulation time of the firing.
    pub at_ms: Millis,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Three periodic timers with an explicit start/stop lifecycle.
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: TimerSchedule,
    /// Time accumulated towards the next firing of each timer.
    elapsed: [Millis; 3],
    running: bool,
}

impl Scheduler {
    /// Create a running scheduler with all accumulators at zero.
    pub fn new(schedule: TimerSchedule) -> Self {
        Self {
            schedule,
            elapsed: [0; 3],
            running: true,
        }
    }

    pub fn schedule(&self) -> &TimerSchedule {
        &self.schedule
    }

    /// Arm all timers. Accumulators restart from zero.
    pub fn start(&mut self) {
        self.elapsed = [0; 3];
        self.running = true;
    }

    /// Cancel all timers. `advance` reports nothing until restarted.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Account for `dt` elapsed milliseconds starting at `now`, yielding
    /// every firing inside `(now, now + dt]` sorted by time, ties broken by
    /// [`TimerKind`] order.
    ///
    /// Accumulators are updated immediately. Firings are produced lazily, so
    /// a long `dt` costs nothing until it is iterated.
    pub fn advance(&mut self, now: Millis, dt: Millis) -> Firings {
        let mut firings = Firings::default();
        if !self.running || dt == 0 {
            return firings;
        }

        for (slot, kind) in TimerKind::ALL.iter().enumerate() {
            let period = self.schedule.period(*kind).max(1);
            let total = self.elapsed[slot].saturating_add(dt);
            // First firing happens once the accumulator reaches one period.
            let first_offset = period - self.elapsed[slot].min(period);
            firings.timers[slot] = PendingTimer {
                next_at: now.saturating_add(first_offset),
                remaining: total / period,
                period,
            };
            self.elapsed[slot] = total % period;
        }
        firings
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PendingTimer {
    next_at: Millis,
    remaining: u64,
    period: Millis,
}

/// Timer firings of one [`Scheduler::advance`] call, merged in time order.
#[derive(Debug, Clone, Default)]
pub struct Firings {
    timers: [PendingTimer; 3],
}

impl Iterator for Firings {
    type Item = TimerFire;

    fn next(&mut self) -> Option<TimerFire> {
        // Ties go to the lower slot.
        let mut due: Option<usize> = None;
        for (slot, timer) in self.timers.iter().enumerate() {
            if timer.remaining == 0 {
                continue;
            }
            match due {
                Some(best) if self.timers[best].next_at <= timer.next_at => {}
                _ => due = Some(slot),
            }
        }

        let slot = due?;
        let timer = &mut self.timers[slot];
        let fire = TimerFire {
            kind: TimerKind::ALL[slot],
            at_ms: timer.next_at,
        };
        timer.remaining -= 1;
        timer.next_at = timer.next_at.saturating_add(timer.period);
        Some(fire)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self
            .timers
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.remaining));
        match usize::try_from(total) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// A monotonic time source, in milliseconds since an arbitrary origin.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// A clock moved only by hand. Deterministic; used by tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Millis>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, dt: Millis) {
        self.now.set(self.now.get().saturating_add(dt));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

/// Wall-clock time measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    pub ticks_run: u64,
    pub retargets_run: u64,
    pub interpolations_run: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

//! Emporium Core -- the simulation engine for an incremental trading game.
//!
//! Businesses placed on a 2D plane gather or refine resources in batches,
//! delivery agents carry the output to consumers or to the market, and
//! every settled delivery earns coins. Market prices drift toward randomly
//! drawn targets.
//!
//! # Main Tick
//!
//! Each main tick (see [`engine::Engine::step`]) runs three phases:
//!
//! 1. **Production** -- batches advance, complete batches commit to outgoing
//!    storage, profit displays decay.
//! 2. **Settlement** -- deliveries whose arrival time has passed unload into
//!    their target and credit revenue.
//! 3. **Dispatch** -- idle agents leave with stored output, reserving
//!    capacity on the target.
//!
//! Two further timers retarget and interpolate market prices. All three are
//! driven by [`engine::Engine::advance`] from an injected clock, so a
//! session is fully deterministic for a given seed and command sequence.
//!
//! # Mutation
//!
//! Outside the tick, state changes only through [`command::Command`]s passed
//! to [`engine::Engine::execute`]. The state lives behind an `Arc` and is
//! updated copy-on-write; a rejected command leaves it untouched.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the session and drives the timers.
//! - [`state::GameState`] -- Coins, businesses, deliveries, market prices.
//! - [`business::Business`] -- Buffers, batch progress, fleet, upgrades.
//! - [`config::EconomyConfig`] -- Every tunable constant, serde-friendly.
//! - [`event::EventBus`] -- Typed events with buffered delivery.
//! - [`query`] -- Owned read-only views for rendering.
//! - [`serialize`] -- Versioned snapshot blobs via bitcode.

pub mod agent;
pub mod business;
pub mod command;
pub mod config;
pub mod cost;
pub mod dispatch;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod id;
pub mod market;
pub mod production;
pub mod query;
pub mod resource;
pub mod rng;
pub mod serialize;
pub mod settlement;
pub mod sim;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use command::{Command, CommandOutcome, Rejection};
pub use config::EconomyConfig;
pub use engine::Engine;

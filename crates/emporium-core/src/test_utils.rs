//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::agent::ShippingKind;
use crate::business::{BusinessKind, BusinessSpec, Position};
use crate::command::{Command, CommandOutcome};
use crate::config::EconomyConfig;
use crate::engine::Engine;
use crate::event::{Event, EventKind};
use crate::fixed::{Fixed64, Millis};
use crate::id::BusinessId;
use crate::state::GameState;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Configs
// ===========================================================================

/// Default config with one business kind's spec replaced.
pub fn config_with(kind: BusinessKind, spec: BusinessSpec) -> EconomyConfig {
    let mut config = EconomyConfig::default();
    config.businesses.insert(kind, spec);
    config
}

/// A Forest that takes `processing_time` seconds per batch of `batch_size`,
/// with an outgoing buffer of `outgoing_capacity`.
pub fn forest_spec(processing_time: f64, batch_size: u32, outgoing_capacity: u32) -> BusinessSpec {
    BusinessSpec {
        processing_time,
        batch_size,
        outgoing_capacity,
        ..BusinessSpec::default_for(BusinessKind::Forest)
    }
}

// ===========================================================================
// Engines
// ===========================================================================

pub fn default_engine() -> Engine {
    Engine::new(EconomyConfig::default()).expect("default config is valid")
}

pub fn engine_with(config: EconomyConfig) -> Engine {
    Engine::new(config).expect("test config is valid")
}

/// Place a business and return its id. Panics if the placement is refused.
pub fn place(engine: &mut Engine, kind: BusinessKind, x: f64, y: f64) -> BusinessId {
    match engine.execute(Command::PlaceBusiness {
        kind,
        position: Position::new(x, y),
    }) {
        Ok(CommandOutcome::Placed { business, .. }) => business,
        other => panic!("placing {kind:?} failed: {other:?}"),
    }
}

pub fn hire(engine: &mut Engine, business: BusinessId, kind: ShippingKind) {
    engine
        .execute(Command::HireAgent { business, kind })
        .expect("hire should succeed");
}

/// Advance one main tick at a time until `pred` holds or `limit_ms` of
/// simulated time passes. Returns whether `pred` held.
pub fn advance_until(
    engine: &mut Engine,
    limit_ms: Millis,
    mut pred: impl FnMut(&Engine) -> bool,
) -> bool {
    let tick = engine.config().schedule.tick_ms;
    let deadline = engine.now_ms().saturating_add(limit_ms);
    while engine.now_ms() < deadline {
        engine.advance(tick);
        if pred(engine) {
            return true;
        }
    }
    false
}

// ===========================================================================
// Event recording
// ===========================================================================

/// Register a listener on every event kind and collect what it sees.
pub fn record_events(engine: &mut Engine) -> Rc<RefCell<Vec<Event>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Rc::clone(&log);
        engine.on_passive(kind, Box::new(move |e: &Event| sink.borrow_mut().push(e.clone())));
    }
    log
}

pub fn count_kind(log: &Rc<RefCell<Vec<Event>>>, kind: EventKind) -> usize {
    log.borrow().iter().filter(|e| e.kind() == kind).count()
}

// ===========================================================================
// Invariants
// ===========================================================================

/// Assert every structural invariant of a session.
pub fn assert_invariants(state: &GameState) {
    let mut seen_agents = BTreeSet::new();
    for (_, d) in state.active_deliveries.iter() {
        assert!(
            seen_agents.insert(d.agent.id),
            "agent {} carries more than one delivery",
            d.agent.id
        );
    }

    for b in &state.businesses {
        assert!(
            b.buffers_within_bounds(),
            "business {} buffers out of bounds: {:?} / {:?}",
            b.id,
            b.incoming,
            b.outgoing
        );
        assert!(
            b.progress >= Fixed64::ZERO && b.progress < Fixed64::ONE,
            "business {} progress {}",
            b.id,
            b.progress
        );
        assert!(
            b.reserved_incoming() <= b.incoming.capacity.saturating_sub(b.incoming.current),
            "business {} over-reserved",
            b.id
        );
        for a in b.agents() {
            assert!(a.is_consistent(), "agent {} inconsistent: {a:?}", a.id);
            if a.is_delivering {
                assert!(
                    state.delivery_for_agent(a.id).is_some(),
                    "delivering agent {} has no delivery",
                    a.id
                );
            }
        }
    }
}

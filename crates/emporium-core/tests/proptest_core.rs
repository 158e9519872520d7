//! Property-based tests for the Emporium core engine.
//!
//! Uses proptest to generate random command and time sequences, then
//! verify the structural invariants hold after every step.

use emporium_core::agent::ShippingKind;
use emporium_core::business::{BusinessKind, Position, UpgradeKind, Upgrades};
use emporium_core::command::Command;
use emporium_core::cost::{UpgradePricing, agent_hire_cost, placement_cost, upgrade_cost};
use emporium_core::engine::Engine;
use emporium_core::fixed::Fixed64;
use emporium_core::id::BusinessId;
use emporium_core::market::{MarketPriceEntry, interpolation_rate};
use emporium_core::serialize;
use emporium_core::test_utils::*;
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum Op {
    Place(usize, f64, f64),
    Upgrade(usize, usize),
    Hire(usize, usize),
    Sell(usize, usize),
    Relocate(usize, f64, f64),
    Advance(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..9usize, -200.0..200.0f64, -200.0..200.0f64)
            .prop_map(|(k, x, y)| Op::Place(k, x, y)),
        1 => (0..10usize, 0..3usize).prop_map(|(b, u)| Op::Upgrade(b, u)),
        2 => (0..10usize, 0..3usize).prop_map(|(b, k)| Op::Hire(b, k)),
        2 => (0..10usize, 0..3usize).prop_map(|(b, k)| Op::Sell(b, k)),
        1 => (0..10usize, -200.0..200.0f64, -200.0..200.0f64)
            .prop_map(|(b, x, y)| Op::Relocate(b, x, y)),
        4 => (1..6_000u64).prop_map(Op::Advance),
    ]
}

fn arb_ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(), 1..=max)
}

fn pick(engine: &Engine, idx: usize) -> BusinessId {
    let businesses = &engine.state().businesses;
    businesses[idx % businesses.len()].id
}

/// Apply one op. Rejections are expected and ignored.
fn apply(engine: &mut Engine, op: &Op) {
    let command = match *op {
        Op::Place(k, x, y) => Command::PlaceBusiness {
            kind: BusinessKind::PLACEABLE[k],
            position: Position::new(x, y),
        },
        Op::Upgrade(b, u) => Command::UpgradeBusiness {
            business: pick(engine, b),
            upgrade: UpgradeKind::ALL[u],
        },
        Op::Hire(b, k) => Command::HireAgent {
            business: pick(engine, b),
            kind: ShippingKind::ALL[k],
        },
        Op::Sell(b, k) => Command::SellAgent {
            business: pick(engine, b),
            kind: ShippingKind::ALL[k],
        },
        Op::Relocate(b, x, y) => Command::RelocateBusiness {
            business: pick(engine, b),
            position: Position::new(x, y),
        },
        Op::Advance(ms) => {
            engine.advance(ms);
            return;
        }
    };
    let _ = engine.execute(command);
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Buffers, agents, deliveries, and progress stay consistent under any
    /// command/time interleaving.
    #[test]
    fn invariants_hold_under_random_play(ops in arb_ops(60)) {
        let mut engine = default_engine();
        for op in &ops {
            apply(&mut engine, op);
            assert_invariants(engine.state());
            prop_assert!(engine.coins() >= 0, "commands alone never overdraw");
        }
    }

    /// Two sessions fed the same inputs end in the same state.
    #[test]
    fn random_play_is_deterministic(ops in arb_ops(40)) {
        let mut a = default_engine();
        let mut b = default_engine();
        for op in &ops {
            apply(&mut a, op);
            apply(&mut b, op);
        }
        prop_assert_eq!(a.state_hash(), b.state_hash());
    }

    /// A snapshot decodes to a state with the same fingerprint.
    #[test]
    fn snapshot_preserves_state(ops in arb_ops(30)) {
        let mut engine = default_engine();
        for op in &ops {
            apply(&mut engine, op);
        }
        let bytes = serialize::encode(engine.state()).unwrap();
        let restored = serialize::decode(&bytes).unwrap();
        prop_assert_eq!(emporium_core::engine::hash_state(&restored), engine.state_hash());
    }

    /// Placement cost is strictly increasing in the number owned, up to the
    /// point where the priciest kind saturates at `i64::MAX`.
    #[test]
    fn placement_cost_strictly_increasing(k in 0..9usize, owned in 0..135u32) {
        let kind = BusinessKind::PLACEABLE[k];
        let base = emporium_core::business::BusinessSpec::default_for(kind).base_cost;
        prop_assert!(placement_cost(base, owned + 1) > placement_cost(base, owned));
    }

    /// Hire cost never decreases as the fleet grows.
    #[test]
    fn hire_cost_non_decreasing(k in 0..3usize, owned in 0..600u32) {
        let kind = ShippingKind::ALL[k];
        let base = emporium_core::agent::AgentSpec::default_for(kind).base_cost;
        prop_assert!(agent_hire_cost(base, owned + 1) >= agent_hire_cost(base, owned));
    }

    /// Upgrade cost on one track is strictly increasing in that track's
    /// count, whatever the other tracks hold.
    #[test]
    fn upgrade_cost_strictly_increasing(
        track in 0..3usize,
        n in 0..30u32,
        others in (0..5u32, 0..5u32, 0..5u32),
        diversified in any::<bool>(),
    ) {
        let kind = UpgradeKind::ALL[track];
        let pricing = if diversified {
            UpgradePricing::Diversified
        } else {
            UpgradePricing::Simple
        };
        let mut upgrades = Upgrades {
            incoming_capacity: others.0,
            processing_time: others.1,
            outgoing_capacity: others.2,
        };
        *upgrades.get_mut(kind) = n;
        let before = upgrade_cost(pricing, &upgrades, kind);
        *upgrades.get_mut(kind) = n + 1;
        let after = upgrade_cost(pricing, &upgrades, kind);
        prop_assert!(after > before, "{before} -> {after}");
    }

    /// Interpolation moves toward the target, never past it, and by at most
    /// the per-step fraction of the gap.
    #[test]
    fn interpolation_converges_monotonically(
        value in 0.0..10_000.0f64,
        target in 0.0..10_000.0f64,
        steps in 1..200usize,
    ) {
        let mut entry = MarketPriceEntry {
            value: Fixed64::from_num(value),
            target: Fixed64::from_num(target),
        };
        for _ in 0..steps {
            let gap = entry.target - entry.value;
            let delta = entry.interpolate();
            let new_gap = entry.target - entry.value;

            prop_assert!(new_gap.abs() <= gap.abs());
            prop_assert!(new_gap == Fixed64::ZERO || new_gap.signum() == gap.signum());
            let bound = gap.abs().saturating_mul(interpolation_rate()) + Fixed64::from_bits(2);
            prop_assert!(delta.abs() <= bound);
            prop_assert!(entry.value >= Fixed64::ZERO);
        }
    }
}

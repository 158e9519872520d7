//! Cost and upgrade calculator.
//!
//! Pure functions of counts and levels; no state of their own. Exponential
//! curves are evaluated on integers as `base * num^n / den^n` and floored,
//! saturating at `i64::MAX`, so every curve is deterministic and monotone.

use crate::business::{Business, UpgradeKind, Upgrades};
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Growth ratio applied per owned business of the same kind (1.3).
pub const PLACEMENT_GROWTH: (u32, u32) = (13, 10);

/// Growth ratio applied per owned agent of the same kind (1.1).
pub const AGENT_GROWTH: (u32, u32) = (11, 10);

/// Cost of the first upgrade on any track.
pub const UPGRADE_BASE_COST: i64 = 50;

/// Minimum fee to relocate a business.
pub const MIN_RELOCATION_COST: i64 = 10;

/// Studs moved per coin of relocation fee.
pub const RELOCATION_STUDS_PER_COIN: f64 = 10.0;

/// Levels folded into one `u128` product at most.
const MAX_CHUNK: u32 = 64;

/// An exponentially scaling price: `floor(base * (numerator / denominator)^level)`.
///
/// The product is exact while `base * numerator^level` fits in a `u128`;
/// longer curves are folded in chunks, flooring between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialCost {
    pub base: u32,
    pub numerator: u32,
    pub denominator: u32,
}

impl ExponentialCost {
    pub fn new(base: u32, (numerator, denominator): (u32, u32)) -> Self {
        Self {
            base,
            numerator,
            denominator,
        }
    }

    /// Cost at the given level (number already owned/applied).
    pub fn cost_at(&self, level: u32) -> i64 {
        let num = u128::from(self.numerator);
        let den = u128::from(self.denominator.max(1));
        let ceiling = i64::MAX as u128;

        let mut value = u128::from(self.base);
        let mut remaining = level;
        while remaining > 0 && value > 0 {
            let mut step = remaining.min(MAX_CHUNK);
            let scaled = loop {
                let product = num.checked_pow(step).and_then(|p| p.checked_mul(value));
                match product {
                    Some(p) => break p,
                    None if step > 1 => step -= 1,
                    None => return i64::MAX,
                }
            };
            let Some(divisor) = den.checked_pow(step) else {
                return 0;
            };
            value = scaled / divisor;
            if value > ceiling {
                return i64::MAX;
            }
            remaining -= step;
        }
        value.min(ceiling) as i64
    }
}

/// Which upgrade formula a session uses. Callers pick one and stick to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpgradePricing {
    /// `floor(50 * 2^n)`, ignoring the other tracks.
    Simple,
    /// As `Simple`, then `x1.5` for each other track never upgraded.
    #[default]
    Diversified,
}

/// `floor(base * 1.3^owned)`.
pub fn placement_cost(base_cost: u32, owned: u32) -> i64 {
    ExponentialCost::new(base_cost, PLACEMENT_GROWTH).cost_at(owned)
}

/// Cost of the next upgrade on `kind` given the business's counters.
pub fn upgrade_cost(pricing: UpgradePricing, upgrades: &Upgrades, kind: UpgradeKind) -> i64 {
    let applied = upgrades.get(kind);
    let mut cost = 2i64
        .checked_pow(applied)
        .and_then(|p| p.checked_mul(UPGRADE_BASE_COST))
        .unwrap_or(i64::MAX);

    if pricing == UpgradePricing::Diversified {
        let untouched = UpgradeKind::ALL
            .iter()
            .filter(|&&other| other != kind && upgrades.get(other) == 0)
            .count();
        for _ in 0..untouched {
            cost = cost.checked_mul(3).map_or(i64::MAX, |c| c / 2);
        }
    }
    cost
}

/// `floor(base * 1.1^owned)`.
pub fn agent_hire_cost(base_cost: u32, owned: u32) -> i64 {
    ExponentialCost::new(base_cost, AGENT_GROWTH).cost_at(owned)
}

/// Half the hire price at the pre-removal count, floored.
pub fn agent_sell_refund(base_cost: u32, owned_before_removal: u32) -> i64 {
    agent_hire_cost(base_cost, owned_before_removal) / 2
}

/// `max(10, round(distance / 10))`.
pub fn relocation_cost(distance: f64) -> i64 {
    let fee = (distance / RELOCATION_STUDS_PER_COIN).round();
    if fee.is_finite() {
        (fee as i64).max(MIN_RELOCATION_COST)
    } else {
        MIN_RELOCATION_COST
    }
}

/// Apply one upgrade of `kind` to `business`, recording `paid` as invested.
pub fn apply_upgrade(business: &mut Business, kind: UpgradeKind, paid: i64) {
    match kind {
        UpgradeKind::IncomingCapacity => {
            business.incoming.capacity = business.incoming.capacity.saturating_mul(2);
        }
        UpgradeKind::OutgoingCapacity => {
            business.outgoing.capacity = business.outgoing.capacity.saturating_mul(2);
        }
        UpgradeKind::ProcessingTime => {
            let faster = business.processing_time / Fixed64::from_num(1.5f64);
            business.processing_time = faster.max(Fixed64::DELTA);
        }
    }
    *business.upgrades.get_mut(kind) += 1;
    business.level += 1;
    business.total_invested = business.total_invested.saturating_add(paid);
}

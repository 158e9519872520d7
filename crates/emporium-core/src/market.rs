//! Market price oscillator.
//!
//! Two independent periodic actions act on every resource:
//!
//! - **Retarget** (long period): pick a new target in
//!   `[0.5, 1.5) x base value`.
//! - **Interpolate** (short period): move the displayed value 5% of the way
//!   toward the target. Converges asymptotically and never overshoots.

use crate::fixed::Fixed64;
use crate::resource::{Resource, ResourceValues};
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of the remaining gap closed per interpolation step.
pub fn interpolation_rate() -> Fixed64 {
    Fixed64::from_num(0.05f64)
}

/// Lower bound of the target multiplier.
pub fn target_spread_low() -> Fixed64 {
    Fixed64::from_num(0.5f64)
}

/// Upper bound (exclusive) of the target multiplier.
pub fn target_spread_high() -> Fixed64 {
    Fixed64::from_num(1.5f64)
}

/// Displayed price and the price it is drifting toward. Both non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPriceEntry {
    pub value: Fixed64,
    pub target: Fixed64,
}

impl MarketPriceEntry {
    /// One interpolation step. Returns the applied delta.
    pub fn interpolate(&mut self) -> Fixed64 {
        let delta = (self.target - self.value).saturating_mul(interpolation_rate());
        self.value += delta;
        delta
    }
}

/// Per-resource price table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrices {
    entries: BTreeMap<Resource, MarketPriceEntry>,
}

impl MarketPrices {
    /// Start every resource at its base value, already on target.
    pub fn new(values: &ResourceValues) -> Self {
        let entries = values
            .iter()
            .map(|(r, v)| {
                let base = Fixed64::saturating_from_num(v);
                (
                    r,
                    MarketPriceEntry {
                        value: base,
                        target: base,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, resource: Resource) -> Option<&MarketPriceEntry> {
        self.entries.get(&resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, &MarketPriceEntry)> {
        self.entries.iter().map(|(&r, e)| (r, e))
    }

    /// Draw a fresh target for every resource.
    pub fn retarget(&mut self, values: &ResourceValues, rng: &mut SimRng) {
        for (resource, entry) in self.entries.iter_mut() {
            let base = Fixed64::saturating_from_num(values.value(Some(*resource)));
            let factor = rng.uniform(target_spread_low(), target_spread_high());
            entry.target = base.saturating_mul(factor);
        }
    }

    /// Move every displayed value one step toward its target.
    pub fn interpolate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.interpolate();
        }
    }
}

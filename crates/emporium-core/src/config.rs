//! Economy tuning: every constant a session is built from.
//!
//! [`EconomyConfig`] is plain serde data with human-friendly units (`f64`
//! seconds and studs). It is converted to fixed-point once, when entities
//! are created. Partial files are accepted: missing fields and missing
//! per-kind entries fall back to built-in defaults.

use crate::agent::{AgentSpec, ShippingKind};
use crate::business::{BusinessKind, BusinessSpec, Position};
use crate::cost::UpgradePricing;
use crate::resource::{Resource, default_base_value};
use crate::sim::TimerSchedule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coins a fresh session starts with.
pub const DEFAULT_STARTING_COINS: i64 = 2000;

/// Errors found while validating a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("timer '{timer}' has a zero period")]
    ZeroPeriod { timer: &'static str },
    #[error("{kind:?} has a non-positive processing time {value}")]
    ProcessingTime { kind: BusinessKind, value: f64 },
    #[error("{kind:?} has a zero batch size")]
    ZeroBatch { kind: BusinessKind },
    #[error("{kind:?} batch of {batch} can never fit a {buffer} buffer of {capacity}")]
    BatchExceedsCapacity {
        kind: BusinessKind,
        batch: u32,
        buffer: &'static str,
        capacity: u32,
    },
    #[error("{kind:?} has a non-positive speed {value}")]
    Speed { kind: ShippingKind, value: f64 },
    #[error("{kind:?} has a zero max load")]
    ZeroLoad { kind: ShippingKind },
    #[error("market position is not finite")]
    MarketPosition,
}

/// Complete tuning for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_coins: i64,
    /// Seed for market price targets.
    pub seed: u64,
    pub upgrade_pricing: UpgradePricing,
    pub schedule: TimerSchedule,
    /// Market location as `[x, y]` studs.
    pub market_position: [f64; 2],
    /// Agent handed to every newly placed business for free.
    pub starter_agent: Option<ShippingKind>,
    /// Base values of raw resources.
    pub base_values: BTreeMap<Resource, u32>,
    pub businesses: BTreeMap<BusinessKind, BusinessSpec>,
    pub agents: BTreeMap<ShippingKind, AgentSpec>,
    /// Ring buffer capacity per event kind.
    pub event_history: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_coins: DEFAULT_STARTING_COINS,
            seed: 0x5EED_CAFE,
            upgrade_pricing: UpgradePricing::default(),
            schedule: TimerSchedule::default(),
            market_position: [0.0, 0.0],
            starter_agent: Some(ShippingKind::Cart),
            base_values: Resource::RAW
                .iter()
                .map(|&r| (r, default_base_value(r)))
                .collect(),
            businesses: BusinessKind::PLACEABLE
                .iter()
                .map(|&k| (k, BusinessSpec::default_for(k)))
                .collect(),
            agents: ShippingKind::ALL
                .iter()
                .map(|&k| (k, AgentSpec::default_for(k)))
                .collect(),
            event_history: 256,
        }
    }
}

impl EconomyConfig {
    pub fn business_spec(&self, kind: BusinessKind) -> BusinessSpec {
        self.businesses
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| BusinessSpec::default_for(kind))
    }

    pub fn agent_spec(&self, kind: ShippingKind) -> AgentSpec {
        self.agents
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| AgentSpec::default_for(kind))
    }

    pub fn market_position(&self) -> Position {
        Position::new(self.market_position[0], self.market_position[1])
    }

    /// Check every value the engine relies on being positive or bounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.validate()?;

        if !self.market_position.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::MarketPosition);
        }

        for kind in BusinessKind::PLACEABLE {
            let spec = self.business_spec(kind);
            if spec.processing_time.is_nan() || spec.processing_time <= 0.0 {
                return Err(ConfigError::ProcessingTime {
                    kind,
                    value: spec.processing_time,
                });
            }
            if spec.batch_size == 0 {
                return Err(ConfigError::ZeroBatch { kind });
            }
            if spec.batch_size > spec.outgoing_capacity {
                return Err(ConfigError::BatchExceedsCapacity {
                    kind,
                    batch: spec.batch_size,
                    buffer: "outgoing",
                    capacity: spec.outgoing_capacity,
                });
            }
            if kind.role().input().is_some() && spec.batch_size > spec.incoming_capacity {
                return Err(ConfigError::BatchExceedsCapacity {
                    kind,
                    batch: spec.batch_size,
                    buffer: "incoming",
                    capacity: spec.incoming_capacity,
                });
            }
        }

        for kind in ShippingKind::ALL {
            let spec = self.agent_spec(kind);
            if spec.speed.is_nan() || spec.speed <= 0.0 {
                return Err(ConfigError::Speed {
                    kind,
                    value: spec.speed,
                });
            }
            if spec.max_load == 0 {
                return Err(ConfigError::ZeroLoad { kind });
            }
        }

        Ok(())
    }
}

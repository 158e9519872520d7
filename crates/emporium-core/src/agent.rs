//! Delivery agents: the shipping units each business owns.

use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{AgentId, BusinessId};
use serde::{Deserialize, Serialize};

/// The kind of shipping unit. Determines load, speed, and hire cost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ShippingKind {
    Cart,
    Truck,
    Drone,
}

impl ShippingKind {
    pub const ALL: [ShippingKind; 3] = [
        ShippingKind::Cart,
        ShippingKind::Truck,
        ShippingKind::Drone,
    ];
}

/// Tunable parameters for one shipping kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub max_load: u32,
    /// Travel speed in studs per second.
    pub speed: f64,
    pub base_cost: u32,
}

impl AgentSpec {
    pub fn default_for(kind: ShippingKind) -> Self {
        match kind {
            ShippingKind::Cart => Self {
                max_load: 5,
                speed: 8.0,
                base_cost: 50,
            },
            ShippingKind::Truck => Self {
                max_load: 20,
                speed: 12.0,
                base_cost: 200,
            },
            ShippingKind::Drone => Self {
                max_load: 10,
                speed: 20.0,
                base_cost: 400,
            },
        }
    }
}

/// A shipping unit owned by exactly one business.
///
/// Invariant: an idle agent carries nothing and has no target; a loaded
/// agent is always delivering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAgent {
    pub id: AgentId,
    pub max_load: u32,
    /// Studs per second. Always positive.
    pub speed: Fixed64,
    pub is_delivering: bool,
    pub target: Option<BusinessId>,
    pub current_load: u32,
}

impl DeliveryAgent {
    pub fn new(id: AgentId, spec: &AgentSpec) -> Self {
        let speed = f64_to_fixed64(spec.speed).max(Fixed64::DELTA);
        Self {
            id,
            max_load: spec.max_load.max(1),
            speed,
            is_delivering: false,
            target: None,
            current_load: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_delivering
    }

    /// Mark the agent as carrying `load` towards `target`.
    pub fn depart(&mut self, target: BusinessId, load: u32) {
        self.is_delivering = true;
        self.target = Some(target);
        self.current_load = load;
    }

    /// Return the agent to the idle state.
    pub fn release(&mut self) {
        self.is_delivering = false;
        self.target = None;
        self.current_load = 0;
    }

    /// Whether the idle/loaded invariant holds.
    pub fn is_consistent(&self) -> bool {
        if self.is_delivering {
            self.target.is_some()
        } else {
            self.current_load == 0 && self.target.is_none()
        }
    }
}

/// All agents of one kind owned by a business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingGroup {
    pub kind: ShippingKind,
    pub agents: Vec<DeliveryAgent>,
}

//! Business entities: kinds, roles, buffers, and per-business fleet.

use crate::agent::{DeliveryAgent, ShippingGroup, ShippingKind};
use crate::fixed::{Fixed64, f64_to_fixed64, fixed64_to_f64};
use crate::id::{AgentId, BusinessId};
use crate::resource::Resource;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A point on the 2D placement plane, in studs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: f64_to_fixed64(x),
            y: f64_to_fixed64(y),
        }
    }

    /// Euclidean distance in studs. Computed in f64 so large coordinates
    /// cannot overflow the squared terms.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = fixed64_to_f64(self.x) - fixed64_to_f64(other.x);
        let dy = fixed64_to_f64(self.y) - fixed64_to_f64(other.y);
        dx.hypot(dy)
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Bounded storage. Invariant: `current <= capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Buffer {
    pub current: u32,
    pub capacity: u32,
}

impl Buffer {
    pub fn empty(capacity: u32) -> Self {
        Self {
            current: 0,
            capacity,
        }
    }

    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.current)
    }

    pub fn has_room_for(&self, amount: u32) -> bool {
        self.free() >= amount
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.capacity
    }

    /// Add up to `amount`, returning what did not fit.
    #[must_use = "overflow count indicates units that did not fit"]
    pub fn fill(&mut self, amount: u32) -> u32 {
        let accepted = amount.min(self.free());
        self.current += accepted;
        amount - accepted
    }

    /// Remove up to `amount`, returning what was actually taken.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn take(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.current);
        self.current -= taken;
        taken
    }
}

// ---------------------------------------------------------------------------
// Kinds and roles
// ---------------------------------------------------------------------------

/// The fixed enumeration of business kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BusinessKind {
    Forest,
    Mine,
    Farm,
    Sawmill,
    Smelter,
    Mill,
    Workshop,
    Forge,
    Bakery,
    Market,
}

/// What a business does with resources. Dispatches via enum match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessRole {
    /// Produces from nothing.
    Gathering { output: Resource },
    /// Turns a raw resource into a processed one.
    Processing { input: Resource, output: Resource },
    /// Turns a processed resource into a finished good.
    Shop { input: Resource, output: Resource },
    /// Accepts everything, produces nothing, never fills up.
    Market,
}

impl BusinessRole {
    pub fn input(self) -> Option<Resource> {
        match self {
            BusinessRole::Gathering { .. } | BusinessRole::Market => None,
            BusinessRole::Processing { input, .. } | BusinessRole::Shop { input, .. } => {
                Some(input)
            }
        }
    }

    pub fn output(self) -> Option<Resource> {
        match self {
            BusinessRole::Gathering { output }
            | BusinessRole::Processing { output, .. }
            | BusinessRole::Shop { output, .. } => Some(output),
            BusinessRole::Market => None,
        }
    }
}

impl BusinessKind {
    /// Kinds a player can place. The market is created with the session.
    pub const PLACEABLE: [BusinessKind; 9] = [
        BusinessKind::Forest,
        BusinessKind::Mine,
        BusinessKind::Farm,
        BusinessKind::Sawmill,
        BusinessKind::Smelter,
        BusinessKind::Mill,
        BusinessKind::Workshop,
        BusinessKind::Forge,
        BusinessKind::Bakery,
    ];

    pub fn role(self) -> BusinessRole {
        use Resource::*;
        match self {
            BusinessKind::Forest => BusinessRole::Gathering { output: Wood },
            BusinessKind::Mine => BusinessRole::Gathering { output: Ore },
            BusinessKind::Farm => BusinessRole::Gathering { output: Wheat },
            BusinessKind::Sawmill => BusinessRole::Processing {
                input: Wood,
                output: Planks,
            },
            BusinessKind::Smelter => BusinessRole::Processing {
                input: Ore,
                output: Metal,
            },
            BusinessKind::Mill => BusinessRole::Processing {
                input: Wheat,
                output: Flour,
            },
            BusinessKind::Workshop => BusinessRole::Shop {
                input: Planks,
                output: Furniture,
            },
            BusinessKind::Forge => BusinessRole::Shop {
                input: Metal,
                output: Tools,
            },
            BusinessKind::Bakery => BusinessRole::Shop {
                input: Flour,
                output: Bread,
            },
            BusinessKind::Market => BusinessRole::Market,
        }
    }

    pub fn is_placeable(self) -> bool {
        self != BusinessKind::Market
    }
}

/// Tunable parameters for one business kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSpec {
    pub base_cost: u32,
    /// Seconds per batch.
    pub processing_time: f64,
    pub batch_size: u32,
    pub incoming_capacity: u32,
    pub outgoing_capacity: u32,
}

impl BusinessSpec {
    pub fn default_for(kind: BusinessKind) -> Self {
        let (base_cost, processing_time) = match kind {
            BusinessKind::Forest | BusinessKind::Farm => (100, 5.0),
            BusinessKind::Mine => (150, 5.0),
            BusinessKind::Sawmill | BusinessKind::Mill => (250, 8.0),
            BusinessKind::Smelter => (350, 8.0),
            BusinessKind::Workshop | BusinessKind::Bakery => (600, 12.0),
            BusinessKind::Forge => (800, 12.0),
            BusinessKind::Market => (0, 1.0),
        };
        Self {
            base_cost,
            processing_time,
            batch_size: 10,
            incoming_capacity: 50,
            outgoing_capacity: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Upgrades
// ---------------------------------------------------------------------------

/// The three upgrade tracks a business can buy into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum UpgradeKind {
    IncomingCapacity,
    ProcessingTime,
    OutgoingCapacity,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 3] = [
        UpgradeKind::IncomingCapacity,
        UpgradeKind::ProcessingTime,
        UpgradeKind::OutgoingCapacity,
    ];
}

/// Per-track upgrade counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Upgrades {
    pub incoming_capacity: u32,
    pub processing_time: u32,
    pub outgoing_capacity: u32,
}

impl Upgrades {
    pub fn get(&self, kind: UpgradeKind) -> u32 {
        match kind {
            UpgradeKind::IncomingCapacity => self.incoming_capacity,
            UpgradeKind::ProcessingTime => self.processing_time,
            UpgradeKind::OutgoingCapacity => self.outgoing_capacity,
        }
    }

    pub fn get_mut(&mut self, kind: UpgradeKind) -> &mut u32 {
        match kind {
            UpgradeKind::IncomingCapacity => &mut self.incoming_capacity,
            UpgradeKind::ProcessingTime => &mut self.processing_time,
            UpgradeKind::OutgoingCapacity => &mut self.outgoing_capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Business
// ---------------------------------------------------------------------------

/// Capacity reserved on a target for a shipment that has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelivery {
    pub source: BusinessId,
    pub amount: u32,
    pub resource: Resource,
}

/// A producing (or, for the market, consuming) entity on the plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub kind: BusinessKind,
    pub position: Position,
    pub incoming: Buffer,
    pub outgoing: Buffer,
    /// Seconds per batch. Always positive.
    pub processing_time: Fixed64,
    pub batch_size: u32,
    /// Fraction of the current batch completed, in [0, 1).
    pub progress: Fixed64,
    pub shipping: Vec<ShippingGroup>,
    pub pending: Vec<PendingDelivery>,
    pub level: u32,
    pub upgrades: Upgrades,
    pub total_invested: i64,
    /// Transient UI value: revenue credited during the display window.
    pub recent_profit: i64,
    /// Remaining display window for `recent_profit`.
    pub profit_display_ms: u64,
}

impl Business {
    /// Build a fresh business from its spec, with an empty fleet.
    pub fn new(
        id: BusinessId,
        kind: BusinessKind,
        position: Position,
        spec: &BusinessSpec,
    ) -> Self {
        Self {
            id,
            kind,
            position,
            incoming: Buffer::empty(spec.incoming_capacity),
            outgoing: Buffer::empty(spec.outgoing_capacity),
            processing_time: f64_to_fixed64(spec.processing_time).max(Fixed64::DELTA),
            batch_size: spec.batch_size.max(1),
            progress: Fixed64::ZERO,
            shipping: Vec::new(),
            pending: Vec::new(),
            level: 1,
            upgrades: Upgrades::default(),
            total_invested: 0,
            recent_profit: 0,
            profit_display_ms: 0,
        }
    }

    pub fn role(&self) -> BusinessRole {
        self.kind.role()
    }

    pub fn input_resource(&self) -> Option<Resource> {
        self.role().input()
    }

    pub fn output_resource(&self) -> Option<Resource> {
        self.role().output()
    }

    pub fn is_market(&self) -> bool {
        matches!(self.role(), BusinessRole::Market)
    }

    /// Total capacity reserved by in-flight shipments.
    pub fn reserved_incoming(&self) -> u32 {
        self.pending.iter().map(|p| p.amount).fold(0, u32::saturating_add)
    }

    /// Incoming space left after honouring every reservation.
    pub fn unreserved_incoming(&self) -> u32 {
        self.incoming.free().saturating_sub(self.reserved_incoming())
    }

    /// Remove the first reservation matching source, amount, and resource.
    pub fn release_reservation(
        &mut self,
        source: BusinessId,
        amount: u32,
        resource: Resource,
    ) -> bool {
        match self
            .pending
            .iter()
            .position(|p| p.source == source && p.amount == amount && p.resource == resource)
        {
            Some(idx) => {
                self.pending.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &DeliveryAgent> {
        self.shipping.iter().flat_map(|g| g.agents.iter())
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut DeliveryAgent> {
        self.shipping
            .iter_mut()
            .flat_map(|g| g.agents.iter_mut())
            .find(|a| a.id == id)
    }

    pub fn agent_count(&self, kind: ShippingKind) -> u32 {
        self.shipping
            .iter()
            .filter(|g| g.kind == kind)
            .map(|g| g.agents.len() as u32)
            .sum()
    }

    /// The group for `kind`, created at the end of the list if missing.
    pub fn group_mut(&mut self, kind: ShippingKind) -> &mut ShippingGroup {
        let idx = match self.shipping.iter().position(|g| g.kind == kind) {
            Some(idx) => idx,
            None => {
                self.shipping.push(ShippingGroup {
                    kind,
                    agents: Vec::new(),
                });
                self.shipping.len() - 1
            }
        };
        &mut self.shipping[idx]
    }

    /// Whether both buffers respect their bounds.
    pub fn buffers_within_bounds(&self) -> bool {
        self.incoming.current <= self.incoming.capacity
            && self.outgoing.current <= self.outgoing.capacity
    }
}

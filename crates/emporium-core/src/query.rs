//! Read-only query API for inspecting simulation state.
//!
//! Provides owned snapshot types for rendering and UI collaborators. Nothing
//! here borrows into the engine beyond the call.

use crate::business::{Buffer, Business, BusinessKind, Position, Upgrades};
use crate::fixed::{Fixed64, Millis};
use crate::id::{BusinessId, DeliveryId};
use crate::production::{ProductionStatus, production_status};
use crate::resource::Resource;
use crate::state::{ActiveDelivery, GameState};

// ---------------------------------------------------------------------------
// Buffer views
// ---------------------------------------------------------------------------

/// Fill level as a percentage in [0, 100]. A zero-capacity buffer is full.
pub fn fill_percentage(buffer: &Buffer) -> Fixed64 {
    if buffer.capacity == 0 {
        return Fixed64::from_num(100);
    }
    let current = Fixed64::saturating_from_num(buffer.current.min(buffer.capacity));
    let capacity = Fixed64::saturating_from_num(buffer.capacity);
    current
        .saturating_mul(Fixed64::from_num(100))
        .saturating_div(capacity)
        .min(Fixed64::from_num(100))
}

/// Coarse buffer status for colour-coding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BufferTier {
    Empty,
    /// Below a quarter full.
    Low,
    Healthy,
    Full,
}

impl BufferTier {
    pub fn of(buffer: &Buffer) -> Self {
        if buffer.is_full() {
            BufferTier::Full
        } else if buffer.current == 0 {
            BufferTier::Empty
        } else if fill_percentage(buffer) < Fixed64::from_num(25) {
            BufferTier::Low
        } else {
            BufferTier::Healthy
        }
    }
}

// ---------------------------------------------------------------------------
// Business snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single business.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessSnapshot {
    pub id: BusinessId,
    pub kind: BusinessKind,
    pub position: Position,
    pub input: Option<Resource>,
    pub output: Option<Resource>,
    pub incoming: Buffer,
    pub outgoing: Buffer,
    pub incoming_fill: Fixed64,
    pub outgoing_fill: Fixed64,
    pub incoming_tier: BufferTier,
    pub outgoing_tier: BufferTier,
    /// Incoming capacity held by shipments still on the road.
    pub reserved_incoming: u32,
    /// Batch progress as a 0..1 fraction.
    pub progress: Fixed64,
    pub status: ProductionStatus,
    pub agents_total: u32,
    pub agents_delivering: u32,
    pub level: u32,
    pub upgrades: Upgrades,
    pub total_invested: i64,
    pub recent_profit: i64,
}

impl BusinessSnapshot {
    pub fn of(business: &Business) -> Self {
        let agents_total = business.agents().count() as u32;
        let agents_delivering = business.agents().filter(|a| a.is_delivering).count() as u32;
        Self {
            id: business.id,
            kind: business.kind,
            position: business.position,
            input: business.input_resource(),
            output: business.output_resource(),
            incoming: business.incoming,
            outgoing: business.outgoing,
            incoming_fill: fill_percentage(&business.incoming),
            outgoing_fill: fill_percentage(&business.outgoing),
            incoming_tier: BufferTier::of(&business.incoming),
            outgoing_tier: BufferTier::of(&business.outgoing),
            reserved_incoming: business.reserved_incoming(),
            progress: business.progress,
            status: production_status(business),
            agents_total,
            agents_delivering,
            level: business.level,
            upgrades: business.upgrades,
            total_invested: business.total_invested,
            recent_profit: business.recent_profit,
        }
    }
}

/// Snapshots of every business in registry order.
pub fn snapshot_all(state: &GameState) -> Vec<BusinessSnapshot> {
    state.businesses.iter().map(BusinessSnapshot::of).collect()
}

pub fn snapshot_business(state: &GameState, id: BusinessId) -> Option<BusinessSnapshot> {
    state.business(id).map(BusinessSnapshot::of)
}

// ---------------------------------------------------------------------------
// Delivery and market views
// ---------------------------------------------------------------------------

/// Travel completed as a 0..1 fraction at `now`, for animating agents.
pub fn delivery_progress(delivery: &ActiveDelivery, now: Millis) -> Fixed64 {
    if delivery.travel_time_ms == 0 || delivery.is_due(now) {
        return Fixed64::ONE;
    }
    let elapsed = now.saturating_sub(delivery.created_at_ms);
    Fixed64::saturating_from_num(elapsed)
        .saturating_div(Fixed64::saturating_from_num(delivery.travel_time_ms))
        .min(Fixed64::ONE)
}

/// An in-flight delivery with its travel progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliverySnapshot {
    pub id: DeliveryId,
    pub source: BusinessId,
    pub target: BusinessId,
    pub resource: Resource,
    pub amount: u32,
    pub expected_arrival_ms: Millis,
    pub progress: Fixed64,
}

/// In-flight deliveries in dispatch order.
pub fn snapshot_deliveries(state: &GameState) -> Vec<DeliverySnapshot> {
    state
        .deliveries_in_order()
        .into_iter()
        .map(|(id, d)| DeliverySnapshot {
            id,
            source: d.source,
            target: d.target,
            resource: d.resource,
            amount: d.amount,
            expected_arrival_ms: d.expected_arrival_ms,
            progress: delivery_progress(d, state.now_ms),
        })
        .collect()
}

/// Displayed market value per resource.
pub fn market_prices(state: &GameState) -> Vec<(Resource, Fixed64)> {
    state.market.iter().map(|(r, e)| (r, e.value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(current: u32, capacity: u32) -> Buffer {
        Buffer { current, capacity }
    }

    #[test]
    fn fill_percentage_bounds() {
        assert_eq!(fill_percentage(&buf(0, 50)), Fixed64::ZERO);
        assert_eq!(fill_percentage(&buf(25, 50)), Fixed64::from_num(50));
        assert_eq!(fill_percentage(&buf(50, 50)), Fixed64::from_num(100));
        assert_eq!(fill_percentage(&buf(0, 0)), Fixed64::from_num(100));
    }

    #[test]
    fn tiers() {
        assert_eq!(BufferTier::of(&buf(0, 40)), BufferTier::Empty);
        assert_eq!(BufferTier::of(&buf(9, 40)), BufferTier::Low);
        assert_eq!(BufferTier::of(&buf(10, 40)), BufferTier::Healthy);
        assert_eq!(BufferTier::of(&buf(39, 40)), BufferTier::Healthy);
        assert_eq!(BufferTier::of(&buf(40, 40)), BufferTier::Full);
    }

    #[test]
    fn delivery_progress_is_clamped() {
        use crate::agent::{AgentSpec, DeliveryAgent, ShippingKind};
        use crate::id::AgentId;
        let d = ActiveDelivery {
            sequence: 0,
            source: BusinessId(1),
            target: BusinessId(0),
            agent: DeliveryAgent::new(AgentId(0), &AgentSpec::default_for(ShippingKind::Cart)),
            amount: 5,
            resource: Resource::Wood,
            created_at_ms: 1_000,
            expected_arrival_ms: 3_000,
            travel_time_ms: 2_000,
        };
        assert_eq!(delivery_progress(&d, 1_000), Fixed64::ZERO);
        assert_eq!(delivery_progress(&d, 2_000), Fixed64::from_num(0.5f64));
        assert_eq!(delivery_progress(&d, 9_000), Fixed64::ONE);
    }

    #[test]
    fn market_prices_track_the_displayed_value() {
        use crate::config::EconomyConfig;
        use crate::resource::ResourceValues;
        use crate::rng::SimRng;

        let values = ResourceValues::default();
        let mut state = GameState::new_session(&EconomyConfig::default(), &values);

        let prices = market_prices(&state);
        assert_eq!(prices.len(), Resource::ALL.len());
        for (resource, price) in &prices {
            assert_eq!(*price, Fixed64::from_num(values.value(Some(*resource))));
        }

        let mut rng = SimRng::new(7);
        state.market.retarget(&values, &mut rng);
        state.market.interpolate();

        for (resource, price) in market_prices(&state) {
            let entry = state.market.get(resource).copied().unwrap();
            assert_eq!(price, entry.value);
            let base = Fixed64::from_num(values.value(Some(resource)));
            assert!((entry.target - price).abs() <= (entry.target - base).abs());
        }
    }
}

//! The session aggregate: money, the business registry, and in-flight
//! deliveries.
//!
//! [`GameState`] is plain data. The engine holds it behind an `Arc` and
//! mutates it copy-on-write, so a snapshot handed to a collaborator never
//! changes underneath it.

use crate::agent::{DeliveryAgent, ShippingKind};
use crate::business::{Business, BusinessKind, BusinessSpec, Position};
use crate::config::EconomyConfig;
use crate::fixed::Millis;
use crate::id::{AgentId, BusinessId, DeliveryId};
use crate::market::MarketPrices;
use crate::resource::{Resource, ResourceValues};
use crate::rng::SimRng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// A shipment in transit. Owned by the state, not by either business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveDelivery {
    /// Dispatch order; breaks ties between equal arrival times.
    pub sequence: u64,
    pub source: BusinessId,
    pub target: BusinessId,
    /// Copy of the agent as it departed.
    pub agent: DeliveryAgent,
    pub amount: u32,
    pub resource: Resource,
    pub created_at_ms: Millis,
    pub expected_arrival_ms: Millis,
    pub travel_time_ms: Millis,
}

impl ActiveDelivery {
    pub fn is_due(&self, now: Millis) -> bool {
        self.expected_arrival_ms <= now
    }
}

/// Everything one session owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Negative only after an external charge; see [`GameState::is_bankrupt`].
    pub coins: i64,
    /// Registry order. The market is always first.
    pub businesses: Vec<Business>,
    pub active_deliveries: SlotMap<DeliveryId, ActiveDelivery>,
    pub market: MarketPrices,
    /// Collaborator-owned flags.
    pub achievements: BTreeMap<String, bool>,
    pub now_ms: Millis,
    /// Main ticks run so far.
    pub tick: u64,
    pub rng: SimRng,
    market_id: BusinessId,
    next_business_id: u32,
    next_agent_id: u32,
    next_sequence: u64,
}

impl GameState {
    /// A fresh session: starting coins, the market, and nothing else.
    pub fn new_session(config: &EconomyConfig, values: &ResourceValues) -> Self {
        let market_id = BusinessId(0);
        let market = Business::new(
            market_id,
            BusinessKind::Market,
            config.market_position(),
            &BusinessSpec::default_for(BusinessKind::Market),
        );
        Self {
            coins: config.starting_coins,
            businesses: vec![market],
            active_deliveries: SlotMap::with_key(),
            market: MarketPrices::new(values),
            achievements: BTreeMap::new(),
            now_ms: 0,
            tick: 0,
            rng: SimRng::new(config.seed),
            market_id,
            next_business_id: 1,
            next_agent_id: 0,
            next_sequence: 0,
        }
    }

    pub fn market_id(&self) -> BusinessId {
        self.market_id
    }

    pub fn is_bankrupt(&self) -> bool {
        self.coins < 0
    }

    pub fn business(&self, id: BusinessId) -> Option<&Business> {
        self.businesses.iter().find(|b| b.id == id)
    }

    pub fn business_mut(&mut self, id: BusinessId) -> Option<&mut Business> {
        self.businesses.iter_mut().find(|b| b.id == id)
    }

    pub fn business_index(&self, id: BusinessId) -> Option<usize> {
        self.businesses.iter().position(|b| b.id == id)
    }

    /// Owned businesses of one kind.
    pub fn count_of(&self, kind: BusinessKind) -> u32 {
        self.businesses.iter().filter(|b| b.kind == kind).count() as u32
    }

    /// Append a new business and return its id.
    pub(crate) fn insert_business(
        &mut self,
        kind: BusinessKind,
        position: Position,
        spec: &BusinessSpec,
    ) -> BusinessId {
        let id = BusinessId(self.next_business_id);
        self.next_business_id += 1;
        self.businesses.push(Business::new(id, kind, position, spec));
        id
    }

    /// Allocate a session-unique agent id.
    pub(crate) fn allocate_agent_id(&mut self) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        id
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// The in-flight delivery carried by `agent`, if any.
    pub fn delivery_for_agent(&self, agent: AgentId) -> Option<DeliveryId> {
        self.active_deliveries
            .iter()
            .find(|(_, d)| d.agent.id == agent)
            .map(|(id, _)| id)
    }

    /// In-flight deliveries in dispatch order.
    pub fn deliveries_in_order(&self) -> Vec<(DeliveryId, &ActiveDelivery)> {
        let mut list: Vec<_> = self.active_deliveries.iter().collect();
        list.sort_by_key(|(_, d)| d.sequence);
        list
    }

    /// Hire an agent of `kind` onto `business` without charging for it.
    pub(crate) fn add_agent(
        &mut self,
        business: BusinessId,
        kind: ShippingKind,
        config: &EconomyConfig,
    ) -> Option<AgentId> {
        let idx = self.business_index(business)?;
        let id = self.allocate_agent_id();
        let agent = DeliveryAgent::new(id, &config.agent_spec(kind));
        self.businesses[idx].group_mut(kind).agents.push(agent);
        Some(id)
    }
}

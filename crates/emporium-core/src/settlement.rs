//! Delivery settlement: resolves shipments whose travel time has elapsed.
//!
//! The market is an infinite sink paying half price. A business target pays
//! full price but only if the cargo still fits; otherwise the cargo and the
//! revenue are lost (a capacity race, reported but never an error).

use crate::event::{Event, EventBus};
use crate::fixed::Millis;
use crate::id::DeliveryId;
use crate::production::credit_profit;
use crate::resource::{Resource, ResourceValues};
use crate::state::{ActiveDelivery, GameState};

/// Revenue multiplier for a sale to a business.
pub const BUSINESS_SALE_MULTIPLIER: i64 = 10;

/// Revenue multiplier for a sale to the market (half of a business sale).
pub const MARKET_SALE_MULTIPLIER: i64 = 5;

/// Coins earned for `amount` units of `resource`.
pub fn revenue_for(
    values: &ResourceValues,
    resource: Resource,
    amount: u32,
    to_market: bool,
) -> i64 {
    let multiplier = if to_market {
        MARKET_SALE_MULTIPLIER
    } else {
        BUSINESS_SALE_MULTIPLIER
    };
    i64::from(amount)
        .saturating_mul(i64::from(values.value(Some(resource))))
        .saturating_mul(multiplier)
}

/// How one delivery was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Sold { revenue: i64 },
    Dropped,
    TargetMissing,
}

/// Settlement phase of the main tick. Due deliveries resolve in
/// `(expected_arrival, dispatch sequence)` order.
pub fn run(state: &mut GameState, values: &ResourceValues, bus: &mut EventBus) {
    let now = state.now_ms;
    let mut due: Vec<(Millis, u64, DeliveryId)> = state
        .active_deliveries
        .iter()
        .filter(|(_, d)| d.is_due(now))
        .map(|(id, d)| (d.expected_arrival_ms, d.sequence, id))
        .collect();
    due.sort_unstable_by_key(|&(arrival, seq, _)| (arrival, seq));

    for (_, _, id) in due {
        if let Some(delivery) = state.active_deliveries.remove(id) {
            settle(state, values, id, delivery, bus);
        }
    }
}

/// Resolve one delivery that has already been removed from the state.
pub fn settle(
    state: &mut GameState,
    values: &ResourceValues,
    id: DeliveryId,
    delivery: ActiveDelivery,
    bus: &mut EventBus,
) -> Settlement {
    let at_ms = state.now_ms;
    let outcome = match state.business_mut(delivery.target) {
        None => {
            tracing::debug!(
                target: "emporium::settlement",
                target_business = %delivery.target,
                "delivery target no longer exists"
            );
            Settlement::TargetMissing
        }
        Some(target) => {
            target.release_reservation(delivery.source, delivery.amount, delivery.resource);
            if target.is_market() {
                Settlement::Sold {
                    revenue: revenue_for(values, delivery.resource, delivery.amount, true),
                }
            } else if target.incoming.has_room_for(delivery.amount) {
                let overflow = target.incoming.fill(delivery.amount);
                debug_assert_eq!(overflow, 0);
                Settlement::Sold {
                    revenue: revenue_for(values, delivery.resource, delivery.amount, false),
                }
            } else {
                Settlement::Dropped
            }
        }
    };

    match outcome {
        Settlement::Sold { revenue } => {
            state.coins = state.coins.saturating_add(revenue);
            if let Some(source) = state.business_mut(delivery.source) {
                credit_profit(source, revenue);
            }
            tracing::debug!(
                target: "emporium::settlement",
                source = %delivery.source,
                target_business = %delivery.target,
                resource = delivery.resource.name(),
                amount = delivery.amount,
                revenue,
                "delivery settled"
            );
            bus.emit(Event::DeliverySettled {
                delivery: id,
                source: delivery.source,
                target: delivery.target,
                resource: delivery.resource,
                amount: delivery.amount,
                revenue,
                at_ms,
            });
        }
        Settlement::Dropped => {
            tracing::warn!(
                target: "emporium::settlement",
                source = %delivery.source,
                target_business = %delivery.target,
                resource = delivery.resource.name(),
                amount = delivery.amount,
                "target full on arrival, cargo lost"
            );
            bus.emit(Event::DeliveryDropped {
                delivery: id,
                source: delivery.source,
                target: delivery.target,
                resource: delivery.resource,
                amount: delivery.amount,
                at_ms,
            });
        }
        Settlement::TargetMissing => {}
    }

    release_agent(state, &delivery);
    outcome
}

/// Cancel an in-flight delivery: release its reservation, put as much cargo
/// as fits back into the source, and idle the agent if it still exists.
///
/// Returns `(returned, lost)` unit counts, or `None` if `id` is unknown.
pub fn cancel_delivery(
    state: &mut GameState,
    id: DeliveryId,
    bus: &mut EventBus,
) -> Option<(u32, u32)> {
    let delivery = state.active_deliveries.remove(id)?;
    if let Some(target) = state.business_mut(delivery.target) {
        target.release_reservation(delivery.source, delivery.amount, delivery.resource);
    }

    let (returned, lost) = match state.business_mut(delivery.source) {
        Some(source) => {
            let lost = source.outgoing.fill(delivery.amount);
            (delivery.amount - lost, lost)
        }
        None => (0, delivery.amount),
    };
    release_agent(state, &delivery);

    tracing::warn!(
        target: "emporium::settlement",
        source = %delivery.source,
        target_business = %delivery.target,
        agent = %delivery.agent.id,
        returned,
        lost,
        "delivery cancelled"
    );
    bus.emit(Event::DeliveryCancelled {
        delivery: id,
        source: delivery.source,
        target: delivery.target,
        agent: delivery.agent.id,
        returned,
        lost,
        at_ms: state.now_ms,
    });
    Some((returned, lost))
}

fn release_agent(state: &mut GameState, delivery: &ActiveDelivery) {
    if let Some(agent) = state
        .business_mut(delivery.source)
        .and_then(|b| b.agent_mut(delivery.agent.id))
    {
        agent.release();
    }
}

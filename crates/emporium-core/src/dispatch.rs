//! Delivery dispatcher: sends idle agents out with stored output.
//!
//! Candidate targets for a source are every other business whose input is
//! the source's output, in registry order, followed by the market. The first
//! candidate with enough unreserved incoming space wins; the market always
//! accepts. Capacity on a business target is reserved at departure so later
//! dispatches cannot over-commit it.

use crate::business::{Business, PendingDelivery};
use crate::event::{Event, EventBus};
use crate::fixed::{Millis, fixed64_to_f64};
use crate::id::{AgentId, BusinessId};
use crate::resource::Resource;
use crate::state::{ActiveDelivery, GameState};
use std::collections::BTreeSet;

/// Seconds of travel per (stud / speed).
pub const TRAVEL_TIME_FACTOR: f64 = 10.0 / 3.0;

/// Travel time in whole milliseconds for `distance` studs at `speed`.
pub fn travel_time_ms(distance: f64, speed: f64) -> Millis {
    if speed <= 0.0 {
        return Millis::MAX;
    }
    let ms = (distance / speed * TRAVEL_TIME_FACTOR * 1000.0).round();
    if ms.is_finite() && ms > 0.0 {
        ms.min(Millis::MAX as f64) as Millis
    } else {
        0
    }
}

/// Indices of the businesses that accept `output`, excluding `source`, with
/// the market last.
pub fn candidate_targets(businesses: &[Business], source: usize, output: Resource) -> Vec<usize> {
    let mut candidates: Vec<usize> = businesses
        .iter()
        .enumerate()
        .filter(|(i, b)| *i != source && b.input_resource() == Some(output))
        .map(|(i, _)| i)
        .collect();
    candidates.extend(
        businesses
            .iter()
            .enumerate()
            .filter(|(i, b)| *i != source && b.is_market())
            .map(|(i, _)| i),
    );
    candidates
}

/// First candidate that can take `amount` right now.
pub fn select_target(businesses: &[Business], candidates: &[usize], amount: u32) -> Option<usize> {
    candidates.iter().copied().find(|&i| {
        let b = &businesses[i];
        b.is_market() || b.unreserved_incoming() >= amount
    })
}

/// Dispatch phase of the main tick.
pub fn run(state: &mut GameState, bus: &mut EventBus) {
    let at_ms = state.now_ms;
    let in_flight: BTreeSet<AgentId> = state
        .active_deliveries
        .values()
        .map(|d| d.agent.id)
        .collect();

    for source_idx in 0..state.businesses.len() {
        let Some(output) = state.businesses[source_idx].output_resource() else {
            continue;
        };
        let candidates = candidate_targets(&state.businesses, source_idx, output);

        // Snapshot the idle roster; agents are addressed by id below.
        let idle: Vec<AgentId> = state.businesses[source_idx]
            .agents()
            .filter(|a| a.is_idle() && !in_flight.contains(&a.id))
            .map(|a| a.id)
            .collect();

        for agent_id in idle {
            let source = &state.businesses[source_idx];
            let available = source.outgoing.current;
            if available == 0 {
                break;
            }
            let Some(agent) = source.agents().find(|a| a.id == agent_id) else {
                continue;
            };
            let amount = agent.max_load.min(available);
            let speed = fixed64_to_f64(agent.speed);

            let Some(target_idx) = select_target(&state.businesses, &candidates, amount) else {
                tracing::trace!(
                    target: "emporium::dispatch",
                    source = %source.id,
                    amount,
                    "no target has room"
                );
                break;
            };

            let source_id = source.id;
            let source_pos = source.position;
            let target = &mut state.businesses[target_idx];
            let target_id = target.id;
            let distance = source_pos.distance(&target.position);
            if !target.is_market() {
                target.pending.push(PendingDelivery {
                    source: source_id,
                    amount,
                    resource: output,
                });
            }

            let source = &mut state.businesses[source_idx];
            let taken = source.outgoing.take(amount);
            debug_assert_eq!(taken, amount);
            let Some(agent) = source.agent_mut(agent_id) else {
                continue;
            };
            agent.depart(target_id, amount);
            let snapshot = agent.clone();

            let travel = travel_time_ms(distance, speed);
            let sequence = state.next_sequence();
            let delivery = state.active_deliveries.insert(ActiveDelivery {
                sequence,
                source: source_id,
                target: target_id,
                agent: snapshot,
                amount,
                resource: output,
                created_at_ms: at_ms,
                expected_arrival_ms: at_ms.saturating_add(travel),
                travel_time_ms: travel,
            });

            tracing::debug!(
                target: "emporium::dispatch",
                source = %source_id,
                target_business = %target_id,
                agent = %agent_id,
                resource = output.name(),
                amount,
                travel_ms = travel,
                "delivery dispatched"
            );
            bus.emit(Event::DeliveryDispatched {
                delivery,
                source: source_id,
                target: target_id,
                agent: agent_id,
                resource: output,
                amount,
                arrival_ms: at_ms.saturating_add(travel),
                at_ms,
            });
        }
    }
}

/// Whether `agent` on `business` is referenced by an in-flight delivery.
pub fn is_in_flight(state: &GameState, business: BusinessId, agent: AgentId) -> bool {
    state
        .active_deliveries
        .values()
        .any(|d| d.source == business && d.agent.id == agent)
}

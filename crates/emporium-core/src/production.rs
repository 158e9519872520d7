//! Production scheduler: per-tick batch progress for every business.
//!
//! Batches are all-or-nothing. A business advances only while its next batch
//! could commit (room in outgoing storage and, for processors and shops,
//! enough input). While stalled, progress is held where it is.

use crate::business::{Business, BusinessRole};
use crate::event::{Event, EventBus};
use crate::fixed::{Fixed64, Millis, millis_to_secs};
use crate::resource::Resource;
use crate::state::GameState;

/// How long a settlement's revenue stays visible on its source.
pub const PROFIT_DISPLAY_MS: Millis = 2_000;

/// Why a business cannot make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StallReason {
    MissingInput,
    OutputFull,
}

/// What a business is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProductionStatus {
    /// The market, which never produces.
    #[default]
    Idle,
    Working,
    Stalled { reason: StallReason },
}

/// Outcome of advancing one business by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionResult {
    pub status: ProductionStatus,
    /// Resource and quantity committed this tick, if a batch completed.
    pub produced: Option<(Resource, u32)>,
}

/// Current status, judged from buffers alone.
pub fn production_status(business: &Business) -> ProductionStatus {
    let batch = business.batch_size;
    match business.role() {
        BusinessRole::Market => ProductionStatus::Idle,
        BusinessRole::Gathering { .. } => {
            if business.outgoing.has_room_for(batch) {
                ProductionStatus::Working
            } else {
                ProductionStatus::Stalled {
                    reason: StallReason::OutputFull,
                }
            }
        }
        BusinessRole::Processing { .. } | BusinessRole::Shop { .. } => {
            if business.incoming.current < batch {
                ProductionStatus::Stalled {
                    reason: StallReason::MissingInput,
                }
            } else if !business.outgoing.has_room_for(batch) {
                ProductionStatus::Stalled {
                    reason: StallReason::OutputFull,
                }
            } else {
                ProductionStatus::Working
            }
        }
    }
}

/// Advance one business by `tick_secs` seconds of work.
pub fn advance_business(business: &mut Business, tick_secs: Fixed64) -> ProductionResult {
    let status = production_status(business);
    if status != ProductionStatus::Working {
        return ProductionResult {
            status,
            produced: None,
        };
    }

    let step = tick_secs.saturating_div(business.processing_time);
    business.progress = business.progress.saturating_add(step);
    if business.progress < Fixed64::ONE {
        return ProductionResult {
            status,
            produced: None,
        };
    }

    let batch = business.batch_size;
    if business.input_resource().is_some() {
        let consumed = business.incoming.take(batch);
        debug_assert_eq!(consumed, batch);
    }
    let overflow = business.outgoing.fill(batch);
    debug_assert_eq!(overflow, 0);
    business.progress = Fixed64::ZERO;

    ProductionResult {
        status,
        produced: business.output_resource().map(|r| (r, batch)),
    }
}

/// Count the profit display window down by one tick.
pub fn decay_profit(business: &mut Business, tick_ms: Millis) {
    if business.profit_display_ms == 0 {
        return;
    }
    business.profit_display_ms = business.profit_display_ms.saturating_sub(tick_ms);
    if business.profit_display_ms == 0 {
        business.recent_profit = 0;
    }
}

/// Record revenue on a business and restart its display window.
pub fn credit_profit(business: &mut Business, revenue: i64) {
    business.recent_profit = business.recent_profit.saturating_add(revenue);
    business.profit_display_ms = PROFIT_DISPLAY_MS;
}

/// Production phase of the main tick.
pub fn run(state: &mut GameState, tick_ms: Millis, bus: &mut EventBus) {
    let tick_secs = millis_to_secs(tick_ms);
    let at_ms = state.now_ms;
    for business in state.businesses.iter_mut() {
        decay_profit(business, tick_ms);
        if business.is_market() {
            continue;
        }
        let result = advance_business(business, tick_secs);
        if let Some((resource, quantity)) = result.produced {
            tracing::debug!(
                target: "emporium::production",
                business = %business.id,
                resource = resource.name(),
                quantity,
                stored = business.outgoing.current,
                "batch committed"
            );
            bus.emit(Event::BatchProduced {
                business: business.id,
                resource,
                quantity,
                at_ms,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::{BusinessKind, BusinessSpec, Position};
    use crate::id::BusinessId;

    fn make(kind: BusinessKind, processing_time: f64, capacity: u32) -> Business {
        let spec = BusinessSpec {
            base_cost: 0,
            processing_time,
            batch_size: 10,
            incoming_capacity: capacity,
            outgoing_capacity: capacity,
        };
        Business::new(BusinessId(1), kind, Position::default(), &spec)
    }

    fn tick() -> Fixed64 {
        millis_to_secs(400)
    }

    // -----------------------------------------------------------------------
    // Test 1: Gathering commits a full batch and then stalls on a full buffer
    // -----------------------------------------------------------------------
    #[test]
    fn gathering_commits_once_then_stalls() {
        let mut forest = make(BusinessKind::Forest, 10.0, 10);
        let mut commits = 0;
        for _ in 0..60 {
            if advance_business(&mut forest, tick()).produced.is_some() {
                commits += 1;
            }
            assert!(forest.progress < Fixed64::ONE);
        }
        assert_eq!(commits, 1);
        assert_eq!(forest.outgoing.current, 10);
        assert_eq!(forest.progress, Fixed64::ZERO);
        assert_eq!(
            production_status(&forest),
            ProductionStatus::Stalled {
                reason: StallReason::OutputFull
            }
        );
    }

    // -----------------------------------------------------------------------
    // Test 2: Commit happens after about processing_time / tick ticks
    // -----------------------------------------------------------------------
    #[test]
    fn commit_timing_matches_processing_time() {
        let mut forest = make(BusinessKind::Forest, 10.0, 50);
        let mut ticks = 0;
        while advance_business(&mut forest, tick()).produced.is_none() {
            ticks += 1;
            assert!(ticks < 100);
        }
        // 10 s at 0.4 s per tick; fixed-point truncation may add one tick.
        assert!((25..=26).contains(&(ticks + 1)), "ticks = {}", ticks + 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: Processing needs input and consumes it atomically
    // -----------------------------------------------------------------------
    #[test]
    fn processing_waits_for_input() {
        let mut mill = make(BusinessKind::Mill, 0.4, 50);
        let r = advance_business(&mut mill, tick());
        assert_eq!(
            r.status,
            ProductionStatus::Stalled {
                reason: StallReason::MissingInput
            }
        );
        assert_eq!(mill.progress, Fixed64::ZERO);

        mill.incoming.current = 15;
        let mut produced = None;
        for _ in 0..3 {
            produced = produced.or(advance_business(&mut mill, tick()).produced);
        }
        assert_eq!(produced, Some((Resource::Flour, 10)));
        assert_eq!(mill.incoming.current, 5);
        assert_eq!(mill.outgoing.current, 10);
    }

    // -----------------------------------------------------------------------
    // Test 4: Stalled business keeps its progress
    // -----------------------------------------------------------------------
    #[test]
    fn stall_holds_progress() {
        let mut sawmill = make(BusinessKind::Sawmill, 10.0, 50);
        sawmill.incoming.current = 10;
        advance_business(&mut sawmill, tick());
        let held = sawmill.progress;
        assert!(held > Fixed64::ZERO);

        sawmill.outgoing.current = 45;
        for _ in 0..10 {
            advance_business(&mut sawmill, tick());
        }
        assert_eq!(sawmill.progress, held);
        assert_eq!(sawmill.incoming.current, 10);
    }

    // -----------------------------------------------------------------------
    // Test 5: Market never produces
    // -----------------------------------------------------------------------
    #[test]
    fn market_is_idle() {
        let market = make(BusinessKind::Market, 1.0, 0);
        assert_eq!(production_status(&market), ProductionStatus::Idle);
    }

    // -----------------------------------------------------------------------
    // Test 6: Profit display decays to zero over two seconds
    // -----------------------------------------------------------------------
    #[test]
    fn profit_display_decays() {
        let mut b = make(BusinessKind::Forest, 5.0, 50);
        credit_profit(&mut b, 250);
        for _ in 0..4 {
            decay_profit(&mut b, 400);
        }
        assert_eq!(b.recent_profit, 250);
        decay_profit(&mut b, 400);
        assert_eq!(b.profit_display_ms, 0);
        assert_eq!(b.recent_profit, 0);
    }
}

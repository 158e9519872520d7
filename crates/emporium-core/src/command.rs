//! Mutation commands issued by collaborators.
//!
//! Every command is validated against the current state before anything is
//! written. A rejected command never touches the state, so the engine's
//! `Arc<GameState>` stays pointer-identical. Accepted commands mutate through
//! `Arc::make_mut`.

use crate::agent::ShippingKind;
use crate::business::{BusinessKind, Position, UpgradeKind};
use crate::config::EconomyConfig;
use crate::cost::{
    agent_hire_cost, agent_sell_refund, apply_upgrade, placement_cost, relocation_cost,
    upgrade_cost,
};
use crate::event::{Event, EventBus};
use crate::id::{AgentId, BusinessId};
use crate::settlement::cancel_delivery;
use crate::state::GameState;
use std::sync::Arc;

/// A state mutation requested from outside the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaceBusiness {
        kind: BusinessKind,
        position: Position,
    },
    UpgradeBusiness {
        business: BusinessId,
        upgrade: UpgradeKind,
    },
    HireAgent {
        business: BusinessId,
        kind: ShippingKind,
    },
    /// Prefers an idle agent; falls back to the last agent of the kind even
    /// if it is mid-delivery, cancelling that delivery.
    SellAgent {
        business: BusinessId,
        kind: ShippingKind,
    },
    RelocateBusiness {
        business: BusinessId,
        position: Position,
    },
    UnlockAchievement {
        name: String,
    },
    /// An external debit (penalty, upkeep). Always applied; may leave the
    /// session bankrupt.
    Charge {
        amount: i64,
    },
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Placed {
        business: BusinessId,
        cost: i64,
    },
    Upgraded {
        business: BusinessId,
        cost: i64,
        level: u32,
    },
    Hired {
        business: BusinessId,
        agent: AgentId,
        cost: i64,
    },
    Sold {
        business: BusinessId,
        agent: AgentId,
        refund: i64,
        forced: bool,
    },
    Relocated {
        business: BusinessId,
        cost: i64,
    },
    Achievement {
        name: String,
        newly_unlocked: bool,
    },
    Charged {
        balance: i64,
    },
}

/// Why a command was refused. The state is unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("business {0} not found")]
    BusinessNotFound(BusinessId),
    #[error("{0:?} cannot be placed, moved, or modified")]
    NotPlaceable(BusinessKind),
    #[error("no {kind:?} agents on business {business}")]
    NoAgents {
        business: BusinessId,
        kind: ShippingKind,
    },
}

impl Rejection {
    /// Whether collaborators get a `CommandRejected` signal for this.
    /// Missing entities are ignored silently.
    pub fn is_signalled(&self) -> bool {
        matches!(
            self,
            Rejection::InsufficientFunds { .. } | Rejection::NotPlaceable(_)
        )
    }
}

fn require_funds(available: i64, needed: i64) -> Result<(), Rejection> {
    if available < needed {
        return Err(Rejection::InsufficientFunds { needed, available });
    }
    Ok(())
}

/// Validate and apply `command`. Emits events for accepted commands and for
/// signalled rejections.
pub fn apply(
    state: &mut Arc<GameState>,
    config: &EconomyConfig,
    command: &Command,
    bus: &mut EventBus,
) -> Result<CommandOutcome, Rejection> {
    let at_ms = state.now_ms;
    let result = apply_inner(state, config, command, bus);
    if let Err(reason) = &result
        && reason.is_signalled()
    {
        bus.emit(Event::CommandRejected {
            reason: reason.clone(),
            at_ms,
        });
    }
    result
}

fn apply_inner(
    state: &mut Arc<GameState>,
    config: &EconomyConfig,
    command: &Command,
    bus: &mut EventBus,
) -> Result<CommandOutcome, Rejection> {
    let at_ms = state.now_ms;
    match command {
        Command::PlaceBusiness { kind, position } => {
            let kind = *kind;
            if !kind.is_placeable() {
                return Err(Rejection::NotPlaceable(kind));
            }
            let spec = config.business_spec(kind);
            let cost = placement_cost(spec.base_cost, state.count_of(kind));
            require_funds(state.coins, cost)?;

            let s = Arc::make_mut(state);
            s.coins -= cost;
            let business = s.insert_business(kind, *position, &spec);
            if let Some(b) = s.business_mut(business) {
                b.total_invested = cost;
            }
            if let Some(starter) = config.starter_agent {
                s.add_agent(business, starter, config);
            }
            bus.emit(Event::BusinessPlaced {
                business,
                kind,
                cost,
                at_ms,
            });
            Ok(CommandOutcome::Placed { business, cost })
        }

        Command::UpgradeBusiness { business, upgrade } => {
            let target = state
                .business(*business)
                .ok_or(Rejection::BusinessNotFound(*business))?;
            if target.is_market() {
                return Err(Rejection::NotPlaceable(target.kind));
            }
            let cost = upgrade_cost(config.upgrade_pricing, &target.upgrades, *upgrade);
            require_funds(state.coins, cost)?;

            let s = Arc::make_mut(state);
            s.coins -= cost;
            let level = match s.business_mut(*business) {
                Some(b) => {
                    apply_upgrade(b, *upgrade, cost);
                    b.level
                }
                None => 0,
            };
            bus.emit(Event::BusinessUpgraded {
                business: *business,
                upgrade: *upgrade,
                cost,
                level,
                at_ms,
            });
            Ok(CommandOutcome::Upgraded {
                business: *business,
                cost,
                level,
            })
        }

        Command::HireAgent { business, kind } => {
            let target = state
                .business(*business)
                .ok_or(Rejection::BusinessNotFound(*business))?;
            if target.is_market() {
                return Err(Rejection::NotPlaceable(target.kind));
            }
            let spec = config.agent_spec(*kind);
            let cost = agent_hire_cost(spec.base_cost, target.agent_count(*kind));
            require_funds(state.coins, cost)?;

            let s = Arc::make_mut(state);
            let agent = s
                .add_agent(*business, *kind, config)
                .ok_or(Rejection::BusinessNotFound(*business))?;
            s.coins -= cost;
            bus.emit(Event::AgentHired {
                business: *business,
                agent,
                kind: *kind,
                cost,
                at_ms,
            });
            Ok(CommandOutcome::Hired {
                business: *business,
                agent,
                cost,
            })
        }

        Command::SellAgent { business, kind } => {
            let target = state
                .business(*business)
                .ok_or(Rejection::BusinessNotFound(*business))?;
            let owned = target.agent_count(*kind);
            let group = target
                .shipping
                .iter()
                .find(|g| g.kind == *kind && !g.agents.is_empty())
                .ok_or(Rejection::NoAgents {
                    business: *business,
                    kind: *kind,
                })?;
            let (agent, forced) = match group.agents.iter().rev().find(|a| a.is_idle()) {
                Some(idle) => (idle.id, false),
                None => match group.agents.last() {
                    Some(last) => (last.id, true),
                    None => {
                        return Err(Rejection::NoAgents {
                            business: *business,
                            kind: *kind,
                        });
                    }
                },
            };
            let refund = agent_sell_refund(config.agent_spec(*kind).base_cost, owned);

            let s = Arc::make_mut(state);
            if forced && let Some(delivery) = s.delivery_for_agent(agent) {
                cancel_delivery(s, delivery, bus);
            }
            if let Some(b) = s.business_mut(*business) {
                for g in b.shipping.iter_mut().filter(|g| g.kind == *kind) {
                    g.agents.retain(|a| a.id != agent);
                }
            }
            s.coins = s.coins.saturating_add(refund);
            if forced {
                tracing::warn!(
                    target: "emporium::command",
                    business = %business,
                    agent = %agent,
                    "force-sold a delivering agent"
                );
            }
            bus.emit(Event::AgentSold {
                business: *business,
                agent,
                kind: *kind,
                refund,
                forced,
                at_ms,
            });
            Ok(CommandOutcome::Sold {
                business: *business,
                agent,
                refund,
                forced,
            })
        }

        Command::RelocateBusiness { business, position } => {
            let target = state
                .business(*business)
                .ok_or(Rejection::BusinessNotFound(*business))?;
            if target.is_market() {
                return Err(Rejection::NotPlaceable(target.kind));
            }
            let cost = relocation_cost(target.position.distance(position));
            require_funds(state.coins, cost)?;

            let s = Arc::make_mut(state);
            s.coins -= cost;
            if let Some(b) = s.business_mut(*business) {
                b.position = *position;
            }
            bus.emit(Event::BusinessRelocated {
                business: *business,
                cost,
                at_ms,
            });
            Ok(CommandOutcome::Relocated {
                business: *business,
                cost,
            })
        }

        Command::UnlockAchievement { name } => {
            if state.achievements.get(name).copied().unwrap_or(false) {
                return Ok(CommandOutcome::Achievement {
                    name: name.clone(),
                    newly_unlocked: false,
                });
            }
            Arc::make_mut(state).achievements.insert(name.clone(), true);
            bus.emit(Event::AchievementUnlocked {
                name: name.clone(),
                at_ms,
            });
            Ok(CommandOutcome::Achievement {
                name: name.clone(),
                newly_unlocked: true,
            })
        }

        Command::Charge { amount } => {
            let s = Arc::make_mut(state);
            s.coins = s.coins.saturating_sub(*amount);
            Ok(CommandOutcome::Charged { balance: s.coins })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceValues;

    fn fresh(coins: i64) -> (Arc<GameState>, EconomyConfig) {
        let config = EconomyConfig {
            starting_coins: coins,
            ..EconomyConfig::default()
        };
        let state = Arc::new(GameState::new_session(&config, &ResourceValues::default()));
        (state, config)
    }

    fn place(state: &mut Arc<GameState>, config: &EconomyConfig, kind: BusinessKind) -> BusinessId {
        match apply(
            state,
            config,
            &Command::PlaceBusiness {
                kind,
                position: Position::new(10.0, 0.0),
            },
            &mut EventBus::default(),
        ) {
            Ok(CommandOutcome::Placed { business, .. }) => business,
            other => panic!("placement failed: {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: Placement deducts cost and grants a starter cart
    // -----------------------------------------------------------------------
    #[test]
    fn placement_charges_and_grants_starter() {
        let (mut s, config) = fresh(2000);
        let forest = place(&mut s, &config, BusinessKind::Forest);
        let second = place(&mut s, &config, BusinessKind::Forest);
        assert_eq!(s.coins, 2000 - 100 - 130);
        let b = s.business(forest).unwrap();
        assert_eq!(b.agent_count(ShippingKind::Cart), 1);
        assert_eq!(b.total_invested, 100);
        assert_eq!(s.business(second).unwrap().total_invested, 130);
    }

    // -----------------------------------------------------------------------
    // Test 2: Insufficient funds leaves the Arc untouched and signals
    // -----------------------------------------------------------------------
    #[test]
    fn insufficient_funds_is_a_signalled_no_op() {
        let (mut s, config) = fresh(50);
        let before = Arc::clone(&s);
        let mut bus = EventBus::default();
        let r = apply(
            &mut s,
            &config,
            &Command::PlaceBusiness {
                kind: BusinessKind::Forest,
                position: Position::default(),
            },
            &mut bus,
        );
        assert_eq!(
            r,
            Err(Rejection::InsufficientFunds {
                needed: 100,
                available: 50
            })
        );
        assert!(Arc::ptr_eq(&before, &s));
        assert_eq!(bus.buffered_count(crate::event::EventKind::CommandRejected), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: Missing business is silent
    // -----------------------------------------------------------------------
    #[test]
    fn missing_business_is_silent() {
        let (mut s, config) = fresh(2000);
        let before = Arc::clone(&s);
        let mut bus = EventBus::default();
        let r = apply(
            &mut s,
            &config,
            &Command::UpgradeBusiness {
                business: BusinessId(77),
                upgrade: UpgradeKind::ProcessingTime,
            },
            &mut bus,
        );
        assert_eq!(r, Err(Rejection::BusinessNotFound(BusinessId(77))));
        assert!(Arc::ptr_eq(&before, &s));
        assert_eq!(bus.buffered_count(crate::event::EventKind::CommandRejected), 0);
    }

    // -----------------------------------------------------------------------
    // Test 4: The market cannot be placed, moved, or upgraded
    // -----------------------------------------------------------------------
    #[test]
    fn market_is_locked() {
        let (mut s, config) = fresh(2000);
        let market = s.market_id();
        let mut bus = EventBus::default();
        for cmd in [
            Command::PlaceBusiness {
                kind: BusinessKind::Market,
                position: Position::default(),
            },
            Command::RelocateBusiness {
                business: market,
                position: Position::new(5.0, 5.0),
            },
            Command::UpgradeBusiness {
                business: market,
                upgrade: UpgradeKind::IncomingCapacity,
            },
            Command::HireAgent {
                business: market,
                kind: ShippingKind::Drone,
            },
        ] {
            assert_eq!(
                apply(&mut s, &config, &cmd, &mut bus),
                Err(Rejection::NotPlaceable(BusinessKind::Market))
            );
        }
        assert_eq!(bus.buffered_count(crate::event::EventKind::CommandRejected), 4);
    }

    // -----------------------------------------------------------------------
    // Test 5: Upgrade follows the configured pricing
    // -----------------------------------------------------------------------
    #[test]
    fn upgrade_uses_diversified_pricing_by_default() {
        let (mut s, config) = fresh(2000);
        let mill = place(&mut s, &config, BusinessKind::Sawmill);
        let coins = s.coins;
        let r = apply(
            &mut s,
            &config,
            &Command::UpgradeBusiness {
                business: mill,
                upgrade: UpgradeKind::OutgoingCapacity,
            },
            &mut EventBus::default(),
        );
        assert_eq!(
            r,
            Ok(CommandOutcome::Upgraded {
                business: mill,
                cost: 112,
                level: 2
            })
        );
        assert_eq!(s.coins, coins - 112);
        assert_eq!(s.business(mill).unwrap().outgoing.capacity, 100);
    }

    // -----------------------------------------------------------------------
    // Test 6: Hire cost scales with owned agents of the kind
    // -----------------------------------------------------------------------
    #[test]
    fn hire_cost_counts_existing_agents() {
        let (mut s, config) = fresh(2000);
        let farm = place(&mut s, &config, BusinessKind::Farm);
        let r = apply(
            &mut s,
            &config,
            &Command::HireAgent {
                business: farm,
                kind: ShippingKind::Cart,
            },
            &mut EventBus::default(),
        );
        // The starter cart counts as owned.
        assert!(matches!(r, Ok(CommandOutcome::Hired { cost: 55, .. })));
        assert_eq!(s.business(farm).unwrap().agent_count(ShippingKind::Cart), 2);
    }

    // -----------------------------------------------------------------------
    // Test 7: Selling prefers idle agents and refunds half
    // -----------------------------------------------------------------------
    #[test]
    fn sell_prefers_idle_and_refunds_half() {
        let (mut s, config) = fresh(2000);
        let farm = place(&mut s, &config, BusinessKind::Farm);
        let coins = s.coins;
        let r = apply(
            &mut s,
            &config,
            &Command::SellAgent {
                business: farm,
                kind: ShippingKind::Cart,
            },
            &mut EventBus::default(),
        );
        assert!(matches!(
            r,
            Ok(CommandOutcome::Sold {
                refund: 27,
                forced: false,
                ..
            })
        ));
        assert_eq!(s.coins, coins + 27);

        let before = Arc::clone(&s);
        let r = apply(
            &mut s,
            &config,
            &Command::SellAgent {
                business: farm,
                kind: ShippingKind::Cart,
            },
            &mut EventBus::default(),
        );
        assert_eq!(
            r,
            Err(Rejection::NoAgents {
                business: farm,
                kind: ShippingKind::Cart
            })
        );
        assert!(Arc::ptr_eq(&before, &s));
    }

    // -----------------------------------------------------------------------
    // Test 8: Relocation cost is distance based with a floor
    // -----------------------------------------------------------------------
    #[test]
    fn relocation_charges_by_distance() {
        let (mut s, config) = fresh(2000);
        let mine = place(&mut s, &config, BusinessKind::Mine);
        let coins = s.coins;
        let r = apply(
            &mut s,
            &config,
            &Command::RelocateBusiness {
                business: mine,
                position: Position::new(310.0, 0.0),
            },
            &mut EventBus::default(),
        );
        assert_eq!(
            r,
            Ok(CommandOutcome::Relocated {
                business: mine,
                cost: 30
            })
        );
        assert_eq!(s.coins, coins - 30);
        assert_eq!(s.business(mine).unwrap().position, Position::new(310.0, 0.0));
    }

    // -----------------------------------------------------------------------
    // Test 9: Achievements signal only the first unlock
    // -----------------------------------------------------------------------
    #[test]
    fn achievement_unlocks_once() {
        let (mut s, config) = fresh(2000);
        let mut bus = EventBus::default();
        let cmd = Command::UnlockAchievement {
            name: "first_sale".into(),
        };
        apply(&mut s, &config, &cmd, &mut bus).unwrap();
        let before = Arc::clone(&s);
        let r = apply(&mut s, &config, &cmd, &mut bus).unwrap();
        assert_eq!(
            r,
            CommandOutcome::Achievement {
                name: "first_sale".into(),
                newly_unlocked: false
            }
        );
        assert!(Arc::ptr_eq(&before, &s));
        assert_eq!(bus.buffered_count(crate::event::EventKind::AchievementUnlocked), 1);
    }

    // -----------------------------------------------------------------------
    // Test 10: Charges can bankrupt the session
    // -----------------------------------------------------------------------
    #[test]
    fn charge_can_go_negative() {
        let (mut s, config) = fresh(100);
        let r = apply(&mut s, &config, &Command::Charge { amount: 150 }, &mut EventBus::default());
        assert_eq!(r, Ok(CommandOutcome::Charged { balance: -50 }));
        assert!(s.is_bankrupt());
    }
}

//! Headless session: a wood supply chain running for five simulated minutes.
//!
//! Places a Forest, a Sawmill, and a Workshop, hires an extra cart for the
//! Forest, then advances the engine and prints each business's buffers and
//! recent profit, then the market price table. Pass a path to an economy
//! file to override the defaults.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=emporium=debug cargo run -p emporium-examples --example headless_session [economy.ron]
//! ```

use emporium_core::agent::ShippingKind;
use emporium_core::business::{BusinessKind, Position};
use emporium_core::command::{Command, CommandOutcome};
use emporium_core::config::EconomyConfig;
use emporium_core::engine::Engine;
use emporium_core::event::{Event, EventKind};
use emporium_core::query::{market_prices, snapshot_deliveries};
use std::path::Path;
use tracing_subscriber::prelude::*;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match emporium_data::load_economy_config(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(%path, error = %e, "failed to load economy config");
                std::process::exit(1);
            }
        },
        None => EconomyConfig::default(),
    };

    let mut engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "invalid economy");
            std::process::exit(1);
        }
    };

    engine.on_passive(
        EventKind::DeliverySettled,
        Box::new(|event: &Event| {
            if let Event::DeliverySettled {
                resource,
                amount,
                revenue,
                at_ms,
                ..
            } = event
            {
                tracing::info!(
                    at_ms,
                    resource = resource.name(),
                    amount,
                    revenue,
                    "sale settled"
                );
            }
        }),
    );

    let layout = [
        (BusinessKind::Forest, 20.0, 0.0),
        (BusinessKind::Sawmill, 30.0, 10.0),
        (BusinessKind::Workshop, 15.0, 25.0),
    ];
    let mut placed = Vec::new();
    for (kind, x, y) in layout {
        match engine.execute(Command::PlaceBusiness {
            kind,
            position: Position::new(x, y),
        }) {
            Ok(CommandOutcome::Placed { business, cost }) => {
                tracing::info!(?kind, %business, cost, "placed business");
                placed.push(business);
            }
            other => tracing::warn!(?kind, outcome = ?other, "could not place business"),
        }
    }
    if let Some(&forest) = placed.first()
        && let Err(e) = engine.execute(Command::HireAgent {
            business: forest,
            kind: ShippingKind::Cart,
        })
    {
        tracing::warn!(error = %e, "could not hire a second cart");
    }

    for minute in 1..=5 {
        let result = engine.advance(60_000);
        tracing::info!(
            minute,
            coins = engine.coins(),
            ticks = result.ticks_run,
            retargets = result.retargets_run,
            "minute elapsed"
        );
        println!("\n== minute {minute}: {} coins ==", engine.coins());
        for snap in engine.snapshot_all_businesses() {
            println!(
                "{:<9} in {:>3}/{:<3} out {:>3}/{:<3} {:?} agents {}/{} profit {}",
                format!("{:?}", snap.kind),
                snap.incoming.current,
                snap.incoming.capacity,
                snap.outgoing.current,
                snap.outgoing.capacity,
                snap.status,
                snap.agents_delivering,
                snap.agents_total,
                snap.recent_profit,
            );
        }
        println!("{} deliveries in flight", snapshot_deliveries(engine.state()).len());
    }

    println!("\n== market ==");
    for (resource, price) in market_prices(engine.state()) {
        println!("{:<8} {:>10.2}", resource.name(), price.to_num::<f64>());
    }
}

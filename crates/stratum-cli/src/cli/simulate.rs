//! `stratum simulate` -- run a relay cascade and report the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use tokio::sync::broadcast::error::TryRecvError;

use stratum_core::LayerBus;
use stratum_infra::handler::RelayHandler;
use stratum_types::config::BusConfig;
use stratum_types::event::{BusEvent, EmergenceEvent};
use stratum_types::message::{kind, LayerId, LayerMessage};
use stratum_types::metrics::BusMetrics;

/// How many history entries the report shows.
const RECENT_SHOWN: usize = 12;

pub struct SimulateOptions {
    pub seeds: usize,
    pub duration: Duration,
    pub max_depth: u64,
}

/// Everything observed during one simulation.
pub struct SimulationReport {
    pub metrics: BusMetrics,
    pub seeds_rejected: usize,
    pub follow_ups_rejected: usize,
    pub dropped: usize,
    pub emergence: Vec<EmergenceEvent>,
    pub layer_states: BTreeMap<LayerId, serde_json::Value>,
    pub recent: Vec<Arc<LayerMessage>>,
}

/// Build a bus with relay handlers, seed it, let it run, then sweep once.
pub async fn simulate(config: BusConfig, options: &SimulateOptions) -> Result<SimulationReport> {
    let bus = LayerBus::new(config)?;

    for layer in bus.layers().to_vec() {
        match RelayHandler::cascade(&layer) {
            Some(handler) => {
                bus.register_handler(layer, handler.with_max_depth(options.max_depth))?;
            }
            None => tracing::warn!(%layer, "no relay preset for layer, its messages will be dropped"),
        }
    }

    let seed_layer = bus
        .layers()
        .first()
        .cloned()
        .context("bus has no layers")?;

    let mut events = bus.subscribe();
    bus.start()?;

    let mut seeds_rejected = 0;
    for i in 0..options.seeds {
        let seed = LayerMessage::new(
            seed_layer.clone(),
            seed_layer.clone(),
            kind::PERCEPTION,
            format!("stimulus #{i}"),
            0.5,
        );
        if let Err(e) = bus.send(seed) {
            tracing::debug!("seed rejected: {e}");
            seeds_rejected += 1;
        }
    }

    tokio::time::sleep(options.duration).await;
    bus.detect_emergence();
    bus.shutdown().await;

    let mut follow_ups_rejected = 0;
    let mut dropped = 0;
    loop {
        match events.try_recv() {
            Ok(BusEvent::FollowUpRejected { .. }) => follow_ups_rejected += 1,
            Ok(BusEvent::MessageDropped { .. }) => dropped += 1,
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event subscriber lagged");
            }
            Err(_) => break,
        }
    }

    Ok(SimulationReport {
        metrics: bus.metrics(),
        seeds_rejected,
        follow_ups_rejected,
        dropped,
        emergence: bus.emergence_events(usize::MAX),
        layer_states: bus.layer_states(),
        recent: bus.recent_messages(RECENT_SHOWN),
    })
}

pub async fn run(config: BusConfig, options: SimulateOptions, json: bool) -> Result<()> {
    let report = simulate(config, &options).await?;

    if json {
        let recent: Vec<&LayerMessage> = report.recent.iter().map(Arc::as_ref).collect();
        let out = serde_json::json!({
            "metrics": report.metrics,
            "seeds": options.seeds,
            "seeds_rejected": report.seeds_rejected,
            "follow_ups_rejected": report.follow_ups_rejected,
            "dropped": report.dropped,
            "emergence": report.emergence,
            "layers": report.layer_states,
            "recent": recent,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Stratum simulation ({} seeds, {} ms)",
        style("◆").bold(),
        options.seeds,
        options.duration.as_millis()
    );
    println!();

    print_metrics(&report);
    print_emergence(&report.emergence);
    print_recent(&report.recent);
    Ok(())
}

fn print_metrics(report: &SimulationReport) {
    let metrics = &report.metrics;
    println!("  {}", style("── Bus ──").dim());
    println!("  Processed:        {}", style(metrics.processed).bold());
    println!("  History:          {}", metrics.history_size);
    if metrics.handler_failures > 0 {
        println!("  Handler failures: {}", style(metrics.handler_failures).red());
    }
    if report.follow_ups_rejected > 0 || report.seeds_rejected > 0 {
        println!(
            "  Rejected sends:   {}",
            style(report.follow_ups_rejected + report.seeds_rejected).yellow()
        );
    }
    if report.dropped > 0 {
        println!("  Dropped:          {}", style(report.dropped).yellow());
    }
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Layer").fg(Color::White),
        Cell::new("Queued").fg(Color::White),
        Cell::new("Received").fg(Color::White),
        Cell::new("Emitted").fg(Color::White),
    ]);
    for (layer, depth) in &metrics.queue_depths {
        let state = report.layer_states.get(layer);
        let field = |key: &str| {
            state
                .and_then(|s| s.get(key))
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        table.add_row(vec![
            Cell::new(layer),
            Cell::new(depth),
            Cell::new(field("received")),
            Cell::new(field("emitted")),
        ]);
    }
    println!("{table}");
    println!();
}

fn print_emergence(events: &[EmergenceEvent]) {
    println!("  {}", style("── Emergence ──").dim());
    if events.is_empty() {
        println!("  {}", style("nothing detected").dim());
    }
    for event in events {
        let counts: Vec<String> = event
            .counts
            .iter()
            .map(|(ty, n)| format!("{ty}={n}"))
            .collect();
        println!(
            "  {} {} {}",
            style("✦").yellow(),
            style(&event.rule).cyan(),
            style(format!("({}, window {})", counts.join(" "), event.window_size)).dim()
        );
    }
    println!();
}

fn print_recent(messages: &[Arc<LayerMessage>]) {
    println!("  {}", style("── Recent messages ──").dim());
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Route").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Flow").fg(Color::White),
        Cell::new("Content").fg(Color::White),
    ]);
    for message in messages {
        table.add_row(vec![
            Cell::new(message.timestamp.format("%H:%M:%S%.3f")),
            Cell::new(format!("{} → {}", message.from_layer, message.to_layer)),
            Cell::new(&message.message_type).fg(Color::Cyan),
            Cell::new(message.flow()),
            Cell::new(&message.content),
        ]);
    }
    println!("{table}");
    println!();
}
